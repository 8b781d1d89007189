//! HEIC/HEIF decoding through libheif, which the `image` crate lacks.

use crate::error::ContentError;
use image::DynamicImage;

/// Decodes the primary image of a HEIF container into 8-bit RGB.
#[cfg(feature = "heif")]
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ContentError> {
    use image::RgbImage;
    use libheif_rs::{ColorSpace, HeifContext, HeifError, LibHeif, RgbChroma};

    let corrupt = |e: HeifError| ContentError::CorruptImage(e.to_string());

    let lib_heif =
        LibHeif::new_checked().map_err(|e| ContentError::DecoderUnavailable(e.to_string()))?;
    let context = HeifContext::read_from_bytes(bytes).map_err(corrupt)?;
    let handle = context.primary_image_handle().map_err(corrupt)?;
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(corrupt)?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| ContentError::CorruptImage("no interleaved RGB plane".to_string()))?;

    let row_len = plane.width as usize * 3;
    if plane.stride < row_len {
        return Err(ContentError::CorruptImage(format!(
            "row stride {} shorter than {} bytes",
            plane.stride, row_len
        )));
    }

    // Rows are padded to `stride`.
    let mut pixels = Vec::with_capacity(row_len * plane.height as usize);
    for row in plane.data.chunks(plane.stride).take(plane.height as usize) {
        let row = row
            .get(..row_len)
            .ok_or_else(|| ContentError::CorruptImage("truncated pixel row".to_string()))?;
        pixels.extend_from_slice(row);
    }

    RgbImage::from_raw(plane.width, plane.height, pixels)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| ContentError::CorruptImage("truncated pixel data".to_string()))
}

#[cfg(not(feature = "heif"))]
pub fn decode(_bytes: &[u8]) -> Result<DynamicImage, ContentError> {
    Err(ContentError::DecoderUnavailable(
        "built without HEIF support".to_string(),
    ))
}
