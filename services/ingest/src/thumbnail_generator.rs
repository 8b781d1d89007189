use crate::error::{ContentError, IngestResult};
use crate::object_key::ObjectKey;
use crate::object_store::ObjectStore;
use bytes::Bytes;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::sync::Arc;
use tracing::info;

/// Longest side of a thumbnail, in pixels.
pub const THUMBNAIL_MAX_SIZE: u32 = 400;
pub const THUMBNAIL_QUALITY: u8 = 80;
pub const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Clone)]
pub struct ThumbnailGenerator {
    store: Arc<dyn ObjectStore>,
}

impl ThumbnailGenerator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Writes an encoded thumbnail next to its source and returns its key.
    /// The key only depends on the source, so replays overwrite in place.
    pub async fn upload_thumbnail(
        &self,
        bucket: &str,
        source: &ObjectKey,
        thumbnail: Vec<u8>,
    ) -> IngestResult<String> {
        let thumbnail_key = source.thumbnail().to_string();
        info!(thumbnail_key = %thumbnail_key, size = thumbnail.len(), "Uploading thumbnail");

        self.store
            .put_object(
                bucket,
                &thumbnail_key,
                Bytes::from(thumbnail),
                THUMBNAIL_CONTENT_TYPE,
            )
            .await?;

        Ok(thumbnail_key)
    }
}

/// Scales `(width, height)` so neither side exceeds `max`, keeping the
/// aspect ratio. Images already within bounds keep their size.
pub fn thumbnail_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }

    let scale = |side: u32, longest: u32| -> u32 {
        let scaled = (u64::from(side) * u64::from(max) + u64::from(longest) / 2) / u64::from(longest);
        scaled.max(1) as u32
    };

    if width >= height {
        (max, scale(height, width))
    } else {
        (scale(width, height), max)
    }
}

/// Resizes and re-encodes an image as a JPEG thumbnail, whatever the input
/// format.
pub fn render_thumbnail(image: &DynamicImage) -> Result<Vec<u8>, ContentError> {
    let (width, height) = thumbnail_dimensions(image.width(), image.height(), THUMBNAIL_MAX_SIZE);

    let resized = if (width, height) == (image.width(), image.height()) {
        image.to_rgb8()
    } else {
        image
            .resize_exact(width, height, FilterType::Lanczos3)
            .to_rgb8()
    };

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, THUMBNAIL_QUALITY)
        .encode_image(&resized)
        .map_err(|e| ContentError::Thumbnail(e.to_string()))?;

    Ok(out)
}
