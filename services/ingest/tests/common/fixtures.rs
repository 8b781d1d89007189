#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ingest::queue::QueueMessage;
use serde_json::json;
use std::io::Cursor;

pub const BUCKET: &str = "album-bucket";

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

/// A BMP header followed by filler; only the signature matters to sniffing.
pub fn bmp_bytes() -> Vec<u8> {
    let mut data = b"BM".to_vec();
    data.extend_from_slice(&[0u8; 64]);
    data
}

/// JPEG signature followed by garbage: sniffs as JPEG, fails to decode.
pub fn corrupt_jpeg_bytes() -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.extend_from_slice(b"definitely not scan data");
    data
}

pub fn s3_event(keys: &[&str]) -> serde_json::Value {
    let records: Vec<_> = keys
        .iter()
        .map(|key| {
            json!({
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": BUCKET },
                    "object": { "key": key, "size": 1024 }
                }
            })
        })
        .collect();
    json!({ "Records": records })
}

pub fn message(id: &str, body: String) -> QueueMessage {
    QueueMessage {
        message_id: Some(id.to_string()),
        receipt_handle: Some(format!("receipt-{id}")),
        body: Some(body),
    }
}

/// An ISO-BMFF `ftyp` box with the `heic` brand; enough for sniffing, not
/// for decoding.
pub fn heic_header_bytes() -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x00, 0x18];
    data.extend_from_slice(b"ftypheic");
    data.extend_from_slice(&[0, 0, 0, 0]);
    data.extend_from_slice(b"mif1heic");
    data.extend_from_slice(&[0u8; 32]);
    data
}

/// Encodes a gradient as HEIC. `None` when the local libheif has no HEVC
/// encoder or decoder plugin.
#[cfg(feature = "heif")]
pub fn heic_bytes(width: u32, height: u32) -> Option<Vec<u8>> {
    use libheif_rs::{
        Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif,
        RgbChroma,
    };

    let lib_heif = LibHeif::new_checked().ok()?;
    if lib_heif
        .decoder_descriptors(1, Some(CompressionFormat::Hevc))
        .is_empty()
    {
        return None;
    }
    let mut encoder = lib_heif.encoder_for_format(CompressionFormat::Hevc).ok()?;
    encoder.set_quality(EncoderQuality::Lossy(90)).ok()?;

    let mut image = Image::new(width, height, ColorSpace::Rgb(RgbChroma::C444)).ok()?;
    for channel in [Channel::R, Channel::G, Channel::B] {
        image.create_plane(channel, width, height, 8).ok()?;
    }
    let planes = image.planes_mut();
    for (plane, offset) in [planes.r, planes.g, planes.b].into_iter().zip([0u32, 85, 170]) {
        let plane = plane?;
        let stride = plane.stride;
        let data = plane.data;
        for y in 0..height {
            for x in 0..width {
                data[y as usize * stride + x as usize] = ((x + y + offset) % 256) as u8;
            }
        }
    }

    let mut context = HeifContext::new().ok()?;
    context.encode_image(&image, &mut encoder, None).ok()?;
    context.write_to_bytes().ok()
}
