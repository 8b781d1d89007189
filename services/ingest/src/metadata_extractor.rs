use crate::error::ContentError;
use crate::heif;
use crate::sniff::FileType;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use exif::{Exif, In, Reader, Tag, Value as ExifValue};
use image::DynamicImage;
use serde_json::{Map, Value};
use std::io::Cursor;
use tracing::debug;

/// Metadata recovered from a decoded image and its embedded EXIF block.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub taken_at: Option<DateTime<Utc>>,
    pub exif: Option<Value>,
}

pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Decodes the image as the sniffed `file_type`, failing on corrupt data
    /// or zero dimensions.
    pub fn decode_image(bytes: &[u8], file_type: FileType) -> Result<DynamicImage, ContentError> {
        let image = match file_type {
            FileType::Heic | FileType::Heif => heif::decode(bytes)?,
            _ => image::load_from_memory(bytes)
                .map_err(|e| ContentError::CorruptImage(e.to_string()))?,
        };

        if image.width() == 0 || image.height() == 0 {
            return Err(ContentError::CorruptImage(
                "invalid image dimensions".to_string(),
            ));
        }

        Ok(image)
    }

    /// Missing or unreadable EXIF data leaves `taken_at` and `exif` empty.
    pub fn extract_metadata(bytes: &[u8], image: &DynamicImage) -> ImageMetadata {
        let exif = Self::read_exif(bytes);

        ImageMetadata {
            width: image.width(),
            height: image.height(),
            taken_at: exif.as_ref().and_then(Self::capture_time),
            exif: exif.as_ref().map(Self::tag_map),
        }
    }

    fn read_exif(bytes: &[u8]) -> Option<Exif> {
        match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
            Ok(exif) => Some(exif),
            Err(e) => {
                debug!(error = %e, "No EXIF data");
                None
            }
        }
    }

    fn capture_time(exif: &Exif) -> Option<DateTime<Utc>> {
        [Tag::DateTimeOriginal, Tag::DateTime]
            .into_iter()
            .find_map(|tag| match &exif.get_field(tag, In::PRIMARY)?.value {
                ExifValue::Ascii(parts) => parts.first().and_then(|raw| parse_exif_datetime(raw)),
                _ => None,
            })
    }

    /// Primary-image tags as display strings. The maker note is opaque
    /// vendor data and is left out.
    fn tag_map(exif: &Exif) -> Value {
        let mut tags = Map::new();
        for field in exif.fields() {
            if field.ifd_num != In::PRIMARY || field.tag == Tag::MakerNote {
                continue;
            }
            tags.entry(field.tag.to_string()).or_insert_with(|| {
                Value::String(field.display_value().with_unit(exif).to_string())
            });
        }
        Value::Object(tags)
    }
}

/// EXIF timestamps carry no zone unless an offset tag was applied; those are
/// read as UTC.
fn parse_exif_datetime(raw: &[u8]) -> Option<DateTime<Utc>> {
    let dt = exif::DateTime::from_ascii(raw).ok()?;
    let naive = NaiveDate::from_ymd_opt(i32::from(dt.year), u32::from(dt.month), u32::from(dt.day))?
        .and_hms_opt(u32::from(dt.hour), u32::from(dt.minute), u32::from(dt.second))?;

    match dt.offset {
        Some(minutes) => FixedOffset::east_opt(i32::from(minutes) * 60)?
            .from_local_datetime(&naive)
            .single()
            .map(|local| local.with_timezone(&Utc)),
        None => Some(naive.and_utc()),
    }
}
