//! Object key layout of the album bucket.
//!
//! ```text
//! raws/{batchId}/{contentId}.{ext}           original upload
//! verified/raws/{batchId}/{contentId}.{ext}  copy with the sniffed extension
//! thumbnails/{batchId}/{contentId}.jpg       generated thumbnail
//! ```

use crate::error::IngestError;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static CONTENT_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(verified/)?raws/([^/]+)/([^/.]+)(?:\.([A-Za-z0-9]+))?$")
        .expect("content key pattern is valid")
});

static THUMBNAIL_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^thumbnails/([^/]+)/([^/.]+)\.jpg$").expect("thumbnail key pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Raw,
    Verified,
    Thumbnail,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: Namespace,
    pub batch_id: String,
    pub content_id: String,
    pub extension: Option<String>,
}

impl ObjectKey {
    pub fn parse(key: &str) -> Result<Self, IngestError> {
        if let Some(caps) = CONTENT_KEY.captures(key) {
            let namespace = if caps.get(1).is_some() {
                Namespace::Verified
            } else {
                Namespace::Raw
            };
            return Ok(Self {
                namespace,
                batch_id: caps[2].to_string(),
                content_id: caps[3].to_string(),
                extension: caps.get(4).map(|m| m.as_str().to_string()),
            });
        }

        if let Some(caps) = THUMBNAIL_KEY.captures(key) {
            return Ok(Self {
                namespace: Namespace::Thumbnail,
                batch_id: caps[1].to_string(),
                content_id: caps[2].to_string(),
                extension: Some("jpg".to_string()),
            });
        }

        Err(IngestError::MalformedKey(key.to_string()))
    }

    pub fn raw(batch_id: &str, content_id: &str, extension: &str) -> Self {
        Self {
            namespace: Namespace::Raw,
            batch_id: batch_id.to_string(),
            content_id: content_id.to_string(),
            extension: Some(extension.to_string()),
        }
    }

    /// Key of the verified copy, carrying `extension` instead of whatever
    /// the client declared.
    pub fn verified(&self, extension: &str) -> Self {
        Self {
            namespace: Namespace::Verified,
            batch_id: self.batch_id.clone(),
            content_id: self.content_id.clone(),
            extension: Some(extension.to_string()),
        }
    }

    pub fn thumbnail(&self) -> Self {
        Self {
            namespace: Namespace::Thumbnail,
            batch_id: self.batch_id.clone(),
            content_id: self.content_id.clone(),
            extension: Some("jpg".to_string()),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.namespace {
            Namespace::Raw => "raws",
            Namespace::Verified => "verified/raws",
            Namespace::Thumbnail => "thumbnails",
        };
        write!(f, "{}/{}/{}", prefix, self.batch_id, self.content_id)?;
        if let Some(ext) = &self.extension {
            write!(f, ".{}", ext)?;
        }
        Ok(())
    }
}

/// Decodes a key as it appears in an object-created notification:
/// form-encoded, with `+` standing for a space.
pub fn decode_event_key(key: &str) -> String {
    let spaced = key.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
