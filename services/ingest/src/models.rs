use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Status of an upload batch. Only ever moves from `Pending` to `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Completed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UploadStatus::Pending),
            "completed" => Ok(UploadStatus::Completed),
            other => Err(format!("unknown upload status: {other}")),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct UploadBatchRow {
    pub upload_id: String,
    pub album_id: String,
    pub uploader_id: String,
    pub photo_count: i64,
    pub video_count: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user-initiated group of files uploaded together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadBatch {
    pub batch_id: String,
    pub album_id: String,
    pub uploader_id: String,
    pub photo_count: i64,
    pub video_count: i64,
    pub status: UploadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadBatch {
    /// Number of items the batch waits for before it can complete.
    pub fn expected_count(&self) -> i64 {
        self.photo_count + self.video_count
    }
}

impl TryFrom<UploadBatchRow> for UploadBatch {
    type Error = String;

    fn try_from(row: UploadBatchRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row.status.parse()?,
            batch_id: row.upload_id,
            album_id: row.album_id,
            uploader_id: row.uploader_id,
            photo_count: row.photo_count,
            video_count: row.video_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Image,
    Video,
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(ContentKind::Image),
            "video" => Ok(ContentKind::Video),
            other => Err(format!("unknown content kind: {other}")),
        }
    }
}

/// Row shape of a content record joined with its photo metadata.
///
/// Status is stored as nullable columns; [`ContentItem`] turns them into a
/// [`ContentStatus`] at the read boundary.
#[derive(Debug, Clone, FromRow)]
pub struct ContentRow {
    pub content_id: String,
    pub upload_id: String,
    pub album_id: String,
    pub kind: String,
    pub content_hash: Option<String>,
    pub raw_key: String,
    pub verified_key: Option<String>,
    pub mime_type: Option<String>,
    pub thumbnail_key: Option<String>,
    pub file_size: Option<i64>,
    pub taken_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

/// Derived processing status of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ContentStatus {
    Pending,
    Completed {
        thumbnail_key: String,
        file_size: Option<i64>,
        dimensions: Option<(u32, u32)>,
    },
    Failed {
        message: String,
    },
}

impl ContentStatus {
    /// Derives the status from the stored nullable columns. An error message
    /// wins over a thumbnail key.
    pub fn derive(
        thumbnail_key: Option<&str>,
        error_message: Option<&str>,
        file_size: Option<i64>,
        dimensions: Option<(u32, u32)>,
    ) -> Self {
        if let Some(message) = error_message {
            return ContentStatus::Failed {
                message: message.to_string(),
            };
        }
        match thumbnail_key {
            Some(key) => ContentStatus::Completed {
                thumbnail_key: key.to_string(),
                file_size,
                dimensions,
            },
            None => ContentStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ContentStatus::Pending)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentStatus::Pending => "pending",
            ContentStatus::Completed { .. } => "completed",
            ContentStatus::Failed { .. } => "failed",
        }
    }
}

/// One uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub content_id: String,
    pub batch_id: String,
    pub album_id: String,
    pub kind: ContentKind,
    pub content_hash: Option<String>,
    pub raw_key: String,
    pub verified_key: Option<String>,
    pub mime_type: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: ContentStatus,
}

impl TryFrom<ContentRow> for ContentItem {
    type Error = String;

    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        let dimensions = match (row.width, row.height) {
            (Some(w), Some(h)) => Some((
                u32::try_from(w).map_err(|e| e.to_string())?,
                u32::try_from(h).map_err(|e| e.to_string())?,
            )),
            _ => None,
        };
        let status = ContentStatus::derive(
            row.thumbnail_key.as_deref(),
            row.error_message.as_deref(),
            row.file_size,
            dimensions,
        );

        Ok(Self {
            kind: row.kind.parse()?,
            content_id: row.content_id,
            batch_id: row.upload_id,
            album_id: row.album_id,
            content_hash: row.content_hash,
            raw_key: row.raw_key,
            verified_key: row.verified_key,
            mime_type: row.mime_type,
            taken_at: row.taken_at,
            processed_at: row.processed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            status,
        })
    }
}

/// Image-specific metadata, one row per successfully processed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub content_id: String,
    pub width: u32,
    pub height: u32,
    pub exif: Option<serde_json::Value>,
}

/// Everything the processor writes for a successfully processed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedContent {
    pub thumbnail_key: String,
    pub file_size: i64,
    pub taken_at: Option<DateTime<Utc>>,
    pub photo: PhotoMetadata,
}

/// Progress summary of a batch, derived from its items' statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub batch_id: String,
    pub expected: i64,
    pub processed: i64,
    pub completed: i64,
    pub failed: i64,
    pub pending: i64,
    pub status: UploadStatus,
}
