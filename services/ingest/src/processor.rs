//! Second stage: thumbnail and metadata for a verified upload.
//!
//! Each step gates the next. Content failures end the item as failed;
//! transient failures propagate so the notification is redelivered. Either
//! terminal outcome re-evaluates the parent batch.

use crate::completion::CompletionAggregator;
use crate::config::SourceNamespace;
use crate::database::MetadataStore;
use crate::error::{ContentError, IngestError, IngestResult};
use crate::handler::RecordHandler;
use crate::metadata_extractor::{ImageMetadata, MetadataExtractor};
use crate::models::{ContentItem, PhotoMetadata, ProcessedContent};
use crate::object_key::{Namespace, ObjectKey};
use crate::object_store::ObjectStore;
use crate::sniff::{FileType, sniff};
use crate::thumbnail_generator::{ThumbnailGenerator, render_thumbnail};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, warn};

/// Largest object the processor will decode (50 MiB).
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct ContentProcessor {
    store: Arc<dyn ObjectStore>,
    database: Arc<dyn MetadataStore>,
    thumbnail_generator: ThumbnailGenerator,
    aggregator: CompletionAggregator,
    source: SourceNamespace,
}

impl ContentProcessor {
    pub fn new(store: Arc<dyn ObjectStore>, database: Arc<dyn MetadataStore>) -> Self {
        Self {
            thumbnail_generator: ThumbnailGenerator::new(store.clone()),
            aggregator: CompletionAggregator::new(database.clone()),
            store,
            database,
            source: SourceNamespace::default(),
        }
    }

    pub fn with_source(mut self, source: SourceNamespace) -> Self {
        self.source = source;
        self
    }

    async fn process(
        &self,
        bucket: &str,
        key: &ObjectKey,
        content: &ContentItem,
    ) -> IngestResult<ProcessedContent> {
        let data = self.store.get_object(bucket, &key.to_string()).await?;
        info!(size = data.len(), "Fetched object");

        if data.len() > MAX_FILE_SIZE {
            return Err(ContentError::TooLarge {
                size: data.len(),
                max: MAX_FILE_SIZE,
            }
            .into());
        }

        let file_type = sniff(&data).ok_or(ContentError::UndetectableType)?;
        if !file_type.is_allowed() {
            return Err(ContentError::UnsupportedType(file_type.extension().to_string()).into());
        }

        let file_size = data.len() as i64;
        let (metadata, thumbnail) = decode_and_render(data, file_type).await?;

        let thumbnail_key = self
            .thumbnail_generator
            .upload_thumbnail(bucket, key, thumbnail)
            .await?;

        Ok(ProcessedContent {
            thumbnail_key,
            file_size,
            taken_at: metadata.taken_at,
            photo: PhotoMetadata {
                content_id: content.content_id.clone(),
                width: metadata.width,
                height: metadata.height,
                exif: metadata.exif,
            },
        })
    }
}

/// Decoding and resizing are CPU bound and run off the async workers.
async fn decode_and_render(
    data: Bytes,
    file_type: FileType,
) -> Result<(ImageMetadata, Vec<u8>), ContentError> {
    tokio::task::spawn_blocking(move || -> Result<_, ContentError> {
        let image = MetadataExtractor::decode_image(&data, file_type)?;
        let metadata = MetadataExtractor::extract_metadata(&data, &image);
        let thumbnail = render_thumbnail(&image)?;
        Ok((metadata, thumbnail))
    })
    .await
    .map_err(|e| ContentError::CorruptImage(format!("decoder aborted: {e}")))?
}

#[async_trait]
impl RecordHandler for ContentProcessor {
    fn name(&self) -> &'static str {
        "processor"
    }

    fn accepts(&self, namespace: Namespace) -> bool {
        self.source.accepts(namespace)
    }

    async fn handle_object(&self, bucket: &str, key: &ObjectKey) -> IngestResult<()> {
        let Some(content) = self.database.find_content(&key.content_id).await? else {
            warn!(content_id = %key.content_id, "Content not found, skipping");
            return Ok(());
        };

        if content.status.is_terminal() {
            info!(
                content_id = %content.content_id,
                status = content.status.label(),
                "Content already processed"
            );
            self.aggregator.check(&content.batch_id).await?;
            return Ok(());
        }

        match self.process(bucket, key, &content).await {
            Ok(processed) => {
                if self
                    .database
                    .complete_processing(&content.content_id, &processed)
                    .await?
                {
                    info!(
                        content_id = %content.content_id,
                        thumbnail_key = %processed.thumbnail_key,
                        "Processed content"
                    );
                } else {
                    warn!(content_id = %content.content_id, "Content failed concurrently, result discarded");
                }
            }
            Err(IngestError::Content(reason)) => {
                let message = reason.to_string();
                if self
                    .database
                    .record_failure(&content.content_id, &message)
                    .await?
                {
                    warn!(content_id = %content.content_id, reason = %message, "Marked content as failed");
                } else {
                    info!(content_id = %content.content_id, reason = %message, "Content already terminal, failure not recorded");
                }
            }
            Err(e) => return Err(e),
        }

        self.aggregator.check(&content.batch_id).await?;
        Ok(())
    }
}
