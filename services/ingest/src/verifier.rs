//! First stage: confirm the true type of a raw upload and promote it into
//! the verified namespace.

use crate::completion::CompletionAggregator;
use crate::database::MetadataStore;
use crate::error::{ContentError, IngestError, IngestResult};
use crate::handler::RecordHandler;
use crate::models::ContentItem;
use crate::object_key::{Namespace, ObjectKey};
use crate::object_store::ObjectStore;
use crate::sniff::{FileType, sniff};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ContentVerifier {
    store: Arc<dyn ObjectStore>,
    database: Arc<dyn MetadataStore>,
    aggregator: CompletionAggregator,
}

impl ContentVerifier {
    pub fn new(store: Arc<dyn ObjectStore>, database: Arc<dyn MetadataStore>) -> Self {
        let aggregator = CompletionAggregator::new(database.clone());
        Self {
            store,
            database,
            aggregator,
        }
    }

    async fn detect(&self, bucket: &str, raw_key: &str) -> IngestResult<FileType> {
        let data = self.store.get_object(bucket, raw_key).await?;

        match sniff(&data) {
            None => Err(ContentError::UndetectableType.into()),
            Some(file_type) if !file_type.is_allowed() => {
                Err(ContentError::UnsupportedType(file_type.extension().to_string()).into())
            }
            Some(file_type) => Ok(file_type),
        }
    }

    /// Records the rejection on the item and lets its batch re-evaluate.
    async fn reject(&self, content: &ContentItem, reason: ContentError) -> IngestResult<()> {
        let message = reason.to_string();
        if self
            .database
            .record_failure(&content.content_id, &message)
            .await?
        {
            warn!(content_id = %content.content_id, reason = %message, "Rejected upload");
        } else {
            info!(content_id = %content.content_id, "Content already terminal, rejection not recorded");
        }

        self.aggregator.check(&content.batch_id).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordHandler for ContentVerifier {
    fn name(&self) -> &'static str {
        "verifier"
    }

    fn accepts(&self, namespace: Namespace) -> bool {
        namespace == Namespace::Raw
    }

    async fn handle_object(&self, bucket: &str, key: &ObjectKey) -> IngestResult<()> {
        let raw_key = key.to_string();

        let content = self
            .database
            .find_content_by_raw_key(&raw_key)
            .await?
            .ok_or_else(|| IngestError::RecordNotReady(raw_key.clone()))?;

        let file_type = match self.detect(bucket, &raw_key).await {
            Ok(file_type) => file_type,
            Err(IngestError::Content(reason)) => return self.reject(&content, reason).await,
            Err(e) => return Err(e),
        };

        let verified_key = key.verified(file_type.extension()).to_string();
        self.store
            .copy_object(bucket, &raw_key, &verified_key, file_type.mime_type())
            .await?;

        let updated = self
            .database
            .mark_verified(&raw_key, &verified_key, file_type.mime_type())
            .await?;
        if updated == 0 {
            return Err(IngestError::RecordNotReady(raw_key));
        }

        if key.extension.as_deref() != Some(file_type.extension()) {
            info!(
                declared = key.extension.as_deref().unwrap_or(""),
                detected = file_type.extension(),
                "Normalized extension"
            );
        }
        info!(content_id = %content.content_id, verified_key = %verified_key, "Verified upload");

        Ok(())
    }
}
