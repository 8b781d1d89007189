//! Completion of upload batches.
//!
//! A batch is done once the number of terminal items reaches its expected
//! count. The check is a recompute-and-compare, so concurrent workers
//! finishing siblings of the same batch converge on the same answer.

use crate::database::MetadataStore;
use crate::error::IngestResult;
use crate::models::{ContentStatus, UploadProgress, UploadStatus};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct CompletionAggregator {
    database: Arc<dyn MetadataStore>,
}

impl CompletionAggregator {
    pub fn new(database: Arc<dyn MetadataStore>) -> Self {
        Self { database }
    }

    /// Re-evaluates the batch and marks it completed when every expected
    /// item is terminal. Returns the batch status after the check, or `None`
    /// if the batch does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn check(&self, batch_id: &str) -> IngestResult<Option<UploadStatus>> {
        let Some(upload) = self.database.find_upload(batch_id).await? else {
            warn!("Upload not found");
            return Ok(None);
        };

        let expected = upload.expected_count();
        let processed = self.database.count_processed(batch_id).await?;
        info!(processed, expected, "Upload progress");

        if processed < expected {
            return Ok(Some(upload.status));
        }

        if upload.status != UploadStatus::Completed {
            self.database.mark_upload_completed(batch_id).await?;
            info!("Upload marked as completed");
        }

        Ok(Some(UploadStatus::Completed))
    }

    /// Per-status counts for a batch, using the same status derivation as
    /// the workers.
    pub async fn progress(&self, batch_id: &str) -> IngestResult<Option<UploadProgress>> {
        let Some(upload) = self.database.find_upload(batch_id).await? else {
            return Ok(None);
        };

        let contents = self.database.list_contents(batch_id).await?;
        let mut progress = UploadProgress {
            batch_id: upload.batch_id.clone(),
            expected: upload.expected_count(),
            processed: 0,
            completed: 0,
            failed: 0,
            pending: 0,
            status: upload.status,
        };

        for content in &contents {
            match content.status {
                ContentStatus::Pending => progress.pending += 1,
                ContentStatus::Completed { .. } => progress.completed += 1,
                ContentStatus::Failed { .. } => progress.failed += 1,
            }
        }
        progress.processed = progress.completed + progress.failed;
        // Items whose records do not exist yet are still pending.
        progress.pending += (progress.expected - contents.len() as i64).max(0);

        Ok(Some(progress))
    }
}
