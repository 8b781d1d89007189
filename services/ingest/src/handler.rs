use crate::error::IngestResult;
use crate::events::{ObjectCreated, S3Event};
use crate::object_key::{Namespace, ObjectKey};
use async_trait::async_trait;
use tracing::{debug, error, warn};

/// A worker stage driven by object-created notifications.
#[async_trait]
pub trait RecordHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Namespaces this stage reacts to; keys elsewhere are ignored.
    fn accepts(&self, namespace: Namespace) -> bool;

    async fn handle_object(&self, bucket: &str, key: &ObjectKey) -> IngestResult<()>;
}

/// Runs every object-created record of an event through `handler`, one at a
/// time.
///
/// Malformed keys and per-item content failures are logged and skipped so
/// siblings still run. The first transient failure aborts the event so the
/// queue redelivers it.
pub async fn handle_event(handler: &dyn RecordHandler, event: &S3Event) -> IngestResult<()> {
    for record in event.object_created() {
        handle_record(handler, &record).await?;
    }
    Ok(())
}

#[tracing::instrument(
    skip_all,
    fields(
        worker = handler.name(),
        bucket = %record.bucket,
        key = %record.key,
        size = record.size,
        event_time = record.event_time.as_deref(),
    )
)]
async fn handle_record(handler: &dyn RecordHandler, record: &ObjectCreated) -> IngestResult<()> {
    let key = match ObjectKey::parse(&record.key) {
        Ok(key) => key,
        Err(e) => {
            warn!(error = %e, "Skipping record");
            return Ok(());
        }
    };

    if !handler.accepts(key.namespace) {
        debug!(namespace = ?key.namespace, "Key outside this worker's namespace, skipping");
        return Ok(());
    }

    match handler.handle_object(&record.bucket, &key).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_transient() => {
            error!(error = %e, "Transient failure, aborting event for redelivery");
            Err(e)
        }
        Err(e) => {
            warn!(error = %e, "Record failed permanently, skipping");
            Ok(())
        }
    }
}
