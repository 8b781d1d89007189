use anyhow::{Context, Result, bail};
use common::database::{health_check, init_pool};
use ingest::config::{Settings, WorkerRole};
use ingest::database::{Database, MetadataStore};
use ingest::events::Envelope;
use ingest::handler::{RecordHandler, handle_event};
use ingest::object_store::{ObjectStore, S3ObjectStore};
use ingest::processor::ContentProcessor;
use ingest::queue::SqsQueue;
use ingest::sqs_poller::SqsPoller;
use ingest::verifier::ContentVerifier;
use std::path::Path;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_max_level(Level::INFO)
        .init();

    let settings = Settings::load().context("failed to load settings")?;
    info!(role = ?settings.worker.role, "Starting content ingestion worker");

    // Initialize database connection
    let pool = init_pool(&settings.database).await?;
    health_check(&pool).await?;
    let database: Arc<dyn MetadataStore> = Arc::new(Database::new(pool));

    // Initialize AWS clients
    let sdk_config = settings.aws.sdk_config().await;
    let store: Arc<dyn ObjectStore> =
        Arc::new(S3ObjectStore::new(settings.aws.s3_client(&sdk_config)));

    let handler: Arc<dyn RecordHandler> = match settings.worker.role {
        WorkerRole::Verifier => Arc::new(ContentVerifier::new(store, database)),
        WorkerRole::Processor => Arc::new(
            ContentProcessor::new(store, database).with_source(settings.worker.source_namespace),
        ),
    };

    if let Some(event_file) = &settings.worker.event_file {
        return invoke_once(handler.as_ref(), event_file).await;
    }

    let queue = SqsQueue::new(
        settings.aws.sqs_client(&sdk_config),
        settings.queue.url.clone(),
        settings.queue.max_messages,
        settings.queue.wait_time_seconds,
    );
    let poller = SqsPoller::new(
        Arc::new(queue),
        handler,
        settings.queue.concurrency,
        settings.queue.poll_error_backoff(),
    );

    poller.run(shutdown_signal()).await?;
    info!("Content ingestion worker stopped");

    Ok(())
}

/// Runs a single event file through the worker, for local testing.
async fn invoke_once(handler: &dyn RecordHandler, event_file: &Path) -> Result<()> {
    let body = tokio::fs::read_to_string(event_file)
        .await
        .with_context(|| format!("failed to read {}", event_file.display()))?;

    match Envelope::decode(&body) {
        Envelope::Direct(event) | Envelope::Wrapped(event) => {
            handle_event(handler, &event).await?;
            info!(file = %event_file.display(), "Event processed");
            Ok(())
        }
        Envelope::Unrecognized(reason) => bail!("unrecognized event file: {reason}"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
