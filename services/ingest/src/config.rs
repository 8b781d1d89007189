//! Service settings.
//!
//! Layered from built-in defaults, an optional `ingest.toml` in the working
//! directory, and `INGEST__`-prefixed environment variables such as
//! `INGEST__QUEUE__URL` or `INGEST__AWS__ENDPOINT_URL`.

use crate::object_key::Namespace;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use common::database::DatabaseConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRole {
    Verifier,
    Processor,
}

/// Which content namespace the processor reacts to. One bucket notification
/// usually feeds both `raws/` and `verified/raws/` to the same queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceNamespace {
    Raw,
    #[default]
    Verified,
    Any,
}

impl SourceNamespace {
    pub fn accepts(&self, namespace: Namespace) -> bool {
        match self {
            SourceNamespace::Raw => namespace == Namespace::Raw,
            SourceNamespace::Verified => namespace == Namespace::Verified,
            SourceNamespace::Any => matches!(namespace, Namespace::Raw | Namespace::Verified),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AwsSettings {
    pub region: String,
    /// Override for S3/SQS-compatible local stacks.
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    pub url: String,
    pub max_messages: i32,
    pub wait_time_seconds: i32,
    pub poll_error_backoff_ms: u64,
    pub concurrency: usize,
}

impl QueueSettings {
    pub fn poll_error_backoff(&self) -> Duration {
        Duration::from_millis(self.poll_error_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    pub role: WorkerRole,
    /// Processor only; the verifier always reads `raws/`.
    pub source_namespace: SourceNamespace,
    /// Process this event file once instead of polling the queue.
    pub event_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub aws: AwsSettings,
    pub database: DatabaseConfig,
    pub queue: QueueSettings,
    pub worker: WorkerSettings,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let database = DatabaseConfig::from_env()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        let settings: Settings = Config::builder()
            .set_default("aws.region", "ap-northeast-1")?
            .set_default("database.database_url", database.database_url)?
            .set_default("database.max_connections", i64::from(database.max_connections))?
            .set_default("queue.url", "")?
            .set_default("queue.max_messages", 10)?
            .set_default("queue.wait_time_seconds", 20)?
            .set_default("queue.poll_error_backoff_ms", 5000)?
            .set_default("queue.concurrency", 4)?
            .set_default("worker.role", "processor")?
            .set_default("worker.source_namespace", "verified")?
            .add_source(File::with_name("ingest").required(false))
            .add_source(
                Environment::with_prefix("INGEST")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.event_file.is_none() && self.queue.url.trim().is_empty() {
            return Err(ConfigError::Message(
                "queue.url is required unless worker.event_file is set".to_string(),
            ));
        }
        if self.queue.concurrency == 0 {
            return Err(ConfigError::Message(
                "queue.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl AwsSettings {
    /// Shared SDK configuration; static credentials are used only when both
    /// halves are configured, otherwise the default provider chain applies.
    pub async fn sdk_config(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()));

        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&self.access_key_id, &self.secret_access_key)
        {
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "ingest-settings",
            ));
        }

        loader.load().await
    }

    pub fn s3_client(&self, sdk_config: &SdkConfig) -> aws_sdk_s3::Client {
        let config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(self.endpoint_url.is_some())
            .build();
        aws_sdk_s3::Client::from_conf(config)
    }

    pub fn sqs_client(&self, sdk_config: &SdkConfig) -> aws_sdk_sqs::Client {
        aws_sdk_sqs::Client::new(sdk_config)
    }
}
