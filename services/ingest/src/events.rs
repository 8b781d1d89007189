//! Object-created notifications and the envelopes they arrive in.
//!
//! A queue message body is either the storage event itself (`Direct`), a
//! notification-service envelope whose `Message` field holds the event as a
//! JSON string (`Wrapped`), or something else (`Unrecognized`). Decoding
//! happens once, at the queue boundary.

use crate::object_key::decode_event_key;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

const OBJECT_CREATED_PREFIX: &str = "ObjectCreated";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3EventRecord {
    #[serde(rename = "eventName", default)]
    pub event_name: String,
    #[serde(rename = "eventTime", default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub s3: Option<S3Entity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Object {
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Canonical, decoded view of one object-created record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectCreated {
    pub bucket: String,
    pub key: String,
    pub size: Option<u64>,
    pub event_time: Option<String>,
}

impl S3Event {
    /// Object-created records with their keys decoded. Other event kinds are
    /// dropped, as are records missing their bucket/object payload.
    pub fn object_created(&self) -> Vec<ObjectCreated> {
        self.records
            .iter()
            .filter(|record| record.event_name.starts_with(OBJECT_CREATED_PREFIX))
            .filter_map(|record| match &record.s3 {
                Some(entity) => Some(ObjectCreated {
                    bucket: entity.bucket.name.clone(),
                    key: decode_event_key(&entity.object.key),
                    size: entity.object.size,
                    event_time: record.event_time.clone(),
                }),
                None => {
                    warn!(event_name = %record.event_name, "Record without s3 payload, skipping");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum Envelope {
    Direct(S3Event),
    Wrapped(S3Event),
    Unrecognized(String),
}

impl Envelope {
    pub fn decode(body: &str) -> Self {
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => return Envelope::Unrecognized(format!("invalid JSON: {e}")),
        };

        if value.get("Records").is_some() {
            return match serde_json::from_value::<S3Event>(value) {
                Ok(event) => Envelope::Direct(event),
                Err(e) => Envelope::Unrecognized(format!("invalid event records: {e}")),
            };
        }

        if let Some(message) = value.get("Message").and_then(Value::as_str) {
            return match Self::decode(message) {
                Envelope::Direct(event) | Envelope::Wrapped(event) => Envelope::Wrapped(event),
                Envelope::Unrecognized(reason) => {
                    Envelope::Unrecognized(format!("wrapped message: {reason}"))
                }
            };
        }

        let hint = value
            .get("Event")
            .and_then(Value::as_str)
            .unwrap_or("unknown shape");
        Envelope::Unrecognized(hint.to_string())
    }

    pub fn event(&self) -> Option<&S3Event> {
        match self {
            Envelope::Direct(event) | Envelope::Wrapped(event) => Some(event),
            Envelope::Unrecognized(_) => None,
        }
    }
}
