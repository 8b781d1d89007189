//! Object store access used by the workers.

use crate::error::{ContentError, IngestError, IngestResult};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::MetadataDirective;
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, info};

/// Characters left as-is when building a copy source; everything else is
/// percent-encoded.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads the whole object. A missing object is a content error, any
    /// other failure is transient.
    async fn get_object(&self, bucket: &str, key: &str) -> IngestResult<Bytes>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> IngestResult<()>;

    /// Server-side copy that replaces the object's content-type metadata.
    async fn copy_object(
        &self,
        bucket: &str,
        from_key: &str,
        to_key: &str,
        content_type: &str,
    ) -> IngestResult<()>;
}

#[derive(Clone)]
pub struct S3ObjectStore {
    s3_client: Client,
}

impl S3ObjectStore {
    pub fn new(s3_client: Client) -> Self {
        Self { s3_client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> IngestResult<Bytes> {
        debug!(bucket, key, "Fetching object");

        let response = match self
            .s3_client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(SdkError::ServiceError(err)) if matches!(err.err(), GetObjectError::NoSuchKey(_)) => {
                return Err(ContentError::ObjectMissing(key.to_string()).into());
            }
            Err(e) => return Err(IngestError::ObjectStore(e.to_string())),
        };

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| IngestError::ObjectStore(format!("reading body of {key}: {e}")))?;

        Ok(data.into_bytes())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> IngestResult<()> {
        info!(bucket, key, size = body.len(), "Uploading object");

        self.s3_client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| IngestError::ObjectStore(e.to_string()))?;

        Ok(())
    }

    async fn copy_object(
        &self,
        bucket: &str,
        from_key: &str,
        to_key: &str,
        content_type: &str,
    ) -> IngestResult<()> {
        let copy_source = format!("{}/{}", bucket, utf8_percent_encode(from_key, COPY_SOURCE));

        self.s3_client
            .copy_object()
            .bucket(bucket)
            .copy_source(&copy_source)
            .key(to_key)
            .content_type(content_type)
            .metadata_directive(MetadataDirective::Replace)
            .send()
            .await
            .map_err(|e| IngestError::ObjectStore(e.to_string()))?;

        info!(from_key, to_key, content_type, "Copied object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_source_encoding_keeps_path_separators() {
        let encoded = utf8_percent_encode("raws/u 1/c+1.jpg", COPY_SOURCE).to_string();
        assert_eq!(encoded, "raws/u%201/c%2B1.jpg");
    }
}
