#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use ingest::database::MetadataStore;
use ingest::error::{ContentError, IngestError, IngestResult};
use ingest::models::{
    ContentItem, ContentRow, PhotoMetadata, ProcessedContent, UploadBatch, UploadStatus,
};
use ingest::object_store::ObjectStore;
use ingest::queue::{NotificationQueue, QueueMessage};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// Object store kept in a map keyed by `(bucket, key)`.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    unavailable: AtomicBool,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, data: Vec<u8>, content_type: &str) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: Bytes::from(data),
                content_type: Some(content_type.to_string()),
            },
        );
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Makes every call fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> IngestResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IngestError::ObjectStore("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> IngestResult<Bytes> {
        self.check_available()?;
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.object(bucket, key)
            .map(|object| object.data)
            .ok_or_else(|| ContentError::ObjectMissing(key.to_string()).into())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> IngestResult<()> {
        self.check_available()?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: body,
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }

    async fn copy_object(
        &self,
        bucket: &str,
        from_key: &str,
        to_key: &str,
        content_type: &str,
    ) -> IngestResult<()> {
        self.check_available()?;
        let source = self
            .object(bucket, from_key)
            .ok_or_else(|| IngestError::ObjectStore(format!("NoSuchKey: {from_key}")))?;
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), to_key.to_string()),
            StoredObject {
                data: source.data,
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }
}

/// Metadata store with the same guarded-update semantics as the SQL one.
#[derive(Default)]
pub struct MemoryMetadataStore {
    uploads: Mutex<HashMap<String, UploadBatch>>,
    contents: Mutex<HashMap<String, ContentRow>>,
    photos: Mutex<HashMap<String, PhotoMetadata>>,
    completion_writes: AtomicUsize,
    stale_reads: AtomicBool,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_upload(&self, batch_id: &str, photo_count: i64) {
        self.uploads.lock().unwrap().insert(
            batch_id.to_string(),
            UploadBatch {
                batch_id: batch_id.to_string(),
                album_id: "album-1".to_string(),
                uploader_id: "user-1".to_string(),
                photo_count,
                video_count: 0,
                status: UploadStatus::Pending,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        );
    }

    pub fn add_content(&self, batch_id: &str, content_id: &str, raw_key: &str) {
        self.contents.lock().unwrap().insert(
            content_id.to_string(),
            ContentRow {
                content_id: content_id.to_string(),
                upload_id: batch_id.to_string(),
                album_id: "album-1".to_string(),
                kind: "image".to_string(),
                content_hash: None,
                raw_key: raw_key.to_string(),
                verified_key: None,
                mime_type: None,
                thumbnail_key: None,
                file_size: None,
                taken_at: None,
                error_message: None,
                processed_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                width: None,
                height: None,
            },
        );
    }

    pub fn row(&self, content_id: &str) -> Option<ContentRow> {
        self.contents.lock().unwrap().get(content_id).cloned()
    }

    pub fn photo(&self, content_id: &str) -> Option<PhotoMetadata> {
        self.photos.lock().unwrap().get(content_id).cloned()
    }

    pub fn photo_count(&self) -> usize {
        self.photos.lock().unwrap().len()
    }

    pub fn upload_status(&self, batch_id: &str) -> Option<UploadStatus> {
        self.uploads.lock().unwrap().get(batch_id).map(|u| u.status)
    }

    pub fn completion_writes(&self) -> usize {
        self.completion_writes.load(Ordering::SeqCst)
    }

    /// Reads report every item as still pending, as a lagging replica would.
    pub fn set_stale_reads(&self, stale: bool) {
        self.stale_reads.store(stale, Ordering::SeqCst);
    }

    fn item(&self, row: &ContentRow) -> ContentItem {
        let mut row = row.clone();
        if self.stale_reads.load(Ordering::SeqCst) {
            row.thumbnail_key = None;
            row.error_message = None;
            row.processed_at = None;
        }
        if let Some(photo) = self.photo(&row.content_id) {
            row.width = Some(i64::from(photo.width));
            row.height = Some(i64::from(photo.height));
        }
        ContentItem::try_from(row).unwrap()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn find_content(&self, content_id: &str) -> IngestResult<Option<ContentItem>> {
        Ok(self.row(content_id).map(|row| self.item(&row)))
    }

    async fn find_content_by_raw_key(&self, raw_key: &str) -> IngestResult<Option<ContentItem>> {
        let row = self
            .contents
            .lock()
            .unwrap()
            .values()
            .find(|row| row.raw_key == raw_key)
            .cloned();
        Ok(row.map(|row| self.item(&row)))
    }

    async fn mark_verified(
        &self,
        raw_key: &str,
        verified_key: &str,
        mime_type: &str,
    ) -> IngestResult<u64> {
        let mut updated = 0;
        for row in self.contents.lock().unwrap().values_mut() {
            if row.raw_key == raw_key {
                row.verified_key = Some(verified_key.to_string());
                row.mime_type = Some(mime_type.to_string());
                row.updated_at = Utc::now();
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn record_failure(&self, content_id: &str, message: &str) -> IngestResult<bool> {
        let mut contents = self.contents.lock().unwrap();
        match contents.get_mut(content_id) {
            Some(row) if row.processed_at.is_none() => {
                row.error_message = Some(message.to_string());
                row.processed_at = Some(Utc::now());
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_processing(
        &self,
        content_id: &str,
        processed: &ProcessedContent,
    ) -> IngestResult<bool> {
        {
            let mut contents = self.contents.lock().unwrap();
            let Some(row) = contents.get_mut(content_id) else {
                return Ok(false);
            };
            if row.error_message.is_some() {
                return Ok(false);
            }
            row.thumbnail_key = Some(processed.thumbnail_key.clone());
            row.file_size = Some(processed.file_size);
            row.taken_at = processed.taken_at;
            row.processed_at = row.processed_at.or_else(|| Some(Utc::now()));
            row.updated_at = Utc::now();
        }
        self.photos
            .lock()
            .unwrap()
            .insert(content_id.to_string(), processed.photo.clone());
        Ok(true)
    }

    async fn find_upload(&self, batch_id: &str) -> IngestResult<Option<UploadBatch>> {
        Ok(self.uploads.lock().unwrap().get(batch_id).cloned())
    }

    async fn count_processed(&self, batch_id: &str) -> IngestResult<i64> {
        Ok(self
            .contents
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.upload_id == batch_id && row.processed_at.is_some())
            .count() as i64)
    }

    async fn mark_upload_completed(&self, batch_id: &str) -> IngestResult<()> {
        if let Some(upload) = self.uploads.lock().unwrap().get_mut(batch_id) {
            upload.status = UploadStatus::Completed;
            upload.updated_at = Utc::now();
        }
        self.completion_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_contents(&self, batch_id: &str) -> IngestResult<Vec<ContentItem>> {
        let rows: Vec<ContentRow> = self
            .contents
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.upload_id == batch_id)
            .cloned()
            .collect();
        Ok(rows.iter().map(|row| self.item(row)).collect())
    }
}

/// Queue that hands out queued messages and records acknowledgements.
#[derive(Default)]
pub struct MemoryQueue {
    pending: Mutex<VecDeque<QueueMessage>>,
    acknowledged: Mutex<Vec<String>>,
    receive_failures: AtomicUsize,
    largest_batch: AtomicUsize,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: QueueMessage) {
        self.pending.lock().unwrap().push_back(message);
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }

    /// Most messages handed out by a single receive call.
    pub fn largest_batch(&self) -> usize {
        self.largest_batch.load(Ordering::SeqCst)
    }

    /// The next `count` receive calls fail.
    pub fn fail_receives(&self, count: usize) {
        self.receive_failures.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationQueue for MemoryQueue {
    async fn receive(&self, limit: usize) -> IngestResult<Vec<QueueMessage>> {
        if self
            .receive_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(IngestError::Queue("throttled".to_string()));
        }

        let batch: Vec<QueueMessage> = {
            let mut pending = self.pending.lock().unwrap();
            let take = pending.len().min(limit).min(10);
            pending.drain(..take).collect()
        };
        self.largest_batch.fetch_max(batch.len(), Ordering::SeqCst);

        if batch.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(batch)
    }

    async fn acknowledge(&self, receipt_handle: &str) -> IngestResult<()> {
        self.acknowledged
            .lock()
            .unwrap()
            .push(receipt_handle.to_string());
        Ok(())
    }
}
