use crate::error::{IngestError, IngestResult};
use crate::models::{
    ContentItem, ContentRow, ProcessedContent, UploadBatch, UploadBatchRow, UploadStatus,
};
use async_trait::async_trait;
use common::error::DatabaseError;
use sqlx::{PgPool, Row};

/// Operations the pipeline performs against the metadata store.
///
/// Every write sets absolute values and is guarded so that a terminal item
/// never changes terminal state, which keeps redelivered messages harmless.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn find_content(&self, content_id: &str) -> IngestResult<Option<ContentItem>>;

    async fn find_content_by_raw_key(&self, raw_key: &str) -> IngestResult<Option<ContentItem>>;

    /// Records the verified copy for the item owning `raw_key`. Returns the
    /// number of rows updated.
    async fn mark_verified(
        &self,
        raw_key: &str,
        verified_key: &str,
        mime_type: &str,
    ) -> IngestResult<u64>;

    /// Marks a non-terminal item as failed. Returns false when the item was
    /// missing or already terminal.
    async fn record_failure(&self, content_id: &str, message: &str) -> IngestResult<bool>;

    /// Atomically stores the thumbnail outcome and upserts the photo row.
    /// Returns false, writing nothing, when the item is missing or failed.
    async fn complete_processing(
        &self,
        content_id: &str,
        processed: &ProcessedContent,
    ) -> IngestResult<bool>;

    async fn find_upload(&self, batch_id: &str) -> IngestResult<Option<UploadBatch>>;

    /// Number of items in the batch that reached a terminal state.
    async fn count_processed(&self, batch_id: &str) -> IngestResult<i64>;

    async fn mark_upload_completed(&self, batch_id: &str) -> IngestResult<()>;

    async fn list_contents(&self, batch_id: &str) -> IngestResult<Vec<ContentItem>>;
}

const CONTENT_COLUMNS: &str = r#"
    c.content_id, c.upload_id, c.album_id, c.kind, c.content_hash, c.raw_key,
    c.verified_key, c.mime_type, c.thumbnail_key, c.file_size, c.taken_at,
    c.error_message, c.processed_at, c.created_at, c.updated_at,
    p.width, p.height
"#;

fn query_error(e: sqlx::Error) -> IngestError {
    DatabaseError::Query(e).into()
}

fn invalid_row(e: String) -> IngestError {
    DatabaseError::InvalidRow(e).into()
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_content(&self, column: &str, value: &str) -> IngestResult<Option<ContentItem>> {
        let sql = format!(
            "SELECT {CONTENT_COLUMNS} FROM contents c
             LEFT JOIN photos p ON p.content_id = c.content_id
             WHERE c.{column} = $1"
        );
        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;

        row.map(ContentItem::try_from).transpose().map_err(invalid_row)
    }
}

#[async_trait]
impl MetadataStore for Database {
    async fn find_content(&self, content_id: &str) -> IngestResult<Option<ContentItem>> {
        self.fetch_content("content_id", content_id).await
    }

    async fn find_content_by_raw_key(&self, raw_key: &str) -> IngestResult<Option<ContentItem>> {
        self.fetch_content("raw_key", raw_key).await
    }

    async fn mark_verified(
        &self,
        raw_key: &str,
        verified_key: &str,
        mime_type: &str,
    ) -> IngestResult<u64> {
        let result = sqlx::query(
            "UPDATE contents
             SET verified_key = $2, mime_type = $3, updated_at = NOW()
             WHERE raw_key = $1",
        )
        .bind(raw_key)
        .bind(verified_key)
        .bind(mime_type)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected())
    }

    async fn record_failure(&self, content_id: &str, message: &str) -> IngestResult<bool> {
        let result = sqlx::query(
            "UPDATE contents
             SET error_message = $2, processed_at = NOW(), updated_at = NOW()
             WHERE content_id = $1 AND processed_at IS NULL",
        )
        .bind(content_id)
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn complete_processing(
        &self,
        content_id: &str,
        processed: &ProcessedContent,
    ) -> IngestResult<bool> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Transaction)?;

        let updated = sqlx::query(
            "UPDATE contents
             SET thumbnail_key = $2, file_size = $3, taken_at = $4,
                 processed_at = COALESCE(processed_at, NOW()), updated_at = NOW()
             WHERE content_id = $1 AND error_message IS NULL",
        )
        .bind(content_id)
        .bind(&processed.thumbnail_key)
        .bind(processed.file_size)
        .bind(processed.taken_at)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(DatabaseError::Transaction)?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO photos (content_id, width, height, exif)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (content_id) DO UPDATE SET
             width = EXCLUDED.width,
             height = EXCLUDED.height,
             exif = EXCLUDED.exif,
             updated_at = NOW()",
        )
        .bind(content_id)
        .bind(i64::from(processed.photo.width))
        .bind(i64::from(processed.photo.height))
        .bind(&processed.photo.exif)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        tx.commit().await.map_err(DatabaseError::Transaction)?;
        Ok(true)
    }

    async fn find_upload(&self, batch_id: &str) -> IngestResult<Option<UploadBatch>> {
        let row = sqlx::query_as::<_, UploadBatchRow>(
            "SELECT upload_id, album_id, uploader_id, photo_count, video_count, status,
                    created_at, updated_at
             FROM uploads WHERE upload_id = $1",
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        row.map(UploadBatch::try_from).transpose().map_err(invalid_row)
    }

    async fn count_processed(&self, batch_id: &str) -> IngestResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS processed FROM contents
             WHERE upload_id = $1 AND processed_at IS NOT NULL",
        )
        .bind(batch_id)
        .fetch_one(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(row.get("processed"))
    }

    async fn mark_upload_completed(&self, batch_id: &str) -> IngestResult<()> {
        sqlx::query("UPDATE uploads SET status = $2, updated_at = NOW() WHERE upload_id = $1")
            .bind(batch_id)
            .bind(UploadStatus::Completed.as_str())
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        Ok(())
    }

    async fn list_contents(&self, batch_id: &str) -> IngestResult<Vec<ContentItem>> {
        let sql = format!(
            "SELECT {CONTENT_COLUMNS} FROM contents c
             LEFT JOIN photos p ON p.content_id = c.content_id
             WHERE c.upload_id = $1
             ORDER BY c.created_at"
        );
        let rows = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        rows.into_iter()
            .map(ContentItem::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid_row)
    }
}
