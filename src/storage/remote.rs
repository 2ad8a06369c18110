use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::capsule::{Capsule, NewCapsule};
use crate::models::file::{FileRecord, NewFileRecord};
use crate::storage::{PersistenceBackend, StoredBlob};

const CAPSULE_COLUMNS: &str = "id, title, owner, message, unlock_date, created_at, is_unlocked";

/// Authoritative backend: Postgres rows plus S3 attachment objects. Every
/// failure is reported as an error for the fallback adapter to downgrade;
/// nothing here retries or falls back on its own.
pub struct RemoteBackend {
    pool: PgPool,
    s3: S3Client,
    bucket: String,
}

impl RemoteBackend {
    pub fn new(pool: PgPool, s3: S3Client, bucket: String) -> Self {
        Self { pool, s3, bucket }
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.bucket, key)
    }
}

#[async_trait]
impl PersistenceBackend for RemoteBackend {
    async fn insert_capsule(&self, new: &NewCapsule) -> Result<Capsule, AppError> {
        // fetch_one errors when the insert returns no row, which the adapter
        // treats like any other remote failure.
        sqlx::query_as::<_, Capsule>(&format!(
            "INSERT INTO capsules (title, owner, message, unlock_date, created_at, is_unlocked)
             VALUES ($1, $2, $3, $4, $5, FALSE)
             RETURNING {}",
            CAPSULE_COLUMNS
        ))
        .bind(&new.title)
        .bind(&new.owner)
        .bind(&new.message)
        .bind(new.unlock_date)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn add_file_record(&self, rec: &NewFileRecord) -> Result<FileRecord, AppError> {
        sqlx::query_as::<_, FileRecord>(
            "INSERT INTO files (capsule_id, storage_path, original_name, mimetype)
             VALUES ($1, $2, $3, $4)
             RETURNING id, capsule_id, storage_path, original_name, mimetype",
        )
        .bind(rec.capsule_id)
        .bind(&rec.storage_path)
        .bind(&rec.original_name)
        .bind(&rec.mimetype)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_capsules(&self, owner: &str) -> Result<Vec<Capsule>, AppError> {
        sqlx::query_as::<_, Capsule>(&format!(
            "SELECT {} FROM capsules WHERE owner = $1 ORDER BY created_at DESC",
            CAPSULE_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_capsule(&self, id: i64) -> Result<Option<(Capsule, Vec<FileRecord>)>, AppError> {
        let capsule = sqlx::query_as::<_, Capsule>(&format!(
            "SELECT {} FROM capsules WHERE id = $1",
            CAPSULE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let capsule = match capsule {
            Some(c) => c,
            None => return Ok(None),
        };

        let files = sqlx::query_as::<_, FileRecord>(
            "SELECT id, capsule_id, storage_path, original_name, mimetype
             FROM files WHERE capsule_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Some((capsule, files)))
    }

    async fn due_capsules(&self, now_ts: i64) -> Result<Vec<Capsule>, AppError> {
        sqlx::query_as::<_, Capsule>(&format!(
            "SELECT {} FROM capsules WHERE is_unlocked = FALSE AND unlock_date <= $1",
            CAPSULE_COLUMNS
        ))
        .bind(now_ts)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn unlock_capsule(&self, id: i64) -> Result<Option<Capsule>, AppError> {
        // Conditional one-way flip; unlocking an already-unlocked capsule
        // rewrites TRUE over TRUE and stays a success.
        sqlx::query_as::<_, Capsule>(&format!(
            "UPDATE capsules SET is_unlocked = TRUE WHERE id = $1 RETURNING {}",
            CAPSULE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn store_attachment(
        &self,
        capsule_id: i64,
        filename: &str,
        bytes: &[u8],
        mimetype: &str,
    ) -> Result<StoredBlob, AppError> {
        let key = format!("{}/{}", capsule_id, filename);
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(mimetype)
            .body(bytes.to_vec().into())
            .send()
            .await
            .map_err(|e| AppError::ObjectStore(e.to_string()))?;

        Ok(StoredBlob {
            url: self.public_url(&key),
            storage_path: key,
        })
    }

    fn file_url(&self, storage_path: &str) -> String {
        self.public_url(storage_path)
    }
}
