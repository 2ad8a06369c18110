use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::errors::AppError;
use crate::models::capsule::{Capsule, NewCapsule};
use crate::models::file::{FileRecord, NewFileRecord};
use crate::storage::{PersistenceBackend, StoredBlob};

/// On-disk shape of the fallback store: two ordered sequences, read fully and
/// rewritten fully on every mutation.
#[derive(Serialize, Deserialize, Default)]
struct LocalDocument {
    capsules: Vec<Capsule>,
    files: Vec<FileRecord>,
}

/// Single-file store used when the remote backend is unreachable or returns
/// no usable result. The mutex serializes read-modify-write cycles; id
/// assignment (`max + 1`) is unsafe without it.
pub struct LocalBackend {
    db_path: PathBuf,
    upload_dir: PathBuf,
    lock: Mutex<()>,
}

impl LocalBackend {
    pub fn new(db_path: impl Into<PathBuf>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            upload_dir: upload_dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// True when `storage_path` points into this backend's upload directory,
    /// i.e. the blob was written by the local store.
    pub fn owns_path(&self, storage_path: &str) -> bool {
        Path::new(storage_path).starts_with(&self.upload_dir)
    }

    async fn read_document(&self) -> Result<LocalDocument, AppError> {
        if !self.db_path.exists() {
            return Ok(LocalDocument::default());
        }
        let raw = tokio::fs::read_to_string(&self.db_path)
            .await
            .map_err(|e| AppError::Storage(format!("cannot read {}: {}", self.db_path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| AppError::Storage(format!("corrupt local store {}: {}", self.db_path.display(), e)))
    }

    async fn write_document(&self, doc: &LocalDocument) -> Result<(), AppError> {
        let raw = serde_json::to_string(doc)
            .map_err(|e| AppError::Storage(format!("cannot serialize local store: {}", e)))?;
        tokio::fs::write(&self.db_path, raw)
            .await
            .map_err(|e| AppError::Storage(format!("cannot write {}: {}", self.db_path.display(), e)))
    }
}

/// Next id for a collection: `max + 1`, or 1 when empty.
fn next_id<I: Iterator<Item = i64>>(ids: I) -> i64 {
    ids.max().unwrap_or(0) + 1
}

#[async_trait]
impl PersistenceBackend for LocalBackend {
    async fn insert_capsule(&self, new: &NewCapsule) -> Result<Capsule, AppError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        let capsule = Capsule {
            id: next_id(doc.capsules.iter().map(|c| c.id)),
            title: new.title.clone(),
            owner: new.owner.clone(),
            message: new.message.clone(),
            unlock_date: new.unlock_date,
            created_at: new.created_at,
            is_unlocked: false,
        };
        doc.capsules.push(capsule.clone());
        self.write_document(&doc).await?;
        Ok(capsule)
    }

    async fn add_file_record(&self, rec: &NewFileRecord) -> Result<FileRecord, AppError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        let record = FileRecord {
            id: next_id(doc.files.iter().map(|f| f.id)),
            capsule_id: rec.capsule_id,
            storage_path: rec.storage_path.clone(),
            original_name: rec.original_name.clone(),
            mimetype: rec.mimetype.clone(),
        };
        doc.files.push(record.clone());
        self.write_document(&doc).await?;
        Ok(record)
    }

    async fn list_capsules(&self, owner: &str) -> Result<Vec<Capsule>, AppError> {
        let _guard = self.lock.lock().await;
        let doc = self.read_document().await?;
        let mut capsules: Vec<Capsule> = doc
            .capsules
            .into_iter()
            .filter(|c| c.owner == owner)
            .collect();
        capsules.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(capsules)
    }

    async fn get_capsule(&self, id: i64) -> Result<Option<(Capsule, Vec<FileRecord>)>, AppError> {
        let _guard = self.lock.lock().await;
        let doc = self.read_document().await?;
        let capsule = match doc.capsules.into_iter().find(|c| c.id == id) {
            Some(c) => c,
            None => return Ok(None),
        };
        let files = doc
            .files
            .into_iter()
            .filter(|f| f.capsule_id == id)
            .collect();
        Ok(Some((capsule, files)))
    }

    async fn due_capsules(&self, now_ts: i64) -> Result<Vec<Capsule>, AppError> {
        let _guard = self.lock.lock().await;
        let doc = self.read_document().await?;
        Ok(doc
            .capsules
            .into_iter()
            .filter(|c| c.is_due(now_ts))
            .collect())
    }

    async fn unlock_capsule(&self, id: i64) -> Result<Option<Capsule>, AppError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        let capsule = match doc.capsules.iter_mut().find(|c| c.id == id) {
            Some(c) => c,
            None => return Ok(None),
        };
        if capsule.is_unlocked {
            // Already unlocked: no-op success, the flag never reverts.
            return Ok(Some(capsule.clone()));
        }
        capsule.is_unlocked = true;
        let unlocked = capsule.clone();
        self.write_document(&doc).await?;
        Ok(Some(unlocked))
    }

    async fn store_attachment(
        &self,
        _capsule_id: i64,
        filename: &str,
        bytes: &[u8],
        _mimetype: &str,
    ) -> Result<StoredBlob, AppError> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| AppError::Storage(format!("cannot create upload dir: {}", e)))?;
        let dest = self.upload_dir.join(filename);
        tokio::fs::write(&dest, bytes)
            .await
            .map_err(|e| AppError::Storage(format!("cannot write {}: {}", dest.display(), e)))?;
        Ok(StoredBlob {
            storage_path: dest.display().to_string(),
            url: format!("/uploads/{}", filename),
        })
    }

    fn file_url(&self, storage_path: &str) -> String {
        let basename = Path::new(storage_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| storage_path.to_string());
        format!("/uploads/{}", basename)
    }
}
