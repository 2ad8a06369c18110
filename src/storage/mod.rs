pub mod local;
pub mod remote;

use async_trait::async_trait;
use log::warn;

use crate::errors::AppError;
use crate::models::capsule::{Capsule, NewCapsule};
use crate::models::file::{FileRecord, NewFileRecord};
use crate::utils::datetime::now_millis;
use self::local::LocalBackend;
use self::remote::RemoteBackend;

/// Outcome of persisting one attachment blob.
#[derive(Clone, Debug)]
pub struct StoredBlob {
    pub storage_path: String,
    pub url: String,
}

/// Uniform persistence contract implemented by the remote and local backends.
/// One operation per business need; the fallback adapter decides which
/// implementation serves a given call.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    async fn insert_capsule(&self, new: &NewCapsule) -> Result<Capsule, AppError>;
    async fn add_file_record(&self, rec: &NewFileRecord) -> Result<FileRecord, AppError>;
    async fn list_capsules(&self, owner: &str) -> Result<Vec<Capsule>, AppError>;
    async fn get_capsule(&self, id: i64) -> Result<Option<(Capsule, Vec<FileRecord>)>, AppError>;
    async fn due_capsules(&self, now_ts: i64) -> Result<Vec<Capsule>, AppError>;
    async fn unlock_capsule(&self, id: i64) -> Result<Option<Capsule>, AppError>;
    async fn store_attachment(
        &self,
        capsule_id: i64,
        filename: &str,
        bytes: &[u8],
        mimetype: &str,
    ) -> Result<StoredBlob, AppError>;
    fn file_url(&self, storage_path: &str) -> String;
}

/// Tries the remote backend first and retries the same logical operation on
/// the local store when the remote call fails or comes back empty-handed.
/// Remote failures never surface to callers unless the local attempt also
/// fails.
pub struct FallbackStore {
    remote: Option<RemoteBackend>,
    local: LocalBackend,
}

impl FallbackStore {
    pub fn new(remote: Option<RemoteBackend>, local: LocalBackend) -> Self {
        Self { remote, local }
    }

    pub async fn insert_capsule(
        &self,
        title: &str,
        owner: &str,
        unlock_date: i64,
        message: &str,
    ) -> Result<Capsule, AppError> {
        let new = NewCapsule {
            title: title.to_string(),
            owner: owner.to_string(),
            message: message.to_string(),
            unlock_date,
            created_at: now_millis(),
        };
        if let Some(remote) = &self.remote {
            match remote.insert_capsule(&new).await {
                Ok(capsule) => return Ok(capsule),
                Err(e) => warn!("remote capsule insert failed: {}, falling back to local store", e),
            }
        }
        self.local.insert_capsule(&new).await
    }

    pub async fn add_file_record(
        &self,
        capsule_id: i64,
        storage_path: &str,
        original_name: &str,
        mimetype: &str,
    ) -> Result<FileRecord, AppError> {
        let rec = NewFileRecord {
            capsule_id,
            storage_path: storage_path.to_string(),
            original_name: original_name.to_string(),
            mimetype: mimetype.to_string(),
        };
        if let Some(remote) = &self.remote {
            match remote.add_file_record(&rec).await {
                Ok(record) => return Ok(record),
                Err(e) => warn!("remote file insert failed: {}, falling back to local store", e),
            }
        }
        self.local.add_file_record(&rec).await
    }

    pub async fn list_capsules(&self, owner: &str) -> Result<Vec<Capsule>, AppError> {
        if let Some(remote) = &self.remote {
            match remote.list_capsules(owner).await {
                Ok(capsules) => return Ok(capsules),
                Err(e) => warn!("remote list failed: {}, falling back to local store", e),
            }
        }
        self.local.list_capsules(owner).await
    }

    /// A capsule the remote store has never seen may still exist locally
    /// (written during an earlier outage), so remote "not found" also falls
    /// through to the local lookup.
    pub async fn get_capsule(&self, id: i64) -> Result<Option<(Capsule, Vec<FileRecord>)>, AppError> {
        if let Some(remote) = &self.remote {
            match remote.get_capsule(id).await {
                Ok(Some(found)) => return Ok(Some(found)),
                Ok(None) => {}
                Err(e) => warn!("remote get failed: {}, falling back to local store", e),
            }
        }
        self.local.get_capsule(id).await
    }

    pub async fn due_capsules(&self, now_ts: i64) -> Result<Vec<Capsule>, AppError> {
        if let Some(remote) = &self.remote {
            match remote.due_capsules(now_ts).await {
                Ok(capsules) => return Ok(capsules),
                Err(e) => warn!("remote due query failed: {}, falling back to local store", e),
            }
        }
        self.local.due_capsules(now_ts).await
    }

    pub async fn unlock_capsule(&self, id: i64) -> Result<Option<Capsule>, AppError> {
        if let Some(remote) = &self.remote {
            match remote.unlock_capsule(id).await {
                Ok(Some(capsule)) => return Ok(Some(capsule)),
                Ok(None) => {}
                Err(e) => warn!("remote unlock failed: {}, falling back to local store", e),
            }
        }
        self.local.unlock_capsule(id).await
    }

    pub async fn store_attachment(
        &self,
        capsule_id: i64,
        filename: &str,
        bytes: &[u8],
        mimetype: &str,
    ) -> Result<StoredBlob, AppError> {
        if let Some(remote) = &self.remote {
            match remote.store_attachment(capsule_id, filename, bytes, mimetype).await {
                Ok(blob) => return Ok(blob),
                Err(e) => warn!("remote attachment upload failed: {}, storing locally", e),
            }
        }
        self.local.store_attachment(capsule_id, filename, bytes, mimetype).await
    }

    /// Storage paths are only resolvable by the backend that wrote them, so
    /// resolution routes on the path's shape: anything under the upload dir
    /// is local, everything else is a remote object key.
    pub fn file_url(&self, storage_path: &str) -> String {
        match &self.remote {
            Some(remote) if !self.local.owns_path(storage_path) => remote.file_url(storage_path),
            _ => self.local.file_url(storage_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn local_only(dir: &TempDir) -> FallbackStore {
        FallbackStore::new(
            None,
            LocalBackend::new(dir.path().join("local_db.json"), dir.path().join("uploads")),
        )
    }

    #[tokio::test]
    async fn insert_without_remote_yields_unique_persisted_capsules() {
        let dir = TempDir::new().unwrap();
        let store = local_only(&dir);

        let first = store
            .insert_capsule("graduation", "alice@example.com", 1_000, "open later")
            .await
            .unwrap();
        let second = store
            .insert_capsule("wedding", "alice@example.com", 2_000, "")
            .await
            .unwrap();
        assert_ne!(first.id, second.id);

        let (read, _) = store.get_capsule(first.id).await.unwrap().unwrap();
        assert_eq!(read.title, "graduation");
        assert_eq!(read.owner, "alice@example.com");
        assert_eq!(read.message, "open later");
        assert_eq!(read.unlock_date, 1_000);
        assert!(!read.is_unlocked);
    }

    #[tokio::test]
    async fn past_capsule_is_due_until_unlocked() {
        let dir = TempDir::new().unwrap();
        let store = local_only(&dir);
        // Unlock date 2020-01-01, "now" far in the future.
        let capsule = store
            .insert_capsule("old", "alice@example.com", 1_577_836_800_000, "")
            .await
            .unwrap();
        let far_future = 4_102_444_800_000;

        let due = store.due_capsules(far_future).await.unwrap();
        assert!(due.iter().any(|c| c.id == capsule.id));

        store.unlock_capsule(capsule.id).await.unwrap().unwrap();

        let due = store.due_capsules(far_future).await.unwrap();
        assert!(due.iter().all(|c| c.id != capsule.id));
        assert!(due.iter().all(|c| !c.is_unlocked));
    }

    #[tokio::test]
    async fn file_url_resolves_local_paths_without_remote() {
        let dir = TempDir::new().unwrap();
        let store = local_only(&dir);
        let blob = store
            .store_attachment(7, "photo.png", b"png-bytes", "image/png")
            .await
            .unwrap();
        assert_eq!(store.file_url(&blob.storage_path), "/uploads/photo.png");
    }
}
