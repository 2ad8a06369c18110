use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::capsule::Capsule;
use crate::storage::FallbackStore;
use crate::utils::datetime::{now_millis, parse_unlock_date};

/// An uploaded attachment already buffered by the transport layer.
pub struct Upload {
    pub filename: String,
    pub mimetype: String,
    pub bytes: Vec<u8>,
}

/// File metadata as presented to clients. `url` stays empty until the owning
/// capsule is unlocked.
#[derive(Serialize, Debug)]
pub struct FileView {
    pub id: i64,
    pub original_name: String,
    pub url: Option<String>,
    pub mimetype: String,
}

#[derive(Serialize, Debug)]
pub struct CapsuleDetail {
    pub capsule: Capsule,
    pub files: Vec<FileView>,
    pub unlocked: bool,
}

/// Business logic over the fallback store: create capsules with attachments,
/// fetch detail with unlock-aware URL resolution, manual unlock.
pub struct CapsuleService {
    store: Arc<FallbackStore>,
}

impl CapsuleService {
    pub fn new(store: Arc<FallbackStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        title: &str,
        owner: &str,
        unlock_date: &str,
        message: &str,
        attachments: Vec<Upload>,
    ) -> Result<Capsule, AppError> {
        let unlock_ts = parse_unlock_date(unlock_date)?;
        let capsule = self.store.insert_capsule(title, owner, unlock_ts, message).await?;

        for upload in attachments {
            let stored_name = format!("{}_{}", Uuid::new_v4(), upload.filename.replace(' ', "_"));
            let blob = self
                .store
                .store_attachment(capsule.id, &stored_name, &upload.bytes, &upload.mimetype)
                .await?;
            self.store
                .add_file_record(capsule.id, &blob.storage_path, &upload.filename, &upload.mimetype)
                .await?;
        }

        Ok(capsule)
    }

    pub async fn list(&self, owner: &str) -> Result<Vec<Capsule>, AppError> {
        self.store.list_capsules(owner).await
    }

    pub async fn detail(&self, id: i64) -> Result<CapsuleDetail, AppError> {
        let (capsule, records) = self
            .store
            .get_capsule(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Capsule {} not found", id)))?;

        // Visibility derives from the clock, not from whether the scheduler
        // has flipped the flag yet.
        let unlocked = capsule.is_unlocked || now_millis() >= capsule.unlock_date;

        let files = records
            .into_iter()
            .map(|record| {
                let url = if unlocked {
                    Some(self.store.file_url(&record.storage_path))
                } else {
                    None
                };
                FileView {
                    id: record.id,
                    original_name: record.original_name,
                    url,
                    mimetype: record.mimetype,
                }
            })
            .collect();

        Ok(CapsuleDetail { capsule, files, unlocked })
    }

    pub async fn manual_unlock(&self, id: i64) -> Result<Capsule, AppError> {
        self.store
            .unlock_capsule(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Capsule {} not found", id)))
    }
}
