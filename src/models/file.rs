use serde::{Deserialize, Serialize};

/// Metadata row for one uploaded attachment. `storage_path` is only
/// resolvable through the backend that wrote it: an object key for the
/// remote store, a filesystem path for the local one.
#[derive(sqlx::FromRow, Serialize, Deserialize, Clone, Debug)]
pub struct FileRecord {
    pub id: i64,
    pub capsule_id: i64,
    pub storage_path: String,
    pub original_name: String,
    pub mimetype: String,
}

#[derive(Clone, Debug)]
pub struct NewFileRecord {
    pub capsule_id: i64,
    pub storage_path: String,
    pub original_name: String,
    pub mimetype: String,
}
