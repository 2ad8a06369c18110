use serde::{Deserialize, Serialize};

/// A stored time capsule. Timestamps are milliseconds since the epoch, the
/// unit the unlock scheduler compares against.
#[derive(sqlx::FromRow, Serialize, Deserialize, Clone, Debug)]
pub struct Capsule {
    pub id: i64,
    pub title: String,
    pub owner: String,
    pub message: String,
    pub unlock_date: i64,
    pub created_at: i64,
    pub is_unlocked: bool,
}

impl Capsule {
    /// Due means the unlock time has passed but the flag has not flipped yet.
    pub fn is_due(&self, now_ts: i64) -> bool {
        !self.is_unlocked && self.unlock_date <= now_ts
    }
}

/// Fields for a capsule that has not been assigned an id by a backend yet.
#[derive(Clone, Debug)]
pub struct NewCapsule {
    pub title: String,
    pub owner: String,
    pub message: String,
    pub unlock_date: i64,
    pub created_at: i64,
}
