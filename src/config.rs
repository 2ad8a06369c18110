use std::env;

/// Runtime settings, read once at startup. `main` loads `.env` via dotenv
/// before calling `from_env`, so both real environment variables and the
/// dotfile work.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Absent means the remote backend is never
    /// constructed and the process runs on the local store alone.
    pub database_url: Option<String>,
    pub aws_region: Option<String>,
    /// Bucket holding remote attachment objects.
    pub storage_bucket: String,
    /// Directory for locally stored attachments.
    pub upload_dir: String,
    /// Path of the single-file fallback store.
    pub local_db_path: String,
    /// Unlock scheduler polling interval.
    pub check_interval_seconds: u64,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            aws_region: env::var("AWS_REGION").ok(),
            storage_bucket: env::var("STORAGE_BUCKET").unwrap_or_else(|_| "capsules".to_string()),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            local_db_path: env::var("LOCAL_DB_PATH").unwrap_or_else(|_| "./local_db.json".to_string()),
            check_interval_seconds: env::var("CHECK_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
        }
    }
}
