use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Build a lazily-connecting pool. Construction never touches the network;
/// an unreachable database surfaces per-operation, where the fallback store
/// takes over.
pub fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy(database_url)
}
