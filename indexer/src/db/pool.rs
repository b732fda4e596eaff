//! The process-wide `diesel` r2d2 pool (§5: "database pool ... process-wide
//! singleton, created at indexer boot, destroyed during termination").
//!
//! `diesel::PgConnection` is synchronous, so every call into it from the
//! async `IndexerLoop` goes through `spawn_blocking`.

use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use thiserror::Error;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database pool exhausted or misconfigured: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("blocking task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("migration failed: {0}")]
    Migration(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Builds the process-wide pool and runs any pending `diesel_migrations`
/// migrations (the tables in `db/schema.rs`) before returning it.
pub fn build_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(max_connections)
        .build(manager)
        .map_err(DbError::from)?;

    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(DbError::from)?;

    Ok(pool)
}

/// Runs a synchronous `diesel` closure on the blocking thread pool with a
/// connection checked out from `pool`.
pub async fn run_blocking<F, T>(pool: DbPool, f: F) -> Result<T, DbError>
where
    F: FnOnce(&mut PgConnection) -> diesel::QueryResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn).map_err(DbError::from)
    })
    .await?
}
