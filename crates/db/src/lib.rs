pub mod matches;
pub mod metrics;
pub mod mirror;
pub mod owners;
pub mod sync;

use crmirror_common::error::{CrmirrorError, CrmirrorResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> CrmirrorResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(db_err)
}

/// Apply pending versioned migrations from `crates/db/migrations`.
///
/// Each migration runs once and is recorded in `_sqlx_migrations`.
pub async fn run_migrations(pool: &PgPool) -> CrmirrorResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| CrmirrorError::Database(format!("migration failed: {e}")))?;
    tracing::info!("database migrations applied");
    Ok(())
}

pub(crate) fn db_err(e: sqlx::Error) -> CrmirrorError {
    CrmirrorError::Database(e.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Connect to `TEST_DATABASE_URL` and migrate, or `None` when unset.
    pub async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = create_pool(&url).await.expect("db should connect");
        run_migrations(&pool).await.expect("migrations should apply");
        Some(pool)
    }
}
