//! Postgres adapters for the repository ports, plus pool and migration
//! plumbing. All queries are runtime `sqlx::query` with explicit row mapping
//! over one shared pool.

mod launch_cache;
mod outcome_log;
mod progress;

pub use launch_cache::PostgresLaunchCacheRepository;
pub use outcome_log::PostgresOutcomeLogRepository;
pub use progress::PostgresProgressRepository;

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Error as SqlxError, Row};
use tracing::info;

use crate::error::{LtiError, Result};

/// Builds the shared connection pool. `test_before_acquire` trades a ping per
/// checkout for never handing a dead connection to a request handler.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .test_before_acquire(true)
        .connect(database_url)
        .await
        .map_err(|e| LtiError::Internal(format!("Database connection failed: {e}")))?;

    info!(max_connections, "database pool initialized");
    Ok(pool)
}

/// Applies the embedded migrations (see `migrations/` in this crate).
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    crate::MIGRATOR
        .run(pool)
        .await
        .map_err(|e| LtiError::Internal(format!("Migration failed: {e}")))?;
    info!("database migrations applied");
    Ok(())
}

/// Connectivity and privilege checks, run before migrations so an operator
/// sees an actionable GRANT hint instead of a generic permission failure
/// mid-migration.
pub async fn preflight(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e: SqlxError| {
            LtiError::Internal(format!("Database connectivity check failed: {e}"))
        })?;

    let row = sqlx::query(
        r#"
        SELECT
            has_schema_privilege(current_user, 'public', 'USAGE')  AS can_use,
            has_schema_privilege(current_user, 'public', 'CREATE') AS can_create
        "#,
    )
    .fetch_one(pool)
    .await
    .map_err(|e| LtiError::Internal(format!("Privilege preflight failed: {e}")))?;

    let can_use: bool = row
        .try_get("can_use")
        .map_err(|e| LtiError::Internal(format!("Failed to read privilege row: {e}")))?;
    let can_create: bool = row
        .try_get("can_create")
        .map_err(|e| LtiError::Internal(format!("Failed to read privilege row: {e}")))?;

    if !can_use {
        return Err(LtiError::Configuration(
            "current role lacks USAGE on schema public; \
             run: GRANT USAGE ON SCHEMA public TO <role>"
                .to_string(),
        ));
    }
    if !can_create {
        return Err(LtiError::Configuration(
            "current role lacks CREATE on schema public (required for migrations); \
             run: GRANT CREATE ON SCHEMA public TO <role>"
                .to_string(),
        ));
    }

    info!("database preflight passed");
    Ok(())
}
