//! Database migration command.
//!
//! Applies `crates/server/migrations/` and creates the session table used by
//! `tower-sessions-sqlx-store`.

use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;

use super::{DatabaseError, connect};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session table error: {0}")]
    Sessions(#[from] sqlx::Error),
}

/// Run all migrations.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running schema migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
