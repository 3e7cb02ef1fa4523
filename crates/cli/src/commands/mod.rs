//! CLI command implementations.

pub mod admin;
pub mod ledger;
pub mod migrate;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by commands that need the database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Neither database variable is set.
    #[error("Missing environment variable: NOWASTE_DATABASE_URL (or DATABASE_URL)")]
    MissingUrl,

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connect(#[from] sqlx::Error),
}

/// Connect to the database named by `NOWASTE_DATABASE_URL` or `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, DatabaseError> {
    dotenvy::dotenv().ok();

    let url = std::env::var("NOWASTE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| DatabaseError::MissingUrl)?;

    tracing::info!("Connecting to database...");
    Ok(nowaste_server::db::create_pool(&url).await?)
}
