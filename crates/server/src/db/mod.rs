//! Persistence for identities, profiles and the pickup request ledger.
//!
//! # Schema: `nowaste`
//!
//! ## Tables
//!
//! - `identity` - Sign-in email and Argon2 password hash
//! - `profile` - Display name, contact email and role, keyed by identity id
//! - `pickup_request` - The request ledger (one row per request)
//! - `tower_sessions.session` - Session storage (created by the session store)
//!
//! Every store has a `PostgreSQL` implementation and an in-memory one
//! ([`memory`]) used when no database is configured and in tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p nowaste-cli -- migrate
//! ```

pub mod identities;
pub mod ledger;
pub mod memory;
pub mod profiles;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use identities::PgIdentityStore;
pub use ledger::{LedgerStore, PgLedgerStore, StatusUpdate};
pub use memory::{MemoryIdentityStore, MemoryLedgerStore, MemoryProfileStore};
pub use profiles::{PgProfileStore, ProfileStore};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_insert(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
