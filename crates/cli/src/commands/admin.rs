//! Administrator account management.
//!
//! Administrators cannot register through the API, so they are created here.
//!
//! # Environment Variables
//!
//! - `NOWASTE_DATABASE_URL` - `PostgreSQL` connection string
//! - `NOWASTE_ADMIN_PASSWORD` - Initial password for the new account

use std::sync::Arc;

use nowaste_core::{Email, EmailError, Role, UserId};
use nowaste_server::db::{PgIdentityStore, PgProfileStore};
use nowaste_server::services::{AuthError, AuthService};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use super::{DatabaseError, connect};

/// Environment variable holding the initial password.
const PASSWORD_VAR: &str = "NOWASTE_ADMIN_PASSWORD";

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Account creation failed.
    #[error("Could not create admin: {0}")]
    Auth(#[from] AuthError),
}

/// Create a new administrator account.
///
/// # Returns
///
/// The ID of the created account.
pub async fn create_user(email: &str, name: &str) -> Result<UserId, AdminError> {
    dotenvy::dotenv().ok();

    let email = Email::parse(email)?;
    let password = std::env::var(PASSWORD_VAR)
        .map(SecretString::from)
        .map_err(|_| AdminError::MissingEnvVar(PASSWORD_VAR))?;

    let pool = connect().await?;
    let auth = AuthService::new(
        Arc::new(PgIdentityStore::new(pool.clone())),
        Arc::new(PgProfileStore::new(pool)),
    );

    tracing::info!("Creating admin user: {}", email);
    let user = auth
        .create_account(name, &email, password.expose_secret(), Role::Admin)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}
