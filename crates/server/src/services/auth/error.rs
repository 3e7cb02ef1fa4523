//! Authentication error types.

use thiserror::Error;

use nowaste_core::{EmailError, ValidationErrors};

use crate::db::RepositoryError;
use crate::services::identity::IdentityError;

/// Errors that can occur during authentication operations.
///
/// The `Display` text of the user-facing variants is shown to clients as is.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("Please enter a valid email address.")]
    InvalidEmail(#[from] EmailError),

    /// Invalid credentials (wrong password or unknown email).
    #[error("Invalid email or password.")]
    InvalidCredentials,

    /// Another account already uses this email.
    #[error("An account with this email already exists. Please login instead.")]
    EmailAlreadyInUse,

    /// Password does not meet requirements.
    #[error("Password is too weak. Please choose a stronger password.")]
    WeakPassword(String),

    /// Form fields failed validation.
    #[error(transparent)]
    Validation(ValidationErrors),

    /// The identity was created but its profile could not be written.
    #[error("Account created but profile setup failed. Please contact support.")]
    ProfileSetupFailed(#[source] RepositoryError),

    /// The identity provider could not end the session.
    #[error("sign-out failed: {0}")]
    SignOutFailed(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<IdentityError> for AuthError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::EmailAlreadyInUse => Self::EmailAlreadyInUse,
            IdentityError::InvalidCredentials | IdentityError::NotFound => {
                Self::InvalidCredentials
            }
            IdentityError::SignOutFailed(reason) => Self::SignOutFailed(reason),
            IdentityError::PasswordHash => Self::PasswordHash,
            IdentityError::Repository(e) => Self::Repository(e),
        }
    }
}

impl From<ValidationErrors> for AuthError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}
