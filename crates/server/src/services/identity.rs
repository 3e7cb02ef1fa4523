//! Identity provider seam.
//!
//! Identities (email + password) are kept apart from profiles (name, role) so
//! an identity can exist without a profile. Sign-in and sign-out are broadcast
//! as [`AuthEvent`]s to anyone holding a receiver from
//! [`IdentityProvider::subscribe`].

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use nowaste_core::{Email, UserId};

use crate::db::RepositoryError;

/// Capacity of the auth event channel. Slow subscribers skip old events.
pub const AUTH_EVENT_CAPACITY: usize = 64;

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub email: Email,
}

/// Change of authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Identity),
    SignedOut(UserId),
}

/// Errors reported by an identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Another identity already uses this email.
    #[error("email already in use")]
    EmailAlreadyInUse,

    /// Unknown email or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No identity with this id.
    #[error("identity not found")]
    NotFound,

    /// The provider could not end the session.
    #[error("sign-out failed: {0}")]
    SignOutFailed(String),

    /// Password hashing failed.
    #[error("password hashing error")]
    PasswordHash,

    /// Storage failure.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Email/password identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an identity and sign it in.
    async fn sign_up(&self, email: &Email, password: &str) -> Result<Identity, IdentityError>;

    /// Verify credentials and sign the identity in.
    async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity, IdentityError>;

    /// End the identity's session with the provider.
    async fn sign_out(&self, id: UserId) -> Result<(), IdentityError>;

    /// Change the identity's sign-in email.
    async fn update_email(&self, id: UserId, email: &Email) -> Result<(), IdentityError>;

    /// Change the identity's password.
    async fn update_password(&self, id: UserId, password: &str) -> Result<(), IdentityError>;

    /// Stream of sign-in and sign-out events.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Hash a password using Argon2id.
pub(crate) fn hash_password(password: &str) -> Result<String, IdentityError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| IdentityError::PasswordHash)
}

/// Verify a password against a hash.
pub(crate) fn verify_password(password: &str, hash: &str) -> Result<(), IdentityError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| IdentityError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| IdentityError::InvalidCredentials)
}

/// Send an event, ignoring the case where nobody is listening.
pub(crate) fn publish(events: &broadcast::Sender<AuthEvent>, event: AuthEvent) {
    let _ = events.send(event);
}
