//! `PostgreSQL` identity provider.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tokio::sync::broadcast;

use nowaste_core::{Email, UserId};

use super::RepositoryError;
use crate::services::identity::{
    AUTH_EVENT_CAPACITY, AuthEvent, Identity, IdentityError, IdentityProvider, hash_password,
    publish, verify_password,
};

#[derive(Debug, FromRow)]
struct IdentityRow {
    id: UserId,
    email: String,
    password_hash: String,
}

impl IdentityRow {
    fn identity(&self) -> Result<Identity, IdentityError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Identity { id: self.id, email })
    }
}

/// Identity provider backed by the `nowaste.identity` table.
pub struct PgIdentityStore {
    pool: PgPool,
    events: broadcast::Sender<AuthEvent>,
}

impl PgIdentityStore {
    /// Create a new identity store.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self { pool, events }
    }
}

fn map_email_conflict(e: sqlx::Error) -> IdentityError {
    match RepositoryError::from_insert(e, "email") {
        RepositoryError::Conflict(_) => IdentityError::EmailAlreadyInUse,
        other => IdentityError::Repository(other),
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityStore {
    async fn sign_up(&self, email: &Email, password: &str) -> Result<Identity, IdentityError> {
        let password_hash = hash_password(password)?;

        let row = sqlx::query_as::<_, IdentityRow>(
            r"
            INSERT INTO nowaste.identity (id, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash
            ",
        )
        .bind(UserId::generate())
        .bind(email)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_email_conflict)?;

        let identity = row.identity()?;
        publish(&self.events, AuthEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity, IdentityError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r"
            SELECT id, email, password_hash
            FROM nowaste.identity
            WHERE lower(email) = lower($1)
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .ok_or(IdentityError::InvalidCredentials)?;

        verify_password(password, &row.password_hash)?;

        let identity = row.identity()?;
        publish(&self.events, AuthEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self, id: UserId) -> Result<(), IdentityError> {
        publish(&self.events, AuthEvent::SignedOut(id));
        Ok(())
    }

    async fn update_email(&self, id: UserId, email: &Email) -> Result<(), IdentityError> {
        let result = sqlx::query(
            r"
            UPDATE nowaste.identity
               SET email = $2, updated_at = now()
             WHERE id = $1
            ",
        )
        .bind(id)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(map_email_conflict)?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::NotFound);
        }
        Ok(())
    }

    async fn update_password(&self, id: UserId, password: &str) -> Result<(), IdentityError> {
        let password_hash = hash_password(password)?;

        let result = sqlx::query(
            r"
            UPDATE nowaste.identity
               SET password_hash = $2, updated_at = now()
             WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&password_hash)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::NotFound);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
