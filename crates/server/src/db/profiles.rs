//! Profile storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use nowaste_core::{Email, Role, User, UserId};

use super::RepositoryError;

/// Profile records keyed by identity id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Profile for `id`, if one was ever written.
    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Create or replace the profile for `user.id`.
    async fn upsert(&self, user: &User) -> Result<User, RepositoryError>;

    /// Every profile, oldest first.
    async fn list_all(&self) -> Result<Vec<User>, RepositoryError>;

    /// The oldest donor whose name equals `name` (when non-empty) or whose
    /// email equals `email`, ignoring case.
    async fn find_by_name_or_email(
        &self,
        name: &str,
        email: Option<&str>,
    ) -> Result<Option<User>, RepositoryError>;
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    id: UserId,
    name: String,
    email: String,
    role: Role,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for User {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email,
            role: row.role,
            created_at: row.created_at,
        })
    }
}

/// `PostgreSQL`-backed [`ProfileStore`].
#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    /// Create a new profile store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, ProfileRow>(
            r"
            SELECT id, name, email, role, created_at
            FROM nowaste.profile
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn upsert(&self, user: &User) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r"
            INSERT INTO nowaste.profile (id, name, email, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
               SET name = EXCLUDED.name,
                   email = EXCLUDED.email,
                   role = EXCLUDED.role
            RETURNING id, name, email, role, created_at
            ",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        sqlx::query_as::<_, ProfileRow>(
            r"
            SELECT id, name, email, role, created_at
            FROM nowaste.profile
            ORDER BY created_at, id
            ",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    async fn find_by_name_or_email(
        &self,
        name: &str,
        email: Option<&str>,
    ) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, ProfileRow>(
            r"
            SELECT id, name, email, role, created_at
            FROM nowaste.profile
            WHERE role = 'donor'
              AND ((btrim($1) <> '' AND btrim(name) = btrim($1))
                   OR ($2::text IS NOT NULL AND lower(email) = lower($2)))
            ORDER BY created_at, id
            LIMIT 1
            ",
        )
        .bind(name)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }
}
