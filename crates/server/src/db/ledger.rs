//! Pickup request ledger storage.
//!
//! Status changes are compare-and-set: an update names the status it expects
//! to replace, so two concurrent decisions on the same request cannot both
//! succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use nowaste_core::{
    DonationId, LedgerScope, LedgerSnapshot, PickupRequest, RequestId, RequestStatus, UserId,
};

use super::RepositoryError;

/// Result of a compare-and-set status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The status matched and was replaced.
    Applied(PickupRequest),
    /// The status had already changed; carries the current record.
    Stale(PickupRequest),
}

/// The shared table of pickup requests.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a new request.
    async fn append(&self, request: &PickupRequest) -> Result<(), RepositoryError>;

    /// A single request.
    async fn get(&self, id: RequestId) -> Result<Option<PickupRequest>, RepositoryError>;

    /// Requests in `scope`, newest first.
    async fn list_by(&self, scope: &LedgerScope) -> Result<Vec<PickupRequest>, RepositoryError>;

    /// Every request, newest first.
    async fn list_all(&self) -> Result<Vec<PickupRequest>, RepositoryError>;

    /// Replace the status of `id` with `next` only if it is currently `expected`.
    ///
    /// Returns `RepositoryError::NotFound` if no such request exists.
    async fn compare_and_set_status(
        &self,
        id: RequestId,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<StatusUpdate, RepositoryError>;

    /// Insert every request of a snapshot, skipping ids already present.
    ///
    /// Returns the number of requests inserted.
    async fn import(&self, snapshot: &LedgerSnapshot) -> Result<usize, RepositoryError>;
}

#[derive(Debug, FromRow)]
struct PickupRequestRow {
    id: RequestId,
    receiver_id: Option<UserId>,
    receiver_name: String,
    receiver_email: String,
    food_requested: String,
    quantity: i32,
    pickup_time: String,
    donor_name: String,
    donor_contact: String,
    donor_id: Option<UserId>,
    location: String,
    status: RequestStatus,
    requested_at: DateTime<Utc>,
    donation_id: String,
}

impl TryFrom<PickupRequestRow> for PickupRequest {
    type Error = RepositoryError;

    fn try_from(row: PickupRequestRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative quantity {} on request {}",
                row.quantity, row.id
            ))
        })?;

        Ok(Self {
            id: row.id,
            receiver_id: row.receiver_id,
            receiver_name: row.receiver_name,
            receiver_email: row.receiver_email,
            food_requested: row.food_requested,
            quantity,
            pickup_time: row.pickup_time,
            donor_name: row.donor_name,
            donor_contact: row.donor_contact,
            donor_id: row.donor_id,
            location: row.location,
            status: row.status,
            requested_at: row.requested_at,
            donation_id: DonationId::new(row.donation_id),
        })
    }
}

const SELECT_COLUMNS: &str = r"
    SELECT id, receiver_id, receiver_name, receiver_email, food_requested, quantity,
           pickup_time, donor_name, donor_contact, donor_id, location, status,
           requested_at, donation_id
    FROM nowaste.pickup_request
";

/// `PostgreSQL`-backed [`LedgerStore`].
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a new ledger store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(
        &self,
        request: &PickupRequest,
        schema_version: u32,
        skip_existing: bool,
    ) -> Result<bool, RepositoryError> {
        let quantity = i32::try_from(request.quantity).map_err(|_| {
            RepositoryError::Conflict(format!("quantity {} out of range", request.quantity))
        })?;
        let schema_version = i32::try_from(schema_version).unwrap_or(i32::MAX);
        let conflict_clause = if skip_existing {
            "ON CONFLICT (id) DO NOTHING"
        } else {
            ""
        };

        let result = sqlx::query(&format!(
            r"
            INSERT INTO nowaste.pickup_request (
                id, schema_version, receiver_id, receiver_name, receiver_email,
                food_requested, quantity, pickup_time, donor_name, donor_contact,
                donor_id, location, status, requested_at, donation_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            {conflict_clause}
            "
        ))
        .bind(request.id)
        .bind(schema_version)
        .bind(request.receiver_id)
        .bind(&request.receiver_name)
        .bind(&request.receiver_email)
        .bind(&request.food_requested)
        .bind(quantity)
        .bind(&request.pickup_time)
        .bind(&request.donor_name)
        .bind(&request.donor_contact)
        .bind(request.donor_id)
        .bind(&request.location)
        .bind(request.status)
        .bind(request.requested_at)
        .bind(request.donation_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "request"))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn append(&self, request: &PickupRequest) -> Result<(), RepositoryError> {
        self.insert(request, LedgerSnapshot::SCHEMA_VERSION, false)
            .await
            .map(|_| ())
    }

    async fn get(&self, id: RequestId) -> Result<Option<PickupRequest>, RepositoryError> {
        sqlx::query_as::<_, PickupRequestRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(PickupRequest::try_from)
            .transpose()
    }

    async fn list_by(&self, scope: &LedgerScope) -> Result<Vec<PickupRequest>, RepositoryError> {
        let rows = match scope {
            LedgerScope::All => return self.list_all().await,
            LedgerScope::Donor { id, name } => {
                sqlx::query_as::<_, PickupRequestRow>(&format!(
                    r"{SELECT_COLUMNS}
                    WHERE donor_id = $1
                       OR (btrim($2) <> '' AND btrim(donor_name) = btrim($2))
                    ORDER BY requested_at DESC, id"
                ))
                .bind(*id)
                .bind(name)
                .fetch_all(&self.pool)
                .await?
            }
            LedgerScope::Receiver { id, email } => {
                sqlx::query_as::<_, PickupRequestRow>(&format!(
                    r"{SELECT_COLUMNS}
                    WHERE receiver_id = $1
                       OR ($2 <> '' AND lower(receiver_email) = lower($2))
                    ORDER BY requested_at DESC, id"
                ))
                .bind(*id)
                .bind(email)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(PickupRequest::try_from).collect()
    }

    async fn list_all(&self) -> Result<Vec<PickupRequest>, RepositoryError> {
        sqlx::query_as::<_, PickupRequestRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY requested_at DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(PickupRequest::try_from)
        .collect()
    }

    async fn compare_and_set_status(
        &self,
        id: RequestId,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<StatusUpdate, RepositoryError> {
        let updated = sqlx::query_as::<_, PickupRequestRow>(
            r"
            UPDATE nowaste.pickup_request
               SET status = $3, updated_at = now()
             WHERE id = $1 AND status = $2
            RETURNING id, receiver_id, receiver_name, receiver_email, food_requested, quantity,
                      pickup_time, donor_name, donor_contact, donor_id, location, status,
                      requested_at, donation_id
            ",
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(StatusUpdate::Applied(row.try_into()?));
        }

        self.get(id)
            .await?
            .map(StatusUpdate::Stale)
            .ok_or(RepositoryError::NotFound)
    }

    async fn import(&self, snapshot: &LedgerSnapshot) -> Result<usize, RepositoryError> {
        let mut inserted = 0;
        for request in &snapshot.requests {
            if self.insert(request, snapshot.schema_version, true).await? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
