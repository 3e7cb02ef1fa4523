//! Donation submission and optimistic echoes.
//!
//! A successful submission is shown to its donor straight away as a
//! `Pending` donation (the echo) until the catalog lists it. Each catalog
//! read reconciles the donor's echoes against the listing: an echo is
//! dropped once the catalog returns the same id, or for echoes without a
//! catalog id, a record with the same food type, pickup time, location and
//! contact.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use nowaste_core::{
    Donation, DonationForm, DonationId, DonationStatus, User, UserId, ValidationErrors,
};

use crate::catalog::{CatalogClient, CatalogError, SubmitPayload};

/// How long an echo is kept if the catalog never lists it.
pub const ECHO_TTL: Duration = Duration::from_secs(60 * 60);

/// Errors from donation submission.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The form failed validation. Nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The catalog could not be reached or refused the donation.
    #[error("donation submission failed: {0}")]
    Transport(#[from] CatalogError),
}

#[derive(Debug, Clone)]
struct Echo {
    donation: Donation,
    recorded_at: DateTime<Utc>,
}

/// Unconfirmed donations per donor.
#[derive(Default)]
pub struct EchoBook {
    echoes: RwLock<HashMap<UserId, Vec<Echo>>>,
}

impl EchoBook {
    /// An empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `donation` as submitted by `donor`.
    ///
    /// Expired echoes of every donor are dropped first, so donors who never
    /// read their dashboard again do not hold echoes forever.
    pub async fn record(&self, donor: UserId, donation: Donation) {
        let cutoff = expiry_cutoff();
        let mut echoes = self.echoes.write().await;
        echoes.retain(|_, pending| {
            pending.retain(|echo| echo.recorded_at > cutoff);
            !pending.is_empty()
        });
        echoes.entry(donor).or_default().push(Echo {
            donation,
            recorded_at: Utc::now(),
        });
    }

    /// Merge `donor`'s echoes into an authoritative listing.
    ///
    /// Echoes the listing confirms, and expired ones, are forgotten. The
    /// remaining echoes come first, newest first, followed by `listed`.
    pub async fn reconcile(&self, donor: UserId, listed: Vec<Donation>) -> Vec<Donation> {
        let mut echoes = self.echoes.write().await;
        let Some(pending) = echoes.get_mut(&donor) else {
            return listed;
        };

        let cutoff = expiry_cutoff();
        pending.retain(|echo| {
            echo.recorded_at > cutoff && !listed.iter().any(|d| confirms(d, &echo.donation))
        });

        let mut merged: Vec<Donation> =
            pending.iter().rev().map(|e| e.donation.clone()).collect();
        if pending.is_empty() {
            echoes.remove(&donor);
        }
        merged.extend(listed);
        merged
    }

    /// Number of unconfirmed echoes held for `donor`.
    pub async fn pending_for(&self, donor: UserId) -> usize {
        self.echoes.read().await.get(&donor).map_or(0, Vec::len)
    }
}

/// Echoes recorded at or before this instant have expired.
fn expiry_cutoff() -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ECHO_TTL).unwrap_or(chrono::Duration::MAX);
    Utc::now() - ttl
}

/// Whether `listed` is the catalog's record of `echo`.
fn confirms(listed: &Donation, echo: &Donation) -> bool {
    if echo.id.is_local() {
        listed.food_type == echo.food_type
            && listed.pickup_time == echo.pickup_time
            && listed.location == echo.location
            && listed.contact == echo.contact
    } else {
        listed.id == echo.id
    }
}

/// Validates donation forms and submits them to the catalog.
#[derive(Clone)]
pub struct SubmissionService {
    catalog: CatalogClient,
    echoes: Arc<EchoBook>,
}

impl SubmissionService {
    /// Create a submission service.
    #[must_use]
    pub const fn new(catalog: CatalogClient, echoes: Arc<EchoBook>) -> Self {
        Self { catalog, echoes }
    }

    /// Validate and submit `form` on behalf of `donor`.
    ///
    /// Validation runs before any network call. On success the returned
    /// donation has status `Pending` and is echoed on the donor's dashboard
    /// until the catalog lists it.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::Validation` with one message per failing
    /// field, or `SubmissionError::Transport` if the catalog call fails.
    #[instrument(skip_all, fields(donor_id = %donor.id))]
    pub async fn submit(
        &self,
        donor: &User,
        form: &DonationForm,
    ) -> Result<Donation, SubmissionError> {
        let draft = form.validate()?;
        let payload = SubmitPayload::new(&draft, &donor.name);

        let id = self
            .catalog
            .submit(&payload)
            .await?
            .unwrap_or_else(DonationId::local);

        let donation = Donation {
            id,
            donor_name: payload.donor_name,
            donor_email: Some(donor.email.to_string()),
            contact: payload.contact,
            category: payload.category,
            food_type: payload.food_type,
            estimated_count: payload.count,
            quantity: draft.quantity,
            expiry_date: payload.expiry_date,
            pickup_time: payload.pickup_time,
            location: payload.location,
            listed_at: Some(Utc::now()),
            status: DonationStatus::Pending,
        };
        self.echoes.record(donor.id, donation.clone()).await;

        info!(donation_id = %donation.id, "Donation submitted");
        Ok(donation)
    }

    /// The donor's donations: open catalog entries they listed, merged with
    /// their unconfirmed echoes.
    pub async fn donations_for(&self, donor: &User) -> Vec<Donation> {
        let listed = self
            .catalog
            .list_open_donations()
            .await
            .into_iter()
            .filter(|d| d.is_listed_by(donor))
            .collect();
        self.echoes.reconcile(donor.id, listed).await
    }
}
