//! The request ledger: the single writer for pickup requests.
//!
//! Every role's view is a projection of one table. Mutations go through
//! [`RequestLedger`], which
//!
//! - assigns collision-resistant ids to new requests,
//! - makes status changes compare-and-set so a request is decided once,
//! - runs the accept flow as a saga: confirm, withdraw the donation from the
//!   catalog, and put the request back to `Pending` if the withdrawal fails,
//! - bumps a version counter that wakes [`LedgerSubscription`]s.

mod subscription;

pub use subscription::LedgerSubscription;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use nowaste_core::{
    Decision, Donation, DonationId, LedgerScope, LedgerSnapshot, PickupRequest, RequestId,
    RequestStatus, User, UserId,
};

use crate::catalog::{CatalogError, DonationRemover};
use crate::db::{LedgerStore, RepositoryError, StatusUpdate};

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No request with this id.
    #[error("request {0} not found")]
    NotFound(RequestId),

    /// The request has already left `Pending`.
    #[error("request {id} was already decided ({status})")]
    AlreadyDecided { id: RequestId, status: RequestStatus },

    /// The acting donor is not the donor this request is addressed to.
    #[error("request {0} is not addressed to this donor")]
    NotAddressedToDonor(RequestId),

    /// The request was confirmed but the donation could not be withdrawn
    /// from the catalog. The request has been put back to `Pending`.
    #[error("donation {donation_id} could not be withdrawn for request {id}: {source}")]
    Consistency {
        id: RequestId,
        donation_id: DonationId,
        #[source]
        source: CatalogError,
    },

    /// Storage failure.
    #[error("ledger store error: {0}")]
    Store(#[from] RepositoryError),
}

impl LedgerError {
    /// Whether repeating the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Consistency { .. } | Self::Store(_))
    }
}

/// The pickup request ledger service.
///
/// Cheaply cloneable; all clones share the store and the change counter.
#[derive(Clone)]
pub struct RequestLedger {
    inner: Arc<RequestLedgerInner>,
}

struct RequestLedgerInner {
    store: Arc<dyn LedgerStore>,
    remover: Arc<dyn DonationRemover>,
    version: watch::Sender<u64>,
    poll_interval: Duration,
}

impl RequestLedger {
    /// Create a ledger over `store` that withdraws accepted donations via
    /// `remover`. Subscriptions re-read the store every `poll_interval` to
    /// observe writers in other processes.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        remover: Arc<dyn DonationRemover>,
        poll_interval: Duration,
    ) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(RequestLedgerInner {
                store,
                remover,
                version,
                poll_interval,
            }),
        }
    }

    /// Record a new pending request by `receiver` for `donation`.
    ///
    /// The requested quantity is `min(10, donation.available())`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the request cannot be written.
    #[instrument(skip_all, fields(donation_id = %donation.id, receiver_id = %receiver.id))]
    pub async fn create_request(
        &self,
        donation: &Donation,
        receiver: &User,
        donor_id: Option<UserId>,
    ) -> Result<PickupRequest, LedgerError> {
        let request = PickupRequest::new(donation, receiver, donor_id);
        self.inner.store.append(&request).await?;
        self.notify();

        info!(request_id = %request.id, quantity = request.quantity, "Pickup request created");
        Ok(request)
    }

    /// Requests addressed to `donor`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store cannot be read.
    pub async fn list_for_donor(&self, donor: &User) -> Result<Vec<PickupRequest>, LedgerError> {
        self.list(&LedgerScope::Donor {
            id: donor.id,
            name: donor.name.clone(),
        })
        .await
    }

    /// Requests authored by `receiver`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store cannot be read.
    pub async fn list_for_receiver(
        &self,
        receiver: &User,
    ) -> Result<Vec<PickupRequest>, LedgerError> {
        self.list(&LedgerScope::Receiver {
            id: receiver.id,
            email: receiver.email.to_string(),
        })
        .await
    }

    /// Every request.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store cannot be read.
    pub async fn list_all(&self) -> Result<Vec<PickupRequest>, LedgerError> {
        self.list(&LedgerScope::All).await
    }

    /// Requests in `scope`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store cannot be read.
    pub async fn list(&self, scope: &LedgerScope) -> Result<Vec<PickupRequest>, LedgerError> {
        Ok(self.inner.store.list_by(scope).await?)
    }

    /// Apply `donor`'s decision to a pending request.
    ///
    /// Accepting withdraws the donation from the catalog. If the withdrawal
    /// fails the request is returned to `Pending` and the call fails with
    /// [`LedgerError::Consistency`] so the donor can retry.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the request does not exist
    /// - `NotAddressedToDonor` if `donor` is not the request's donor
    /// - `AlreadyDecided` if the request is no longer pending, including when
    ///   a concurrent decision won
    /// - `Consistency` if the donation could not be withdrawn
    /// - `Store` on storage failure
    #[instrument(skip(self, donor), fields(donor_id = %donor.id))]
    pub async fn decide(
        &self,
        donor: &User,
        id: RequestId,
        decision: Decision,
    ) -> Result<PickupRequest, LedgerError> {
        let request = self
            .inner
            .store
            .get(id)
            .await?
            .ok_or(LedgerError::NotFound(id))?;

        if !request.is_addressed_to(donor) {
            return Err(LedgerError::NotAddressedToDonor(id));
        }

        let target = decision.target_status();
        if !request.status.can_transition_to(target) {
            return Err(LedgerError::AlreadyDecided {
                id,
                status: request.status,
            });
        }

        let decided = match self
            .inner
            .store
            .compare_and_set_status(id, RequestStatus::Pending, target)
            .await
        {
            Ok(StatusUpdate::Applied(updated)) => updated,
            Ok(StatusUpdate::Stale(current)) => {
                return Err(LedgerError::AlreadyDecided {
                    id,
                    status: current.status,
                });
            }
            Err(RepositoryError::NotFound) => return Err(LedgerError::NotFound(id)),
            Err(e) => return Err(e.into()),
        };
        self.notify();

        if decision == Decision::Accept
            && let Err(source) = self.inner.remover.delete_donation(&decided.donation_id).await
        {
            self.compensate(&decided).await;
            return Err(LedgerError::Consistency {
                id,
                donation_id: decided.donation_id,
                source,
            });
        }

        info!(request_id = %id, status = %decided.status, "Pickup request decided");
        Ok(decided)
    }

    /// Undo a confirmation whose donation could not be withdrawn.
    async fn compensate(&self, confirmed: &PickupRequest) {
        match self
            .inner
            .store
            .compare_and_set_status(
                confirmed.id,
                RequestStatus::PickupConfirmed,
                RequestStatus::Pending,
            )
            .await
        {
            Ok(StatusUpdate::Applied(_)) => {
                self.notify();
                warn!(
                    request_id = %confirmed.id,
                    donation_id = %confirmed.donation_id,
                    "Donation withdrawal failed, request returned to pending"
                );
            }
            Ok(StatusUpdate::Stale(current)) => {
                error!(
                    request_id = %confirmed.id,
                    status = %current.status,
                    "Compensation skipped, request changed after confirmation"
                );
            }
            Err(e) => {
                error!(
                    request_id = %confirmed.id,
                    error = %e,
                    "Compensation failed, request left confirmed without withdrawal"
                );
            }
        }
    }

    /// A subscription to the requests in `scope`.
    ///
    /// The first call to [`LedgerSubscription::next`] yields the current
    /// projection; later calls wait until it changes.
    #[must_use]
    pub fn subscribe(&self, scope: LedgerScope) -> LedgerSubscription {
        LedgerSubscription::new(
            Arc::clone(&self.inner.store),
            scope,
            self.inner.version.subscribe(),
            self.inner.poll_interval,
        )
    }

    /// The whole ledger as a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store cannot be read.
    pub async fn export(&self) -> Result<LedgerSnapshot, LedgerError> {
        Ok(LedgerSnapshot::new(self.list_all().await?))
    }

    /// Insert the requests of `snapshot` that are not already present.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if a request cannot be written.
    pub async fn import(&self, snapshot: &LedgerSnapshot) -> Result<usize, LedgerError> {
        let inserted = self.inner.store.import(snapshot).await?;
        if inserted > 0 {
            self.notify();
        }
        Ok(inserted)
    }

    fn notify(&self) {
        self.inner.version.send_modify(|v| *v = v.wrapping_add(1));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use futures::future::join_all;
    use nowaste_core::{DonationStatus, Email, Quantity, Role};

    use super::*;
    use crate::db::MemoryLedgerStore;

    /// Records deletions; fails while `fail` is set.
    #[derive(Default)]
    struct RecordingRemover {
        deleted: Mutex<Vec<DonationId>>,
        fail: Mutex<bool>,
    }

    impl RecordingRemover {
        fn deleted(&self) -> Vec<DonationId> {
            self.deleted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DonationRemover for RecordingRemover {
        async fn delete_donation(&self, id: &DonationId) -> Result<(), CatalogError> {
            if *self.fail.lock().unwrap() {
                return Err(CatalogError::Api {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            self.deleted.lock().unwrap().push(id.clone());
            Ok(())
        }
    }

    fn user(name: &str, email: &str, role: Role) -> User {
        User {
            id: UserId::generate(),
            name: name.into(),
            email: Email::parse(email).unwrap(),
            role,
            created_at: Utc::now(),
        }
    }

    fn fried_rice() -> Donation {
        Donation {
            id: DonationId::new("D1"),
            donor_name: "John Donor".into(),
            donor_email: None,
            contact: "9876543210".into(),
            category: "Veg".into(),
            food_type: "Fried Rice".into(),
            estimated_count: 30,
            quantity: Quantity::from_raw("30"),
            expiry_date: "2026-06-30".into(),
            pickup_time: "2026-06-25T18:00".into(),
            location: "MG Road".into(),
            listed_at: None,
            status: DonationStatus::Confirmed,
        }
    }

    fn fixture() -> (RequestLedger, Arc<RecordingRemover>) {
        let remover = Arc::new(RecordingRemover::default());
        let ledger = RequestLedger::new(
            Arc::new(MemoryLedgerStore::new()),
            remover.clone(),
            Duration::from_millis(50),
        );
        (ledger, remover)
    }

    #[tokio::test]
    async fn test_request_then_accept() {
        let (ledger, remover) = fixture();
        let donor = user("John Donor", "john@example.com", Role::Donor);
        let receiver = user("Food Bank", "bank@example.org", Role::Receiver);

        let request = ledger
            .create_request(&fried_rice(), &receiver, Some(donor.id))
            .await
            .unwrap();
        assert_eq!(request.quantity, 10);
        assert_eq!(request.status, RequestStatus::Pending);

        let decided = ledger
            .decide(&donor, request.id, Decision::Accept)
            .await
            .unwrap();
        assert_eq!(decided.status, RequestStatus::PickupConfirmed);
        assert_eq!(remover.deleted(), [DonationId::new("D1")]);

        let for_donor = ledger.list_for_donor(&donor).await.unwrap();
        let for_receiver = ledger.list_for_receiver(&receiver).await.unwrap();
        assert_eq!(for_donor[0].status, RequestStatus::PickupConfirmed);
        assert_eq!(for_receiver[0].status, RequestStatus::PickupConfirmed);
    }

    #[tokio::test]
    async fn test_decline_does_not_withdraw() {
        let (ledger, remover) = fixture();
        let donor = user("John Donor", "john@example.com", Role::Donor);
        let receiver = user("Food Bank", "bank@example.org", Role::Receiver);
        let request = ledger
            .create_request(&fried_rice(), &receiver, None)
            .await
            .unwrap();

        let decided = ledger
            .decide(&donor, request.id, Decision::Decline)
            .await
            .unwrap();
        assert_eq!(decided.status, RequestStatus::RequestDeclined);
        assert!(remover.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_second_decision_is_rejected() {
        let (ledger, _) = fixture();
        let donor = user("John Donor", "john@example.com", Role::Donor);
        let receiver = user("Food Bank", "bank@example.org", Role::Receiver);
        let request = ledger
            .create_request(&fried_rice(), &receiver, None)
            .await
            .unwrap();

        ledger
            .decide(&donor, request.id, Decision::Decline)
            .await
            .unwrap();
        let err = ledger
            .decide(&donor, request.id, Decision::Accept)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::AlreadyDecided {
                status: RequestStatus::RequestDeclined,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_decisions_one_wins() {
        let (ledger, _) = fixture();
        let donor = user("John Donor", "john@example.com", Role::Donor);
        let receiver = user("Food Bank", "bank@example.org", Role::Receiver);
        let request = ledger
            .create_request(&fried_rice(), &receiver, None)
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            ledger.decide(&donor, request.id, Decision::Accept),
            ledger.decide(&donor, request.id, Decision::Decline),
        );
        assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
    }

    #[tokio::test]
    async fn test_other_donor_cannot_decide() {
        let (ledger, _) = fixture();
        let receiver = user("Food Bank", "bank@example.org", Role::Receiver);
        let stranger = user("Jane Donor", "jane@example.com", Role::Donor);
        let request = ledger
            .create_request(&fried_rice(), &receiver, None)
            .await
            .unwrap();

        let err = ledger
            .decide(&stranger, request.id, Decision::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotAddressedToDonor(_)));
    }

    #[tokio::test]
    async fn test_namesake_cannot_decide_resolved_request() {
        let (ledger, remover) = fixture();
        let john = user("John Donor", "john@example.com", Role::Donor);
        let namesake = user("John Donor", "other@example.com", Role::Donor);
        let receiver = user("Food Bank", "bank@example.org", Role::Receiver);
        let request = ledger
            .create_request(&fried_rice(), &receiver, Some(john.id))
            .await
            .unwrap();

        let listed = ledger.list_for_donor(&namesake).await.unwrap();
        assert_eq!(listed.len(), 1);

        let err = ledger
            .decide(&namesake, request.id, Decision::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotAddressedToDonor(_)));
        assert!(remover.deleted().is_empty());

        let decided = ledger
            .decide(&john, request.id, Decision::Accept)
            .await
            .unwrap();
        assert_eq!(decided.status, RequestStatus::PickupConfirmed);
    }

    #[tokio::test]
    async fn test_unknown_request() {
        let (ledger, _) = fixture();
        let donor = user("John Donor", "john@example.com", Role::Donor);
        let err = ledger
            .decide(&donor, RequestId::generate(), Decision::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_withdrawal_returns_request_to_pending() {
        let (ledger, remover) = fixture();
        let donor = user("John Donor", "john@example.com", Role::Donor);
        let receiver = user("Food Bank", "bank@example.org", Role::Receiver);
        let request = ledger
            .create_request(&fried_rice(), &receiver, None)
            .await
            .unwrap();

        *remover.fail.lock().unwrap() = true;
        let err = ledger
            .decide(&donor, request.id, Decision::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Consistency { .. }));
        assert!(err.is_retryable());

        let current = ledger.list_for_receiver(&receiver).await.unwrap();
        assert_eq!(current[0].status, RequestStatus::Pending);

        *remover.fail.lock().unwrap() = false;
        let decided = ledger
            .decide(&donor, request.id, Decision::Accept)
            .await
            .unwrap();
        assert_eq!(decided.status, RequestStatus::PickupConfirmed);
        assert_eq!(remover.deleted().len(), 1);
    }

    #[tokio::test]
    async fn test_projections_cover_the_ledger() {
        let (ledger, _) = fixture();
        let john = user("John Donor", "john@example.com", Role::Donor);
        let jane = user("Jane Donor", "jane@example.com", Role::Donor);
        let bank = user("Food Bank", "bank@example.org", Role::Receiver);
        let shelter = user("Shelter", "shelter@example.org", Role::Receiver);

        let mut janes = fried_rice();
        janes.donor_name = "Jane Donor".into();
        janes.id = DonationId::new("D2");

        ledger
            .create_request(&fried_rice(), &bank, Some(john.id))
            .await
            .unwrap();
        ledger
            .create_request(&fried_rice(), &shelter, None)
            .await
            .unwrap();
        ledger
            .create_request(&janes, &bank, Some(jane.id))
            .await
            .unwrap();

        let all = ledger.list_all().await.unwrap();

        let mut by_donor: Vec<_> = join_all([&john, &jane].map(|d| ledger.list_for_donor(d)))
            .await
            .into_iter()
            .flat_map(Result::unwrap)
            .map(|r| r.id)
            .collect();
        let mut by_receiver: Vec<_> =
            join_all([&bank, &shelter].map(|r| ledger.list_for_receiver(r)))
                .await
                .into_iter()
                .flat_map(Result::unwrap)
                .map(|r| r.id)
                .collect();
        let mut everything: Vec<_> = all.iter().map(|r| r.id).collect();

        by_donor.sort();
        by_receiver.sort();
        everything.sort();
        assert_eq!(by_donor, everything);
        assert_eq!(by_receiver, everything);
    }

    #[tokio::test]
    async fn test_export_import() {
        let (ledger, _) = fixture();
        let receiver = user("Food Bank", "bank@example.org", Role::Receiver);
        ledger.create_request(&fried_rice(), &receiver, None).await.unwrap();

        let snapshot = ledger.export().await.unwrap();
        assert_eq!(snapshot.requests.len(), 1);

        let (fresh, _) = fixture();
        assert_eq!(fresh.import(&snapshot).await.unwrap(), 1);
        assert_eq!(fresh.import(&snapshot).await.unwrap(), 0);
    }
}
