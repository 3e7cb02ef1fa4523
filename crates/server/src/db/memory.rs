//! In-memory stores.
//!
//! Used when no database is configured (development) and by tests. State
//! lives for the lifetime of the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};

use nowaste_core::{
    Email, LedgerScope, LedgerSnapshot, PickupRequest, RequestId, RequestStatus, User, UserId,
};

use super::{LedgerStore, ProfileStore, RepositoryError, StatusUpdate};
use crate::services::identity::{
    AUTH_EVENT_CAPACITY, AuthEvent, Identity, IdentityError, IdentityProvider, hash_password,
    publish, verify_password,
};

// =============================================================================
// Identities
// =============================================================================

struct StoredIdentity {
    email: Email,
    password_hash: String,
}

/// In-memory [`IdentityProvider`].
pub struct MemoryIdentityStore {
    identities: RwLock<HashMap<UserId, StoredIdentity>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            identities: RwLock::default(),
            events,
        }
    }
}

impl MemoryIdentityStore {
    /// An empty identity store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(
    identities: &HashMap<UserId, StoredIdentity>,
    email: &Email,
    except: Option<UserId>,
) -> bool {
    identities
        .iter()
        .any(|(id, stored)| Some(*id) != except && stored.email.matches(email.as_str()))
}

#[async_trait]
impl IdentityProvider for MemoryIdentityStore {
    async fn sign_up(&self, email: &Email, password: &str) -> Result<Identity, IdentityError> {
        let password_hash = hash_password(password)?;
        let identity = {
            let mut identities = self.identities.write().await;
            if email_taken(&identities, email, None) {
                return Err(IdentityError::EmailAlreadyInUse);
            }
            let id = UserId::generate();
            identities.insert(
                id,
                StoredIdentity {
                    email: email.clone(),
                    password_hash,
                },
            );
            Identity {
                id,
                email: email.clone(),
            }
        };

        publish(&self.events, AuthEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity, IdentityError> {
        let (id, stored_email, password_hash) = {
            let identities = self.identities.read().await;
            identities
                .iter()
                .find(|(_, stored)| stored.email.matches(email.as_str()))
                .map(|(id, stored)| (*id, stored.email.clone(), stored.password_hash.clone()))
                .ok_or(IdentityError::InvalidCredentials)?
        };

        verify_password(password, &password_hash)?;

        let identity = Identity {
            id,
            email: stored_email,
        };
        publish(&self.events, AuthEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self, id: UserId) -> Result<(), IdentityError> {
        publish(&self.events, AuthEvent::SignedOut(id));
        Ok(())
    }

    async fn update_email(&self, id: UserId, email: &Email) -> Result<(), IdentityError> {
        let mut identities = self.identities.write().await;
        if email_taken(&identities, email, Some(id)) {
            return Err(IdentityError::EmailAlreadyInUse);
        }
        let stored = identities.get_mut(&id).ok_or(IdentityError::NotFound)?;
        stored.email = email.clone();
        Ok(())
    }

    async fn update_password(&self, id: UserId, password: &str) -> Result<(), IdentityError> {
        let password_hash = hash_password(password)?;
        let mut identities = self.identities.write().await;
        let stored = identities.get_mut(&id).ok_or(IdentityError::NotFound)?;
        stored.password_hash = password_hash;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

// =============================================================================
// Profiles
// =============================================================================

/// In-memory [`ProfileStore`].
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<UserId, User>>,
}

impl MemoryProfileStore {
    /// An empty profile store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.profiles.read().await.get(&id).cloned())
    }

    async fn upsert(&self, user: &User) -> Result<User, RepositoryError> {
        let mut profiles = self.profiles.write().await;
        let stored = profiles
            .entry(user.id)
            .and_modify(|existing| {
                existing.name.clone_from(&user.name);
                existing.email = user.email.clone();
                existing.role = user.role;
            })
            .or_insert_with(|| user.clone());
        Ok(stored.clone())
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let mut users: Vec<User> = self.profiles.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn find_by_name_or_email(
        &self,
        name: &str,
        email: Option<&str>,
    ) -> Result<Option<User>, RepositoryError> {
        let name = name.trim();
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|u| u.role == nowaste_core::Role::Donor)
            .find(|u| {
                (!name.is_empty() && u.name.trim() == name)
                    || email.is_some_and(|e| u.email.matches(e))
            }))
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// In-memory [`LedgerStore`].
///
/// A single write lock serializes status changes, which gives the same
/// compare-and-set guarantee as the conditional `UPDATE` in `PostgreSQL`.
#[derive(Default)]
pub struct MemoryLedgerStore {
    requests: RwLock<HashMap<RequestId, PickupRequest>>,
}

impl MemoryLedgerStore {
    /// An empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut requests: Vec<PickupRequest>) -> Vec<PickupRequest> {
    requests.sort_by(|a, b| {
        b.requested_at
            .cmp(&a.requested_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    requests
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn append(&self, request: &PickupRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&request.id) {
            return Err(RepositoryError::Conflict("request already exists".to_owned()));
        }
        requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn get(&self, id: RequestId) -> Result<Option<PickupRequest>, RepositoryError> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn list_by(&self, scope: &LedgerScope) -> Result<Vec<PickupRequest>, RepositoryError> {
        let matching = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| scope.matches(r))
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }

    async fn list_all(&self) -> Result<Vec<PickupRequest>, RepositoryError> {
        self.list_by(&LedgerScope::All).await
    }

    async fn compare_and_set_status(
        &self,
        id: RequestId,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<StatusUpdate, RepositoryError> {
        let mut requests = self.requests.write().await;
        let request = requests.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if request.status != expected {
            return Ok(StatusUpdate::Stale(request.clone()));
        }
        request.status = next;
        Ok(StatusUpdate::Applied(request.clone()))
    }

    async fn import(&self, snapshot: &LedgerSnapshot) -> Result<usize, RepositoryError> {
        let mut requests = self.requests.write().await;
        let mut inserted = 0;
        for request in &snapshot.requests {
            if !requests.contains_key(&request.id) {
                requests.insert(request.id, request.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, Utc};
    use nowaste_core::{DonationId, Role};

    use super::*;

    fn request(donor: &str, receiver_email: &str) -> PickupRequest {
        PickupRequest {
            id: RequestId::generate(),
            receiver_id: None,
            receiver_name: "Food Bank".into(),
            receiver_email: receiver_email.into(),
            food_requested: "Fried Rice".into(),
            quantity: 10,
            pickup_time: "2026-06-25T18:00".into(),
            donor_name: donor.into(),
            donor_contact: "9876543210".into(),
            donor_id: None,
            location: "MG Road".into(),
            status: RequestStatus::Pending,
            requested_at: Utc::now(),
            donation_id: DonationId::new("D1"),
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

    #[tokio::test]
    async fn test_compare_and_set_applies_once() {
        let store = MemoryLedgerStore::new();
        let r = request("John Donor", "bank@example.org");
        store.append(&r).await.unwrap();

        let first = store
            .compare_and_set_status(r.id, RequestStatus::Pending, RequestStatus::PickupConfirmed)
            .await
            .unwrap();
        assert!(matches!(
            first,
            StatusUpdate::Applied(ref u) if u.status == RequestStatus::PickupConfirmed
        ));

        let second = store
            .compare_and_set_status(r.id, RequestStatus::Pending, RequestStatus::RequestDeclined)
            .await
            .unwrap();
        assert!(matches!(
            second,
            StatusUpdate::Stale(ref u) if u.status == RequestStatus::PickupConfirmed
        ));
    }

    #[tokio::test]
    async fn test_compare_and_set_unknown_id() {
        let store = MemoryLedgerStore::new();
        let err = store
            .compare_and_set_status(
                RequestId::generate(),
                RequestStatus::Pending,
                RequestStatus::PickupConfirmed,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_append_rejects_duplicate_id() {
        let store = MemoryLedgerStore::new();
        let r = request("John Donor", "bank@example.org");
        store.append(&r).await.unwrap();
        assert!(matches!(
            store.append(&r).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryLedgerStore::new();
        let mut old = request("John Donor", "bank@example.org");
        old.requested_at = Utc::now() - Duration::hours(1);
        let new = request("John Donor", "bank@example.org");
        store.append(&old).await.unwrap();
        store.append(&new).await.unwrap();

        let ids: Vec<_> = store.list_all().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, [new.id, old.id]);
    }

    #[tokio::test]
    async fn test_import_skips_existing() {
        let store = MemoryLedgerStore::new();
        let r = request("John Donor", "bank@example.org");
        store.append(&r).await.unwrap();

        let snapshot = LedgerSnapshot::new(vec![r, request("Jane Donor", "x@example.org")]);
        assert_eq!(store.import(&snapshot).await.unwrap(), 1);
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_identity_sign_up_and_in() {
        let store = MemoryIdentityStore::new();
        let mut events = store.subscribe();
        let email = Email::parse("jane@example.com").unwrap();

        let identity = store.sign_up(&email, "hunter22").await.unwrap();
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedIn(identity.clone()));

        let again = Email::parse("JANE@example.com").unwrap();
        assert!(matches!(
            store.sign_up(&again, "whatever").await,
            Err(IdentityError::EmailAlreadyInUse)
        ));

        let signed_in = store.sign_in(&again, "hunter22").await.unwrap();
        assert_eq!(signed_in.id, identity.id);
        assert!(matches!(
            store.sign_in(&email, "wrong-pass").await,
            Err(IdentityError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_identity_update_email_conflict() {
        let store = MemoryIdentityStore::new();
        let a = Email::parse("a@example.com").unwrap();
        let b = Email::parse("b@example.com").unwrap();
        let first = store.sign_up(&a, "password1").await.unwrap();
        store.sign_up(&b, "password2").await.unwrap();

        assert!(matches!(
            store.update_email(first.id, &b).await,
            Err(IdentityError::EmailAlreadyInUse)
        ));
        store.update_email(first.id, &a).await.unwrap();
    }

    #[tokio::test]
    async fn test_find_donor_by_name_or_email() {
        let store = MemoryProfileStore::new();
        let donor = user("John Donor", "john@example.com", Role::Donor);
        let receiver = user("John Donor", "bank@example.org", Role::Receiver);
        store.upsert(&receiver).await.unwrap();
        store.upsert(&donor).await.unwrap();

        let by_name = store.find_by_name_or_email("John Donor", None).await.unwrap();
        assert_eq!(by_name.map(|u| u.id), Some(donor.id));

        let by_email = store
            .find_by_name_or_email("", Some("JOHN@example.com"))
            .await
            .unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(donor.id));

        assert!(store.find_by_name_or_email("", None).await.unwrap().is_none());
    }
}
