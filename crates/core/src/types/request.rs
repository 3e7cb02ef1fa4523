//! Pickup requests and ledger projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Donation, DonationId, RequestId, RequestStatus, Role, User, UserId};

/// A receiver's claim against a donation, subject to donor approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupRequest {
    pub id: RequestId,
    /// Receiver identity; absent for legacy records with foreign ids.
    pub receiver_id: Option<UserId>,
    pub receiver_name: String,
    pub receiver_email: String,
    /// Food type of the requested donation.
    pub food_requested: String,
    /// Servings requested.
    pub quantity: u32,
    pub pickup_time: String,
    pub donor_name: String,
    pub donor_contact: String,
    /// Donor identity, when the donor could be resolved to a profile.
    pub donor_id: Option<UserId>,
    pub location: String,
    pub status: RequestStatus,
    #[serde(rename = "requestDate")]
    pub requested_at: DateTime<Utc>,
    pub donation_id: DonationId,
}

impl PickupRequest {
    /// Largest number of servings a single request claims by default.
    pub const DEFAULT_QUANTITY_CAP: u32 = 10;

    /// Receiver name recorded when the receiver has none.
    pub const UNKNOWN_RECEIVER: &'static str = "Unknown Receiver";

    /// A new pending request by `receiver` for `donation`.
    #[must_use]
    pub fn new(donation: &Donation, receiver: &User, donor_id: Option<UserId>) -> Self {
        let receiver_name = match receiver.name.trim() {
            "" => Self::UNKNOWN_RECEIVER.to_owned(),
            name => name.to_owned(),
        };

        Self {
            id: RequestId::generate(),
            receiver_id: Some(receiver.id),
            receiver_name,
            receiver_email: receiver.email.to_string(),
            food_requested: donation.food_type.clone(),
            quantity: Self::DEFAULT_QUANTITY_CAP.min(donation.available()),
            pickup_time: donation.pickup_time.clone(),
            donor_name: donation.donor_name.clone(),
            donor_contact: donation.contact.clone(),
            donor_id,
            location: donation.location.clone(),
            status: RequestStatus::Pending,
            requested_at: Utc::now(),
            donation_id: donation.id.clone(),
        }
    }

    /// Whether the donor can still decide on this request.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, RequestStatus::Pending)
    }

    /// Whether `donor` may accept or decline this request.
    ///
    /// A resolved donor id is authoritative. Requests whose donor could not
    /// be resolved fall back to the donor name.
    #[must_use]
    pub fn is_addressed_to(&self, donor: &User) -> bool {
        match self.donor_id {
            Some(id) => id == donor.id,
            None => {
                let name = donor.name.trim();
                !name.is_empty() && self.donor_name.trim() == name
            }
        }
    }
}

/// Which slice of the ledger a caller may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerScope {
    /// Requests addressed to a donor, matched by id or by name.
    Donor { id: UserId, name: String },
    /// Requests authored by a receiver, matched by id or by email.
    Receiver { id: UserId, email: String },
    /// Every request.
    All,
}

impl LedgerScope {
    /// The scope a signed-in user sees.
    #[must_use]
    pub fn for_user(user: &User) -> Self {
        match user.role {
            Role::Donor => Self::Donor {
                id: user.id,
                name: user.name.clone(),
            },
            Role::Receiver => Self::Receiver {
                id: user.id,
                email: user.email.to_string(),
            },
            Role::Admin => Self::All,
        }
    }

    /// Whether `request` belongs to this scope.
    #[must_use]
    pub fn matches(&self, request: &PickupRequest) -> bool {
        match self {
            Self::Donor { id, name } => {
                request.donor_id == Some(*id)
                    || (!name.trim().is_empty() && request.donor_name.trim() == name.trim())
            }
            Self::Receiver { id, email } => {
                request.receiver_id == Some(*id)
                    || (!email.is_empty() && request.receiver_email.eq_ignore_ascii_case(email))
            }
            Self::All => true,
        }
    }

    /// Keep only the requests in this scope.
    #[must_use]
    pub fn project(&self, requests: Vec<PickupRequest>) -> Vec<PickupRequest> {
        requests.into_iter().filter(|r| self.matches(r)).collect()
    }
}
