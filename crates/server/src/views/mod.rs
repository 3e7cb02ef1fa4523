//! Role views.
//!
//! Each view is a pure projection of catalog donations and ledger requests
//! for one role, serialized as JSON by the route handlers.

use serde::Serialize;

use nowaste_core::{
    Donation, DonationFilter, PickupRequest, RequestStatus, Role, User, UserId,
};

/// Profile data shown on every dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name().to_owned(),
            email: user.email.to_string(),
            role: user.role,
        }
    }
}

/// Request counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub pickup_confirmed: usize,
    pub request_declined: usize,
}

impl StatusCounts {
    /// Count `requests` by status.
    #[must_use]
    pub fn tally(requests: &[PickupRequest]) -> Self {
        requests.iter().fold(Self::default(), |mut counts, r| {
            counts.total += 1;
            match r.status {
                RequestStatus::Pending => counts.pending += 1,
                RequestStatus::PickupConfirmed => counts.pickup_confirmed += 1,
                RequestStatus::RequestDeclined => counts.request_declined += 1,
            }
            counts
        })
    }
}

/// The donor's landing page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorDashboard {
    pub user: UserView,
    /// Own donations, unconfirmed submissions first.
    pub donations: Vec<Donation>,
    /// Requests waiting for this donor's decision.
    pub pending_requests: usize,
}

impl DonorDashboard {
    #[must_use]
    pub fn build(donor: &User, donations: Vec<Donation>, requests: &[PickupRequest]) -> Self {
        Self {
            user: donor.into(),
            donations,
            pending_requests: requests.iter().filter(|r| r.is_pending()).count(),
        }
    }
}

/// One request on the approval screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEntry {
    #[serde(flatten)]
    pub request: PickupRequest,
    /// Whether accept/decline controls should be offered.
    pub can_decide: bool,
}

/// Requests addressed to a donor, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalQueue {
    pub requests: Vec<ApprovalEntry>,
    pub counts: StatusCounts,
}

impl ApprovalQueue {
    #[must_use]
    pub fn build(donor: &User, requests: Vec<PickupRequest>) -> Self {
        let counts = StatusCounts::tally(&requests);
        let requests = requests
            .into_iter()
            .map(|request| ApprovalEntry {
                can_decide: request.is_pending() && request.is_addressed_to(donor),
                request,
            })
            .collect();
        Self { requests, counts }
    }
}

/// Open donations as seen by a receiver, after filtering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationListing {
    /// Donations the catalog returned before filtering.
    pub total: usize,
    pub donations: Vec<Donation>,
}

impl DonationListing {
    #[must_use]
    pub fn build(donations: Vec<Donation>, filter: &DonationFilter) -> Self {
        let total = donations.len();
        Self {
            total,
            donations: filter.apply(donations),
        }
    }
}

/// A receiver's request history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHistory {
    pub requests: Vec<PickupRequest>,
    pub counts: StatusCounts,
}

impl RequestHistory {
    #[must_use]
    pub fn build(requests: Vec<PickupRequest>) -> Self {
        Self {
            counts: StatusCounts::tally(&requests),
            requests,
        }
    }
}

/// Everything, for administrators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverview {
    pub donors: Vec<UserView>,
    pub receivers: Vec<UserView>,
    pub donations: Vec<Donation>,
    pub requests: Vec<PickupRequest>,
    pub counts: StatusCounts,
}

impl AdminOverview {
    #[must_use]
    pub fn build(users: &[User], donations: Vec<Donation>, requests: Vec<PickupRequest>) -> Self {
        let with_role = |role| {
            users
                .iter()
                .filter(|u| u.has_role(role))
                .map(UserView::from)
                .collect()
        };
        Self {
            donors: with_role(Role::Donor),
            receivers: with_role(Role::Receiver),
            donations,
            counts: StatusCounts::tally(&requests),
            requests,
        }
    }
}
