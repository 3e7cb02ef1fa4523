//! Status enums for donations and pickup requests.

use serde::{Deserialize, Serialize};

/// Status of a pickup request.
///
/// Transitions are monotonic: `Pending` moves to exactly one of the two
/// terminal states and never leaves it. The wire names are the labels the
/// dashboards have always shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "nowaste.request_status", rename_all = "snake_case")
)]
pub enum RequestStatus {
    /// Waiting for the donor's decision.
    #[default]
    Pending,
    /// The donor accepted; the donation is reserved for this receiver.
    #[serde(rename = "Pickup Confirmed")]
    PickupConfirmed,
    /// The donor declined.
    #[serde(rename = "Request Declined")]
    RequestDeclined,
}

impl RequestStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::PickupConfirmed, Self::RequestDeclined];

    /// Whether a donor decision may move a request from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::PickupConfirmed | Self::RequestDeclined)
        )
    }

    /// Display label, identical to the serialized form.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::PickupConfirmed => "Pickup Confirmed",
            Self::RequestDeclined => "Request Declined",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    /// Accepts the display labels, the snake_case database names and the
    /// short forms older dashboards wrote.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "pickup confirmed" | "pickup_confirmed" | "confirmed" | "accepted" => {
                Ok(Self::PickupConfirmed)
            }
            "request declined" | "request_declined" | "declined" | "rejected" => {
                Ok(Self::RequestDeclined)
            }
            _ => Err(format!("invalid request status: {s}")),
        }
    }
}

/// A donor's decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Confirm the pickup and withdraw the donation from the catalog.
    Accept,
    /// Decline the request; the donation stays listed.
    Decline,
}

impl Decision {
    /// The status a pending request moves to under this decision.
    #[must_use]
    pub const fn target_status(self) -> RequestStatus {
        match self {
            Self::Accept => RequestStatus::PickupConfirmed,
            Self::Decline => RequestStatus::RequestDeclined,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accept => f.write_str("accept"),
            Self::Decline => f.write_str("decline"),
        }
    }
}

/// Whether a donation record is confirmed by the catalog.
///
/// Records echoed back right after submission are `Pending` until the next
/// catalog read returns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DonationStatus {
    /// Optimistic local echo, not yet seen in the catalog.
    Pending,
    /// Returned by the catalog.
    #[default]
    Confirmed,
}
