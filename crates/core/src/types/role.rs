//! User roles.

use serde::{Deserialize, Serialize};

/// The role a user plays in the network.
///
/// Every route is scoped to exactly one role. Donors list food, receivers
/// request pickups and admins see everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "nowaste.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Lists surplus food and approves pickup requests.
    #[default]
    Donor,
    /// Browses donations and requests pickups.
    Receiver,
    /// Read-only view across every donor, receiver, donation and request.
    Admin,
}

impl Role {
    /// Path of the dashboard a user with this role lands on after login.
    #[must_use]
    pub const fn landing_path(self) -> &'static str {
        match self {
            Self::Donor => "/donor-dashboard",
            Self::Receiver => "/receiver-dashboard",
            Self::Admin => "/admin-dashboard",
        }
    }

    /// Whether users may pick this role for themselves at registration.
    #[must_use]
    pub const fn is_self_service(self) -> bool {
        matches!(self, Self::Donor | Self::Receiver)
    }

    /// The lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Donor => "donor",
            Self::Receiver => "receiver",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "donor" => Ok(Self::Donor),
            "receiver" => Ok(Self::Receiver),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}
