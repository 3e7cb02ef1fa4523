//! User profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Email, Role, UserId};

/// A signed-in user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Identity id, shared with the identity provider.
    pub id: UserId,
    /// Display name as entered at registration.
    pub name: String,
    /// Contact email.
    pub email: Email,
    /// Role in the network.
    pub role: Role,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Profile synthesized for an identity that has no profile record.
    ///
    /// Such users are treated as donors with an empty name.
    #[must_use]
    pub fn fallback(id: UserId, email: Email) -> Self {
        Self {
            id,
            name: String::new(),
            email,
            role: Role::Donor,
            created_at: Utc::now(),
        }
    }

    /// Name shown on dashboards.
    ///
    /// Donor names registered as "Jane Donor" are shown as "Jane". An empty
    /// name falls back to the local part of the email.
    #[must_use]
    pub fn display_name(&self) -> &str {
        let name = self.name.trim();
        if name.is_empty() {
            return self.email.local_part();
        }
        if self.role == Role::Donor {
            if let Some(stripped) = name.strip_suffix(" Donor") {
                let stripped = stripped.trim_end();
                if !stripped.is_empty() {
                    return stripped;
                }
            }
        }
        name
    }

    /// Whether the user holds `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(name: &str, role: Role) -> User {
        User {
            id: UserId::generate(),
            name: name.to_owned(),
            email: Email::parse("john@example.com").unwrap(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_fallback_is_unnamed_donor() {
        let id = UserId::generate();
        let fallback = User::fallback(id, Email::parse("new@example.com").unwrap());
        assert_eq!(fallback.id, id);
        assert_eq!(fallback.role, Role::Donor);
        assert!(fallback.name.is_empty());
        assert_eq!(fallback.display_name(), "new");
    }

    #[test]
    fn test_display_name_strips_donor_suffix() {
        assert_eq!(user("John Donor", Role::Donor).display_name(), "John");
        assert_eq!(user("Donor", Role::Donor).display_name(), "Donor");
        assert_eq!(
            user("Food Bank Donor", Role::Receiver).display_name(),
            "Food Bank Donor"
        );
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(user("Jane", Role::Receiver)).unwrap();
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["role"], "receiver");
    }
}
