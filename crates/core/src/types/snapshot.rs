//! Portable ledger snapshot format.
//!
//! Version 1 is the bare JSON array the browser client kept under its
//! `foodRequests` storage key. Version 2 wraps the records with a header:
//!
//! ```json
//! { "schemaVersion": 2, "exportedAt": "2025-06-25T18:00:00Z", "requests": [ ... ] }
//! ```
//!
//! Version 1 records used millisecond timestamps as ids and free-form strings
//! for user ids. On import, numeric ids map to deterministic UUIDs and user
//! ids that are not UUIDs are dropped (the name and email still match).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{DonationId, PickupRequest, Quantity, RequestId, RequestStatus, UserId, lenient};

/// Errors that can occur when reading a snapshot.
#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    /// The input is not JSON.
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The snapshot was written by a newer version.
    #[error("unsupported snapshot schema version {found} (latest is {latest})")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u32,
        /// Latest version this build understands.
        latest: u32,
    },
    /// A record could not be converted.
    #[error("request #{index}: {reason}")]
    InvalidRecord {
        /// Position of the record in the file.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },
}

/// A versioned export of the whole ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub schema_version: u32,
    pub exported_at: DateTime<Utc>,
    pub requests: Vec<PickupRequest>,
}

impl LedgerSnapshot {
    /// Version written by this build.
    pub const SCHEMA_VERSION: u32 = 2;

    /// Version of the legacy bare-array format.
    pub const LEGACY_SCHEMA_VERSION: u32 = 1;

    /// Wrap `requests` in a snapshot stamped now.
    #[must_use]
    pub fn new(requests: Vec<PickupRequest>) -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION,
            exported_at: Utc::now(),
            requests,
        }
    }

    /// Read a snapshot in either the current or the legacy format.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON, a newer schema version, or a
    /// legacy record that cannot be converted.
    pub fn from_json(input: &str) -> Result<Self, SnapshotError> {
        match serde_json::from_str::<Value>(input)? {
            Value::Array(items) => Self::from_legacy(items),
            value => {
                let found = value
                    .get("schemaVersion")
                    .and_then(Value::as_u64)
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(0);
                if found > Self::SCHEMA_VERSION {
                    return Err(SnapshotError::UnsupportedVersion {
                        found,
                        latest: Self::SCHEMA_VERSION,
                    });
                }
                Ok(serde_json::from_value(value)?)
            }
        }
    }

    fn from_legacy(items: Vec<Value>) -> Result<Self, SnapshotError> {
        let requests = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let record: LegacyRequest =
                    serde_json::from_value(item).map_err(|e| SnapshotError::InvalidRecord {
                        index,
                        reason: e.to_string(),
                    })?;
                record
                    .into_request()
                    .map_err(|reason| SnapshotError::InvalidRecord { index, reason })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            schema_version: Self::LEGACY_SCHEMA_VERSION,
            exported_at: Utc::now(),
            requests,
        })
    }
}

/// High half of UUIDs derived from legacy numeric ids ("nowaste" in ASCII).
const LEGACY_ID_PREFIX: u64 = 0x006e_6f77_6173_7465;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRequest {
    #[serde(deserialize_with = "lenient::text")]
    id: String,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    receiver_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    receiver_name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    receiver_email: String,
    #[serde(default, deserialize_with = "lenient::text")]
    food_requested: String,
    #[serde(default)]
    quantity: Quantity,
    #[serde(default, deserialize_with = "lenient::text")]
    pickup_time: String,
    #[serde(default, deserialize_with = "lenient::text")]
    donor_name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    donor_contact: String,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    donor_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    location: String,
    #[serde(default, deserialize_with = "lenient::text")]
    status: String,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    request_date: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    donation_id: String,
}

impl LegacyRequest {
    fn into_request(self) -> Result<PickupRequest, String> {
        let id = legacy_request_id(&self.id)?;
        let status = match self.status.trim() {
            "" => RequestStatus::Pending,
            s => s.parse::<RequestStatus>()?,
        };
        let requested_at = match self.request_date.as_deref() {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| format!("invalid requestDate {raw:?}: {e}"))?,
            None => legacy_timestamp(&self.id).unwrap_or_else(Utc::now),
        };
        if self.donation_id.trim().is_empty() {
            return Err("missing donationId".to_owned());
        }

        Ok(PickupRequest {
            id,
            receiver_id: self.receiver_id.and_then(|r| r.parse().ok()),
            receiver_name: self.receiver_name,
            receiver_email: self.receiver_email,
            food_requested: self.food_requested,
            quantity: self.quantity.amount().unwrap_or(0),
            pickup_time: self.pickup_time,
            donor_name: self.donor_name,
            donor_contact: self.donor_contact,
            donor_id: self.donor_id.and_then(|d| d.parse::<UserId>().ok()),
            location: self.location,
            status,
            requested_at,
            donation_id: DonationId::new(self.donation_id),
        })
    }
}

fn legacy_request_id(raw: &str) -> Result<RequestId, String> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u64>() {
        return Ok(RequestId::from_uuid(Uuid::from_u64_pair(LEGACY_ID_PREFIX, n)));
    }
    raw.parse::<RequestId>()
        .map_err(|_| format!("unrecognised request id {raw:?}"))
}

// Legacy ids are `Date.now()` values.
fn legacy_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let millis = raw.trim().parse::<i64>().ok()?;
    DateTime::from_timestamp_millis(millis)
}
