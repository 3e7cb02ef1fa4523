//! Wire types of the external donation catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nowaste_core::lenient;
use nowaste_core::{Donation, DonationDraft, DonationId, DonationStatus, Quantity};

/// One record of the listing endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub donation_id: DonationId,
    #[serde(default, deserialize_with = "lenient::text")]
    pub donor_name: String,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub donor_email: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub contact: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub food_type: String,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub count: Option<u32>,
    #[serde(default)]
    pub quantity: Quantity,
    #[serde(default, deserialize_with = "lenient::text")]
    pub expiry_date: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub pickup_time: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub location: String,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub request_date: Option<String>,
}

impl From<CatalogItem> for Donation {
    fn from(item: CatalogItem) -> Self {
        let listed_at = item.request_date.as_deref().and_then(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        });

        Self {
            id: item.donation_id,
            donor_name: item.donor_name,
            donor_email: item.donor_email,
            contact: item.contact,
            category: item.category,
            food_type: item.food_type,
            estimated_count: item.count.unwrap_or(0),
            quantity: item.quantity,
            expiry_date: item.expiry_date,
            pickup_time: item.pickup_time,
            location: item.location,
            listed_at,
            status: DonationStatus::Confirmed,
        }
    }
}

/// Body of a submission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPayload {
    pub donor_name: String,
    pub contact: String,
    pub category: String,
    pub food_type: String,
    pub count: u32,
    pub quantity: String,
    pub expiry_date: String,
    pub pickup_time: String,
    pub location: String,
}

impl SubmitPayload {
    /// Payload for a validated form, submitted under `donor_name`.
    #[must_use]
    pub fn new(draft: &DonationDraft, donor_name: &str) -> Self {
        Self {
            donor_name: donor_name.to_owned(),
            contact: draft.contact.to_string(),
            category: draft.category.clone(),
            food_type: draft.food_type.clone(),
            count: draft.estimated_count,
            quantity: draft.quantity.to_string(),
            expiry_date: draft.expiry_date.format("%Y-%m-%d").to_string(),
            pickup_time: draft.pickup_time.clone(),
            location: draft.location.clone(),
        }
    }
}

/// Body of a submission response. Both fields are optional in practice.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    #[serde(default)]
    pub donation_id: Option<DonationId>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub error: Option<String>,
}

/// Body of a deletion request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest<'a> {
    pub donation_id: &'a DonationId,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nowaste_core::DonationForm;

    use super::*;

    #[test]
    fn test_item_with_numeric_fields() {
        let item: CatalogItem = serde_json::from_str(
            r#"{"donationId": 42, "donorName": "John Donor", "contact": 9876543210,
                "category": "Veg", "foodType": "Fried Rice", "count": "30",
                "quantity": 12, "expiryDate": "2026-06-30",
                "pickupTime": "2026-06-25T18:00", "location": "MG Road",
                "requestDate": "2026-06-24T10:00:00Z"}"#,
        )
        .unwrap();
        let donation = Donation::from(item);
        assert_eq!(donation.id.as_str(), "42");
        assert_eq!(donation.contact, "9876543210");
        assert_eq!(donation.available(), 30);
        assert_eq!(donation.quantity.amount(), Some(12));
        assert!(donation.listed_at.is_some());
        assert_eq!(donation.status, DonationStatus::Confirmed);
    }

    #[test]
    fn test_item_requires_id() {
        assert!(serde_json::from_str::<CatalogItem>(r#"{"foodType": "Rice"}"#).is_err());
    }

    #[test]
    fn test_payload_shape() {
        let form = DonationForm {
            contact: "9876543210".into(),
            category: "Snacks".into(),
            food_type: "Samosa".into(),
            estimated_count: "40".into(),
            quantity: "40 pieces".into(),
            expiry_date: "2026-01-01".into(),
            pickup_time: "2025-12-31T10:00".into(),
            location: "Station".into(),
        };
        let payload = SubmitPayload::new(&form.validate().unwrap(), "Jane Donor");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["donorName"], "Jane Donor");
        assert_eq!(json["count"], 40);
        assert_eq!(json["foodType"], "Samosa");
        assert_eq!(json["expiryDate"], "2026-01-01");
    }
}
