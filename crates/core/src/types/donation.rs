//! Donations, catalog filters and the donation submission form.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ContactNumber, DonationStatus, Quantity, User, ValidationErrors, lenient};

/// Identifier of a donation, issued by the external catalog.
///
/// Catalog ids are opaque strings (some older records carry numbers). Records
/// echoed locally before the catalog assigned an id use a `local-` prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DonationId(#[serde(deserialize_with = "lenient::text")] String);

impl DonationId {
    const LOCAL_PREFIX: &'static str = "local-";

    /// Wrap a catalog-issued id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh placeholder id for a record the catalog has not confirmed.
    #[must_use]
    pub fn local() -> Self {
        Self(format!("{}{}", Self::LOCAL_PREFIX, Uuid::new_v4()))
    }

    /// Whether this is a placeholder rather than a catalog id.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(Self::LOCAL_PREFIX)
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DonationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DonationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A surplus-food offer listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    /// Catalog id, or a local placeholder for unconfirmed echoes.
    pub id: DonationId,
    /// Name of the donor as submitted.
    pub donor_name: String,
    /// Donor email, when the catalog recorded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donor_email: Option<String>,
    /// Phone number for pickup coordination.
    pub contact: String,
    /// Food category, e.g. `Veg` or `Snacks`.
    pub category: String,
    /// What the food is, e.g. "Fried Rice".
    pub food_type: String,
    /// Estimated number of servings.
    pub estimated_count: u32,
    /// Free-text quantity.
    pub quantity: Quantity,
    /// Expiry date as `YYYY-MM-DD`.
    pub expiry_date: String,
    /// Pickup time as entered by the donor.
    pub pickup_time: String,
    /// Pickup location.
    pub location: String,
    /// When the donation was listed, if the catalog reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listed_at: Option<DateTime<Utc>>,
    /// Whether the catalog has confirmed this record.
    #[serde(default)]
    pub status: DonationStatus,
}

impl Donation {
    /// Servings still available to request.
    #[must_use]
    pub const fn available(&self) -> u32 {
        self.estimated_count
    }

    /// Whether `user` listed this donation, by name or email.
    #[must_use]
    pub fn is_listed_by(&self, user: &User) -> bool {
        let name = user.name.trim();
        (!name.is_empty() && self.donor_name.trim() == name)
            || self
                .donor_email
                .as_deref()
                .is_some_and(|email| user.email.matches(email))
    }
}

/// Catalog filter applied in-process over the full fetched set.
///
/// Empty criteria are ignored. Location and food type match case-insensitive
/// substrings; category matches exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DonationFilter {
    /// Substring of the pickup location.
    #[serde(deserialize_with = "lenient::opt_text")]
    pub location: Option<String>,
    /// Exact category.
    #[serde(deserialize_with = "lenient::opt_text")]
    pub category: Option<String>,
    /// Substring of the food type.
    #[serde(deserialize_with = "lenient::opt_text")]
    pub food_type: Option<String>,
    /// Minimum leading amount of the free-text quantity.
    #[serde(deserialize_with = "lenient::opt_u32")]
    pub min_quantity: Option<u32>,
    /// Minimum estimated serving count.
    #[serde(deserialize_with = "lenient::opt_u32")]
    pub min_count: Option<u32>,
}

impl DonationFilter {
    /// Whether `donation` satisfies every criterion.
    #[must_use]
    pub fn matches(&self, donation: &Donation) -> bool {
        fn contains(haystack: &str, needle: Option<&str>) -> bool {
            needle.is_none_or(|n| haystack.to_lowercase().contains(&n.trim().to_lowercase()))
        }

        contains(&donation.location, self.location.as_deref())
            && contains(&donation.food_type, self.food_type.as_deref())
            && self
                .category
                .as_deref()
                .is_none_or(|c| donation.category == c.trim())
            && self
                .min_quantity
                .is_none_or(|min| donation.quantity.amount().is_some_and(|q| q >= min))
            && self
                .min_count
                .is_none_or(|min| donation.estimated_count >= min)
    }

    /// Keep only matching donations.
    #[must_use]
    pub fn apply(&self, donations: Vec<Donation>) -> Vec<Donation> {
        donations.into_iter().filter(|d| self.matches(d)).collect()
    }
}

/// Raw donation form as submitted by a donor.
///
/// Every field is text so validation can report each problem against the
/// field the donor typed into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DonationForm {
    #[serde(deserialize_with = "lenient::text")]
    pub contact: String,
    #[serde(alias = "foodCategory", deserialize_with = "lenient::text")]
    pub category: String,
    #[serde(deserialize_with = "lenient::text")]
    pub food_type: String,
    #[serde(alias = "count", deserialize_with = "lenient::text")]
    pub estimated_count: String,
    #[serde(deserialize_with = "lenient::text")]
    pub quantity: String,
    #[serde(deserialize_with = "lenient::text")]
    pub expiry_date: String,
    #[serde(deserialize_with = "lenient::text")]
    pub pickup_time: String,
    #[serde(deserialize_with = "lenient::text")]
    pub location: String,
}

/// A donation form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationDraft {
    pub contact: ContactNumber,
    pub category: String,
    pub food_type: String,
    pub estimated_count: u32,
    pub quantity: Quantity,
    pub expiry_date: NaiveDate,
    pub pickup_time: String,
    pub location: String,
}

impl DonationDraft {
    /// Category used when the donor leaves it blank.
    pub const DEFAULT_CATEGORY: &'static str = "Veg";

    /// Latest expiry year the form accepts.
    pub const MAX_EXPIRY_YEAR: i32 = 2100;
}

impl DonationForm {
    /// Validate every field, collecting one message per failing field.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages if any field is invalid.
    pub fn validate(&self) -> Result<DonationDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let contact = errors.check("contact", ContactNumber::parse(&self.contact));
        let food_type = required(&mut errors, "foodType", &self.food_type, "Food type is required");
        let estimated_count = errors.check("estimatedCount", parse_count(&self.estimated_count));
        let quantity = errors.check("quantity", Quantity::parse(&self.quantity));
        let expiry_date = errors.check("expiryDate", parse_expiry(&self.expiry_date));
        let pickup_time = required(
            &mut errors,
            "pickupTime",
            &self.pickup_time,
            "Pickup time is required",
        );
        let location = required(&mut errors, "location", &self.location, "Location is required");

        let category = match self.category.trim() {
            "" => DonationDraft::DEFAULT_CATEGORY.to_owned(),
            c => c.to_owned(),
        };

        match (
            contact,
            food_type,
            estimated_count,
            quantity,
            expiry_date,
            pickup_time,
            location,
        ) {
            (
                Some(contact),
                Some(food_type),
                Some(estimated_count),
                Some(quantity),
                Some(expiry_date),
                Some(pickup_time),
                Some(location),
            ) if errors.is_empty() => Ok(DonationDraft {
                contact,
                category,
                food_type,
                estimated_count,
                quantity,
                expiry_date,
                pickup_time,
                location,
            }),
            _ => Err(errors),
        }
    }
}

fn required(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &str,
    message: &str,
) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, message);
        None
    } else {
        Some(value.to_owned())
    }
}

#[derive(thiserror::Error, Debug)]
enum CountError {
    #[error("Estimated count is required")]
    Empty,
    #[error("Estimated count must be a positive whole number")]
    NotPositive,
}

fn parse_count(raw: &str) -> Result<u32, CountError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CountError::Empty);
    }
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CountError::NotPositive),
    }
}

#[derive(thiserror::Error, Debug)]
enum ExpiryError {
    #[error("Expiry date is required")]
    Empty,
    #[error("Expiry year must be 4 digits and no later than 2100")]
    Year,
    #[error("Expiry date is not a valid date")]
    Invalid,
}

fn parse_expiry(raw: &str) -> Result<NaiveDate, ExpiryError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ExpiryError::Empty);
    }
    let year = raw.split('-').next().unwrap_or_default();
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ExpiryError::Year);
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ExpiryError::Invalid)?;
    if date.year() > DonationDraft::MAX_EXPIRY_YEAR {
        return Err(ExpiryError::Year);
    }
    Ok(date)
}
