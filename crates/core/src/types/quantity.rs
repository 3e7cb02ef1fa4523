//! Free-text donation quantity.
//!
//! Donors describe quantity however they like ("30", "12 kg", "3 trays"), so
//! the text is kept verbatim. Anything that needs a number (filters, request
//! sizing) uses [`Quantity::amount`], which reads the leading unsigned integer
//! of the trimmed text. Text without a leading integer has no amount and never
//! satisfies a numeric minimum.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when parsing a [`Quantity`] from form input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The input is blank.
    #[error("Quantity is required")]
    Empty,
}

/// A donation quantity as entered by the donor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(transparent)]
pub struct Quantity(String);

impl Quantity {
    /// Parse a quantity from form input.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::Empty`] if the trimmed input is empty.
    pub fn parse(s: &str) -> Result<Self, QuantityError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }
        Ok(Self(s.to_owned()))
    }

    /// Wrap text read from an external source without validation.
    #[must_use]
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The quantity text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leading unsigned integer of the text, if any.
    ///
    /// Saturates at `u32::MAX` for absurdly long digit runs.
    #[must_use]
    pub fn amount(&self) -> Option<u32> {
        let digits: String = self
            .0
            .trim_start()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        if digits.is_empty() {
            return None;
        }
        Some(digits.parse::<u32>().unwrap_or(u32::MAX))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// The catalog returns quantity as a string or as a bare number depending on
// which client created the record.
impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Unsigned(u64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Unsigned(n) => Self(n.to_string()),
            Raw::Float(f) => Self(f.to_string()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requires_text() {
        assert_eq!(Quantity::parse("  "), Err(QuantityError::Empty));
        assert_eq!(Quantity::parse(" 12 kg ").unwrap().as_str(), "12 kg");
    }

    #[test]
    fn test_amount_reads_leading_integer() {
        assert_eq!(Quantity::from_raw("30").amount(), Some(30));
        assert_eq!(Quantity::from_raw(" 12 kg").amount(), Some(12));
        assert_eq!(Quantity::from_raw("3.5 litres").amount(), Some(3));
    }

    #[test]
    fn test_amount_absent_without_leading_digits() {
        assert_eq!(Quantity::from_raw("about 20").amount(), None);
        assert_eq!(Quantity::from_raw("").amount(), None);
    }

    #[test]
    fn test_amount_saturates() {
        assert_eq!(Quantity::from_raw("99999999999999").amount(), Some(u32::MAX));
    }

    #[test]
    fn test_deserialize_string_or_number() {
        let q: Quantity = serde_json::from_str("\"5 boxes\"").unwrap();
        assert_eq!(q.as_str(), "5 boxes");
        let q: Quantity = serde_json::from_str("30").unwrap();
        assert_eq!(q.amount(), Some(30));
    }
}
