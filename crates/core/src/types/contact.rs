//! Donor contact number.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ContactNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// The input is empty.
    #[error("Contact is required")]
    Empty,
    /// The input is not exactly ten digits.
    #[error("Contact must be exactly {expected} digits")]
    WrongLength {
        /// Required number of digits.
        expected: usize,
    },
}

/// A ten-digit phone number given by a donor for pickup coordination.
///
/// Only ASCII digits are accepted; separators such as spaces or dashes are
/// rejected rather than stripped so the stored value is what the donor typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactNumber(String);

impl ContactNumber {
    /// Number of digits a contact number must have.
    pub const DIGITS: usize = 10;

    /// Parse a contact number.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::Empty`] for blank input and
    /// [`ContactError::WrongLength`] unless the trimmed input is exactly ten
    /// ASCII digits.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::Empty);
        }
        if s.len() != Self::DIGITS || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ContactError::WrongLength {
                expected: Self::DIGITS,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
