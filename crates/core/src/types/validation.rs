//! Per-field form validation errors.

use std::collections::BTreeMap;

use serde::Serialize;

/// Validation failures keyed by form field name.
///
/// Each field carries at most one message: the first rule it fails.
#[derive(thiserror::Error, Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(BTreeMap<&'static str, String>);

impl ValidationErrors {
    /// An empty set of errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field` unless it already has one.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    /// Record the error of `result` under `field`, returning the success value.
    pub fn check<T, E: std::fmt::Display>(
        &mut self,
        field: &'static str,
        result: Result<T, E>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.add(field, e.to_string());
                None
            }
        }
    }

    /// Whether no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Message recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Failing field names in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    /// `Ok(value)` when nothing failed, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` if any field failed.
    pub fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_message_wins() {
        let mut errors = ValidationErrors::new();
        errors.add("contact", "Contact is required");
        errors.add("contact", "Contact must be exactly 10 digits");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("contact"), Some("Contact is required"));
    }

    #[test]
    fn test_check_records_error_display() {
        let mut errors = ValidationErrors::new();
        let parsed: Option<u32> = errors.check("count", "x".parse::<u32>());
        assert!(parsed.is_none());
        assert!(errors.get("count").is_some());
    }

    #[test]
    fn test_into_result() {
        assert_eq!(ValidationErrors::new().into_result(|| 1), Ok(1));
        let mut errors = ValidationErrors::new();
        errors.add("name", "Name is required");
        assert!(errors.into_result(|| 1).is_err());
    }
}
