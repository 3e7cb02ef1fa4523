//! Deserialization helpers for records written by loosely typed clients.
//!
//! Use with `#[serde(deserialize_with = "...")]`.
//!
//! The catalog and the legacy browser ledger store the same field as a string
//! in one record and as a number in the next.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Flag(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Unsigned(n) => n.to_string(),
            Self::Signed(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Flag(b) => b.to_string(),
        }
    }
}

/// A scalar rendered as text. `null` becomes the empty string.
///
/// # Errors
///
/// Fails on arrays and objects.
pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?
        .map(Scalar::into_text)
        .unwrap_or_default())
}

/// An optional scalar rendered as text. `null` and blank strings become `None`.
///
/// # Errors
///
/// Fails on arrays and objects.
pub fn opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?
        .map(Scalar::into_text)
        .filter(|s| !s.trim().is_empty()))
}

/// An optional unsigned number given as a number or numeric text.
///
/// Blank text is `None`, so empty query parameters mean "no filter".
///
/// # Errors
///
/// Fails on anything that is not a whole number in `u32` range.
pub fn opt_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let Some(raw) = opt_text(deserializer)? else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("expected a whole number, got {raw:?}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "super::text")]
        text: String,
        #[serde(default, deserialize_with = "super::opt_text")]
        opt: Option<String>,
        #[serde(default, deserialize_with = "super::opt_u32")]
        num: Option<u32>,
    }

    #[test]
    fn test_numbers_become_text() {
        let p: Probe = serde_json::from_str(r#"{"text": 9876543210, "opt": 7}"#).unwrap();
        assert_eq!(p.text, "9876543210");
        assert_eq!(p.opt.as_deref(), Some("7"));
    }

    #[test]
    fn test_null_and_blank() {
        let p: Probe = serde_json::from_str(r#"{"text": null, "opt": "  ", "num": ""}"#).unwrap();
        assert_eq!(p.text, "");
        assert_eq!(p.opt, None);
        assert_eq!(p.num, None);
    }

    #[test]
    fn test_u32_from_text_or_number() {
        let p: Probe = serde_json::from_str(r#"{"num": "12"}"#).unwrap();
        assert_eq!(p.num, Some(12));
        let p: Probe = serde_json::from_str(r#"{"num": 3}"#).unwrap();
        assert_eq!(p.num, Some(3));
        assert!(serde_json::from_str::<Probe>(r#"{"num": "lots"}"#).is_err());
    }
}
