//! Client for the external donation catalog.
//!
//! The catalog is three independently deployed HTTP endpoints: a listing
//! (GET, every open donation), a submission (POST) and a deletion (DELETE).
//!
//! # Failure policy
//!
//! - [`CatalogClient::list_open_donations`] fails soft: any transport or parse
//!   error is logged and yields an empty list. Individual malformed records
//!   are skipped.
//! - Submissions and deletions return [`CatalogError`] to the caller.
//!
//! # Caching
//!
//! Listings are shared through a `moka` cache with a short TTL so that
//! several dashboards open at once cost one fetch. Failed reads are never
//! cached. Submissions and deletions invalidate the cache. Filtering happens
//! in-process over the full listing; nothing is pushed to the catalog.

pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use nowaste_core::{Donation, DonationId};

use crate::config::CatalogConfig;
pub use types::SubmitPayload;
use types::{CatalogItem, DeleteRequest, SubmitResponse};

/// Errors that can occur when talking to the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body was not what the endpoint is documented to return.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Endpoint accepted the request but reported an error in the body.
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Something that can withdraw a donation from the catalog.
///
/// The request ledger depends on this rather than on [`CatalogClient`] so the
/// accept flow can be exercised without HTTP.
#[async_trait]
pub trait DonationRemover: Send + Sync {
    /// Remove `id` from the catalog. Removing an absent donation succeeds.
    async fn delete_donation(&self, id: &DonationId) -> Result<(), CatalogError>;
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    OpenDonations,
}

/// Client for the donation catalog endpoints.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    client: reqwest::Client,
    list_url: Url,
    submit_url: Url,
    delete_url: Url,
    cache: Option<Cache<CacheKey, Arc<Vec<Donation>>>>,
}

impl CatalogClient {
    /// Create a new catalog client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let cache = (!config.cache_ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(1)
                .time_to_live(config.cache_ttl)
                .build()
        });

        Ok(Self {
            inner: Arc::new(CatalogClientInner {
                client,
                list_url: config.list_url.clone(),
                submit_url: config.submit_url.clone(),
                delete_url: config.delete_url.clone(),
                cache,
            }),
        })
    }

    /// Every open donation, or an empty list if the catalog cannot be read.
    pub async fn list_open_donations(&self) -> Vec<Donation> {
        if let Some(cache) = &self.inner.cache
            && let Some(donations) = cache.get(&CacheKey::OpenDonations).await
        {
            debug!("Cache hit for open donations");
            return donations.as_ref().clone();
        }

        match self.fetch_open_donations().await {
            Ok(donations) => {
                if let Some(cache) = &self.inner.cache {
                    cache
                        .insert(CacheKey::OpenDonations, Arc::new(donations.clone()))
                        .await;
                }
                donations
            }
            Err(e) => {
                warn!(
                    error = %e,
                    url = %self.inner.list_url,
                    "Catalog read failed, showing no donations"
                );
                Vec::new()
            }
        }
    }

    /// Fetch the listing, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the endpoint answers with a
    /// non-success status, or the body is not a JSON array.
    #[instrument(skip(self))]
    pub async fn fetch_open_donations(&self) -> Result<Vec<Donation>, CatalogError> {
        let response = self
            .inner
            .client
            .get(self.inner.list_url.clone())
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = error_message(&response.text().await.unwrap_or_default());
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        parse_listing(body)
    }

    /// Submit a new donation.
    ///
    /// Returns the catalog-assigned id when the endpoint reports one.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the endpoint answers with a
    /// non-success status, or it reports an error in a success body.
    #[instrument(skip(self, payload), fields(food_type = %payload.food_type))]
    pub async fn submit(
        &self,
        payload: &SubmitPayload,
    ) -> Result<Option<DonationId>, CatalogError> {
        let response = self
            .inner
            .client
            .post(self.inner.submit_url.clone())
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let parsed: SubmitResponse = serde_json::from_str(&text).unwrap_or_default();
        if parsed.donation_id.is_none()
            && let Some(error) = parsed.error
        {
            return Err(CatalogError::Rejected(error));
        }

        self.invalidate().await;
        Ok(parsed.donation_id)
    }

    /// Drop the cached listing.
    pub async fn invalidate(&self) {
        if let Some(cache) = &self.inner.cache {
            cache.invalidate(&CacheKey::OpenDonations).await;
        }
    }
}

#[async_trait]
impl DonationRemover for CatalogClient {
    #[instrument(skip(self), fields(donation_id = %id))]
    async fn delete_donation(&self, id: &DonationId) -> Result<(), CatalogError> {
        let response = self
            .inner
            .client
            .delete(self.inner.delete_url.clone())
            .json(&DeleteRequest { donation_id: id })
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            let message = error_message(&response.text().await.unwrap_or_default());
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message,
            });
        }

        self.invalidate().await;
        Ok(())
    }
}

/// Convert a listing body into donations, skipping malformed records.
fn parse_listing(body: Value) -> Result<Vec<Donation>, CatalogError> {
    let Value::Array(items) = body else {
        return Err(CatalogError::Parse(format!(
            "expected an array of donations, got {}",
            error_message(&body.to_string())
        )));
    };

    let total = items.len();
    let donations: Vec<Donation> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<CatalogItem>(item) {
            Ok(item) => Some(Donation::from(item)),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed catalog record");
                None
            }
        })
        .collect();

    debug!(total, parsed = donations.len(), "Catalog listing parsed");
    Ok(donations)
}

/// Extract `{"error": "..."}` from a body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<SubmitResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_skips_malformed() {
        let body = serde_json::json!([
            {"donationId": "D1", "foodType": "Fried Rice", "count": 30},
            {"foodType": "no id"},
            "not an object",
            {"donationId": "D2", "count": -4},
            {"donationId": "D3", "foodType": "Samosa"}
        ]);
        let ids: Vec<_> = parse_listing(body)
            .unwrap()
            .into_iter()
            .map(|d| d.id.to_string())
            .collect();
        assert_eq!(ids, ["D1", "D3"]);
    }

    #[test]
    fn test_parse_listing_rejects_object() {
        let body = serde_json::json!({"error": "table missing"});
        let err = parse_listing(body).unwrap_err();
        assert!(matches!(err, CatalogError::Parse(ref m) if m.contains("table missing")));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(r#"{"error": "bad count"}"#), "bad count");
        assert_eq!(error_message("Internal Server Error"), "Internal Server Error");
    }
}
