//! No Waste Food Network server library.
//!
//! The HTTP service that owns the pickup request ledger, fronts the external
//! donation catalog and serves JSON role views. Exposed as a library so the
//! router can be booted in-process by tests and tools.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod views;

use axum::{Router, extract::Request};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use state::AppState;

/// Build the full application router.
///
/// Layers, outermost first: Sentry, tracing, request id, sessions.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = tracing::field::Empty,
        )
    });

    routes::routes()
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(trace_layer)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use secrecy::SecretString;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;
    use url::Url;

    use super::*;
    use crate::config::{CatalogConfig, ServerConfig};
    use crate::middleware::create_session_layer;
    use crate::middleware::request_id::REQUEST_ID_HEADER;
    use crate::state::Stores;

    fn router() -> Router {
        let catalog = Url::parse("http://127.0.0.1:9/donations").unwrap();
        let config = ServerConfig {
            database_url: None,
            host: [127, 0, 0, 1].into(),
            port: 0,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("k3Jd9-fQz2LmX8vRtY6wNp4HsB7cEa1Ug5"),
            catalog: CatalogConfig {
                list_url: catalog.clone(),
                submit_url: catalog.clone(),
                delete_url: catalog,
                cache_ttl: Duration::ZERO,
                timeout: Duration::from_secs(1),
            },
            ledger_poll_interval: Duration::from_secs(5),
            sentry_dsn: None,
            sentry_environment: None,
        };
        let session_layer = create_session_layer(MemoryStore::default(), &config);
        let state = AppState::with_stores(config, Stores::memory(), None).unwrap();
        app(state, session_layer)
    }

    #[tokio::test]
    async fn test_health_echoes_request_id() {
        let response = router()
            .oneshot(
                Request::get("/health")
                    .header(REQUEST_ID_HEADER, "trace-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "trace-42");
    }

    #[tokio::test]
    async fn test_request_id_generated_when_absent() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert_eq!(id.len(), 36);
    }

    #[tokio::test]
    async fn test_readiness_without_database() {
        let response = router()
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_rejects_anonymous() {
        let response = router()
            .oneshot(Request::get("/api/donations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
