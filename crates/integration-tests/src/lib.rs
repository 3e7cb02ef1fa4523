//! Integration test harness for the No Waste Food Network server.
//!
//! Each test boots the full router in-process on an ephemeral port, backed by
//! in-memory stores and a [`FakeCatalog`] that stands in for the external
//! donation catalog. No database or network access is needed.
//!
//! ```rust,ignore
//! let app = TestApp::spawn().await;
//! app.catalog.add_donation("D1", "John Donor", 30);
//!
//! let receiver = app.client();
//! app.register(&receiver, "Food Bank", "bank@example.org", "receiver").await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use reqwest::{Client, Response};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_sessions::MemoryStore;
use url::Url;

use nowaste_server::config::{CatalogConfig, ServerConfig};
use nowaste_server::middleware::create_session_layer;
use nowaste_server::state::{AppState, Stores};

/// Password used for every account the harness registers.
pub const PASSWORD: &str = "secret123";

/// Poll interval of the ledger subscriptions under test.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

// =============================================================================
// Fake catalog
// =============================================================================

#[derive(Default)]
struct CatalogState {
    donations: Mutex<Vec<Value>>,
    deleted: Mutex<Vec<String>>,
    submits: AtomicUsize,
    fail_deletes: AtomicBool,
}

/// An in-process donation catalog speaking the listing, submission and
/// deletion protocol on a single `/donations` endpoint.
#[derive(Clone)]
pub struct FakeCatalog {
    state: Arc<CatalogState>,
    addr: SocketAddr,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteBody {
    donation_id: Value,
}

impl FakeCatalog {
    async fn spawn() -> Self {
        let state = Arc::new(CatalogState::default());
        let router = Router::new()
            .route(
                "/donations",
                get(list_donations)
                    .post(submit_donation)
                    .delete(delete_donation),
            )
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { state, addr }
    }

    /// URL of the single catalog endpoint.
    #[must_use]
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/donations", self.addr)).unwrap()
    }

    /// List a donation by `donor_name` with `count` servings.
    pub fn add_donation(&self, id: &str, donor_name: &str, count: u32) {
        self.state.donations.lock().unwrap().push(json!({
            "donationId": id,
            "donorName": donor_name,
            "contact": "9876543210",
            "category": "Veg",
            "foodType": "Fried Rice",
            "count": count,
            "quantity": format!("{count} plates"),
            "expiryDate": "2030-06-30",
            "pickupTime": "2030-06-25T18:00",
            "location": "MG Road",
        }));
    }

    /// Ids removed through the deletion endpoint, in order.
    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        self.state.deleted.lock().unwrap().clone()
    }

    /// Number of submissions received.
    #[must_use]
    pub fn submits(&self) -> usize {
        self.state.submits.load(Ordering::SeqCst)
    }

    /// Make the deletion endpoint answer 500 until switched back.
    pub fn fail_deletes(&self, fail: bool) {
        self.state.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

async fn list_donations(State(state): State<Arc<CatalogState>>) -> Json<Vec<Value>> {
    Json(state.donations.lock().unwrap().clone())
}

async fn submit_donation(
    State(state): State<Arc<CatalogState>>,
    Json(mut body): Json<Value>,
) -> Json<Value> {
    let n = state.submits.fetch_add(1, Ordering::SeqCst) + 1;
    let id = format!("S{n}");
    body["donationId"] = json!(id);
    state.donations.lock().unwrap().push(body);
    Json(json!({ "donationId": id }))
}

async fn delete_donation(
    State(state): State<Arc<CatalogState>>,
    Json(body): Json<DeleteBody>,
) -> (StatusCode, Json<Value>) {
    if state.fail_deletes.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "catalog unavailable" })),
        );
    }

    let id = match body.donation_id {
        Value::String(s) => s,
        other => other.to_string(),
    };
    let mut donations = state.donations.lock().unwrap();
    let before = donations.len();
    donations.retain(|d| d["donationId"] != json!(id));
    let found = donations.len() < before;
    drop(donations);

    state.deleted.lock().unwrap().push(id);
    if found {
        (StatusCode::OK, Json(json!({ "ok": true })))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
    }
}

// =============================================================================
// Application
// =============================================================================

/// A running server plus its fake catalog.
pub struct TestApp {
    pub base_url: String,
    pub catalog: FakeCatalog,
    pub state: AppState,
}

impl TestApp {
    /// Boot the server over fresh in-memory stores.
    pub async fn spawn() -> Self {
        Self::spawn_with(Stores::memory()).await
    }

    /// Boot the server over the given stores.
    pub async fn spawn_with(stores: Stores) -> Self {
        let catalog = FakeCatalog::spawn().await;
        let config = test_config(&catalog);

        let session_layer = create_session_layer(MemoryStore::default(), &config);
        let state = AppState::with_stores(config, stores, None).unwrap();
        let router = nowaste_server::app(state.clone(), session_layer);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            catalog,
            state,
        }
    }

    /// A client with its own cookie jar, i.e. its own session.
    #[must_use]
    pub fn client(&self) -> Client {
        Client::builder().cookie_store(true).build().unwrap()
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Register and sign in `client`, returning the sign-in body.
    pub async fn register(&self, client: &Client, name: &str, email: &str, role: &str) -> Value {
        let response = client
            .post(self.url("/auth/register"))
            .json(&json!({
                "name": name,
                "email": email,
                "password": PASSWORD,
                "confirmPassword": PASSWORD,
                "role": role,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED, "registration failed");
        response.json().await.unwrap()
    }

    /// GET `path` as `client`.
    pub async fn get(&self, client: &Client, path: &str) -> Response {
        client.get(self.url(path)).send().await.unwrap()
    }

    /// POST `body` to `path` as `client`.
    pub async fn post(&self, client: &Client, path: &str, body: &Value) -> Response {
        client.post(self.url(path)).json(body).send().await.unwrap()
    }

    /// Request a pickup of `donation_id` and return the new request's id.
    pub async fn request_pickup(&self, receiver: &Client, donation_id: &str) -> String {
        let response = self
            .post(
                receiver,
                "/api/receiver/requests",
                &json!({ "donationId": donation_id }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "pickup request failed");
        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_owned()
    }
}

fn test_config(catalog: &FakeCatalog) -> ServerConfig {
    ServerConfig {
        database_url: None,
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://127.0.0.1".to_string(),
        session_secret: SecretString::from("k3Jd9-fQz2LmX8vRtY6wNp4HsB7cEa1Ug5"),
        catalog: CatalogConfig {
            list_url: catalog.url(),
            submit_url: catalog.url(),
            delete_url: catalog.url(),
            cache_ttl: Duration::ZERO,
            timeout: Duration::from_secs(5),
        },
        ledger_poll_interval: POLL_INTERVAL,
        sentry_dsn: None,
        sentry_environment: None,
    }
}
