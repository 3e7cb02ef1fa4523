//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                            - Liveness
//! GET  /health/ready                      - Readiness (database ping)
//!
//! # Auth
//! POST /auth/register                     - Create account and sign in
//! POST /auth/login                        - Sign in
//! POST /auth/logout                       - Sign out
//! GET  /auth/me                           - Signed-in user
//!
//! # API (requires auth)
//! PUT  /api/profile                       - Edit own profile
//! GET  /api/donations                     - Open donations (receiver, admin)
//! POST /api/donations                     - Submit donation (donor)
//! GET  /api/donor/dashboard               - Own donations (donor)
//! GET  /api/donor/requests                - Approval queue (donor)
//! GET  /api/donor/requests/stream         - Approval queue, SSE (donor)
//! POST /api/donor/requests/{id}/accept    - Accept (donor)
//! POST /api/donor/requests/{id}/decline   - Decline (donor)
//! POST /api/receiver/requests             - Request pickup (receiver)
//! GET  /api/receiver/requests             - Request history (receiver)
//! GET  /api/receiver/requests/stream      - Request history, SSE (receiver)
//! GET  /api/admin/overview                - Everything (admin)
//! GET  /api/admin/ledger/export           - Ledger snapshot (admin)
//! ```

pub mod admin;
pub mod auth;
pub mod donations;
pub mod donor;
pub mod health;
pub mod profile;
pub mod receiver;

use axum::{
    Router,
    response::sse::Event,
    routing::{get, post, put},
};
use serde::Serialize;
use tracing::error;

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the donor routes router.
pub fn donor_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(donor::dashboard))
        .route("/requests", get(donor::requests))
        .route("/requests/stream", get(donor::stream))
        .route("/requests/{id}/accept", post(donor::accept))
        .route("/requests/{id}/decline", post(donor::decline))
}

/// Create the receiver routes router.
pub fn receiver_routes() -> Router<AppState> {
    Router::new()
        .route("/requests", get(receiver::history).post(receiver::create))
        .route("/requests/stream", get(receiver::stream))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/overview", get(admin::overview))
        .route("/ledger/export", get(admin::export_ledger))
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", put(profile::update))
        .route("/donations", get(donations::index).post(donations::create))
        .nest("/donor", donor_routes())
        .nest("/receiver", receiver_routes())
        .nest("/admin", admin_routes())
}

/// Create all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes())
        .nest("/api", api_routes())
}

/// A named SSE event carrying `data` as JSON.
fn json_event(name: &'static str, data: &impl Serialize) -> Event {
    let event = Event::default().event(name);
    match serde_json::to_string(data) {
        Ok(json) => event.data(json),
        Err(e) => {
            error!(error = %e, "Failed to serialize event");
            event.comment("serialization error")
        }
    }
}
