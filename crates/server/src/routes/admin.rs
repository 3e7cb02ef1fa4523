//! Administrator route handlers. Read-only, full scope.

use axum::{Json, extract::State};

use nowaste_core::{LedgerSnapshot, Role};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;
use crate::views::AdminOverview;

/// Every profile, donation and request, with request counts.
pub async fn overview(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<AdminOverview>> {
    auth.require_role(Role::Admin)?;
    let (users, donations, requests) = tokio::join!(
        state.auth().list_profiles(),
        state.catalog().list_open_donations(),
        state.ledger().list_all(),
    );
    Ok(Json(AdminOverview::build(&users?, donations, requests?)))
}

/// The whole ledger as a snapshot.
pub async fn export_ledger(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<LedgerSnapshot>> {
    auth.require_role(Role::Admin)?;
    Ok(Json(state.ledger().export().await?))
}
