//! Donation catalog route handlers.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use nowaste_core::{Donation, DonationFilter, DonationForm, Role};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;
use crate::views::DonationListing;

/// Open donations, filtered in-process.
pub async fn index(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(filter): Query<DonationFilter>,
) -> Result<Json<DonationListing>> {
    auth.require_any(&[Role::Receiver, Role::Admin])?;
    let donations = state.catalog().list_open_donations().await;
    Ok(Json(DonationListing::build(donations, &filter)))
}

/// Submit a new donation.
pub async fn create(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(form): Json<DonationForm>,
) -> Result<(StatusCode, Json<Donation>)> {
    let donor = auth.require_role(Role::Donor)?;
    let donation = state.submissions().submit(&donor, &form).await?;
    Ok((StatusCode::CREATED, Json(donation)))
}
