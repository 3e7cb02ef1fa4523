//! Receiver request route handlers.

use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{instrument, warn};

use nowaste_core::{Donation, DonationId, LedgerScope, PickupRequest, Role, UserId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;
use crate::views::RequestHistory;

/// Body of a new pickup request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    pub donation_id: DonationId,
}

/// Request a pickup of an open donation.
#[instrument(skip_all, fields(donation_id = %body.donation_id))]
pub async fn create(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(body): Json<NewRequest>,
) -> Result<(StatusCode, Json<PickupRequest>)> {
    let receiver = auth.require_role(Role::Receiver)?;
    let donation = find_donation(&state, &body.donation_id).await?;
    let donor_id = resolve_donor(&state, &donation).await;

    let request = state
        .ledger()
        .create_request(&donation, &receiver, donor_id)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// The receiver's request history.
pub async fn history(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<RequestHistory>> {
    let receiver = auth.require_role(Role::Receiver)?;
    let requests = state.ledger().list_for_receiver(&receiver).await?;
    Ok(Json(RequestHistory::build(requests)))
}

/// Live request history as server-sent events.
///
/// Sends the current history at once and again whenever a donor decides
/// one of the receiver's requests.
pub async fn stream(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let receiver = auth.require_role(Role::Receiver)?;
    let updates = state
        .ledger()
        .subscribe(LedgerScope::for_user(&receiver))
        .into_stream()
        .map(|requests| Ok(super::json_event("requests", &RequestHistory::build(requests))));
    Ok(Sse::new(updates).keep_alive(KeepAlive::default()))
}

/// Look the donation up in the cached listing, then in a fresh one.
async fn find_donation(state: &AppState, id: &DonationId) -> Result<Donation> {
    if let Some(found) = state
        .catalog()
        .list_open_donations()
        .await
        .into_iter()
        .find(|d| &d.id == id)
    {
        return Ok(found);
    }

    state
        .catalog()
        .fetch_open_donations()
        .await?
        .into_iter()
        .find(|d| &d.id == id)
        .ok_or_else(|| AppError::NotFound(format!("donation {id} is no longer available")))
}

/// The registered donor who listed `donation`, if one can be found.
async fn resolve_donor(state: &AppState, donation: &Donation) -> Option<UserId> {
    match state
        .profiles()
        .find_by_name_or_email(&donation.donor_name, donation.donor_email.as_deref())
        .await
    {
        Ok(donor) => donor.map(|d| d.id),
        Err(e) => {
            warn!(
                donation_id = %donation.id,
                error = %e,
                "Donor lookup failed, matching by name only"
            );
            None
        }
    }
}
