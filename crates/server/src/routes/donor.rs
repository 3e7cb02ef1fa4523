//! Donor dashboard and approval route handlers.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use tracing::instrument;

use nowaste_core::{Decision, LedgerScope, PickupRequest, RequestId, Role};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::state::AppState;
use crate::views::{ApprovalQueue, DonorDashboard};

/// The donor's donations and pending request count.
pub async fn dashboard(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<DonorDashboard>> {
    let donor = auth.require_role(Role::Donor)?;
    let (donations, requests) = tokio::join!(
        state.submissions().donations_for(&donor),
        state.ledger().list_for_donor(&donor),
    );
    Ok(Json(DonorDashboard::build(&donor, donations, &requests?)))
}

/// Requests addressed to the donor.
pub async fn requests(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<ApprovalQueue>> {
    let donor = auth.require_role(Role::Donor)?;
    let requests = state.ledger().list_for_donor(&donor).await?;
    Ok(Json(ApprovalQueue::build(&donor, requests)))
}

/// Live approval queue as server-sent events.
pub async fn stream(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let donor = auth.require_role(Role::Donor)?;
    let updates = state
        .ledger()
        .subscribe(LedgerScope::for_user(&donor))
        .into_stream()
        .map(move |requests| {
            let queue = ApprovalQueue::build(&donor, requests);
            Ok(super::json_event("requests", &queue))
        });
    Ok(Sse::new(updates).keep_alive(KeepAlive::default()))
}

/// Accept a pending request and withdraw its donation.
#[instrument(skip_all, fields(request_id = %id))]
pub async fn accept(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<RequestId>,
) -> Result<Json<PickupRequest>> {
    decide(&state, auth, id, Decision::Accept).await
}

/// Decline a pending request.
#[instrument(skip_all, fields(request_id = %id))]
pub async fn decline(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<RequestId>,
) -> Result<Json<PickupRequest>> {
    decide(&state, auth, id, Decision::Decline).await
}

async fn decide(
    state: &AppState,
    auth: RequireAuth,
    id: RequestId,
    decision: Decision,
) -> Result<Json<PickupRequest>> {
    let donor = auth.require_role(Role::Donor)?;
    let request = state.ledger().decide(&donor, id, decision).await?;
    let (request_id, decision) = (id.to_string(), decision.to_string());
    add_breadcrumb(
        "ledger",
        "Request decided",
        Some(&[("request_id", request_id.as_str()), ("decision", decision.as_str())]),
    );
    Ok(Json(request))
}
