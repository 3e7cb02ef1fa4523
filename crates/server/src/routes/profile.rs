//! Profile route handlers.

use axum::{Json, extract::State};

use nowaste_core::User;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::SessionStore;
use crate::services::auth::ProfileForm;
use crate::state::AppState;

/// Edit the signed-in user's name, email and optionally password.
pub async fn update(
    State(state): State<AppState>,
    session: SessionStore,
    RequireAuth(user): RequireAuth,
    Json(form): Json<ProfileForm>,
) -> Result<Json<User>> {
    let updated = state.auth().update_profile(&user, form).await?;
    session.refresh(&updated).await?;
    Ok(Json(updated))
}
