//! Authentication route handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::instrument;

use nowaste_core::User;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::services::auth::{LoginForm, RegistrationForm};
use crate::services::{LogoutOutcome, SessionStore};
use crate::state::AppState;
use crate::views::UserView;

/// Body returned after sign-in and by `/auth/me`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedIn {
    pub user: User,
    pub view: UserView,
    /// Where the client should go next.
    pub redirect: &'static str,
}

impl From<User> for SignedIn {
    fn from(user: User) -> Self {
        Self {
            view: UserView::from(&user),
            redirect: user.role.landing_path(),
            user,
        }
    }
}

/// Create an account and sign it in.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: SessionStore,
    Json(form): Json<RegistrationForm>,
) -> Result<(StatusCode, Json<SignedIn>)> {
    let user = state.auth().register(form).await?;
    session.login(&user).await?;
    add_breadcrumb("auth", "Registered", Some(&[("role", user.role.as_str())]));
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Sign in with email and password.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: SessionStore,
    Json(form): Json<LoginForm>,
) -> Result<Json<SignedIn>> {
    let user = state.auth().login(&form).await?;
    session.login(&user).await?;
    add_breadcrumb("auth", "Logged in", Some(&[("role", user.role.as_str())]));
    Ok(Json(user.into()))
}

/// Sign out. Always clears the session.
pub async fn logout(
    State(state): State<AppState>,
    session: SessionStore,
) -> Result<Json<LogoutOutcome>> {
    Ok(Json(session.logout(state.auth()).await?))
}

/// The signed-in user.
pub async fn me(RequireAuth(user): RequireAuth) -> Json<SignedIn> {
    Json(user.into())
}
