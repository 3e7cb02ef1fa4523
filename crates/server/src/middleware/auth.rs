//! Authentication extractors.
//!
//! API routes answer 401 when nobody is signed in and 403 when the signed-in
//! user has the wrong role.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use nowaste_core::{Role, User};

use crate::error::AppError;
use crate::services::session::CURRENT_USER_KEY;

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.display_name())
/// }
/// ```
pub struct RequireAuth(pub User);

impl RequireAuth {
    /// The user, if they hold `role`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for any other role.
    pub fn require_role(self, role: Role) -> Result<User, AppError> {
        if self.0.has_role(role) {
            Ok(self.0)
        } else {
            Err(AppError::Forbidden(role))
        }
    }

    /// The user, if they hold any of `roles`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` naming the first allowed role otherwise.
    pub fn require_any(self, roles: &[Role]) -> Result<User, AppError> {
        match roles.iter().find(|r| self.0.has_role(**r)) {
            Some(_) => Ok(self.0),
            None => Err(AppError::Forbidden(roles.first().copied().unwrap_or_default())),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Unauthorized("no session".to_string()))?;

        let user: User = session
            .get(CURRENT_USER_KEY)
            .await?
            .ok_or_else(|| AppError::Unauthorized("please log in".to_string()))?;

        Ok(Self(user))
    }
}

/// Extractor that optionally gets the signed-in user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is
/// signed in.
pub struct OptionalAuth(pub Option<User>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session.get::<User>(CURRENT_USER_KEY).await.ok().flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}
