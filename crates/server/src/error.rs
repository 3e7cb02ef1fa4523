//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//!
//! Every error response is JSON with at least an `error` message. Validation
//! failures add a `fields` map, and retryable failures add `retryable: true`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use nowaste_core::{Role, ValidationErrors};

use crate::catalog::CatalogError;
use crate::db::RepositoryError;
use crate::ledger::LedgerError;
use crate::services::auth::AuthError;
use crate::services::submission::SubmissionError;

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Catalog call failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Ledger operation failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Form fields failed validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Session backend failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but lacks the required role.
    #[error("Forbidden: requires {0} role")]
    Forbidden(Role),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<SubmissionError> for AppError {
    fn from(e: SubmissionError) -> Self {
        match e {
            SubmissionError::Validation(errors) => Self::Validation(errors),
            SubmissionError::Transport(e) => Self::Catalog(e),
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Catalog(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::EmailAlreadyInUse => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                AuthError::SignOutFailed(_) => StatusCode::BAD_GATEWAY,
                AuthError::ProfileSetupFailed(_)
                | AuthError::Repository(_)
                | AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Ledger(err) => match err {
                LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::AlreadyDecided { .. } => StatusCode::CONFLICT,
                LedgerError::NotAddressedToDonor(_) => StatusCode::FORBIDDEN,
                LedgerError::Consistency { .. } => StatusCode::BAD_GATEWAY,
                LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether the client may retry the same call.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(err) => err.is_retryable(),
            Self::Catalog(_) => true,
            _ => false,
        }
    }

    fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }

    /// Client-facing message. Internal details are never exposed.
    fn message(&self) -> String {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Catalog(_) => "Donation service is unavailable, please try again".to_string(),
            Self::Auth(err) => match err {
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_string()
                }
                AuthError::SignOutFailed(_) => "Sign-out failed".to_string(),
                AuthError::Validation(_) => "Please correct the highlighted fields".to_string(),
                other => other.to_string(),
            },
            Self::Ledger(err) => match err {
                LedgerError::NotFound(_) => "Request not found".to_string(),
                LedgerError::AlreadyDecided { status, .. } => {
                    format!("This request was already decided ({status})")
                }
                LedgerError::NotAddressedToDonor(_) => {
                    "This request is addressed to another donor".to_string()
                }
                LedgerError::Consistency { .. } => "The request could not be confirmed because \
                     the donation could not be withdrawn. It is still pending, please try again."
                    .to_string(),
                LedgerError::Store(_) => "Internal server error".to_string(),
            },
            Self::Validation(_) => "Please correct the highlighted fields".to_string(),
            Self::Forbidden(role) => format!("This page is only available to {role} accounts"),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let mut body = json!({ "error": self.message() });
        let fields = match &self {
            Self::Validation(errors) | Self::Auth(AuthError::Validation(errors)) => Some(errors),
            _ => None,
        };
        if let Some(errors) = fields {
            body["fields"] = json!(errors);
        }
        if self.is_retryable() {
            body["retryable"] = json!(true);
        }

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a user action.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use nowaste_core::{DonationId, RequestId, RequestStatus};

    use super::*;

    async fn body(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("request".to_string());
        assert_eq!(err.to_string(), "Not found: request");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden(Role::Admin).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Auth(AuthError::EmailAlreadyInUse).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Ledger(LedgerError::AlreadyDecided {
                id: RequestId::generate(),
                status: RequestStatus::PickupConfirmed,
            })
            .status(),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("contact", "Contact must be exactly 10 digits");
        let (status, json) = body(errors.into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["fields"]["contact"], "Contact must be exactly 10 digits");
    }

    #[tokio::test]
    async fn test_consistency_is_retryable() {
        let err = AppError::Ledger(LedgerError::Consistency {
            id: RequestId::generate(),
            donation_id: DonationId::new("D1"),
            source: CatalogError::Api {
                status: 503,
                message: "down".into(),
            },
        });
        let (status, json) = body(err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["retryable"], true);
        assert!(json["error"].as_str().unwrap().contains("still pending"));
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (_, json) = body(AppError::Internal("secret detail".into())).await;
        assert_eq!(json["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_duplicate_email_message() {
        let (status, json) = body(AppError::Auth(AuthError::EmailAlreadyInUse)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            json["error"],
            "An account with this email already exists. Please login instead."
        );
    }
}
