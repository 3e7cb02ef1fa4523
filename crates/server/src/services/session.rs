//! Per-browser session state.
//!
//! The signed-in [`User`] is cached in the tower-sessions session so it
//! survives across requests until logout or expiry.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::{info, warn};

use nowaste_core::User;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::services::auth::AuthService;

/// Session key holding the signed-in user.
pub const CURRENT_USER_KEY: &str = "current_user";

/// Result of the identity-provider sign-out during logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteSignOut {
    /// The provider ended the session.
    Ok,
    /// The provider reported a failure. The local session was still cleared.
    Failed,
    /// Nobody was signed in.
    Skipped,
}

/// What logout did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutOutcome {
    pub remote_sign_out: RemoteSignOut,
}

/// The signed-in user of one browser session.
#[derive(Clone)]
pub struct SessionStore {
    session: Session,
}

impl SessionStore {
    /// Wrap a tower-sessions session.
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// The signed-in user, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend cannot be read.
    pub async fn current_user(&self) -> Result<Option<User>, tower_sessions::session::Error> {
        self.session.get(CURRENT_USER_KEY).await
    }

    /// Remember `user` as signed in.
    ///
    /// The session id is rotated first so a pre-login id cannot be reused.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend cannot be written.
    pub async fn login(&self, user: &User) -> Result<(), tower_sessions::session::Error> {
        self.session.cycle_id().await?;
        self.session.insert(CURRENT_USER_KEY, user).await?;
        set_sentry_user(&user.id, Some(user.email.as_str()));
        Ok(())
    }

    /// Replace the cached user after a profile edit.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend cannot be written.
    pub async fn refresh(&self, user: &User) -> Result<(), tower_sessions::session::Error> {
        self.session.insert(CURRENT_USER_KEY, user).await
    }

    /// Sign out.
    ///
    /// The identity provider is always asked to end the session first, and
    /// the local session is cleared whatever it answers. A provider failure
    /// is reported in the outcome instead of failing the logout.
    ///
    /// # Errors
    ///
    /// Returns an error only if the local session cannot be cleared.
    pub async fn logout(
        &self,
        auth: &AuthService,
    ) -> Result<LogoutOutcome, tower_sessions::session::Error> {
        let current = match self.current_user().await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Unreadable session during logout");
                None
            }
        };

        let remote_sign_out = match &current {
            None => RemoteSignOut::Skipped,
            Some(user) => match auth.sign_out(user.id).await {
                Ok(()) => RemoteSignOut::Ok,
                Err(e) => {
                    warn!(user_id = %user.id, error = %e, "Identity provider sign-out failed");
                    RemoteSignOut::Failed
                }
            },
        };

        self.session.flush().await?;
        clear_sentry_user();

        if let Some(user) = current {
            info!(user_id = %user.id, "Logged out");
        }
        Ok(LogoutOutcome { remote_sign_out })
    }
}

impl<S> FromRequestParts<S> for SessionStore
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Session::from_request_parts(parts, state).await.map(Self::new)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::broadcast;
    use tower_sessions::MemoryStore;

    use nowaste_core::{Email, Role, UserId};

    use super::*;
    use crate::db::{MemoryIdentityStore, MemoryProfileStore};
    use crate::services::identity::{
        AuthEvent, Identity, IdentityError, IdentityProvider,
    };

    /// Identity provider whose sign-out always fails.
    struct FailingSignOut(MemoryIdentityStore);

    #[async_trait]
    impl IdentityProvider for FailingSignOut {
        async fn sign_up(&self, email: &Email, password: &str) -> Result<Identity, IdentityError> {
            self.0.sign_up(email, password).await
        }

        async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity, IdentityError> {
            self.0.sign_in(email, password).await
        }

        async fn sign_out(&self, _id: UserId) -> Result<(), IdentityError> {
            Err(IdentityError::SignOutFailed("network down".into()))
        }

        async fn update_email(&self, id: UserId, email: &Email) -> Result<(), IdentityError> {
            self.0.update_email(id, email).await
        }

        async fn update_password(&self, id: UserId, password: &str) -> Result<(), IdentityError> {
            self.0.update_password(id, password).await
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            self.0.subscribe()
        }
    }

    fn session() -> SessionStore {
        SessionStore::new(Session::new(None, Arc::new(MemoryStore::default()), None))
    }

    fn user() -> User {
        User {
            id: UserId::generate(),
            name: "Food Bank".into(),
            email: Email::parse("bank@example.org").unwrap(),
            role: Role::Receiver,
            created_at: Utc::now(),
        }
    }

    fn auth(identity: impl IdentityProvider + 'static) -> AuthService {
        AuthService::new(Arc::new(identity), Arc::new(MemoryProfileStore::new()))
    }

    #[tokio::test]
    async fn test_login_then_current_user() {
        let session = session();
        assert!(session.current_user().await.unwrap().is_none());

        let user = user();
        session.login(&user).await.unwrap();
        assert_eq!(session.current_user().await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let session = session();
        session.login(&user()).await.unwrap();

        let outcome = session
            .logout(&auth(MemoryIdentityStore::new()))
            .await
            .unwrap();
        assert_eq!(outcome.remote_sign_out, RemoteSignOut::Ok);
        assert!(session.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_remote_sign_out_still_clears_session() {
        let session = session();
        session.login(&user()).await.unwrap();

        let outcome = session
            .logout(&auth(FailingSignOut(MemoryIdentityStore::new())))
            .await
            .unwrap();
        assert_eq!(outcome.remote_sign_out, RemoteSignOut::Failed);
        assert!(session.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_without_user() {
        let outcome = session()
            .logout(&auth(MemoryIdentityStore::new()))
            .await
            .unwrap();
        assert_eq!(outcome.remote_sign_out, RemoteSignOut::Skipped);
    }

    #[test]
    fn test_outcome_wire_shape() {
        let json = serde_json::to_value(LogoutOutcome {
            remote_sign_out: RemoteSignOut::Failed,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "remoteSignOut": "failed" }));
    }
}
