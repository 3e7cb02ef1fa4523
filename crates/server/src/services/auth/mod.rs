//! Authentication service.
//!
//! Account creation, password sign-in and profile edits on top of the
//! [`IdentityProvider`] and [`ProfileStore`] seams. A signed-in identity
//! without a profile record is treated as a donor (see [`User::fallback`]).

mod error;
mod forms;

pub use error::AuthError;
pub use forms::{
    LoginForm, MIN_PASSWORD_LENGTH, ProfileForm, ProfileUpdate, Registration, RegistrationForm,
};

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use nowaste_core::{Email, Role, User, UserId};

use crate::db::ProfileStore;
use crate::services::identity::{AuthEvent, Identity, IdentityProvider};

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { identity, profiles }
    }

    /// Register a self-service account from a sign-up form.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if any field is invalid, otherwise the
    /// errors of [`AuthService::create_account`].
    pub async fn register(&self, form: RegistrationForm) -> Result<User, AuthError> {
        let reg = form.validate()?;
        self.create_account(&reg.name, &reg.email, &reg.password, reg.role)
            .await
    }

    /// Create an identity and its profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::EmailAlreadyInUse` if the email is registered.
    /// Returns `AuthError::ProfileSetupFailed` if the identity was created
    /// but the profile could not be written.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn create_account(
        &self,
        name: &str,
        email: &Email,
        password: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        validate_password(password)?;

        let identity = self.identity.sign_up(email, password).await?;

        let user = User {
            id: identity.id,
            name: name.trim().to_owned(),
            email: email.clone(),
            role,
            created_at: Utc::now(),
        };
        let user = self
            .profiles
            .upsert(&user)
            .await
            .map_err(AuthError::ProfileSetupFailed)?;

        info!(user_id = %user.id, role = %user.role, "Account created");
        Ok(user)
    }

    /// Sign in with email and password and resolve the profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the form is invalid and
    /// `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, form: &LoginForm) -> Result<User, AuthError> {
        let email = form.validate()?;
        let identity = self.identity.sign_in(&email, &form.password).await?;
        self.resolve_profile(&identity).await
    }

    /// The profile for a signed-in identity, or a donor fallback when the
    /// identity has no profile record.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the profile store fails.
    pub async fn resolve_profile(&self, identity: &Identity) -> Result<User, AuthError> {
        resolve_profile(self.profiles.as_ref(), identity).await
    }

    /// Apply a profile edit for `current`.
    ///
    /// The profile is written first; a changed email and a new password are
    /// then pushed to the identity provider. Role and creation time are kept.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the form is invalid,
    /// `AuthError::EmailAlreadyInUse` if the new email is taken, or a
    /// storage error.
    #[instrument(skip(self, current, form), fields(user_id = %current.id))]
    pub async fn update_profile(
        &self,
        current: &User,
        form: ProfileForm,
    ) -> Result<User, AuthError> {
        let update = form.validate()?;

        let email_changed = update.email != current.email;

        // The profile follows the identity, never the other way round.
        if email_changed {
            self.identity.update_email(current.id, &update.email).await?;
        }
        if let Some(password) = &update.password {
            if let Err(e) = self.identity.update_password(current.id, password).await {
                if email_changed {
                    self.restore_email(current).await;
                }
                return Err(e.into());
            }
        }

        let updated = User {
            name: update.name,
            email: update.email,
            ..current.clone()
        };
        match self.profiles.upsert(&updated).await {
            Ok(updated) => {
                info!("Profile updated");
                Ok(updated)
            }
            Err(e) => {
                if email_changed {
                    self.restore_email(current).await;
                }
                Err(e.into())
            }
        }
    }

    /// Put the sign-in email back after a later step of a profile edit failed.
    async fn restore_email(&self, current: &User) {
        if let Err(e) = self.identity.update_email(current.id, &current.email).await {
            error!(
                user_id = %current.id,
                error = %e,
                "Could not restore sign-in email after failed profile update"
            );
        }
    }

    /// End the identity's session with the provider.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SignOutFailed` if the provider reports a failure.
    pub async fn sign_out(&self, id: UserId) -> Result<(), AuthError> {
        self.identity.sign_out(id).await.map_err(AuthError::from)
    }

    /// Every profile, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the profile store fails.
    pub async fn list_profiles(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.profiles.list_all().await?)
    }

    /// Follow the identity provider's auth events in the background.
    ///
    /// Sign-ins are resolved to profiles so missing profiles show up in the
    /// logs as they happen. The task ends when the provider is dropped.
    pub fn spawn_event_watcher(&self) -> JoinHandle<()> {
        let mut events = self.identity.subscribe();
        let profiles = Arc::clone(&self.profiles);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AuthEvent::SignedIn(identity)) => {
                        match resolve_profile(profiles.as_ref(), &identity).await {
                            Ok(user) => {
                                info!(user_id = %user.id, role = %user.role, "Signed in");
                            }
                            Err(e) => {
                                warn!(user_id = %identity.id, error = %e, "Profile lookup failed");
                            }
                        }
                    }
                    Ok(AuthEvent::SignedOut(id)) => info!(user_id = %id, "Signed out"),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth event watcher lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Auth event watcher stopped");
        })
    }
}

async fn resolve_profile(
    profiles: &dyn ProfileStore,
    identity: &Identity,
) -> Result<User, AuthError> {
    match profiles.get(identity.id).await? {
        Some(user) => Ok(user),
        None => {
            warn!(user_id = %identity.id, "No profile for identity, using donor fallback");
            Ok(User::fallback(identity.id, identity.email.clone()))
        }
    }
}

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::db::{MemoryIdentityStore, MemoryProfileStore, RepositoryError};

    /// Profile store whose writes always fail.
    struct BrokenProfiles;

    #[async_trait]
    impl ProfileStore for BrokenProfiles {
        async fn get(&self, _id: UserId) -> Result<Option<User>, RepositoryError> {
            Ok(None)
        }

        async fn upsert(&self, _user: &User) -> Result<User, RepositoryError> {
            Err(RepositoryError::Conflict("read-only".into()))
        }

        async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
            Ok(Vec::new())
        }

        async fn find_by_name_or_email(
            &self,
            _name: &str,
            _email: Option<&str>,
        ) -> Result<Option<User>, RepositoryError> {
            Ok(None)
        }
    }

    fn service() -> (AuthService, Arc<MemoryIdentityStore>) {
        let identity = Arc::new(MemoryIdentityStore::new());
        let auth = AuthService::new(identity.clone(), Arc::new(MemoryProfileStore::new()));
        (auth, identity)
    }

    fn registration(email: &str, role: &str) -> RegistrationForm {
        RegistrationForm {
            name: "John Donor".into(),
            email: email.into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
            role: role.into(),
        }
    }

    fn login(email: &str, password: &str) -> LoginForm {
        LoginForm {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (auth, _) = service();
        let user = auth
            .register(registration("john@example.com", "donor"))
            .await
            .unwrap();
        assert_eq!(user.role, Role::Donor);

        let again = auth.login(&login("john@example.com", "secret1")).await.unwrap();
        assert_eq!(again.id, user.id);
        assert_eq!(again.name, "John Donor");
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let (auth, _) = service();
        auth.register(registration("john@example.com", "donor"))
            .await
            .unwrap();
        let err = auth
            .register(registration("john@example.com", "receiver"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailAlreadyInUse));
        assert_eq!(
            err.to_string(),
            "An account with this email already exists. Please login instead."
        );
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let (auth, _) = service();
        auth.register(registration("john@example.com", "donor"))
            .await
            .unwrap();
        let err = auth
            .login(&login("john@example.com", "wrong-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_identity_without_profile_falls_back_to_donor() {
        let (auth, identity) = service();
        let email = Email::parse("ghost@example.com").unwrap();
        identity.sign_up(&email, "secret1").await.unwrap();

        let user = auth.login(&login("ghost@example.com", "secret1")).await.unwrap();
        assert_eq!(user.role, Role::Donor);
        assert_eq!(user.display_name(), "ghost");
    }

    #[tokio::test]
    async fn test_profile_write_failure() {
        let auth = AuthService::new(
            Arc::new(MemoryIdentityStore::new()),
            Arc::new(BrokenProfiles),
        );
        let err = auth
            .register(registration("john@example.com", "donor"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ProfileSetupFailed(_)));
    }

    #[tokio::test]
    async fn test_create_account_rejects_short_password() {
        let (auth, _) = service();
        let email = Email::parse("admin@example.com").unwrap();
        let err = auth
            .create_account("Admin", &email, "123", Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword(_)));
    }

    #[tokio::test]
    async fn test_update_profile_changes_sign_in_email_and_password() {
        let (auth, _) = service();
        let user = auth
            .register(registration("john@example.com", "donor"))
            .await
            .unwrap();

        let updated = auth
            .update_profile(
                &user,
                ProfileForm {
                    name: "Johnny Donor".into(),
                    email: "johnny@example.com".into(),
                    password: "newpass1".into(),
                    confirm_password: "newpass1".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Johnny Donor");
        assert_eq!(updated.role, Role::Donor);
        assert_eq!(updated.created_at, user.created_at);

        assert!(auth.login(&login("john@example.com", "secret1")).await.is_err());
        let relogged = auth
            .login(&login("johnny@example.com", "newpass1"))
            .await
            .unwrap();
        assert_eq!(relogged.id, user.id);
    }

    #[tokio::test]
    async fn test_taken_email_leaves_profile_unchanged() {
        let (auth, _) = service();
        let first = auth
            .register(registration("a@example.com", "receiver"))
            .await
            .unwrap();
        auth.register(registration("b@example.com", "receiver"))
            .await
            .unwrap();

        let err = auth
            .update_profile(
                &first,
                ProfileForm {
                    name: "Renamed".into(),
                    email: "b@example.com".into(),
                    ..ProfileForm::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailAlreadyInUse));

        let relogged = auth
            .login(&login("a@example.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(relogged.email.as_str(), "a@example.com");
        assert_eq!(relogged.name, "John Donor");
        let stored = auth.list_profiles().await.unwrap();
        let unchanged = stored.iter().find(|u| u.id == first.id).unwrap();
        assert_eq!(unchanged.email.as_str(), "a@example.com");
        assert_eq!(unchanged.name, "John Donor");
        assert_eq!(
            stored
                .iter()
                .filter(|u| u.email.as_str() == "b@example.com")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_profile_write_failure_restores_sign_in_email() {
        let identity = Arc::new(MemoryIdentityStore::new());
        let email = Email::parse("john@example.com").unwrap();
        let created = identity.sign_up(&email, "secret1").await.unwrap();
        let auth = AuthService::new(identity.clone(), Arc::new(BrokenProfiles));
        let current = User {
            id: created.id,
            name: "John Donor".into(),
            email,
            role: Role::Donor,
            created_at: Utc::now(),
        };

        let result = auth
            .update_profile(
                &current,
                ProfileForm {
                    name: "John Donor".into(),
                    email: "johnny@example.com".into(),
                    ..ProfileForm::default()
                },
            )
            .await;
        assert!(result.is_err());

        let old = Email::parse("john@example.com").unwrap();
        assert!(identity.sign_in(&old, "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn test_watcher_stops_with_provider() {
        let (auth, identity) = service();
        let handle = auth.spawn_event_watcher();
        let email = Email::parse("john@example.com").unwrap();
        identity.sign_up(&email, "secret1").await.unwrap();

        drop(auth);
        drop(identity);
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
