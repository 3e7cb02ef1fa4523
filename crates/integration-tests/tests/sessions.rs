//! Sign-in, sign-out and role gating.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use nowaste_core::{Email, UserId};
use nowaste_integration_tests::{PASSWORD, TestApp};
use nowaste_server::db::MemoryIdentityStore;
use nowaste_server::services::{AuthEvent, Identity, IdentityError, IdentityProvider};
use nowaste_server::state::Stores;

/// Identity provider whose remote sign-out always fails.
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
        Err(IdentityError::SignOutFailed("provider unreachable".into()))
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

#[tokio::test]
async fn test_api_requires_sign_in() {
    let app = TestApp::spawn().await;
    let anonymous = app.client();

    for path in ["/auth/me", "/api/donations", "/api/donor/requests"] {
        let response = app.get(&anonymous, path).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
}

#[tokio::test]
async fn test_roles_gate_views() {
    let app = TestApp::spawn().await;
    let donor = app.client();
    app.register(&donor, "John Donor", "john@example.org", "donor").await;
    let receiver = app.client();
    app.register(&receiver, "Food Bank", "bank@example.org", "receiver").await;

    for path in ["/api/donations", "/api/receiver/requests", "/api/admin/overview"] {
        let response = app.get(&donor, path).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "donor {path}");
    }
    for path in ["/api/donor/dashboard", "/api/donor/requests", "/api/admin/ledger/export"] {
        let response = app.get(&receiver, path).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "receiver {path}");
    }
}

#[tokio::test]
async fn test_admin_cannot_self_register() {
    let app = TestApp::spawn().await;
    let client = app.client();

    let response = app
        .post(
            &client,
            "/auth/register",
            &json!({
                "name": "Mallory",
                "email": "mallory@example.org",
                "password": PASSWORD,
                "confirmPassword": PASSWORD,
                "role": "admin",
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let app = TestApp::spawn().await;
    app.register(&app.client(), "Food Bank", "bank@example.org", "receiver")
        .await;

    let response = app
        .post(
            &app.client(),
            "/auth/login",
            &json!({ "email": "bank@example.org", "password": "not-the-password" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::spawn().await;
    let client = app.client();
    let signed_in = app
        .register(&client, "Food Bank", "bank@example.org", "receiver")
        .await;
    assert_eq!(signed_in["user"]["role"], "receiver");

    let me = app.get(&client, "/auth/me").await;
    assert_eq!(me.status(), StatusCode::OK);

    let outcome: Value = app
        .post(&client, "/auth/logout", &json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["remoteSignOut"], "ok");

    let me = app.get(&client, "/auth/me").await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_session_when_remote_sign_out_fails() {
    let stores = Stores {
        identity: Arc::new(FailingSignOut(MemoryIdentityStore::new())),
        ..Stores::memory()
    };
    let app = TestApp::spawn_with(stores).await;
    let client = app.client();
    app.register(&client, "Food Bank", "bank@example.org", "receiver")
        .await;

    let response = app.post(&client, "/auth/logout", &json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(outcome["remoteSignOut"], "failed");

    let me = app.get(&client, "/auth/me").await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}
