//! Server-sent ledger updates.

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde_json::json;
use tokio::time::timeout;

use nowaste_integration_tests::{POLL_INTERVAL, TestApp};

/// Read the event stream until `needle` shows up.
async fn read_until(response: &mut Response, needle: &str) -> String {
    let read = async {
        let mut buffer = String::new();
        while !buffer.contains(needle) {
            let chunk = response.chunk().await.unwrap().expect("stream ended");
            buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
        buffer
    };
    timeout(POLL_INTERVAL * 10 + Duration::from_secs(1), read)
        .await
        .unwrap_or_else(|_| panic!("no event containing {needle:?}"))
}

#[tokio::test]
async fn test_donor_stream_sees_new_request() {
    let app = TestApp::spawn().await;
    app.catalog.add_donation("D1", "John Donor", 30);
    let donor = app.client();
    app.register(&donor, "John Donor", "john@example.org", "donor").await;
    let receiver = app.client();
    app.register(&receiver, "Food Bank", "bank@example.org", "receiver").await;

    let mut stream = app.get(&donor, "/api/donor/requests/stream").await;
    assert_eq!(stream.status(), StatusCode::OK);
    let initial = read_until(&mut stream, "event: requests").await;
    assert!(initial.contains("\"total\":0"));

    let id = app.request_pickup(&receiver, "D1").await;
    let update = read_until(&mut stream, &id).await;
    assert!(update.contains("\"canDecide\":true"));
}

#[tokio::test]
async fn test_receiver_stream_sees_decision() {
    let app = TestApp::spawn().await;
    app.catalog.add_donation("D1", "John Donor", 30);
    let donor = app.client();
    app.register(&donor, "John Donor", "john@example.org", "donor").await;
    let receiver = app.client();
    app.register(&receiver, "Food Bank", "bank@example.org", "receiver").await;
    let id = app.request_pickup(&receiver, "D1").await;

    let mut stream = app.get(&receiver, "/api/receiver/requests/stream").await;
    assert_eq!(stream.status(), StatusCode::OK);
    read_until(&mut stream, &id).await;

    let response = app
        .post(&donor, &format!("/api/donor/requests/{id}/accept"), &json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    read_until(&mut stream, "Pickup Confirmed").await;
}

#[tokio::test]
async fn test_stream_requires_role() {
    let app = TestApp::spawn().await;
    let receiver = app.client();
    app.register(&receiver, "Food Bank", "bank@example.org", "receiver").await;

    let response = app.get(&receiver, "/api/donor/requests/stream").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
