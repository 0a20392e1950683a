//! HttpClient against a mock management API.

mod common;

use std::sync::Arc;

use common::mock_server::{MockResponse, MockServer};
use console_state::config::ServerConfig;
use console_state::{
    AttemptStatus, AttemptTracker, HttpClient, Orchestrator, RequestClient, RequestError, Store,
};
use serde_json::json;

fn client_for(base_url: &str, timeout_seconds: u64) -> HttpClient {
    HttpClient::new(&ServerConfig {
        base_url: base_url.to_string(),
        timeout_seconds,
        connect_timeout_seconds: 1,
    })
    .unwrap()
}

#[tokio::test]
async fn get_decodes_json() {
    let server = MockServer::start().await;
    server
        .enqueue_response(MockResponse::json(r#"[{"hostname": "node-1"}]"#))
        .await;
    let client = client_for(&server.base_url(), 5);

    let body = client.get("/api/nodes").await.unwrap();
    assert_eq!(body, json!([{"hostname": "node-1"}]));

    let captured = server.captured_requests().await;
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].method, "GET");
    assert_eq!(captured[0].path, "/api/nodes");
}

#[tokio::test]
async fn post_sends_json_body() {
    let server = MockServer::start().await;
    server
        .enqueue_response(MockResponse::json(r#"{"created": true}"#))
        .await;
    let client = client_for(&server.base_url(), 5);

    let body = client
        .post("api/roles", json!({"name": "viewer"}))
        .await
        .unwrap();
    assert_eq!(body, json!({"created": true}));

    let captured = server.captured_requests().await;
    assert_eq!(captured[0].method, "POST");
    assert_eq!(captured[0].path, "/api/roles");
    assert_eq!(captured[0].content_type.as_deref(), Some("application/json"));
    let sent: serde_json::Value = serde_json::from_slice(&captured[0].body).unwrap();
    assert_eq!(sent, json!({"name": "viewer"}));
}

#[tokio::test]
async fn empty_success_body_is_null() {
    let server = MockServer::start().await;
    server.enqueue_response(MockResponse::empty(204)).await;
    let client = client_for(&server.base_url(), 5);

    assert_eq!(
        client.delete("/api/configmaps/app").await.unwrap(),
        serde_json::Value::Null
    );
}

#[tokio::test]
async fn error_status_keeps_raw_body() {
    let server = MockServer::start().await;
    server
        .enqueue_response(MockResponse::error(409, "Role already exists"))
        .await;
    let client = client_for(&server.base_url(), 5);

    let err = client
        .put("/api/roles/admin", json!({}))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RequestError::Status {
            status: 409,
            body: r#"{"message": "Role already exists"}"#.to_string(),
        }
    );
}

#[tokio::test]
async fn invalid_json_is_decode_error() {
    let server = MockServer::start().await;
    server
        .enqueue_response(MockResponse::raw(200, "not json"))
        .await;
    let client = client_for(&server.base_url(), 5);

    assert!(matches!(
        client.get("/api/nodes").await,
        Err(RequestError::Decode(_))
    ));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    server
        .enqueue_response(MockResponse::default().with_delay(2_500))
        .await;
    let client = client_for(&server.base_url(), 1);

    assert!(matches!(
        client.get("/api/nodes").await,
        Err(RequestError::Timeout(_))
    ));
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = client_for(&format!("http://127.0.0.1:{}", port), 5);

    assert!(matches!(
        client.get("/api/nodes").await,
        Err(RequestError::Transport(_))
    ));
}

#[tokio::test]
async fn orchestrated_failure_shows_server_message() {
    let server = MockServer::start().await;
    server
        .enqueue_response(MockResponse::error(403, "Permission denied"))
        .await;
    let client = client_for(&server.base_url(), 5);
    let tracker = AttemptTracker::install(&Store::new()).unwrap();
    let orchestrator = Orchestrator::new(tracker.clone(), Arc::new(client));

    let err = orchestrator
        .operation("delete-node")
        .delete("/api/nodes/node-2")
        .run()
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Permission denied");
    assert_eq!(tracker.status("delete-node").unwrap(), AttemptStatus::Failed);
    assert_eq!(
        tracker.message("delete-node").unwrap().as_deref(),
        Some("Permission denied")
    );
}
