#![allow(clippy::unwrap_used)]
// Integration tests for `CloudClient` using wiremock.

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use landroid_api::{AccessToken, CloudClient, Credentials, Endpoints, Error};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, CloudClient) {
    let server = MockServer::start().await;
    let endpoints = Endpoints::new(
        Url::parse(&format!("{}/oauth/token", server.uri())).unwrap(),
        Url::parse(&format!("{}/api/v2/", server.uri())).unwrap(),
    );
    let client = CloudClient::with_client(reqwest::Client::new(), endpoints);
    (server, client)
}

fn credentials() -> Credentials {
    Credentials::new("user@example.com", "hunter2".to_string().into(), "client-abc")
}

fn device_json(id: u64, serial: &str) -> serde_json::Value {
    json!({
        "id": id,
        "serial_number": serial,
        "name": format!("Mower {id}"),
        "mqtt_endpoint": "broker.example.com",
        "mqtt_topics": {
            "command_in": format!("PRM100/{serial}/commandIn"),
            "command_out": format!("PRM100/{serial}/commandOut")
        },
        "online": true
    })
}

// ── Token exchange ──────────────────────────────────────────────────

#[tokio::test]
async fn test_exchange_token_sends_password_grant() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({
            "client_id": "client-abc",
            "username": "user@example.com",
            "password": "hunter2",
            "scope": "*",
            "grant_type": "password"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "aGVhZA.cGF5bG9hZA.c2ln",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = client.exchange_token(&credentials()).await.unwrap();
    assert_eq!(token.expose(), "aGVhZA.cGF5bG9hZA.c2ln");
}

#[tokio::test]
async fn test_exchange_token_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid_grant" })),
        )
        .mount(&server)
        .await;

    let result = client.exchange_token(&credentials()).await;

    match result {
        Err(Error::Authentication { status, message }) => {
            assert_eq!(status, 401);
            assert!(message.contains("invalid_grant"));
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_exchange_token_malformed_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = client.exchange_token(&credentials()).await;

    match result {
        Err(Error::Deserialization { body, .. }) => assert!(body.contains("maintenance")),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

// ── Product API ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_user_profile_uses_bearer_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/users/me"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4242,
            "user_type": "customer",
            "mqtt_endpoint": "broker.example.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = client.user_profile(&AccessToken::new("tok")).await.unwrap();
    assert_eq!(user.id, 4242);
    assert_eq!(user.user_type.as_deref(), Some("customer"));
}

#[tokio::test]
async fn test_product_items_preserves_order() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/product-items"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([device_json(2, "SER-B"), device_json(1, "SER-A")])),
        )
        .mount(&server)
        .await;

    let devices = client.product_items(&AccessToken::new("tok")).await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id, 2);
    assert_eq!(devices[0].mqtt_topics.command_in, "PRM100/SER-B/commandIn");
    assert_eq!(devices[1].display_name(), "Mower 1");
}

#[tokio::test]
async fn test_product_items_empty() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/product-items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let devices = client.product_items(&AccessToken::new("tok")).await.unwrap();
    assert!(devices.is_empty());
}

#[tokio::test]
async fn test_expired_token_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let err = client.user_profile(&AccessToken::new("stale")).await.unwrap_err();
    assert!(
        matches!(err, Error::Authentication { status: 401, .. }),
        "expected Authentication error, got: {err:?}"
    );
}

#[tokio::test]
async fn test_server_error_maps_to_api() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/product-items"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = client.product_items(&AccessToken::new("tok")).await.unwrap_err();
    assert!(
        matches!(err, Error::Api { status: 503, .. }),
        "expected Api error, got: {err:?}"
    );
}
