//! Integration tests for the authenticated request pipeline
//!
//! One wiremock server plays both roles: the Keycloak realm (token
//! endpoint) and the console backend under `/api`.

use std::sync::Arc;

use hubx_api::{AdminApi, ApiClient, ApiClientConfig, ApiError};
use hubx_auth::testing::RecordingNavigator;
use hubx_auth::{
    AuthError, CallbackParams, KeycloakConfig, MemoryCredentialStore, SessionManager,
};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const TOKEN_PATH: &str = "/realms/hubx/protocol/openid-connect/token";

struct Harness {
    api: AdminApi<MemoryCredentialStore>,
    navigator: Arc<RecordingNavigator>,
}

fn harness(server: &MockServer) -> Harness {
    let config = KeycloakConfig::new(
        server.uri(),
        "hubx",
        "admin-console",
        "https://console.example.com/callback",
    );
    let navigator = Arc::new(RecordingNavigator::new());
    let sessions = SessionManager::new(config, MemoryCredentialStore::new(), navigator.clone());
    let client = ApiClient::new(ApiClientConfig::new(format!("{}/api", server.uri())), sessions);
    Harness { api: AdminApi::new(client), navigator }
}

fn token_response(access: &str, refresh: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "Bearer",
        "expires_in": 3600,
    }))
}

/// Establish tokens through the lenient callback path, skipping the
/// browser redirect.
async fn seed_login(h: &Harness, server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(token_response("seed-access", "seed-refresh"))
        .mount(server)
        .await;

    h.api
        .client()
        .sessions()
        .handle_callback(&CallbackParams::from_query("code=seed&state=seed"))
        .await
        .expect("seed login should succeed");
}

fn bearer_of(request: &Request) -> Option<&str> {
    request.headers.get("authorization").and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn attaches_the_bearer_token_to_outbound_requests() {
    let server = MockServer::start().await;
    let h = harness(&server);
    seed_login(&h, &server).await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .and(header("authorization", "Bearer seed-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "d1" }])))
        .expect(1)
        .mount(&server)
        .await;

    let devices = h.api.devices().await.expect("devices");
    assert_eq!(devices[0]["id"], "d1");
}

#[tokio::test]
async fn sends_unauthenticated_when_no_token_is_held() {
    let server = MockServer::start().await;
    let h = harness(&server);

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let devices = h.api.devices().await.expect("devices");
    assert_eq!(devices, json!([]));

    let requests = server.received_requests().await.unwrap_or_default();
    let api_request = requests
        .iter()
        .find(|request| request.url.path() == "/api/devices")
        .expect("request observed");
    assert!(bearer_of(api_request).is_none());
}

#[tokio::test]
async fn a_401_triggers_exactly_one_refresh_and_retry() {
    let server = MockServer::start().await;
    let h = harness(&server);
    seed_login(&h, &server).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(token_response("fresh-access", "fresh-refresh"))
        .expect(1)
        .mount(&server)
        .await;

    // The stale token is rejected once; the refreshed one is accepted.
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(header("authorization", "Bearer seed-access"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(header("authorization", "Bearer fresh-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "u1" }])))
        .expect(1)
        .mount(&server)
        .await;

    let users = h.api.users().await.expect("users after retry");
    assert_eq!(users[0]["id"], "u1");
}

#[tokio::test]
async fn a_second_401_is_surfaced_without_a_third_attempt() {
    let server = MockServer::start().await;
    let h = harness(&server);
    seed_login(&h, &server).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(token_response("fresh-access", "fresh-refresh"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let err = h.api.users().await.expect_err("second 401 surfaces");
    assert!(matches!(err, ApiError::Unauthorized));
}

#[tokio::test]
async fn non_401_failures_are_surfaced_without_any_refresh() {
    let server = MockServer::start().await;
    let h = harness(&server);
    seed_login(&h, &server).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(token_response("unused", "unused"))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/bindings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = h.api.bindings().await.expect_err("500 surfaces");
    match err {
        ApiError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "backend exploded");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn a_refresh_failure_during_recovery_propagates_and_tears_down() {
    let server = MockServer::start().await;
    let h = harness(&server);
    seed_login(&h, &server).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Session not active",
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = h.api.users().await.expect_err("refresh failure propagates");
    assert!(matches!(err, ApiError::Auth(AuthError::TokenExchange { status: 400, .. })));

    // The failed refresh tore the session down and left via end-session.
    assert!(!h.api.client().sessions().is_authenticated().await);
    let url = h.navigator.last_external().expect("end-session redirect");
    assert!(url.contains("/protocol/openid-connect/logout?"));
}

#[tokio::test]
async fn create_binding_posts_the_expected_payload() {
    let server = MockServer::start().await;
    let h = harness(&server);
    seed_login(&h, &server).await;

    Mock::given(method("POST"))
        .and(path("/api/bindings"))
        .and(header("authorization", "Bearer seed-access"))
        .and(body_string_contains(r#""user_id":"u1""#))
        .and(body_string_contains(r#""device_id":"d1""#))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "b1" })))
        .expect(1)
        .mount(&server)
        .await;

    let binding = h.api.create_binding("u1", "d1").await.expect("binding created");
    assert_eq!(binding["id"], "b1");
}

#[tokio::test]
async fn delete_binding_targets_the_binding_resource() {
    let server = MockServer::start().await;
    let h = harness(&server);
    seed_login(&h, &server).await;

    Mock::given(method("DELETE"))
        .and(path("/api/bindings/b1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert_ok!(h.api.delete_binding("b1").await);
}

#[tokio::test]
async fn raw_send_hands_back_non_401_responses_untouched() {
    let server = MockServer::start().await;
    let h = harness(&server);
    seed_login(&h, &server).await;

    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(418).set_body_string("teapot"))
        .expect(1)
        .mount(&server)
        .await;

    let client = h.api.client();
    let response = client
        .send(client.request(reqwest::Method::GET, "/health"))
        .await
        .expect("send returns the response");

    assert_eq!(response.status(), reqwest::StatusCode::IM_A_TEAPOT);
    assert_eq!(response.text().await.expect("body"), "teapot");
}

#[tokio::test]
async fn concurrent_401_recoveries_share_one_refresh() {
    let server = MockServer::start().await;
    let h = harness(&server);
    seed_login(&h, &server).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(
            token_response("fresh-access", "fresh-refresh")
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    for api_path in ["/api/users", "/api/devices"] {
        Mock::given(method("GET"))
            .and(path(api_path))
            .and(header("authorization", "Bearer seed-access"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(api_path))
            .and(header("authorization", "Bearer fresh-access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
    }

    // Both requests hit 401 with the stale token; their recoveries collapse
    // into a single token-endpoint exchange.
    let (users, devices) = tokio::join!(h.api.users(), h.api.devices());
    assert_ok!(users);
    assert_ok!(devices);
}
