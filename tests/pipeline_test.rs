// ============================================================================
// Protected Route Pipeline Tests
// ============================================================================
//
// End-to-end behavior of verify → rate limit → forward:
// - Credential rejections (401 / 403)
// - Token bucket admission and rate-limit headers
// - Fail-closed limiter (500)
// - Downstream failures (502 / 504)
// - Request and identity propagation
//
// ============================================================================

use serde_json::{Value, json};
use std::sync::Arc;

use test_utils::{UnreachableStore, closed_port_url, spawn_app, spawn_app_with};

use gatekeeper::rate_limit::InMemoryTokenStore;

#[tokio::test]
async fn test_route_config_admits_capacity_then_limits() {
    let app = spawn_app().await;
    let token = app.login("alice").await;
    app.set_rate_config(&token, "/api/orders", 5.0, 1.0).await;

    for i in 0..5 {
        let response = app.get_with_token("/api/orders", &token).await;
        assert_eq!(response.status(), 200, "request {} should be admitted", i + 1);
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(
            response.headers()["x-ratelimit-remaining"],
            (4 - i).to_string().as_str()
        );
    }

    let response = app.get_with_token("/api/orders", &token).await;
    assert_eq!(response.status(), 429);
    assert_eq!(response.headers()["retry-after"], "1");
    assert_eq!(response.headers()["x-ratelimit-limit"], "5");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["retryAfter"], 1);
}

#[tokio::test]
async fn test_default_config_applies_to_unconfigured_routes() {
    // Slow refill keeps the bucket drained for the duration of the test
    let app = spawn_app_with(Arc::new(InMemoryTokenStore::new()), |config| {
        config.rate_limit.default_refill_rate = 0.01;
    })
    .await;
    let token = app.login("alice").await;

    for _ in 0..10 {
        let response = app.get_with_token("/api/payments/1", &token).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["x-ratelimit-limit"], "10");
    }

    let response = app.get_with_token("/api/payments/1", &token).await;
    assert_eq!(response.status(), 429);
}

#[tokio::test]
async fn test_buckets_are_per_identity_and_route() {
    let app = spawn_app().await;
    let alice = app.login("alice").await;
    let bob = app.login("bob").await;
    app.set_rate_config(&alice, "/api/orders", 1.0, 0.01).await;

    assert_eq!(app.get_with_token("/api/orders", &alice).await.status(), 200);
    assert_eq!(app.get_with_token("/api/orders", &alice).await.status(), 429);

    // Another identity on the same route, and the same identity elsewhere
    assert_eq!(app.get_with_token("/api/orders", &bob).await.status(), 200);
    assert_eq!(app.get_with_token("/api/payments/7", &alice).await.status(), 200);
}

#[tokio::test]
async fn test_credential_rejections() {
    let app = spawn_app().await;

    let missing = app.client.get(app.url("/api/orders")).send().await.unwrap();
    assert_eq!(missing.status(), 401);

    let malformed = app
        .client
        .get(app.url("/api/orders"))
        .header("Authorization", "Bearer")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), 401);

    let invalid = app
        .client
        .get(app.url("/api/orders"))
        .header("Authorization", "Bearer not.a.jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), 403);
    let body: Value = invalid.json().await.unwrap();
    assert_eq!(body["error_code"], "AUTH_INVALID");
}

#[tokio::test]
async fn test_token_signed_with_another_secret_is_forbidden() {
    let app = spawn_app().await;
    let other = spawn_app_with(Arc::new(InMemoryTokenStore::new()), |config| {
        config.jwt_secret = "some-other-secret".to_string();
    })
    .await;

    let foreign_token = other.login("alice").await;
    let response = app.get_with_token("/api/orders", &foreign_token).await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn test_unreachable_store_fails_closed() {
    let app = spawn_app_with(Arc::new(UnreachableStore), |_| {}).await;
    let token = app.login("alice").await;

    let response = app.get_with_token("/api/orders", &token).await;
    assert_eq!(response.status(), 500);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error_code"], "LIMITER_UNAVAILABLE");
    assert_eq!(body["error"], "Internal Server Error during Rate Check");
}

#[tokio::test]
async fn test_request_is_forwarded_with_identity() {
    let app = spawn_app().await;
    let token = app.login("alice").await;

    let response = app
        .client
        .post(app.url("/api/orders?expand=items&page=2"))
        .bearer_auth(&token)
        .header("x-user-id", "mallory")
        .header("x-request-id", "trace-42")
        .header("x-custom", "kept")
        .json(&json!({ "item": "book", "amount": 12 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-downstream"], "echo");
    assert!(response.headers().contains_key("x-ratelimit-remaining"));

    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["path"], "/api/orders");
    assert_eq!(echoed["query"], "expand=items&page=2");
    assert_eq!(echoed["headers"]["x-user-id"], "alice");
    assert_eq!(echoed["headers"]["x-request-id"], "trace-42");
    assert_eq!(echoed["headers"]["x-custom"], "kept");
    assert_eq!(echoed["headers"]["content-type"], "application/json");
    assert!(echoed["headers"]["authorization"].as_str().unwrap().starts_with("Bearer "));

    let body: Value = serde_json::from_str(echoed["body"].as_str().unwrap()).unwrap();
    assert_eq!(body, json!({ "item": "book", "amount": 12 }));
}

#[tokio::test]
async fn test_request_id_is_generated_when_absent() {
    let app = spawn_app().await;
    let token = app.login("alice").await;

    let echoed: Value = app
        .get_with_token("/api/orders", &token)
        .await
        .json()
        .await
        .unwrap();
    let request_id = echoed["headers"]["x-request-id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(request_id).is_ok());
}

#[tokio::test]
async fn test_downstream_status_and_headers_are_relayed() {
    let app = spawn_app().await;
    let token = app.login("alice").await;

    let response = app.get_with_token("/api/teapot", &token).await;
    assert_eq!(response.status(), 418);
    assert_eq!(response.headers()["x-downstream"], "teapot");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "short and stout");
}

#[tokio::test]
async fn test_unreachable_downstream_is_bad_gateway() {
    let closed = closed_port_url().await;
    let app = spawn_app_with(Arc::new(InMemoryTokenStore::new()), move |config| {
        config.gateway.backend_service_url = closed;
    })
    .await;
    let token = app.login("alice").await;

    let response = app.get_with_token("/api/orders", &token).await;
    assert_eq!(response.status(), 502);
    // The request was admitted, so the budget headers are still present
    assert!(response.headers().contains_key("x-ratelimit-limit"));
}

#[tokio::test]
async fn test_slow_downstream_is_gateway_timeout() {
    let app = spawn_app().await;
    let token = app.login("alice").await;

    let response = app.get_with_token("/api/slow", &token).await;
    assert_eq!(response.status(), 504);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error_code"], "GATEWAY_TIMEOUT");
}

#[tokio::test]
async fn test_routes_outside_prefix_are_not_proxied() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/orders")).send().await.unwrap();
    assert_eq!(response.status(), 404);
}
