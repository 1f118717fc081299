//! End-to-end tests for the order webhook routes, with the Shopify Admin API
//! replaced by a wiremock server.

use std::{collections::HashMap, time::Duration};

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use order_tagger::{router, sign, AppState, Config};
use serde_json::json;
use tower::ServiceExt;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const SECRET: &str = "shpss_integration";
const TOKEN: &str = "shpat_integration";

fn config(server: &MockServer, extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("SHOPIFY_SHARED_SECRET", SECRET),
        ("SHOPIFY_ACCESS_TOKEN", TOKEN),
        ("SHOPIFY_SHOP", "pharmacy-test.myshopify.com"),
        ("API_TIMEOUT_SECS", "2"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    vars.insert("SHOPIFY_API_BASE_URL".to_string(), server.uri());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_vars(vars).expect("valid test config")
}

fn app(server: &MockServer, extra: &[(&str, &str)]) -> Router {
    router(AppState::new(config(server, extra)).expect("app state"))
}

fn order_body(sku: &str, tags: &str) -> String {
    json!({
        "id": 450789469u64,
        "name": "#1001",
        "line_items": [{"id": 1, "sku": sku, "quantity": 1}],
        "tags": tags
    })
    .to_string()
}

fn signed_request(uri: &str, body: String) -> Request<Body> {
    let signature = sign(body.as_bytes(), SECRET);
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-Shopify-Hmac-Sha256", signature)
        .header("X-Shopify-Topic", "orders/create")
        .header("X-Shopify-Webhook-Id", "b54557e4-bdd9-4b37-8a5f-bf7d70bcd043")
        .body(Body::from(body))
        .expect("request")
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8_lossy(&bytes).into_owned()
}

async fn mount_update(server: &MockServer, tags: &str, status: u16, expected_calls: u64) {
    Mock::given(method("PUT"))
        .and(path("/orders/450789469.json"))
        .and(header("X-Shopify-Access-Token", TOKEN))
        .and(body_json(json!({"order": {"id": 450789469u64, "tags": tags}})))
        .respond_with(ResponseTemplate::new(status))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn put_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .count()
}

#[tokio::test]
async fn matching_order_is_tagged_once() -> Result<()> {
    let server = MockServer::start().await;
    mount_update(&server, "vip, prescription-required", 200, 1).await;

    let response = app(&server, &[])
        .oneshot(signed_request(
            "/webhooks/orders-create",
            order_body("9000000", "vip"),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
    assert_eq!(put_count(&server).await, 1);
    Ok(())
}

#[tokio::test]
async fn orders_update_route_shares_the_handler() -> Result<()> {
    let server = MockServer::start().await;
    mount_update(&server, "prescription-required", 200, 1).await;

    let response = app(&server, &[])
        .oneshot(signed_request(
            "/webhooks/orders-update",
            order_body("9000000", ""),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn already_tagged_order_is_left_alone() -> Result<()> {
    let server = MockServer::start().await;

    let response = app(&server, &[])
        .oneshot(signed_request(
            "/webhooks/orders-create",
            order_body("9000000", "vip, prescription-required"),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(put_count(&server).await, 0);
    Ok(())
}

#[tokio::test]
async fn order_without_target_sku_is_left_alone() -> Result<()> {
    let server = MockServer::start().await;

    let response = app(&server, &[])
        .oneshot(signed_request(
            "/webhooks/orders-create",
            order_body("1234", "vip"),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(put_count(&server).await, 0);
    Ok(())
}

#[tokio::test]
async fn null_line_items_are_acknowledged_without_update() -> Result<()> {
    let server = MockServer::start().await;

    let body = json!({"id": 450789469u64, "line_items": null, "tags": "vip"}).to_string();
    let response = app(&server, &[])
        .oneshot(signed_request("/webhooks/orders-create", body))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(put_count(&server).await, 0);
    Ok(())
}

#[tokio::test]
async fn padded_marker_tag_is_not_added_twice() -> Result<()> {
    let server = MockServer::start().await;

    let response = app(&server, &[("MARKER_TAG", " rx-check ")])
        .oneshot(signed_request(
            "/webhooks/orders-update",
            order_body("9000000", "vip, rx-check"),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(put_count(&server).await, 0);
    Ok(())
}

#[tokio::test]
async fn custom_sku_and_tag_are_honoured() -> Result<()> {
    let server = MockServer::start().await;
    mount_update(&server, "vip, rx-check", 200, 1).await;

    let response = app(&server, &[("TARGET_SKU", "1234"), ("MARKER_TAG", "rx-check")])
        .oneshot(signed_request(
            "/webhooks/orders-create",
            order_body("1234", "vip"),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn invalid_signature_is_unauthorized() -> Result<()> {
    let server = MockServer::start().await;

    let body = order_body("9000000", "vip");
    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/orders-create")
        .header("X-Shopify-Hmac-Sha256", sign(body.as_bytes(), "wrong-secret"))
        .body(Body::from(body))?;

    let response = app(&server, &[]).oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, "Unauthorized");
    assert_eq!(put_count(&server).await, 0);
    Ok(())
}

#[tokio::test]
async fn missing_signature_is_unauthorized() -> Result<()> {
    let server = MockServer::start().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/orders-create")
        .body(Body::from(order_body("9000000", "vip")))?;

    let response = app(&server, &[]).oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn tampered_body_is_unauthorized() -> Result<()> {
    let server = MockServer::start().await;

    let body = order_body("9000000", "vip");
    let signature = sign(body.as_bytes(), SECRET);
    let tampered = body.replacen("vip", "vio", 1);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/orders-create")
        .header("X-Shopify-Hmac-Sha256", signature)
        .body(Body::from(tampered))?;

    let response = app(&server, &[]).oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn signature_covers_raw_bytes_not_normalized_json() -> Result<()> {
    let server = MockServer::start().await;
    mount_update(&server, "vip, prescription-required", 200, 1).await;

    // Unusual whitespace and key order must survive verification untouched.
    let body = "{ \"tags\" : \"vip\",\n  \"line_items\":[ {\"sku\":\"9000000\"} ],\"id\":450789469 }"
        .to_string();

    let response = app(&server, &[])
        .oneshot(signed_request("/webhooks/orders-create", body))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_bad_request() -> Result<()> {
    let server = MockServer::start().await;

    let response = app(&server, &[])
        .oneshot(signed_request(
            "/webhooks/orders-create",
            "{\"id\": 1, \"line_items\": [".to_string(),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Invalid JSON");
    Ok(())
}

#[tokio::test]
async fn wrong_method_is_not_allowed() -> Result<()> {
    let server = MockServer::start().await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/webhooks/orders-create")
        .body(Body::empty())?;

    let response = app(&server, &[]).oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}

#[tokio::test]
async fn remote_failure_still_acknowledges_webhook() -> Result<()> {
    let server = MockServer::start().await;
    mount_update(&server, "vip, prescription-required", 500, 1).await;

    let response = app(&server, &[])
        .oneshot(signed_request(
            "/webhooks/orders-create",
            order_body("9000000", "vip"),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn unreachable_remote_still_acknowledges_webhook() -> Result<()> {
    let server = MockServer::start().await;
    let config = config(&server, &[("SHOPIFY_API_BASE_URL", "http://127.0.0.1:1")]);
    let app = router(AppState::new(config)?);

    let response = app
        .oneshot(signed_request(
            "/webhooks/orders-create",
            order_body("9000000", "vip"),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn bypass_flag_accepts_unsigned_requests() -> Result<()> {
    let server = MockServer::start().await;
    mount_update(&server, "vip, prescription-required", 200, 1).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/orders-create")
        .body(Body::from(order_body("9000000", "vip")))?;

    let response = app(&server, &[("SKIP_HMAC_CHECK", "true")])
        .oneshot(request)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn delayed_tagging_responds_before_updating() -> Result<()> {
    let server = MockServer::start().await;
    mount_update(&server, "vip, prescription-required", 200, 1).await;

    let response = app(&server, &[("TAG_DELAY_SECS", "1")])
        .oneshot(signed_request(
            "/webhooks/orders-create",
            order_body("9000000", "vip"),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(put_count(&server).await, 0);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(put_count(&server).await, 1);
    Ok(())
}

#[tokio::test]
async fn health_check_reports_healthy() -> Result<()> {
    let server = MockServer::start().await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())?;

    let response = app(&server, &[]).oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body_text(response).await)?;
    assert_eq!(value["status"], "healthy");
    Ok(())
}
