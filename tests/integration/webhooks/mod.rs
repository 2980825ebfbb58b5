//! Webhook Sink integration tests (spec section 4.6).

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use serial_test::serial;
use sha2::Sha256;
use tower::ServiceExt;
use uuid::Uuid;

use crate::common::TestApp;

fn sign(secret: &str, body: &[u8]) -> String {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn webhook_request(secret: Option<&str>, body: Value) -> Request<Body> {
    let bytes = serde_json::to_vec(&body).unwrap();
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/billing")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-signature", sign(secret, &bytes));
    }
    builder.body(Body::from(bytes)).unwrap()
}

fn purchase_event(event_id: &str, user_id: Uuid, product_id: &str) -> Value {
    json!({
        "event": {
            "id": event_id,
            "type": "INITIAL_PURCHASE",
            "app_user_id": user_id.to_string(),
            "product_id": product_id,
        }
    })
}

#[tokio::test]
#[serial]
async fn valid_signature_is_accepted_and_grants_configured_credits() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();
    let user_id = Uuid::new_v4();
    let secret = app.app_config.webhook_secret.clone().unwrap();

    let body = purchase_event("evt_ok_1", user_id, "pro.monthly");
    let req = webhook_request(Some(&secret), body);
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(app.balance(user_id).await.unwrap(), 100, "pro.monthly grants 100 credits in test config");

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn missing_signature_is_rejected_when_secret_is_configured() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();
    let user_id = Uuid::new_v4();

    let body = purchase_event("evt_nosig", user_id, "pro.monthly");
    let req = webhook_request(None, body);
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0, "a rejected delivery must not provision a user or grant credits");

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn wrong_signature_is_rejected() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();
    let user_id = Uuid::new_v4();

    let body = purchase_event("evt_wrongsig", user_id, "pro.monthly");
    let req = webhook_request(Some("not-the-configured-secret"), body);
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn malformed_json_body_is_rejected() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();
    let secret = app.app_config.webhook_secret.clone().unwrap();

    let bytes = b"not json at all".to_vec();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/billing")
        .header("content-type", "application/json")
        .header("x-signature", sign(&secret, &bytes))
        .body(Body::from(bytes))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await.unwrap();
}

/// Unknown event types (or any product the webhook secret doesn't
/// recognize product-wise) are acknowledged with `200` rather than
/// rejected, so the provider never retries into a storm (spec section 7).
#[tokio::test]
#[serial]
async fn unknown_event_type_is_acknowledged_with_no_credit_effect() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();
    let user_id = Uuid::new_v4();
    let secret = app.app_config.webhook_secret.clone().unwrap();

    let body = json!({
        "event": {
            "id": "evt_unknown_1",
            "type": "SOME_FUTURE_EVENT",
            "app_user_id": user_id.to_string(),
            "product_id": "pro.monthly",
        }
    });
    let req = webhook_request(Some(&secret), body);
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn cancellation_event_has_no_credit_effect() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();
    let user_id = app.create_test_user(5).await.unwrap();
    let secret = app.app_config.webhook_secret.clone().unwrap();

    let body = json!({
        "event": {
            "id": "evt_cancel_1",
            "type": "CANCELLATION",
            "app_user_id": user_id.to_string(),
            "product_id": "pro.monthly",
        }
    });
    let req = webhook_request(Some(&secret), body);
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(app.balance(user_id).await.unwrap(), 5);

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn event_for_unconfigured_product_is_acknowledged_with_no_credit_effect() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();
    let user_id = Uuid::new_v4();
    let secret = app.app_config.webhook_secret.clone().unwrap();

    let body = purchase_event("evt_unknown_product", user_id, "not.a.configured.product");
    let req = webhook_request(Some(&secret), body);
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);

    app.cleanup().await.unwrap();
}

/// Scenario 6 / P8: a replayed delivery (same event id) is applied exactly
/// once, even though the provider sends it twice.
#[tokio::test]
#[serial]
async fn replayed_delivery_applies_credits_exactly_once() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();
    let user_id = Uuid::new_v4();
    let secret = app.app_config.webhook_secret.clone().unwrap();

    let body = purchase_event("evt_replay_http", user_id, "pro.monthly");

    let first = router.clone().oneshot(webhook_request(Some(&secret), body.clone())).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = router.oneshot(webhook_request(Some(&secret), body)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);

    assert_eq!(app.balance(user_id).await.unwrap(), 100, "a replayed delivery must not double-credit");

    app.cleanup().await.unwrap();
}

/// A non-UUID `app_user_id` is logged and acknowledged rather than
/// crashing the delivery (spec section 7: malformed identities never fail
/// the webhook outright).
#[tokio::test]
#[serial]
async fn malformed_app_user_id_is_acknowledged_without_crediting_anything() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();
    let secret = app.app_config.webhook_secret.clone().unwrap();

    let body = json!({
        "event": {
            "id": "evt_bad_user",
            "type": "INITIAL_PURCHASE",
            "app_user_id": "not-a-uuid",
            "product_id": "pro.monthly",
        }
    });
    let req = webhook_request(Some(&secret), body);
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    app.cleanup().await.unwrap();
}
