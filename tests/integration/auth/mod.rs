//! Bearer-token authentication integration tests.
//!
//! Exercises `VerifiedCaller` end to end through a real route (`GET
//! /credits` — the cheapest authenticated endpoint that touches no other
//! domain state) rather than unit-testing the extractor in isolation,
//! since the interesting behavior (JIT provisioning, header parsing) only
//! shows up wired into a router and a real Postgres pool.

use axum::http::{Method, StatusCode};
use serde_json::Value;
use serial_test::serial;
use tower::ServiceExt;
use uuid::Uuid;

use crate::common::{authed_request, create_test_jwt_for, parse_body, unauthed_request, TestApp, UserFixture};

#[tokio::test]
#[serial]
async fn missing_authorization_header_is_rejected() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();

    let request = unauthed_request(Method::GET, "/credits", None);
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = parse_body(response).await;
    assert_eq!(body["error"]["code"], "MISSING_AUTHORIZATION");

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn malformed_authorization_header_is_rejected() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();

    let request = axum::http::Request::builder()
        .method(Method::GET)
        .uri("/credits")
        .header("authorization", "Basic not-a-bearer-token")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = parse_body(response).await;
    assert_eq!(body["error"]["code"], "INVALID_AUTHORIZATION");

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn unparseable_jwt_is_rejected() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();

    let request = authed_request(Method::GET, "/credits", "not.a.jwt", None);
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = parse_body(response).await;
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn expired_jwt_is_rejected() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();

    let user_id = Uuid::new_v4();
    let past = (chrono::Utc::now() - chrono::Duration::hours(2)).timestamp() as u64;

    #[derive(serde::Serialize)]
    struct ExpiredClaims {
        sub: String,
        email: String,
        aud: String,
        role: String,
        iat: u64,
        exp: u64,
    }
    let claims = ExpiredClaims {
        sub: user_id.to_string(),
        email: "ghost@luster.test".to_string(),
        aud: "authenticated".to_string(),
        role: "authenticated".to_string(),
        iat: past,
        exp: past + 1,
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(app.config.jwt_secret.as_ref()),
    )
    .unwrap();

    let request = authed_request(Method::GET, "/credits", &token, None);
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = parse_body(response).await;
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");

    app.cleanup().await.unwrap();
}

/// Spec section 3: "created on first authenticated request or webhook" —
/// a verified token for a user id the core has never seen JIT-provisions a
/// zero-balance row rather than rejecting the caller.
#[tokio::test]
#[serial]
async fn valid_jwt_for_unseen_user_jit_provisions_with_zero_balance() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();

    let user_id = Uuid::new_v4();
    let token = create_test_jwt_for(user_id, "newcomer@luster.test", &app.config.jwt_secret).unwrap();

    let request = authed_request(Method::GET, "/credits", &token, None);
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = parse_body(response).await;
    assert_eq!(body["balance"], 0);

    let row: (i32,) = sqlx::query_as("SELECT credits FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(row.0, 0);

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn valid_jwt_for_provisioned_user_reads_their_own_balance() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();
    let fixture = UserFixture::new(&app, 7).await.unwrap();

    let request = authed_request(Method::GET, "/credits", &fixture.jwt_token, None);
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = parse_body(response).await;
    assert_eq!(body["balance"], 7);

    app.cleanup().await.unwrap();
}

/// A caller can never read another user's balance by forging a different
/// subject claim — they simply authenticate as that subject (spec I8: every
/// read is scoped by the caller's own verified id, there is no path to
/// impersonate without the signing secret).
#[tokio::test]
#[serial]
async fn two_distinct_tokens_see_two_distinct_balances() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();
    let a = UserFixture::new(&app, 3).await.unwrap();
    let b = UserFixture::new(&app, 9).await.unwrap();

    let req_a = authed_request(Method::GET, "/credits", &a.jwt_token, None);
    let resp_a: Value = parse_body(router.clone().oneshot(req_a).await.unwrap()).await;
    assert_eq!(resp_a["balance"], 3);

    let req_b = authed_request(Method::GET, "/credits", &b.jwt_token, None);
    let resp_b: Value = parse_body(router.oneshot(req_b).await.unwrap()).await;
    assert_eq!(resp_b["balance"], 9);

    app.cleanup().await.unwrap();
}
