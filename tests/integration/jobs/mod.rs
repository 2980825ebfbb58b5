//! Shoot/upload/job lifecycle integration tests (spec section 4.4).

use axum::http::{Method, StatusCode};
use bytes::Bytes;
use serde_json::{json, Value};
use serial_test::serial;
use tower::ServiceExt;
use uuid::Uuid;

use crate::common::{authed_request, parse_body, TestApp, UserFixture};

async fn create_shoot(app: &TestApp, user: &UserFixture, name: &str) -> Uuid {
    let router = app.test_router();
    let req = authed_request(Method::POST, "/shoots", &user.jwt_token, Some(json!({ "name": name })));
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = parse_body(resp).await;
    body["id"].as_str().unwrap().parse().unwrap()
}

/// Presigns an upload, seeds the object directly into the in-memory store
/// (standing in for the client's direct PUT/POST to the presigned URL),
/// then confirms it. Returns the asset id.
async fn create_confirmed_asset(app: &TestApp, user: &UserFixture, shoot_id: Uuid) -> Uuid {
    let router = app.test_router();
    let presign_req = authed_request(
        Method::POST,
        "/uploads/presign",
        &user.jwt_token,
        Some(json!({
            "shoot_id": shoot_id,
            "filename": "house.jpg",
            "content_type": "image/jpeg",
        })),
    );
    let presign_resp = router.clone().oneshot(presign_req).await.unwrap();
    assert_eq!(presign_resp.status(), StatusCode::OK);
    let presign_body: Value = parse_body(presign_resp).await;
    let asset_id: Uuid = presign_body["asset_id"].as_str().unwrap().parse().unwrap();
    let object_key = presign_body["object_key"].as_str().unwrap().to_string();

    app.store.seed(&object_key, Bytes::from_static(b"fake-jpeg-bytes"), "image/jpeg").await;

    let confirm_req = authed_request(
        Method::POST,
        "/uploads/confirm",
        &user.jwt_token,
        Some(json!({
            "asset_id": asset_id,
            "shoot_id": shoot_id,
            "object_key": object_key,
            "filename": "house.jpg",
            "size": 15,
            "content_type": "image/jpeg",
        })),
    );
    let confirm_resp = router.oneshot(confirm_req).await.unwrap();
    assert_eq!(confirm_resp.status(), StatusCode::OK);

    asset_id
}

#[tokio::test]
#[serial]
async fn create_shoot_trims_and_validates_name() {
    let app = TestApp::new().await.unwrap();
    let user = UserFixture::new(&app, 0).await.unwrap();
    let router = app.test_router();

    let req = authed_request(Method::POST, "/shoots", &user.jwt_token, Some(json!({ "name": "  Open House  " })));
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = parse_body(resp).await;
    assert_eq!(body["name"], "Open House");

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn create_shoot_rejects_empty_name() {
    let app = TestApp::new().await.unwrap();
    let user = UserFixture::new(&app, 0).await.unwrap();
    let router = app.test_router();

    let req = authed_request(Method::POST, "/shoots", &user.jwt_token, Some(json!({ "name": "" })));
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn list_shoots_paginates_newest_first() {
    let app = TestApp::new().await.unwrap();
    let user = UserFixture::new(&app, 0).await.unwrap();
    create_shoot(&app, &user, "first").await;
    create_shoot(&app, &user, "second").await;

    let router = app.test_router();
    let req = authed_request(Method::GET, "/shoots?limit=1", &user.jwt_token, None);
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = parse_body(resp).await;
    let shoots = body.as_array().unwrap();
    assert_eq!(shoots.len(), 1);
    assert_eq!(shoots[0]["name"], "second");

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn presign_upload_rejects_unsupported_content_type() {
    let app = TestApp::new().await.unwrap();
    let user = UserFixture::new(&app, 0).await.unwrap();
    let shoot_id = create_shoot(&app, &user, "shoot").await;
    let router = app.test_router();

    let req = authed_request(
        Method::POST,
        "/uploads/presign",
        &user.jwt_token,
        Some(json!({ "shoot_id": shoot_id, "filename": "doc.pdf", "content_type": "application/pdf" })),
    );
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn presign_upload_clamps_oversized_request() {
    let app = TestApp::new().await.unwrap();
    let user = UserFixture::new(&app, 0).await.unwrap();
    let shoot_id = create_shoot(&app, &user, "shoot").await;
    let router = app.test_router();

    let req = authed_request(
        Method::POST,
        "/uploads/presign",
        &user.jwt_token,
        Some(json!({
            "shoot_id": shoot_id,
            "filename": "huge.jpg",
            "content_type": "image/jpeg",
            "max_bytes": 60 * 1024 * 1024,
        })),
    );
    let resp = router.oneshot(req).await.unwrap();
    // A requested cap above MAX_UPLOAD_BYTES is clamped down, not rejected.
    assert_eq!(resp.status(), StatusCode::OK);

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn presign_upload_rejects_foreign_shoot() {
    let app = TestApp::new().await.unwrap();
    let owner = UserFixture::new(&app, 0).await.unwrap();
    let stranger = UserFixture::new(&app, 0).await.unwrap();
    let shoot_id = create_shoot(&app, &owner, "owner's shoot").await;
    let router = app.test_router();

    let req = authed_request(
        Method::POST,
        "/uploads/presign",
        &stranger.jwt_token,
        Some(json!({ "shoot_id": shoot_id, "filename": "x.jpg", "content_type": "image/jpeg" })),
    );
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    app.cleanup().await.unwrap();
}

/// Spec P6: a `confirm_upload` whose object is absent at the store creates
/// no asset row.
#[tokio::test]
#[serial]
async fn confirm_upload_without_seeded_object_fails_and_creates_no_asset() {
    let app = TestApp::new().await.unwrap();
    let user = UserFixture::new(&app, 0).await.unwrap();
    let shoot_id = create_shoot(&app, &user, "shoot").await;
    let router = app.test_router();

    let presign_req = authed_request(
        Method::POST,
        "/uploads/presign",
        &user.jwt_token,
        Some(json!({ "shoot_id": shoot_id, "filename": "house.jpg", "content_type": "image/jpeg" })),
    );
    let presign_body: Value = parse_body(router.clone().oneshot(presign_req).await.unwrap()).await;
    let asset_id = presign_body["asset_id"].as_str().unwrap().to_string();
    let object_key = presign_body["object_key"].as_str().unwrap().to_string();

    let confirm_req = authed_request(
        Method::POST,
        "/uploads/confirm",
        &user.jwt_token,
        Some(json!({
            "asset_id": asset_id,
            "shoot_id": shoot_id,
            "object_key": object_key,
            "filename": "house.jpg",
            "size": 15,
            "content_type": "image/jpeg",
        })),
    );
    let resp = router.oneshot(confirm_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM assets")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn confirm_upload_succeeds_once_object_is_present() {
    let app = TestApp::new().await.unwrap();
    let user = UserFixture::new(&app, 0).await.unwrap();
    let shoot_id = create_shoot(&app, &user, "shoot").await;
    let asset_id = create_confirmed_asset(&app, &user, shoot_id).await;
    assert_ne!(asset_id, Uuid::nil());

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn create_job_rejects_foreign_asset_as_not_found() {
    let app = TestApp::new().await.unwrap();
    let owner = UserFixture::new(&app, 5).await.unwrap();
    let stranger = UserFixture::new(&app, 5).await.unwrap();
    let shoot_id = create_shoot(&app, &owner, "shoot").await;
    let asset_id = create_confirmed_asset(&app, &owner, shoot_id).await;

    let router = app.test_router();
    let req = authed_request(
        Method::POST,
        "/jobs",
        &stranger.jwt_token,
        Some(json!({ "asset_id": asset_id, "prompt": "brighten", "tier": "free" })),
    );
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    app.cleanup().await.unwrap();
}

/// Boundary: `credits_used = 2`, balance `= 1` — insufficient, no job row,
/// balance unchanged (spec section 8).
#[tokio::test]
#[serial]
async fn create_job_rejects_insufficient_credits_without_side_effects() {
    let app = TestApp::new().await.unwrap();
    let user = UserFixture::new(&app, 1).await.unwrap();
    let shoot_id = create_shoot(&app, &user, "shoot").await;
    let asset_id = create_confirmed_asset(&app, &user, shoot_id).await;

    let router = app.test_router();
    let req = authed_request(
        Method::POST,
        "/jobs",
        &user.jwt_token,
        Some(json!({ "asset_id": asset_id, "prompt": "brighten this photo", "tier": "premium" })),
    );
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(app.balance(user.user_id).await.unwrap(), 1);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs").fetch_one(&app.pool).await.unwrap();
    assert_eq!(count.0, 0);

    app.cleanup().await.unwrap();
}

/// Boundary: `credits_used = 2`, balance `= 2` — succeeds, balance drops to
/// exactly 0 at reservation time.
#[tokio::test]
#[serial]
async fn create_job_reserves_credits_down_to_exactly_zero() {
    let app = TestApp::new().await.unwrap();
    let user = UserFixture::new(&app, 2).await.unwrap();
    let shoot_id = create_shoot(&app, &user, "shoot").await;
    let asset_id = create_confirmed_asset(&app, &user, shoot_id).await;

    let router = app.test_router();
    let req = authed_request(
        Method::POST,
        "/jobs",
        &user.jwt_token,
        Some(json!({ "asset_id": asset_id, "prompt": "brighten this photo", "tier": "premium" })),
    );
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = parse_body(resp).await;
    assert_eq!(body["status"], "queued");
    assert_eq!(body["credits_used"], 2);
    assert_eq!(app.balance(user.user_id).await.unwrap(), 0);

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn get_job_mints_output_url_once_job_has_output() {
    let app = TestApp::new().await.unwrap();
    let user = UserFixture::new(&app, 5).await.unwrap();
    let shoot_id = create_shoot(&app, &user, "shoot").await;
    let asset_id = create_confirmed_asset(&app, &user, shoot_id).await;

    let router = app.test_router();
    let create_req = authed_request(
        Method::POST,
        "/jobs",
        &user.jwt_token,
        Some(json!({ "asset_id": asset_id, "prompt": "brighten", "tier": "free" })),
    );
    let create_body: Value = parse_body(router.clone().oneshot(create_req).await.unwrap()).await;
    let job_id = create_body["id"].as_str().unwrap();

    // Before the worker has run, output_url is absent.
    let get_req = authed_request(Method::GET, &format!("/jobs/{job_id}"), &user.jwt_token, None);
    let get_body: Value = parse_body(router.clone().oneshot(get_req).await.unwrap()).await;
    assert!(get_body["output_url"].is_null());

    let dispatcher = luster_jobs::Dispatcher::new(
        app.repos.clone(),
        app.object_store(),
        app.provider.clone(),
        app.app_config.clone(),
    );
    let claimed = dispatcher.poll_once().await.unwrap();
    assert!(claimed, "a queued job must be claimable");

    let get_req2 = authed_request(Method::GET, &format!("/jobs/{job_id}"), &user.jwt_token, None);
    let get_body2: Value = parse_body(router.oneshot(get_req2).await.unwrap()).await;
    assert_eq!(get_body2["status"], "succeeded");
    assert!(get_body2["output_url"].is_string());

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn list_jobs_filters_by_status() {
    let app = TestApp::new().await.unwrap();
    let user = UserFixture::new(&app, 5).await.unwrap();
    let shoot_id = create_shoot(&app, &user, "shoot").await;
    let asset_id = create_confirmed_asset(&app, &user, shoot_id).await;
    let router = app.test_router();

    let create_req = authed_request(
        Method::POST,
        "/jobs",
        &user.jwt_token,
        Some(json!({ "asset_id": asset_id, "prompt": "brighten", "tier": "free" })),
    );
    router.clone().oneshot(create_req).await.unwrap();

    let list_req = authed_request(Method::GET, "/jobs?status=queued", &user.jwt_token, None);
    let body: Value = parse_body(router.clone().oneshot(list_req).await.unwrap()).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let list_req2 = authed_request(Method::GET, "/jobs?status=succeeded", &user.jwt_token, None);
    let body2: Value = parse_body(router.oneshot(list_req2).await.unwrap()).await;
    assert_eq!(body2.as_array().unwrap().len(), 0);

    app.cleanup().await.unwrap();
}

/// P5 through the HTTP surface: once the worker's automatic refund on
/// failure has run, a manual `refund_job` call on the same job is rejected
/// rather than double-crediting.
#[tokio::test]
#[serial]
async fn refund_job_is_idempotent_over_http() {
    let app = TestApp::new().await.unwrap();
    let user = UserFixture::new(&app, 5).await.unwrap();
    let shoot_id = create_shoot(&app, &user, "shoot").await;
    let asset_id = create_confirmed_asset(&app, &user, shoot_id).await;
    let router = app.test_router();

    app.provider.behavior().set_outcome(luster_provider::mock::MockOutcome::PermanentFailure);

    let create_req = authed_request(
        Method::POST,
        "/jobs",
        &user.jwt_token,
        Some(json!({ "asset_id": asset_id, "prompt": "brighten", "tier": "free" })),
    );
    let create_body: Value = parse_body(router.clone().oneshot(create_req).await.unwrap()).await;
    let job_id = create_body["id"].as_str().unwrap().to_string();

    let dispatcher = luster_jobs::Dispatcher::new(
        app.repos.clone(),
        app.object_store(),
        app.provider.clone(),
        app.app_config.clone(),
    );
    dispatcher.poll_once().await.unwrap();

    assert_eq!(app.balance(user.user_id).await.unwrap(), 5);

    let refund_req = authed_request(Method::POST, &format!("/jobs/{job_id}/refund"), &user.jwt_token, None);
    let resp = router.oneshot(refund_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.balance(user.user_id).await.unwrap(), 5);

    app.cleanup().await.unwrap();
}

/// Deleting a shoot removes all of its assets, jobs, and events, and
/// best-effort deletes referenced store objects (spec section 4.4).
#[tokio::test]
#[serial]
async fn delete_shoot_cascades_assets_and_jobs() {
    let app = TestApp::new().await.unwrap();
    let user = UserFixture::new(&app, 5).await.unwrap();
    let shoot_id = create_shoot(&app, &user, "shoot").await;
    let asset_id = create_confirmed_asset(&app, &user, shoot_id).await;
    let router = app.test_router();

    let create_req = authed_request(
        Method::POST,
        "/jobs",
        &user.jwt_token,
        Some(json!({ "asset_id": asset_id, "prompt": "brighten", "tier": "free" })),
    );
    router.clone().oneshot(create_req).await.unwrap();

    let delete_req =
        authed_request(Method::DELETE, &format!("/shoots/{shoot_id}"), &user.jwt_token, None);
    let resp = router.clone().oneshot(delete_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = parse_body(resp).await;
    assert_eq!(body["deleted_assets"], 1);
    assert_eq!(body["deleted_jobs"], 1);

    let shoots_left: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM shoots WHERE id = $1")
        .bind(shoot_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(shoots_left.0, 0);
    let jobs_left: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs").fetch_one(&app.pool).await.unwrap();
    assert_eq!(jobs_left.0, 0);
    let events_left: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM job_events").fetch_one(&app.pool).await.unwrap();
    assert_eq!(events_left.0, 0);

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn delete_shoot_rejects_foreign_owner() {
    let app = TestApp::new().await.unwrap();
    let owner = UserFixture::new(&app, 0).await.unwrap();
    let stranger = UserFixture::new(&app, 0).await.unwrap();
    let shoot_id = create_shoot(&app, &owner, "shoot").await;
    let router = app.test_router();

    let req = authed_request(Method::DELETE, &format!("/shoots/{shoot_id}"), &stranger.jwt_token, None);
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    app.cleanup().await.unwrap();
}
