//! Authentication tests for olp-lc
//!
//! Protected routes require the x-api-key header when a key digest is
//! configured; the health endpoint never does.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use tempfile::TempDir;
use tower::util::ServiceExt;

use olp_common::api::auth::{digest_key, AuthConfig};
use olp_lc::{app_state, build_router};

const TEST_KEY: &str = "0123456789abcdef0123456789abcdef";

async fn setup_app_with_auth() -> (Router, TempDir) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let pool = olp_common::db::init_database(&dir.path().join("olp.db"))
        .await
        .expect("Should initialize database");

    let auth = AuthConfig {
        api_key_digest: Some(digest_key(TEST_KEY)),
    };
    (build_router(app_state(pool, auth)), dir)
}

#[tokio::test]
async fn test_missing_api_key_rejected() {
    let (app, _dir) = setup_app_with_auth().await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/curriculum_pathways")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_api_key_rejected() {
    let (app, _dir) = setup_app_with_auth().await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/curriculum_pathways")
        .header("x-api-key", "not-the-key")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_api_key_accepted() {
    let (app, _dir) = setup_app_with_auth().await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/curriculum_pathways")
        .header("x-api-key", TEST_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_bypasses_auth() {
    let (app, _dir) = setup_app_with_auth().await;

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
