//! Integration tests for olp-um API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;

use olp_common::api::AuthConfig;
use olp_um::{build_router, AppState};

async fn setup_app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let pool = olp_common::db::init_database(&dir.path().join("olp.db"))
        .await
        .expect("Should initialize database");

    let state = AppState {
        db: pool,
        auth: AuthConfig::disabled(),
    };
    (build_router(state), dir)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn create_user(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/users",
            json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": email,
                "user_type": "learner"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    body["uuid"].as_str().unwrap().to_string()
}

async fn create_group(app: &Router, name: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/groups", json!({ "name": name })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    body["uuid"].as_str().unwrap().to_string()
}

async fn fetch(app: &Router, uri: &str) -> Value {
    let response = app.clone().oneshot(get_request(uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    extract_json(response.into_body()).await
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _dir) = setup_app().await;

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["module"], "olp-um");
}

#[tokio::test]
async fn test_create_and_get_user() {
    let (app, _dir) = setup_app().await;

    let uuid = create_user(&app, "ada@example.com").await;
    let user = fetch(&app, &format!("/api/users/{}", uuid)).await;
    assert_eq!(user["email"], "ada@example.com");
    assert_eq!(user["status"], "active");
    assert_eq!(user["user_groups"], json!([]));
}

#[tokio::test]
async fn test_invalid_email_rejected() {
    let (app, _dir) = setup_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/users",
            json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": "not-an-email",
                "user_type": "learner"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let (app, _dir) = setup_app().await;

    create_user(&app, "ada@example.com").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/users",
            json!({
                "first_name": "Other",
                "last_name": "Person",
                "email": "Ada@Example.com",
                "user_type": "coach"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_user_fields() {
    let (app, _dir) = setup_app().await;

    let uuid = create_user(&app, "ada@example.com").await;
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/users/{}", uuid),
            json!({ "last_name": "Byron", "user_type": "instructor" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user = fetch(&app, &format!("/api/users/{}", uuid)).await;
    assert_eq!(user["last_name"], "Byron");
    assert_eq!(user["user_type"], "instructor");
    assert_eq!(user["email"], "ada@example.com");
}

#[tokio::test]
async fn test_missing_user_404() {
    let (app, _dir) = setup_app().await;

    let response = app
        .oneshot(get_request(
            "/api/users/00000000-0000-0000-0000-000000000001",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_activate_deactivate_cycle() {
    let (app, _dir) = setup_app().await;

    let uuid = create_user(&app, "ada@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/users/{}/deactivate", uuid),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let user = fetch(&app, &format!("/api/users/{}", uuid)).await;
    assert_eq!(user["status"], "inactive");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/users/{}/activate", uuid),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let user = fetch(&app, &format!("/api/users/{}", uuid)).await;
    assert_eq!(user["status"], "active");
}

#[tokio::test]
async fn test_search_by_email_and_status() {
    let (app, _dir) = setup_app().await;

    let ada = create_user(&app, "ada@example.com").await;
    let grace = create_user(&app, "grace@example.com").await;
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/users/{}/deactivate", grace),
            json!({}),
        ))
        .await
        .unwrap();

    let body = fetch(&app, "/api/users?email=ADA@example.com").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["users"][0]["uuid"], ada.as_str());

    let body = fetch(&app, "/api/users?status=inactive").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["users"][0]["uuid"], grace.as_str());

    let body = fetch(&app, "/api/users").await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["page"], 1);
}

#[tokio::test]
async fn test_add_users_mirrors_both_sides() {
    let (app, _dir) = setup_app().await;

    let ada = create_user(&app, "ada@example.com").await;
    let grace = create_user(&app, "grace@example.com").await;
    let group = create_group(&app, "Cohort A").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/groups/{}/add-users", group),
            json!({ "user_uuids": [ada, grace] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = fetch(&app, &format!("/api/groups/{}", group)).await;
    assert_eq!(body["users"].as_array().unwrap().len(), 2);

    let user = fetch(&app, &format!("/api/users/{}", ada)).await;
    assert_eq!(user["user_groups"][0], group.as_str());
}

#[tokio::test]
async fn test_add_users_idempotent() {
    let (app, _dir) = setup_app().await;

    let ada = create_user(&app, "ada@example.com").await;
    let group = create_group(&app, "Cohort A").await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/groups/{}/add-users", group),
                json!({ "user_uuids": [ada] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let body = fetch(&app, &format!("/api/groups/{}", group)).await;
    assert_eq!(body["users"].as_array().unwrap().len(), 1);
    let user = fetch(&app, &format!("/api/users/{}", ada)).await;
    assert_eq!(user["user_groups"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_add_unknown_user_applies_nothing() {
    let (app, _dir) = setup_app().await;

    let ada = create_user(&app, "ada@example.com").await;
    let group = create_group(&app, "Cohort A").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/groups/{}/add-users", group),
            json!({ "user_uuids": [ada, "00000000-0000-0000-0000-000000000001"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The batch failed as a whole: the known user was not added either
    let body = fetch(&app, &format!("/api/groups/{}", group)).await;
    assert_eq!(body["users"], json!([]));
    let user = fetch(&app, &format!("/api/users/{}", ada)).await;
    assert_eq!(user["user_groups"], json!([]));
}

#[tokio::test]
async fn test_remove_users_mirrors_both_sides() {
    let (app, _dir) = setup_app().await;

    let ada = create_user(&app, "ada@example.com").await;
    let group = create_group(&app, "Cohort A").await;

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/groups/{}/add-users", group),
            json!({ "user_uuids": [ada] }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/groups/{}/remove-users", group),
            json!({ "user_uuids": [ada] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = fetch(&app, &format!("/api/groups/{}", group)).await;
    assert_eq!(body["users"], json!([]));
    let user = fetch(&app, &format!("/api/users/{}", ada)).await;
    assert_eq!(user["user_groups"], json!([]));
}

#[tokio::test]
async fn test_delete_user_leaves_no_group_reference() {
    let (app, _dir) = setup_app().await;

    let ada = create_user(&app, "ada@example.com").await;
    let group = create_group(&app, "Cohort A").await;

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/groups/{}/add-users", group),
            json!({ "user_uuids": [ada] }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/users/{}", ada))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = fetch(&app, &format!("/api/groups/{}", group)).await;
    assert_eq!(body["users"], json!([]));
}

#[tokio::test]
async fn test_delete_group_leaves_no_user_reference() {
    let (app, _dir) = setup_app().await;

    let ada = create_user(&app, "ada@example.com").await;
    let group = create_group(&app, "Cohort A").await;

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/groups/{}/add-users", group),
            json!({ "user_uuids": [ada] }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/groups/{}", group))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user = fetch(&app, &format!("/api/users/{}", ada)).await;
    assert_eq!(user["user_groups"], json!([]));
}

#[tokio::test]
async fn test_empty_group_name_rejected() {
    let (app, _dir) = setup_app().await;

    let response = app
        .oneshot(json_request("POST", "/api/groups", json!({ "name": "  " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
