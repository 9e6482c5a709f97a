//! Tests for the document store layer

use serde_json::json;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use olp_common::store::{self, ListFilter};
use olp_common::{uuid_utils, Error};

async fn setup() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let pool = olp_common::db::init_database(&dir.path().join("olp.db"))
        .await
        .expect("Should initialize database");
    (pool, dir)
}

#[tokio::test]
async fn test_insert_and_fetch_roundtrip() {
    let (pool, _dir) = setup().await;
    let mut conn = pool.acquire().await.unwrap();

    let uuid = uuid_utils::generate();
    let body = json!({"title": "Algebra", "weight": 3});
    let doc = store::insert(&mut conn, "units", uuid, &body).await.unwrap();

    assert_eq!(doc.uuid, uuid);
    assert_eq!(doc.collection, "units");
    assert_eq!(doc.body, body);
    assert!(!doc.is_archived);

    let fetched = store::fetch(&mut conn, "units", uuid).await.unwrap();
    assert_eq!(fetched.body, body);
    assert_eq!(fetched.created_time, doc.created_time);
}

#[tokio::test]
async fn test_duplicate_insert_conflicts() {
    let (pool, _dir) = setup().await;
    let mut conn = pool.acquire().await.unwrap();

    let uuid = uuid_utils::generate();
    store::insert(&mut conn, "units", uuid, &json!({"title": "A"}))
        .await
        .unwrap();

    let err = store::insert(&mut conn, "units", uuid, &json!({"title": "B"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // Same UUID in a different collection is a distinct document
    store::insert(&mut conn, "lessons", uuid, &json!({"title": "C"}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fetch_missing_is_not_found() {
    let (pool, _dir) = setup().await;
    let mut conn = pool.acquire().await.unwrap();

    let err = store::fetch(&mut conn, "units", Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    assert!(store::try_fetch(&mut conn, "units", Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_update_body_replaces_and_touches_timestamp() {
    let (pool, _dir) = setup().await;
    let mut conn = pool.acquire().await.unwrap();

    let uuid = uuid_utils::generate();
    let created = store::insert(&mut conn, "units", uuid, &json!({"title": "A"}))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    store::update_body(&mut conn, "units", uuid, &json!({"title": "B"}))
        .await
        .unwrap();

    let updated = store::fetch(&mut conn, "units", uuid).await.unwrap();
    assert_eq!(updated.body["title"], "B");
    assert_eq!(updated.created_time, created.created_time);
    assert!(updated.last_modified_time > created.last_modified_time);

    let err = store::update_body(&mut conn, "units", Uuid::new_v4(), &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_archive_flag_and_filter() {
    let (pool, _dir) = setup().await;
    let mut conn = pool.acquire().await.unwrap();

    let a = uuid_utils::generate();
    let b = uuid_utils::generate();
    store::insert(&mut conn, "units", a, &json!({"title": "A"})).await.unwrap();
    store::insert(&mut conn, "units", b, &json!({"title": "B"})).await.unwrap();
    store::set_archived(&mut conn, "units", a, true).await.unwrap();

    let active = store::list(
        &mut conn,
        "units",
        &ListFilter { archived: Some(false), ..Default::default() },
    )
    .await
    .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].uuid, b);

    store::set_archived(&mut conn, "units", a, false).await.unwrap();
    let restored = store::fetch(&mut conn, "units", a).await.unwrap();
    assert!(!restored.is_archived);
}

#[tokio::test]
async fn test_delete_removes_row() {
    let (pool, _dir) = setup().await;
    let mut conn = pool.acquire().await.unwrap();

    let uuid = uuid_utils::generate();
    store::insert(&mut conn, "units", uuid, &json!({"title": "A"}))
        .await
        .unwrap();
    store::delete(&mut conn, "units", uuid).await.unwrap();

    let err = store::delete(&mut conn, "units", uuid).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_list_title_filter_and_count() {
    let (pool, _dir) = setup().await;
    let mut conn = pool.acquire().await.unwrap();

    for title in ["Algebra I", "Algebra II", "Geometry"] {
        let uuid = uuid_utils::generate();
        store::insert(&mut conn, "units", uuid, &json!({"title": title}))
            .await
            .unwrap();
    }

    let filter = ListFilter { title: Some("Algebra".to_string()), ..Default::default() };
    let matches = store::list(&mut conn, "units", &filter).await.unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(store::count(&mut conn, "units", &filter).await.unwrap(), 2);

    let all = ListFilter::default();
    assert_eq!(store::count(&mut conn, "units", &all).await.unwrap(), 3);
}

#[tokio::test]
async fn test_list_pages_are_stable() {
    let (pool, _dir) = setup().await;
    let mut conn = pool.acquire().await.unwrap();

    for i in 0..5 {
        let uuid = uuid_utils::generate();
        store::insert(&mut conn, "units", uuid, &json!({"title": format!("U{}", i)}))
            .await
            .unwrap();
    }

    let first = store::list(
        &mut conn,
        "units",
        &ListFilter { limit: 2, offset: 0, ..Default::default() },
    )
    .await
    .unwrap();
    let second = store::list(
        &mut conn,
        "units",
        &ListFilter { limit: 2, offset: 2, ..Default::default() },
    )
    .await
    .unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    let first_ids: Vec<Uuid> = first.iter().map(|d| d.uuid).collect();
    assert!(!second.iter().any(|d| first_ids.contains(&d.uuid)));
}
