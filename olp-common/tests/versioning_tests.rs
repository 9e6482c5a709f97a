//! Engine-level tests for copy-on-update versioning

use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use olp_common::hierarchy::{self, CollectionRule, NodeDocument, NodeRefs, RuleSet};
use olp_common::{store, versioning, Error};

static RULES: RuleSet = RuleSet {
    rules: &[
        CollectionRule {
            name: "pathways",
            parents: &[],
            children: &["units"],
        },
        CollectionRule {
            name: "units",
            parents: &["pathways"],
            children: &[],
        },
    ],
};

async fn setup() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let pool = olp_common::db::init_database(&dir.path().join("olp.db"))
        .await
        .expect("Should initialize database");
    (pool, dir)
}

async fn create(pool: &SqlitePool, collection: &str, title: &str, refs: NodeRefs) -> Uuid {
    let mut conn = pool.acquire().await.unwrap();
    hierarchy::create_node(&mut conn, &RULES, collection, title, "", None, refs)
        .await
        .expect("Should create node")
        .uuid
}

async fn node(pool: &SqlitePool, collection: &str, uuid: Uuid) -> NodeDocument {
    let mut conn = pool.acquire().await.unwrap();
    store::fetch(&mut conn, collection, uuid)
        .await
        .expect("Should fetch node")
        .decode()
        .expect("Should decode node")
}

#[tokio::test]
async fn test_create_version_lineage_fields() {
    let (pool, _dir) = setup().await;

    let v1 = create(&pool, "pathways", "Math", NodeRefs::default()).await;

    let mut conn = pool.acquire().await.unwrap();
    let v2_doc = versioning::create_version(&mut conn, "pathways", v1)
        .await
        .expect("Should create version");
    let v2: NodeDocument = v2_doc.decode().unwrap();

    assert_ne!(v2.uuid, v1);
    assert_eq!(v2.version, 2);
    assert_eq!(v2.parent_version_uuid, Some(v1));
    assert!(v2.is_latest);

    let old = node(&pool, "pathways", v1).await;
    assert!(!old.is_latest);
    assert_eq!(old.root_version_uuid, v2.root_version_uuid);
}

#[tokio::test]
async fn test_new_version_keeps_hierarchy_position() {
    let (pool, _dir) = setup().await;

    let pathway = create(&pool, "pathways", "Math", NodeRefs::default()).await;
    let mut refs = NodeRefs::default();
    refs.parent_nodes.insert("pathways".to_string(), vec![pathway]);
    let unit = create(&pool, "units", "Algebra", refs).await;

    let mut conn = pool.acquire().await.unwrap();
    let v2_doc = versioning::create_version(&mut conn, "units", unit)
        .await
        .expect("Should create version");

    let parent = node(&pool, "pathways", pathway).await;
    let children = &parent.refs.child_nodes["units"];
    assert!(children.contains(&unit));
    assert!(children.contains(&v2_doc.uuid));
}

#[tokio::test]
async fn test_only_latest_is_versionable() {
    let (pool, _dir) = setup().await;

    let v1 = create(&pool, "pathways", "Math", NodeRefs::default()).await;

    let mut conn = pool.acquire().await.unwrap();
    versioning::create_version(&mut conn, "pathways", v1)
        .await
        .expect("Should create version");

    let err = versioning::create_version(&mut conn, "pathways", v1)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_archived_document_not_versionable() {
    let (pool, _dir) = setup().await;

    let v1 = create(&pool, "pathways", "Math", NodeRefs::default()).await;

    let mut conn = pool.acquire().await.unwrap();
    store::set_archived(&mut conn, "pathways", v1, true)
        .await
        .unwrap();

    let err = versioning::create_version(&mut conn, "pathways", v1)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_history_ordered_with_single_latest() {
    let (pool, _dir) = setup().await;

    let v1 = create(&pool, "pathways", "Math", NodeRefs::default()).await;

    let mut conn = pool.acquire().await.unwrap();
    let v2 = versioning::create_version(&mut conn, "pathways", v1).await.unwrap();
    let v3 = versioning::create_version(&mut conn, "pathways", v2.uuid).await.unwrap();

    // Any version in the chain resolves the same history
    for anchor in [v1, v2.uuid, v3.uuid] {
        let history = versioning::version_history(&mut conn, "pathways", anchor)
            .await
            .expect("Should load history");
        let nodes: Vec<NodeDocument> =
            history.iter().map(|d| d.decode().unwrap()).collect();

        assert_eq!(nodes.len(), 3);
        assert_eq!(
            nodes.iter().map(|n| n.version).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(nodes.iter().filter(|n| n.is_latest).count(), 1);
        assert!(nodes[2].is_latest);
    }
}
