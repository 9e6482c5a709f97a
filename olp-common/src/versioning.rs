//! Document versioning
//!
//! Copy-on-update with lineage pointers: editing a published document means
//! spawning a new version. Each version is its own document; lineage is
//! tracked through `version`, `parent_version_uuid`, and `root_version_uuid`,
//! and exactly one version per lineage carries `is_latest`.

use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::hierarchy::{self, NodeDocument};
use crate::models::Document;
use crate::{store, uuid_utils, Error, Result};

/// Spawn the next version of a document.
///
/// Only the current latest, non-archived version may be versioned. The copy
/// gets a fresh UUID, `version + 1`, lineage pointers back to its
/// predecessor, and re-attaches itself to the predecessor's parents and
/// children so the new version is reachable from the same hierarchy.
pub async fn create_version(
    conn: &mut SqliteConnection,
    collection: &str,
    uuid: Uuid,
) -> Result<Document> {
    let doc = store::fetch(conn, collection, uuid).await?;
    if doc.is_archived {
        return Err(Error::Validation(format!(
            "Cannot version archived document {}/{}",
            collection, uuid
        )));
    }

    let mut node: NodeDocument = doc.decode()?;
    if !node.is_latest {
        return Err(Error::Validation(format!(
            "Document {}/{} is not the latest version (v{})",
            collection, uuid, node.version
        )));
    }

    let mut next = node.clone();
    next.uuid = uuid_utils::generate();
    next.version = node.version + 1;
    next.parent_version_uuid = Some(node.uuid);
    next.is_latest = true;

    node.is_latest = false;
    store::update_body(conn, collection, node.uuid, &node.to_body()?).await?;

    let created = store::insert(conn, collection, next.uuid, &next.to_body()?).await?;
    hierarchy::attach(conn, collection, next.uuid, &next.refs).await?;

    Ok(created)
}

/// All versions sharing a document's lineage, ordered by version number.
/// `uuid` may be any version in the chain.
pub async fn version_history(
    conn: &mut SqliteConnection,
    collection: &str,
    uuid: Uuid,
) -> Result<Vec<Document>> {
    let doc = store::fetch(conn, collection, uuid).await?;
    let node: NodeDocument = doc.decode()?;
    let root = node.root_version_uuid;

    let mut versions: Vec<(i64, Document)> = Vec::new();
    for candidate in store::list_all(conn, collection).await? {
        let body: NodeDocument = match candidate.decode() {
            Ok(b) => b,
            Err(_) => continue,
        };
        if body.root_version_uuid == root {
            versions.push((body.version, candidate));
        }
    }

    versions.sort_by_key(|(v, _)| *v);
    Ok(versions.into_iter().map(|(_, d)| d).collect())
}
