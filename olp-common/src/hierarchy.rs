//! Parent/child hierarchy reference-integrity engine
//!
//! Learning-hierarchy documents carry bidirectional UUID references:
//! `parent_nodes` and `child_nodes`, each a map of collection name to a list
//! of document UUIDs. The two sides are mirrors of each other and live in
//! independently stored documents, so every mutation here maintains both
//! sides: a parent's `child_nodes` list contains a child exactly when the
//! child's `parent_nodes` list contains the parent.
//!
//! All functions take `&mut SqliteConnection`; callers wrap multi-document
//! operations in one transaction so a failed mirror update never commits
//! half an edge.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::warn;
use uuid::Uuid;

use crate::models::Document;
use crate::{store, uuid_utils, Error, Result};

/// Maximum number of nodes accepted by a single tree ingest
pub const MAX_TREE_NODES: usize = 500;

/// Maximum accepted title length
pub const MAX_TITLE_LEN: usize = 500;

// ============================================================================
// Types
// ============================================================================

/// Bidirectional reference lists embedded in a hierarchy document body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRefs {
    #[serde(default)]
    pub parent_nodes: BTreeMap<String, Vec<Uuid>>,
    #[serde(default)]
    pub child_nodes: BTreeMap<String, Vec<Uuid>>,
}

impl NodeRefs {
    /// Drop duplicate UUIDs from every list, preserving first occurrence
    pub fn dedup(&mut self) {
        for list in self.parent_nodes.values_mut().chain(self.child_nodes.values_mut()) {
            let mut seen = HashSet::new();
            list.retain(|id| seen.insert(*id));
        }
    }

    /// True when no list on either side contains any UUID
    pub fn is_empty(&self) -> bool {
        self.parent_nodes.values().all(|v| v.is_empty())
            && self.child_nodes.values().all(|v| v.is_empty())
    }
}

/// Body shape shared by every hierarchy document (learning content, skill
/// graph). Archive state and timestamps live on the document row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDocument {
    pub uuid: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(flatten)]
    pub refs: NodeRefs,
    pub version: i64,
    #[serde(default)]
    pub parent_version_uuid: Option<Uuid>,
    pub root_version_uuid: Uuid,
    pub is_latest: bool,
}

impl NodeDocument {
    /// Build a fresh version-1 document
    pub fn new(title: &str, description: &str, author: Option<String>, refs: NodeRefs) -> Self {
        let uuid = uuid_utils::generate();
        Self {
            uuid,
            title: title.to_string(),
            description: description.to_string(),
            author,
            refs,
            version: 1,
            parent_version_uuid: None,
            root_version_uuid: uuid,
            is_latest: true,
        }
    }

    pub fn to_body(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(Error::from)
    }
}

/// Which collections may parent / contain which, per service
#[derive(Debug, Clone, Copy)]
pub struct CollectionRule {
    pub name: &'static str,
    pub parents: &'static [&'static str],
    pub children: &'static [&'static str],
}

/// A service's collection rule table
#[derive(Debug, Clone, Copy)]
pub struct RuleSet {
    pub rules: &'static [CollectionRule],
}

impl RuleSet {
    /// Look up a collection rule; unknown names are a validation error
    pub fn get(&self, name: &str) -> Result<&'static CollectionRule> {
        self.rules
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::Validation(format!("Unknown collection '{}'", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.name == name)
    }
}

/// One node of a bulk-import tree: document fields plus inlined children
/// grouped by child collection
#[derive(Debug, Clone, Deserialize)]
pub struct TreeNode {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub children: BTreeMap<String, Vec<TreeNode>>,
}

// ============================================================================
// Validation
// ============================================================================

/// Title must be non-empty (after trimming) and within the length cap
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::Validation("Title must not be empty".to_string()));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(Error::Validation(format!(
            "Title exceeds {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

/// Validate every reference in `refs` against the rule table and the store:
/// collections must be permitted for this node, and every referenced UUID
/// must exist. Runs before any write so a dangling reference never lands.
pub async fn validate_refs(
    conn: &mut SqliteConnection,
    rules: &RuleSet,
    collection: &str,
    refs: &NodeRefs,
) -> Result<()> {
    let rule = rules.get(collection)?;

    for (pcoll, ids) in &refs.parent_nodes {
        if !rule.parents.contains(&pcoll.as_str()) {
            return Err(Error::Validation(format!(
                "Collection '{}' cannot be a parent of '{}'",
                pcoll, collection
            )));
        }
        for id in ids {
            if store::try_fetch(conn, pcoll, *id).await?.is_none() {
                return Err(Error::Validation(format!(
                    "Dangling parent reference {}/{}",
                    pcoll, id
                )));
            }
        }
    }

    for (ccoll, ids) in &refs.child_nodes {
        if !rule.children.contains(&ccoll.as_str()) {
            return Err(Error::Validation(format!(
                "Collection '{}' cannot be a child of '{}'",
                ccoll, collection
            )));
        }
        for id in ids {
            if store::try_fetch(conn, ccoll, *id).await?.is_none() {
                return Err(Error::Validation(format!(
                    "Dangling child reference {}/{}",
                    ccoll, id
                )));
            }
        }
    }

    Ok(())
}

/// Reject reference sets that would close a cycle through this node.
///
/// Two walks: no requested parent may be the node itself or one of its
/// descendants (down through `child_nodes`), and no requested child may be
/// the node itself or one of its ancestors (up through `parent_nodes`).
pub async fn ensure_acyclic(
    conn: &mut SqliteConnection,
    collection: &str,
    uuid: Uuid,
    refs: &NodeRefs,
) -> Result<()> {
    let self_key = (collection.to_string(), uuid);
    let parents: HashSet<(String, Uuid)> = edges(&refs.parent_nodes).into_iter().collect();
    let children: HashSet<(String, Uuid)> = edges(&refs.child_nodes).into_iter().collect();

    if parents.contains(&self_key) || children.contains(&self_key) {
        return Err(Error::Validation(format!(
            "Document {}/{} cannot reference itself",
            collection, uuid
        )));
    }

    // Down: descendants reachable from the requested children
    let descendants = reachable(conn, children.iter().cloned().collect(), Direction::Down).await?;
    if let Some((c, id)) = parents.iter().find(|key| descendants.contains(*key)) {
        return Err(Error::Validation(format!(
            "Reference to {}/{} would create a cycle",
            c, id
        )));
    }

    // Up: ancestors reachable from the requested parents
    let ancestors = reachable(conn, parents.iter().cloned().collect(), Direction::Up).await?;
    if let Some((c, id)) = children.iter().find(|key| ancestors.contains(*key)) {
        return Err(Error::Validation(format!(
            "Reference to {}/{} would create a cycle",
            c, id
        )));
    }

    Ok(())
}

enum Direction {
    Up,
    Down,
}

/// Breadth-first closure over stored reference edges, including the seeds
async fn reachable(
    conn: &mut SqliteConnection,
    seeds: Vec<(String, Uuid)>,
    direction: Direction,
) -> Result<HashSet<(String, Uuid)>> {
    let mut visited: HashSet<(String, Uuid)> = HashSet::new();
    let mut queue: VecDeque<(String, Uuid)> = seeds.into();

    while let Some((coll, id)) = queue.pop_front() {
        if !visited.insert((coll.clone(), id)) {
            continue;
        }
        let Some(doc) = store::try_fetch(conn, &coll, id).await? else {
            continue;
        };
        let node: NodeDocument = doc.decode()?;
        let next = match direction {
            Direction::Up => &node.refs.parent_nodes,
            Direction::Down => &node.refs.child_nodes,
        };
        for edge in edges(next) {
            if !visited.contains(&edge) {
                queue.push_back(edge);
            }
        }
    }

    Ok(visited)
}

// ============================================================================
// Mirror maintenance
// ============================================================================

/// Add `uuid` to the mirror list of every document referenced in `refs`.
/// Appends are idempotent (no duplicate entries).
pub async fn attach(
    conn: &mut SqliteConnection,
    collection: &str,
    uuid: Uuid,
    refs: &NodeRefs,
) -> Result<()> {
    for (pcoll, pid) in edges(&refs.parent_nodes) {
        let doc = store::fetch(conn, &pcoll, pid).await?;
        let mut parent: NodeDocument = doc.decode()?;
        let list = parent.refs.child_nodes.entry(collection.to_string()).or_default();
        if !list.contains(&uuid) {
            list.push(uuid);
            store::update_body(conn, &pcoll, pid, &parent.to_body()?).await?;
        }
    }

    for (ccoll, cid) in edges(&refs.child_nodes) {
        let doc = store::fetch(conn, &ccoll, cid).await?;
        let mut child: NodeDocument = doc.decode()?;
        let list = child.refs.parent_nodes.entry(collection.to_string()).or_default();
        if !list.contains(&uuid) {
            list.push(uuid);
            store::update_body(conn, &ccoll, cid, &child.to_body()?).await?;
        }
    }

    Ok(())
}

/// Remove `uuid` from the mirror list of every document referenced in
/// `refs`. Missing mirrors are tolerated (already-dangling data repairs
/// itself on the next detach).
pub async fn detach(
    conn: &mut SqliteConnection,
    collection: &str,
    uuid: Uuid,
    refs: &NodeRefs,
) -> Result<()> {
    for (pcoll, pid) in edges(&refs.parent_nodes) {
        let Some(doc) = store::try_fetch(conn, &pcoll, pid).await? else {
            warn!("Detach: parent {}/{} missing for {}/{}", pcoll, pid, collection, uuid);
            continue;
        };
        let mut parent: NodeDocument = doc.decode()?;
        if let Some(list) = parent.refs.child_nodes.get_mut(collection) {
            list.retain(|id| *id != uuid);
            store::update_body(conn, &pcoll, pid, &parent.to_body()?).await?;
        }
    }

    for (ccoll, cid) in edges(&refs.child_nodes) {
        let Some(doc) = store::try_fetch(conn, &ccoll, cid).await? else {
            warn!("Detach: child {}/{} missing for {}/{}", ccoll, cid, collection, uuid);
            continue;
        };
        let mut child: NodeDocument = doc.decode()?;
        if let Some(list) = child.refs.parent_nodes.get_mut(collection) {
            list.retain(|id| *id != uuid);
            store::update_body(conn, &ccoll, cid, &child.to_body()?).await?;
        }
    }

    Ok(())
}

/// Per-collection set difference of two reference maps: (added, removed)
pub fn diff(old: &NodeRefs, new: &NodeRefs) -> (NodeRefs, NodeRefs) {
    fn side_diff(
        old: &BTreeMap<String, Vec<Uuid>>,
        new: &BTreeMap<String, Vec<Uuid>>,
    ) -> (BTreeMap<String, Vec<Uuid>>, BTreeMap<String, Vec<Uuid>>) {
        let mut added = BTreeMap::new();
        let mut removed = BTreeMap::new();

        for (coll, ids) in new {
            let old_ids: &[Uuid] = old.get(coll).map(|v| v.as_slice()).unwrap_or(&[]);
            let plus: Vec<Uuid> = ids.iter().filter(|id| !old_ids.contains(id)).copied().collect();
            if !plus.is_empty() {
                added.insert(coll.clone(), plus);
            }
        }
        for (coll, ids) in old {
            let new_ids: &[Uuid] = new.get(coll).map(|v| v.as_slice()).unwrap_or(&[]);
            let minus: Vec<Uuid> = ids.iter().filter(|id| !new_ids.contains(id)).copied().collect();
            if !minus.is_empty() {
                removed.insert(coll.clone(), minus);
            }
        }

        (added, removed)
    }

    let (p_added, p_removed) = side_diff(&old.parent_nodes, &new.parent_nodes);
    let (c_added, c_removed) = side_diff(&old.child_nodes, &new.child_nodes);

    (
        NodeRefs { parent_nodes: p_added, child_nodes: c_added },
        NodeRefs { parent_nodes: p_removed, child_nodes: c_removed },
    )
}

/// Replace a node's reference set: validates the additions, checks the
/// cycle guard against the full target set, then patches mirrors both ways
pub async fn apply_diff(
    conn: &mut SqliteConnection,
    rules: &RuleSet,
    collection: &str,
    uuid: Uuid,
    old: &NodeRefs,
    new: &NodeRefs,
) -> Result<()> {
    let (added, removed) = diff(old, new);

    if !added.is_empty() {
        validate_refs(conn, rules, collection, &added).await?;
    }
    ensure_acyclic(conn, collection, uuid, new).await?;

    detach(conn, collection, uuid, &removed).await?;
    attach(conn, collection, uuid, &added).await?;

    Ok(())
}

// ============================================================================
// Node lifecycle
// ============================================================================

/// Create a hierarchy document: validate title and references, check the
/// cycle guard, insert, and wire every mirror
pub async fn create_node(
    conn: &mut SqliteConnection,
    rules: &RuleSet,
    collection: &str,
    title: &str,
    description: &str,
    author: Option<String>,
    mut refs: NodeRefs,
) -> Result<Document> {
    validate_title(title)?;
    refs.dedup();
    validate_refs(conn, rules, collection, &refs).await?;

    let node = NodeDocument::new(title, description, author, refs.clone());
    ensure_acyclic(conn, collection, node.uuid, &refs).await?;

    let doc = store::insert(conn, collection, node.uuid, &node.to_body()?).await?;
    attach(conn, collection, node.uuid, &refs).await?;

    Ok(doc)
}

/// Delete one document and erase it from every mirror list
pub async fn delete_node(
    conn: &mut SqliteConnection,
    rules: &RuleSet,
    collection: &str,
    uuid: Uuid,
) -> Result<()> {
    rules.get(collection)?;
    let doc = store::fetch(conn, collection, uuid).await?;
    let node: NodeDocument = doc.decode()?;

    detach(conn, collection, uuid, &node.refs).await?;
    store::delete(conn, collection, uuid).await
}

/// Recursively delete a subtree.
///
/// The root is always deleted. A child is deleted recursively only when the
/// deletion removed its last parent; multiply-parented children are detached
/// and kept. Returns every (collection, uuid) deleted.
pub async fn delete_subtree(
    conn: &mut SqliteConnection,
    rules: &RuleSet,
    collection: &str,
    uuid: Uuid,
) -> Result<Vec<(String, Uuid)>> {
    rules.get(collection)?;
    store::fetch(conn, collection, uuid).await?;

    let mut deleted = Vec::new();
    let mut visited: HashSet<(String, Uuid)> = HashSet::new();
    let mut stack = vec![(collection.to_string(), uuid)];

    while let Some((coll, id)) = stack.pop() {
        if !visited.insert((coll.clone(), id)) {
            continue;
        }
        let Some(doc) = store::try_fetch(conn, &coll, id).await? else {
            continue;
        };
        let node: NodeDocument = doc.decode()?;

        // Erase this node from every parent still standing
        for (pcoll, pid) in edges(&node.refs.parent_nodes) {
            if let Some(pdoc) = store::try_fetch(conn, &pcoll, pid).await? {
                let mut parent: NodeDocument = pdoc.decode()?;
                if let Some(list) = parent.refs.child_nodes.get_mut(&coll) {
                    list.retain(|x| *x != id);
                    store::update_body(conn, &pcoll, pid, &parent.to_body()?).await?;
                }
            }
        }

        // Detach children; orphans join the deletion
        for (ccoll, cid) in edges(&node.refs.child_nodes) {
            let Some(cdoc) = store::try_fetch(conn, &ccoll, cid).await? else {
                continue;
            };
            let mut child: NodeDocument = cdoc.decode()?;
            if let Some(list) = child.refs.parent_nodes.get_mut(&coll) {
                list.retain(|x| *x != id);
            }
            let orphaned = child.refs.parent_nodes.values().all(|v| v.is_empty());
            store::update_body(conn, &ccoll, cid, &child.to_body()?).await?;
            if orphaned {
                stack.push((ccoll, cid));
            }
        }

        store::delete(conn, &coll, id).await?;
        deleted.push((coll, id));
    }

    Ok(deleted)
}

// ============================================================================
// Bulk import
// ============================================================================

/// Total node count of an import tree
pub fn count_nodes(node: &TreeNode) -> usize {
    1 + node
        .children
        .values()
        .flat_map(|kids| kids.iter())
        .map(count_nodes)
        .sum::<usize>()
}

/// Recursively ingest a nested document tree, creating each node depth-first
/// and wiring parent/child mirrors as it goes. Returns the created UUIDs
/// grouped by collection.
pub async fn ingest_tree(
    conn: &mut SqliteConnection,
    rules: &RuleSet,
    collection: &str,
    root: &TreeNode,
) -> Result<BTreeMap<String, Vec<Uuid>>> {
    rules.get(collection)?;

    let total = count_nodes(root);
    if total > MAX_TREE_NODES {
        return Err(Error::PayloadTooLarge(format!(
            "Import tree has {} nodes (limit {})",
            total, MAX_TREE_NODES
        )));
    }

    let mut created = BTreeMap::new();
    ingest_node(conn, rules, collection.to_string(), root, None, &mut created).await?;
    Ok(created)
}

fn ingest_node<'a>(
    conn: &'a mut SqliteConnection,
    rules: &'a RuleSet,
    collection: String,
    node: &'a TreeNode,
    parent: Option<(String, Uuid)>,
    created: &'a mut BTreeMap<String, Vec<Uuid>>,
) -> Pin<Box<dyn Future<Output = Result<Uuid>> + Send + 'a>> {
    Box::pin(async move {
        validate_title(&node.title)?;
        let rule = rules.get(&collection)?;
        for ccoll in node.children.keys() {
            if !rule.children.contains(&ccoll.as_str()) {
                return Err(Error::Validation(format!(
                    "Collection '{}' cannot be a child of '{}'",
                    ccoll, collection
                )));
            }
        }

        let mut refs = NodeRefs::default();
        if let Some((pcoll, pid)) = &parent {
            refs.parent_nodes.insert(pcoll.clone(), vec![*pid]);
        }

        let doc = NodeDocument::new(&node.title, &node.description, node.author.clone(), refs.clone());
        let uuid = doc.uuid;
        store::insert(conn, &collection, uuid, &doc.to_body()?).await?;
        attach(conn, &collection, uuid, &refs).await?;
        created.entry(collection.clone()).or_default().push(uuid);

        for (ccoll, kids) in &node.children {
            for kid in kids {
                ingest_node(
                    conn,
                    rules,
                    ccoll.clone(),
                    kid,
                    Some((collection.clone(), uuid)),
                    created,
                )
                .await?;
            }
        }

        Ok(uuid)
    })
}

/// Flatten a reference map into (collection, uuid) edges
pub fn edges(map: &BTreeMap<String, Vec<Uuid>>) -> Vec<(String, Uuid)> {
    map.iter()
        .flat_map(|(coll, ids)| ids.iter().map(move |id| (coll.clone(), *id)))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(parents: &[(&str, Uuid)], children: &[(&str, Uuid)]) -> NodeRefs {
        let mut r = NodeRefs::default();
        for (coll, id) in parents {
            r.parent_nodes.entry(coll.to_string()).or_default().push(*id);
        }
        for (coll, id) in children {
            r.child_nodes.entry(coll.to_string()).or_default().push(*id);
        }
        r
    }

    #[test]
    fn test_diff_added_and_removed() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let old = refs(&[("pathways", a), ("pathways", b)], &[]);
        let new = refs(&[("pathways", b), ("pathways", c)], &[]);

        let (added, removed) = diff(&old, &new);
        assert_eq!(added.parent_nodes["pathways"], vec![c]);
        assert_eq!(removed.parent_nodes["pathways"], vec![a]);
        assert!(added.child_nodes.is_empty());
    }

    #[test]
    fn test_diff_no_change() {
        let a = Uuid::new_v4();
        let old = refs(&[("pathways", a)], &[]);
        let (added, removed) = diff(&old, &old.clone());
        assert!(added.is_empty());
        assert!(removed.is_empty());
    }

    #[test]
    fn test_dedup_preserves_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut r = refs(&[("pathways", a), ("pathways", b), ("pathways", a)], &[]);
        r.dedup();
        assert_eq!(r.parent_nodes["pathways"], vec![a, b]);
    }

    #[test]
    fn test_validate_title() {
        assert!(validate_title("Algebra I").is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN + 1)).is_err());
    }

    #[test]
    fn test_count_nodes() {
        let tree: TreeNode = serde_json::from_value(serde_json::json!({
            "title": "root",
            "children": {
                "learning_experiences": [
                    {"title": "a", "children": {"learning_objects": [{"title": "b"}]}},
                    {"title": "c"}
                ]
            }
        }))
        .unwrap();

        assert_eq!(count_nodes(&tree), 4);
    }

    #[test]
    fn test_ruleset_lookup() {
        static RULES: RuleSet = RuleSet {
            rules: &[CollectionRule {
                name: "skills",
                parents: &["domains"],
                children: &[],
            }],
        };

        assert!(RULES.get("skills").is_ok());
        assert!(RULES.get("nope").is_err());
        assert!(RULES.contains("skills"));
    }
}
