//! Generic hierarchy-document REST surface
//!
//! CRUD, list/search, archive/restore, bulk tree import, recursive subtree
//! delete, and versioning over any collection named in the mounting
//! service's rule table. olp-lc and olp-sg both mount these routes with
//! their own `RuleSet`.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::pagination::{calculate_pagination, PAGE_SIZE};
use crate::api::{ApiError, HierarchyState};
use crate::hierarchy::{self, NodeDocument, NodeRefs, TreeNode};
use crate::models::Document;
use crate::store::{self, ListFilter};
use crate::{versioning, Error};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub parent_nodes: BTreeMap<String, Vec<Uuid>>,
    #[serde(default)]
    pub child_nodes: BTreeMap<String, Vec<Uuid>>,
}

/// Partial update: absent fields are left unchanged
#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub parent_nodes: Option<BTreeMap<String, Vec<Uuid>>>,
    pub child_nodes: Option<BTreeMap<String, Vec<Uuid>>>,
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub uuid: Uuid,
    pub collection: String,
    pub title: String,
    pub description: String,
    pub author: Option<String>,
    pub parent_nodes: BTreeMap<String, Vec<Uuid>>,
    pub child_nodes: BTreeMap<String, Vec<Uuid>>,
    pub version: i64,
    pub parent_version_uuid: Option<Uuid>,
    pub root_version_uuid: Uuid,
    pub is_latest: bool,
    pub is_archived: bool,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
}

impl DocumentResponse {
    pub fn from_document(doc: &Document) -> Result<Self, Error> {
        let node: NodeDocument = doc.decode()?;
        Ok(Self {
            uuid: doc.uuid,
            collection: doc.collection.clone(),
            title: node.title,
            description: node.description,
            author: node.author,
            parent_nodes: node.refs.parent_nodes,
            child_nodes: node.refs.child_nodes,
            version: node.version,
            parent_version_uuid: node.parent_version_uuid,
            root_version_uuid: node.root_version_uuid,
            is_latest: node.is_latest,
            is_archived: doc.is_archived,
            created_time: doc.created_time,
            last_modified_time: doc.last_modified_time,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Substring match against document titles
    pub title: Option<String>,
    /// Restrict to archived / non-archived documents
    pub archived: Option<bool>,
    /// Only documents whose parent_nodes reference this UUID
    pub parent: Option<Uuid>,
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub collection: String,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub documents: Vec<DocumentResponse>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub status: String,
    pub uuid: Uuid,
}

#[derive(Debug, Serialize)]
pub struct DeletedRef {
    pub collection: String,
    pub uuid: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SubtreeDeleteResponse {
    pub deleted: Vec<DeletedRef>,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub collection: String,
    pub document: TreeNode,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub total: usize,
    pub created: BTreeMap<String, Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
pub struct VersionHistoryResponse {
    pub root_version_uuid: Uuid,
    pub versions: Vec<DocumentResponse>,
}

// ============================================================================
// Router
// ============================================================================

/// Build the hierarchy-document routes (mounted under the service router,
/// behind the auth middleware)
pub fn document_routes() -> Router<HierarchyState> {
    Router::new()
        .route("/api/import", post(import_tree))
        .route("/api/:collection", post(create_document).get(list_documents))
        .route(
            "/api/:collection/:uuid",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/api/:collection/:uuid/archive", post(archive_document))
        .route("/api/:collection/:uuid/restore", post(restore_document))
        .route("/api/:collection/:uuid/subtree", delete(delete_subtree))
        .route(
            "/api/:collection/:uuid/versions",
            post(create_version).get(version_history),
        )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/:collection
pub async fn create_document(
    State(state): State<HierarchyState>,
    Path(collection): Path<String>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let refs = NodeRefs {
        parent_nodes: req.parent_nodes,
        child_nodes: req.child_nodes,
    };

    let mut tx = state.db.begin().await?;
    let doc = hierarchy::create_node(
        &mut *tx,
        state.rules,
        &collection,
        &req.title,
        &req.description,
        req.author,
        refs,
    )
    .await?;
    tx.commit().await?;

    Ok(Json(DocumentResponse::from_document(&doc)?))
}

/// GET /api/:collection/:uuid
pub async fn get_document(
    State(state): State<HierarchyState>,
    Path((collection, uuid)): Path<(String, Uuid)>,
) -> Result<Json<DocumentResponse>, ApiError> {
    state.rules.get(&collection)?;

    let mut conn = state.db.acquire().await?;
    let doc = store::fetch(&mut *conn, &collection, uuid).await?;

    Ok(Json(DocumentResponse::from_document(&doc)?))
}

/// PUT /api/:collection/:uuid
///
/// Updates fields and/or the reference set. Reference changes are applied as
/// a diff: removed mirrors are detached, added mirrors validated and
/// attached, all inside one transaction.
pub async fn update_document(
    State(state): State<HierarchyState>,
    Path((collection, uuid)): Path<(String, Uuid)>,
    Json(req): Json<UpdateDocumentRequest>,
) -> Result<Json<DocumentResponse>, ApiError> {
    state.rules.get(&collection)?;

    let mut tx = state.db.begin().await?;
    let doc = store::fetch(&mut *tx, &collection, uuid).await?;
    if doc.is_archived {
        return Err(ApiError(Error::Validation(format!(
            "Cannot update archived document {}/{}",
            collection, uuid
        ))));
    }

    let mut node: NodeDocument = doc.decode()?;
    if !node.is_latest {
        return Err(ApiError(Error::Validation(format!(
            "Document {}/{} is not the latest version; create a new version instead",
            collection, uuid
        ))));
    }

    if let Some(title) = &req.title {
        hierarchy::validate_title(title)?;
        node.title = title.clone();
    }
    if let Some(description) = req.description {
        node.description = description;
    }
    if let Some(author) = req.author {
        node.author = Some(author);
    }

    if req.parent_nodes.is_some() || req.child_nodes.is_some() {
        let mut new_refs = node.refs.clone();
        if let Some(parents) = req.parent_nodes {
            new_refs.parent_nodes = parents;
        }
        if let Some(children) = req.child_nodes {
            new_refs.child_nodes = children;
        }
        new_refs.dedup();

        hierarchy::apply_diff(&mut *tx, state.rules, &collection, uuid, &node.refs, &new_refs)
            .await?;
        node.refs = new_refs;
    }

    store::update_body(&mut *tx, &collection, uuid, &node.to_body()?).await?;
    let updated = store::fetch(&mut *tx, &collection, uuid).await?;
    tx.commit().await?;

    Ok(Json(DocumentResponse::from_document(&updated)?))
}

/// DELETE /api/:collection/:uuid
pub async fn delete_document(
    State(state): State<HierarchyState>,
    Path((collection, uuid)): Path<(String, Uuid)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let mut tx = state.db.begin().await?;
    hierarchy::delete_node(&mut *tx, state.rules, &collection, uuid).await?;
    tx.commit().await?;

    Ok(Json(DeleteResponse {
        status: "deleted".to_string(),
        uuid,
    }))
}

/// DELETE /api/:collection/:uuid/subtree
pub async fn delete_subtree(
    State(state): State<HierarchyState>,
    Path((collection, uuid)): Path<(String, Uuid)>,
) -> Result<Json<SubtreeDeleteResponse>, ApiError> {
    let mut tx = state.db.begin().await?;
    let deleted = hierarchy::delete_subtree(&mut *tx, state.rules, &collection, uuid).await?;
    tx.commit().await?;

    Ok(Json(SubtreeDeleteResponse {
        deleted: deleted
            .into_iter()
            .map(|(collection, uuid)| DeletedRef { collection, uuid })
            .collect(),
    }))
}

/// GET /api/:collection
pub async fn list_documents(
    State(state): State<HierarchyState>,
    Path(collection): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    state.rules.get(&collection)?;
    let mut conn = state.db.acquire().await?;

    if let Some(parent) = query.parent {
        // Parent filter needs the reference lists, so scan and filter in
        // memory, then page the filtered set
        let mut matches = Vec::new();
        for doc in store::list_all(&mut *conn, &collection).await? {
            if let Some(archived) = query.archived {
                if doc.is_archived != archived {
                    continue;
                }
            }
            if let Some(title) = &query.title {
                let matched = doc
                    .body_str("title")
                    .map(|t| t.to_lowercase().contains(&title.to_lowercase()))
                    .unwrap_or(false);
                if !matched {
                    continue;
                }
            }
            let node: NodeDocument = doc.decode()?;
            if node.refs.parent_nodes.values().any(|ids| ids.contains(&parent)) {
                matches.push(doc);
            }
        }

        let total = matches.len() as i64;
        let p = calculate_pagination(total, query.page);
        let documents = matches
            .into_iter()
            .skip(p.offset as usize)
            .take(PAGE_SIZE as usize)
            .map(|d| DocumentResponse::from_document(&d))
            .collect::<Result<Vec<_>, _>>()?;

        return Ok(Json(ListResponse {
            collection,
            total,
            page: p.page,
            page_size: PAGE_SIZE,
            total_pages: p.total_pages,
            documents,
        }));
    }

    let count_filter = ListFilter {
        title: query.title.clone(),
        archived: query.archived,
        ..ListFilter::default()
    };
    let total = store::count(&mut *conn, &collection, &count_filter).await?;
    let p = calculate_pagination(total, query.page);

    let filter = ListFilter {
        limit: PAGE_SIZE,
        offset: p.offset,
        ..count_filter
    };
    let documents = store::list(&mut *conn, &collection, &filter)
        .await?
        .iter()
        .map(DocumentResponse::from_document)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ListResponse {
        collection,
        total,
        page: p.page,
        page_size: PAGE_SIZE,
        total_pages: p.total_pages,
        documents,
    }))
}

/// POST /api/:collection/:uuid/archive
pub async fn archive_document(
    State(state): State<HierarchyState>,
    Path((collection, uuid)): Path<(String, Uuid)>,
) -> Result<Json<DocumentResponse>, ApiError> {
    set_archive_flag(&state, &collection, uuid, true).await
}

/// POST /api/:collection/:uuid/restore
pub async fn restore_document(
    State(state): State<HierarchyState>,
    Path((collection, uuid)): Path<(String, Uuid)>,
) -> Result<Json<DocumentResponse>, ApiError> {
    set_archive_flag(&state, &collection, uuid, false).await
}

async fn set_archive_flag(
    state: &HierarchyState,
    collection: &str,
    uuid: Uuid,
    archived: bool,
) -> Result<Json<DocumentResponse>, ApiError> {
    state.rules.get(collection)?;

    let mut conn = state.db.acquire().await?;
    store::set_archived(&mut *conn, collection, uuid, archived).await?;
    let doc = store::fetch(&mut *conn, collection, uuid).await?;

    Ok(Json(DocumentResponse::from_document(&doc)?))
}

/// POST /api/import
pub async fn import_tree(
    State(state): State<HierarchyState>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
    let mut tx = state.db.begin().await?;
    let created = hierarchy::ingest_tree(&mut *tx, state.rules, &req.collection, &req.document).await?;
    tx.commit().await?;

    let total = created.values().map(|v| v.len()).sum();
    Ok(Json(ImportResponse { total, created }))
}

/// POST /api/:collection/:uuid/versions
pub async fn create_version(
    State(state): State<HierarchyState>,
    Path((collection, uuid)): Path<(String, Uuid)>,
) -> Result<Json<DocumentResponse>, ApiError> {
    state.rules.get(&collection)?;

    let mut tx = state.db.begin().await?;
    let doc = versioning::create_version(&mut *tx, &collection, uuid).await?;
    tx.commit().await?;

    Ok(Json(DocumentResponse::from_document(&doc)?))
}

/// GET /api/:collection/:uuid/versions
pub async fn version_history(
    State(state): State<HierarchyState>,
    Path((collection, uuid)): Path<(String, Uuid)>,
) -> Result<Json<VersionHistoryResponse>, ApiError> {
    state.rules.get(&collection)?;

    let mut conn = state.db.acquire().await?;
    let versions = versioning::version_history(&mut *conn, &collection, uuid).await?;
    let root = versions
        .first()
        .map(|d| d.decode::<NodeDocument>())
        .transpose()?
        .map(|n| n.root_version_uuid)
        .unwrap_or(uuid);

    Ok(Json(VersionHistoryResponse {
        root_version_uuid: root,
        versions: versions
            .iter()
            .map(DocumentResponse::from_document)
            .collect::<Result<Vec<_>, _>>()?,
    }))
}
