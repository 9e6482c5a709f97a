//! olp-lc library - Learning Content service
//!
//! CRUD, search, versioning, bulk import, and recursive delete over the
//! learning hierarchy: curriculum pathway → learning experience → learning
//! object → learning resource. Reference integrity between levels is
//! maintained by the shared hierarchy engine.

use axum::{middleware, Router};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use olp_common::api::{self, documents, AuthConfig, HierarchyState};
use olp_common::hierarchy::{CollectionRule, RuleSet};

pub const MODULE: &str = "olp-lc";
pub const DEFAULT_PORT: u16 = 6110;

/// Learning hierarchy collections and their permitted edges.
///
/// Every level except resources may also nest under its own collection
/// (program/sub-program, module/unit structures); resources are always
/// leaves.
pub static COLLECTION_RULES: RuleSet = RuleSet {
    rules: &[
        CollectionRule {
            name: "curriculum_pathways",
            parents: &["curriculum_pathways"],
            children: &["learning_experiences", "curriculum_pathways"],
        },
        CollectionRule {
            name: "learning_experiences",
            parents: &["curriculum_pathways", "learning_experiences"],
            children: &["learning_objects", "learning_experiences"],
        },
        CollectionRule {
            name: "learning_objects",
            parents: &["learning_experiences", "learning_objects"],
            children: &["learning_resources", "learning_objects"],
        },
        CollectionRule {
            name: "learning_resources",
            parents: &["learning_objects"],
            children: &[],
        },
    ],
};

/// Create application state for this service
pub fn app_state(db: SqlitePool, auth: AuthConfig) -> HierarchyState {
    HierarchyState::new(db, &COLLECTION_RULES, auth)
}

/// Build application router
///
/// Document routes require authentication; the health endpoint does not.
pub fn build_router(state: HierarchyState) -> Router {
    let protected = documents::document_routes().layer(middleware::from_fn_with_state(
        state.clone(),
        api::require_api_key,
    ));

    let public = api::health_router(MODULE, env!("CARGO_PKG_VERSION"));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
