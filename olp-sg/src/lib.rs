//! olp-sg library - Skill Graph service
//!
//! CRUD over the skill taxonomy (domain → sub-domain → skill, with
//! competencies aligned to skills) plus similarity-based alignment between
//! skills and any other collection in the graph. Reference integrity uses
//! the shared hierarchy engine.

use axum::{middleware, routing::post, Router};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use olp_common::api::{self, documents, AuthConfig, HierarchyState};
use olp_common::hierarchy::{CollectionRule, RuleSet};

pub mod align;

pub const MODULE: &str = "olp-sg";
pub const DEFAULT_PORT: u16 = 6120;

/// Skill graph collections and their permitted edges
pub static COLLECTION_RULES: RuleSet = RuleSet {
    rules: &[
        CollectionRule {
            name: "domains",
            parents: &[],
            children: &["sub_domains"],
        },
        CollectionRule {
            name: "sub_domains",
            parents: &["domains"],
            children: &["skills"],
        },
        CollectionRule {
            name: "skills",
            parents: &["sub_domains", "competencies"],
            children: &[],
        },
        CollectionRule {
            name: "competencies",
            parents: &[],
            children: &["skills"],
        },
    ],
};

/// Create application state for this service
pub fn app_state(db: SqlitePool, auth: AuthConfig) -> HierarchyState {
    HierarchyState::new(db, &COLLECTION_RULES, auth)
}

/// Build application router
pub fn build_router(state: HierarchyState) -> Router {
    let protected = documents::document_routes()
        .route("/api/skills/:uuid/align", post(align::align_skill))
        .layer(middleware::from_fn_with_state(
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
