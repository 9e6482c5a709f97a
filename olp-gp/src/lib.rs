//! olp-gp library - Grade Passback service
//!
//! Line items (gradable columns) and per-user results over the shared
//! document store, bulk CSV grade import, and best-effort outbound delivery
//! of accepted scores to a configured passback URL.

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use olp_common::api::{self, AuthConfig};

pub mod import;
pub mod line_items;
pub mod models;
pub mod passback;
pub mod scores;

pub const MODULE: &str = "olp-gp";
pub const DEFAULT_PORT: u16 = 6140;

/// Settings table key holding the outbound passback URL
pub const PASSBACK_URL_SETTING: &str = "passback_url";

#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// API-key auth configuration
    pub auth: AuthConfig,
    /// Shared client for outbound passback
    pub http: reqwest::Client,
    /// Where accepted scores are delivered; None disables passback
    pub passback_url: Option<String>,
}

impl FromRef<AppState> for AuthConfig {
    fn from_ref(state: &AppState) -> AuthConfig {
        state.auth.clone()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/line-items",
            post(line_items::create_line_item).get(line_items::list_line_items),
        )
        .route(
            "/api/line-items/:uuid",
            get(line_items::get_line_item)
                .put(line_items::update_line_item)
                .delete(line_items::delete_line_item),
        )
        .route("/api/line-items/:uuid/scores", post(scores::submit_score))
        .route("/api/line-items/:uuid/results", get(scores::list_results))
        .route(
            "/api/line-items/:uuid/import-grades",
            post(import::import_grades),
        )
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
