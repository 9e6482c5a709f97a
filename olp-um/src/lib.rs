//! olp-um library - User Management service
//!
//! Typed user and group documents over the shared document store, with
//! two-sided membership mirroring between users and groups.

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use olp_common::api::{self, AuthConfig};

pub mod groups;
pub mod models;
pub mod users;

pub const MODULE: &str = "olp-um";
pub const DEFAULT_PORT: u16 = 6130;

#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// API-key auth configuration
    pub auth: AuthConfig,
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
            "/api/users",
            post(users::create_user).get(users::search_users),
        )
        .route(
            "/api/users/:uuid",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/api/users/:uuid/activate", post(users::activate_user))
        .route("/api/users/:uuid/deactivate", post(users::deactivate_user))
        .route(
            "/api/groups",
            post(groups::create_group).get(groups::list_groups),
        )
        .route(
            "/api/groups/:uuid",
            get(groups::get_group)
                .put(groups::update_group)
                .delete(groups::delete_group),
        )
        .route("/api/groups/:uuid/add-users", post(groups::add_users))
        .route("/api/groups/:uuid/remove-users", post(groups::remove_users))
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
