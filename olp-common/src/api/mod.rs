//! Shared HTTP API plumbing for OLPS services

pub mod auth;
pub mod documents;
pub mod error;
pub mod health;
pub mod pagination;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::hierarchy::RuleSet;

pub use auth::{require_api_key, AuthConfig};
pub use error::ApiError;
pub use health::health_router;

/// Application state for hierarchy-document services (olp-lc, olp-sg)
#[derive(Clone)]
pub struct HierarchyState {
    /// Database connection pool
    pub db: SqlitePool,
    /// The service's collection rule table
    pub rules: &'static RuleSet,
    /// API-key auth configuration
    pub auth: AuthConfig,
}

impl HierarchyState {
    pub fn new(db: SqlitePool, rules: &'static RuleSet, auth: AuthConfig) -> Self {
        Self { db, rules, auth }
    }
}

impl FromRef<HierarchyState> for AuthConfig {
    fn from_ref(state: &HierarchyState) -> AuthConfig {
        state.auth.clone()
    }
}
