//! Health check endpoint
//!
//! Every service exposes `GET /health` without authentication, reporting
//! module name and version for monitoring.

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// Build the health route for a service
pub fn health_router<S>(module: &'static str, version: &'static str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/health",
        get(move || async move {
            Json(HealthResponse {
                status: "ok".to_string(),
                module: module.to_string(),
                version: version.to_string(),
            })
        }),
    )
}
