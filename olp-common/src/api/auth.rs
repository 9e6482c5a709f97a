//! API-key authentication
//!
//! Protected routes require an `x-api-key` header. The SHA-256 digest of the
//! key is stored in the settings table; on first run a key is generated,
//! logged once, and its digest persisted. An empty stored digest disables
//! auth entirely (useful for tests and single-host deployments). Health
//! endpoints never use this middleware.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::{get_setting, set_setting};
use crate::Result;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Settings table key holding the SHA-256 digest of the API key
pub const API_KEY_SETTING: &str = "api_key_digest";

/// Auth configuration shared across a service's handlers
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// SHA-256 hex digest of the expected key; None disables auth
    pub api_key_digest: Option<String>,
}

impl AuthConfig {
    /// Auth disabled (tests, trusted single-host setups)
    pub fn disabled() -> Self {
        Self { api_key_digest: None }
    }
}

/// SHA-256 hex digest of a key string
pub fn digest_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Generate a random 32-hex-char API key
pub fn generate_key() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..16).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}

/// Load auth configuration from the settings table.
///
/// Missing entry: generate a key, log it once, store the digest.
/// Empty entry: auth disabled.
pub async fn load_auth_config(pool: &SqlitePool) -> Result<AuthConfig> {
    match get_setting(pool, API_KEY_SETTING).await? {
        Some(digest) if digest.is_empty() => {
            info!("API authentication disabled (empty {})", API_KEY_SETTING);
            Ok(AuthConfig { api_key_digest: None })
        }
        Some(digest) => Ok(AuthConfig { api_key_digest: Some(digest) }),
        None => {
            let key = generate_key();
            let digest = digest_key(&key);
            set_setting(pool, API_KEY_SETTING, &digest).await?;
            // Shown once at first startup; only the digest is persisted
            info!("Generated API key: {}", key);
            Ok(AuthConfig { api_key_digest: Some(digest) })
        }
    }
}

/// Authentication failure response (401 with JSON error body)
#[derive(Debug)]
pub enum AuthError {
    MissingKey,
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingKey => format!("Missing {} header", API_KEY_HEADER),
            AuthError::InvalidKey => "Invalid API key".to_string(),
        };

        (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
    }
}

/// Middleware guarding protected routes
pub async fn require_api_key(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> std::result::Result<Response, AuthError> {
    let Some(expected_digest) = &auth.api_key_digest else {
        // Auth disabled - pass through without validation
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingKey)?;

    if &digest_key(provided) != expected_digest {
        warn!("Rejected request with invalid API key");
        return Err(AuthError::InvalidKey);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable_hex() {
        let d = digest_key("secret");
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(d, digest_key("secret"));
        assert_ne!(d, digest_key("other"));
    }

    #[test]
    fn test_generate_key_shape() {
        let key = generate_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_key());
    }
}
