//! Outbound grade passback
//!
//! When a passback URL is configured, every accepted score is POSTed to it
//! as JSON on a detached task. Delivery is best-effort: failures are logged
//! and never surfaced to the submitting client.

use tracing::{debug, warn};

use crate::models::ResultRecord;
use crate::AppState;

pub fn deliver(state: &AppState, result: &ResultRecord) {
    let Some(url) = state.passback_url.clone() else {
        return;
    };

    let client = state.http.clone();
    let payload = match serde_json::to_value(result) {
        Ok(v) => v,
        Err(e) => {
            warn!("Could not serialize result for passback: {}", e);
            return;
        }
    };

    tokio::spawn(async move {
        match client.post(&url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Passback delivered to {}", url);
            }
            Ok(response) => {
                warn!("Passback to {} returned {}", url, response.status());
            }
            Err(e) => {
                warn!("Passback to {} failed: {}", url, e);
            }
        }
    });
}
