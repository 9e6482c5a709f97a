//! Shared data models

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Key-value configuration entry stored in the settings table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// A stored document: one UUID-keyed JSON row within a named collection.
///
/// Archive state and timestamps live on the row, not in the body, so every
/// service shares the same storage metadata regardless of body shape.
#[derive(Debug, Clone)]
pub struct Document {
    pub uuid: Uuid,
    pub collection: String,
    pub body: serde_json::Value,
    pub is_archived: bool,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
}

impl Document {
    /// Deserialize the JSON body into a typed model
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(Error::from)
    }

    /// Read a top-level string field from the body, if present
    pub fn body_str(&self, field: &str) -> Option<&str> {
        self.body.get(field).and_then(|v| v.as_str())
    }
}
