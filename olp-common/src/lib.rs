//! # OLPS Common Library
//!
//! Shared code for all OLPS microservices including:
//! - Document store over SQLite (collection/UUID-keyed JSON rows)
//! - Parent/child hierarchy reference-integrity engine
//! - Document versioning with lineage pointers
//! - API error mapping, auth middleware, health routes, pagination
//! - Configuration loading

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod hierarchy;
pub mod models;
pub mod store;
pub mod uuid_utils;
pub mod versioning;

pub use error::{Error, Result};
