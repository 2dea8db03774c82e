//! Database layer for deskmirror
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Upserts keyed by helpdesk ids, keeping the full payload in `raw_data`
//! - Read paths for intent coverage and health checks

pub mod repo;
pub mod schema;

pub use repo::Database;
