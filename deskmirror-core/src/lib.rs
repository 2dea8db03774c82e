//! # deskmirror-core
//!
//! Core library for deskmirror - a Chatwoot helpdesk mirror with intent
//! coverage analysis.
//!
//! This library provides:
//! - Domain types for accounts, inboxes, conversations and messages
//! - Database storage layer with SQLite
//! - Chatwoot REST client and mirror pipelines
//! - Intent coverage analysis against a Rasa training set
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use deskmirror_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use sync::{SyncCoordinator, SyncResult};
pub use types::*;

// Public modules
pub mod chatwoot;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod intents;
pub mod logging;
pub mod sync;
pub mod types;
