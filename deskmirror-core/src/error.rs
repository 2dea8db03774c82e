//! Error types for deskmirror-core

use thiserror::Error;

/// Main error type for the deskmirror-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error (NLU training data)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Helpdesk (Chatwoot) API error
    #[error("helpdesk API error: {0}")]
    Api(String),

    /// Intent classifier (Rasa) error
    #[error("classifier error: {0}")]
    Classifier(String),

    /// NLU training file could not be used
    #[error("NLU file error: {0}")]
    NluFile(String),

    /// Payload is missing data required to store it
    #[error("invalid {entity} record: {message}")]
    InvalidRecord { entity: String, message: String },
}

/// Result type alias for deskmirror-core
pub type Result<T> = std::result::Result<T, Error>;
