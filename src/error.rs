//! Error types for Paperboy
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Paperboy
#[derive(Debug, Error)]
pub enum PaperboyError {
    /// Topic not found in storage
    #[error("Topic not found: {0}")]
    TopicNotFound(i64),

    /// Configuration problem (missing key, unknown provider)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generated or edited query failed feed validation
    #[error("Query validation failed: {0}")]
    QueryValidation(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// LLM API error
    #[error("LLM error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    /// Paper feed error
    #[error("Feed error: {0}")]
    Feed(#[from] crate::arxiv::FeedError),

    /// Report template rendering error
    #[error("Template error: {0}")]
    Template(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Paperboy operations
pub type Result<T> = std::result::Result<T, PaperboyError>;
