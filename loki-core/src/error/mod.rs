//! Core error types for Loki

use thiserror::Error;

/// Main error type for Loki operations
#[derive(Error, Debug)]
pub enum LokiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database is not writeable: {0}")]
    ReadOnly(String),

    #[error("Database is finalized and cannot be updated")]
    Finalized,

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Merge cycle detected starting at rs{id}")]
    MergeCycle { id: i64 },

    #[error("Merge chain starting at rs{id} exceeds {limit} hops")]
    MergeHopLimit { id: i64, limit: usize },

    #[error("Invalid option for source '{source_name}': {option}: {reason}")]
    InvalidOption {
        source_name: String,
        option: String,
        reason: String,
    },

    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias for Loki operations
pub type LokiResult<T> = Result<T, LokiError>;

impl LokiError {
    /// Errors that must abort an entire update run rather than a single source
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LokiError::ReadOnly(_)
                | LokiError::Finalized
                | LokiError::SchemaMismatch(_)
                | LokiError::MergeCycle { .. }
                | LokiError::MergeHopLimit { .. }
        )
    }
}

impl From<serde_json::Error> for LokiError {
    fn from(err: serde_json::Error) -> Self {
        LokiError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LokiError {
    fn from(err: toml::de::Error) -> Self {
        LokiError::Configuration(format!("Failed to parse config: {}", err))
    }
}

impl From<toml::ser::Error> for LokiError {
    fn from(err: toml::ser::Error) -> Self {
        LokiError::Configuration(format!("Failed to serialize config: {}", err))
    }
}

impl From<anyhow::Error> for LokiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<LokiError>() {
            Ok(inner) => inner,
            Err(other) => LokiError::Other(other.to_string()),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for LokiError {
    fn from(err: rusqlite::Error) -> Self {
        LokiError::Database(err.to_string())
    }
}
