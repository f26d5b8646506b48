//! Error types for the data hub.

use thiserror::Error;

/// Main error type for hub operations.
///
/// A strict read that finds the cache incomplete is not an error; it is
/// reported as `Ok(None)` so callers can fall back to fetching.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid schema configuration: {0}")]
    Configuration(String),

    #[error("Unregistered data type: {0}")]
    UnknownType(String),

    #[error("Entity id not found: {entity_type} has no `{id_field}`")]
    MissingId {
        entity_type: String,
        id_field: String,
    },

    #[error("Invalid entity id for {entity_type}: {value}")]
    InvalidId { entity_type: String, value: String },

    #[error("Schema registry already configured")]
    AlreadyConfigured,

    #[error("Schema registry not configured")]
    NotConfigured,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for HubError {
    fn from(e: serde_json::Error) -> Self {
        HubError::Serialization(e.to_string())
    }
}

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;
