//! Error types for the ORM crate.

use thiserror::Error;

/// Errors that can occur while mapping or persisting entities.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database connection or operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A filesystem operation for the database failed.
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] cachestore_config::ConfigError),

    /// No mapping exists for the entity name.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// The value is not a well-formed entity for its mapping.
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    /// The key cannot identify an entity of the mapping.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// An operation that needs the identifier got an entity without one.
    #[error("Entity {0} has no identifier")]
    MissingIdentifier(String),

    /// A table or attribute name is not a safe SQL identifier.
    #[error("Invalid name: {0}")]
    InvalidName(String),
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
