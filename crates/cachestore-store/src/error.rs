//! Error types for cache store operations.

use cachestore_orm::EntityKey;

/// Error type for cache store operations.
///
/// Every failure of a store or erase call is reported after the transaction
/// has been rolled back and the session closed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The entity's identifier is set and differs from the cache key.
    #[error("Identifier '{identifier}' of {entity} does not match key '{key}'")]
    IdentifierMismatch {
        entity: String,
        key: EntityKey,
        identifier: EntityKey,
    },

    /// A batch holds several keys that name the same entry.
    #[error("Batch contains {0} duplicate key(s) after normalization")]
    DuplicateKeys(usize),

    /// The store has no usable configuration.
    #[error("Cache store not initialized: {0}")]
    NotInitialized(String),

    /// Loading the configuration failed.
    #[error("Configuration error: {0}")]
    Config(#[from] cachestore_config::ConfigError),

    /// The ORM or the database failed.
    #[error("Persistence error: {0}")]
    Orm(#[from] cachestore_orm::OrmError),
}

impl StoreError {
    /// Whether this is a validation failure (no database work was attempted
    /// for the offending entry).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::IdentifierMismatch { .. }
                | Self::DuplicateKeys(_)
                | Self::Orm(
                    cachestore_orm::OrmError::InvalidKey(_)
                        | cachestore_orm::OrmError::InvalidEntity(_)
                        | cachestore_orm::OrmError::MissingIdentifier(_)
                )
        )
    }
}

/// Result type for cache store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
