//! Construction-time configuration for entity cache stores.

use std::path::PathBuf;
use std::sync::Arc;

use cachestore_config::{DEFAULT_RESOURCE, OrmConfig};
use cachestore_orm::SessionFactory;

/// Where a store gets its session factory from.
#[derive(Debug, Clone, Default)]
pub enum SessionSource {
    /// Load [`DEFAULT_RESOURCE`] from the config search path.
    #[default]
    DefaultResource,
    /// Load a named resource from the config search path.
    Resource(String),
    /// Load an explicit config file.
    File(PathBuf),
    /// Build from an in-process config.
    Config(OrmConfig),
    /// Use an externally built factory, possibly shared with other stores.
    Factory(Arc<SessionFactory>),
}

impl SessionSource {
    /// Short description for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            Self::DefaultResource => format!("resource {DEFAULT_RESOURCE}"),
            Self::Resource(name) => format!("resource {name}"),
            Self::File(path) => format!("file {}", path.display()),
            Self::Config(_) => "inline config".to_string(),
            Self::Factory(_) => "external factory".to_string(),
        }
    }
}

/// Configuration for an entity cache store.
///
/// The default has no entity name and must be completed with
/// [`with_entity_name`](Self::with_entity_name) before the store is used.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Name of the mapped entity the store persists.
    pub entity_name: Option<String>,

    /// Session factory source.
    pub source: SessionSource,
}

impl StoreConfig {
    /// Config for an entity, using the default resource.
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: Some(entity_name.into()),
            source: SessionSource::default(),
        }
    }

    pub fn with_entity_name(mut self, entity_name: impl Into<String>) -> Self {
        self.entity_name = Some(entity_name.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.source = SessionSource::Resource(resource.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = SessionSource::File(path.into());
        self
    }

    pub fn with_orm_config(mut self, config: OrmConfig) -> Self {
        self.source = SessionSource::Config(config);
        self
    }

    pub fn with_factory(mut self, factory: Arc<SessionFactory>) -> Self {
        self.source = SessionSource::Factory(factory);
        self
    }
}
