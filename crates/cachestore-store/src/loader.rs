//! Entity cache loader.
//!
//! Owns the session factory lifecycle for one mapped entity and provides the
//! helpers the store builds on: session open/close, identifier validation,
//! and reconstruction of an entity reference from a key.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use cachestore_config::{DEFAULT_RESOURCE, load_config_file, load_resource};
use cachestore_orm::{EntityKey, EntityMapping, Session, SessionFactory};

use crate::config::{SessionSource, StoreConfig};
use crate::contract::CacheLoader;
use crate::error::{Result, StoreError};

/// Loads entities of one mapped type through ORM sessions.
///
/// The session factory is built lazily on first use and then reused for the
/// lifetime of the loader.
pub struct EntityCacheLoader {
    config: StoreConfig,
    factory: Mutex<Option<Arc<SessionFactory>>>,
}

impl std::fmt::Debug for EntityCacheLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCacheLoader")
            .field("entity_name", &self.config.entity_name)
            .field("source", &self.config.source.describe())
            .field("initialized", &self.factory.lock().is_some())
            .finish()
    }
}

impl EntityCacheLoader {
    /// Loader for an entity configured by the default resource.
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self::from_config(StoreConfig::new(entity_name))
    }

    /// Loader configured by a named resource on the config search path.
    pub fn from_resource(entity_name: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::from_config(StoreConfig::new(entity_name).with_resource(resource))
    }

    /// Loader configured by an explicit config file.
    pub fn from_file(entity_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::from_config(StoreConfig::new(entity_name).with_file(path))
    }

    /// Loader using an externally built session factory.
    pub fn with_factory(entity_name: impl Into<String>, factory: Arc<SessionFactory>) -> Self {
        Self::from_config(StoreConfig::new(entity_name).with_factory(factory))
    }

    pub fn from_config(config: StoreConfig) -> Self {
        Self {
            config,
            factory: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The configured entity name.
    pub fn entity_name(&self) -> Result<&str> {
        self.config
            .entity_name
            .as_deref()
            .ok_or_else(|| StoreError::NotInitialized("no entity name configured".to_string()))
    }

    /// The session factory, if it has been built.
    pub fn session_factory(&self) -> Option<Arc<SessionFactory>> {
        self.factory.lock().clone()
    }

    /// Build the session factory if needed and check the entity is mapped.
    pub fn ensure_initialized(&self) -> Result<Arc<SessionFactory>> {
        let entity = self.entity_name()?;

        let factory = {
            let mut slot = self.factory.lock();
            match slot.as_ref() {
                Some(factory) => Arc::clone(factory),
                None => {
                    let factory = self.build_factory()?;
                    *slot = Some(Arc::clone(&factory));
                    factory
                }
            }
        };

        if !factory.mappings().contains(entity) {
            return Err(StoreError::NotInitialized(format!(
                "entity '{}' is not mapped by {}",
                entity,
                self.config.source.describe()
            )));
        }

        Ok(factory)
    }

    /// Mapping of the configured entity.
    pub fn mapping(&self) -> Result<EntityMapping> {
        let factory = self.ensure_initialized()?;
        Ok(factory.mapping(self.entity_name()?)?.clone())
    }

    /// Open a session, initializing first if needed.
    pub fn open_session(&self) -> Result<Session> {
        let factory = self.ensure_initialized()?;
        Ok(factory.open_session()?)
    }

    /// Close a session.
    ///
    /// A failure to close is logged and not returned, so it never hides the
    /// outcome of the operation that used the session.
    pub fn close_session(&self, session: Session) {
        let id = session.id();
        if let Err(e) = session.close() {
            warn!(session = id, error = %e, "Failed to close session");
        }
    }

    /// Check `key` against the entity's identifier.
    ///
    /// An absent or null identifier is set to the key. A present identifier
    /// must equal the key.
    pub fn validate_identifier(
        &self,
        key: &EntityKey,
        value: &mut Value,
        session: &Session,
    ) -> Result<()> {
        let entity = self.entity_name()?;
        let mapping = session.mapping(entity)?;
        let key = mapping.key(key)?;

        if let Some(identifier) = mapping.identifier(value)?
            && identifier != key
        {
            return Err(StoreError::IdentifierMismatch {
                entity: entity.to_string(),
                key,
                identifier,
            });
        }

        mapping.set_identifier(value, &key)?;
        Ok(())
    }

    /// Reconstruct an entity reference from a key.
    ///
    /// Returns `None` if no entity is stored under the key.
    pub fn create_entity_from_id(&self, key: &EntityKey, session: &Session) -> Result<Option<Value>> {
        let entity = self.entity_name()?;
        if !session.contains(entity, key)? {
            return Ok(None);
        }
        Ok(Some(session.instantiate(entity, key)?))
    }

    fn build_factory(&self) -> Result<Arc<SessionFactory>> {
        let config = match &self.config.source {
            SessionSource::Factory(factory) => return Ok(Arc::clone(factory)),
            SessionSource::DefaultResource => load_resource(DEFAULT_RESOURCE)?.config,
            SessionSource::Resource(name) => load_resource(name)?.config,
            SessionSource::File(path) => load_config_file(path)?,
            SessionSource::Config(config) => config.clone(),
        };

        let factory = SessionFactory::build(&config)?;
        info!(
            entity = self.config.entity_name.as_deref().unwrap_or_default(),
            source = %self.config.source.describe(),
            "Cache loader initialized"
        );
        Ok(Arc::new(factory))
    }
}

impl CacheLoader for EntityCacheLoader {
    type Key = EntityKey;
    type Value = Value;

    /// Check the key against the mapping's identifier type. UUID keys come
    /// back in lowercase hyphenated form.
    fn normalize_key(&self, key: &EntityKey) -> Result<EntityKey> {
        Ok(self.mapping()?.key(key)?)
    }

    fn load(&self, key: &EntityKey) -> Result<Option<Value>> {
        let session = self.open_session()?;
        let result = session
            .get(self.entity_name()?, key)
            .map_err(StoreError::from);
        self.close_session(session);

        debug!(%key, found = matches!(result, Ok(Some(_))), "load");
        result
    }

    fn load_all(&self, keys: &[EntityKey]) -> Result<HashMap<EntityKey, Value>> {
        let session = self.open_session()?;
        let entity = self.entity_name()?;

        let result = keys.iter().try_fold(
            HashMap::with_capacity(keys.len()),
            |mut found, key| -> Result<_> {
                if let Some(value) = session.get(entity, key)? {
                    found.insert(key.clone(), value);
                }
                Ok(found)
            },
        );
        self.close_session(session);

        debug!(requested = keys.len(), "load_all");
        result
    }
}
