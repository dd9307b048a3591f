//! Entity cache store.
//!
//! Every write call runs as one unit of work:
//!
//! 1. ensure the loader is initialized and open a session
//! 2. begin a transaction
//! 3. apply one ORM operation per entry
//! 4. commit, or roll back on the first failure
//! 5. close the session, whatever happened
//!
//! Batch calls share a single transaction, so they persist all entries or
//! none of them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use cachestore_orm::{EntityKey, Session, SessionFactory, Transaction};

use crate::config::StoreConfig;
use crate::contract::{CacheLoader, CacheStore};
use crate::error::Result;
use crate::loader::EntityCacheLoader;

/// Cache store that persists entries of one mapped entity type.
#[derive(Debug)]
pub struct EntityCacheStore {
    loader: EntityCacheLoader,
}

impl EntityCacheStore {
    /// Store for an entity configured by the default resource.
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self::from_loader(EntityCacheLoader::new(entity_name))
    }

    /// Store configured by a named resource on the config search path.
    pub fn from_resource(entity_name: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::from_loader(EntityCacheLoader::from_resource(entity_name, resource))
    }

    /// Store configured by an explicit config file.
    pub fn from_file(entity_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::from_loader(EntityCacheLoader::from_file(entity_name, path))
    }

    /// Store using an externally built session factory.
    pub fn with_factory(entity_name: impl Into<String>, factory: Arc<SessionFactory>) -> Self {
        Self::from_loader(EntityCacheLoader::with_factory(entity_name, factory))
    }

    pub fn from_config(config: StoreConfig) -> Self {
        Self::from_loader(EntityCacheLoader::from_config(config))
    }

    pub fn from_loader(loader: EntityCacheLoader) -> Self {
        Self { loader }
    }

    /// The loader this store persists through.
    pub fn loader(&self) -> &EntityCacheLoader {
        &self.loader
    }

    /// Run `work` in a fresh session and transaction.
    fn in_transaction<F>(&self, operation: &'static str, work: F) -> Result<()>
    where
        F: FnOnce(&Transaction<'_>, &str) -> Result<()>,
    {
        let entity = self.loader.entity_name()?;
        let session = self.loader.open_session()?;

        let result = Self::unit_of_work(&session, entity, operation, work);

        self.loader.close_session(session);
        result
    }

    fn unit_of_work<F>(session: &Session, entity: &str, operation: &str, work: F) -> Result<()>
    where
        F: FnOnce(&Transaction<'_>, &str) -> Result<()>,
    {
        let tx = session.begin_transaction()?;

        match work(&tx, entity) {
            Ok(()) => {
                tx.commit()?;
                debug!(entity, operation, "committed");
                Ok(())
            }
            Err(e) => {
                warn!(entity, operation, error = %e, "rolling back");
                if let Err(rollback_err) = tx.rollback() {
                    warn!(entity, operation, error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    fn merge_entry(
        &self,
        tx: &Transaction<'_>,
        entity: &str,
        key: &EntityKey,
        value: &Value,
    ) -> Result<()> {
        let mut value = value.clone();
        self.loader.validate_identifier(key, &mut value, tx.session())?;
        tx.merge(entity, &value)?;
        Ok(())
    }

    fn delete_entry(&self, tx: &Transaction<'_>, entity: &str, key: &EntityKey) -> Result<()> {
        // Deletes need an entity, not a bare key.
        if let Some(reference) = self.loader.create_entity_from_id(key, tx.session())? {
            tx.delete(entity, &reference)?;
        }
        Ok(())
    }
}

impl CacheLoader for EntityCacheStore {
    type Key = EntityKey;
    type Value = Value;

    fn normalize_key(&self, key: &EntityKey) -> Result<EntityKey> {
        self.loader.normalize_key(key)
    }

    fn load(&self, key: &EntityKey) -> Result<Option<Value>> {
        self.loader.load(key)
    }

    fn load_all(&self, keys: &[EntityKey]) -> Result<HashMap<EntityKey, Value>> {
        self.loader.load_all(keys)
    }
}

impl CacheStore for EntityCacheStore {
    /// Insert or update one entity.
    ///
    /// The entity's identifier must equal `key` or be absent, in which case it
    /// is set to `key` before persisting.
    fn store(&self, key: &EntityKey, value: &Value) -> Result<()> {
        self.in_transaction("store", |tx, entity| self.merge_entry(tx, entity, key, value))
    }

    fn store_all(&self, entries: &HashMap<EntityKey, Value>) -> Result<()> {
        self.in_transaction("store_all", |tx, entity| {
            for (key, value) in entries {
                self.merge_entry(tx, entity, key, value)?;
            }
            Ok(())
        })
    }

    /// Delete one entity. Absent keys are ignored.
    fn erase(&self, key: &EntityKey) -> Result<()> {
        self.in_transaction("erase", |tx, entity| self.delete_entry(tx, entity, key))
    }

    fn erase_all(&self, keys: &[EntityKey]) -> Result<()> {
        self.in_transaction("erase_all", |tx, entity| {
            for key in keys {
                self.delete_entry(tx, entity, key)?;
            }
            Ok(())
        })
    }
}
