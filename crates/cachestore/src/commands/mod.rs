//! CLI command handlers.

pub mod entries;
pub mod init;

use anyhow::{Context as _, Result};
use serde::Serialize;

use cachestore_orm::EntityKey;
use cachestore_store::{EntityCacheStore, StoreConfig};

use crate::Cli;

/// Shared context for all commands.
#[derive(Debug)]
pub struct Context {
    /// Store for the selected entity. The session factory is built on first use.
    pub store: EntityCacheStore,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let entity = cli
            .entity
            .clone()
            .context("no entity selected (use --entity or CACHESTORE_ENTITY)")?;

        let mut config = StoreConfig::new(entity);
        if let Some(path) = &cli.config {
            config = config.with_file(path);
        } else if let Some(resource) = &cli.resource {
            config = config.with_resource(resource);
        }

        Ok(Self {
            store: EntityCacheStore::from_config(config),
            verbose: cli.verbose,
        })
    }

    /// Parse a command-line key according to the entity's identifier type.
    pub fn parse_key(&self, raw: &str) -> Result<EntityKey> {
        let mapping = self.store.loader().mapping()?;
        Ok(EntityKey::parse(mapping.id_type, raw)?)
    }

    pub fn parse_keys(&self, raw: &[String]) -> Result<Vec<EntityKey>> {
        let mapping = self.store.loader().mapping()?;
        raw.iter()
            .map(|k| EntityKey::parse(mapping.id_type, k).map_err(Into::into))
            .collect()
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
