//! Configuration system for cachestore.
//!
//! Provides TOML (or YAML) based configuration with:
//! - Database settings (`[database]`: file path, busy timeout, journal mode)
//! - Entity mappings (`[[entity]]`: name, table, identifier attribute and type)
//! - Resource discovery along a search path (`CACHESTORE_CONFIG_DIR`,
//!   platform config dir, current directory)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    DEFAULT_RESOURCE, LoadedConfig, config_dir, find_resource, load_config_file, load_resource,
    save_config, search_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
