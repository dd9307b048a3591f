//! Config resource discovery.
//!
//! A resource name (e.g. `cachestore.toml`) is resolved against the search
//! path, first match wins:
//! 1. `$CACHESTORE_CONFIG_DIR`
//! 2. The platform config dir (`~/.config/cachestore` on Linux)
//! 3. The current working directory
//!
//! Absolute paths and paths that exist relative to the working directory are
//! used as-is.

use std::path::{Path, PathBuf};

use crate::{ConfigError, OrmConfig, Result};

/// Resource loaded when a store is configured by entity name only.
pub const DEFAULT_RESOURCE: &str = "cachestore.toml";

/// Application name for platform directory resolution.
const APP_NAME: &str = "cachestore";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "CACHESTORE_CONFIG_DIR";

/// A config together with the file it was read from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The parsed configuration.
    pub config: OrmConfig,
    /// Path of the file the config was loaded from.
    pub source: PathBuf,
}

/// Get the config directory for cachestore.
///
/// Checks `CACHESTORE_CONFIG_DIR` first, then falls back to the platform default.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Directories searched for named resources, in order of precedence.
pub fn search_path() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = config_dir() {
        dirs.push(dir);
    }
    dirs.push(PathBuf::from("."));
    dirs
}

/// Resolve a resource name to an existing file.
pub fn find_resource(name: &str) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.is_absolute() {
        return direct.is_file().then(|| direct.to_path_buf());
    }

    search_path()
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Load a named resource from the search path.
pub fn load_resource(name: &str) -> Result<LoadedConfig> {
    let Some(path) = find_resource(name) else {
        let searched = search_path()
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ConfigError::ResourceNotFound {
            name: name.to_string(),
            searched,
        });
    };

    let config = load_config_file(&path)?;
    Ok(LoadedConfig {
        config,
        source: path,
    })
}

/// Load config from a specific file path (no discovery).
///
/// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else as TOML.
pub fn load_config_file(path: &Path) -> Result<OrmConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => OrmConfig::from_yaml(&contents),
        _ => OrmConfig::from_toml(&contents),
    }
}

/// Save configuration to a file as TOML.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &OrmConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}
