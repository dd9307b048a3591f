//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [database]
//! path = "cachestore.db"       # or ":memory:"
//! busy_timeout_ms = 5000
//! journal_mode = "WAL"
//! create_schema = true
//!
//! [[entity]]
//! name = "Person"
//! table = "people"             # defaults to the lowercase entity name
//! id_attribute = "id"
//! id_type = "integer"          # integer | text | uuid
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Path value that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Maps to a full config file: one `[database]` section and any number of
/// `[[entity]]` mappings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrmConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,

    /// Entity mappings, one per persisted entity type.
    #[serde(rename = "entity", skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<EntityConfig>,
}

impl OrmConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: OrmConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        let config: OrmConfig =
            serde_yaml::from_str(yaml_str).map_err(|e| ConfigError::ParseYaml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Replace the database section.
    pub fn with_database(mut self, database: DatabaseConfig) -> Self {
        self.database = database;
        self
    }

    /// Add an entity mapping.
    pub fn with_entity(mut self, entity: EntityConfig) -> Self {
        self.entities.push(entity);
        self
    }

    /// Look up an entity mapping by name.
    pub fn entity(&self, name: &str) -> Option<&EntityConfig> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Check that entity names and tables are non-empty and unique.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut tables = HashSet::new();

        for entity in &self.entities {
            if entity.name.trim().is_empty() {
                return Err(ConfigError::Invalid("entity with empty name".to_string()));
            }
            if entity.id_attribute.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "entity '{}' has an empty id_attribute",
                    entity.name
                )));
            }
            if !names.insert(entity.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "entity '{}' is mapped more than once",
                    entity.name
                )));
            }
            // SQLite table names are case-insensitive.
            if !tables.insert(entity.table_name().to_ascii_lowercase()) {
                return Err(ConfigError::Invalid(format!(
                    "table '{}' is mapped by more than one entity",
                    entity.table_name()
                )));
            }
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Database
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite journal mode applied to every session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
    Truncate,
    Memory,
}

impl JournalMode {
    /// The pragma value for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Memory => "MEMORY",
        }
    }
}

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path, or `:memory:`.
    pub path: String,

    /// How long a session waits on a locked database before failing.
    pub busy_timeout_ms: u64,

    /// Journal mode pragma.
    pub journal_mode: JournalMode,

    /// Create mapped tables on factory build if they don't exist.
    pub create_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "cachestore.db".to_string(),
            busy_timeout_ms: 5000,
            journal_mode: JournalMode::default(),
            create_schema: true,
        }
    }
}

impl DatabaseConfig {
    /// Settings for a shared in-memory database.
    pub fn in_memory() -> Self {
        Self {
            path: IN_MEMORY_PATH.to_string(),
            journal_mode: JournalMode::Memory,
            ..Self::default()
        }
    }

    /// Settings for a database file at `path`.
    pub fn at_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Whether this points at an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY_PATH
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entities
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier type of a mapped entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    #[default]
    Integer,
    Text,
    Uuid,
}

impl IdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Text => "text",
            Self::Uuid => "uuid",
        }
    }
}

impl std::fmt::Display for IdType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_id_attribute() -> String {
    "id".to_string()
}

/// `[[entity]]` mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Entity name used by cache stores to select this mapping.
    pub name: String,

    /// Table name. Defaults to the lowercase entity name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// Name of the identifier attribute inside the entity object.
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,

    /// Identifier type.
    #[serde(default)]
    pub id_type: IdType,
}

impl EntityConfig {
    /// Create a mapping with an integer `id` attribute.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            id_attribute: default_id_attribute(),
            id_type: IdType::default(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = attribute.into();
        self
    }

    pub fn with_id_type(mut self, id_type: IdType) -> Self {
        self.id_type = id_type;
        self
    }

    /// The resolved table name.
    pub fn table_name(&self) -> String {
        self.table
            .clone()
            .unwrap_or_else(|| self.name.to_lowercase())
    }
}
