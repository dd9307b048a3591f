//! Entity mappings and identifier metadata.
//!
//! A mapping ties an entity name to its table and says where the identifier
//! lives inside the entity object. All identifier reads and writes go through
//! the mapping so that keys are always checked against the declared
//! [`IdType`].

use std::collections::HashMap;

use serde_json::{Map, Value};

use cachestore_config::{EntityConfig, IdType};

use crate::error::{OrmError, Result};
use crate::key::EntityKey;

/// Maximum length for table names.
const MAX_TABLE_NAME_LENGTH: usize = 255;

/// Mapping of one entity type to its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMapping {
    /// Entity name used to select this mapping.
    pub name: String,
    /// Validated table name.
    pub table: String,
    /// Identifier attribute inside the entity object.
    pub id_attribute: String,
    /// Identifier type.
    pub id_type: IdType,
}

impl EntityMapping {
    /// Build a mapping from its config section.
    pub fn from_config(config: &EntityConfig) -> Result<Self> {
        let table = config.table_name();
        validate_table_name(&table)?;

        Ok(Self {
            name: config.name.clone(),
            table,
            id_attribute: config.id_attribute.clone(),
            id_type: config.id_type,
        })
    }

    /// Read the identifier of an entity.
    ///
    /// Returns `Ok(None)` when the attribute is absent or `null`.
    pub fn identifier(&self, entity: &Value) -> Result<Option<EntityKey>> {
        let object = self.as_object(entity)?;

        match object.get(&self.id_attribute) {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => {
                let key = EntityKey::from_json(raw).ok_or_else(|| {
                    OrmError::InvalidEntity(format!(
                        "{}.{} is not a valid identifier: {}",
                        self.name, self.id_attribute, raw
                    ))
                })?;
                key.coerce(self.id_type).map(Some).map_err(|e| {
                    OrmError::InvalidEntity(format!("{}.{}: {}", self.name, self.id_attribute, e))
                })
            }
        }
    }

    /// Read the identifier, failing if it is absent.
    pub fn require_identifier(&self, entity: &Value) -> Result<EntityKey> {
        self.identifier(entity)?
            .ok_or_else(|| OrmError::MissingIdentifier(self.name.clone()))
    }

    /// Write `key` into the entity's identifier attribute.
    pub fn set_identifier(&self, entity: &mut Value, key: &EntityKey) -> Result<()> {
        let key = self.key(key)?;
        match entity {
            Value::Object(object) => {
                object.insert(self.id_attribute.clone(), key.to_json());
                Ok(())
            }
            other => Err(self.not_an_object(other)),
        }
    }

    /// Create a reference entity that carries only the identifier.
    pub fn instantiate(&self, key: &EntityKey) -> Result<Value> {
        let key = self.key(key)?;
        let mut object = Map::new();
        object.insert(self.id_attribute.clone(), key.to_json());
        Ok(Value::Object(object))
    }

    /// Check a key against this mapping's identifier type.
    pub fn key(&self, key: &EntityKey) -> Result<EntityKey> {
        key.clone().coerce(self.id_type)
    }

    fn as_object<'v>(&self, entity: &'v Value) -> Result<&'v Map<String, Value>> {
        entity.as_object().ok_or_else(|| self.not_an_object(entity))
    }

    fn not_an_object(&self, entity: &Value) -> OrmError {
        let kind = match entity {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::String(_) => "a string",
            Value::Array(_) => "an array",
            Value::Object(_) => "an object",
        };
        OrmError::InvalidEntity(format!("{} must be a JSON object, got {}", self.name, kind))
    }
}

/// Registry of mappings, keyed by entity name.
#[derive(Debug, Clone, Default)]
pub struct Mappings {
    by_name: HashMap<String, EntityMapping>,
}

impl Mappings {
    /// Build the registry from entity config sections.
    pub fn from_configs(configs: &[EntityConfig]) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(configs.len());
        for config in configs {
            let mapping = EntityMapping::from_config(config)?;
            by_name.insert(mapping.name.clone(), mapping);
        }
        Ok(Self { by_name })
    }

    /// Look up a mapping by entity name.
    pub fn get(&self, entity: &str) -> Result<&EntityMapping> {
        self.by_name
            .get(entity)
            .ok_or_else(|| OrmError::UnknownEntity(entity.to_string()))
    }

    /// Whether an entity name is mapped.
    pub fn contains(&self, entity: &str) -> bool {
        self.by_name.contains_key(entity)
    }

    /// Mapped entity names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityMapping> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Validate that a table name is a plain SQL identifier.
///
/// Letters, digits and underscores only, starting with a letter or underscore.
/// SQLite's internal `sqlite_` prefix is reserved.
pub fn validate_table_name(name: &str) -> Result<()> {
    let Some(first) = name.chars().next() else {
        return Err(OrmError::InvalidName("empty table name".to_string()));
    };

    if name.len() > MAX_TABLE_NAME_LENGTH {
        return Err(OrmError::InvalidName(format!(
            "table name is {} characters, max {}",
            name.len(),
            MAX_TABLE_NAME_LENGTH
        )));
    }

    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(OrmError::InvalidName(format!(
            "table name '{name}' must start with a letter or underscore"
        )));
    }

    if let Some(c) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(OrmError::InvalidName(format!(
            "table name '{name}' contains '{c}'"
        )));
    }

    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(OrmError::InvalidName(format!(
            "table name '{name}' uses the reserved sqlite_ prefix"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person() -> EntityMapping {
        EntityMapping::from_config(&EntityConfig::new("Person").with_table("people")).unwrap()
    }

    #[test]
    fn test_identifier_present_absent_null() {
        let mapping = person();
        assert_eq!(
            mapping.identifier(&json!({"id": 5, "name": "Ann"})).unwrap(),
            Some(EntityKey::Integer(5))
        );
        assert_eq!(mapping.identifier(&json!({"name": "Ann"})).unwrap(), None);
        assert_eq!(mapping.identifier(&json!({"id": null})).unwrap(), None);
    }

    #[test]
    fn test_identifier_wrong_type_is_invalid_entity() {
        let mapping = person();
        assert!(matches!(
            mapping.identifier(&json!({"id": "5"})),
            Err(OrmError::InvalidEntity(_))
        ));
        assert!(matches!(
            mapping.identifier(&json!({"id": [1]})),
            Err(OrmError::InvalidEntity(_))
        ));
    }

    #[test]
    fn test_non_object_entity_rejected() {
        let mapping = person();
        let err = mapping.identifier(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_set_identifier_and_instantiate() {
        let mapping = person();
        let mut entity = json!({"name": "Ann"});
        mapping.set_identifier(&mut entity, &EntityKey::Integer(9)).unwrap();
        assert_eq!(entity, json!({"id": 9, "name": "Ann"}));

        assert_eq!(
            mapping.instantiate(&EntityKey::Integer(9)).unwrap(),
            json!({"id": 9})
        );
        assert!(mapping.instantiate(&EntityKey::from("x")).is_err());
    }

    #[test]
    fn test_custom_id_attribute() {
        let mapping = EntityMapping::from_config(
            &EntityConfig::new("Tag")
                .with_id_attribute("slug")
                .with_id_type(IdType::Text),
        )
        .unwrap();
        assert_eq!(mapping.table, "tag");
        assert_eq!(
            mapping.require_identifier(&json!({"slug": "rust"})).unwrap(),
            EntityKey::from("rust")
        );
        assert!(matches!(
            mapping.require_identifier(&json!({"id": "rust"})),
            Err(OrmError::MissingIdentifier(_))
        ));
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("people").is_ok());
        assert!(validate_table_name("_people_2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2people").is_err());
        assert!(validate_table_name("people; DROP TABLE x").is_err());
        assert!(validate_table_name("sqlite_master").is_err());
        assert!(validate_table_name(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let mappings = Mappings::from_configs(&[
            EntityConfig::new("Person"),
            EntityConfig::new("Account"),
        ])
        .unwrap();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings.names(), vec!["Account", "Person"]);
        assert!(mappings.get("Person").is_ok());
        assert!(matches!(
            mappings.get("Missing"),
            Err(OrmError::UnknownEntity(_))
        ));
    }
}
