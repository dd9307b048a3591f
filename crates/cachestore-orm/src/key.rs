//! Entity keys.

use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use cachestore_config::IdType;

use crate::error::{OrmError, Result};

/// A cache key, which is also the identifier of the entity it names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityKey {
    Integer(i64),
    Text(String),
}

impl EntityKey {
    /// Read a key from a JSON identifier value.
    ///
    /// Returns `None` for `null` and for values that cannot be identifiers
    /// (floats, booleans, arrays, objects).
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Integer),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// The JSON form written into the entity's identifier attribute.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Integer(n) => Value::from(*n),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }

    /// Parse a raw string as a key of the given identifier type.
    pub fn parse(id_type: IdType, raw: &str) -> Result<Self> {
        match id_type {
            IdType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|_| OrmError::InvalidKey(format!("'{raw}' is not an integer"))),
            IdType::Text => Self::Text(raw.to_string()).coerce(id_type),
            IdType::Uuid => Self::Text(raw.trim().to_string()).coerce(id_type),
        }
    }

    /// Check that this key fits the identifier type, normalizing UUIDs.
    pub fn coerce(self, id_type: IdType) -> Result<Self> {
        match (id_type, self) {
            (IdType::Integer, key @ Self::Integer(_)) => Ok(key),
            (IdType::Text, Self::Text(s)) if !s.is_empty() => Ok(Self::Text(s)),
            (IdType::Uuid, Self::Text(s)) => Uuid::parse_str(&s)
                .map(Self::from)
                .map_err(|_| OrmError::InvalidKey(format!("'{s}' is not a UUID"))),
            (id_type, key) => Err(OrmError::InvalidKey(format!(
                "{} key '{}' does not fit {} identifier",
                key.kind(),
                key,
                id_type
            ))),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Text(s) if s.is_empty() => "empty",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityKey {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Uuid> for EntityKey {
    fn from(id: Uuid) -> Self {
        Self::Text(id.hyphenated().to_string())
    }
}

impl ToSql for EntityKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Integer(n) => Ok(ToSqlOutput::from(*n)),
            Self::Text(s) => Ok(ToSqlOutput::from(s.as_str())),
        }
    }
}

impl FromSql for EntityKey {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(n) => Ok(Self::Integer(n)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|s| Self::Text(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}
