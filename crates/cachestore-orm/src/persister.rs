//! Row-level persistence for mapped entities.
//!
//! Each mapped entity lives in its own table, one row per entity:
//!
//! ```sql
//! CREATE TABLE "<table>" (
//!     id <INTEGER|TEXT> PRIMARY KEY,
//!     data TEXT NOT NULL,        -- full entity JSON, identifier included
//!     created_at TEXT NOT NULL,
//!     updated_at TEXT NOT NULL
//! );
//! ```
//!
//! These functions take a plain `&Connection` so they run the same way on a
//! session connection or inside a transaction.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::debug;

use cachestore_config::IdType;

use crate::error::Result;
use crate::key::EntityKey;
use crate::mapping::EntityMapping;

/// Create the table for a mapping if it doesn't exist.
pub(crate) fn create_table(conn: &Connection, mapping: &EntityMapping) -> Result<()> {
    let id_column = match mapping.id_type {
        IdType::Integer => "INTEGER",
        IdType::Text | IdType::Uuid => "TEXT",
    };

    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table}" (
            id {id_column} PRIMARY KEY,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
        table = mapping.table,
    ))?;

    debug!("Ensured table {} for entity {}", mapping.table, mapping.name);
    Ok(())
}

/// Load an entity by key.
pub(crate) fn find(
    conn: &Connection,
    mapping: &EntityMapping,
    key: &EntityKey,
) -> Result<Option<Value>> {
    let mut stmt = conn.prepare_cached(&format!(
        r#"SELECT data FROM "{}" WHERE id = ?1"#,
        mapping.table
    ))?;

    let data: Option<String> = stmt.query_row(params![key], |row| row.get(0)).optional()?;

    match data {
        Some(data) => Ok(Some(serde_json::from_str(&data)?)),
        None => Ok(None),
    }
}

/// Whether a row exists for the key.
pub(crate) fn exists(conn: &Connection, mapping: &EntityMapping, key: &EntityKey) -> Result<bool> {
    let mut stmt = conn.prepare_cached(&format!(
        r#"SELECT 1 FROM "{}" WHERE id = ?1"#,
        mapping.table
    ))?;
    Ok(stmt.exists(params![key])?)
}

/// Insert or update the row for `key`.
///
/// `created_at` is preserved on update.
pub(crate) fn upsert(
    conn: &Connection,
    mapping: &EntityMapping,
    key: &EntityKey,
    entity: &Value,
) -> Result<()> {
    let data = serde_json::to_string(entity)?;
    let now = Utc::now().to_rfc3339();

    conn.execute(
        &format!(
            r#"
            INSERT INTO "{}" (id, data, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT(id) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
            mapping.table
        ),
        params![key, data, now],
    )?;

    Ok(())
}

/// Delete the row for `key`. Returns `true` if a row was removed.
pub(crate) fn remove(conn: &Connection, mapping: &EntityMapping, key: &EntityKey) -> Result<bool> {
    let rows_affected = conn.execute(
        &format!(r#"DELETE FROM "{}" WHERE id = ?1"#, mapping.table),
        params![key],
    )?;
    Ok(rows_affected > 0)
}

/// Number of rows stored for a mapping.
pub(crate) fn count(conn: &Connection, mapping: &EntityMapping) -> Result<usize> {
    let count: i64 = conn.query_row(
        &format!(r#"SELECT COUNT(*) FROM "{}""#, mapping.table),
        [],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}
