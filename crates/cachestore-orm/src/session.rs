//! Sessions and transactions.
//!
//! A [`Session`] owns one connection and is meant to live for a single unit
//! of work. Reads go through the session directly; writes go through a
//! [`Transaction`] begun on it. Reads made on the session while a transaction
//! is open see that transaction's uncommitted writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::{Connection, TransactionBehavior};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::Result;
use crate::key::EntityKey;
use crate::mapping::{EntityMapping, Mappings};
use crate::persister;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Short-lived handle to the database.
pub struct Session {
    id: u64,
    conn: Connection,
    mappings: Arc<Mappings>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("in_transaction", &!self.conn.is_autocommit())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(conn: Connection, mappings: Arc<Mappings>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            conn,
            mappings,
        }
    }

    /// Process-unique session number, for log correlation.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Look up the mapping for an entity name.
    pub fn mapping(&self, entity: &str) -> Result<&EntityMapping> {
        self.mappings.get(entity)
    }

    /// Load an entity by key.
    pub fn get(&self, entity: &str, key: &EntityKey) -> Result<Option<Value>> {
        let mapping = self.mapping(entity)?;
        let key = mapping.key(key)?;
        let found = persister::find(&self.conn, mapping, &key)?;
        trace!(session = self.id, entity, %key, found = found.is_some(), "get");
        Ok(found)
    }

    /// Whether a row exists for the key.
    pub fn contains(&self, entity: &str, key: &EntityKey) -> Result<bool> {
        let mapping = self.mapping(entity)?;
        let key = mapping.key(key)?;
        persister::exists(&self.conn, mapping, &key)
    }

    /// Number of stored entities of a type.
    pub fn count(&self, entity: &str) -> Result<usize> {
        persister::count(&self.conn, self.mapping(entity)?)
    }

    /// Read an entity's identifier according to its mapping.
    pub fn identifier(&self, entity: &str, value: &Value) -> Result<Option<EntityKey>> {
        self.mapping(entity)?.identifier(value)
    }

    /// Write `key` into an entity's identifier attribute.
    pub fn set_identifier(&self, entity: &str, value: &mut Value, key: &EntityKey) -> Result<()> {
        self.mapping(entity)?.set_identifier(value, key)
    }

    /// Create a reference entity that carries only the identifier.
    pub fn instantiate(&self, entity: &str, key: &EntityKey) -> Result<Value> {
        self.mapping(entity)?.instantiate(key)
    }

    /// Begin a transaction on this session's connection.
    ///
    /// The write lock is taken up front, so concurrent sessions wait on the
    /// busy timeout instead of failing on lock upgrade. Dropping the
    /// transaction without committing rolls it back.
    pub fn begin_transaction(&self) -> Result<Transaction<'_>> {
        let tx = rusqlite::Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        debug!(session = self.id, "Transaction begun");
        Ok(Transaction { tx, session: self })
    }

    /// Close the session and its connection.
    pub fn close(self) -> Result<()> {
        let id = self.id;
        self.conn.close().map_err(|(_, e)| e)?;
        debug!(session = id, "Closed session");
        Ok(())
    }
}

/// A database transaction scoped to a session.
pub struct Transaction<'s> {
    tx: rusqlite::Transaction<'s>,
    session: &'s Session,
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("session", &self.session.id)
            .finish_non_exhaustive()
    }
}

impl<'s> Transaction<'s> {
    /// The session this transaction belongs to.
    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// Load an entity by key, seeing this transaction's writes.
    pub fn get(&self, entity: &str, key: &EntityKey) -> Result<Option<Value>> {
        self.session.get(entity, key)
    }

    /// Insert or update an entity, keyed by its identifier.
    ///
    /// Returns the persisted state.
    pub fn merge(&self, entity: &str, value: &Value) -> Result<Value> {
        let mapping = self.session.mapping(entity)?;
        let key = mapping.require_identifier(value)?;
        persister::upsert(self.conn(), mapping, &key, value)?;
        trace!(session = self.session.id, entity, %key, "merge");
        Ok(value.clone())
    }

    /// Delete an entity, identified by its identifier attribute.
    ///
    /// Returns `true` if a row was removed.
    pub fn delete(&self, entity: &str, value: &Value) -> Result<bool> {
        let mapping = self.session.mapping(entity)?;
        let key = mapping.require_identifier(value)?;
        let removed = persister::remove(self.conn(), mapping, &key)?;
        trace!(session = self.session.id, entity, %key, removed, "delete");
        Ok(removed)
    }

    /// Commit the transaction.
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        debug!(session = self.session.id, "Transaction committed");
        Ok(())
    }

    /// Roll the transaction back.
    pub fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        debug!(session = self.session.id, "Transaction rolled back");
        Ok(())
    }

    fn conn(&self) -> &Connection {
        &self.tx
    }
}
