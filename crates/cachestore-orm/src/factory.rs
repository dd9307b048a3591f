//! Session factory.
//!
//! Built once from an [`OrmConfig`]; hands out short-lived [`Session`]s, each
//! with its own SQLite connection.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};
use uuid::Uuid;

use cachestore_config::{DatabaseConfig, OrmConfig};

use crate::error::{OrmError, Result};
use crate::mapping::{EntityMapping, Mappings};
use crate::persister;
use crate::session::Session;

/// Creates sessions against one database with one set of mappings.
///
/// In-memory databases live in the `memdb` VFS under a unique name, which
/// gives every session its own connection with normal file locking, so
/// writers wait on the busy timeout. The factory holds an anchor connection
/// so the data outlives individual sessions.
pub struct SessionFactory {
    database: DatabaseConfig,
    location: String,
    flags: OpenFlags,
    mappings: Arc<Mappings>,
    anchor: Option<Mutex<Connection>>,
}

impl std::fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("location", &self.location)
            .field("entities", &self.mappings.names())
            .field("in_memory", &self.anchor.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionFactory {
    /// Build a factory from configuration.
    ///
    /// Creates the mapped tables when `database.create_schema` is set.
    pub fn build(config: &OrmConfig) -> Result<Self> {
        config.validate()?;
        let mappings = Mappings::from_configs(&config.entities)?;
        let database = config.database.clone();

        let base_flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let (location, flags, anchor) = if database.is_in_memory() {
            let location = format!("file:/cachestore-{}?vfs=memdb", Uuid::new_v4());
            let flags = base_flags | OpenFlags::SQLITE_OPEN_URI;
            let anchor = Connection::open_with_flags(&location, flags)?;
            // memdb only holds the main file; journals must stay in memory too.
            anchor.pragma_update(None, "journal_mode", "MEMORY")?;
            (location, flags, Some(Mutex::new(anchor)))
        } else {
            let path = Path::new(&database.path);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                std::fs::create_dir_all(parent).map_err(|e| OrmError::Io {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
            (database.path.clone(), base_flags, None)
        };

        let factory = Self {
            database,
            location,
            flags,
            mappings: Arc::new(mappings),
            anchor,
        };

        if factory.database.create_schema {
            factory.create_schema()?;
        }

        info!(
            "Session factory built for {} ({} entities)",
            factory.database.path,
            factory.mappings.len()
        );
        Ok(factory)
    }

    /// Open a new session with its own connection.
    pub fn open_session(&self) -> Result<Session> {
        let conn = self.connect()?;
        if self.anchor.is_none() {
            conn.pragma_update(None, "synchronous", "NORMAL")?;
        }

        let session = Session::new(conn, Arc::clone(&self.mappings));
        debug!("Opened session {}", session.id());
        Ok(session)
    }

    /// Create tables for every mapping, in one transaction.
    pub fn create_schema(&self) -> Result<()> {
        let mut conn = self.connect()?;

        let tx = conn.transaction()?;
        for mapping in self.mappings.iter() {
            persister::create_table(&tx, mapping)?;
        }
        tx.commit()?;

        info!("Schema created for {} entities", self.mappings.len());
        Ok(())
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(&self.location, self.flags)?;
        conn.busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))?;
        let journal_mode = match self.anchor {
            Some(_) => "MEMORY",
            None => self.database.journal_mode.as_str(),
        };
        conn.pragma_update(None, "journal_mode", journal_mode)?;
        Ok(conn)
    }

    /// Look up a mapping by entity name.
    pub fn mapping(&self, entity: &str) -> Result<&EntityMapping> {
        self.mappings.get(entity)
    }

    /// All mappings.
    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }

    /// The database settings this factory was built with.
    pub fn database(&self) -> &DatabaseConfig {
        &self.database
    }
}
