//! Minimal entity mapping over SQLite.
//!
//! This crate provides just enough object-relational mapping for a cache
//! store to use a relational database as its system of record:
//!
//! - [`SessionFactory`]: built once from an [`OrmConfig`](cachestore_config::OrmConfig),
//!   creates mapped tables and opens sessions
//! - [`Session`]: one connection, one unit of work; `get`, identifier metadata
//! - [`Transaction`]: `merge` (insert-or-update), `delete`, `commit`, `rollback`
//!
//! Entities are JSON objects. Each mapped entity type gets its own table with
//! one row per entity, keyed by the identifier attribute named in its mapping.
//!
//! # Usage
//!
//! ```no_run
//! use cachestore_config::{DatabaseConfig, EntityConfig, OrmConfig};
//! use cachestore_orm::{EntityKey, SessionFactory};
//! use serde_json::json;
//!
//! let config = OrmConfig::new()
//!     .with_database(DatabaseConfig::in_memory())
//!     .with_entity(EntityConfig::new("Person").with_table("people"));
//! let factory = SessionFactory::build(&config)?;
//!
//! let session = factory.open_session()?;
//! let tx = session.begin_transaction()?;
//! tx.merge("Person", &json!({"id": 1, "name": "Ann"}))?;
//! tx.commit()?;
//!
//! let person = session.get("Person", &EntityKey::Integer(1))?;
//! session.close()?;
//! # Ok::<(), cachestore_orm::OrmError>(())
//! ```

pub mod error;
pub mod factory;
pub mod key;
pub mod mapping;
mod persister;
pub mod session;

pub use cachestore_config::IdType;
pub use error::{OrmError, Result};
pub use factory::SessionFactory;
pub use key::EntityKey;
pub use mapping::{EntityMapping, Mappings, validate_table_name};
pub use session::{Session, Transaction};
