//! Cache store adapter backed by the cachestore ORM.
//!
//! A caching layer delegates persistence to a [`CacheStore`]. This crate
//! provides one that writes entries of a single mapped entity type to a
//! relational database:
//!
//! - every `store`/`store_all`/`erase`/`erase_all` call opens its own session
//!   and runs in its own transaction, so batch calls are all-or-nothing
//! - an entity's identifier must match its cache key; a missing identifier is
//!   filled in from the key
//! - erasing an absent key is a no-op
//!
//! [`WriteThroughCache`] is a small in-memory front that only caches values
//! the store accepted.
//!
//! # Example
//!
//! ```rust,ignore
//! use cachestore_store::{CacheStore, EntityCacheStore, EntityKey};
//! use serde_json::json;
//!
//! let store = EntityCacheStore::from_file("Person", "orm.toml");
//! store.store(&EntityKey::Integer(1), &json!({"name": "Ann"}))?;
//! store.erase(&EntityKey::Integer(1))?;
//! ```

mod cache;
mod config;
mod contract;
mod error;
mod loader;
mod store;

pub use cache::{CacheStats, WriteThroughCache};
pub use cachestore_orm::EntityKey;
pub use config::{SessionSource, StoreConfig};
pub use contract::{CacheLoader, CacheStore};
pub use error::{Result, StoreError};
pub use loader::EntityCacheLoader;
pub use store::EntityCacheStore;
