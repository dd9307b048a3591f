//! The cache store contract.
//!
//! These traits are what a caching layer calls to delegate persistence:
//! [`CacheLoader`] on read misses, [`CacheStore`] on writes and removals.
//! The associated `Key` and `Value` types let backends work with their own
//! domain types.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::Result;

/// Read side of the contract.
pub trait CacheLoader: Send + Sync {
    /// Cache key type.
    type Key: Clone + Eq + Hash + Send + Sync + 'static;

    /// Cache value type.
    type Value: Clone + Send + Sync + 'static;

    /// Canonical form of a key.
    ///
    /// Keys that address the same stored value must normalize to the same
    /// key, so a caching layer can index memory by it. The default is the
    /// identity.
    fn normalize_key(&self, key: &Self::Key) -> Result<Self::Key> {
        Ok(key.clone())
    }

    /// Load the value for a key.
    ///
    /// Return `Ok(None)` if the backing store has no value for it.
    fn load(&self, key: &Self::Key) -> Result<Option<Self::Value>>;

    /// Load values for several keys.
    ///
    /// Keys without a value are absent from the result. The default
    /// implementation loads one key at a time.
    fn load_all(&self, keys: &[Self::Key]) -> Result<HashMap<Self::Key, Self::Value>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.load(key)? {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }
}

/// Write side of the contract.
///
/// The default `*_all` implementations apply one item at a time and are not
/// atomic; transactional backends override them.
pub trait CacheStore: CacheLoader {
    /// Persist a value under a key.
    fn store(&self, key: &Self::Key, value: &Self::Value) -> Result<()>;

    /// Persist several entries.
    fn store_all(&self, entries: &HashMap<Self::Key, Self::Value>) -> Result<()> {
        for (key, value) in entries {
            self.store(key, value)?;
        }
        Ok(())
    }

    /// Remove the value for a key. Removing an absent key is not an error.
    fn erase(&self, key: &Self::Key) -> Result<()>;

    /// Remove values for several keys.
    fn erase_all(&self, keys: &[Self::Key]) -> Result<()> {
        for key in keys {
            self.erase(key)?;
        }
        Ok(())
    }
}

/// In-memory store for testing cache layers.
///
/// Keys listed in `reject` fail on store, which lets tests observe
/// write-through behavior on failure.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockCacheStore {
    pub(crate) data: parking_lot::Mutex<HashMap<String, String>>,
    pub(crate) reject: parking_lot::Mutex<Vec<String>>,
    pub(crate) loads: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&self, key: &str) {
        self.reject.lock().push(key.to_string());
    }

    pub fn load_calls(&self) -> usize {
        self.loads.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl CacheLoader for MockCacheStore {
    type Key = String;
    type Value = String;

    fn load(&self, key: &String) -> Result<Option<String>> {
        self.loads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.data.lock().get(key).cloned())
    }
}

#[cfg(test)]
impl CacheStore for MockCacheStore {
    fn store(&self, key: &String, value: &String) -> Result<()> {
        if self.reject.lock().contains(key) {
            return Err(cachestore_orm::OrmError::InvalidKey(format!("rejected {key}")).into());
        }
        self.data.lock().insert(key.clone(), value.clone());
        Ok(())
    }

    fn store_all(&self, entries: &HashMap<String, String>) -> Result<()> {
        let reject = self.reject.lock();
        if let Some(key) = entries.keys().find(|k| reject.contains(k)) {
            return Err(cachestore_orm::OrmError::InvalidKey(format!("rejected {key}")).into());
        }
        self.data.lock().extend(entries.clone());
        Ok(())
    }

    fn erase(&self, key: &String) -> Result<()> {
        self.data.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_load_all_skips_missing() {
        let store = MockCacheStore::new();
        store.store(&"a".to_string(), &"1".to_string()).unwrap();

        let found = store
            .load_all(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.get("a").map(String::as_str), Some("1"));
        assert_eq!(store.load_calls(), 2);
    }

    #[test]
    fn test_default_erase_all() {
        let store = MockCacheStore::new();
        store.store(&"a".to_string(), &"1".to_string()).unwrap();
        store.store(&"b".to_string(), &"2".to_string()).unwrap();

        store
            .erase_all(&["a".to_string(), "missing".to_string()])
            .unwrap();
        assert!(store.load(&"a".to_string()).unwrap().is_none());
        assert!(store.load(&"b".to_string()).unwrap().is_some());
    }
}
