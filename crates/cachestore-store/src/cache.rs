//! Write-through cache in front of a [`CacheStore`].
//!
//! Reads are served from memory and fall back to the store on a miss. Writes
//! and removals go to the store first; memory only changes once the store
//! accepted the change, so the cache never holds a value the store rejected.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::contract::CacheStore;
use crate::error::{Result, StoreError};

/// Counters for cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from memory.
    pub hits: u64,
    /// Reads that went to the store.
    pub misses: u64,
    /// Values the store returned on a miss.
    pub loads: u64,
    /// Entries written through to the store.
    pub stores: u64,
    /// Keys erased through the store.
    pub erases: u64,
    /// Store calls that returned an error.
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    stores: AtomicU64,
    erases: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            erases: self.erases.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Cached entries plus a counter bumped by every memory write.
///
/// A load started under one generation may only fill memory if no write
/// happened while it ran.
struct Entries<K, V> {
    map: HashMap<K, V>,
    generation: u64,
}

/// Unbounded in-memory cache that writes through to a store.
///
/// Memory is indexed by [`normalize_key`](crate::CacheLoader::normalize_key), so keys that address
/// the same stored value share one entry.
pub struct WriteThroughCache<S: CacheStore> {
    store: S,
    entries: RwLock<Entries<S::Key, S::Value>>,
    counters: Counters,
}

impl<S: CacheStore> WriteThroughCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            entries: RwLock::new(Entries {
                map: HashMap::new(),
                generation: 0,
            }),
            counters: Counters::default(),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a value, loading it from the store on a miss.
    pub fn get(&self, key: &S::Key) -> Result<Option<S::Value>> {
        let key = self.normalize(key)?;

        let generation = {
            let entries = self.entries.read();
            if let Some(value) = entries.map.get(&key) {
                Counters::add(&self.counters.hits, 1);
                trace!("cache hit");
                return Ok(Some(value.clone()));
            }
            entries.generation
        };

        Counters::add(&self.counters.misses, 1);
        let loaded = self.track(self.store.load(&key))?;

        if let Some(value) = &loaded {
            Counters::add(&self.counters.loads, 1);
            self.fill(generation, [(key, value.clone())]);
        }
        Ok(loaded)
    }

    /// Get several values. Misses are loaded with one `load_all` call.
    ///
    /// The result is keyed by the keys as given.
    pub fn get_all(&self, keys: &[S::Key]) -> Result<HashMap<S::Key, S::Value>> {
        let normalized = keys
            .iter()
            .map(|key| -> Result<_> { Ok((key.clone(), self.normalize(key)?)) })
            .collect::<Result<Vec<_>>>()?;

        let mut found = HashMap::with_capacity(keys.len());
        let mut missing = Vec::new();
        let mut seen = HashSet::new();
        let generation = {
            let entries = self.entries.read();
            for (key, canonical) in &normalized {
                match entries.map.get(canonical) {
                    Some(value) => {
                        found.insert(key.clone(), value.clone());
                    }
                    None => {
                        if seen.insert(canonical.clone()) {
                            missing.push(canonical.clone());
                        }
                    }
                }
            }
            entries.generation
        };

        Counters::add(&self.counters.hits, found.len());
        if missing.is_empty() {
            return Ok(found);
        }

        Counters::add(&self.counters.misses, missing.len());
        let loaded = self.track(self.store.load_all(&missing))?;
        Counters::add(&self.counters.loads, loaded.len());
        debug!(requested = keys.len(), loaded = loaded.len(), "cache get_all");

        self.fill(
            generation,
            loaded.iter().map(|(k, v)| (k.clone(), v.clone())),
        );
        for (key, canonical) in normalized {
            if let Some(value) = loaded.get(&canonical) {
                found.entry(key).or_insert_with(|| value.clone());
            }
        }
        Ok(found)
    }

    /// Write a value through to the store, then cache it.
    pub fn put(&self, key: S::Key, value: S::Value) -> Result<()> {
        let key = self.normalize(&key)?;
        self.track(self.store.store(&key, &value))?;
        Counters::add(&self.counters.stores, 1);
        self.update(|map| {
            map.insert(key, value);
        });
        Ok(())
    }

    /// Write several values through in one store call.
    ///
    /// Memory is left untouched if the store rejects the batch. Two keys that
    /// normalize to the same key are rejected before the store is called.
    pub fn put_all(&self, entries: HashMap<S::Key, S::Value>) -> Result<()> {
        let requested = entries.len();
        let mut canonical = HashMap::with_capacity(requested);
        for (key, value) in entries {
            canonical.insert(self.normalize(&key)?, value);
        }
        if canonical.len() != requested {
            Counters::add(&self.counters.failures, 1);
            return Err(StoreError::DuplicateKeys(requested - canonical.len()));
        }

        self.track(self.store.store_all(&canonical))?;
        Counters::add(&self.counters.stores, canonical.len());
        self.update(|map| map.extend(canonical));
        Ok(())
    }

    /// Erase a key from the store, then from memory.
    pub fn remove(&self, key: &S::Key) -> Result<()> {
        let key = self.normalize(key)?;
        self.track(self.store.erase(&key))?;
        Counters::add(&self.counters.erases, 1);
        self.update(|map| {
            map.remove(&key);
        });
        Ok(())
    }

    pub fn remove_all(&self, keys: &[S::Key]) -> Result<()> {
        let keys = keys
            .iter()
            .map(|key| self.normalize(key))
            .collect::<Result<Vec<_>>>()?;

        self.track(self.store.erase_all(&keys))?;
        Counters::add(&self.counters.erases, keys.len());
        self.update(|map| {
            for key in &keys {
                map.remove(key);
            }
        });
        Ok(())
    }

    /// Whether a key is held in memory. Does not consult the store.
    pub fn contains_cached(&self, key: &S::Key) -> bool {
        self.store
            .normalize_key(key)
            .is_ok_and(|key| self.entries.read().map.contains_key(&key))
    }

    pub fn len(&self) -> usize {
        self.entries.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().map.is_empty()
    }

    /// Drop every cached entry. The store is not touched.
    pub fn clear(&self) {
        self.update(HashMap::clear);
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    fn normalize(&self, key: &S::Key) -> Result<S::Key> {
        self.track(self.store.normalize_key(key))
    }

    /// Apply a write to memory and invalidate loads in flight.
    fn update(&self, apply: impl FnOnce(&mut HashMap<S::Key, S::Value>)) {
        let mut entries = self.entries.write();
        apply(&mut entries.map);
        entries.generation += 1;
    }

    /// Cache loaded values unless memory was written since `generation`.
    fn fill(&self, generation: u64, loaded: impl IntoIterator<Item = (S::Key, S::Value)>) {
        let mut entries = self.entries.write();
        if entries.generation != generation {
            trace!("discarding load that raced a write");
            return;
        }
        for (key, value) in loaded {
            entries.map.entry(key).or_insert(value);
        }
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            Counters::add(&self.counters.failures, 1);
            warn!(error = %e, "cache store call failed");
        }
        result
    }
}

impl<S: CacheStore + std::fmt::Debug> std::fmt::Debug for WriteThroughCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteThroughCache")
            .field("store", &self.store)
            .field("len", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
