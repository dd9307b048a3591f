//! Store adapter integration tests.
//!
//! These tests exercise the adapter against file-backed databases, the way a
//! deployed cache would use it.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde_json::{Value, json};
use serial_test::serial;
use tempfile::TempDir;

use cachestore_config::{DatabaseConfig, EntityConfig, IdType, OrmConfig};
use cachestore_orm::SessionFactory;
use cachestore_store::{
    CacheLoader, CacheStore, EntityCacheStore, EntityKey, StoreConfig, StoreError,
    WriteThroughCache,
};

fn orm_config(dir: &Path) -> OrmConfig {
    OrmConfig::new()
        .with_database(DatabaseConfig::at_path(dir.join("cache.db").display().to_string()))
        .with_entity(EntityConfig::new("Person").with_table("people"))
        .with_entity(
            EntityConfig::new("Session")
                .with_id_attribute("token")
                .with_id_type(IdType::Uuid),
        )
}

fn person_store(dir: &Path) -> EntityCacheStore {
    EntityCacheStore::from_config(StoreConfig::new("Person").with_orm_config(orm_config(dir)))
}

fn write_config(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(
        &path,
        format!(
            "[database]\npath = \"{}\"\n\n[[entity]]\nname = \"Person\"\ntable = \"people\"\n",
            dir.join("cache.db").display()
        ),
    )
    .expect("write config");
    path
}

fn person(id: Option<i64>, name: &str) -> Value {
    match id {
        Some(id) => json!({"id": id, "name": name}),
        None => json!({"name": name}),
    }
}

#[test]
fn test_stored_value_loads_back() -> Result<()> {
    let dir = TempDir::new()?;
    let store = person_store(dir.path());
    let key = EntityKey::Integer(1);

    store.store(&key, &person(Some(1), "Ann"))?;

    assert_eq!(store.load(&key)?, Some(person(Some(1), "Ann")));
    Ok(())
}

#[test]
fn test_missing_identifier_is_assigned_from_key() -> Result<()> {
    let dir = TempDir::new()?;
    let store = person_store(dir.path());

    store.store(&EntityKey::Integer(5), &person(None, "Bea"))?;
    store.store(&EntityKey::Integer(6), &json!({"id": null, "name": "Cy"}))?;

    assert_eq!(store.load(&EntityKey::Integer(5))?, Some(person(Some(5), "Bea")));
    assert_eq!(store.load(&EntityKey::Integer(6))?, Some(person(Some(6), "Cy")));
    Ok(())
}

#[test]
fn test_mismatched_identifier_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let store = person_store(dir.path());

    let err = store
        .store(&EntityKey::Integer(1), &person(Some(2), "Ann"))
        .unwrap_err();

    match err {
        StoreError::IdentifierMismatch {
            entity,
            key,
            identifier,
        } => {
            assert_eq!(entity, "Person");
            assert_eq!(key, EntityKey::Integer(1));
            assert_eq!(identifier, EntityKey::Integer(2));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(store.load(&EntityKey::Integer(1))?.is_none());
    assert!(store.load(&EntityKey::Integer(2))?.is_none());
    Ok(())
}

#[test]
fn test_store_all_persists_every_entry() -> Result<()> {
    let dir = TempDir::new()?;
    let store = person_store(dir.path());

    let entries: HashMap<_, _> = (1..=3)
        .map(|n| (EntityKey::Integer(n), person(None, &format!("p{n}"))))
        .collect();
    store.store_all(&entries)?;

    let keys: Vec<_> = entries.keys().cloned().collect();
    let loaded = store.load_all(&keys)?;
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded[&EntityKey::Integer(2)], person(Some(2), "p2"));
    Ok(())
}

#[test]
fn test_store_all_with_one_bad_entry_persists_nothing() -> Result<()> {
    let dir = TempDir::new()?;
    let store = person_store(dir.path());

    let mut entries = HashMap::new();
    entries.insert(EntityKey::Integer(1), person(Some(1), "Ann"));
    entries.insert(EntityKey::Integer(2), person(Some(2), "Bea"));
    entries.insert(EntityKey::Integer(3), person(Some(4), "Cy"));

    let err = store.store_all(&entries).unwrap_err();
    assert!(err.is_validation());

    let loaded = store.load_all(&[
        EntityKey::Integer(1),
        EntityKey::Integer(2),
        EntityKey::Integer(3),
        EntityKey::Integer(4),
    ])?;
    assert!(loaded.is_empty());
    Ok(())
}

#[test]
fn test_store_all_keeps_earlier_data_on_failure() -> Result<()> {
    let dir = TempDir::new()?;
    let store = person_store(dir.path());
    store.store(&EntityKey::Integer(1), &person(None, "Ann"))?;

    let entries = HashMap::from([
        (EntityKey::Integer(1), person(None, "Ann Lee")),
        (EntityKey::Integer(2), json!(["not", "an", "object"])),
    ]);
    assert!(store.store_all(&entries).is_err());

    assert_eq!(store.load(&EntityKey::Integer(1))?, Some(person(Some(1), "Ann")));
    Ok(())
}

#[test]
fn test_empty_batches_succeed() -> Result<()> {
    let dir = TempDir::new()?;
    let store = person_store(dir.path());

    store.store_all(&HashMap::new())?;
    store.erase_all(&[])?;
    Ok(())
}

#[test]
fn test_erase_then_load_is_absent() -> Result<()> {
    let dir = TempDir::new()?;
    let store = person_store(dir.path());
    let key = EntityKey::Integer(1);

    store.store(&key, &person(None, "Ann"))?;
    store.erase(&key)?;
    assert!(store.load(&key)?.is_none());

    // Erasing again is a no-op.
    store.erase(&key)?;
    Ok(())
}

#[test]
fn test_erase_all_ignores_missing_keys() -> Result<()> {
    let dir = TempDir::new()?;
    let store = person_store(dir.path());
    store.store(&EntityKey::Integer(1), &person(None, "Ann"))?;
    store.store(&EntityKey::Integer(2), &person(None, "Bea"))?;

    store.erase_all(&[EntityKey::Integer(1), EntityKey::Integer(42)])?;

    assert!(store.load(&EntityKey::Integer(1))?.is_none());
    assert!(store.load(&EntityKey::Integer(2))?.is_some());
    Ok(())
}

#[test]
fn test_uuid_keys_are_normalized() -> Result<()> {
    let dir = TempDir::new()?;
    let store = EntityCacheStore::from_config(
        StoreConfig::new("Session").with_orm_config(orm_config(dir.path())),
    );

    let upper = EntityKey::from("6F9619FF-8B86-D011-B42D-00CF4FC964FF");
    let lower = EntityKey::from("6f9619ff-8b86-d011-b42d-00cf4fc964ff");

    store.store(&upper, &json!({"user": "ann"}))?;

    let loaded = store.load(&lower)?.expect("session should be stored");
    assert_eq!(loaded["token"], json!("6f9619ff-8b86-d011-b42d-00cf4fc964ff"));

    store.erase(&upper)?;
    assert!(store.load(&lower)?.is_none());
    Ok(())
}

#[test]
fn test_invalid_uuid_key_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let store = EntityCacheStore::from_config(
        StoreConfig::new("Session").with_orm_config(orm_config(dir.path())),
    );

    let err = store
        .store(&EntityKey::from("not-a-uuid"), &json!({}))
        .unwrap_err();
    assert!(err.is_validation());
    Ok(())
}

#[test]
fn test_not_initialized_without_entity_name() {
    let store = EntityCacheStore::from_config(StoreConfig::default());

    for result in [
        store.store(&EntityKey::Integer(1), &json!({})),
        store.store_all(&HashMap::new()),
        store.erase(&EntityKey::Integer(1)),
        store.erase_all(&[]),
    ] {
        assert!(matches!(result, Err(StoreError::NotInitialized(_))));
    }
}

#[test]
fn test_not_initialized_for_unmapped_entity() -> Result<()> {
    let dir = TempDir::new()?;
    let store = EntityCacheStore::from_config(
        StoreConfig::new("Invoice").with_orm_config(orm_config(dir.path())),
    );

    let err = store.erase(&EntityKey::Integer(1)).unwrap_err();
    assert!(matches!(err, StoreError::NotInitialized(_)));
    assert!(err.to_string().contains("Invoice"));
    Ok(())
}

#[test]
fn test_data_survives_new_store_instance() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(dir.path(), "orm.toml");

    EntityCacheStore::from_file("Person", &path).store(&EntityKey::Integer(1), &person(None, "Ann"))?;

    let reopened = EntityCacheStore::from_file("Person", &path);
    assert_eq!(reopened.load(&EntityKey::Integer(1))?, Some(person(Some(1), "Ann")));
    Ok(())
}

#[test]
#[serial]
fn test_store_from_named_resource() -> Result<()> {
    let dir = TempDir::new()?;
    write_config(dir.path(), "people.toml");

    // SAFETY: tests touching the environment are serialized.
    unsafe { std::env::set_var("CACHESTORE_CONFIG_DIR", dir.path()) };
    let store = EntityCacheStore::from_resource("Person", "people.toml");
    let result = store.store(&EntityKey::Integer(7), &person(None, "Gus"));
    unsafe { std::env::remove_var("CACHESTORE_CONFIG_DIR") };
    result?;

    // The factory is built, so the environment is no longer consulted.
    assert_eq!(store.load(&EntityKey::Integer(7))?, Some(person(Some(7), "Gus")));
    Ok(())
}

#[test]
#[serial]
fn test_missing_resource_is_config_error() -> Result<()> {
    let dir = TempDir::new()?;

    // SAFETY: tests touching the environment are serialized.
    unsafe { std::env::set_var("CACHESTORE_CONFIG_DIR", dir.path()) };
    let result = EntityCacheStore::from_resource("Person", "absent.toml")
        .store(&EntityKey::Integer(1), &json!({}));
    unsafe { std::env::remove_var("CACHESTORE_CONFIG_DIR") };

    assert!(matches!(result, Err(StoreError::Config(_))));
    Ok(())
}

#[test]
fn test_stores_share_one_factory() -> Result<()> {
    let dir = TempDir::new()?;
    let factory = Arc::new(SessionFactory::build(&orm_config(dir.path()))?);

    let people = EntityCacheStore::with_factory("Person", Arc::clone(&factory));
    let sessions = EntityCacheStore::with_factory("Session", Arc::clone(&factory));

    people.store(&EntityKey::Integer(1), &person(None, "Ann"))?;
    sessions.store(&EntityKey::from(uuid_like(1)), &json!({"user": 1}))?;

    assert!(people.load(&EntityKey::Integer(1))?.is_some());
    assert!(sessions.load(&EntityKey::from(uuid_like(1)))?.is_some());
    Ok(())
}

#[test]
fn test_concurrent_stores_use_independent_sessions() -> Result<()> {
    let dir = TempDir::new()?;
    let store = Arc::new(person_store(dir.path()));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || -> Result<(), StoreError> {
                for n in 0..10 {
                    let id = t * 100 + n;
                    store.store(&EntityKey::Integer(id), &person(None, "worker"))?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked")?;
    }

    let keys: Vec<_> = (0..4)
        .flat_map(|t| (0..10).map(move |n| EntityKey::Integer(t * 100 + n)))
        .collect();
    assert_eq!(store.load_all(&keys)?.len(), 40);
    Ok(())
}

#[test]
fn test_write_through_cache_over_entity_store() -> Result<()> {
    let dir = TempDir::new()?;
    let cache = WriteThroughCache::new(person_store(dir.path()));

    cache.put(EntityKey::Integer(1), person(None, "Ann"))?;
    assert!(cache.put(EntityKey::Integer(2), person(Some(3), "Bea")).is_err());

    assert!(cache.contains_cached(&EntityKey::Integer(1)));
    assert!(!cache.contains_cached(&EntityKey::Integer(2)));
    assert_eq!(
        cache.store().load(&EntityKey::Integer(1))?,
        Some(person(Some(1), "Ann"))
    );

    cache.remove(&EntityKey::Integer(1))?;
    assert!(cache.get(&EntityKey::Integer(1))?.is_none());

    let stats = cache.stats();
    assert_eq!(stats.stores, 1);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.erases, 1);
    Ok(())
}

#[test]
fn test_concurrent_stores_on_in_memory_database() -> Result<()> {
    let config = OrmConfig::new()
        .with_database(DatabaseConfig::in_memory())
        .with_entity(EntityConfig::new("Person").with_table("people"));
    let store = Arc::new(EntityCacheStore::from_config(
        StoreConfig::new("Person").with_orm_config(config),
    ));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || -> Result<(), StoreError> {
                for n in 0..50 {
                    let id = t * 1000 + n;
                    store.store(&EntityKey::Integer(id), &person(None, "worker"))?;
                    store.load(&EntityKey::Integer(id))?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked")?;
    }

    let keys: Vec<_> = (0..4)
        .flat_map(|t| (0..50).map(move |n| EntityKey::Integer(t * 1000 + n)))
        .collect();
    assert_eq!(store.load_all(&keys)?.len(), 200);
    Ok(())
}

#[test]
fn test_write_through_cache_normalizes_uuid_keys() -> Result<()> {
    let dir = TempDir::new()?;
    let factory = Arc::new(SessionFactory::build(&orm_config(dir.path()))?);
    let cache = WriteThroughCache::new(EntityCacheStore::with_factory("Session", factory));

    let lower = uuid_like(0xabc);
    let upper = EntityKey::from(lower.to_uppercase());
    let lower = EntityKey::from(lower);

    cache.put(upper.clone(), json!({"user": 1}))?;
    assert!(cache.contains_cached(&lower));
    assert_eq!(cache.len(), 1);

    cache.remove(&lower)?;
    assert!(!cache.contains_cached(&upper));
    assert!(cache.get(&upper)?.is_none());
    Ok(())
}

/// A store over a file database that gives up on locks quickly, so a
/// session left open after a failure shows up as a busy error.
fn impatient_person_store(dir: &Path) -> EntityCacheStore {
    let mut database = DatabaseConfig::at_path(dir.join("cache.db").display().to_string());
    database.busy_timeout_ms = 200;
    EntityCacheStore::from_config(
        StoreConfig::new("Person").with_orm_config(
            OrmConfig::new()
                .with_database(database)
                .with_entity(EntityConfig::new("Person").with_table("people")),
        ),
    )
}

/// Install a trigger straight on the database file.
fn install_trigger(dir: &Path, sql: &str) -> Result<()> {
    let conn = rusqlite::Connection::open(dir.join("cache.db"))?;
    conn.execute_batch(sql)?;
    Ok(())
}

#[test]
fn test_store_all_database_failure_rolls_back() -> Result<()> {
    let dir = TempDir::new()?;
    let store = impatient_person_store(dir.path());
    store.store(&EntityKey::Integer(1), &person(None, "Ann"))?;
    install_trigger(
        dir.path(),
        "CREATE TRIGGER reject_13 BEFORE INSERT ON people WHEN NEW.id = 13
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
    )?;

    let entries = HashMap::from([
        (EntityKey::Integer(11), person(None, "p11")),
        (EntityKey::Integer(12), person(None, "p12")),
        (EntityKey::Integer(13), person(None, "p13")),
    ]);
    let err = store.store_all(&entries).unwrap_err();
    assert!(matches!(err, StoreError::Orm(_)));
    assert!(!err.is_validation());

    let loaded = store.load_all(&[
        EntityKey::Integer(11),
        EntityKey::Integer(12),
        EntityKey::Integer(13),
    ])?;
    assert!(loaded.is_empty());

    // The failed batch released its session and write lock.
    store.store(&EntityKey::Integer(2), &person(None, "Bea"))?;
    assert!(store.load(&EntityKey::Integer(2))?.is_some());
    Ok(())
}

#[test]
fn test_erase_all_database_failure_rolls_back() -> Result<()> {
    let dir = TempDir::new()?;
    let store = impatient_person_store(dir.path());
    let entries: HashMap<_, _> = (21..=23)
        .map(|id| (EntityKey::Integer(id), person(None, "keep")))
        .collect();
    store.store_all(&entries)?;
    install_trigger(
        dir.path(),
        "CREATE TRIGGER protect_23 BEFORE DELETE ON people WHEN OLD.id = 23
         BEGIN SELECT RAISE(ABORT, 'protected'); END;",
    )?;

    let keys = [
        EntityKey::Integer(21),
        EntityKey::Integer(22),
        EntityKey::Integer(23),
    ];
    let err = store.erase_all(&keys).unwrap_err();
    assert!(matches!(err, StoreError::Orm(_)));
    assert_eq!(store.load_all(&keys)?.len(), 3);

    store.erase(&EntityKey::Integer(21))?;
    assert!(store.load(&EntityKey::Integer(21))?.is_none());
    Ok(())
}

fn uuid_like(n: u32) -> String {
    format!("00000000-0000-4000-8000-{n:012x}")
}
