//! Entry commands - load, store and erase through the cache store.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use clap::Args;
use serde_json::{Map, Value, json};

use cachestore_store::{CacheLoader, CacheStore};

use super::{Context, print_json};

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Entity key
    pub key: String,
}

#[derive(Args, Debug)]
pub struct KeysArgs {
    /// Entity keys
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Entity key
    pub key: String,

    /// Entity as a JSON object
    #[arg(id = "entity_json", value_name = "ENTITY")]
    pub entity: String,
}

#[derive(Args, Debug)]
pub struct StoreAllArgs {
    /// JSON file mapping keys to entities (`-` reads stdin)
    pub file: PathBuf,
}

/// Print the entity stored under a key, or `null`.
pub fn load(args: KeyArgs, ctx: &Context) -> Result<()> {
    let key = ctx.parse_key(&args.key)?;
    let value = ctx.store.load(&key)?;
    print_json(&value.unwrap_or(Value::Null))
}

/// Print found entities as an object keyed by their keys.
pub fn load_all(args: KeysArgs, ctx: &Context) -> Result<()> {
    let keys = ctx.parse_keys(&args.keys)?;
    let found = ctx.store.load_all(&keys)?;

    // Keep request order in the output.
    let mut out = Map::new();
    for key in &keys {
        if let Some(value) = found.get(key) {
            out.insert(key.to_string(), value.clone());
        }
    }
    print_json(&Value::Object(out))
}

pub fn store(args: StoreArgs, ctx: &Context) -> Result<()> {
    let key = ctx.parse_key(&args.key)?;
    let entity: Value =
        serde_json::from_str(&args.entity).context("entity argument is not valid JSON")?;

    ctx.store.store(&key, &entity)?;
    print_json(&json!({ "stored": [key] }))
}

pub fn store_all(args: StoreAllArgs, ctx: &Context) -> Result<()> {
    let raw = read_input(&args.file)?;
    let Value::Object(object) = serde_json::from_str::<Value>(&raw)
        .with_context(|| format!("{} is not valid JSON", args.file.display()))?
    else {
        bail!("{} must contain a JSON object of key -> entity", args.file.display());
    };

    let mut entries = HashMap::with_capacity(object.len());
    let mut keys = Vec::with_capacity(object.len());
    for (raw_key, entity) in object {
        let key = ctx.parse_key(&raw_key)?;
        if entries.contains_key(&key) {
            bail!(
                "duplicate key '{raw_key}' in {}: another entry already names {key}",
                args.file.display()
            );
        }
        keys.push(key.clone());
        entries.insert(key, entity);
    }

    ctx.store.store_all(&entries)?;
    print_json(&json!({ "stored": keys }))
}

pub fn erase(args: KeyArgs, ctx: &Context) -> Result<()> {
    let key = ctx.parse_key(&args.key)?;
    ctx.store.erase(&key)?;
    print_json(&json!({ "erased": [key] }))
}

pub fn erase_all(args: KeysArgs, ctx: &Context) -> Result<()> {
    let keys = ctx.parse_keys(&args.keys)?;
    ctx.store.erase_all(&keys)?;
    print_json(&json!({ "erased": keys }))
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
