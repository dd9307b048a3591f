//! cachestore - persist cache entries through a relational entity store
//!
//! Main entry point for the cachestore CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{entries, init};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// cachestore - persist cache entries through a relational entity store
#[derive(Parser)]
#[command(name = "cachestore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to load the entity mappings from
    #[arg(short, long, global = true, conflicts_with = "resource")]
    pub config: Option<PathBuf>,

    /// Config resource to look up on the search path (default: cachestore.toml)
    #[arg(short, long, global = true, env = "CACHESTORE_RESOURCE")]
    pub resource: Option<String>,

    /// Mapped entity the command operates on
    #[arg(short, long, global = true, env = "CACHESTORE_ENTITY")]
    pub entity: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the session factory, create the schema and show the mapping
    Init,

    /// Load one entity by key
    Load(entries::KeyArgs),

    /// Load several entities by key
    LoadAll(entries::KeysArgs),

    /// Store one entity under a key
    Store(entries::StoreArgs),

    /// Store every entity of a JSON object file (key -> entity)
    StoreAll(entries::StoreAllArgs),

    /// Erase one entity by key
    Erase(entries::KeyArgs),

    /// Erase several entities by key
    EraseAll(entries::KeysArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console logs go to stderr so stdout stays parseable JSON.
    let filter = if cli.verbose {
        "cachestore=debug,cachestore_store=debug,cachestore_orm=debug,cachestore_config=debug,info"
    } else {
        "cachestore=info,cachestore_store=warn,cachestore_orm=warn,warn"
    };

    let log_dir = cachestore_config::config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "cachestore.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "cachestore=trace,cachestore_store=trace,cachestore_orm=trace,cachestore_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context::from_cli(&cli)?;

    match cli.command {
        Commands::Init => init::run(&ctx),
        Commands::Load(args) => entries::load(args, &ctx),
        Commands::LoadAll(args) => entries::load_all(args, &ctx),
        Commands::Store(args) => entries::store(args, &ctx),
        Commands::StoreAll(args) => entries::store_all(args, &ctx),
        Commands::Erase(args) => entries::erase(args, &ctx),
        Commands::EraseAll(args) => entries::erase_all(args, &ctx),
    }
}
