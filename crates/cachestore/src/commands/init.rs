//! Init command - build the session factory and report the mapping.

use anyhow::Result;
use serde_json::json;
use tracing::info;

use super::{Context, print_json};

/// Run the init command.
///
/// Building the factory creates the mapped tables when the config asks for
/// it, so this doubles as schema setup.
pub fn run(ctx: &Context) -> Result<()> {
    let loader = ctx.store.loader();
    let factory = loader.ensure_initialized()?;
    let mapping = loader.mapping()?;

    info!(entity = %mapping.name, table = %mapping.table, "Store initialized");

    let mut report = json!({
        "entity": mapping.name,
        "table": mapping.table,
        "id_attribute": mapping.id_attribute,
        "id_type": mapping.id_type,
        "database": factory.database().path,
    });
    if ctx.verbose {
        report["source"] = json!(loader.config().source.describe());
        report["mapped_entities"] = json!(factory.mappings().names());
    }

    print_json(&report)
}
