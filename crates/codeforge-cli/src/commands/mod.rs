//! CLI command implementations.

pub mod config;
pub mod generate;
pub mod project;

use std::sync::Arc;

use anyhow::Context;
use codeforge_store::SqliteArtifactStore;
use tracing::debug;

use crate::AppContext;

/// Open the configured artifact store.
fn open_store(ctx: &AppContext) -> anyhow::Result<Arc<SqliteArtifactStore>> {
    let store = SqliteArtifactStore::from_config(&ctx.config.storage).with_context(|| {
        format!(
            "opening artifact store at {}",
            ctx.config.storage.resolve_database_path().display()
        )
    })?;
    debug!(path = %store.path().display(), "Opened artifact store");
    Ok(Arc::new(store))
}
