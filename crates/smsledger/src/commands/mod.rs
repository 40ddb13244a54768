//! CLI command implementations

mod config;
mod messages;
mod run;

use anyhow::{Context, Result};
use smsledger_core::SqliteMessageStore;

use crate::settings::Settings;

pub use config::{cmd_config_init, cmd_config_show};
pub use messages::{cmd_list, cmd_reclassify, cmd_show};
pub use run::cmd_run;

/// Open the configured message store, creating its directory first.
async fn open_store(settings: &Settings) -> Result<SqliteMessageStore> {
    let path = &settings.database_path;
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    SqliteMessageStore::new(&path.to_string_lossy())
        .await
        .with_context(|| format!("Failed to open message store at {}", path.display()))
}
