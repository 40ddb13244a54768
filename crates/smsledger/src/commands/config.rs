//! `config` subcommands.

use std::path::Path;

use anyhow::{Result, bail};

use crate::settings::Settings;

/// Print the effective settings and where they come from.
pub async fn cmd_config_show(path: &Path) -> Result<()> {
    let settings = Settings::load(path).await?;
    let origin = if path.exists() { "" } else { " (not found, using defaults)" };

    println!("# {}{origin}", path.display());
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

/// Write the default settings file.
pub async fn cmd_config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Settings file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    Settings::default().save(path).await?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}
