//! Config file loading for the CLI.

use anyhow::{Context, Result};
use stale_core::StaleConfig;
use std::path::Path;

/// Load `path` if it exists, fall back to defaults otherwise, then apply
/// `STALE_*` environment overrides.
pub fn load_config(path: &Path) -> Result<StaleConfig> {
    let mut config = if path.exists() {
        StaleConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        StaleConfig::default()
    };

    config
        .merge_with_env()
        .context("applying STALE_* environment overrides")?;
    config.validate()?;
    Ok(config)
}
