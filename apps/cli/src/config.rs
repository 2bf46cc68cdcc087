//! CLI configuration loading and merging.

use std::path::Path;

use anyhow::{Context, Result};
use triply_client::ClientConfig;

/// Load and merge client configuration.
///
/// Configuration precedence:
/// 1. CLI arguments (`--base-url`, then `--config`)
/// 2. Environment variables (`TRIPLY_API_URL`)
/// 3. Local config file (./.triplyrc)
/// 4. Global config file (~/.triply/config.toml)
/// 5. Defaults
pub fn load_config(extra: Option<&Path>, base_url: Option<String>) -> Result<ClientConfig> {
    let mut config = ClientConfig::discover_and_load();

    if let Some(path) = extra {
        let file = ClientConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        config.merge(&file);
    }

    if base_url.is_some() {
        config.base_url = base_url;
    }
    config.validate().context("Invalid configuration")?;

    Ok(config)
}
