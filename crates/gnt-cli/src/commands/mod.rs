pub mod normalize;
pub mod stats;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use gnt_core::TopologyConfig;
use tracing::info;

/// Load the configuration file, or fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<TopologyConfig> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            TopologyConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))
        }
        None => Ok(TopologyConfig::default()),
    }
}
