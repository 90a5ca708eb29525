pub mod config_cmd;
pub mod inspect;
pub mod replay;

use std::path::Path;
use threadloom_config::StoreConfig;

/// Load the configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<StoreConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => StoreConfig::load_from(path),
        None => StoreConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}
