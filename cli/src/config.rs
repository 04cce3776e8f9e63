use anyhow::{Context, Result};
use fleet_rs::config::FleetConfig;
use std::path::Path;

pub const APP_NAME: &str = "fleet";
pub const ENV_PREFIX: &str = "FLEET_";

/// Load the configuration from `path`, or from the XDG config directory and
/// the environment when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<FleetConfig> {
    let config: FleetConfig = fleet_rs::config::load(APP_NAME, path, ENV_PREFIX)
        .context("Failed to load configuration")?;
    log::debug!(
        "Using inventory at {} and build service at {}",
        config.inventory.host,
        config.build.host
    );
    Ok(config)
}
