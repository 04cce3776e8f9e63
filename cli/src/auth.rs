use anyhow::{Context, Result};
use fleet_rs::config::AuthConfig;
use std::fs;
use std::path::PathBuf;
use xdg::BaseDirectories;

const TOKEN_FILE: &str = "token";

/// Store `token` where [`get_token`] finds it when neither `FLEET_TOKEN` nor
/// `auth.token_file` is set.
pub fn save_token(token: &str) -> Result<PathBuf> {
    let token_path = get_token_path()?;
    fs::write(&token_path, format!("{}\n", token.trim()))
        .with_context(|| format!("Failed to write token to {:?}", token_path))?;
    Ok(token_path)
}

pub fn get_token(config: &AuthConfig) -> Result<Option<String>> {
    let token = fleet_rs::auth::load_token(config).context("Failed to load credentials")?;
    if token.is_none() {
        log::warn!("No credentials found, sending unauthenticated requests");
    }
    Ok(token)
}

fn get_token_path() -> Result<PathBuf> {
    let xdg_dirs = BaseDirectories::with_prefix("fleet")
        .context("Failed to initialize XDG base directories")?;

    let token_path = xdg_dirs
        .place_data_file(TOKEN_FILE)
        .context("Failed to determine token file path")?;

    Ok(token_path)
}
