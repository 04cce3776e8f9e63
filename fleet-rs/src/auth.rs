use std::fs;
use std::io;
use std::path::PathBuf;
use xdg::BaseDirectories;

use crate::config::AuthConfig;

pub const TOKEN_ENV: &str = "FLEET_TOKEN";
const TOKEN_FILE: &str = "token";

/// Look up the bearer token for the fleet services.
///
/// Tried in order: the `FLEET_TOKEN` environment variable, the configured
/// token file, and `fleet/token` in the XDG data directories. `Ok(None)`
/// means no credential is available and requests go out unauthenticated.
pub fn load_token(config: &AuthConfig) -> io::Result<Option<String>> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        let token = token.trim().to_string();
        if !token.is_empty() {
            return Ok(Some(token));
        }
    }

    let path = match config.token_file {
        Some(ref path) => Some(path.clone()),
        None => default_token_path(),
    };
    let Some(path) = path else {
        return Ok(None);
    };

    match fs::read_to_string(&path) {
        Ok(contents) => Ok(Some(contents.trim().to_string()).filter(|t| !t.is_empty())),
        Err(e) if e.kind() == io::ErrorKind::NotFound && config.token_file.is_none() => Ok(None),
        Err(e) => Err(io::Error::new(
            e.kind(),
            format!("failed to read token from {path:?}: {e}"),
        )),
    }
}

fn default_token_path() -> Option<PathBuf> {
    BaseDirectories::with_prefix("fleet")
        .ok()
        .and_then(|dirs| dirs.find_data_file(TOKEN_FILE))
}
