use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{event, instrument, Level};

use crate::error::Error;
use crate::process;

/// Source of the satlab ID of the appliance this runs on.
#[async_trait]
pub trait HostIdentifier: Send + Sync {
    async fn identify(&self) -> Result<String, Error>;
}

/// Runs the identifier script installed on every appliance.
#[derive(Debug, Clone)]
pub struct IdentifierScript {
    path: PathBuf,
    timeout: Duration,
}

impl IdentifierScript {
    pub fn new(path: PathBuf, timeout: Duration) -> Self {
        IdentifierScript { path, timeout }
    }
}

#[async_trait]
impl HostIdentifier for IdentifierScript {
    async fn identify(&self) -> Result<String, Error> {
        let output = process::output(Command::new(&self.path), self.timeout)
            .await
            .map_err(|e| Error::IdentityUnknown(format!("{}: {e}", self.path.display())))?;
        if !output.status.success() {
            return Err(Error::IdentityUnknown(format!(
                "{} {}",
                self.path.display(),
                process::failure_message(&output)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// The explicit ID if one is given, else whatever `identifier` reports.
/// Either way the ID is lowercased.
#[instrument(skip(identifier))]
pub async fn resolve_site_id(
    explicit: &str,
    identifier: &dyn HostIdentifier,
) -> Result<String, Error> {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return Ok(explicit.to_lowercase());
    }
    let id = identifier.identify().await?.trim().to_lowercase();
    if id.is_empty() {
        return Err(Error::IdentityUnknown(
            "identifier script printed nothing".to_string(),
        ));
    }
    event!(Level::DEBUG, %id, "Resolved satlab ID");
    Ok(id)
}
