//! Add-if-absent inventory writes through the `fleet` tool.
//!
//! `fleet get <kind> <id>` prints the entity, or nothing at all when it does
//! not exist. Every `ensure_*` operation checks first and only runs
//! `fleet add <kind>` on empty output, so repeating one is harmless.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{event, instrument, Level};

use fleet_rs::api::inventory::AssetType;
use fleet_rs::dut::{flag_args, Flagmap, ValidationError};

use crate::error::Error;
use crate::process;

/// Runs the `fleet` tool and returns its standard output.
#[async_trait]
pub trait FleetCommand: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<String, Error>;
}

#[derive(Debug, Clone)]
pub struct FleetBinary {
    binary: PathBuf,
    timeout: Duration,
}

impl FleetBinary {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        FleetBinary {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl FleetCommand for FleetBinary {
    async fn run(&self, args: &[String]) -> Result<String, Error> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit());
        let description = process::describe(&command);
        let output = process::output(command, self.timeout)
            .await
            .map_err(|e| Error::Inventory {
                command: description.clone(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(Error::Inventory {
                command: description,
                message: format!("exited with {}", output.status),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Whether an `ensure_*` call found the entity or created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    Existing,
    Created,
}

fn flag(flags: &mut Flagmap, name: &str, value: &str) {
    flags.insert(name.to_string(), vec![value.to_string()]);
}

pub struct InventoryDriver {
    fleet: Arc<dyn FleetCommand>,
}

impl InventoryDriver {
    pub fn new(fleet: Arc<dyn FleetCommand>) -> Self {
        InventoryDriver { fleet }
    }

    /// Raw `fleet get` output, trailing whitespace removed.
    pub async fn get(&self, kind: &str, id: &str, namespace: &str) -> Result<String, Error> {
        let args = ["--namespace", namespace, "get", kind, id].map(String::from);
        let stdout = self.fleet.run(&args).await?;
        Ok(stdout.trim_end().to_string())
    }

    async fn add(&self, kind: &str, namespace: &str, flags: &Flagmap) -> Result<(), Error> {
        let mut args = ["--namespace", namespace, "add", kind].map(String::from).to_vec();
        args.extend(flag_args(flags));
        self.fleet.run(&args).await?;
        Ok(())
    }

    async fn ensure(
        &self,
        kind: &str,
        id: &str,
        namespace: &str,
        create: impl FnOnce() -> Result<Flagmap, Error>,
    ) -> Result<Ensured, Error> {
        if !self.get(kind, id, namespace).await?.is_empty() {
            event!(Level::INFO, %kind, %id, "Already in the inventory");
            return Ok(Ensured::Existing);
        }
        let flags = create()?;
        self.add(kind, namespace, &flags).await?;
        event!(Level::INFO, %kind, %id, "Added to the inventory");
        Ok(Ensured::Created)
    }

    #[instrument(skip(self))]
    pub async fn ensure_rack(
        &self,
        rack: &str,
        namespace: &str,
        zone: &str,
    ) -> Result<Ensured, Error> {
        self.ensure("rack", rack, namespace, || {
            let mut flags = Flagmap::new();
            flag(&mut flags, "name", rack);
            flag(&mut flags, "zone", zone);
            Ok(flags)
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self))]
    pub async fn ensure_asset(
        &self,
        asset: &str,
        rack: &str,
        zone: &str,
        model: &str,
        board: &str,
        namespace: &str,
        kind: AssetType,
    ) -> Result<Ensured, Error> {
        self.ensure("asset", asset, namespace, || {
            if model.is_empty() || board.is_empty() {
                return Err(ValidationError::Usage(format!(
                    "need model and board to add asset {asset}"
                ))
                .into());
            }
            let mut flags = Flagmap::new();
            flag(&mut flags, "name", asset);
            flag(&mut flags, "rack", rack);
            flag(&mut flags, "zone", zone);
            flag(&mut flags, "model", model);
            flag(&mut flags, "board", board);
            flag(&mut flags, "type", kind.cli_name());
            Ok(flags)
        })
        .await
    }

    /// `args` are passed to `fleet add dut` as they are, except for the
    /// identity and placement flags which are always set from the other
    /// arguments.
    #[instrument(skip(self, args))]
    pub async fn ensure_dut(
        &self,
        hostname: &str,
        namespace: &str,
        zone: &str,
        rack: &str,
        servo: &str,
        args: &Flagmap,
    ) -> Result<Ensured, Error> {
        self.ensure("dut", hostname, namespace, || {
            let mut flags = args.clone();
            flag(&mut flags, "name", hostname);
            flag(&mut flags, "servo", servo);
            flag(&mut flags, "rack", rack);
            flag(&mut flags, "zone", zone);
            Ok(flags)
        })
        .await
    }
}
