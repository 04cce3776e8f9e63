//! Host records of the DNS container.
//!
//! The DNS server on a satlab appliance runs in its own container and serves
//! the hosts file at [`DnsConfig::hosts_path`]. Updates rewrite that file in
//! place, keep a backup next to it, and signal the server to reread it.
//! Callers get the pre-update content back so they can restore it when a
//! later step fails.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{event, instrument, Level};

use crate::config::DnsConfig;
use crate::error::Error;
use crate::process;

/// Result of a command run inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Access to the DNS container. `Err` means the command could not be run at
/// all; a command that ran and failed is reported through [`ExecOutput`].
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn exec(&self, container: &str, argv: &[&str]) -> Result<ExecOutput, Error>;

    /// Copy the local file `source` to `dest` inside `container`.
    async fn copy_into(&self, container: &str, source: &Path, dest: &str) -> Result<(), Error>;
}

#[derive(Debug, Clone)]
pub struct Docker {
    binary: std::path::PathBuf,
    timeout: Duration,
}

impl Docker {
    pub fn new(binary: impl Into<std::path::PathBuf>, timeout: Duration) -> Self {
        Docker {
            binary: binary.into(),
            timeout,
        }
    }

    async fn run(&self, container: &str, command: Command) -> Result<std::process::Output, Error> {
        let description = process::describe(&command);
        process::output(command, self.timeout)
            .await
            .map_err(|e| Error::ContainerExec {
                container: container.to_string(),
                command: description,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl ContainerRuntime for Docker {
    async fn exec(&self, container: &str, argv: &[&str]) -> Result<ExecOutput, Error> {
        let mut command = Command::new(&self.binary);
        command.arg("exec").arg(container).args(argv);
        let output = self.run(container, command).await?;
        Ok(ExecOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn copy_into(&self, container: &str, source: &Path, dest: &str) -> Result<(), Error> {
        let mut command = Command::new(&self.binary);
        command
            .arg("cp")
            .arg(source)
            .arg(format!("{container}:{dest}"));
        let description = process::describe(&command);
        let output = self.run(container, command).await?;
        if !output.status.success() {
            return Err(Error::ContainerExec {
                container: container.to_string(),
                command: description,
                message: process::failure_message(&output),
            });
        }
        Ok(())
    }
}

/// The hosts file as it was before an update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostsSnapshot {
    pub content: String,
    /// Whether the file existed at all.
    pub existed: bool,
}

impl HostsSnapshot {
    /// Restoring an empty file could discard records written since, so only
    /// non-empty content is ever restored.
    pub fn restorable(&self) -> bool {
        !self.content.is_empty()
    }
}

/// A failed update. `snapshot` is set once the original file was read.
#[derive(Debug)]
pub struct DnsUpdateFailure {
    pub snapshot: Option<HostsSnapshot>,
    pub error: Error,
}

impl DnsUpdateFailure {
    fn before_read(error: Error) -> Self {
        DnsUpdateFailure {
            snapshot: None,
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    Keep,
    /// Replace the line with a record for this host.
    Modify(String),
    /// Drop a repeated record for a host being updated.
    Reject,
}

/// Decide what happens to one line of the hosts file. `seen` collects the
/// updated hosts already encountered.
pub fn classify(
    line: &str,
    records: &BTreeMap<String, String>,
    seen: &mut HashSet<String>,
) -> LineAction {
    let mut fields = line.split_whitespace();
    let Some(first) = fields.next() else {
        return LineAction::Keep;
    };
    if first.starts_with('#') {
        return LineAction::Keep;
    }
    match fields.next() {
        Some(host) if records.contains_key(host) => {
            if seen.insert(host.to_string()) {
                LineAction::Modify(host.to_string())
            } else {
                LineAction::Reject
            }
        }
        _ => LineAction::Keep,
    }
}

/// Point every host in `records` at its address. Hosts without a record in
/// `content` get one appended.
pub fn rewrite_hosts(content: &str, records: &BTreeMap<String, String>) -> String {
    let mut seen = HashSet::new();
    let mut lines: Vec<String> = Vec::new();
    for line in content.split_terminator('\n') {
        match classify(line, records, &mut seen) {
            LineAction::Keep => lines.push(line.to_string()),
            LineAction::Modify(host) => lines.push(format!("{}\t{host}", records[&host])),
            LineAction::Reject => {}
        }
    }
    for (host, address) in records {
        if !seen.contains(host) {
            lines.push(format!("{address}\t{host}"));
        }
    }

    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

pub struct DnsMutator {
    runtime: Arc<dyn ContainerRuntime>,
    config: DnsConfig,
}

impl DnsMutator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: DnsConfig) -> Self {
        DnsMutator { runtime, config }
    }

    fn exec_error(&self, argv: &[&str], message: String) -> Error {
        Error::ContainerExec {
            container: self.config.container.clone(),
            command: argv.join(" "),
            message,
        }
    }

    /// Run `argv` in the container, failing unless it succeeds.
    async fn exec_checked(&self, argv: &[&str]) -> Result<String, Error> {
        let output = self.runtime.exec(&self.config.container, argv).await?;
        if !output.success {
            return Err(self.exec_error(argv, output.stderr.trim().to_string()));
        }
        Ok(output.stdout)
    }

    /// Read the hosts file. A missing file reads as empty.
    #[instrument(skip(self), fields(container = %self.config.container))]
    pub async fn read(&self) -> Result<HostsSnapshot, Error> {
        let path = self.config.hosts_path.as_str();
        let exists = ["test", "-e", path];
        let output = self.runtime.exec(&self.config.container, &exists).await?;
        if !output.success {
            if !output.stderr.trim().is_empty() {
                return Err(self.exec_error(&exists, output.stderr.trim().to_string()));
            }
            event!(Level::DEBUG, %path, "Hosts file does not exist");
            return Ok(HostsSnapshot {
                content: String::new(),
                existed: false,
            });
        }
        let content = self.exec_checked(&["cat", path]).await?;
        Ok(HostsSnapshot {
            content,
            existed: true,
        })
    }

    /// Replace the file at `dest` in the container with `content`.
    async fn write_file(&self, dest: &str, content: &str) -> Result<(), Error> {
        let mut staged = tempfile::NamedTempFile::new()?;
        staged.write_all(content.as_bytes())?;
        staged.flush()?;
        std::fs::set_permissions(staged.path(), std::fs::Permissions::from_mode(0o644))?;
        self.runtime
            .copy_into(&self.config.container, staged.path(), dest)
            .await
    }

    /// Make `hostname` resolve to `address`. Returns the file as it was
    /// before the update.
    pub async fn update_record(
        &self,
        hostname: &str,
        address: &str,
    ) -> Result<HostsSnapshot, DnsUpdateFailure> {
        if hostname.is_empty() {
            return Err(DnsUpdateFailure::before_read(Error::EmptyInput("hostname")));
        }
        if address.is_empty() {
            return Err(DnsUpdateFailure::before_read(Error::EmptyInput("address")));
        }
        let records = BTreeMap::from([(hostname.to_string(), address.to_string())]);
        self.update_records(&records).await
    }

    #[instrument(skip(self), fields(container = %self.config.container))]
    pub async fn update_records(
        &self,
        records: &BTreeMap<String, String>,
    ) -> Result<HostsSnapshot, DnsUpdateFailure> {
        let snapshot = self.read().await.map_err(DnsUpdateFailure::before_read)?;

        let result = async {
            self.write_file(&self.config.backup_path, &snapshot.content)
                .await?;
            let updated = rewrite_hosts(&snapshot.content, records);
            self.write_file(&self.config.hosts_path, &updated).await?;
            self.force_reload().await
        }
        .await;

        match result {
            Ok(()) => {
                event!(Level::INFO, hosts = ?records.keys().collect::<Vec<_>>(), "Updated DNS records");
                Ok(snapshot)
            }
            Err(error) => Err(DnsUpdateFailure {
                snapshot: Some(snapshot),
                error,
            }),
        }
    }

    /// Overwrite the hosts file with `content`.
    #[instrument(skip(self, content), fields(container = %self.config.container))]
    pub async fn set_content(&self, content: &str) -> Result<(), Error> {
        self.write_file(&self.config.hosts_path, content).await
    }

    /// Signal the DNS server to reread its hosts file.
    pub async fn force_reload(&self) -> Result<(), Error> {
        let signal = format!("-{}", self.config.reload_signal);
        self.exec_checked(&["killall", signal.as_str(), self.config.daemon.as_str()])
            .await?;
        event!(Level::DEBUG, daemon = %self.config.daemon, "Reloaded DNS server");
        Ok(())
    }
}
