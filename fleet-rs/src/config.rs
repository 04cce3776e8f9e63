use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use xdg::BaseDirectories;

use crate::api::buildbucket::BuilderId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Configuration for reaching the inventory service.
    pub inventory: InventoryConfig,
    /// Configuration for scheduling jobs on the build service.
    pub build: BuildConfig,
    /// Service hosts handed to the remote recipe.
    pub services: RecipeServices,
    /// Credential lookup.
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Host of the inventory service.
    pub host: String,
    /// Inventory namespace used when none is given on the command line.
    pub namespace: String,
    /// Per-request timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        InventoryConfig {
            host: "ufs.api.cr.dev".to_string(),
            namespace: "os".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Host of the build service.
    pub host: String,
    /// Host of the CI frontend that build URLs point to.
    pub ci_host: String,
    pub project: String,
    pub bucket: String,
    pub builder: String,
    /// Priority of scheduled jobs. Lower is more urgent.
    pub priority: i32,
    /// How long a job may wait for a bot before it expires.
    #[serde(with = "humantime_serde")]
    pub scheduling_timeout: Duration,
    /// How long a deploy job may run.
    #[serde(with = "humantime_serde")]
    pub execution_timeout: Duration,
    /// Per-request timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl BuildConfig {
    pub fn builder_id(&self) -> BuilderId {
        BuilderId {
            project: self.project.clone(),
            bucket: self.bucket.clone(),
            builder: self.builder.clone(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            host: "cr-buildbucket.appspot.com".to_string(),
            ci_host: "ci.chromium.org".to_string(),
            project: "chromeos".to_string(),
            bucket: "labpack".to_string(),
            builder: "labpack".to_string(),
            priority: crate::deploy::DEFAULT_PRIORITY,
            scheduling_timeout: Duration::from_secs(2 * 60 * 60),
            execution_timeout: Duration::from_secs(18000),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeServices {
    /// Admin RPC host the recipe talks to.
    pub admin: String,
    /// Inventory RPC host the recipe talks to.
    pub inventory: String,
}

impl Default for RecipeServices {
    fn default() -> Self {
        RecipeServices {
            admin: "chromeos-skylab-bot-fleet.appspot.com".to_string(),
            inventory: "ufs.api.cr.dev".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// File holding a bearer token. Overridden by `FLEET_TOKEN`.
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {0:?} does not exist")]
    MissingFile(PathBuf),
    #[error("failed to locate XDG directories: {0}")]
    Xdg(#[from] xdg::BaseDirectoriesError),
    #[error("failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
}

/// Load the configuration of tool `app`.
///
/// Layers, lowest precedence first: built-in defaults, the TOML file (the
/// explicit `path`, or `<app>/config.toml` in the XDG config directories if
/// there is one), then environment variables prefixed with `env_prefix`,
/// where `__` separates nested keys.
pub fn load<T>(app: &str, path: Option<&Path>, env_prefix: &str) -> Result<T, ConfigError>
where
    T: Serialize + DeserializeOwned + Default,
{
    let file = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => return Err(ConfigError::MissingFile(p.to_path_buf())),
        None => BaseDirectories::with_prefix(app)?.find_config_file("config.toml"),
    };

    let mut figment = Figment::from(Serialized::defaults(T::default()));
    if let Some(ref file) = file {
        tracing::debug!("Reading configuration from {}", file.display());
        figment = figment.merge(Toml::file(file));
    }
    figment
        .merge(Env::prefixed(env_prefix).split("__"))
        .extract()
        .map_err(|e| ConfigError::Extract(Box::new(e)))
}
