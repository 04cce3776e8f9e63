use fleet_rs::config::{ConfigError, FleetConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "satlab";
pub const ENV_PREFIX: &str = "SATLAB_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SatlabConfig {
    /// Inventory and build service settings shared with `fleet`.
    pub fleet: FleetConfig,
    pub site: SiteConfig,
    pub dns: DnsConfig,
    pub inventory: InventoryCliConfig,
    pub process: ProcessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Prefix of every qualified name, followed by the satlab ID.
    pub prefix: String,
    /// Prints the satlab ID of this appliance.
    pub identifier_script: PathBuf,
    pub default_zone: String,
    pub namespace: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            prefix: "satlab".to_string(),
            identifier_script: PathBuf::from("/usr/local/bin/get_host_identifier"),
            default_zone: "ZONE_SATLAB".to_string(),
            namespace: "os".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Container running the DNS server.
    pub container: String,
    /// Host records file inside the container.
    pub hosts_path: String,
    pub backup_path: String,
    pub docker_binary: PathBuf,
    /// Process inside the container that is signalled to reload.
    pub daemon: String,
    pub reload_signal: String,
}

impl Default for DnsConfig {
    fn default() -> Self {
        DnsConfig {
            container: "dns".to_string(),
            hosts_path: "/etc/dut_hosts/hosts".to_string(),
            backup_path: "/etc/dut_hosts/hosts.BAK".to_string(),
            docker_binary: PathBuf::from("docker"),
            daemon: "dnsmasq".to_string(),
            reload_signal: "HUP".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryCliConfig {
    /// The `fleet` executable used for inventory reads and writes.
    pub fleet_binary: PathBuf,
}

impl Default for InventoryCliConfig {
    fn default() -> Self {
        InventoryCliConfig {
            fleet_binary: PathBuf::from("fleet"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Upper bound on every subprocess.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        ProcessConfig {
            timeout: Duration::from_secs(5 * 60),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<SatlabConfig, ConfigError> {
    fleet_rs::config::load(APP_NAME, path, ENV_PREFIX)
}

#[cfg(test)]
mod test {
    use super::*;
    use figment::providers::{Format, Serialized, Toml};
    use figment::Figment;

    #[test]
    fn test_nested_overrides() {
        let config: SatlabConfig = Figment::from(Serialized::defaults(SatlabConfig::default()))
            .merge(Toml::string(
                r#"
                [site]
                prefix = "lab"

                [fleet.build]
                bucket = "staging"

                [process]
                timeout = "30s"
                "#,
            ))
            .extract()
            .unwrap();
        assert_eq!(config.site.prefix, "lab");
        assert_eq!(config.site.namespace, "os");
        assert_eq!(config.fleet.build.bucket, "staging");
        assert_eq!(config.dns.hosts_path, "/etc/dut_hosts/hosts");
        assert_eq!(config.process.timeout, Duration::from_secs(30));
    }
}
