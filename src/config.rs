use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::trace;

/// Locations of the two data files
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StorageConfig {
    /// Append-only observation log
    #[serde(default = "default_activity_log")]
    pub activity_log: PathBuf,

    /// Tracked host registry
    #[serde(default = "default_host_registry")]
    pub host_registry: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            activity_log: default_activity_log(),
            host_registry: default_host_registry(),
        }
    }
}

fn default_activity_log() -> PathBuf {
    PathBuf::from("data/activity-records.csv")
}

fn default_host_registry() -> PathBuf {
    PathBuf::from("data/servers.csv")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SchedulerConfig {
    /// Minimum age of a host's last check before it is polled again
    #[serde(default = "default_staleness_minutes")]
    pub staleness_minutes: u64,

    /// How often a poll cycle is started
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// How often the data files are copied to their `.bak` siblings
    #[serde(default = "default_backup_interval_hours")]
    pub backup_interval_hours: u64,

    /// Maximum hosts probed per cycle (upstream request-rate limit)
    #[serde(default = "default_rate_cap")]
    pub rate_cap: usize,
}

impl SchedulerConfig {
    pub fn staleness(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.staleness_minutes as i64)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_hours.max(1) * 3600)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            staleness_minutes: default_staleness_minutes(),
            poll_interval_secs: default_poll_interval_secs(),
            backup_interval_hours: default_backup_interval_hours(),
            rate_cap: default_rate_cap(),
        }
    }
}

fn default_staleness_minutes() -> u64 {
    5
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_backup_interval_hours() -> u64 {
    24
}

fn default_rate_cap() -> usize {
    5
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    String::from("https://api.mcstatus.io/v2")
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub probe: ProbeConfig,
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

/// Read `path` if given, otherwise fall back to the defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => read_config_file(path),
        None => {
            trace!("no config file given, using defaults");
            Ok(Config::default())
        }
    }
}
