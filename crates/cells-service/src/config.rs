//! Configuration for cells

use cells_gate::RateGateConfig;
use cells_links::LinkConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellsConfig {
    /// Where the group and link tables live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-action rate limits
    #[serde(default)]
    pub rate_limits: RateGateConfig,

    /// Door link behaviour
    #[serde(default)]
    pub doors: LinkConfig,

    #[serde(default)]
    pub teleport: TeleportConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CellsConfig {
    /// Load configuration from defaults, an optional file and `CELLS__`
    /// environment variables (`CELLS__TELEPORT__DEFAULT_COST=25`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&CellsConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CELLS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_groups_file")]
    pub groups_file: String,

    #[serde(default = "default_links_file")]
    pub links_file: String,
}

impl StorageConfig {
    pub fn groups_path(&self) -> PathBuf {
        self.data_dir.join(&self.groups_file)
    }

    pub fn links_path(&self) -> PathBuf {
        self.data_dir.join(&self.links_file)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            groups_file: default_groups_file(),
            links_file: default_links_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleportConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cost used when no group defines one
    #[serde(default)]
    pub default_cost: f64,

    #[serde(default = "default_teleport_cooldown")]
    pub cooldown_secs: u64,

    /// Groups whose teleports are always free
    #[serde(default)]
    pub free_groups: Vec<String>,
}

impl TeleportConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn is_free(&self, group: &str) -> bool {
        self.free_groups.iter().any(|g| g.eq_ignore_ascii_case(group))
    }
}

impl Default for TeleportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_cost: 0.0,
            cooldown_secs: default_teleport_cooldown(),
            free_groups: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Run the periodic scheduler
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_reconcile_interval")]
    pub interval_secs: u64,

    /// Run a full sync as soon as the scheduler starts
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

impl ReconcileConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_reconcile_interval(),
            run_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_groups_file() -> String {
    "groups.yml".to_string()
}

fn default_links_file() -> String {
    "doors.yml".to_string()
}

fn default_teleport_cooldown() -> u64 {
    30
}

fn default_reconcile_interval() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}
