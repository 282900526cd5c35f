//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Configuration, tracing setup, and time helpers shared by the workspace."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use r_swarm_msg::ProcessingMode;
use r_swarm_rt::{ComponentSettings, ThreadPriority};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use tracing::debug;

use crate::logging::LogFormat;

fn default_vehicle_id() -> i64 {
    -1
}

fn default_flight() -> Vec<String> {
    vec!["flightless".to_owned()]
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

/// Primary configuration object for an R-Swarm vehicle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub vehicle: VehicleConfig,
    #[serde(default)]
    pub modules: ModulesConfig,
    #[serde(default)]
    pub components: IndexMap<String, ComponentConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "R_SWARM_CONFIG";

    /// Locations searched when no explicit path is given.
    pub const DEFAULT_CANDIDATES: [&str; 3] = [
        "r-swarm.toml",
        "configs/r-swarm.toml",
        "/etc/r-swarm/r-swarm.toml",
    ];

    /// Load configuration from disk, respecting the `R_SWARM_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Read and validate a single file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Per-component section for `id`, or the defaults.
    pub fn component(&self, id: &str) -> ComponentConfig {
        self.components.get(id).cloned().unwrap_or_default()
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for id in self.modules.ids() {
            if id.trim().is_empty() {
                return Err(anyhow!("module ids must not be empty"));
            }
            if !seen.insert(id) {
                return Err(anyhow!("module '{}' is listed more than once", id));
            }
        }
        if seen.is_empty() {
            return Err(anyhow!("configuration must enable at least one module"));
        }
        if self.modules.flight.len() > 1 {
            return Err(anyhow!(
                "at most one flight backend may be enabled, found {}",
                self.modules.flight.len()
            ));
        }
        for (id, component) in &self.components {
            if id.trim().is_empty() {
                return Err(anyhow!("component sections need a non-empty id"));
            }
            if component.error_threshold == Some(0) {
                return Err(anyhow!("component '{}' needs an error threshold above zero", id));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Identity and home position of the vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleConfig {
    #[serde(default = "default_vehicle_id")]
    pub id: i64,
    #[serde(default)]
    pub descriptor: String,
    #[serde(default)]
    pub home: [f64; 3],
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            id: default_vehicle_id(),
            descriptor: String::new(),
            home: [0.0; 3],
        }
    }
}

/// Registry ids to instantiate, grouped by role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulesConfig {
    #[serde(default = "default_flight")]
    pub flight: Vec<String>,
    #[serde(default)]
    pub evaluators: Vec<String>,
    #[serde(default)]
    pub controllers: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub communication: Vec<String>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            flight: default_flight(),
            evaluators: Vec::new(),
            controllers: Vec::new(),
            channels: Vec::new(),
            communication: Vec::new(),
        }
    }
}

impl ModulesConfig {
    /// Every id in start order: flight, evaluators, controllers, channels,
    /// then communication.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.flight
            .iter()
            .chain(&self.evaluators)
            .chain(&self.controllers)
            .chain(&self.channels)
            .chain(&self.communication)
            .map(String::as_str)
    }
}

/// `[components.<id>]`: runtime settings plus free-form factory arguments.
///
/// An `interval` of zero disables the idle tick; the component then only
/// wakes for events.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ComponentConfig {
    #[serde(default)]
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub interval: Option<Duration>,
    #[serde(default)]
    pub priority: Option<ThreadPriority>,
    #[serde(default)]
    pub mode: Option<ProcessingMode>,
    #[serde(default)]
    pub error_threshold: Option<u32>,
    #[serde(flatten)]
    pub args: toml::Table,
}

impl ComponentConfig {
    /// Overlay the configured values on a component's default settings.
    pub fn apply(&self, mut settings: ComponentSettings) -> ComponentSettings {
        if let Some(interval) = self.interval {
            settings.interval = (!interval.is_zero()).then_some(interval);
        }
        if let Some(priority) = self.priority {
            settings.priority = priority;
        }
        if let Some(mode) = self.mode {
            settings.mode = mode;
        }
        if let Some(threshold) = self.error_threshold {
            settings.error_threshold = threshold;
        }
        settings
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub dump_path: Option<PathBuf>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            dump_path: None,
        }
    }
}
