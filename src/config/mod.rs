//! Application configuration.
//!
//! Loaded from YAML files and `TABLEWATCH__`-prefixed environment variables,
//! with a fallback to the flat `PROJECT_*` / `CLOUD_DB_*` variables of
//! existing deployments (see [`legacy`]).

mod connection;
pub mod legacy;

pub use connection::{ConnectionConfig, Dialect, ProjectConfig, SinkConfig};

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::sink::destination_table;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "tablewatch.yaml";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "TABLEWATCH";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "TABLEWATCH_LOG";
/// Seconds between the end of one cycle and the start of the next.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Poll loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Poll loop settings.
    pub poll: PollConfig,
    /// Metrics destination.
    pub sink: Option<SinkConfig>,
    /// Monitored projects, polled in this order.
    pub projects: Vec<ProjectConfig>,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `tablewatch.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (the binary's `--config`)
    /// 3. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load the structured configuration, falling back to the flat
    /// environment variables when it names no projects, then validate.
    pub fn resolve(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;

        if config.projects.is_empty() {
            let flat = legacy::from_env()?;
            config.projects = flat.projects;
            if config.sink.is_none() {
                config.sink = flat.sink;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the poller relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll.interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.sink.is_none() {
            return Err(ConfigError::Invalid("no sink configured".to_string()));
        }

        if self.projects.is_empty() {
            return Err(ConfigError::Invalid("no projects configured".to_string()));
        }

        let mut names = HashSet::new();
        let mut destinations = HashMap::new();
        for project in &self.projects {
            if project.name.trim().is_empty() {
                return Err(ConfigError::Invalid("project without a name".to_string()));
            }
            if !names.insert(project.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate project name: {}",
                    project.name
                )));
            }
            let destination = destination_table(&project.name);
            if let Some(other) = destinations.insert(destination, project.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "projects {} and {} write to the same destination table {}",
                    other,
                    project.name,
                    destination_table(&project.name)
                )));
            }
            if project.tables.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "project {} watches no tables",
                    project.name
                )));
            }
            if project.tables.iter().any(|t| t.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "project {} has an empty table name",
                    project.name
                )));
            }
            let mut tables = HashSet::new();
            if let Some(table) = project.tables.iter().find(|t| !tables.insert(t.as_str())) {
                return Err(ConfigError::Invalid(format!(
                    "project {} watches table {} more than once",
                    project.name, table
                )));
            }
        }

        Ok(())
    }
}
