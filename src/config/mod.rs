//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod kpi;
mod storage;

pub use kpi::{
    AggregationFn, FilterValue, Frequency, KpiConfig, StaticParams, DEFAULT_FREQ,
    DEFAULT_MODEL_NAME, DEFAULT_PERIOD,
};
pub use storage::{PostgresConfig, SqliteConfig, StorageConfig, StorageType};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "kpiscope.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "KPISCOPE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "KPISCOPE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "KPISCOPE_LOG";

use serde::Deserialize;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unsupported frequency: {0} (expected H or D)")]
    UnsupportedFrequency(String),

    #[error("Unsupported aggregation: {0}")]
    UnsupportedAggregation(String),

    #[error("KPI {kpi_id}: field '{field}' must not be empty")]
    EmptyField { kpi_id: i64, field: &'static str },

    #[error("KPI {kpi_id}: period must be greater than zero")]
    ZeroPeriod { kpi_id: i64 },

    #[error("KPI {kpi_id}: dimension '{dimension}' listed more than once")]
    DuplicateDimension { kpi_id: i64, dimension: String },

    #[error("KPI id {0} defined more than once")]
    DuplicateKpi(i64),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration source error: {0}")]
    Source(#[from] ::config::ConfigError),
}

/// Detection run options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Debug mode: only the first `debug_subgroup_limit` subgroups are run.
    pub debug: bool,
    pub debug_subgroup_limit: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            debug: false,
            debug_subgroup_limit: 5,
        }
    }
}

impl DetectionConfig {
    /// Subgroup cap for a run, if any.
    pub fn subgroup_limit(&self) -> Option<usize> {
        self.debug.then_some(self.debug_subgroup_limit)
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage for anomaly output and RCA snapshots.
    pub storage: StorageConfig,
    /// Detection run options.
    pub detection: DetectionConfig,
    /// KPI definitions.
    pub kpis: Vec<KpiConfig>,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `kpiscope.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every KPI and reject duplicate ids.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = std::collections::HashSet::new();
        for kpi in &self.kpis {
            kpi.validate()?;
            if !ids.insert(kpi.id) {
                return Err(ConfigError::DuplicateKpi(kpi.id));
            }
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self {
            storage: StorageConfig {
                sqlite: SqliteConfig {
                    path: ":memory:".to_string(),
                },
                ..StorageConfig::default()
            },
            ..Self::default()
        }
    }
}
