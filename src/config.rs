use crate::error::{DataManagerError, Result};
use crate::expiry::RetentionPolicy;
use crate::logging::get_environment;
use config::{Config, Environment, File, FileFormat, FileSourceFile, Map};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `DATAMANAGER_LOG_EXPIRY_INTERVAL_SECS`.
pub const ENV_PREFIX: &str = "DATAMANAGER";

/// Base name of the optional config file looked up in the working directory.
pub const DEFAULT_CONFIG_NAME: &str = "datamanager";

/// Which log transport the runtime builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Plain,
    Memory,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataManagerConfig {
    pub environment: String,
    pub database_url: Option<String>,
    pub log_data_path: String,
    pub transport: TransportKind,
    pub transport_capacity: usize,
    pub log_expiry_interval_secs: u64,
    pub retention: RetentionPolicy,
}

impl Default for DataManagerConfig {
    fn default() -> Self {
        Self {
            environment: get_environment(),
            database_url: None,
            log_data_path: "./version".to_string(),
            transport: TransportKind::Plain,
            transport_capacity: 1000,
            log_expiry_interval_secs: 3600,
            retention: RetentionPolicy::default(),
        }
    }
}

impl DataManagerConfig {
    /// Load defaults, then the config file, then `DATAMANAGER_*` environment variables.
    ///
    /// With `path = None` an optional `datamanager.{toml,yaml,json}` in the working
    /// directory is used if present. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::layered(Some(config_file(path)), environment_source())
    }

    /// Like [`load`](Self::load), reading `DATAMANAGER_*` overrides from `vars` instead
    /// of the process environment.
    pub fn load_with_vars(path: Option<&Path>, vars: Map<String, String>) -> Result<Self> {
        Self::layered(Some(config_file(path)), environment_source().source(Some(vars)))
    }

    /// Defaults overridden by environment variables only.
    pub fn from_env() -> Result<Self> {
        Self::layered(None, environment_source())
    }

    fn layered(file: Option<File<FileSourceFile, FileFormat>>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(file) = file {
            builder = builder.add_source(file);
        }
        let config = builder
            .add_source(env)
            .build()?
            .try_deserialize::<Self>()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.log_expiry_interval_secs == 0 {
            return Err(DataManagerError::ConfigurationError(
                "log_expiry_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.log_data_path.trim().is_empty() {
            return Err(DataManagerError::ConfigurationError(
                "log_data_path must not be empty".to_string(),
            ));
        }
        if self.transport_capacity == 0 {
            return Err(DataManagerError::ConfigurationError(
                "transport_capacity must be greater than zero".to_string(),
            ));
        }
        if self.retention.outdate_days == 0 {
            return Err(DataManagerError::ConfigurationError(
                "retention.outdate_days must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn log_expiry_interval(&self) -> Duration {
        Duration::from_secs(self.log_expiry_interval_secs)
    }
}

fn config_file(path: Option<&Path>) -> File<FileSourceFile, FileFormat> {
    match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
    }
}

fn environment_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
