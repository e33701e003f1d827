use bridge_table::names::{DEFAULT_SEGMENT_NAME, DEFAULT_SEMAPHORE_NAME, validate_name};
use bridge_table::table::DEFAULT_SHUFFLE_PASSES;
use bridge_table::{DealOptions, TableError, TableNames};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const MAX_SHUFFLE_PASSES: usize = 1_000;

/// Root configuration loaded from YAML. Every block is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default)]
    pub deal: DealConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: BridgeConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.table.validate()?;
        self.deal.validate()?;
        self.logging.normalize();
        if self.logging.level().is_none() {
            return Err(ValidationError::InvalidField {
                field: "logging.tracing_level".to_string(),
                message: format!("unknown level '{}'", self.logging.tracing_level),
            });
        }
        Ok(())
    }

    pub fn names(&self) -> Result<TableNames, TableError> {
        TableNames::new(self.table.segment.clone(), self.table.semaphore.clone())
    }

    pub fn deal_options(&self) -> DealOptions {
        DealOptions {
            seed: self.deal.seed,
            shuffle_passes: self.deal.shuffle_passes,
        }
    }
}

/// Names of the shared segment and the creation semaphore.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TableConfig {
    #[serde(default = "default_segment")]
    pub segment: String,
    #[serde(default = "default_semaphore")]
    pub semaphore: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            segment: default_segment(),
            semaphore: default_semaphore(),
        }
    }
}

impl TableConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        for (label, value) in [
            ("table.segment", &self.segment),
            ("table.semaphore", &self.semaphore),
        ] {
            validate_name(value).map_err(|err| ValidationError::InvalidField {
                field: label.to_string(),
                message: err.to_string(),
            })?;
        }
        if self.segment == self.semaphore {
            return Err(ValidationError::InvalidField {
                field: "table.semaphore".to_string(),
                message: "semaphore name must differ from the segment name".to_string(),
            });
        }
        Ok(())
    }
}

fn default_segment() -> String {
    DEFAULT_SEGMENT_NAME.to_string()
}

fn default_semaphore() -> String {
    DEFAULT_SEMAPHORE_NAME.to_string()
}

/// How the creating process shuffles. Joiners ignore this block.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DealConfig {
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_shuffle_passes")]
    pub shuffle_passes: usize,
}

impl Default for DealConfig {
    fn default() -> Self {
        Self {
            seed: None,
            shuffle_passes: DEFAULT_SHUFFLE_PASSES,
        }
    }
}

impl DealConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=MAX_SHUFFLE_PASSES).contains(&self.shuffle_passes) {
            return Err(ValidationError::InvalidField {
                field: "deal.shuffle_passes".to_string(),
                message: format!("must be between 1 and {MAX_SHUFFLE_PASSES}"),
            });
        }
        Ok(())
    }
}

fn default_shuffle_passes() -> usize {
    DEFAULT_SHUFFLE_PASSES
}

/// Logging goes to stderr unless `file` is set.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            tracing_level: default_tracing_level(),
            json: false,
            file: None,
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "warn".to_string()
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
