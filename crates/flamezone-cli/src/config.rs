//! Configuration file support for flamezone.
//!
//! Settings live in `.flamezone/config.toml`. Discovery searches for that file
//! starting from the current directory and walking up to parent directories.
//! Every section is optional and falls back to its defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The flamezone data directory name.
pub const FLAMEZONE_DIR: &str = ".flamezone";
/// The config file name within the flamezone directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Trace file settings.
    pub output: OutputConfig,
    /// Synthetic workload settings.
    pub workload: WorkloadConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
    /// Metadata entries written into every trace, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataEntry>,
}

/// Trace file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path of the trace file.
    pub path: PathBuf,
    /// Indent the JSON document.
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(flamezone::DEFAULT_OUTPUT),
            pretty: true,
        }
    }
}

/// Workload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Number of worker threads.
    pub threads: usize,
    /// Zones opened by each worker.
    pub zones_per_thread: usize,
    /// Time spent inside each zone.
    pub zone_duration_ms: u64,
    /// Category attached to every zone.
    pub category: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            zones_per_thread: 16,
            zone_duration_ms: 1,
            category: "workload".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily rotated log files. Logs go to stderr when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// A metadata entry from the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MetadataEntry {
    pub title: String,
    pub value: String,
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Find and load configuration from current or parent directories.
    pub fn find_and_load() -> Result<Option<(Self, PathBuf)>> {
        let current = std::env::current_dir()?;
        Self::find_and_load_from(&current)
    }

    /// Find and load configuration starting from a specific directory.
    ///
    /// Returns the config and the `.flamezone` directory it was found in.
    pub fn find_and_load_from(start: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start.to_path_buf();

        loop {
            let flamezone_dir = dir.join(FLAMEZONE_DIR);
            let config_path = flamezone_dir.join(CONFIG_FILE);
            if config_path.exists() {
                let config = Self::from_file(&config_path)?;
                return Ok(Some((config, flamezone_dir)));
            }

            if !dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Validate the configuration.
    ///
    /// Returns a list of validation errors if any are found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.output.path.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "output.path".to_string(),
                message: "Output path cannot be empty.".to_string(),
            });
        }

        if self.workload.threads == 0 {
            errors.push(ConfigValidationError {
                field: "workload.threads".to_string(),
                message: "At least one worker thread is required.".to_string(),
            });
        }

        if self.workload.category.is_empty() {
            errors.push(ConfigValidationError {
                field: "workload.category".to_string(),
                message: "Category cannot be empty.".to_string(),
            });
        }

        for (i, entry) in self.metadata.iter().enumerate() {
            if entry.title.is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("metadata[{i}].title"),
                    message: "Metadata title cannot be empty.".to_string(),
                });
            }
        }

        errors
    }
}

/// Configuration validation error.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}
