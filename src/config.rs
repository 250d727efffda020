//! Explorer configuration.
//!
//! Every field has a default matching the published dataset, so a config
//! file only needs the values it changes.

use crate::core::period::CalendarMonth;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors arising from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables shared by the normalizer, the aggregation engine and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// First month covered by the dataset; default for an absent start.
    pub dataset_start: CalendarMonth,
    /// Last month covered by the dataset; default for an absent end.
    pub dataset_end: CalendarMonth,
    /// Edges kept by the flow graph builder when the caller gives no limit.
    pub default_top_k: usize,
    /// Rows returned by the corridor ranking when the caller gives no limit.
    pub default_corridor_limit: usize,
    /// Window, in periods, of the short corridor rolling average.
    pub rolling_window: usize,
    /// Window, in periods, of the long corridor rolling average.
    pub long_rolling_window: usize,
    /// Trailing points fitted by the corridor trend slope.
    pub trend_window: usize,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            dataset_start: CalendarMonth::from_valid(2019, 1),
            dataset_end: CalendarMonth::from_valid(2022, 12),
            default_top_k: 10,
            default_corridor_limit: 20,
            rolling_window: 3,
            long_rolling_window: 6,
            trend_window: 12,
        }
    }
}

impl ExplorerConfig {
    /// Load a JSON config file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: ExplorerConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dataset_start > self.dataset_end {
            return Err(ConfigError::Invalid(format!(
                "dataset_start {} is after dataset_end {}",
                self.dataset_start, self.dataset_end
            )));
        }
        if self.default_top_k == 0 {
            return Err(ConfigError::Invalid("default_top_k must be positive".into()));
        }
        if self.rolling_window == 0 {
            return Err(ConfigError::Invalid("rolling_window must be positive".into()));
        }
        if self.long_rolling_window < self.rolling_window {
            return Err(ConfigError::Invalid(format!(
                "long_rolling_window {} is shorter than rolling_window {}",
                self.long_rolling_window, self.rolling_window
            )));
        }
        if self.trend_window < 2 {
            return Err(ConfigError::Invalid("trend_window needs at least 2 points".into()));
        }
        Ok(())
    }
}
