//! Configuration for loading and analysis.
//!
//! Every knob has a default, so `Config::default()` is a working setup and a
//! JSON file only needs the keys it changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Dump loader settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Regions larger than this are file-backed in eager mode.
    pub eager_file_backed_threshold: u64,
    /// Regions larger than this are file-backed in lazy mode.
    pub lazy_file_backed_threshold: u64,
    /// Name of the index member inside the container.
    pub index_entry_name: String,
    /// Substring that marks region content members.
    pub range_marker: String,
    /// Permissions given to regions loaded from an index, which records none.
    pub default_permissions: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            eager_file_backed_threshold: 1_000_000,
            lazy_file_backed_threshold: 10_000_000,
            index_entry_name: "mappings".to_string(),
            range_marker: "-0x".to_string(),
            default_permissions: "rwx-".to_string(),
        }
    }
}

/// Field analyzer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// A word is a small unsigned integer below this value, or a small
    /// negative one above `2^(8 * word_size) - small_int_threshold`.
    pub small_int_threshold: u64,
    /// Shortest printable run reported as an ASCII string.
    pub min_ascii_len: usize,
    /// Fewest code units reported as a UTF-16 string.
    pub min_utf16_chars: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            small_int_threshold: 0xFFFF,
            min_ascii_len: 4,
            min_utf16_chars: 4,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loader: LoaderConfig,
    pub analyzer: AnalyzerConfig,
}

impl Config {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check values serde cannot check by itself.
    pub fn validate(&self) -> Result<()> {
        if self.loader.index_entry_name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "loader.index_entry_name",
                reason: "must not be empty".to_string(),
            });
        }
        if self.loader.range_marker.is_empty() {
            return Err(ConfigError::Invalid {
                field: "loader.range_marker",
                reason: "must not be empty".to_string(),
            });
        }
        if let Err(e) = self
            .loader
            .default_permissions
            .parse::<crate::mappings::Perms>()
        {
            return Err(ConfigError::Invalid {
                field: "loader.default_permissions",
                reason: e.to_string(),
            });
        }
        if self.analyzer.small_int_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "analyzer.small_int_threshold",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
