//! Optional `galena.toml` configuration.
//!
//! ```toml
//! [sim]
//! max_combinations = 256
//! ```
//!
//! CLI flags override file values; a missing file just means defaults.

use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// The default truth-table row limit.
pub const DEFAULT_MAX_COMBINATIONS: usize = 256;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Simulation settings.
    #[serde(default)]
    pub sim: SimSection,
}

/// The `[sim]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimSection {
    /// Truth-table row limit when no flag is given.
    pub max_combinations: usize,
}

impl Default for SimSection {
    fn default() -> Self {
        Self {
            max_combinations: DEFAULT_MAX_COMBINATIONS,
        }
    }
}

/// Configuration loading failures.
#[derive(Debug)]
pub enum ConfigError {
    /// The named file could not be read.
    Io(String, std::io::Error),
    /// The file is not valid TOML for [`Config`].
    Parse(String, toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "failed to read {path}: {e}"),
            ConfigError::Parse(path, e) => write!(f, "invalid config {path}: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Loads configuration from an explicit path, or from `galena.toml` in
/// the working directory if present, or falls back to defaults.
pub fn load(explicit: Option<&str>) -> Result<Config, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_string(),
        None => {
            if Path::new("galena.toml").is_file() {
                "galena.toml".to_string()
            } else {
                return Ok(Config::default());
            }
        }
    };
    let text =
        std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(path.clone(), e))?;
    toml::from_str(&text).map_err(|e| ConfigError::Parse(path, e))
}
