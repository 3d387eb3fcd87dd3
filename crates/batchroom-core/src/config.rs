//! Batch configuration.
//!
//! Settings are read from TOML. Missing keys take their defaults, so an
//! empty file is a valid configuration:
//!
//! ```toml
//! concurrency_limit = 4
//! rotate_degrees = 90.0
//! default_quality = 1.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transform::DEFAULT_ROTATION;

/// Default number of transform units in flight at once.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

/// Errors reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this configuration.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be serialized.
    #[error("Could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Tunables for batch transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum transform units running at once (at least 1)
    pub concurrency_limit: usize,
    /// Clockwise degrees applied by "rotate"
    pub rotate_degrees: f64,
    /// Initial JPEG quality for resize, in [0.0, 1.0]
    pub default_quality: f32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            rotate_degrees: DEFAULT_ROTATION,
            default_quality: 1.0,
        }
    }
}

impl BatchConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML and normalize the result.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BatchConfig = toml::from_str(content)?;
        Ok(config.normalized())
    }

    /// Read and parse a TOML file.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Clamp values into their valid ranges.
    ///
    /// A zero concurrency limit becomes 1, quality is clamped into
    /// [0.0, 1.0], and non-finite values fall back to their defaults.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();

        self.concurrency_limit = self.concurrency_limit.max(1);
        if !self.rotate_degrees.is_finite() {
            self.rotate_degrees = defaults.rotate_degrees;
        }
        self.default_quality = if self.default_quality.is_finite() {
            self.default_quality.clamp(0.0, 1.0)
        } else {
            defaults.default_quality
        };
        self
    }
}
