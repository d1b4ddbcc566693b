//! Engine settings
//!
//! Settings that change how a pipeline executes without changing what it
//! computes. They travel inside project files and can also be kept in a
//! standalone TOML file:
//!
//! ```toml
//! key_separator = "|"
//! parallel_branches = true
//! ```
//!
//! Missing keys take their defaults.

use crate::error::{DataForgeError, Result};
use crate::pipeline::node::DEFAULT_KEY_SEPARATOR;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Execution settings for a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Separator used to build composite group, pivot and de-duplication
    /// keys. Values containing it can collide.
    pub key_separator: String,

    /// Run independent nodes of the same dependency level on scoped threads
    pub parallel_branches: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            key_separator: default_key_separator(),
            parallel_branches: false,
        }
    }
}

fn default_key_separator() -> String {
    DEFAULT_KEY_SEPARATOR.to_string()
}

impl EngineSettings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable parallel branch execution
    pub fn with_parallel_branches(mut self, enabled: bool) -> Self {
        self.parallel_branches = enabled;
        self
    }

    /// Use a different composite key separator
    pub fn with_key_separator(mut self, separator: impl Into<String>) -> Self {
        self.key_separator = separator.into();
        self
    }

    /// Check the settings for values the engine cannot use
    pub fn validate(&self) -> Result<()> {
        if self.key_separator.is_empty() {
            return Err(DataForgeError::Config(
                "key_separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)
            .map_err(|e| DataForgeError::Config(format!("Failed to parse settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize settings to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DataForgeError::Serialization(format!("Failed to serialize settings: {}", e)))
    }

    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataForgeError::Config(format!("Failed to read settings file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load settings, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load engine settings, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save settings to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DataForgeError::Config(format!("Failed to create settings directory: {}", e))
            })?;
        }
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| {
            DataForgeError::Config(format!("Failed to write settings file {:?}: {}", path, e))
        })
    }
}
