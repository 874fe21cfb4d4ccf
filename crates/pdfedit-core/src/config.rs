//! Editor configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file
//! at all) yields [`EditorConfig::default`].

use crate::error::EditorError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Maximum number of undo snapshots kept
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Maximum length of the recent-files list
    #[serde(default = "default_max_recent_files")]
    pub max_recent_files: usize,
    /// Snap grid in document units; zero disables snapping
    #[serde(default = "default_grid_size")]
    pub grid_size: f64,
    /// Storage key the recent-files list is persisted under
    #[serde(default = "default_recent_files_key")]
    pub recent_files_key: String,
}

impl EditorConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::ConfigError`] if the file cannot be read or the
    /// TOML is malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EditorError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EditorError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// ```
    /// use pdfedit_core::config::EditorConfig;
    ///
    /// let config = EditorConfig::from_toml_str("max_history = 20").unwrap();
    /// assert_eq!(config.max_history, 20);
    /// assert_eq!(config.max_recent_files, 10);
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, EditorError> {
        toml::from_str(s).map_err(|e| EditorError::ConfigError(e.to_string()))
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            max_recent_files: default_max_recent_files(),
            grid_size: default_grid_size(),
            recent_files_key: default_recent_files_key(),
        }
    }
}

fn default_max_history() -> usize {
    50
}

fn default_max_recent_files() -> usize {
    10
}

fn default_grid_size() -> f64 {
    10.0
}

fn default_recent_files_key() -> String {
    "pdfedit-recent-files".to_string()
}
