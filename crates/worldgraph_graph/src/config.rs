// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration and per-graph generation settings.
//!
//! Configuration is stored as RON so it can be edited by hand next to the
//! graphs it drives.

use crate::graph::GraphMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Current configuration format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Errors while loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid RON for this format
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serializing failed
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// The file was written by a newer version
    #[error("Config version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Newest supported version
        supported: u32,
    },
}

/// Generation settings shared by every node of a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Random seed
    pub seed: i32,
    /// Edge length of a generated chunk
    pub chunk_size: u32,
    /// World position of the chunk being generated
    pub chunk_position: [f32; 3],
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            chunk_size: 16,
            chunk_position: [0.0, 0.0, 0.0],
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Format version
    pub version: u32,
    /// Execution mode for graphs built from this config
    pub mode: GraphMode,
    /// Generation settings
    pub settings: GraphSettings,
    /// Number of full passes to run
    pub passes: u32,
    /// Default log filter directive
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            mode: GraphMode::Interactive,
            settings: GraphSettings::default(),
            passes: 1,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from RON text
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::from_str(text)?;

        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }

        Ok(config)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Save to a config file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}
