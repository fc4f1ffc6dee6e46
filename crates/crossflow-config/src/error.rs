//! Error types for configuration operations.

use std::path::PathBuf;

use crossflow_core::{CompositionError, FlowError, PresetError, RuntimeError, SchemaError};
use thiserror::Error;

/// Errors that can occur while loading a flow or running it.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A flow-level setting is missing or out of range
    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting {
        /// Setting key.
        key: &'static str,
        /// Description of the problem.
        reason: String,
    },

    /// Class descriptions could not be built
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The network could not be built, or a variable lookup failed
    #[error(transparent)]
    Composition(#[from] CompositionError),

    /// A preset could not be applied
    #[error(transparent)]
    Preset(#[from] PresetError),

    /// A proc failed while running
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid setting error.
    pub fn invalid_setting(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidSetting {
            key,
            reason: reason.into(),
        }
    }
}

impl From<FlowError> for ConfigError {
    fn from(e: FlowError) -> Self {
        match e {
            FlowError::Schema(e) => ConfigError::Schema(e),
            FlowError::Composition(e) => ConfigError::Composition(e),
            FlowError::Preset(e) => ConfigError::Preset(e),
            FlowError::Runtime(e) => ConfigError::Runtime(e),
        }
    }
}
