//! Engine configuration loading.
//!
//! The file is optional; flags given on the command line win over it.

use std::path::{Path, PathBuf};
use trellis_runtime::{EngineConfig, EngineMode};

/// Errors loading an engine config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid engine config
    #[error("invalid config {path}: {source}")]
    Parse {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

/// Command-line settings that override the file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOverrides {
    /// `--concurrent`
    pub concurrent: bool,
    /// `--concurrency N`
    pub max_concurrency: Option<usize>,
}

/// Load the engine config, falling back to defaults without a file
pub fn load(path: Option<&Path>, overrides: EngineOverrides) -> Result<EngineConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        }
        None => EngineConfig::default(),
    };

    if overrides.concurrent {
        config.mode = EngineMode::Concurrent;
    }
    if let Some(limit) = overrides.max_concurrency {
        config.max_concurrency = limit;
    }
    Ok(config)
}
