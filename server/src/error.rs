//! Error types for session construction and the network layer
//!
//! Only startup problems are fatal. Gameplay failures inside a running session
//! (unknown ids, late messages, attribution conflicts) are logged by the
//! service that hit them and never surface here.

use std::path::PathBuf;

/// A required resource is missing or malformed; the session cannot be created
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no {0} spawn points configured")]
    MissingSpawnPoints(&'static str),

    #[error("tick rate must be greater than zero")]
    InvalidTickRate,

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}
