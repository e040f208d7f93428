use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown reference: {0}")]
    UnknownReference(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Engine(#[from] sentinel_core::EngineError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
