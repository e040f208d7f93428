use thiserror::Error;

/// Errors surfaced by the engine core. Config-file parsing errors are
/// deliberately not represented here — `sentinel-config` owns those and
/// hands the core a resolved, already-validated object graph.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("retention snapshot error: {0}")]
    Retention(#[from] Box<bincode::ErrorKind>),

    #[error("unknown object reference: {0}")]
    UnknownReference(String),

    #[error("cyclic reference detected: {0}")]
    CyclicReference(String),

    #[error("connector framing error: {0}")]
    ConnectorFraming(String),

    #[error("connector helper process error: {0}")]
    ConnectorProcess(String),

    #[error("plugin execution error: {0}")]
    Execution(String),

    #[error("invalid external command: {0}")]
    InvalidCommand(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
