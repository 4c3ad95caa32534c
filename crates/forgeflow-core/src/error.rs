use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("environment variable {0} is not set")]
    MissingEnv(String),

    #[error("input '{0}' is not a valid boolean (expected true or false)")]
    InvalidBoolInput(String),

    #[error("unable to allocate a unique temporary file name")]
    TempFileExhausted,

    #[error("failed to parse event payload: {0}")]
    EventPayload(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
