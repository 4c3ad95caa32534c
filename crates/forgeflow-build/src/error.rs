use forgeflow_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(
        "Depot CLI is not installed. Run a setup step (e.g. depot/setup-action) before this one."
    )]
    BuilderNotInstalled,

    #[error("command not found on PATH: {0}")]
    CommandNotFound(String),

    #[error("failed with: {0}")]
    BuildFailed(String),

    #[error("{0} exited with a non-zero status")]
    CommandFailed(String),

    #[error("invalid secret '{0}' (expected KEY=VALUE)")]
    InvalidSecret(String),

    #[error("secret file not found: {0}")]
    SecretFileNotFound(String),

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("failed to render build context template: {0}")]
    Template(#[from] tera::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
