//! Error handling and custom error types
//!
//! `Error` covers setup and I/O failures across the crate. `UploadError` is the
//! per-file outcome of a single upload and never escapes a batch.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generic error: {0}")]
    Generic(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The batch was superseded or the controller was torn down.
    #[error("upload aborted")]
    Aborted,

    #[error("upload rejected (status {status}): {body}")]
    UploadRejected { status: u16, body: String },

    #[error("upload failed: {0}")]
    UploadFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadErrorKind {
    Aborted,
    UploadRejected,
    UploadFailed,
}

impl UploadError {
    pub fn kind(&self) -> UploadErrorKind {
        match self {
            UploadError::Aborted => UploadErrorKind::Aborted,
            UploadError::UploadRejected { .. } => UploadErrorKind::UploadRejected,
            UploadError::UploadFailed(_) => UploadErrorKind::UploadFailed,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, UploadError::Aborted)
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        UploadError::UploadFailed(e.to_string())
    }
}
