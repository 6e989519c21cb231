//! Error types for herdbook

use serde::Serialize;
use thiserror::Error;

/// Message shown for every decryption failure. Never carries cipher details.
pub const CRYPTO_FAILURE_MESSAGE: &str = "invalid password or corrupted backup";

#[derive(Error, Debug)]
pub enum HerdError {
    #[error("Goat not found: {0}")]
    GoatNotFound(String),

    #[error("Record not found: {kind} {id}")]
    RecordNotFound { kind: &'static str, id: String },

    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{}", CRYPTO_FAILURE_MESSAGE)]
    Crypto,

    #[error("Invalid backup archive: {0}")]
    InvalidArchive(String),

    #[error("Unsupported backup version: {0}")]
    UnsupportedVersion(String),

    #[error("A backup operation is already in progress")]
    BackupInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, HerdError>;

/// Coarse error category surfaced to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Crypto,
    Io,
    Busy,
    InvalidArchive,
    Config,
    Internal,
}

impl HerdError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HerdError::GoatNotFound(_)
            | HerdError::RecordNotFound { .. }
            | HerdError::BackupNotFound(_) => ErrorKind::NotFound,
            HerdError::Validation(_) => ErrorKind::Validation,
            HerdError::Crypto => ErrorKind::Crypto,
            HerdError::InvalidArchive(_) | HerdError::UnsupportedVersion(_) => {
                ErrorKind::InvalidArchive
            }
            HerdError::BackupInProgress => ErrorKind::Busy,
            HerdError::Io(_) => ErrorKind::Io,
            HerdError::Json(_) | HerdError::Config(_) => ErrorKind::Config,
            HerdError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Error payload returned to the UI layer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&HerdError> for ErrorPayload {
    fn from(err: &HerdError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
