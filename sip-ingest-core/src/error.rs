//! Error types for each failure class of the pipeline.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// An incoming task message could not be turned into a [`crate::task::TransferTask`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed task message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid transferId {0:?}: must be a single plain path component")]
    InvalidTransferId(String),
}

/// Failure to compute a content digest.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    pub(crate) fn from_io(path: PathBuf, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => HashError::NotFound(path),
            std::io::ErrorKind::PermissionDenied => HashError::PermissionDenied(path),
            _ => HashError::Io { path, source },
        }
    }
}

/// The external conversion did not produce a usable preservation copy.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("failed to launch converter {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("converter timed out after {0:?}")]
    Timeout(Duration),
    #[error("converter exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("converter succeeded but did not create {path}: {stderr}")]
    MissingOutput { path: PathBuf, stderr: String },
    #[error("I/O error preparing conversion: {0}")]
    Io(#[from] std::io::Error),
}

/// A call to one of the outbound services failed.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("service returned status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("service returned status {code}, expected {expected}: {body}")]
    UnexpectedStatus { expected: u16, code: u16, body: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not decode service response: {0}")]
    Decode(String),
}

impl CapabilityError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            CapabilityError::Transport(_) | CapabilityError::Timeout => true,
            CapabilityError::Status { code, .. }
            | CapabilityError::UnexpectedStatus { code, .. } => *code >= 500 || *code == 429,
            CapabilityError::Io(_) | CapabilityError::Decode(_) => false,
        }
    }
}

/// Failure affecting a whole transfer rather than a single file.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read staging directory {path}: {source}")]
    StagingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The task feed could not deliver or acknowledge messages.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("broker connection failed: {0}")]
    Connect(String),
    #[error("failed to fetch messages: {0}")]
    Fetch(String),
    #[error("failed to record consumed offset: {0}")]
    Commit(String),
}
