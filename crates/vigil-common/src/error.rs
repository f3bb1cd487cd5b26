//! Error types for Vigil operations.

use crate::types::BackendKind;
use thiserror::Error;

/// Result type alias for Vigil operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Vigil operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A backend could not be reached at all
    #[error("Backend {kind} unreachable: {reason}")]
    BackendUnreachable { kind: BackendKind, reason: String },

    /// A backend snapshot was attempted but failed
    #[error("Snapshot of backend {kind} failed: {reason}")]
    SnapshotFailed { kind: BackendKind, reason: String },

    /// A backend restore was attempted but failed
    #[error("Restore of backend {kind} failed: {reason}")]
    RestoreFailed { kind: BackendKind, reason: String },

    /// An artifact is not in a format the backend can consume
    #[error("Incompatible artifact format for backend {kind}: {reason}")]
    IncompatibleFormat { kind: BackendKind, reason: String },

    /// Digest mismatch or failed smoke test
    #[error("Integrity failure on {item}: {reason}")]
    IntegrityFailure { item: String, reason: String },

    /// Another deploy/restore run holds the exclusive ops lock
    #[error("Operation already in progress: {0}")]
    Busy(String),

    /// No backup set in the catalog is restorable
    #[error("No restorable backup set in the catalog")]
    NoRestorableBackup,

    /// Orchestration layer (service definitions) errors
    #[error("Orchestration error: {0}")]
    Orchestration(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Process exit code for this error (2 for busy/locked, 1 otherwise).
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Busy(_) => 2,
            _ => 1,
        }
    }
}
