//! Centralized error types for pdfcourier.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the pdfcourier library.
#[derive(Error, Debug)]
pub enum CourierError {
    /// Bad or missing operator input: dates, folder path, row keys, file names.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A folder path could not be resolved on the storage provider.
    #[error("Could not resolve folder path '{path}': {reason}")]
    ResolutionFailure { path: String, reason: String },

    /// A source message or a named attachment is missing on re-lookup.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The destination already holds a file with the target name.
    #[error("File already exists: {0}")]
    Collision(String),

    /// Any other failure reported by a mail, storage, or tabular provider.
    #[error("Host error: {0}")]
    Host(String),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The workbook file is unreadable or malformed.
    #[error("Invalid workbook '{path}': {reason}")]
    Workbook { path: PathBuf, reason: String },
}

/// Convenience alias for `Result<T, CourierError>`.
pub type Result<T> = std::result::Result<T, CourierError>;

impl CourierError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for the expected "target name taken" condition.
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::Collision(_))
    }
}
