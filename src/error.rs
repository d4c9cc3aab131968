use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::writers::WriteError;

/// Error type for conversion operations.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Input path does not resolve to a readable file.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Every candidate encoding failed to decode the input.
    #[error("unable to decode {0} with any candidate encoding")]
    UnreadableEncoding(PathBuf),

    /// The requested output format key is not registered.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// A batch or whole-file write failed. Batches already flushed to disk
    /// are not rolled back.
    #[error("failed to write {format} output for {path}: {source}")]
    WriteFailure {
        format: crate::format::OutputFormat,
        path: PathBuf,
        #[source]
        source: WriteError,
    },

    /// The admission check refused the input set.
    #[error("resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// CSV parsing error.
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Zip archive error.
    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;
