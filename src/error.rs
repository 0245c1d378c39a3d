//! Error types for window queries and frame capture.
//!
//! None of these ever escape a single poll tick; the loop logs them and
//! moves on to the next cycle.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of an OS window query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// The automation query could not run or returned output we can't parse.
    #[error("window query unavailable: {0}")]
    QueryUnavailable(String),

    /// The query explicitly reported that no window exists.
    #[error("window not found")]
    WindowNotFound,
}

/// Failure while grabbing or persisting a frame.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture failed: {0}")]
    CaptureFailure(String),

    #[error("failed to write {}: {source}", .path.display())]
    PersistenceFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}
