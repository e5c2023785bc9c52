//! Error types and handling
//!
//! Crate-level errors. Per-stream failures live in [`crate::stream::StreamError`]
//! and never reach this type; everything here is either setup-fatal or a
//! configuration problem.

use crate::device::DeviceError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Recorder-wide error type
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("No device found")]
    DeviceNotFound,

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Failed to create session directory {path:?}: {source}")]
    SessionDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session error: {0}")]
    Session(String),
}

impl RecorderError {
    /// Setup failures abort the process; nothing useful can be recorded.
    pub fn is_setup_fatal(&self) -> bool {
        matches!(
            self,
            RecorderError::DeviceNotFound
                | RecorderError::SessionDir { .. }
                | RecorderError::Config(_)
        )
    }
}

/// Machine-readable error description, as written to status files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&RecorderError> for ErrorResponse {
    fn from(error: &RecorderError) -> Self {
        let code = match error {
            RecorderError::Io(_) => "IO_ERROR",
            RecorderError::Serialization(_) => "SERIALIZATION_ERROR",
            RecorderError::Config(_) => "CONFIG_ERROR",
            RecorderError::DeviceNotFound => "DEVICE_NOT_FOUND",
            RecorderError::Device(_) => "DEVICE_ERROR",
            RecorderError::SessionDir { .. } => "SESSION_DIR_ERROR",
            RecorderError::Session(_) => "SESSION_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_fatal_classification() {
        assert!(RecorderError::DeviceNotFound.is_setup_fatal());
        let dir_err = RecorderError::SessionDir {
            path: PathBuf::from("/nope"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(dir_err.is_setup_fatal());
        assert!(!RecorderError::Session("loop".into()).is_setup_fatal());
    }

    #[test]
    fn test_error_response_code() {
        let resp = ErrorResponse::from(&RecorderError::DeviceNotFound);
        assert_eq!(resp.code, "DEVICE_NOT_FOUND");
        assert_eq!(resp.message, "No device found");
    }
}
