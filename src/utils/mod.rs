//! Shared helpers

pub mod error;

pub use error::{ErrorResponse, RecorderError, RecorderResult};
