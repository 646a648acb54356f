//! Error types for sightline-eye

use sightline_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid detection: {0}")]
    InvalidDetection(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<VisionError> for CoreError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::Core(inner) => inner,
            other => CoreError::Vision(other.to_string()),
        }
    }
}
