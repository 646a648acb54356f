//! Error types for sightline-spk

use sightline_core::Error as CoreError;
use thiserror::Error;

/// Speech output errors
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<SpeechError> for CoreError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::Core(inner) => inner,
            SpeechError::Io(io) => CoreError::Io(io),
            other => CoreError::Speech(other.to_string()),
        }
    }
}
