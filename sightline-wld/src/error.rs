//! Error types for sightline-wld

use sightline_core::Error as CoreError;
use sightline_eye::VisionError;
use sightline_spk::SpeechError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorldError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<toml::de::Error> for WorldError {
    fn from(err: toml::de::Error) -> Self {
        WorldError::Parse(err.to_string())
    }
}

impl From<WorldError> for CoreError {
    fn from(err: WorldError) -> Self {
        match err {
            WorldError::Config(msg) => CoreError::Configuration(msg),
            WorldError::Parse(msg) => CoreError::Deserialization(msg),
            WorldError::Io(e) => CoreError::Io(e),
            WorldError::Vision(e) => e.into(),
            WorldError::Speech(e) => e.into(),
            WorldError::Core(e) => e,
        }
    }
}
