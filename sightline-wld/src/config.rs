//! Top-level configuration
//!
//! One TOML document with an `[eye]`, `[speech]` and `[orchestrator]`
//! section. Every field has a default, so an empty file is a valid config.

use crate::error::WorldError;
use serde::{Deserialize, Serialize};
use sightline_eye::EyeConfig;
use sightline_spk::SpeechConfig;
use std::path::Path;
use tracing::warn;

/// Where composed phrases go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Through the speech arbiter to a TTS engine
    Tts,
    /// Straight to the screen-reader announcer, duplicates suppressed
    ScreenReader,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub output_mode: OutputMode,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            output_mode: OutputMode::Tts,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SightlineConfig {
    pub eye: EyeConfig,
    pub speech: SpeechConfig,
    pub orchestrator: OrchestratorConfig,
}

impl SightlineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, WorldError> {
        let config: Self = toml::from_str(content)?;
        config.validate().map_err(|e| {
            warn!("Rejected configuration: {}", e);
            WorldError::Config(e)
        })?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WorldError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, WorldError> {
        toml::to_string_pretty(self).map_err(|e| WorldError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.eye.validate().map_err(|e| format!("eye: {}", e))?;
        self.speech.validate().map_err(|e| format!("speech: {}", e))?;
        Ok(())
    }
}
