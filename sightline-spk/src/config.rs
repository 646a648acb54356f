//! Configuration for speech output

use serde::{Deserialize, Serialize};

/// Which TTS engine drives the speaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Platform command line synthesizer (espeak-ng on Linux, say on macOS)
    Native,
    /// Logs utterances and completes after the estimated duration
    Console,
}

/// Speech arbitration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub engine: EngineKind,

    /// Speech rate in words per minute (native engine)
    pub rate: u32,

    /// Voice name passed to the native engine
    pub voice: Option<String>,

    /// A critical utterance may only be interrupted by another critical one after this long
    pub interrupt_grace_ms: u64,

    /// Minimum quiet time before an idle major utterance
    pub major_interval_ms: u64,

    /// Minimum quiet time before an idle minor utterance
    pub minor_interval_ms: u64,

    /// A minor request queues behind a running utterance only if it ends within this window
    pub minor_tail_ms: u64,

    /// Arm a timer that completes an utterance the engine never reports on
    pub fallback_timer: bool,

    /// Slack added to the estimated duration before the fallback fires
    pub fallback_slack_ms: u64,

    pub estimate_base_ms: u64,
    pub estimate_per_word_ms: u64,

    /// Identical screen-reader announcements within this window are dropped
    pub dup_window_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Native,
            rate: 175,
            voice: None,
            interrupt_grace_ms: 1_600,
            major_interval_ms: 2_800,
            minor_interval_ms: 4_200,
            minor_tail_ms: 500,
            fallback_timer: true,
            fallback_slack_ms: 120,
            estimate_base_ms: 500,
            estimate_per_word_ms: 350,
            dup_window_ms: 900,
        }
    }
}

impl SpeechConfig {
    /// Estimated speaking time for a phrase
    pub fn estimate_ms(&self, text: &str) -> u64 {
        let words = text.split_whitespace().count() as u64;
        self.estimate_base_ms
            .saturating_add(self.estimate_per_word_ms.saturating_mul(words))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.rate == 0 || self.rate > 500 {
            return Err("Speech rate must be between 1 and 500".to_string());
        }
        if let Some(ref voice) = self.voice {
            if voice.trim().is_empty() || voice.len() > 256 {
                return Err("Voice name must be 1-256 characters".to_string());
            }
        }
        if self.minor_interval_ms < self.major_interval_ms {
            return Err("Minor interval must not be shorter than major interval".to_string());
        }
        if self.estimate_base_ms == 0 && self.estimate_per_word_ms == 0 {
            return Err("Duration estimate must be non-zero".to_string());
        }
        Ok(())
    }
}
