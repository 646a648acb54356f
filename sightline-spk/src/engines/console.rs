//! Console TTS engine: logs utterances instead of playing them

use super::{Playback, TtsEngine};
use crate::arbiter::UtteranceId;
use crate::config::SpeechConfig;
use crate::error::SpeechError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::info;

/// Writes each utterance to the log and completes after the estimated
/// speaking time, as if a real voice had said it.
pub struct ConsoleTtsEngine {
    config: SpeechConfig,
    playback: Playback,
    transcript: Mutex<Vec<String>>,
}

impl ConsoleTtsEngine {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            config,
            playback: Playback::default(),
            transcript: Mutex::new(Vec::new()),
        }
    }

    /// Everything spoken so far, in order.
    pub fn transcript(&self) -> Vec<String> {
        self.transcript.lock().clone()
    }
}

#[async_trait]
impl TtsEngine for ConsoleTtsEngine {
    async fn speak(&self, id: UtteranceId, text: &str) -> Result<(), SpeechError> {
        let Some(cancel) = self.playback.begin(id) else {
            return Ok(());
        };
        info!(id, text, "[speech]");
        self.transcript.lock().push(text.to_string());

        let duration = Duration::from_millis(self.config.estimate_ms(text));
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = cancel.notified() => {}
        }
        self.playback.finish(id);
        Ok(())
    }

    async fn stop(&self, id: UtteranceId) -> Result<(), SpeechError> {
        self.playback.stop(id);
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "console"
    }
}
