//! TTS engine implementations

pub mod native;
pub mod console;

pub use console::ConsoleTtsEngine;
pub use native::NativeTtsEngine;

use crate::arbiter::UtteranceId;
use crate::config::{EngineKind, SpeechConfig};
use crate::error::SpeechError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

/// Trait for TTS engines
///
/// `speak` resolves when playback has ended: `Ok` for done, `Err` for a
/// failure. An engine may also never resolve; the arbiter's fallback timer
/// covers that.
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// Speak `text` as utterance `id`
    async fn speak(&self, id: UtteranceId, text: &str) -> Result<(), SpeechError>;

    /// Stop utterance `id` if it is still playing
    async fn stop(&self, id: UtteranceId) -> Result<(), SpeechError>;

    /// Check if engine is available
    fn is_available(&self) -> bool;

    /// Get engine name
    fn name(&self) -> &str;
}

/// Build the engine named in the config, falling back to the console engine
/// when the native synthesizer is missing.
pub fn create_engine(config: &SpeechConfig) -> Arc<dyn TtsEngine> {
    match config.engine {
        EngineKind::Native => {
            let engine = NativeTtsEngine::new(config.rate, config.voice.clone());
            if engine.is_available() {
                Arc::new(engine)
            } else {
                warn!("Native TTS not available, using console engine");
                Arc::new(ConsoleTtsEngine::new(config.clone()))
            }
        }
        EngineKind::Console => Arc::new(ConsoleTtsEngine::new(config.clone())),
    }
}

/// Utterances an engine is playing, each with a handle to cut it short.
#[derive(Default)]
pub(crate) struct Playback {
    state: Mutex<PlaybackState>,
}

#[derive(Default)]
struct PlaybackState {
    playing: BTreeMap<UtteranceId, Arc<Notify>>,
    stopped_through: UtteranceId,
}

impl Playback {
    /// Register `id` as playing. `None` if it was stopped before it began.
    pub(crate) fn begin(&self, id: UtteranceId) -> Option<Arc<Notify>> {
        let mut state = self.state.lock();
        if id <= state.stopped_through {
            return None;
        }
        let cancel = Arc::new(Notify::new());
        state.playing.insert(id, Arc::clone(&cancel));
        Some(cancel)
    }

    pub(crate) fn finish(&self, id: UtteranceId) {
        self.state.lock().playing.remove(&id);
    }

    /// Cut `id` short. Returns whether it was playing.
    pub(crate) fn stop(&self, id: UtteranceId) -> bool {
        let mut state = self.state.lock();
        state.stopped_through = state.stopped_through.max(id);
        match state.playing.remove(&id) {
            Some(cancel) => {
                cancel.notify_one();
                true
            }
            None => false,
        }
    }
}
