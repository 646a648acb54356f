//! Native platform TTS engine
//!
//! Drives the platform's command line synthesizer and plays straight to the
//! default audio device: `espeak-ng` on Linux, `say` on macOS.

use super::{Playback, TtsEngine};
use crate::arbiter::UtteranceId;
use crate::error::SpeechError;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

const MAX_TEXT_LEN: usize = 4_096;

/// Native TTS engine (platform-specific)
pub struct NativeTtsEngine {
    program: Option<&'static str>,
    rate: u32,
    voice: Option<String>,
    playback: Playback,
}

impl NativeTtsEngine {
    pub fn new(rate: u32, voice: Option<String>) -> Self {
        let program = detect_program();
        match program {
            Some(p) => info!("Native TTS engine initialized ({})", p),
            None => warn!("Native TTS not supported on this platform"),
        }
        Self {
            program,
            rate: rate.clamp(1, 500),
            voice: voice.map(|v| sanitize_voice(&v)).filter(|v| !v.is_empty()),
            playback: Playback::default(),
        }
    }

    fn command(&self, program: &str, text: &str) -> Command {
        let mut cmd = Command::new(program);
        match program {
            "say" => {
                cmd.arg("-r").arg(self.rate.to_string());
            }
            _ => {
                cmd.arg("-s").arg(self.rate.to_string());
            }
        }
        if let Some(ref voice) = self.voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg(text);
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl TtsEngine for NativeTtsEngine {
    async fn speak(&self, id: UtteranceId, text: &str) -> Result<(), SpeechError> {
        let program = self
            .program
            .ok_or_else(|| SpeechError::Engine("Native TTS engine not available".to_string()))?;

        let sanitized = sanitize_text(text);
        if sanitized.is_empty() {
            return Err(SpeechError::Engine("Text is empty after sanitization".to_string()));
        }

        let Some(cancel) = self.playback.begin(id) else {
            return Ok(());
        };

        let mut child = match self.command(program, &sanitized).spawn() {
            Ok(child) => child,
            Err(e) => {
                self.playback.finish(id);
                return Err(SpeechError::Engine(format!("Failed to execute {}: {}", program, e)));
            }
        };

        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.notified() => None,
        };

        let result = match exited {
            Some(Ok(status)) if status.success() => Ok(()),
            Some(Ok(status)) => Err(SpeechError::Engine(format!("{} exited with {}", program, status))),
            Some(Err(e)) => Err(SpeechError::Io(e)),
            None => {
                debug!(id, "Stopping native speech");
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop {}: {}", program, e);
                }
                Ok(())
            }
        };

        self.playback.finish(id);
        result
    }

    async fn stop(&self, id: UtteranceId) -> Result<(), SpeechError> {
        self.playback.stop(id);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.program.is_some()
    }

    fn name(&self) -> &str {
        "native"
    }
}

#[cfg(target_os = "linux")]
fn detect_program() -> Option<&'static str> {
    std::process::Command::new("espeak-ng")
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|_| "espeak-ng")
}

#[cfg(target_os = "macos")]
fn detect_program() -> Option<&'static str> {
    std::path::Path::new("/usr/bin/say").exists().then_some("say")
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn detect_program() -> Option<&'static str> {
    None
}

/// Strip control characters and leading dashes so the text can't be read as a flag.
fn sanitize_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(MAX_TEXT_LEN)
        .collect();
    cleaned.trim().trim_start_matches('-').trim().to_string()
}

/// Only allow alphanumeric, spaces, hyphens and underscores in voice names.
fn sanitize_voice(voice: &str) -> String {
    voice
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_' || *c == '+')
        .take(256)
        .collect::<String>()
        .trim()
        .to_string()
}
