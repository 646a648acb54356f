//! sightline-spk: one audio channel, many things to say
//!
//! Provides:
//! - A pure priority arbiter that owns one in-flight and one pending utterance
//! - Timer scheduling behind a trait (tokio-backed or driven by hand)
//! - TTS engines (native command line, console)
//! - A thread-safe channel that wires the arbiter to an engine
//! - Duplicate suppression for screen-reader announcements

pub mod error;
pub mod config;
pub mod arbiter;
pub mod scheduler;
pub mod engines;
pub mod channel;
pub mod announcer;

pub use error::SpeechError;
pub use config::{EngineKind, SpeechConfig};
pub use arbiter::{decide, Effect, Outcome, Pending, Rule, SpeechArbiter, Step, TimerToken, Utterance, UtteranceId};
pub use scheduler::{ManualScheduler, Scheduler, TokioClock, TokioScheduler};
pub use engines::{create_engine, ConsoleTtsEngine, NativeTtsEngine, TtsEngine};
pub use channel::SpeechChannel;
pub use announcer::{AnnouncementDeduper, Announcer, LogAnnouncer};
