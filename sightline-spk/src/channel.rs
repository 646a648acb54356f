//! Thread-safe speech channel
//!
//! Wraps a [`SpeechArbiter`] in a single mutex and carries out its effects.
//! Speak requests come from the frame loop; completions come from engine
//! tasks and timers on other threads. Each transition runs entirely under
//! the lock, and effects are executed after the lock is released, so start,
//! complete and interrupt are atomic with respect to each other.

use crate::arbiter::{Effect, Outcome, Pending, SpeechArbiter, TimerToken, Utterance, UtteranceId};
use crate::config::SpeechConfig;
use crate::engines::TtsEngine;
use crate::error::SpeechError;
use crate::scheduler::{Scheduler, TokioClock, TokioScheduler};
use parking_lot::Mutex;
use sightline_core::{Clock, Priority};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, warn};

struct Inner {
    arbiter: Mutex<SpeechArbiter>,
    engine: Arc<dyn TtsEngine>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
}

/// A single audio output shared by everything that wants to talk.
#[derive(Clone)]
pub struct SpeechChannel {
    inner: Arc<Inner>,
}

impl SpeechChannel {
    /// Channel with tokio's clock and timers on the current runtime.
    pub fn new(engine: Arc<dyn TtsEngine>, config: SpeechConfig) -> Result<Self, SpeechError> {
        Self::with_clock(engine, Arc::new(TokioClock::new()), config)
    }

    /// Channel with tokio timers, timestamped by `clock`.
    pub fn with_clock(
        engine: Arc<dyn TtsEngine>,
        clock: Arc<dyn Clock>,
        config: SpeechConfig,
    ) -> Result<Self, SpeechError> {
        let runtime = current_runtime()?;
        let (scheduler, mut fired) = TokioScheduler::new(runtime.clone());
        let channel = Self::build(engine, Arc::new(scheduler), clock, runtime, config)?;

        let weak = Arc::downgrade(&channel.inner);
        channel.inner.runtime.spawn(async move {
            while let Some(token) = fired.recv().await {
                match weak.upgrade() {
                    Some(inner) => inner.on_timer(token),
                    None => break,
                }
            }
        });
        Ok(channel)
    }

    /// Channel whose timers are delivered by the caller through [`SpeechChannel::on_timer`].
    pub fn with_scheduler(
        engine: Arc<dyn TtsEngine>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
        config: SpeechConfig,
    ) -> Result<Self, SpeechError> {
        Self::build(engine, scheduler, clock, current_runtime()?, config)
    }

    fn build(
        engine: Arc<dyn TtsEngine>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
        runtime: Handle,
        config: SpeechConfig,
    ) -> Result<Self, SpeechError> {
        config.validate().map_err(SpeechError::Config)?;
        Ok(Self {
            inner: Arc::new(Inner {
                arbiter: Mutex::new(SpeechArbiter::new(config)),
                engine,
                scheduler,
                clock,
                runtime,
            }),
        })
    }

    pub fn request_speak(&self, text: &str, priority: Priority) -> Outcome {
        self.inner.request_speak(text, priority)
    }

    pub fn notify_done(&self, id: UtteranceId) {
        self.inner.complete(id, false);
    }

    pub fn notify_error(&self, id: UtteranceId) {
        self.inner.complete(id, true);
    }

    /// Record that speech was stopped from outside the channel.
    pub fn notify_stopped(&self) {
        let effects = {
            let now = self.inner.clock.now_ms();
            self.inner.arbiter.lock().notify_stopped(now)
        };
        self.inner.execute(effects);
    }

    /// Silence the current utterance. Anything pending starts right after.
    pub fn stop(&self) {
        let effects = {
            let now = self.inner.clock.now_ms();
            self.inner.arbiter.lock().stop(now)
        };
        self.inner.execute(effects);
    }

    pub fn on_timer(&self, token: TimerToken) {
        self.inner.on_timer(token);
    }

    pub fn in_flight(&self) -> Option<Utterance> {
        self.inner.arbiter.lock().in_flight().cloned()
    }

    pub fn pending(&self) -> Option<Pending> {
        self.inner.arbiter.lock().pending().cloned()
    }

    pub fn engine_name(&self) -> String {
        self.inner.engine.name().to_string()
    }
}

impl Inner {
    fn request_speak(self: &Arc<Self>, text: &str, priority: Priority) -> Outcome {
        let step = {
            let now = self.clock.now_ms();
            self.arbiter.lock().request_speak(text, priority, now)
        };
        self.execute(step.effects);
        step.outcome
    }

    fn complete(self: &Arc<Self>, id: UtteranceId, failed: bool) {
        let effects = {
            let now = self.clock.now_ms();
            let mut arbiter = self.arbiter.lock();
            if failed {
                arbiter.notify_error(id, now)
            } else {
                arbiter.notify_done(id, now)
            }
        };
        self.execute(effects);
    }

    fn on_timer(self: &Arc<Self>, token: TimerToken) {
        let effects = {
            let now = self.clock.now_ms();
            self.arbiter.lock().on_timer(token, now)
        };
        self.execute(effects);
    }

    fn execute(self: &Arc<Self>, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Speak { id, text, .. } => {
                    let weak: Weak<Inner> = Arc::downgrade(self);
                    let engine = Arc::clone(&self.engine);
                    self.runtime.spawn(async move {
                        let result = engine.speak(id, &text).await;
                        let Some(inner) = weak.upgrade() else {
                            return;
                        };
                        match result {
                            Ok(()) => inner.complete(id, false),
                            Err(e) => {
                                warn!(id, engine = engine.name(), "Speech failed: {}", e);
                                inner.complete(id, true);
                            }
                        }
                    });
                }
                Effect::Stop { id } => {
                    let engine = Arc::clone(&self.engine);
                    self.runtime.spawn(async move {
                        if let Err(e) = engine.stop(id).await {
                            warn!(id, "Failed to stop speech: {}", e);
                        }
                    });
                }
                Effect::ScheduleTimer { token, delay_ms } => {
                    debug!(?token, delay_ms, "Scheduling timer");
                    self.scheduler.after(delay_ms, token);
                }
                Effect::CancelTimer { token } => self.scheduler.cancel(token),
            }
        }
    }
}

fn current_runtime() -> Result<Handle, SpeechError> {
    Handle::try_current()
        .map_err(|e| SpeechError::Scheduler(format!("No tokio runtime available: {}", e)))
}
