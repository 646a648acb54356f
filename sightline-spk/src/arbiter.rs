//! Priority arbitration for a single speech channel
//!
//! [`SpeechArbiter`] is a pure state machine. Every input (a speak request,
//! an engine completion, a timer, an external stop) is a method call with an
//! explicit `now_ms`, and every consequence comes back as a list of
//! [`Effect`]s for the caller to carry out. Nothing here sleeps, spawns or
//! talks to an engine.
//!
//! The policy for a request is looked up in [`decide`], which covers every
//! combination of in-flight and incoming priority.

use crate::config::SpeechConfig;
use sightline_core::Priority;
use tracing::{debug, info};

pub type UtteranceId = u64;

/// The utterance currently owning the speaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub priority: Priority,
    pub started_at: u64,
    pub expected_done_at: u64,
}

/// An utterance waiting for the speaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    pub text: String,
    pub priority: Priority,
}

/// Timers the arbiter asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerToken {
    /// Completes the utterance if the engine never reports back
    Fallback(UtteranceId),
    /// Releases a major request held by the idle interval gate
    Gate(u64),
}

/// Side effects requested by a transition, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Speak {
        id: UtteranceId,
        text: String,
        priority: Priority,
    },
    Stop {
        id: UtteranceId,
    },
    ScheduleTimer {
        token: TimerToken,
        delay_ms: u64,
    },
    CancelTimer {
        token: TimerToken,
    },
}

/// Policy for an incoming request given what is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Start immediately
    Start,
    /// Start if the idle interval gate allows, otherwise hold as pending
    GateOrHold,
    /// Start if the idle interval gate allows, otherwise drop
    GateOrDrop,
    /// Stop the in-flight utterance and start this one
    Interrupt,
    /// Interrupt once the in-flight utterance has run past the grace period, otherwise queue
    InterruptAfterGrace,
    /// Replace the pending slot
    Queue,
    /// Queue only if nothing is pending and the in-flight utterance is nearly done
    QueueIfTail,
    Drop,
}

/// The full decision table.
pub fn decide(in_flight: Option<Priority>, incoming: Priority) -> Rule {
    use Priority::*;
    match (in_flight, incoming) {
        (None, Critical) => Rule::Start,
        (None, Major) => Rule::GateOrHold,
        (None, Minor) => Rule::GateOrDrop,

        (Some(Critical), Critical) => Rule::InterruptAfterGrace,
        (Some(Major), Critical) | (Some(Minor), Critical) => Rule::Interrupt,

        (Some(Critical), Major) => Rule::Queue,
        (Some(Critical), Minor) => Rule::Drop,

        (Some(Major), Major) | (Some(Minor), Major) => Rule::Queue,
        (Some(Major), Minor) | (Some(Minor), Minor) => Rule::QueueIfTail,
    }
}

/// What happened to a speak request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Started(UtteranceId),
    /// Stopped the in-flight utterance and started a new one
    Interrupted { stopped: UtteranceId, started: UtteranceId },
    Queued,
    /// Held by the idle interval gate
    Held,
    Dropped,
    /// Empty text
    Ignored,
}

/// Result of a speak request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub outcome: Outcome,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone)]
pub struct SpeechArbiter {
    config: SpeechConfig,
    next_id: UtteranceId,
    in_flight: Option<Utterance>,
    pending: Option<Pending>,
    last_completed_at: Option<u64>,
    gate_seq: u64,
    armed_gate: Option<u64>,
}

impl SpeechArbiter {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            config,
            next_id: 1,
            in_flight: None,
            pending: None,
            last_completed_at: None,
            gate_seq: 0,
            armed_gate: None,
        }
    }

    pub fn config(&self) -> &SpeechConfig {
        &self.config
    }

    pub fn in_flight(&self) -> Option<&Utterance> {
        self.in_flight.as_ref()
    }

    pub fn pending(&self) -> Option<&Pending> {
        self.pending.as_ref()
    }

    pub fn last_completed_at(&self) -> Option<u64> {
        self.last_completed_at
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    pub fn request_speak(&mut self, text: &str, priority: Priority, now_ms: u64) -> Step {
        let text = text.trim();
        if text.is_empty() {
            return Step {
                outcome: Outcome::Ignored,
                effects: Vec::new(),
            };
        }

        let mut effects = Vec::new();
        let rule = decide(self.in_flight.as_ref().map(|u| u.priority), priority);
        debug!(%priority, ?rule, "Speak request");

        let outcome = match rule {
            Rule::Start => Outcome::Started(self.start(text, priority, now_ms, &mut effects)),
            Rule::GateOrHold => {
                if self.gate_open(priority, now_ms) {
                    Outcome::Started(self.start(text, priority, now_ms, &mut effects))
                } else {
                    self.hold(text, priority, now_ms, &mut effects);
                    Outcome::Held
                }
            }
            Rule::GateOrDrop => {
                if self.gate_open(priority, now_ms) {
                    Outcome::Started(self.start(text, priority, now_ms, &mut effects))
                } else {
                    Outcome::Dropped
                }
            }
            Rule::Interrupt => self.interrupt_and_start(text, priority, now_ms, &mut effects),
            Rule::InterruptAfterGrace => {
                let elapsed = self
                    .in_flight
                    .as_ref()
                    .map(|u| now_ms.saturating_sub(u.started_at))
                    .unwrap_or(0);
                if elapsed >= self.config.interrupt_grace_ms {
                    self.interrupt_and_start(text, priority, now_ms, &mut effects)
                } else {
                    self.set_pending(text, priority);
                    Outcome::Queued
                }
            }
            Rule::Queue => {
                self.set_pending(text, priority);
                Outcome::Queued
            }
            Rule::QueueIfTail => {
                let remaining = self
                    .in_flight
                    .as_ref()
                    .map(|u| u.expected_done_at.saturating_sub(now_ms))
                    .unwrap_or(0);
                if self.pending.is_none() && remaining < self.config.minor_tail_ms {
                    self.set_pending(text, priority);
                    Outcome::Queued
                } else {
                    Outcome::Dropped
                }
            }
            Rule::Drop => Outcome::Dropped,
        };

        if outcome == Outcome::Dropped {
            debug!(%priority, "Speak request dropped");
        }
        Step { outcome, effects }
    }

    /// The engine finished speaking `id`.
    pub fn notify_done(&mut self, id: UtteranceId, now_ms: u64) -> Vec<Effect> {
        self.complete(id, now_ms, true)
    }

    /// The engine failed to speak `id`. Handled exactly like completion.
    pub fn notify_error(&mut self, id: UtteranceId, now_ms: u64) -> Vec<Effect> {
        self.complete(id, now_ms, true)
    }

    /// Speech was stopped from outside; frees the speaker and drains pending.
    pub fn notify_stopped(&mut self, now_ms: u64) -> Vec<Effect> {
        match self.in_flight.as_ref().map(|u| u.id) {
            Some(id) => self.complete(id, now_ms, true),
            None => Vec::new(),
        }
    }

    /// Stop the in-flight utterance and complete it in one transition. The
    /// `Stop` effect always names the utterance this call completed.
    pub fn stop(&mut self, now_ms: u64) -> Vec<Effect> {
        let Some(id) = self.in_flight.as_ref().map(|u| u.id) else {
            return Vec::new();
        };
        let mut effects = vec![Effect::Stop { id }];
        effects.extend(self.complete(id, now_ms, true));
        effects
    }

    pub fn on_timer(&mut self, token: TimerToken, now_ms: u64) -> Vec<Effect> {
        match token {
            TimerToken::Fallback(id) => {
                if self.in_flight.as_ref().map(|u| u.id) == Some(id) {
                    debug!(id, "Fallback timer completed utterance");
                }
                self.complete(id, now_ms, false)
            }
            TimerToken::Gate(seq) => {
                if self.armed_gate != Some(seq) {
                    return Vec::new();
                }
                self.armed_gate = None;
                let mut effects = Vec::new();
                if self.in_flight.is_none() {
                    if let Some(p) = self.pending.take() {
                        self.start(&p.text, p.priority, now_ms, &mut effects);
                    }
                }
                effects
            }
        }
    }

    fn gate_open(&self, priority: Priority, now_ms: u64) -> bool {
        let interval = match priority {
            Priority::Critical => return true,
            Priority::Major => self.config.major_interval_ms,
            Priority::Minor => self.config.minor_interval_ms,
        };
        match self.last_completed_at {
            None => true,
            Some(t) => now_ms.saturating_sub(t) >= interval,
        }
    }

    fn start(
        &mut self,
        text: &str,
        priority: Priority,
        now_ms: u64,
        effects: &mut Vec<Effect>,
    ) -> UtteranceId {
        let id = self.next_id;
        self.next_id += 1;
        let estimate = self.config.estimate_ms(text);

        self.in_flight = Some(Utterance {
            id,
            text: text.to_string(),
            priority,
            started_at: now_ms,
            expected_done_at: now_ms.saturating_add(estimate),
        });
        info!(id, %priority, text, "Speaking");

        effects.push(Effect::Speak {
            id,
            text: text.to_string(),
            priority,
        });
        if self.config.fallback_timer {
            effects.push(Effect::ScheduleTimer {
                token: TimerToken::Fallback(id),
                delay_ms: estimate.saturating_add(self.config.fallback_slack_ms),
            });
        }
        id
    }

    fn interrupt_and_start(
        &mut self,
        text: &str,
        priority: Priority,
        now_ms: u64,
        effects: &mut Vec<Effect>,
    ) -> Outcome {
        let Some(stopped) = self.in_flight.take() else {
            return Outcome::Started(self.start(text, priority, now_ms, effects));
        };
        info!(stopped = stopped.id, %priority, "Interrupting utterance");

        if self.config.fallback_timer {
            effects.push(Effect::CancelTimer {
                token: TimerToken::Fallback(stopped.id),
            });
        }
        effects.push(Effect::Stop { id: stopped.id });
        self.last_completed_at = Some(now_ms);
        self.pending = None;
        self.disarm_gate(effects);

        let started = self.start(text, priority, now_ms, effects);
        Outcome::Interrupted {
            stopped: stopped.id,
            started,
        }
    }

    fn hold(&mut self, text: &str, priority: Priority, now_ms: u64, effects: &mut Vec<Effect>) {
        self.set_pending(text, priority);
        if self.armed_gate.is_some() {
            return;
        }
        let interval = match priority {
            Priority::Minor => self.config.minor_interval_ms,
            _ => self.config.major_interval_ms,
        };
        let opens_at = self.last_completed_at.unwrap_or(now_ms).saturating_add(interval);
        self.gate_seq += 1;
        self.armed_gate = Some(self.gate_seq);
        effects.push(Effect::ScheduleTimer {
            token: TimerToken::Gate(self.gate_seq),
            delay_ms: opens_at.saturating_sub(now_ms),
        });
    }

    fn set_pending(&mut self, text: &str, priority: Priority) {
        if let Some(old) = self.pending.replace(Pending {
            text: text.to_string(),
            priority,
        }) {
            debug!(replaced = %old.priority, "Pending utterance replaced");
        }
    }

    fn disarm_gate(&mut self, effects: &mut Vec<Effect>) {
        if let Some(seq) = self.armed_gate.take() {
            effects.push(Effect::CancelTimer {
                token: TimerToken::Gate(seq),
            });
        }
    }

    fn complete(&mut self, id: UtteranceId, now_ms: u64, cancel_fallback: bool) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.in_flight.as_ref() {
            Some(u) if u.id == id => {}
            _ => return effects,
        }
        self.in_flight = None;
        self.last_completed_at = Some(now_ms);
        debug!(id, "Utterance complete");

        if cancel_fallback && self.config.fallback_timer {
            effects.push(Effect::CancelTimer {
                token: TimerToken::Fallback(id),
            });
        }
        if let Some(p) = self.pending.take() {
            self.disarm_gate(&mut effects);
            self.start(&p.text, p.priority, now_ms, &mut effects);
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Priority::*;

    fn arbiter() -> SpeechArbiter {
        SpeechArbiter::new(SpeechConfig::default())
    }

    fn spoken(effects: &[Effect]) -> Vec<&str> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Speak { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_decision_table_is_total() {
        let all = [Critical, Major, Minor];
        for incoming in all {
            let _ = decide(None, incoming);
            for running in all {
                let _ = decide(Some(running), incoming);
            }
        }
        assert_eq!(decide(Some(Critical), Minor), Rule::Drop);
        assert_eq!(decide(Some(Minor), Critical), Rule::Interrupt);
    }

    #[test]
    fn test_first_request_starts_with_fallback_timer() {
        let mut a = arbiter();
        let step = a.request_speak("stop sign close", Critical, 0);
        assert_eq!(step.outcome, Outcome::Started(1));
        assert_eq!(
            step.effects,
            vec![
                Effect::Speak {
                    id: 1,
                    text: "stop sign close".to_string(),
                    priority: Critical
                },
                Effect::ScheduleTimer {
                    token: TimerToken::Fallback(1),
                    delay_ms: 500 + 3 * 350 + 120
                },
            ]
        );
        assert_eq!(a.in_flight().unwrap().expected_done_at, 1_550);
    }

    #[test]
    fn test_empty_phrase_ignored() {
        let mut a = arbiter();
        let step = a.request_speak("  ", Critical, 0);
        assert_eq!(step.outcome, Outcome::Ignored);
        assert!(step.effects.is_empty());
        assert!(a.is_idle());
    }

    #[test]
    fn test_minor_gate_drops_second_request() {
        let mut a = arbiter();
        a.request_speak("bench ahead", Minor, 0);
        a.notify_done(1, 1_000);
        let step = a.request_speak("tree ahead", Minor, 2_000);
        assert_eq!(step.outcome, Outcome::Dropped);
        assert!(step.effects.is_empty());
        let step = a.request_speak("tree ahead", Minor, 5_200);
        assert_eq!(step.outcome, Outcome::Started(2));
    }

    #[test]
    fn test_major_gate_holds_then_releases() {
        let mut a = arbiter();
        a.request_speak("dog ahead", Major, 0);
        a.notify_done(1, 1_000);
        let step = a.request_speak("2 dogs ahead", Major, 2_000);
        assert_eq!(step.outcome, Outcome::Held);
        assert_eq!(
            step.effects,
            vec![Effect::ScheduleTimer {
                token: TimerToken::Gate(1),
                delay_ms: 1_800
            }]
        );
        let effects = a.on_timer(TimerToken::Gate(1), 3_800);
        assert_eq!(spoken(&effects), vec!["2 dogs ahead"]);
        assert!(a.pending().is_none());
    }

    #[test]
    fn test_critical_interrupts_major() {
        let mut a = arbiter();
        a.request_speak("3 people ahead", Major, 0);
        let step = a.request_speak("stop sign close", Critical, 2_000);
        assert_eq!(step.outcome, Outcome::Interrupted { stopped: 1, started: 2 });
        assert_eq!(step.effects[0], Effect::CancelTimer { token: TimerToken::Fallback(1) });
        assert_eq!(step.effects[1], Effect::Stop { id: 1 });
        assert_eq!(a.last_completed_at(), Some(2_000));
        // late completion of the interrupted utterance is a no-op
        assert!(a.notify_done(1, 2_100).is_empty());
        assert_eq!(a.in_flight().unwrap().id, 2);
    }

    #[test]
    fn test_critical_within_grace_is_queued() {
        let mut a = arbiter();
        a.request_speak("stop sign close", Critical, 0);
        let step = a.request_speak("hazard sign close", Critical, 1_000);
        assert_eq!(step.outcome, Outcome::Queued);
        let step = a.request_speak("crosswalk close", Critical, 1_600);
        assert_eq!(step.outcome, Outcome::Interrupted { stopped: 1, started: 2 });
        assert!(a.pending().is_none());
    }

    #[test]
    fn test_major_never_interrupts_critical() {
        let mut a = arbiter();
        a.request_speak("stop sign close", Critical, 0);
        assert_eq!(a.request_speak("car ahead", Major, 100).outcome, Outcome::Queued);
        assert_eq!(a.request_speak("bench ahead", Minor, 100).outcome, Outcome::Dropped);
        let effects = a.notify_done(1, 1_500);
        assert_eq!(spoken(&effects), vec!["car ahead"]);
    }

    #[test]
    fn test_minor_tail_rule() {
        let mut a = arbiter();
        a.request_speak("one two three", Major, 0); // expected done at 1550
        assert_eq!(a.request_speak("bench ahead", Minor, 500).outcome, Outcome::Dropped);
        assert_eq!(a.request_speak("bench ahead", Minor, 1_100).outcome, Outcome::Queued);
        assert_eq!(a.request_speak("tree ahead", Minor, 1_200).outcome, Outcome::Dropped);
        assert_eq!(a.pending().unwrap().text, "bench ahead");
    }

    #[test]
    fn test_major_replaces_pending() {
        let mut a = arbiter();
        a.request_speak("one two three", Major, 0);
        a.request_speak("bench ahead", Minor, 1_100);
        a.request_speak("2 dogs ahead", Major, 1_200);
        assert_eq!(a.pending().unwrap().text, "2 dogs ahead");
    }

    #[test]
    fn test_fallback_timer_completes_and_late_done_is_noop() {
        let mut a = arbiter();
        a.request_speak("stop sign close", Critical, 0);
        a.request_speak("car ahead", Major, 10);
        let effects = a.on_timer(TimerToken::Fallback(1), 1_670);
        assert_eq!(spoken(&effects), vec!["car ahead"]);
        assert!(!effects.contains(&Effect::CancelTimer { token: TimerToken::Fallback(1) }));
        assert!(a.notify_done(1, 1_700).is_empty());
        assert_eq!(a.in_flight().unwrap().id, 2);
    }

    #[test]
    fn test_error_is_completion() {
        let mut a = arbiter();
        a.request_speak("stop sign close", Critical, 0);
        a.request_speak("car ahead", Major, 10);
        let effects = a.notify_error(1, 20);
        assert_eq!(spoken(&effects), vec!["car ahead"]);
    }

    #[test]
    fn test_notify_stopped_drains_pending() {
        let mut a = arbiter();
        a.request_speak("stop sign close", Critical, 0);
        a.request_speak("car ahead", Major, 10);
        let effects = a.notify_stopped(50);
        assert_eq!(spoken(&effects), vec!["car ahead"]);
        assert!(a.notify_stopped(60).iter().any(|e| matches!(e, Effect::CancelTimer { .. })));
        assert!(a.is_idle());
        assert!(a.notify_stopped(70).is_empty());
    }

    #[test]
    fn test_stop_names_the_utterance_it_completes() {
        let mut a = arbiter();
        a.request_speak("stop sign close", Critical, 0);
        a.request_speak("car ahead", Major, 10);
        a.notify_done(1, 900);

        let effects = a.stop(950);
        assert_eq!(effects[0], Effect::Stop { id: 2 });
        assert!(effects.contains(&Effect::CancelTimer { token: TimerToken::Fallback(2) }));
        assert!(a.is_idle());
        assert!(a.stop(960).is_empty());
    }

    #[test]
    fn test_stop_then_pending_starts() {
        let mut a = arbiter();
        a.request_speak("stop sign close", Critical, 0);
        a.request_speak("car ahead", Major, 10);
        let effects = a.stop(50);
        assert_eq!(effects[0], Effect::Stop { id: 1 });
        assert_eq!(spoken(&effects), vec!["car ahead"]);
        assert_eq!(a.in_flight().map(|u| u.id), Some(2));
    }

    #[test]
    fn test_stale_gate_timer_ignored() {
        let mut a = arbiter();
        a.request_speak("dog ahead", Major, 0);
        a.notify_done(1, 100);
        a.request_speak("2 dogs ahead", Major, 200);
        // a critical request runs first and drains the held major on completion
        a.request_speak("stop sign close", Critical, 300);
        let effects = a.notify_done(2, 1_000);
        assert_eq!(spoken(&effects), vec!["2 dogs ahead"]);
        assert!(effects.contains(&Effect::CancelTimer { token: TimerToken::Gate(1) }));
        assert!(a.on_timer(TimerToken::Gate(1), 2_900).is_empty());
    }
}
