//! Timers for the speech arbiter
//!
//! The arbiter never sleeps. It asks for a [`TimerToken`] to be delivered
//! after a delay, and whoever owns the scheduler feeds fired tokens back
//! through `SpeechArbiter::on_timer`.

use crate::arbiter::TimerToken;
use parking_lot::Mutex;
use sightline_core::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub trait Scheduler: Send + Sync {
    /// Deliver `token` once `delay_ms` has passed. Re-arming a token replaces it.
    fn after(&self, delay_ms: u64, token: TimerToken);

    /// Forget `token`. Cancelling a timer that already fired is a no-op.
    fn cancel(&self, token: TimerToken);
}

/// Clock that follows tokio's time, so paused-time tests see the same
/// instants as the timers.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Timers as tokio tasks; fired tokens arrive on the receiver returned by `new`.
pub struct TokioScheduler {
    runtime: Handle,
    sender: mpsc::UnboundedSender<TimerToken>,
    timers: Arc<Mutex<HashMap<TimerToken, JoinHandle<()>>>>,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> (Self, mpsc::UnboundedReceiver<TimerToken>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                runtime,
                sender,
                timers: Arc::new(Mutex::new(HashMap::new())),
            },
            receiver,
        )
    }

    pub fn active(&self) -> usize {
        self.timers.lock().len()
    }
}

impl Scheduler for TokioScheduler {
    fn after(&self, delay_ms: u64, token: TimerToken) {
        let sender = self.sender.clone();
        let timers = Arc::clone(&self.timers);
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            timers.lock().remove(&token);
            let _ = sender.send(token);
        });

        let mut timers = self.timers.lock();
        if handle.is_finished() {
            return;
        }
        if let Some(old) = timers.insert(token, handle) {
            old.abort();
        }
    }

    fn cancel(&self, token: TimerToken) {
        if let Some(handle) = self.timers.lock().remove(&token) {
            debug!(?token, "Timer cancelled");
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.timers.lock().drain() {
            handle.abort();
        }
    }
}

/// Timers that fire only when asked, against a shared clock.
pub struct ManualScheduler {
    clock: Arc<dyn Clock>,
    timers: Mutex<Vec<(u64, TimerToken)>>,
}

impl ManualScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            timers: Mutex::new(Vec::new()),
        }
    }

    /// Remove and return every token due at `now_ms`, earliest first.
    pub fn take_due(&self, now_ms: u64) -> Vec<TimerToken> {
        let mut timers = self.timers.lock();
        let mut due: Vec<(u64, TimerToken)> = Vec::new();
        timers.retain(|&(at, token)| {
            if at <= now_ms {
                due.push((at, token));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(at, _)| at);
        due.into_iter().map(|(_, token)| token).collect()
    }

    pub fn scheduled(&self) -> Vec<(u64, TimerToken)> {
        self.timers.lock().clone()
    }
}

impl Scheduler for ManualScheduler {
    fn after(&self, delay_ms: u64, token: TimerToken) {
        let at = self.clock.now_ms().saturating_add(delay_ms);
        let mut timers = self.timers.lock();
        timers.retain(|&(_, t)| t != token);
        timers.push((at, token));
    }

    fn cancel(&self, token: TimerToken) {
        self.timers.lock().retain(|&(_, t)| t != token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::ManualClock;

    #[test]
    fn test_manual_scheduler_fires_in_order() {
        let clock = ManualClock::new(0);
        let scheduler = ManualScheduler::new(Arc::new(clock.clone()));
        scheduler.after(300, TimerToken::Fallback(2));
        scheduler.after(100, TimerToken::Fallback(1));
        scheduler.after(900, TimerToken::Gate(1));

        assert!(scheduler.take_due(50).is_empty());
        assert_eq!(
            scheduler.take_due(300),
            vec![TimerToken::Fallback(1), TimerToken::Fallback(2)]
        );
        assert_eq!(scheduler.scheduled().len(), 1);
    }

    #[test]
    fn test_manual_scheduler_cancel_and_rearm() {
        let clock = ManualClock::new(0);
        let scheduler = ManualScheduler::new(Arc::new(clock.clone()));
        scheduler.after(100, TimerToken::Gate(1));
        clock.set(50);
        scheduler.after(100, TimerToken::Gate(1));
        assert!(scheduler.take_due(100).is_empty());
        scheduler.cancel(TimerToken::Gate(1));
        assert!(scheduler.take_due(1_000).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_delivers_and_cancels() {
        let (scheduler, mut fired) = TokioScheduler::new(Handle::current());
        scheduler.after(100, TimerToken::Fallback(1));
        scheduler.after(200, TimerToken::Fallback(2));
        scheduler.cancel(TimerToken::Fallback(1));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(fired.recv().await, Some(TimerToken::Fallback(2)));
        assert!(fired.try_recv().is_err());
        assert_eq!(scheduler.active(), 0);
    }
}
