//! Speech channel tests against scripted engines and paused tokio time

use async_trait::async_trait;
use parking_lot::Mutex;
use sightline_core::{ManualClock, Priority};
use sightline_spk::{
    ConsoleTtsEngine, EngineKind, ManualScheduler, Outcome, SpeechChannel, SpeechConfig,
    SpeechError, TtsEngine, UtteranceId,
};
use std::sync::Arc;
use std::time::Duration;

/// Engine that never finishes on its own, or fails every request.
#[derive(Default)]
struct ScriptedEngine {
    fail: bool,
    spoken: Mutex<Vec<(UtteranceId, String)>>,
    stopped: Mutex<Vec<UtteranceId>>,
}

impl ScriptedEngine {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn texts(&self) -> Vec<String> {
        self.spoken.lock().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl TtsEngine for ScriptedEngine {
    async fn speak(&self, id: UtteranceId, text: &str) -> Result<(), SpeechError> {
        self.spoken.lock().push((id, text.to_string()));
        if self.fail {
            return Err(SpeechError::Engine("device unavailable".to_string()));
        }
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn stop(&self, id: UtteranceId) -> Result<(), SpeechError> {
        self.stopped.lock().push(id);
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct Rig {
    clock: ManualClock,
    scheduler: Arc<ManualScheduler>,
    engine: Arc<ScriptedEngine>,
    channel: SpeechChannel,
}

impl Rig {
    fn new(engine: ScriptedEngine) -> Self {
        let clock = ManualClock::new(0);
        let scheduler = Arc::new(ManualScheduler::new(Arc::new(clock.clone())));
        let engine = Arc::new(engine);
        let channel = SpeechChannel::with_scheduler(
            engine.clone(),
            scheduler.clone(),
            Arc::new(clock.clone()),
            SpeechConfig::default(),
        )
        .unwrap();
        Self {
            clock,
            scheduler,
            engine,
            channel,
        }
    }

    fn at(&self, ms: u64) {
        self.clock.set(ms);
        for token in self.scheduler.take_due(ms) {
            self.channel.on_timer(token);
        }
    }
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_critical_interrupts_major() {
    let rig = Rig::new(ScriptedEngine::default());
    assert_eq!(
        rig.channel.request_speak("chair ahead", Priority::Major),
        Outcome::Started(1)
    );
    rig.at(100);
    assert_eq!(
        rig.channel.request_speak("stop sign close", Priority::Critical),
        Outcome::Interrupted { stopped: 1, started: 2 }
    );
    settle().await;

    assert_eq!(*rig.engine.stopped.lock(), vec![1]);
    assert_eq!(rig.engine.texts(), vec!["chair ahead", "stop sign close"]);
    assert_eq!(rig.channel.in_flight().map(|u| u.id), Some(2));
}

#[tokio::test]
async fn test_fallback_timer_frees_silent_engine() {
    let rig = Rig::new(ScriptedEngine::default());
    rig.channel.request_speak("chair ahead", Priority::Major);
    settle().await;

    // 500 + 2 * 350 estimate plus 120 slack
    rig.at(1_319);
    assert!(rig.channel.in_flight().is_some());
    rig.at(1_320);
    assert!(rig.channel.in_flight().is_none());
}

#[tokio::test]
async fn test_done_drains_pending() {
    let rig = Rig::new(ScriptedEngine::default());
    rig.channel.request_speak("chair ahead", Priority::Major);
    assert_eq!(
        rig.channel.request_speak("door ahead", Priority::Major),
        Outcome::Queued
    );

    rig.at(900);
    rig.channel.notify_done(1);
    settle().await;

    let playing = rig.channel.in_flight().unwrap();
    assert_eq!(playing.text, "door ahead");
    assert!(rig.channel.pending().is_none());
    assert_eq!(rig.engine.texts(), vec!["chair ahead", "door ahead"]);
}

#[tokio::test]
async fn test_held_major_released_when_gate_opens() {
    let rig = Rig::new(ScriptedEngine::default());
    rig.channel.request_speak("chair ahead", Priority::Major);
    rig.at(1_000);
    rig.channel.notify_done(1);

    rig.at(1_500);
    assert_eq!(
        rig.channel.request_speak("door ahead", Priority::Major),
        Outcome::Held
    );
    rig.at(3_799);
    assert!(rig.channel.in_flight().is_none());
    rig.at(3_800);
    assert_eq!(rig.channel.in_flight().map(|u| u.text), Some("door ahead".to_string()));
}

#[tokio::test]
async fn test_failing_engine_frees_speaker() {
    let rig = Rig::new(ScriptedEngine::failing());
    rig.channel.request_speak("stop sign close", Priority::Critical);
    assert_eq!(
        rig.channel.request_speak("chair ahead", Priority::Major),
        Outcome::Queued
    );
    settle().await;

    assert_eq!(rig.engine.texts(), vec!["stop sign close", "chair ahead"]);
    assert!(rig.channel.in_flight().is_none());
    assert!(rig.channel.pending().is_none());
}

#[tokio::test]
async fn test_stop_silences_and_drains() {
    let rig = Rig::new(ScriptedEngine::default());
    rig.channel.request_speak("stop sign close", Priority::Critical);
    rig.channel.request_speak("chair ahead", Priority::Major);

    rig.channel.stop();
    settle().await;

    assert_eq!(*rig.engine.stopped.lock(), vec![1]);
    assert_eq!(rig.channel.in_flight().map(|u| u.text), Some("chair ahead".to_string()));
}

#[tokio::test]
async fn test_stop_after_drain_stops_the_new_utterance() {
    let rig = Rig::new(ScriptedEngine::default());
    rig.channel.request_speak("stop sign close", Priority::Critical);
    rig.channel.request_speak("chair ahead", Priority::Major);
    rig.at(900);
    rig.channel.notify_done(1);

    rig.channel.stop();
    settle().await;

    assert_eq!(*rig.engine.stopped.lock(), vec![2]);
    assert!(rig.channel.in_flight().is_none());
    assert!(rig.channel.pending().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_console_engine_completes_in_real_timers() {
    let config = SpeechConfig {
        engine: EngineKind::Console,
        ..Default::default()
    };
    let engine = Arc::new(ConsoleTtsEngine::new(config.clone()));
    let channel = SpeechChannel::new(engine.clone(), config).unwrap();

    assert!(matches!(
        channel.request_speak("stop sign close", Priority::Critical),
        Outcome::Started(_)
    ));
    tokio::time::sleep(Duration::from_millis(2_000)).await;

    assert!(channel.in_flight().is_none());
    assert_eq!(engine.transcript(), vec!["stop sign close".to_string()]);
    assert_eq!(channel.engine_name(), "console");
}

#[tokio::test(start_paused = true)]
async fn test_console_engine_interrupted_by_critical() {
    let config = SpeechConfig {
        engine: EngineKind::Console,
        ..Default::default()
    };
    let engine = Arc::new(ConsoleTtsEngine::new(config.clone()));
    let channel = SpeechChannel::new(engine.clone(), config).unwrap();

    channel.request_speak("two chairs ahead, left and right", Priority::Major);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(matches!(
        channel.request_speak("stop sign close", Priority::Critical),
        Outcome::Interrupted { .. }
    ));
    tokio::time::sleep(Duration::from_millis(3_000)).await;

    assert!(channel.in_flight().is_none());
    assert_eq!(
        engine.transcript(),
        vec!["two chairs ahead, left and right".to_string(), "stop sign close".to_string()]
    );
}

#[test]
fn test_channel_requires_runtime() {
    let result = SpeechChannel::new(
        Arc::new(ScriptedEngine::default()),
        SpeechConfig::default(),
    );
    assert!(matches!(result, Err(SpeechError::Scheduler(_))));
}

#[tokio::test]
async fn test_channel_rejects_invalid_config() {
    let config = SpeechConfig {
        rate: 0,
        ..Default::default()
    };
    let result = SpeechChannel::new(Arc::new(ScriptedEngine::default()), config);
    assert!(matches!(result, Err(SpeechError::Config(_))));
}
