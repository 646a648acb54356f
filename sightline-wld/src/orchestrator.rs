//! Per-frame driver
//!
//! Each call to [`FrameOrchestrator::process_frame`] runs the whole vision
//! side synchronously:
//!
//! 1. evict expired per-id and per-label state
//! 2. drop suppressed, low-confidence and (optionally) unlabeled detections
//! 3. collapse overlapping boxes
//! 4. smooth direction, distance category and meters per id
//! 5. bucket multi-count labels by id presence
//! 6. phrase, select and compose; classify the new signature
//! 7. hand the utterance to the speech channel or the announcer

use crate::config::SightlineConfig;
use crate::error::WorldError;
use sightline_core::{Clock, Detection, DistanceCategory, Priority};
use sightline_eye::{
    classify_change, CategoryStabilizer, ChangeClass, ClusterDeduplicator, DirectionGrid,
    DirectionStabilizer, FrameObject, MetersStabilizer, MultiCountTracker, MultiCountView,
    PhraseBuilder, Signature,
};
use sightline_spk::{AnnouncementDeduper, Announcer, Outcome, SpeechChannel};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const UNLABELED: &str = "object";

/// Where utterances are delivered.
pub enum Output {
    Speech(SpeechChannel),
    Announcer(Arc<dyn Announcer>),
}

enum Sink {
    Speech(SpeechChannel),
    Announcer {
        announcer: Arc<dyn Announcer>,
        dedup: AnnouncementDeduper,
    },
}

/// What happened to a frame's utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Spoken(Outcome),
    Announced,
    /// Dropped as a recent duplicate by the announcer
    Suppressed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub now_ms: u64,
    pub verdict: ChangeClass,
    /// Composed utterance, absent for frames with nothing speakable
    pub text: Option<String>,
    pub delivery: Option<Delivery>,
}

pub struct FrameOrchestrator {
    config: SightlineConfig,
    clock: Arc<dyn Clock>,
    grid: DirectionGrid,
    directions: DirectionStabilizer,
    categories: CategoryStabilizer,
    meters: MetersStabilizer,
    dedup: ClusterDeduplicator,
    multi: MultiCountTracker,
    phrases: PhraseBuilder,
    last_signature: Option<Signature>,
    sink: Sink,
}

impl FrameOrchestrator {
    pub fn new(
        config: SightlineConfig,
        output: Output,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, WorldError> {
        config.validate().map_err(WorldError::Config)?;

        let eye = &config.eye;
        let stab = &eye.stabilizer;
        let sink = match output {
            Output::Speech(channel) => Sink::Speech(channel),
            Output::Announcer(announcer) => Sink::Announcer {
                announcer,
                dedup: AnnouncementDeduper::new(config.speech.dup_window_ms),
            },
        };

        Ok(Self {
            clock,
            grid: eye.direction_grid.clone(),
            directions: DirectionStabilizer::new(
                stab.direction_stable_frames,
                stab.null_grace,
                stab.direction_ttl_ms,
            ),
            categories: CategoryStabilizer::new(
                stab.category_stable_frames,
                stab.null_grace,
                stab.category_ttl_ms,
            ),
            meters: MetersStabilizer::new(stab),
            dedup: ClusterDeduplicator::new(eye.iou_threshold),
            multi: MultiCountTracker::new(eye.multi_count.clone()),
            phrases: PhraseBuilder::new(eye.phrase.clone(), eye.labels.clone()),
            last_signature: None,
            sink,
            config,
        })
    }

    pub fn config(&self) -> &SightlineConfig {
        &self.config
    }

    pub fn last_signature(&self) -> Option<&Signature> {
        self.last_signature.as_ref()
    }

    pub fn process_frame(&mut self, detections: Vec<Detection>) -> FrameReport {
        let now = self.clock.now_ms();
        self.purge(now);

        let kept = self.filter(detections);
        let objects: Vec<FrameObject> = self
            .dedup
            .deduplicate(kept)
            .iter()
            .map(|d| self.smooth(d, now))
            .collect();

        if objects.is_empty() {
            return FrameReport {
                now_ms: now,
                verdict: ChangeClass::None,
                text: None,
                delivery: None,
            };
        }

        let views = self.observe_multi_count(&objects, now);
        let selected = self.phrases.select(self.phrases.build(&objects, &views));
        let text = self.phrases.compose(&selected);
        let signature = Signature::from_phrases(&selected);

        let mut verdict = classify_change(self.last_signature.as_ref(), &signature);
        if verdict != ChangeClass::None && selected.iter().any(|p| p.near_escalation) {
            verdict = ChangeClass::Critical;
        }
        debug!(%verdict, objects = objects.len(), text = %text, "Frame classified");
        self.last_signature = Some(signature);

        let delivery = match priority_for(verdict) {
            Some(priority) if !text.is_empty() => Some(self.deliver(&text, priority, now)),
            _ => None,
        };

        FrameReport {
            now_ms: now,
            verdict,
            text: Some(text),
            delivery,
        }
    }

    /// Stop the current utterance. A queued utterance, if any, starts next.
    pub fn stop_speech(&self) {
        if let Sink::Speech(ref channel) = self.sink {
            channel.stop();
        }
    }

    /// Forget every cache and the last signature. The next speakable frame
    /// is announced as critical.
    pub fn reset(&mut self) {
        self.directions.reset();
        self.categories.reset();
        self.meters.reset();
        self.multi.reset();
        self.last_signature = None;
        if let Sink::Announcer { ref mut dedup, .. } = self.sink {
            dedup.reset();
        }
    }

    fn purge(&mut self, now: u64) {
        let evicted = self.directions.purge(now)
            + self.categories.purge(now)
            + self.meters.purge(now)
            + self.multi.purge(now);
        if evicted > 0 {
            debug!(evicted, "Purged expired state");
        }
    }

    fn filter(&self, detections: Vec<Detection>) -> Vec<Detection> {
        let eye = &self.config.eye;
        detections
            .into_iter()
            .filter(|d| {
                let Some(raw) = d.top_label() else {
                    return eye.allow_unlabeled;
                };
                if d.score().is_some_and(|s| s < eye.min_confidence) {
                    return false;
                }
                !eye.labels.is_suppressed(&eye.labels.natural(raw))
            })
            .collect()
    }

    fn smooth(&mut self, d: &Detection, now: u64) -> FrameObject {
        let label = d
            .top_label()
            .map(|raw| self.phrases.labels().natural(raw))
            .unwrap_or_else(|| UNLABELED.to_string());

        let raw_direction = d.valid_box().and_then(|b| {
            let (xc, yc) = b.center();
            self.grid.classify(xc, yc)
        });
        let reading = self.meters.smooth(d.id, d.meters(), d.distance_conf, now);

        let mut obj = FrameObject::new(d.id, label);
        obj.score = d.score();
        obj.direction = self.directions.smooth(d.id, raw_direction, now);
        obj.category = self
            .categories
            .smooth(d.id, d.stable_category(), now)
            .unwrap_or(DistanceCategory::Unknown);
        obj.meters = reading.display;
        obj.meters_conf = reading.conf;
        obj
    }

    fn observe_multi_count(
        &mut self,
        objects: &[FrameObject],
        now: u64,
    ) -> HashMap<String, MultiCountView> {
        let mut members: HashMap<&str, Vec<(i64, DistanceCategory)>> = HashMap::new();
        for obj in objects {
            if self.phrases.labels().is_multi_count(&obj.label) {
                members
                    .entry(obj.label.as_str())
                    .or_default()
                    .push((obj.id, obj.category));
            }
        }
        members
            .into_iter()
            .map(|(label, ids)| {
                let view = self.multi.observe(label, &ids, now);
                (label.to_string(), view)
            })
            .collect()
    }

    fn deliver(&mut self, text: &str, priority: Priority, now: u64) -> Delivery {
        match self.sink {
            Sink::Speech(ref channel) => Delivery::Spoken(channel.request_speak(text, priority)),
            Sink::Announcer {
                ref announcer,
                ref mut dedup,
            } => {
                if dedup.should_announce(text, now) {
                    announcer.announce(text);
                    Delivery::Announced
                } else {
                    Delivery::Suppressed
                }
            }
        }
    }
}

/// Speech priority for a change verdict; `None` means stay quiet.
pub fn priority_for(verdict: ChangeClass) -> Option<Priority> {
    match verdict {
        ChangeClass::Critical => Some(Priority::Critical),
        ChangeClass::Major => Some(Priority::Major),
        ChangeClass::Minor => Some(Priority::Minor),
        ChangeClass::None => None,
    }
}
