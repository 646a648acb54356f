//! Per-id temporal stabilization
//!
//! Raw detector attributes flicker from frame to frame. Each stabilizer keeps
//! a small cache keyed by tracker id and only lets a value through once it
//! has persisted, so phrasing sees ground truth rather than noise.
//!
//! Untracked detections (`id < 0`) bypass smoothing entirely.

use crate::config::StabilizerConfig;
use crate::direction::Direction;
use sightline_core::{DistanceCategory, DistanceConfidence};
use std::collections::HashMap;

/// Debounce state for one categorical attribute of one tracked id.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedAttribute<T> {
    /// Last value that passed the stability gate
    pub stable: Option<T>,
    /// Latest raw candidate
    pub current: Option<T>,
    /// Frames `current` has persisted
    pub consecutive: u32,
    /// Consecutive missing frames since the last raw value
    pub null_hold: u32,
    pub last_seen_ms: u64,
}

impl<T> SmoothedAttribute<T> {
    fn new(now_ms: u64) -> Self {
        Self {
            stable: None,
            current: None,
            consecutive: 0,
            null_hold: 0,
            last_seen_ms: now_ms,
        }
    }
}

/// Hysteresis for discrete values (direction, distance category).
#[derive(Debug, Clone)]
pub struct CategoricalStabilizer<T> {
    entries: HashMap<i64, SmoothedAttribute<T>>,
    stable_frames: u32,
    null_grace: u32,
    ttl_ms: u64,
}

pub type DirectionStabilizer = CategoricalStabilizer<Direction>;
pub type CategoryStabilizer = CategoricalStabilizer<DistanceCategory>;

impl<T: Clone + PartialEq> CategoricalStabilizer<T> {
    pub fn new(stable_frames: u32, null_grace: u32, ttl_ms: u64) -> Self {
        Self {
            entries: HashMap::new(),
            stable_frames: stable_frames.max(1),
            null_grace,
            ttl_ms,
        }
    }

    /// Feed one frame's raw value for `id` and return what should be spoken.
    ///
    /// Returns the stable value when one exists, otherwise the raw value.
    pub fn smooth(&mut self, id: i64, raw: Option<T>, now_ms: u64) -> Option<T> {
        if id < 0 {
            return raw;
        }
        let stable_frames = self.stable_frames;
        let null_grace = self.null_grace;
        let entry = self
            .entries
            .entry(id)
            .or_insert_with(|| SmoothedAttribute::new(now_ms));
        entry.last_seen_ms = now_ms;

        match raw {
            Some(value) => {
                entry.null_hold = 0;
                if entry.current.as_ref() == Some(&value) {
                    entry.consecutive = entry.consecutive.saturating_add(1);
                } else {
                    entry.current = Some(value.clone());
                    entry.consecutive = 1;
                }
                if entry.consecutive >= stable_frames {
                    entry.stable = Some(value.clone());
                }
                Some(entry.stable.clone().unwrap_or(value))
            }
            None => {
                entry.current = None;
                entry.consecutive = 0;
                if entry.stable.is_some() {
                    entry.null_hold = entry.null_hold.saturating_add(1);
                    if entry.null_hold > null_grace {
                        entry.stable = None;
                        entry.null_hold = 0;
                    }
                }
                entry.stable.clone()
            }
        }
    }

    /// Evict ids not seen within the TTL. Returns how many were removed.
    pub fn purge(&mut self, now_ms: u64) -> usize {
        let ttl = self.ttl_ms;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now_ms.saturating_sub(e.last_seen_ms) <= ttl);
        before - self.entries.len()
    }

    pub fn get(&self, id: i64) -> Option<&SmoothedAttribute<T>> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

/// Smoothed meter value ready for phrasing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetersReading {
    /// Quantized, hysteresis-filtered distance; `None` when nothing should be shown
    pub display: Option<f32>,
    pub conf: Option<DistanceConfidence>,
}

impl MetersReading {
    pub const NONE: MetersReading = MetersReading {
        display: None,
        conf: None,
    };
}

#[derive(Debug, Clone)]
struct MetersEntry {
    ema: f32,
    shown: f32,
    conf: Option<DistanceConfidence>,
    last_seen_ms: u64,
}

/// EMA plus a display hysteresis band for metric distance.
#[derive(Debug, Clone)]
pub struct MetersStabilizer {
    entries: HashMap<i64, MetersEntry>,
    alpha: f32,
    near_threshold: f32,
    far_threshold: f32,
    boundary: f32,
    hide_low_confidence: bool,
    ttl_ms: u64,
}

impl MetersStabilizer {
    pub fn new(config: &StabilizerConfig) -> Self {
        Self {
            entries: HashMap::new(),
            alpha: config.ema_alpha,
            near_threshold: config.near_threshold_m,
            far_threshold: config.far_threshold_m,
            boundary: config.meters_boundary,
            hide_low_confidence: config.hide_low_confidence,
            ttl_ms: config.meters_ttl_ms,
        }
    }

    /// Half-meter steps under the boundary, whole meters at or above it.
    pub fn quantize(&self, v: f32) -> f32 {
        quantize_at(v, self.boundary)
    }

    pub fn smooth(
        &mut self,
        id: i64,
        raw: Option<f32>,
        conf: Option<DistanceConfidence>,
        now_ms: u64,
    ) -> MetersReading {
        let raw = raw.filter(|m| m.is_finite() && *m > 0.0);
        if id < 0 {
            return MetersReading { display: raw, conf };
        }
        let hidden = self.hide_low_confidence && conf == Some(DistanceConfidence::Low);

        let Some(value) = raw else {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.last_seen_ms = now_ms;
            }
            return MetersReading::NONE;
        };

        if hidden {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.last_seen_ms = now_ms;
            }
            return MetersReading { display: None, conf };
        }

        let quantized = self.quantize(value);
        let Some(entry) = self.entries.get_mut(&id) else {
            self.entries.insert(
                id,
                MetersEntry {
                    ema: value,
                    shown: quantized,
                    conf,
                    last_seen_ms: now_ms,
                },
            );
            return MetersReading {
                display: Some(quantized),
                conf,
            };
        };

        entry.ema = self.alpha * value + (1.0 - self.alpha) * entry.ema;
        entry.last_seen_ms = now_ms;
        entry.conf = conf;

        let prev = entry.shown;
        let desired = quantize_at(entry.ema, self.boundary);
        let floor = prev.min(desired);
        let threshold = if floor < self.boundary {
            self.near_threshold
        } else {
            self.far_threshold
        };
        if (desired - prev).abs() >= threshold {
            entry.shown = desired;
        }

        MetersReading {
            display: Some(entry.shown),
            conf: entry.conf,
        }
    }

    pub fn purge(&mut self, now_ms: u64) -> usize {
        let ttl = self.ttl_ms;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now_ms.saturating_sub(e.last_seen_ms) <= ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

fn quantize_at(v: f32, boundary: f32) -> f32 {
    if v < boundary {
        (v * 2.0).round() / 2.0
    } else {
        v.round()
    }
}
