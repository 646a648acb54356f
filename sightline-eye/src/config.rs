//! Configuration for sightline-eye

use crate::direction::DirectionGrid;
use crate::labels::LabelPolicy;
use serde::{Deserialize, Serialize};

/// Temporal smoothing parameters for the three per-id stabilizers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Consecutive equal frames before a direction becomes stable
    pub direction_stable_frames: u32,
    /// Consecutive equal frames before a distance category becomes stable
    pub category_stable_frames: u32,
    /// Missing frames tolerated before a stable value is cleared
    pub null_grace: u32,
    pub direction_ttl_ms: u64,
    pub category_ttl_ms: u64,
    pub meters_ttl_ms: u64,
    /// EMA weight of the newest meter sample
    pub ema_alpha: f32,
    /// Display hysteresis below `meters_boundary`
    pub near_threshold_m: f32,
    /// Display hysteresis at or above `meters_boundary`
    pub far_threshold_m: f32,
    pub meters_boundary: f32,
    /// Skip low-confidence meter samples for display
    pub hide_low_confidence: bool,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            direction_stable_frames: 3,
            category_stable_frames: 3,
            null_grace: 2,
            direction_ttl_ms: 9_000,
            category_ttl_ms: 9_000,
            meters_ttl_ms: 9_000,
            ema_alpha: 0.35,
            near_threshold_m: 0.5,
            far_threshold_m: 1.0,
            meters_boundary: 10.0,
            hide_low_confidence: true,
        }
    }
}

impl StabilizerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.direction_stable_frames == 0 || self.category_stable_frames == 0 {
            return Err("Stable frame counts must be at least 1".to_string());
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err("EMA alpha must be in (0, 1]".to_string());
        }
        if !(self.near_threshold_m >= 0.0 && self.far_threshold_m >= 0.0) {
            return Err("Meter thresholds must be non-negative".to_string());
        }
        if !(self.meters_boundary > 0.0 && self.meters_boundary.is_finite()) {
            return Err("Meters boundary must be positive".to_string());
        }
        if self.direction_ttl_ms == 0 || self.category_ttl_ms == 0 || self.meters_ttl_ms == 0 {
            return Err("Cache TTLs must be non-zero".to_string());
        }
        Ok(())
    }
}

/// Phrase shaping limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseConfig {
    /// Uniform groups list directions only up to this many members
    pub uniform_direction_limit: usize,
    /// Mixed groups up to this size get per-segment directions
    pub small_group_max: usize,
    /// A mixed segment names directions only when it has at most this many
    pub segment_direction_limit: usize,
    /// Upper bound on directions named in one uniform phrase
    pub max_direction_mentions: usize,
    /// Groups joined into a single utterance
    pub max_groups_spoken: usize,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        Self {
            uniform_direction_limit: 3,
            small_group_max: 4,
            segment_direction_limit: 3,
            max_direction_mentions: 2,
            max_groups_spoken: 3,
        }
    }
}

impl PhraseConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_groups_spoken == 0 {
            return Err("max_groups_spoken must be at least 1".to_string());
        }
        if self.max_direction_mentions == 0 {
            return Err("max_direction_mentions must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Id-presence bookkeeping for multi-count labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiCountConfig {
    pub absence_timeout_ms: u64,
    pub bucket_change_interval_ms: u64,
    pub near_deescalation_ms: u64,
}

impl Default for MultiCountConfig {
    fn default() -> Self {
        Self {
            absence_timeout_ms: 900,
            bucket_change_interval_ms: 2_500,
            near_deescalation_ms: 1_500,
        }
    }
}

impl MultiCountConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.absence_timeout_ms == 0 {
            return Err("Absence timeout must be non-zero".to_string());
        }
        Ok(())
    }
}

/// Vision-side configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeConfig {
    pub stabilizer: StabilizerConfig,
    pub phrase: PhraseConfig,
    pub multi_count: MultiCountConfig,
    /// Overlapping boxes merge when IoU is strictly above this
    pub iou_threshold: f32,
    /// Detections whose top label scores below this are ignored
    pub min_confidence: f32,
    /// Speak label-less detections as "object"
    pub allow_unlabeled: bool,
    pub labels: LabelPolicy,
    pub direction_grid: DirectionGrid,
}

impl Default for EyeConfig {
    fn default() -> Self {
        Self {
            stabilizer: StabilizerConfig::default(),
            phrase: PhraseConfig::default(),
            multi_count: MultiCountConfig::default(),
            iou_threshold: 0.5,
            min_confidence: 0.5,
            allow_unlabeled: true,
            labels: LabelPolicy::default(),
            direction_grid: DirectionGrid::default(),
        }
    }
}

impl EyeConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err("IoU threshold must be between 0 and 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err("Minimum confidence must be between 0 and 1".to_string());
        }
        self.stabilizer.validate()?;
        self.phrase.validate()?;
        self.multi_count.validate()?;
        self.labels.validate()?;
        Ok(())
    }
}
