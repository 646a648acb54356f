//! Detection records as produced by the external detector, one per object per frame

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tracker id used by the detector for objects it could not track reliably.
pub const UNTRACKED_ID: i64 = -1;

/// Normalized bounding box, all components in `[0, 1]`.
///
/// Serialized as a `[x, y, w, h]` array to match detector output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// A box is usable when every component is finite and its size is non-negative.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.w.is_finite()
            && self.h.is_finite()
            && self.w >= 0.0
            && self.h >= 0.0
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x, b.y, b.w, b.h]
    }
}

/// One ranked label hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub name: String,
    #[serde(alias = "c")]
    pub confidence: f32,
}

impl LabelScore {
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// Confidence the detector reports for its metric distance estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceConfidence {
    High,
    #[serde(alias = "medium")]
    Med,
    Low,
}

/// Coarse distance bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceCategory {
    Near,
    Mid,
    Far,
    Unknown,
}

impl DistanceCategory {
    /// Lower is more urgent.
    pub fn urgency(self) -> u8 {
        match self {
            DistanceCategory::Near => 0,
            DistanceCategory::Mid => 1,
            DistanceCategory::Far => 2,
            DistanceCategory::Unknown => 3,
        }
    }

    pub fn is_known(self) -> bool {
        self != DistanceCategory::Unknown
    }

    /// Spoken form used in phrases.
    pub fn word(self) -> &'static str {
        match self {
            DistanceCategory::Near => "close",
            DistanceCategory::Mid => "ahead",
            DistanceCategory::Far => "far",
            DistanceCategory::Unknown => "ahead",
        }
    }
}

/// Whether the detector considers its distance category settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryStability {
    Stable,
    Unstable,
}

/// Speech priority class. Ordered so that `Critical` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Minor,
    Major,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Critical => "critical",
            Priority::Major => "major",
            Priority::Minor => "minor",
        };
        f.write_str(s)
    }
}

/// A single detected object in one frame.
///
/// Every attribute other than `id` may be missing or malformed; consumers
/// treat those as "no value" rather than rejecting the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default = "untracked")]
    pub id: i64,

    #[serde(rename = "box", alias = "b", default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,

    /// Ranked hypotheses, highest confidence first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelScore>,

    /// Single-label shorthand used by simpler detectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_conf: Option<DistanceConfidence>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_cat: Option<DistanceCategory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_cat_conf: Option<CategoryStability>,
}

fn untracked() -> i64 {
    UNTRACKED_ID
}

impl Detection {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            bbox: None,
            labels: Vec::new(),
            label: None,
            distance_m: None,
            distance_conf: None,
            distance_cat: None,
            distance_cat_conf: None,
        }
    }

    pub fn with_label(mut self, name: impl Into<String>, confidence: f32) -> Self {
        self.labels.push(LabelScore::new(name, confidence));
        self
    }

    pub fn with_box(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.bbox = Some(BBox::new(x, y, w, h));
        self
    }

    pub fn with_category(mut self, cat: DistanceCategory, stability: CategoryStability) -> Self {
        self.distance_cat = Some(cat);
        self.distance_cat_conf = Some(stability);
        self
    }

    pub fn with_meters(mut self, meters: f32, conf: DistanceConfidence) -> Self {
        self.distance_m = Some(meters);
        self.distance_conf = Some(conf);
        self
    }

    pub fn is_tracked(&self) -> bool {
        self.id >= 0
    }

    /// Top-ranked label name, falling back to the shorthand `label` field.
    pub fn top_label(&self) -> Option<&str> {
        self.labels
            .first()
            .map(|l| l.name.as_str())
            .or(self.label.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Confidence of the top-ranked label, if the detector reported one.
    pub fn score(&self) -> Option<f32> {
        self.labels
            .first()
            .map(|l| l.confidence)
            .filter(|c| c.is_finite())
    }

    /// Box, if present and well-formed.
    pub fn valid_box(&self) -> Option<&BBox> {
        self.bbox.as_ref().filter(|b| b.is_valid())
    }

    /// Metric distance, if present, finite and positive.
    pub fn meters(&self) -> Option<f32> {
        self.distance_m.filter(|m| m.is_finite() && *m > 0.0)
    }

    /// Distance category only when the detector marks it stable and known.
    pub fn stable_category(&self) -> Option<DistanceCategory> {
        match (self.distance_cat, self.distance_cat_conf) {
            (Some(cat), Some(CategoryStability::Stable)) if cat.is_known() => Some(cat),
            _ => None,
        }
    }
}
