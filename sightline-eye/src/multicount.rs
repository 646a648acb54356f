//! Id-presence counting for labels that show up in crowds
//!
//! Vehicles and bicycles come and go by the handful and their tracker ids
//! flicker. Instead of speaking raw member counts, each label keeps the set
//! of ids seen recently and reports a coarse bucket that only moves when the
//! change has been around long enough to matter.

use crate::config::MultiCountConfig;
use crate::labels::pluralize;
use serde::{Deserialize, Serialize};
use sightline_core::DistanceCategory;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticBucket {
    None,
    One,
    Few,
    Several,
}

impl SemanticBucket {
    pub fn from_count(n: usize) -> Self {
        match n {
            0 => SemanticBucket::None,
            1 => SemanticBucket::One,
            2..=3 => SemanticBucket::Few,
            _ => SemanticBucket::Several,
        }
    }

    /// Representative count used in signatures.
    pub fn signature_count(self) -> u8 {
        match self {
            SemanticBucket::None => 0,
            SemanticBucket::One => 1,
            SemanticBucket::Few => 3,
            SemanticBucket::Several => 5,
        }
    }

    /// "one car", "a few cars", "several cars"; empty for `None`.
    pub fn phrase(self, label: &str) -> String {
        match self {
            SemanticBucket::None => String::new(),
            SemanticBucket::One => format!("one {}", label),
            SemanticBucket::Few => format!("a few {}", pluralize(label)),
            SemanticBucket::Several => format!("several {}", pluralize(label)),
        }
    }
}

/// What a multi-count label should be spoken as this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiCountView {
    pub bucket: SemanticBucket,
    /// Reported nearest category, with de-escalation hysteresis applied
    pub category: DistanceCategory,
    /// The label reached `near` on this frame
    pub escalated: bool,
    /// Ids present within the absence timeout plus untracked members
    pub stable_count: usize,
}

#[derive(Debug, Clone)]
struct LabelState {
    ids: HashMap<i64, (u64, DistanceCategory)>,
    reported_bucket: SemanticBucket,
    bucket_spoken_at: u64,
    reported_category: DistanceCategory,
    last_near_at: u64,
    last_observed_at: u64,
}

#[derive(Debug, Clone)]
pub struct MultiCountTracker {
    config: MultiCountConfig,
    labels: HashMap<String, LabelState>,
}

impl MultiCountTracker {
    pub fn new(config: MultiCountConfig) -> Self {
        Self {
            config,
            labels: HashMap::new(),
        }
    }

    /// Record this frame's members of `label` as `(id, category)` pairs.
    pub fn observe(
        &mut self,
        label: &str,
        members: &[(i64, DistanceCategory)],
        now_ms: u64,
    ) -> MultiCountView {
        let absence = self.config.absence_timeout_ms;
        let mut transient = Vec::new();

        let state = match self.labels.get_mut(label) {
            Some(state) => state,
            None => {
                let mut ids = HashMap::new();
                for &(id, cat) in members {
                    if id >= 0 {
                        ids.insert(id, (now_ms, cat));
                    } else {
                        transient.push(cat);
                    }
                }
                let stable_count = ids.len() + transient.len();
                let category = nearest(ids.values().map(|(_, c)| *c).chain(transient.iter().copied()));
                let bucket = SemanticBucket::from_count(stable_count);
                self.labels.insert(
                    label.to_string(),
                    LabelState {
                        ids,
                        reported_bucket: bucket,
                        bucket_spoken_at: now_ms,
                        reported_category: category,
                        last_near_at: now_ms,
                        last_observed_at: now_ms,
                    },
                );
                return MultiCountView {
                    bucket,
                    category,
                    escalated: category == DistanceCategory::Near,
                    stable_count,
                };
            }
        };

        for &(id, cat) in members {
            if id >= 0 {
                state.ids.insert(id, (now_ms, cat));
            } else {
                transient.push(cat);
            }
        }
        state
            .ids
            .retain(|_, (seen, _)| now_ms.saturating_sub(*seen) <= absence);
        state.last_observed_at = now_ms;

        let stable_count = state.ids.len() + transient.len();
        let bucket = SemanticBucket::from_count(stable_count);
        let raw = nearest(
            state
                .ids
                .values()
                .map(|(_, c)| *c)
                .chain(transient.iter().copied()),
        );

        let mut escalated = false;
        if raw == DistanceCategory::Near {
            state.last_near_at = now_ms;
            if state.reported_category != DistanceCategory::Near {
                debug!(label, "Multi-count label reached near");
                state.reported_category = DistanceCategory::Near;
                state.reported_bucket = bucket;
                state.bucket_spoken_at = now_ms;
                escalated = true;
            }
        } else if state.reported_category == DistanceCategory::Near {
            if now_ms.saturating_sub(state.last_near_at) >= self.config.near_deescalation_ms {
                debug!(label, category = ?raw, "Multi-count label de-escalated");
                state.reported_category = raw;
            }
        } else {
            state.reported_category = raw;
        }

        if bucket != state.reported_bucket
            && now_ms.saturating_sub(state.bucket_spoken_at) >= self.config.bucket_change_interval_ms
        {
            debug!(label, from = ?state.reported_bucket, to = ?bucket, "Multi-count bucket changed");
            state.reported_bucket = bucket;
            state.bucket_spoken_at = now_ms;
        }

        MultiCountView {
            bucket: state.reported_bucket,
            category: state.reported_category,
            escalated,
            stable_count,
        }
    }

    /// Drop expired ids, then labels with nothing left to remember.
    pub fn purge(&mut self, now_ms: u64) -> usize {
        let absence = self.config.absence_timeout_ms;
        let before = self.labels.len();
        self.labels.retain(|_, state| {
            state
                .ids
                .retain(|_, (seen, _)| now_ms.saturating_sub(*seen) <= absence);
            !state.ids.is_empty() || now_ms.saturating_sub(state.last_observed_at) <= absence
        });
        before - self.labels.len()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn reset(&mut self) {
        self.labels.clear();
    }
}

fn nearest(cats: impl Iterator<Item = DistanceCategory>) -> DistanceCategory {
    cats.filter(|c| c.is_known())
        .min_by_key(|c| c.urgency())
        .unwrap_or(DistanceCategory::Unknown)
}
