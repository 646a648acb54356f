//! Coarse summaries of the speakable state and change classification
//!
//! Signatures are compared structurally on bucketed counts so that a single
//! id flickering in and out does not trigger speech.

use crate::phrase::GroupPhrase;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Collapse a raw count to {0, 1, 2, 3 (3-4), 5 (5+)}.
pub fn bucket_count(n: usize) -> u8 {
    match n {
        0..=2 => n as u8,
        3..=4 => 3,
        _ => 5,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSignature {
    pub label: String,
    pub priority: u8,
    pub count_bucket: u8,
    pub critical: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub groups: Vec<GroupSignature>,
    pub has_critical: bool,
    pub sum_bucket: u8,
}

impl Signature {
    /// Summarize the groups chosen for speech, in speaking order.
    pub fn from_phrases(phrases: &[GroupPhrase]) -> Self {
        let groups: Vec<GroupSignature> = phrases
            .iter()
            .map(|p| GroupSignature {
                label: p.label.clone(),
                priority: p.priority,
                count_bucket: p.count_bucket,
                critical: p.critical,
            })
            .collect();
        // multi-count groups contribute their stable bucket, not the raw total
        let sum: usize = phrases
            .iter()
            .map(|p| {
                if p.multi_count {
                    p.count_bucket as usize
                } else {
                    p.total
                }
            })
            .sum();

        Self {
            has_critical: groups.iter().any(|g| g.critical),
            sum_bucket: bucket_count(sum),
            groups,
        }
    }

    fn is_consistent(&self) -> bool {
        let mut seen = HashSet::new();
        let unique = self.groups.iter().all(|g| seen.insert(g.label.as_str()));
        unique && self.has_critical == self.groups.iter().any(|g| g.critical)
    }
}

/// How much the speakable state moved between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeClass {
    None,
    Minor,
    Major,
    Critical,
}

impl fmt::Display for ChangeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeClass::None => "none",
            ChangeClass::Minor => "minor",
            ChangeClass::Major => "major",
            ChangeClass::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Classify the transition `prev -> curr`. First matching rule wins.
///
/// Never fails: signatures with duplicate labels or a `has_critical` flag
/// that disagrees with their groups classify as `Minor`.
pub fn classify_change(prev: Option<&Signature>, curr: &Signature) -> ChangeClass {
    let Some(prev) = prev else {
        return ChangeClass::Critical;
    };

    if prev.has_critical != curr.has_critical {
        return ChangeClass::Critical;
    }

    let prev_groups: HashMap<&str, &GroupSignature> =
        prev.groups.iter().map(|g| (g.label.as_str(), g)).collect();

    if curr
        .groups
        .iter()
        .any(|g| g.critical && !prev_groups.contains_key(g.label.as_str()))
    {
        return ChangeClass::Critical;
    }

    if !prev.is_consistent() || !curr.is_consistent() {
        return ChangeClass::Minor;
    }

    let curr_labels: HashSet<&str> = curr.groups.iter().map(|g| g.label.as_str()).collect();

    let total_jump = (curr.sum_bucket as i16 - prev.sum_bucket as i16).abs() >= 2;
    let group_changed = curr.groups.iter().any(|g| match prev_groups.get(g.label.as_str()) {
        None => true,
        Some(pg) => pg.priority != g.priority || pg.count_bucket != g.count_bucket,
    });
    let group_gone = prev
        .groups
        .iter()
        .any(|g| !curr_labels.contains(g.label.as_str()));

    if total_jump || group_changed || group_gone {
        return ChangeClass::Major;
    }

    if prev == curr {
        ChangeClass::None
    } else {
        ChangeClass::Minor
    }
}
