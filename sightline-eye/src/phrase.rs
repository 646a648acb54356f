//! Grouping stabilized objects by label and phrasing each group
//!
//! Output is one [`GroupPhrase`] per label, carrying the text plus the
//! metadata the signature and the speech arbiter need.

use crate::config::PhraseConfig;
use crate::direction::Direction;
use crate::labels::{join_human, pluralize, LabelPolicy};
use crate::multicount::{MultiCountView, SemanticBucket};
use crate::signature::bucket_count;
use once_cell::sync::Lazy;
use regex::Regex;
use sightline_core::{DistanceCategory, DistanceConfidence};
use std::cmp::Ordering;
use std::collections::HashMap;

/// One detection after filtering, dedup and smoothing.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameObject {
    pub id: i64,
    /// Natural-language label
    pub label: String,
    pub score: Option<f32>,
    pub direction: Option<Direction>,
    pub category: DistanceCategory,
    /// Smoothed display distance in meters
    pub meters: Option<f32>,
    pub meters_conf: Option<DistanceConfidence>,
}

impl FrameObject {
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            score: None,
            direction: None,
            category: DistanceCategory::Unknown,
            meters: None,
            meters_conf: None,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_category(mut self, category: DistanceCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_meters(mut self, meters: f32, conf: DistanceConfidence) -> Self {
        self.meters = Some(meters);
        self.meters_conf = Some(conf);
        self
    }
}

const CATEGORIES: [DistanceCategory; 4] = [
    DistanceCategory::Near,
    DistanceCategory::Mid,
    DistanceCategory::Far,
    DistanceCategory::Unknown,
];

/// All objects sharing a natural label in one frame.
#[derive(Debug, Clone)]
pub struct Group {
    pub label: String,
    pub members: Vec<FrameObject>,
    /// Member count per category, indexed by urgency
    pub histogram: [usize; 4],
    /// Lowest urgency among known categories, 3 when none is known
    pub priority: u8,
    pub has_near: bool,
    pub critical: bool,
}

impl Group {
    pub fn total(&self) -> usize {
        self.members.len()
    }

    fn is_uniform(&self) -> bool {
        self.histogram.iter().filter(|&&n| n > 0).count() <= 1
    }
}

/// Speakable result for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPhrase {
    pub label: String,
    pub phrase: String,
    pub priority: u8,
    pub total: usize,
    /// Bucketed count as used in signatures
    pub count_bucket: u8,
    pub has_near: bool,
    pub critical: bool,
    pub multi_count: bool,
    /// Multi-count label newly reached near on this frame
    pub near_escalation: bool,
}

static AHEAD_REPEAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bahead(?:\s+ahead\b)+").expect("Invalid regex pattern"));
static CLOSE_AHEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bclose\s+ahead\b").expect("Invalid regex pattern"));
static NEAR_DISTANCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bnear(?:\s+distance\b)+").expect("Invalid regex pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

/// Collapse doubled and redundant wording. Idempotent.
///
/// "ahead ahead" -> "ahead", "directly ahead ahead" -> "directly ahead",
/// "close ahead" -> "close", "near distance" -> "near".
pub fn sanitize(phrase: &str) -> String {
    let s = AHEAD_REPEAT.replace_all(phrase, "ahead");
    let s = CLOSE_AHEAD.replace_all(&s, "close");
    let s = NEAR_DISTANCE.replace_all(&s, "near");
    let s = WHITESPACE.replace_all(&s, " ");
    s.trim().to_string()
}

#[derive(Debug, Clone)]
pub struct PhraseBuilder {
    config: PhraseConfig,
    labels: LabelPolicy,
}

impl PhraseBuilder {
    pub fn new(config: PhraseConfig, labels: LabelPolicy) -> Self {
        Self { config, labels }
    }

    pub fn labels(&self) -> &LabelPolicy {
        &self.labels
    }

    /// Partition by label, keeping first-appearance order.
    pub fn group(&self, objects: &[FrameObject]) -> Vec<Group> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();

        for obj in objects {
            let slot = *index.entry(obj.label.as_str()).or_insert_with(|| {
                groups.push(Group {
                    label: obj.label.clone(),
                    members: Vec::new(),
                    histogram: [0; 4],
                    priority: DistanceCategory::Unknown.urgency(),
                    has_near: false,
                    critical: self.labels.is_critical(&obj.label),
                });
                groups.len() - 1
            });
            let group = &mut groups[slot];
            group.histogram[obj.category.urgency() as usize] += 1;
            if obj.category.is_known() {
                group.priority = group.priority.min(obj.category.urgency());
            }
            group.has_near |= obj.category == DistanceCategory::Near;
            group.members.push(obj.clone());
        }

        groups
    }

    /// Phrase every group. `multi` holds the id-presence view of each
    /// multi-count label seen this frame.
    pub fn build(
        &self,
        objects: &[FrameObject],
        multi: &HashMap<String, MultiCountView>,
    ) -> Vec<GroupPhrase> {
        self.group(objects)
            .iter()
            .map(|g| match multi.get(&g.label) {
                Some(view) if self.labels.is_multi_count(&g.label) => self.phrase_multi(g, view),
                _ => self.phrase_group(g),
            })
            .collect()
    }

    pub fn phrase_group(&self, group: &Group) -> GroupPhrase {
        let text = if group.total() == 1 {
            self.single(group.critical, &group.members[0])
        } else if group.is_uniform() {
            self.uniform(group)
        } else if group.total() <= self.config.small_group_max {
            self.mixed_small(group)
        } else {
            self.mixed_large(group)
        };

        GroupPhrase {
            label: group.label.clone(),
            phrase: text,
            priority: group.priority,
            total: group.total(),
            count_bucket: bucket_count(group.total()),
            has_near: group.has_near,
            critical: group.critical,
            multi_count: false,
            near_escalation: false,
        }
    }

    pub fn phrase_multi(&self, group: &Group, view: &MultiCountView) -> GroupPhrase {
        let bucket = match view.bucket {
            SemanticBucket::None => SemanticBucket::One,
            b => b,
        };
        let mut text = format!("{} {}", bucket.phrase(&group.label), view.category.word());
        if group.total() == 1 {
            if let Some(dir) = group.members[0].direction.filter(|d| *d != Direction::DirectlyAhead) {
                text.push(' ');
                text.push_str(dir.phrase());
            }
        }

        GroupPhrase {
            label: group.label.clone(),
            phrase: text,
            priority: view.category.urgency(),
            total: group.total(),
            count_bucket: bucket.signature_count(),
            has_near: view.category == DistanceCategory::Near,
            critical: group.critical,
            multi_count: true,
            near_escalation: view.escalated,
        }
    }

    fn single(&self, critical: bool, obj: &FrameObject) -> String {
        let mut text = format!("{} {}", obj.label, obj.category.word());
        if let Some(dir) = obj.direction.filter(|d| *d != Direction::DirectlyAhead) {
            text.push(' ');
            text.push_str(dir.phrase());
        }
        let tail_allowed = match obj.meters_conf {
            Some(DistanceConfidence::High) => true,
            Some(DistanceConfidence::Med) => critical,
            _ => false,
        };
        if let (true, Some(m)) = (tail_allowed, obj.meters) {
            text.push_str(&format!(", about {} {}", format_meters(m), meter_unit(m)));
        }
        text
    }

    fn uniform(&self, group: &Group) -> String {
        let n = group.total();
        let word = group.members[0].category.word();
        let mut text = format!("{} {} {}", n, pluralize(&group.label), word);

        if n <= self.config.uniform_direction_limit {
            let dirs: Option<Vec<Direction>> = group.members.iter().map(|m| m.direction).collect();
            if let Some(mut dirs) = dirs {
                dirs.sort();
                dirs.dedup();
                dirs.truncate(self.config.max_direction_mentions);
                let names: Vec<&str> = dirs.iter().map(|d| d.phrase()).collect();
                text.push_str(", ");
                text.push_str(&join_human(&names));
            }
        }
        text
    }

    fn mixed_small(&self, group: &Group) -> String {
        let segments: Vec<String> = CATEGORIES
            .iter()
            .filter(|cat| group.histogram[cat.urgency() as usize] > 0)
            .map(|&cat| {
                let count = group.histogram[cat.urgency() as usize];
                if cat == DistanceCategory::Unknown {
                    return format!("{} at unknown distance", count);
                }
                let mut dirs: Vec<Direction> = group
                    .members
                    .iter()
                    .filter(|m| m.category == cat)
                    .filter_map(|m| m.direction)
                    .collect();
                dirs.sort();
                dirs.dedup();
                let mut seg = format!("{} {}", count, cat.word());
                if !dirs.is_empty() && dirs.len() <= self.config.segment_direction_limit {
                    let names: Vec<&str> = dirs.iter().map(|d| d.phrase()).collect();
                    seg.push(' ');
                    seg.push_str(&join_human(&names));
                }
                seg
            })
            .collect();

        format!("{} {}: {}", group.total(), pluralize(&group.label), segments.join(", "))
    }

    fn mixed_large(&self, group: &Group) -> String {
        let segments: Vec<String> = CATEGORIES
            .iter()
            .filter(|cat| group.histogram[cat.urgency() as usize] > 0)
            .map(|&cat| {
                let count = group.histogram[cat.urgency() as usize];
                if cat == DistanceCategory::Unknown {
                    format!("{} at unknown distance", count)
                } else {
                    format!("{} {}", count, cat.word())
                }
            })
            .collect();

        format!("{} {}: {}", group.total(), pluralize(&group.label), segments.join(", "))
    }

    /// Most urgent groups first, at most `max_groups_spoken` of them.
    pub fn select(&self, mut phrases: Vec<GroupPhrase>) -> Vec<GroupPhrase> {
        phrases.sort_by(speaking_order);
        phrases.truncate(self.config.max_groups_spoken);
        phrases
    }

    /// Join selected group phrases into one utterance. This is the only
    /// place [`sanitize`] runs.
    pub fn compose(&self, selected: &[GroupPhrase]) -> String {
        let parts: Vec<&str> = selected
            .iter()
            .map(|p| p.phrase.as_str())
            .filter(|p| !p.is_empty())
            .collect();
        sanitize(&join_human(&parts))
    }
}

fn speaking_order(a: &GroupPhrase, b: &GroupPhrase) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| b.critical.cmp(&a.critical))
        .then_with(|| b.total.cmp(&a.total))
        .then_with(|| a.label.cmp(&b.label))
}

fn format_meters(m: f32) -> String {
    if m.fract() == 0.0 {
        format!("{:.0}", m)
    } else {
        format!("{:.1}", m)
    }
}

fn meter_unit(m: f32) -> &'static str {
    if m == 1.0 {
        "meter"
    } else {
        "meters"
    }
}
