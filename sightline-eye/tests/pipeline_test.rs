//! Tests for the vision-side stages chained together:
//! dedup -> smoothing -> phrasing -> signature -> classification

use sightline_core::{CategoryStability, Detection, DistanceCategory};
use sightline_eye::{
    classify_change, CategoryStabilizer, ChangeClass, ClusterDeduplicator, DirectionGrid,
    DirectionStabilizer, EyeConfig, FrameObject, PhraseBuilder, Signature,
};
use std::collections::HashMap;

struct Stages {
    dedup: ClusterDeduplicator,
    grid: DirectionGrid,
    directions: DirectionStabilizer,
    categories: CategoryStabilizer,
    phrases: PhraseBuilder,
    last: Option<Signature>,
}

impl Stages {
    fn new() -> Self {
        let config = EyeConfig::default();
        Self {
            dedup: ClusterDeduplicator::new(config.iou_threshold),
            grid: config.direction_grid.clone(),
            directions: DirectionStabilizer::new(3, 2, 9_000),
            categories: CategoryStabilizer::new(3, 2, 9_000),
            phrases: PhraseBuilder::new(config.phrase.clone(), config.labels.clone()),
            last: None,
        }
    }

    fn frame(&mut self, detections: Vec<Detection>, now: u64) -> (ChangeClass, String) {
        let objects: Vec<FrameObject> = self
            .dedup
            .deduplicate(detections)
            .into_iter()
            .map(|d| {
                let label = self.phrases.labels().natural(d.top_label().unwrap_or("object"));
                let raw_dir = d.valid_box().and_then(|b| {
                    let (xc, yc) = b.center();
                    self.grid.classify(xc, yc)
                });
                let mut obj = FrameObject::new(d.id, label);
                obj.direction = self.directions.smooth(d.id, raw_dir, now);
                obj.category = self
                    .categories
                    .smooth(d.id, d.stable_category(), now)
                    .unwrap_or(DistanceCategory::Unknown);
                obj
            })
            .collect();

        let selected = self.phrases.select(self.phrases.build(&objects, &HashMap::new()));
        let sig = Signature::from_phrases(&selected);
        let verdict = classify_change(self.last.as_ref(), &sig);
        self.last = Some(sig);
        (verdict, self.phrases.compose(&selected))
    }
}

fn stop_sign() -> Detection {
    Detection::new(5)
        .with_label("stop_sign", 0.9)
        .with_box(0.4, 0.3, 0.2, 0.2)
        .with_category(DistanceCategory::Near, CategoryStability::Stable)
}

#[test]
fn test_repeated_stop_sign_is_spoken_once() {
    let mut stages = Stages::new();
    let (verdict, text) = stages.frame(vec![stop_sign()], 0);
    assert_eq!(verdict, ChangeClass::Critical);
    assert_eq!(text, "stop sign close");

    for i in 1..10 {
        let (verdict, _) = stages.frame(vec![stop_sign()], i * 100);
        assert_eq!(verdict, ChangeClass::None, "frame {}", i);
    }
}

#[test]
fn test_duplicate_boxes_collapse_before_phrasing() {
    let mut stages = Stages::new();
    let a = Detection::new(1).with_label("dog", 0.7).with_box(0.1, 0.4, 0.2, 0.2);
    let b = Detection::new(2).with_label("dog", 0.9).with_box(0.11, 0.4, 0.2, 0.2);
    let (_, text) = stages.frame(vec![a, b], 0);
    assert_eq!(text, "dog ahead left");
}

#[test]
fn test_direction_flicker_does_not_reach_speech() {
    let mut stages = Stages::new();
    let left = || Detection::new(3).with_label("person", 0.9).with_box(0.05, 0.4, 0.2, 0.2);
    let right = || Detection::new(3).with_label("person", 0.9).with_box(0.75, 0.4, 0.2, 0.2);

    for t in 0..3 {
        stages.frame(vec![left()], t * 100);
    }
    let (verdict, text) = stages.frame(vec![right()], 300);
    assert_eq!(text, "person ahead left");
    assert_eq!(verdict, ChangeClass::None);
}

#[test]
fn test_unstable_category_is_not_trusted() {
    let mut stages = Stages::new();
    let det = Detection::new(1)
        .with_label("bench", 0.9)
        .with_box(0.4, 0.4, 0.2, 0.2)
        .with_category(DistanceCategory::Near, CategoryStability::Unstable);
    let (_, text) = stages.frame(vec![det], 0);
    assert_eq!(text, "bench ahead");
}
