use proptest::prelude::*;
use sightline_core::{BBox, DistanceCategory};
use sightline_eye::{
    classify_change, iou, sanitize, CategoricalStabilizer, ChangeClass, GroupSignature, Signature,
};

const WORDS: &[&str] = &[
    "ahead", "Ahead", "close", "near", "distance", "directly", "left", "car", ",", " ", "  ", "\t",
];

fn phrase() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS), 0..16).prop_map(|w| w.join(" "))
}

fn bbox() -> impl Strategy<Value = BBox> {
    (0.0f32..1.0, 0.0f32..1.0, 0.01f32..0.5, 0.01f32..0.5).prop_map(|(x, y, w, h)| BBox::new(x, y, w, h))
}

fn signature() -> impl Strategy<Value = Signature> {
    let labels = prop::sample::select(vec!["car", "chair", "person", "stop sign", "door"]);
    prop::collection::vec((labels, 0u8..3, prop::sample::select(vec![1u8, 2, 3, 5])), 0..4).prop_map(
        |groups| {
            let mut seen = std::collections::HashSet::new();
            let groups: Vec<GroupSignature> = groups
                .into_iter()
                .filter(|(label, _, _)| seen.insert(*label))
                .map(|(label, priority, count_bucket)| GroupSignature {
                    label: label.to_string(),
                    priority,
                    count_bucket,
                    critical: label == "stop sign",
                })
                .collect();
            let sum: usize = groups.iter().map(|g| g.count_bucket as usize).sum();
            Signature {
                has_critical: groups.iter().any(|g| g.critical),
                sum_bucket: sightline_eye::bucket_count(sum),
                groups,
            }
        },
    )
}

proptest! {
    #[test]
    fn test_sanitize_is_idempotent(text in phrase()) {
        let once = sanitize(&text);
        prop_assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn test_sanitize_ascii_is_idempotent(text in "[a-z ,]{0,48}") {
        let once = sanitize(&text);
        prop_assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn test_iou_symmetric_and_bounded(a in bbox(), b in bbox()) {
        let ab = iou(&a, &b);
        let ba = iou(&b, &a);
        prop_assert!((ab - ba).abs() < 1e-6);
        prop_assert!((0.0..=1.0).contains(&ab));
    }

    #[test]
    fn test_iou_self_is_one(a in bbox()) {
        prop_assert!((iou(&a, &a) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_classifier_deterministic(prev in signature(), curr in signature()) {
        let first = classify_change(Some(&prev), &curr);
        prop_assert_eq!(classify_change(Some(&prev), &curr), first);
        prop_assert_eq!(classify_change(Some(&curr), &curr), ChangeClass::None);
        prop_assert_eq!(classify_change(None, &curr), ChangeClass::Critical);
    }

    #[test]
    fn test_new_critical_group_is_critical(prev in signature(), curr in signature()) {
        prop_assume!(!prev.has_critical && curr.has_critical);
        prop_assert_eq!(classify_change(Some(&prev), &curr), ChangeClass::Critical);
    }

    #[test]
    fn test_debounce_threshold(stable_frames in 1u32..6, seen in 1u32..8) {
        let mut stab: CategoricalStabilizer<DistanceCategory> =
            CategoricalStabilizer::new(stable_frames, 2, 9_000);
        for t in 0..seen {
            stab.smooth(1, Some(DistanceCategory::Near), t as u64 * 100);
        }
        let stable = stab.get(1).and_then(|e| e.stable);
        if seen >= stable_frames {
            prop_assert_eq!(stable, Some(DistanceCategory::Near));
        } else {
            prop_assert_eq!(stable, None);
        }
    }

    #[test]
    fn test_null_grace(grace in 0u32..4) {
        let mut stab: CategoricalStabilizer<DistanceCategory> =
            CategoricalStabilizer::new(3, grace, 9_000);
        for t in 0..3u64 {
            stab.smooth(1, Some(DistanceCategory::Mid), t);
        }
        for n in 0..grace {
            prop_assert_eq!(stab.smooth(1, None, 10 + n as u64), Some(DistanceCategory::Mid));
        }
        prop_assert_eq!(stab.smooth(1, None, 100), None);
    }
}
