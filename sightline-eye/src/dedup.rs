//! Overlap clustering of same-frame detections
//!
//! Greedy and order dependent: each detection is compared against the first
//! member of every open cluster, so arrival order picks the anchors. This is
//! not score-sorted non-max suppression and cluster membership can differ
//! between frames that list the same boxes in a different order.

use sightline_core::{BBox, Detection};
use tracing::debug;

/// Intersection-over-Union of two normalized boxes, in `[0, 1]`.
///
/// Malformed boxes (non-finite or negative size) have no overlap.
pub fn iou(a: &BBox, b: &BBox) -> f32 {
    if !a.is_valid() || !b.is_valid() {
        return 0.0;
    }

    let inter_x_min = a.x.max(b.x);
    let inter_y_min = a.y.max(b.y);
    let inter_x_max = (a.x + a.w).min(b.x + b.w);
    let inter_y_max = (a.y + a.h).min(b.y + b.h);

    if inter_x_max <= inter_x_min || inter_y_max <= inter_y_min {
        return 0.0;
    }

    let inter_area = (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min);
    let union_area = a.area() + b.area() - inter_area;

    if union_area <= 0.0 || !union_area.is_finite() {
        return 0.0;
    }

    (inter_area / union_area).clamp(0.0, 1.0)
}

/// Indices into the input list. `members[0]` is the anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub members: Vec<usize>,
}

impl Cluster {
    pub fn anchor(&self) -> usize {
        self.members[0]
    }
}

#[derive(Debug, Clone)]
pub struct ClusterDeduplicator {
    threshold: f32,
}

impl Default for ClusterDeduplicator {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl ClusterDeduplicator {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Partition detections into clusters. Box-less detections are singletons.
    pub fn clusters(&self, detections: &[Detection]) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = Vec::new();

        for (idx, det) in detections.iter().enumerate() {
            let joined = det.valid_box().and_then(|bbox| {
                clusters.iter_mut().find(|c| {
                    detections[c.anchor()]
                        .valid_box()
                        .map(|anchor| iou(anchor, bbox) > self.threshold)
                        .unwrap_or(false)
                })
            });

            match joined {
                Some(cluster) => cluster.members.push(idx),
                None => clusters.push(Cluster { members: vec![idx] }),
            }
        }

        clusters
    }

    /// One representative per cluster: highest score, first occurrence on ties.
    ///
    /// Output keeps anchor order.
    pub fn deduplicate(&self, detections: Vec<Detection>) -> Vec<Detection> {
        let clusters = self.clusters(&detections);
        if clusters.len() == detections.len() {
            return detections;
        }
        debug!(
            input = detections.len(),
            clusters = clusters.len(),
            "Merged overlapping detections"
        );

        let keep: Vec<usize> = clusters
            .iter()
            .map(|c| {
                let mut best = c.anchor();
                let mut best_score = detections[best].score().unwrap_or(0.0);
                for &m in &c.members[1..] {
                    let score = detections[m].score().unwrap_or(0.0);
                    if score > best_score {
                        best = m;
                        best_score = score;
                    }
                }
                best
            })
            .collect();

        let mut slots: Vec<Option<Detection>> = detections.into_iter().map(Some).collect();
        keep.into_iter()
            .filter_map(|i| slots[i].take())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(id: i64, score: f32, x: f32, y: f32, w: f32, h: f32) -> Detection {
        Detection::new(id).with_label("car", score).with_box(x, y, w, h)
    }

    #[test]
    fn test_iou_identical() {
        let a = BBox::new(0.1, 0.1, 0.2, 0.2);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint_and_touching() {
        let a = BBox::new(0.0, 0.0, 0.2, 0.2);
        let b = BBox::new(0.5, 0.5, 0.2, 0.2);
        let c = BBox::new(0.2, 0.0, 0.2, 0.2);
        assert_eq!(iou(&a, &b), 0.0);
        assert_eq!(iou(&a, &c), 0.0);
    }

    #[test]
    fn test_iou_partial() {
        let a = BBox::new(0.0, 0.0, 0.2, 0.2);
        let b = BBox::new(0.1, 0.0, 0.2, 0.2);
        // inter 0.02, union 0.06
        assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_iou_invalid_box() {
        let a = BBox::new(f32::NAN, 0.0, 0.2, 0.2);
        let b = BBox::new(0.0, 0.0, -0.2, 0.2);
        let ok = BBox::new(0.0, 0.0, 0.2, 0.2);
        assert_eq!(iou(&a, &ok), 0.0);
        assert_eq!(iou(&b, &ok), 0.0);
        let zero = BBox::new(0.1, 0.1, 0.0, 0.0);
        assert_eq!(iou(&zero, &zero), 0.0);
    }

    #[test]
    fn test_overlapping_pair_keeps_higher_score() {
        let dedup = ClusterDeduplicator::default();
        let out = dedup.deduplicate(vec![
            det(1, 0.6, 0.10, 0.10, 0.2, 0.2),
            det(2, 0.9, 0.11, 0.10, 0.2, 0.2),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 2);
    }

    #[test]
    fn test_tie_keeps_first() {
        let dedup = ClusterDeduplicator::default();
        let out = dedup.deduplicate(vec![
            det(1, 0.8, 0.10, 0.10, 0.2, 0.2),
            det(2, 0.8, 0.10, 0.10, 0.2, 0.2),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 1);
    }

    #[test]
    fn test_iou_at_threshold_stays_separate() {
        let a = det(1, 0.9, 0.0, 0.0, 0.2, 0.2);
        let b = det(2, 0.9, 0.1, 0.0, 0.2, 0.2);
        let score = iou(a.valid_box().unwrap(), b.valid_box().unwrap());
        let dedup = ClusterDeduplicator::new(score);
        assert_eq!(dedup.threshold(), score);
        assert_eq!(dedup.deduplicate(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_boxless_detections_are_singletons() {
        let dedup = ClusterDeduplicator::default();
        let out = dedup.deduplicate(vec![
            Detection::new(1).with_label("car", 0.9),
            Detection::new(2).with_label("car", 0.9),
            det(3, 0.9, 0.1, 0.1, 0.2, 0.2),
        ]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_anchor_order_dependence() {
        // b overlaps both a and c, but a and c do not overlap each other
        let a = det(1, 0.9, 0.00, 0.0, 0.2, 0.2);
        let b = det(2, 0.9, 0.04, 0.0, 0.2, 0.2);
        let c = det(3, 0.9, 0.08, 0.0, 0.2, 0.2);
        let dedup = ClusterDeduplicator::default();
        let clusters = dedup.clusters(&[a.clone(), b.clone(), c.clone()]);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec![0, 1]);
        let clusters = dedup.clusters(&[b, a, c]);
        assert_eq!(clusters.len(), 1);
    }
}
