//! sightline-eye: turns noisy per-frame detections into speakable state
//!
//! Provides:
//! - Per-id temporal stabilization of direction, distance category and meters
//! - IoU-based clustering of overlapping detections
//! - Grouping and natural-language phrasing per label
//! - Id-presence bucketing for labels that appear in crowds
//! - Signatures of the speakable state and change classification

pub mod error;
pub mod config;
pub mod direction;
pub mod labels;
pub mod stabilizer;
pub mod dedup;
pub mod multicount;
pub mod phrase;
pub mod signature;

pub use error::VisionError;
pub use config::{EyeConfig, MultiCountConfig, PhraseConfig, StabilizerConfig};
pub use direction::{Direction, DirectionGrid};
pub use labels::{join_human, pluralize, LabelPolicy};
pub use stabilizer::{
    CategoricalStabilizer, CategoryStabilizer, DirectionStabilizer, MetersReading,
    MetersStabilizer, SmoothedAttribute,
};
pub use dedup::{iou, Cluster, ClusterDeduplicator};
pub use multicount::{MultiCountTracker, MultiCountView, SemanticBucket};
pub use phrase::{sanitize, FrameObject, Group, GroupPhrase, PhraseBuilder};
pub use signature::{bucket_count, classify_change, ChangeClass, GroupSignature, Signature};
