//! sightline-core: shared data model for the announcement pipeline
//!
//! Holds the per-frame detection records produced by the external detector,
//! the priority classes used by the speech side, the clock abstraction that
//! lets every timed component run against a fake clock in tests, and the
//! root error type the other crates convert into.

pub mod types;
pub mod error;
pub mod clock;

pub use error::{Error, Result};
pub use types::{
    BBox, CategoryStability, Detection, DistanceCategory, DistanceConfidence, LabelScore,
    Priority,
};
pub use clock::{Clock, ManualClock, MonotonicClock};
