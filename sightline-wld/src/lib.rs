//! sightline-wld: the frame loop
//!
//! Wires the vision stages and the speech channel together. One
//! [`FrameOrchestrator`] owns every per-id and per-label cache and is fed
//! one detection batch per frame.

pub mod error;
pub mod config;
pub mod orchestrator;

pub use error::WorldError;
pub use config::{OrchestratorConfig, OutputMode, SightlineConfig};
pub use orchestrator::{Delivery, FrameOrchestrator, FrameReport, Output};
