//! Detection log parsing
//!
//! One frame per line. A line is either a bare JSON array of detections or
//! an object with the detections and an optional timestamp in milliseconds:
//!
//! ```text
//! [{"id":1,"label":"stop","box":[0.4,0.3,0.2,0.2]}]
//! {"t":100,"detections":[{"id":1,"label":"stop"}]}
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use sightline_core::Detection;
use std::io::BufRead;

#[derive(Deserialize)]
#[serde(untagged)]
enum Line {
    Stamped {
        #[serde(default)]
        t: Option<u64>,
        detections: Vec<Detection>,
    },
    Bare(Vec<Detection>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Offset from the start of the log
    pub at_ms: u64,
    pub detections: Vec<Detection>,
}

/// Read every frame. Unstamped frames are placed `interval_ms` after the
/// previous one; blank lines and `#` comments are skipped.
pub fn read_frames(reader: impl BufRead, interval_ms: u64) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    let mut next_at = 0u64;

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read detection log")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let parsed: Line = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid frame on line {}", index + 1))?;
        let (stamp, detections) = match parsed {
            Line::Stamped { t, detections } => (t, detections),
            Line::Bare(detections) => (None, detections),
        };
        let at_ms = stamp.unwrap_or(next_at).max(next_at);
        next_at = at_ms.saturating_add(interval_ms);
        frames.push(Frame { at_ms, detections });
    }

    Ok(frames)
}
