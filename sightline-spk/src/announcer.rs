//! Screen-reader announcements
//!
//! When speech goes through an accessibility layer instead of a TTS engine
//! there is no arbitration, only a short duplicate filter.

use parking_lot::Mutex;
use tracing::{debug, info};

/// Something that can read a phrase to the user outside the speech channel.
pub trait Announcer: Send + Sync {
    fn announce(&self, text: &str);
}

/// Announcer that writes to the log and remembers what it said.
#[derive(Default)]
pub struct LogAnnouncer {
    history: Mutex<Vec<String>>,
}

impl LogAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }
}

impl Announcer for LogAnnouncer {
    fn announce(&self, text: &str) {
        info!(text, "[announce]");
        self.history.lock().push(text.to_string());
    }
}

/// Drops a phrase identical to the previous one inside `window_ms`.
#[derive(Debug, Clone)]
pub struct AnnouncementDeduper {
    window_ms: u64,
    last: Option<(String, u64)>,
}

impl AnnouncementDeduper {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            last: None,
        }
    }

    /// Whether `text` should be announced at `now_ms`. An accepted phrase
    /// restarts the window.
    pub fn should_announce(&mut self, text: &str, now_ms: u64) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        if let Some((ref last, at)) = self.last {
            if last == text && now_ms.saturating_sub(at) < self.window_ms {
                debug!(text, "Duplicate announcement dropped");
                return false;
            }
        }
        self.last = Some((text.to_string(), now_ms));
        true
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for AnnouncementDeduper {
    fn default() -> Self {
        Self::new(900)
    }
}
