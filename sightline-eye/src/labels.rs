//! Label vocabulary: natural names, critical and multi-count sets, plurals

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which labels are spoken how. All of it is data so the vocabulary can be
/// tuned from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelPolicy {
    /// Raw detector label (lowercase) to spoken name.
    pub synonyms: BTreeMap<String, String>,
    /// Spoken names that always warrant urgent speech.
    pub critical: BTreeSet<String>,
    /// Spoken names counted by id presence rather than raw member count.
    pub multi_count: BTreeSet<String>,
    /// Spoken names never announced.
    pub suppressed: BTreeSet<String>,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        let synonyms = [
            ("stop", "stop sign"),
            ("stop_sign", "stop sign"),
            ("stop sign", "stop sign"),
            ("speed_limit", "speed limit sign"),
            ("speed limit", "speed limit sign"),
            ("no_entry", "no entry sign"),
            ("no entry", "no entry sign"),
            ("hazard", "hazard sign"),
            ("crosswalk", "crosswalk"),
            ("bike", "bicycle"),
            ("bicycle", "bicycle"),
            ("car", "car"),
            ("van", "van"),
            ("truck", "truck"),
            ("motorcycle", "motorcycle"),
            ("traffic red", "red traffic light"),
            ("traffic yellow", "yellow traffic light"),
            ("traffic green", "green traffic light"),
            ("emergency_exit", "emergency exit"),
            ("emergency exit", "emergency exit"),
        ];
        let critical = [
            "stop sign",
            "hazard sign",
            "crosswalk",
            "emergency exit",
            "red traffic light",
        ];
        let multi_count = ["car", "truck", "van", "bicycle", "motorcycle"];

        Self {
            synonyms: synonyms
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            critical: critical.iter().map(|s| s.to_string()).collect(),
            multi_count: multi_count.iter().map(|s| s.to_string()).collect(),
            suppressed: BTreeSet::new(),
        }
    }
}

impl LabelPolicy {
    /// Spoken name for a raw detector label.
    ///
    /// Looks the label up as given and with underscores as spaces, then
    /// falls back to a de-slugified form ("fire_hydrant" -> "fire hydrant").
    pub fn natural(&self, raw: &str) -> String {
        let key = raw.trim().to_lowercase();
        if let Some(name) = self.synonyms.get(&key) {
            return name.clone();
        }
        let spaced = deslugify(&key);
        if let Some(name) = self.synonyms.get(&spaced) {
            return name.clone();
        }
        spaced
    }

    pub fn is_critical(&self, natural: &str) -> bool {
        self.critical.contains(natural)
    }

    pub fn is_multi_count(&self, natural: &str) -> bool {
        self.multi_count.contains(natural)
    }

    pub fn is_suppressed(&self, natural: &str) -> bool {
        self.suppressed.contains(natural)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.synonyms.values().any(|v| v.trim().is_empty()) {
            return Err("Label synonyms must not map to an empty name".to_string());
        }
        if let Some(label) = self.critical.intersection(&self.suppressed).next() {
            return Err(format!("Label '{}' is both critical and suppressed", label));
        }
        Ok(())
    }
}

fn deslugify(s: &str) -> String {
    s.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// English plural of a spoken name; only the last word is inflected.
pub fn pluralize(name: &str) -> String {
    let (head, last) = match name.rfind(' ') {
        Some(i) => (&name[..=i], &name[i + 1..]),
        None => ("", name),
    };
    let plural = match last {
        "person" => "people".to_string(),
        "child" => "children".to_string(),
        "bus" => "buses".to_string(),
        w if w.ends_with('y') && !w.ends_with("ay") && !w.ends_with("ey") => {
            format!("{}ies", &w[..w.len() - 1])
        }
        w if w.ends_with('s') => w.to_string(),
        w => format!("{}s", w),
    };
    format!("{}{}", head, plural)
}

/// "A", "A and B", "A, B, and C".
pub fn join_human<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [one] => one.as_ref().to_string(),
        [a, b] => format!("{} and {}", a.as_ref(), b.as_ref()),
        [rest @ .., last] => {
            let head: Vec<&str> = rest.iter().map(|s| s.as_ref()).collect();
            format!("{}, and {}", head.join(", "), last.as_ref())
        }
    }
}
