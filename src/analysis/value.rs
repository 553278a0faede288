//! Counter value extraction from raw recognizer text
//!
//! The full counter reading is assumed to be the longest contiguous digit
//! sequence the recognizer produced; shorter runs are typically noise
//! fragments (decorative labels, partial glare artifacts).

use serde::{Deserialize, Serialize};

/// Plausibility bounds applied before a parsed value is accepted.
///
/// Implausible numeric artifacts (stray single digits, OCR noise) must be
/// rejected before they can enter a stability group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueBounds {
    /// Minimum number of digits in the winning run
    pub min_digits: usize,
    /// Smallest accepted value
    pub min_value: u64,
    /// Largest accepted value
    pub max_value: u64,
}

impl Default for ValueBounds {
    fn default() -> Self {
        Self {
            min_digits: 2,
            min_value: 1,
            max_value: 9_999_999,
        }
    }
}

impl ValueBounds {
    fn accepts(&self, digits: &str, value: u64) -> bool {
        digits.len() >= self.min_digits && value >= self.min_value && value <= self.max_value
    }
}

/// Parse a validated counter value out of raw recognized text.
///
/// Finds all maximal digit runs; the longest run wins, ties broken by larger
/// numeric value. Out-of-range results return `None`, never a clamped value.
pub fn extract_value(raw: &str, bounds: &ValueBounds) -> Option<u64> {
    // For equal-length digit strings, lexicographic order is numeric order,
    // so the run selection never needs to parse first.
    let best = digit_runs(raw)
        .into_iter()
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))?;

    let value = best.parse::<u64>().ok()?;
    bounds.accepts(&best, value).then_some(value)
}

/// All maximal runs of ASCII digits in `raw`, in order of appearance.
fn digit_runs(raw: &str) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for c in raw.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}
