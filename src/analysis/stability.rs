//! Cross-reading stability voting
//!
//! A single-frame OCR misread looks exactly like a good reading; the defense
//! is repetition. A value must reappear across at least two independent
//! observations (different region and/or different buffered frame) before the
//! cycle trusts it.

use std::collections::HashMap;

use serde::Serialize;

/// Observations below this count are discarded as unreliable.
pub const DEFAULT_STABILITY_THRESHOLD: usize = 2;

/// One parsed reading of a display region in one buffered frame.
#[derive(Debug, Clone)]
pub struct Observation {
    /// Validated counter value
    pub value: u64,
    /// Recognition confidence (0-100)
    pub confidence: f32,
    /// Name of the region the reading came from
    pub region: String,
    /// Index of the buffered frame (0 = oldest)
    pub frame_index: usize,
    /// Raw recognizer text before value extraction
    pub raw_text: String,
}

/// The winning stability group of a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct StableValue {
    pub value: u64,
    /// How many observations agreed on the value
    pub occurrences: usize,
    /// Mean confidence of the agreeing observations (0-100)
    pub mean_confidence: f32,
}

/// Pick the most trustworthy value from a cycle's observations.
///
/// Groups by value, then selects the group with the highest occurrence count,
/// breaking ties by higher mean confidence. Returns `None` when the winner is
/// below `threshold`. Occurrence count outranks confidence: a 95-confidence
/// one-off loses to two mediocre agreements.
pub fn aggregate(observations: &[Observation], threshold: usize) -> Option<StableValue> {
    let mut groups: HashMap<u64, (usize, f32)> = HashMap::new();
    for obs in observations {
        let entry = groups.entry(obs.value).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += obs.confidence;
    }

    let (value, (occurrences, conf_sum)) = groups.into_iter().max_by(|a, b| {
        (a.1).0.cmp(&(b.1).0).then_with(|| {
            let mean_a = (a.1).1 / (a.1).0 as f32;
            let mean_b = (b.1).1 / (b.1).0 as f32;
            mean_a.total_cmp(&mean_b)
        })
    })?;

    if occurrences < threshold {
        return None;
    }

    Some(StableValue {
        value,
        occurrences,
        mean_confidence: conf_sum / occurrences as f32,
    })
}
