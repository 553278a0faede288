//! Code decoder adapter
//!
//! Wraps deterministic 2D-code decoding (rqrr) behind a single adapter with a
//! configurable retry cascade. Absence of a code in a frame is an expected,
//! non-exceptional outcome and is reported as `None`, never as an error.

use image::GrayImage;
use serde::Serialize;
use tracing::debug;

use crate::frame::Frame;

/// A preprocessing variant attempted before handing the buffer to the decoder.
///
/// Code geometry/contrast issues are common causes of false negatives, so the
/// robust configuration walks all three variants in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeAttempt {
    /// Plain luminance conversion of the frame
    Direct,
    /// Histogram-equalized luminance (low-contrast prints)
    Equalized,
    /// Inverted luminance (light-on-dark codes)
    Inverted,
}

/// A successfully decoded code with its location in the frame.
#[derive(Debug, Clone, Serialize)]
pub struct CodeReading {
    /// Decoded payload text
    pub payload: String,
    /// Corner points of the code in frame pixel coordinates
    pub polygon: Vec<(f32, f32)>,
    /// Which preprocessing attempt produced this reading
    #[serde(skip)]
    pub attempt: DecodeAttempt,
}

impl CodeReading {
    /// True when the payload parses as a JSON value. Structured payloads are
    /// preferred over raw strings when attempts disagree.
    pub fn is_structured(&self) -> bool {
        serde_json::from_str::<serde_json::Value>(&self.payload).is_ok()
    }

    /// Counter value cached inside a structured payload, when present.
    ///
    /// A code's embedded figure can be stale relative to the live display,
    /// so fusion only falls back to it when OCR produced nothing stable.
    pub fn embedded_counter(&self) -> Option<u64> {
        let value: serde_json::Value = serde_json::from_str(&self.payload).ok()?;
        let field = value.get("counter").or_else(|| value.get("count"))?;
        match field {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// QR decoder with a configurable retry strategy.
#[derive(Debug, Clone)]
pub struct CodeDecoder {
    attempts: Vec<DecodeAttempt>,
}

impl Default for CodeDecoder {
    fn default() -> Self {
        Self::robust()
    }
}

impl CodeDecoder {
    /// Single direct decode, no retries.
    pub fn direct() -> Self {
        Self {
            attempts: vec![DecodeAttempt::Direct],
        }
    }

    /// Full cascade: direct, then equalized, then inverted.
    pub fn robust() -> Self {
        Self {
            attempts: vec![
                DecodeAttempt::Direct,
                DecodeAttempt::Equalized,
                DecodeAttempt::Inverted,
            ],
        }
    }

    /// Custom attempt order.
    pub fn with_attempts(attempts: Vec<DecodeAttempt>) -> Self {
        Self { attempts }
    }

    /// Decode a code from the frame, or `None` if no attempt found one.
    pub fn decode(&self, frame: &Frame) -> Option<CodeReading> {
        let luma = frame_to_luma(frame);

        let mut readings = Vec::new();
        for &attempt in &self.attempts {
            let prepared = match attempt {
                DecodeAttempt::Direct => luma.clone(),
                DecodeAttempt::Equalized => imageproc::contrast::equalize_histogram(&luma),
                DecodeAttempt::Inverted => {
                    let mut inv = luma.clone();
                    image::imageops::invert(&mut inv);
                    inv
                }
            };

            if let Some(reading) = decode_luma(&prepared, attempt) {
                debug!(?attempt, len = reading.payload.len(), "code decoded");
                // A structured payload ends the cascade immediately.
                if reading.is_structured() {
                    return Some(reading);
                }
                readings.push(reading);
            }
        }

        pick_reading(readings)
    }
}

/// First successful reading wins, unless a later attempt produced a
/// JSON-parseable payload while the first did not.
fn pick_reading(readings: Vec<CodeReading>) -> Option<CodeReading> {
    let structured = readings.iter().position(CodeReading::is_structured);
    match structured {
        Some(i) => readings.into_iter().nth(i),
        None => readings.into_iter().next(),
    }
}

/// Run rqrr over a prepared luminance buffer.
fn decode_luma(luma: &GrayImage, attempt: DecodeAttempt) -> Option<CodeReading> {
    let mut prepared = rqrr::PreparedImage::prepare(luma.clone());
    let grids = prepared.detect_grids();
    for grid in grids {
        match grid.decode() {
            Ok((_meta, payload)) => {
                let polygon = grid
                    .bounds
                    .iter()
                    .map(|p| (p.x as f32, p.y as f32))
                    .collect();
                return Some(CodeReading {
                    payload,
                    polygon,
                    attempt,
                });
            }
            Err(e) => {
                // A detected but undecodable grid is a NoSignal case
                debug!(?attempt, error = %e, "grid detected but decode failed");
            }
        }
    }
    None
}

/// Luminance conversion of a full RGBA frame.
fn frame_to_luma(frame: &Frame) -> GrayImage {
    let src = frame.data();
    let mut luma = GrayImage::new(frame.width, frame.height);
    for (i, pixel) in luma.pixels_mut().enumerate() {
        let off = i * 4;
        let gray = (0.299 * src[off] as f32
            + 0.587 * src[off + 1] as f32
            + 0.114 * src[off + 2] as f32) as u8;
        pixel.0 = [gray];
    }
    luma
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(payload: &str, attempt: DecodeAttempt) -> CodeReading {
        CodeReading {
            payload: payload.to_string(),
            polygon: vec![],
            attempt,
        }
    }

    #[test]
    fn test_blank_frame_decodes_to_none() {
        let frame = Frame::new(vec![255u8; 64 * 64 * 4], 64, 64).unwrap();
        assert!(CodeDecoder::robust().decode(&frame).is_none());
    }

    #[test]
    fn test_custom_attempt_order() {
        let decoder =
            CodeDecoder::with_attempts(vec![DecodeAttempt::Inverted, DecodeAttempt::Direct]);
        let frame = Frame::new(vec![0u8; 32 * 32 * 4], 32, 32).unwrap();
        assert!(decoder.decode(&frame).is_none());
    }

    #[test]
    fn test_embedded_counter_numeric() {
        let r = reading(r#"{"machine":"w-12","counter":963373}"#, DecodeAttempt::Direct);
        assert_eq!(r.embedded_counter(), Some(963373));
    }

    #[test]
    fn test_embedded_counter_string_field() {
        let r = reading(r#"{"count":"500000"}"#, DecodeAttempt::Direct);
        assert_eq!(r.embedded_counter(), Some(500000));
    }

    #[test]
    fn test_embedded_counter_absent() {
        assert_eq!(
            reading(r#"{"machine":"w-12"}"#, DecodeAttempt::Direct).embedded_counter(),
            None
        );
        assert_eq!(
            reading("https://example.com/m/12", DecodeAttempt::Direct).embedded_counter(),
            None
        );
    }

    #[test]
    fn test_pick_reading_prefers_structured() {
        let picked = pick_reading(vec![
            reading("MACHINE-12", DecodeAttempt::Direct),
            reading(r#"{"counter":42}"#, DecodeAttempt::Inverted),
        ])
        .unwrap();
        assert_eq!(picked.attempt, DecodeAttempt::Inverted);
    }

    #[test]
    fn test_pick_reading_first_wins_without_structured() {
        let picked = pick_reading(vec![
            reading("first", DecodeAttempt::Direct),
            reading("second", DecodeAttempt::Equalized),
        ])
        .unwrap();
        assert_eq!(picked.payload, "first");
    }

    #[test]
    fn test_pick_reading_empty() {
        assert!(pick_reading(vec![]).is_none());
    }
}
