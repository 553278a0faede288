//! Vision/OCR layer
//!
//! Text recognition on cropped display regions. The recognition capability
//! itself is pluggable: engines implement [`TextRecognizer`] and are driven
//! by the stateful [`OcrEngine`] adapter, which owns initialization, profile
//! application and teardown.

pub mod ocr;
pub mod segment;

pub use ocr::OcrEngine;
pub use segment::SegmentRecognizer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Page-segmentation mode applied by a recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segmentation {
    /// Treat the crop as a single block of text (may span several lines)
    SingleBlock,
    /// Treat the crop as exactly one line of text
    #[default]
    SingleLine,
}

/// A named set of recognizer tuning parameters.
///
/// Applied once at adapter initialization; changing a profile requires
/// re-initialization, not per-call overrides. Unknown keys are rejected at
/// deserialization rather than silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OcrProfile {
    /// Profile label, e.g. "seven-segment"
    pub name: String,
    /// Characters the adapter passes through; everything else is stripped
    pub whitelist: String,
    /// Page-segmentation mode
    pub segmentation: Segmentation,
    /// Noise-suppression passes (0 = off, higher = more aggressive)
    pub noise_suppression: u8,
    /// Lit digits on a dark background (LED/seven-segment displays)
    pub light_on_dark: bool,
    /// Crops smaller than this (either dimension) are upscaled before
    /// recognition
    pub min_recognition_px: u32,
}

impl Default for OcrProfile {
    fn default() -> Self {
        Self::seven_segment()
    }
}

impl OcrProfile {
    /// Profile tuned for seven-segment/LED-style digital displays.
    pub fn seven_segment() -> Self {
        Self {
            name: "seven-segment".to_string(),
            whitelist: "0123456789".to_string(),
            segmentation: Segmentation::SingleLine,
            noise_suppression: 2,
            light_on_dark: true,
            min_recognition_px: 80,
        }
    }
}

/// Raw output of one recognition call.
#[derive(Debug, Clone)]
pub struct RawRecognition {
    /// Recognized text
    pub text: String,
    /// Recognition confidence (0-100)
    pub confidence: f32,
}

#[derive(Debug, Error)]
pub enum OcrError {
    /// Engine not yet initialized, or torn down. Callers skip recognition
    /// rather than blocking on this.
    #[error("OCR engine is not ready")]
    NotReady,
    /// Initialization did not complete.
    #[error("OCR engine initialization failed: {0}")]
    Init(String),
    /// The underlying recognize call failed. Treated as no-signal for the
    /// one observation; never aborts the cycle.
    #[error("recognizer failure: {0}")]
    Engine(String),
}

/// A text-recognition capability.
///
/// Implementations receive the pre-cropped RGBA region by reference so the
/// caller never clones the frame buffer per engine; engines copy internally
/// only what their preprocessing needs.
pub trait TextRecognizer: Send + Sync {
    /// Engine identifier for logging, e.g. "seven-segment"
    fn name(&self) -> &str;

    /// Apply a tuning profile. Called once, during adapter initialization.
    fn configure(&mut self, profile: &OcrProfile) -> Result<(), OcrError>;

    /// Recognize text in an RGBA crop. `Ok(None)` means the region held no
    /// legible text - an expected outcome, not an error.
    fn recognize(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<RawRecognition>, OcrError>;
}
