//! Seven-segment display recognizer
//!
//! The built-in [`TextRecognizer`] implementation, tuned for the LED/LCD
//! counters this pipeline reads. Works directly on the binarized crop:
//! digits are located by column projection, then each digit cell is sampled
//! at the seven canonical segment zones and matched against the segment
//! pattern table. No model files, no runtime downloads.

use image::GrayImage;
use tracing::{debug, trace};

use super::{OcrError, OcrProfile, RawRecognition, Segmentation, TextRecognizer};

/// Fraction of a segment zone that must be lit for the segment to count as on.
const SEGMENT_ON_THRESHOLD: f32 = 0.35;

/// Crops with less lit area than this carry no display signal.
const MIN_LIT_FRACTION: f32 = 0.005;

/// Crops lit beyond this are glare/overexposure, not a display.
const MAX_LIT_FRACTION: f32 = 0.9;

/// Cells narrower than this fraction of the line height can only be a "1".
const ONE_ASPECT: f32 = 0.25;

/// Segment zones in cell-relative fractions: (row0, row1, col0, col1).
/// Order: a (top), b (top-right), c (bottom-right), d (bottom),
/// e (bottom-left), f (top-left), g (middle).
const ZONES: [(f32, f32, f32, f32); 7] = [
    (0.000, 0.150, 0.20, 0.80),
    (0.150, 0.450, 0.70, 1.00),
    (0.550, 0.850, 0.70, 1.00),
    (0.850, 1.000, 0.20, 0.80),
    (0.550, 0.850, 0.00, 0.30),
    (0.150, 0.450, 0.00, 0.30),
    (0.425, 0.575, 0.20, 0.80),
];

/// Lit-segment masks per digit, bit i = ZONES\[i\].
const PATTERNS: [(u8, char); 10] = [
    (0b0111111, '0'),
    (0b0000110, '1'),
    (0b1011011, '2'),
    (0b1001111, '3'),
    (0b1100110, '4'),
    (0b1101101, '5'),
    (0b1111101, '6'),
    (0b0000111, '7'),
    (0b1111111, '8'),
    (0b1101111, '9'),
];

/// Pixel rect of segment zone `zone` inside a cell box, end-exclusive.
fn zone_rect(zone: usize, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let (r0, r1, c0, c1) = ZONES[zone];
    (
        (r0 * height as f32).round() as u32,
        (r1 * height as f32).round() as u32,
        (c0 * width as f32).round() as u32,
        (c1 * width as f32).round() as u32,
    )
}

/// Seven-segment digit recognizer.
#[derive(Debug, Default)]
pub struct SegmentRecognizer {
    noise_suppression: u8,
    light_on_dark: bool,
    segmentation: Segmentation,
}

impl SegmentRecognizer {
    pub fn new() -> Self {
        Self {
            noise_suppression: 0,
            light_on_dark: true,
            segmentation: Segmentation::SingleLine,
        }
    }
}

impl TextRecognizer for SegmentRecognizer {
    fn name(&self) -> &str {
        "seven-segment"
    }

    fn configure(&mut self, profile: &OcrProfile) -> Result<(), OcrError> {
        self.noise_suppression = profile.noise_suppression;
        self.light_on_dark = profile.light_on_dark;
        self.segmentation = profile.segmentation;
        Ok(())
    }

    fn recognize(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<RawRecognition>, OcrError> {
        if width == 0 || height == 0 {
            return Ok(None);
        }
        if data.len() != (width as usize) * (height as usize) * 4 {
            return Err(OcrError::Engine(
                "crop buffer does not match dimensions".into(),
            ));
        }

        let binary = match self.binarize(data, width, height) {
            Some(b) => b,
            None => return Ok(None),
        };

        let bands = match self.segmentation {
            Segmentation::SingleLine => {
                single_band(&binary).map(|b| vec![b]).unwrap_or_default()
            }
            Segmentation::SingleBlock => row_bands(&binary),
        };
        if bands.is_empty() {
            return Ok(None);
        }

        let mut text = String::new();
        let mut cells = 0usize;
        let mut recognized = 0usize;
        let mut decisiveness_sum = 0.0f32;

        for (band_index, &(top, bottom)) in bands.iter().enumerate() {
            if band_index > 0 {
                text.push(' ');
            }
            for (left, right) in column_runs(&binary, top, bottom) {
                cells += 1;
                match classify_cell(&binary, left, right, top, bottom) {
                    Some((digit, decisiveness)) => {
                        recognized += 1;
                        decisiveness_sum += decisiveness;
                        text.push(digit);
                    }
                    None => trace!(left, right, "unrecognized segment pattern"),
                }
            }
        }

        let digits = text.chars().filter(char::is_ascii_digit).count();
        if digits == 0 {
            return Ok(None);
        }

        let confidence =
            100.0 * (recognized as f32 / cells as f32) * (decisiveness_sum / recognized as f32);
        debug!(%text, cells, recognized, confidence, "segment recognition");

        Ok(Some(RawRecognition {
            text: text.trim().to_string(),
            confidence,
        }))
    }
}

impl SegmentRecognizer {
    /// Luminance conversion, optional inversion and despeckle, Otsu
    /// binarization. Returns `None` when the crop carries no plausible
    /// display signal.
    fn binarize(&self, data: &[u8], width: u32, height: u32) -> Option<GrayImage> {
        let mut gray = GrayImage::new(width, height);
        for (i, pixel) in gray.pixels_mut().enumerate() {
            let off = i * 4;
            let lum = 0.299 * data[off] as f32
                + 0.587 * data[off + 1] as f32
                + 0.114 * data[off + 2] as f32;
            pixel.0 = [lum as u8];
        }

        // Lit pixels must end up bright regardless of display polarity
        if !self.light_on_dark {
            image::imageops::invert(&mut gray);
        }

        for _ in 0..self.noise_suppression {
            gray = imageproc::filter::median_filter(&gray, 1, 1);
        }

        let level = imageproc::contrast::otsu_level(&gray);
        let binary = imageproc::contrast::threshold(
            &gray,
            level,
            imageproc::contrast::ThresholdType::Binary,
        );

        let lit = binary.pixels().filter(|p| p.0[0] > 0).count() as f32;
        let fraction = lit / (width * height) as f32;
        if !(MIN_LIT_FRACTION..=MAX_LIT_FRACTION).contains(&fraction) {
            trace!(fraction, "lit fraction outside display range");
            return None;
        }

        Some(binary)
    }
}

/// Row band spanned by all lit pixels, end-exclusive.
fn single_band(binary: &GrayImage) -> Option<(u32, u32)> {
    let rows: Vec<u32> = (0..binary.height())
        .filter(|&y| (0..binary.width()).any(|x| binary.get_pixel(x, y).0[0] > 0))
        .collect();
    Some((*rows.first()?, rows.last()? + 1))
}

/// Maximal runs of rows containing lit pixels, end-exclusive. Used for
/// single-block segmentation where the crop may hold several text lines.
fn row_bands(binary: &GrayImage) -> Vec<(u32, u32)> {
    let mut bands = Vec::new();
    let mut start: Option<u32> = None;
    for y in 0..binary.height() {
        let lit = (0..binary.width()).any(|x| binary.get_pixel(x, y).0[0] > 0);
        match (lit, start) {
            (true, None) => start = Some(y),
            (false, Some(s)) => {
                bands.push((s, y));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        bands.push((s, binary.height()));
    }
    bands
}

/// Maximal runs of columns containing lit pixels within a row band,
/// end-exclusive. One run per digit cell on a clean display.
fn column_runs(binary: &GrayImage, top: u32, bottom: u32) -> Vec<(u32, u32)> {
    let mut runs = Vec::new();
    let mut start: Option<u32> = None;
    for x in 0..binary.width() {
        let lit = (top..bottom).any(|y| binary.get_pixel(x, y).0[0] > 0);
        match (lit, start) {
            (true, None) => start = Some(x),
            (false, Some(s)) => {
                if x - s >= 2 {
                    runs.push((s, x));
                }
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        if binary.width() - s >= 2 {
            runs.push((s, binary.width()));
        }
    }
    runs
}

/// Classify one digit cell. Returns the digit and a 0-1 decisiveness score
/// (how far each segment's lit fraction sat from the on/off threshold).
fn classify_cell(
    binary: &GrayImage,
    left: u32,
    right: u32,
    top: u32,
    bottom: u32,
) -> Option<(char, f32)> {
    let width = right - left;
    let height = bottom - top;

    // A bare vertical bar never exposes enough zone structure to sample;
    // aspect alone identifies it.
    if (width as f32) < ONE_ASPECT * height as f32 {
        return Some(('1', 0.9));
    }

    let mut mask = 0u8;
    let mut decisiveness = 0.0f32;
    for zone in 0..ZONES.len() {
        let (r0, r1, c0, c1) = zone_rect(zone, width, height);
        let fraction = lit_fraction(binary, left + c0, left + c1, top + r0, top + r1);
        if fraction >= SEGMENT_ON_THRESHOLD {
            mask |= 1 << zone;
            decisiveness += (fraction - SEGMENT_ON_THRESHOLD) / (1.0 - SEGMENT_ON_THRESHOLD);
        } else {
            decisiveness += (SEGMENT_ON_THRESHOLD - fraction) / SEGMENT_ON_THRESHOLD;
        }
    }
    decisiveness /= ZONES.len() as f32;

    PATTERNS
        .iter()
        .find(|(pattern, _)| *pattern == mask)
        .map(|&(_, digit)| (digit, decisiveness))
}

/// Lit fraction inside an end-exclusive pixel rect.
fn lit_fraction(binary: &GrayImage, c0: u32, c1: u32, r0: u32, r1: u32) -> f32 {
    if c1 <= c0 || r1 <= r0 {
        return 0.0;
    }
    let mut lit = 0u32;
    for y in r0..r1 {
        for x in c0..c1 {
            if binary.get_pixel(x, y).0[0] > 0 {
                lit += 1;
            }
        }
    }
    lit as f32 / ((c1 - c0) * (r1 - r0)) as f32
}
