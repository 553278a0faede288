//! Region extraction
//!
//! Crops rectangular sub-images out of a frame by fractional coordinates.
//! A display region is configured once per machine layout and reused across
//! every frame, so bounds violations here point at a bad region table, not at
//! bad input - they are surfaced as errors and never clamped away.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::{Frame, BYTES_PER_PIXEL};

/// A named rectangle in fractional coordinates (0.0-1.0) of frame size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionDescriptor {
    /// Region identifier, e.g. "counter-main"
    pub name: String,
    /// Left edge as a fraction of frame width
    pub x: f32,
    /// Top edge as a fraction of frame height
    pub y: f32,
    /// Width as a fraction of frame width
    pub width: f32,
    /// Height as a fraction of frame height
    pub height: f32,
}

/// A cropped pixel buffer derived from one frame. Same RGBA layout as the
/// source frame; owned by the caller and freed after use.
#[derive(Debug, Clone)]
pub struct CroppedRegion {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("region '{name}' resolves to a zero-size crop ({width}x{height})")]
    EmptyRegion {
        name: String,
        width: u32,
        height: u32,
    },
    #[error("region '{name}' exceeds frame bounds ({frame_width}x{frame_height})")]
    OutOfBounds {
        name: String,
        frame_width: u32,
        frame_height: u32,
    },
}

/// Crop `region` out of `frame`.
///
/// Pixel bounds are the region fractions multiplied by the frame dimensions,
/// truncated to integers. The crop is copied row by row into a new buffer.
pub fn extract(frame: &Frame, region: &RegionDescriptor) -> Result<CroppedRegion, ExtractError> {
    let x = (region.x * frame.width as f32) as u32;
    let y = (region.y * frame.height as f32) as u32;
    let width = (region.width * frame.width as f32) as u32;
    let height = (region.height * frame.height as f32) as u32;

    if width == 0 || height == 0 {
        return Err(ExtractError::EmptyRegion {
            name: region.name.clone(),
            width,
            height,
        });
    }

    if x.checked_add(width).map_or(true, |r| r > frame.width)
        || y.checked_add(height).map_or(true, |b| b > frame.height)
    {
        return Err(ExtractError::OutOfBounds {
            name: region.name.clone(),
            frame_width: frame.width,
            frame_height: frame.height,
        });
    }

    let src = frame.data();
    let mut data = Vec::with_capacity((width * height) as usize * BYTES_PER_PIXEL);
    for row in y..(y + height) {
        let start = ((row * frame.width + x) as usize) * BYTES_PER_PIXEL;
        let end = start + width as usize * BYTES_PER_PIXEL;
        data.extend_from_slice(&src[start..end]);
    }

    Ok(CroppedRegion {
        data,
        width,
        height,
    })
}

/// Grayscale copy of a crop using the standard luminance weights.
///
/// Keeps the RGBA layout so the result feeds the same recognizer interface.
/// Used as a secondary path when direct recognition finds nothing.
pub fn to_grayscale(region: &CroppedRegion) -> CroppedRegion {
    let mut data = region.data.clone();
    for chunk in data.chunks_exact_mut(BYTES_PER_PIXEL) {
        let gray =
            (0.299 * chunk[0] as f32 + 0.587 * chunk[1] as f32 + 0.114 * chunk[2] as f32) as u8;
        chunk[0] = gray;
        chunk[1] = gray;
        chunk[2] = gray;
        // Alpha unchanged
    }
    CroppedRegion {
        data,
        width: region.width,
        height: region.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(name: &str, x: f32, y: f32, w: f32, h: f32) -> RegionDescriptor {
        RegionDescriptor {
            name: name.to_string(),
            x,
            y,
            width: w,
            height: h,
        }
    }

    /// 4x4 frame whose red channel encodes the pixel index.
    fn indexed_frame() -> Frame {
        let mut data = Vec::new();
        for i in 0..16u8 {
            data.extend_from_slice(&[i, 0, 0, 255]);
        }
        Frame::new(data, 4, 4).unwrap()
    }

    #[test]
    fn test_extract_dimensions_floor() {
        let frame = indexed_frame();
        // 0.5 x 0.75 of a 4x4 frame -> floor(2) x floor(3)
        let crop = extract(&frame, &region("r", 0.0, 0.0, 0.5, 0.75)).unwrap();
        assert_eq!((crop.width, crop.height), (2, 3));
        assert_eq!(crop.data.len(), 2 * 3 * 4);
    }

    #[test]
    fn test_extract_copies_expected_pixels() {
        let frame = indexed_frame();
        // 2x2 crop at (2, 2): pixel indices 10, 11, 14, 15
        let crop = extract(&frame, &region("r", 0.5, 0.5, 0.5, 0.5)).unwrap();
        let reds: Vec<u8> = crop.data.chunks_exact(4).map(|p| p[0]).collect();
        assert_eq!(reds, vec![10, 11, 14, 15]);
    }

    #[test]
    fn test_zero_size_region_rejected() {
        let frame = indexed_frame();
        // 0.1 of 4 pixels truncates to 0
        let err = extract(&frame, &region("tiny", 0.0, 0.0, 0.1, 0.5)).unwrap_err();
        assert!(matches!(err, ExtractError::EmptyRegion { .. }));
    }

    #[test]
    fn test_out_of_bounds_region_rejected() {
        let frame = indexed_frame();
        let err = extract(&frame, &region("wide", 0.75, 0.0, 0.75, 0.5)).unwrap_err();
        assert!(matches!(err, ExtractError::OutOfBounds { .. }));
    }

    #[test]
    fn test_full_frame_region_ok() {
        let frame = indexed_frame();
        let crop = extract(&frame, &region("full", 0.0, 0.0, 1.0, 1.0)).unwrap();
        assert_eq!((crop.width, crop.height), (4, 4));
        assert_eq!(crop.data, frame.data());
    }

    #[test]
    fn test_grayscale_luminance_weights() {
        let crop = CroppedRegion {
            data: vec![255, 0, 0, 255],
            width: 1,
            height: 1,
        };
        let gray = to_grayscale(&crop);
        // 0.299 * 255 = 76.245 -> 76
        assert_eq!(&gray.data, &[76, 76, 76, 255]);
        // Source untouched
        assert_eq!(crop.data[0], 255);
    }
}
