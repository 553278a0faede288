//! Ring buffer holding the most recent captured frames
//!
//! Recognition runs over every buffered frame so a single bad capture can be
//! outvoted; the capacity bounds the number of OCR invocations per cycle.

use std::collections::VecDeque;
use std::sync::Arc;

use thiserror::Error;

use super::Frame;

/// Default number of frames kept for temporal averaging.
pub const DEFAULT_CAPACITY: usize = 3;

#[derive(Debug, Error)]
pub enum RingError {
    /// Capacity misconfiguration is fatal (a zero-frame buffer can never
    /// produce an observation).
    #[error("frame ring capacity must be at least 1")]
    ZeroCapacity,
}

/// FIFO buffer of the last N frames, oldest first.
///
/// Frames are shared via `Arc` so a snapshot never copies pixel data.
#[derive(Debug)]
pub struct FrameRing {
    frames: VecDeque<Arc<Frame>>,
    capacity: usize,
}

impl FrameRing {
    /// Create a ring with the given capacity.
    pub fn new(capacity: usize) -> Result<Self, RingError> {
        if capacity == 0 {
            return Err(RingError::ZeroCapacity);
        }
        Ok(Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append a frame, evicting the oldest if the ring is full.
    pub fn push(&mut self, frame: Frame) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(Arc::new(frame));
    }

    /// Current frames in push order (oldest -> newest). Clones handles only.
    pub fn snapshot(&self) -> Vec<Arc<Frame>> {
        self.frames.iter().cloned().collect()
    }

    /// Most recently pushed frame, if any.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.frames.back().cloned()
    }

    /// Drop all buffered frames.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
