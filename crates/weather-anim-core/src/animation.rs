//! Frame sequences and frame selection.

extern crate alloc;

use alloc::vec::Vec;

use crate::bitmap::FrameBuffer;
use crate::error::WeatherError;

/// How frames are picked from an [`Animation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    /// Cycle through all frames.
    Continuous,
    /// Hold the first frame.
    Static,
}

/// An owned, ordered set of equally sized frames plus the delay between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Animation {
    frames: Vec<FrameBuffer>,
    frame_delay_ms: u32,
}

impl Animation {
    /// Build an animation, checking that every frame has the same size.
    pub fn new(frames: Vec<FrameBuffer>, frame_delay_ms: u32) -> Result<Self, WeatherError> {
        if let Some(first) = frames.first() {
            let expected = first.as_bytes().len();
            for frame in &frames[1..] {
                if frame.width() != first.width() || frame.height() != first.height() {
                    return Err(WeatherError::FrameSize {
                        expected,
                        actual: frame.as_bytes().len(),
                    });
                }
            }
        }

        Ok(Self {
            frames,
            frame_delay_ms,
        })
    }

    pub fn frames(&self) -> &[FrameBuffer] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_delay_ms(&self) -> u32 {
        self.frame_delay_ms
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Length of one full cycle in milliseconds.
    pub fn cycle_ms(&self) -> u64 {
        self.frame_delay_ms as u64 * self.frames.len() as u64
    }

    /// Frame shown `elapsed_ms` after the animation started.
    ///
    /// `(elapsed / delay) mod count` in continuous playback, 0 otherwise.
    pub fn frame_index(&self, elapsed_ms: u64, playback: Playback) -> usize {
        frame_index(elapsed_ms, self.frame_delay_ms, self.frames.len(), playback)
    }

    pub fn frame_at(&self, elapsed_ms: u64, playback: Playback) -> Option<&FrameBuffer> {
        self.frames.get(self.frame_index(elapsed_ms, playback))
    }
}

/// Frame selection policy, usable without an [`Animation`].
pub fn frame_index(elapsed_ms: u64, frame_delay_ms: u32, frame_count: usize, playback: Playback) -> usize {
    if frame_count == 0 || frame_delay_ms == 0 || playback == Playback::Static {
        return 0;
    }
    ((elapsed_ms / frame_delay_ms as u64) % frame_count as u64) as usize
}
