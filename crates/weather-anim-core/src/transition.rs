//! Time-bounded blends between two frames.

use embassy_time::{Duration, Instant};
use serde::{Deserialize, Serialize};

use crate::bitmap::FrameBuffer;
use crate::error::WeatherError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    /// Old frame leaves to the left, new one enters from the right.
    SlideLeft,
    SlideRight,
    /// Old frame leaves upwards, new one enters from the bottom.
    SlideUp,
    SlideDown,
    /// Pixel dissolve from old to new.
    Fade,
}

/// A transition in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub kind: TransitionKind,
    pub start: Instant,
    pub duration: Duration,
}

impl Transition {
    pub fn new(kind: TransitionKind, start: Instant, duration: Duration) -> Self {
        Self {
            kind,
            start,
            duration,
        }
    }

    /// Fraction complete at `now`, clamped to `0.0..=1.0`.
    ///
    /// A zero-length transition is complete immediately.
    pub fn progress(&self, now: Instant) -> f32 {
        let total = self.duration.as_millis();
        let elapsed = now.saturating_duration_since(self.start).as_millis();
        if total == 0 || elapsed >= total {
            return 1.0;
        }
        elapsed as f32 / total as f32
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }

    /// Draw the blend of `from` and `to` at `now` into `out`.
    pub fn render(
        &self,
        from: &FrameBuffer,
        to: &FrameBuffer,
        now: Instant,
        out: &mut FrameBuffer,
    ) -> Result<(), WeatherError> {
        compose(self.kind, from, to, self.progress(now), out)
    }
}

/// Stable per-pixel value in `0..256` used to order the dissolve.
fn dissolve_rank(x: u32, y: u32) -> u32 {
    let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2C1B_3C6D);
    h ^= h >> 12;
    h & 0xFF
}

/// Compose one transition frame. All three buffers must share a size.
pub fn compose(
    kind: TransitionKind,
    from: &FrameBuffer,
    to: &FrameBuffer,
    progress: f32,
    out: &mut FrameBuffer,
) -> Result<(), WeatherError> {
    for buf in [from, to] {
        if buf.width() != out.width() || buf.height() != out.height() {
            return Err(WeatherError::FrameSize {
                expected: out.as_bytes().len(),
                actual: buf.as_bytes().len(),
            });
        }
    }

    let progress = progress.clamp(0.0, 1.0);
    let (w, h) = (out.width() as i32, out.height() as i32);
    let offset = |extent: i32| (progress * extent as f32 + 0.5) as i32;

    out.clear();
    match kind {
        TransitionKind::SlideLeft => {
            let dx = offset(w);
            out.draw_buffer(from, -dx, 0);
            out.draw_buffer(to, w - dx, 0);
        }
        TransitionKind::SlideRight => {
            let dx = offset(w);
            out.draw_buffer(from, dx, 0);
            out.draw_buffer(to, dx - w, 0);
        }
        TransitionKind::SlideUp => {
            let dy = offset(h);
            out.draw_buffer(from, 0, -dy);
            out.draw_buffer(to, 0, h - dy);
        }
        TransitionKind::SlideDown => {
            let dy = offset(h);
            out.draw_buffer(from, 0, dy);
            out.draw_buffer(to, 0, dy - h);
        }
        TransitionKind::Fade => {
            let cutoff = (progress * 256.0) as u32;
            for y in 0..h {
                for x in 0..w {
                    let src = if dissolve_rank(x as u32, y as u32) < cutoff {
                        to
                    } else {
                        from
                    };
                    if src.get_pixel(x, y) {
                        out.set_pixel(x, y);
                    }
                }
            }
        }
    }
    Ok(())
}
