//! Built-in fallback animations drawn with the bitmap primitives.
//!
//! Used whenever a condition has neither a user-supplied nor a downloaded
//! animation. Everything is laid out relative to the canvas centre so the
//! same glyphs work on any canvas size.

extern crate alloc;

use alloc::vec::Vec;

use crate::animation::Animation;
use crate::bitmap::{
    FrameBuffer, draw_line, draw_round_rect, fill_circle, fill_triangle,
};
use crate::condition::WeatherCondition;
use crate::error::WeatherError;

/// Sun disc radius.
const SUN_RADIUS: i32 = 10;

/// Sun rays as (inner, outer) offsets from the centre, eight directions.
/// Diagonals are pre-scaled by ~1/sqrt(2) so rays have equal length.
const SUN_RAYS: [((i32, i32), (i32, i32)); 8] = [
    ((12, 0), (18, 0)),
    ((8, 8), (13, 13)),
    ((0, 12), (0, 18)),
    ((-8, 8), (-13, 13)),
    ((-12, 0), (-18, 0)),
    ((-8, -8), (-13, -13)),
    ((0, -12), (0, -18)),
    ((8, -8), (13, -13)),
];

/// Zigzag lightning bolt relative to its anchor point.
const BOLT: [(i32, i32); 7] = [(0, 0), (-3, 5), (2, 10), (-2, 15), (3, 20), (0, 25), (5, 15)];

/// A puffy cloud: flat base with three bumps on top.
pub fn draw_cloud(buf: &mut FrameBuffer, cx: i32, cy: i32, width: i32, height: i32) {
    let half_w = width / 2;
    let base_top = cy - height / 4;
    draw_round_rect(buf, cx - half_w, base_top, width, height / 2 + 1, height / 4);

    let bump = (height / 2).max(2);
    fill_circle(buf, cx - half_w / 2, base_top, bump);
    fill_circle(buf, cx + half_w / 3, base_top - bump / 3, bump + bump / 3);
    fill_circle(buf, cx - half_w + bump / 2, cy, bump / 2 + 1);
    fill_circle(buf, cx + half_w - bump / 2, cy, bump / 2 + 1);
}

/// Small tear-drop: a dot with a short tail above it.
pub fn draw_rain_drop(buf: &mut FrameBuffer, x: i32, y: i32) {
    fill_circle(buf, x, y, 1);
    draw_line(buf, x, y - 3, x, y - 1);
}

/// Six-armed asterisk.
pub fn draw_snowflake(buf: &mut FrameBuffer, x: i32, y: i32) {
    draw_line(buf, x - 2, y, x + 2, y);
    draw_line(buf, x, y - 2, x, y + 2);
    draw_line(buf, x - 2, y - 2, x + 2, y + 2);
    draw_line(buf, x - 2, y + 2, x + 2, y - 2);
}

/// Zigzag bolt with a filled head.
pub fn draw_lightning(buf: &mut FrameBuffer, x: i32, y: i32) {
    for pair in BOLT.windows(2) {
        let (ax, ay) = pair[0];
        let (bx, by) = pair[1];
        draw_line(buf, x + ax, y + ay, x + bx, y + by);
    }
    fill_triangle(buf, x - 3, y + 5, x + 2, y + 10, x - 2, y + 10);
}

fn blank_frames(width: u32, height: u32, count: usize) -> Result<Vec<FrameBuffer>, WeatherError> {
    let mut frames = Vec::new();
    frames
        .try_reserve_exact(count)
        .map_err(|_| WeatherError::Allocation)?;
    for _ in 0..count {
        frames.push(FrameBuffer::try_new(width, height)?);
    }
    Ok(frames)
}

/// Generate the fallback animation for `condition` on a `width` x `height` canvas.
pub fn fallback_animation(
    condition: WeatherCondition,
    width: u32,
    height: u32,
) -> Result<Animation, WeatherError> {
    let cx = width as i32 / 2;
    let cy = height as i32 / 2;

    let frames = match condition {
        WeatherCondition::Clear => {
            let mut frames = blank_frames(width, height, 2)?;
            for frame in frames.iter_mut() {
                fill_circle(frame, cx, cy, SUN_RADIUS);
            }
            for ((ix, iy), (ox, oy)) in SUN_RAYS {
                draw_line(&mut frames[1], cx + ix, cy + iy, cx + ox, cy + oy);
            }
            frames
        }
        WeatherCondition::Cloudy => {
            let mut frames = blank_frames(width, height, 2)?;
            draw_cloud(&mut frames[0], cx - 34, cy - 7, 35, 15);
            draw_cloud(&mut frames[0], cx + 21, cy - 2, 40, 15);
            draw_cloud(&mut frames[1], cx - 29, cy - 7, 35, 15);
            draw_cloud(&mut frames[1], cx + 16, cy - 2, 40, 15);
            frames
        }
        WeatherCondition::Rain => {
            let mut frames = blank_frames(width, height, 3)?;
            for (i, frame) in frames.iter_mut().enumerate() {
                draw_cloud(frame, cx, cy - 12, 50, 15);
                for drop in 0..5 {
                    draw_rain_drop(frame, cx - 24 + drop * 15, cy + 13 + i as i32 * 5);
                }
            }
            frames
        }
        WeatherCondition::Snow => {
            let mut frames = blank_frames(width, height, 3)?;
            for (i, frame) in frames.iter_mut().enumerate() {
                draw_cloud(frame, cx, cy - 12, 50, 15);
                // The middle frame drifts sideways.
                let drift = if i == 1 { -5 } else { 0 };
                for flake in 0..5 {
                    draw_snowflake(frame, cx - 24 + drift + flake * 15, cy + 13 + i as i32 * 5);
                }
            }
            frames
        }
        WeatherCondition::Storm => {
            let mut frames = blank_frames(width, height, 2)?;
            for frame in frames.iter_mut() {
                draw_cloud(frame, cx, cy - 12, 60, 20);
            }
            draw_lightning(&mut frames[0], cx - 9, cy + 6);
            draw_lightning(&mut frames[1], cx + 11, cy + 4);
            frames
        }
    };

    Animation::new(frames, condition.default_frame_delay_ms())
}
