//! Shape rasterizers that draw straight into a [`FrameBuffer`].
//!
//! All coordinates are signed so shapes may hang off any edge. Iteration is
//! limited to the buffer and intermediates are widened, so any `i32` input
//! is accepted. None of these functions can fail.

use super::FrameBuffer;

/// Light a horizontal run from `x0` to `x1` inclusive, in either order.
pub fn draw_hline(buf: &mut FrameBuffer, x0: i32, x1: i32, y: i32) {
    if y < 0 || y >= buf.height() as i32 {
        return;
    }
    let (start, end) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
    let start = start.max(0);
    let end = end.min(buf.width() as i32 - 1);
    for x in start..=end {
        buf.set_pixel(x, y);
    }
}

/// Clamp a wide intermediate back into pixel coordinates.
fn narrow(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const ABOVE: u8 = 4;
const BELOW: u8 = 8;

fn outcode(x: i64, y: i64, max_x: i64, max_y: i64) -> u8 {
    let mut code = 0;
    if x < 0 {
        code |= LEFT;
    } else if x > max_x {
        code |= RIGHT;
    }
    if y < 0 {
        code |= ABOVE;
    } else if y > max_y {
        code |= BELOW;
    }
    code
}

/// Cohen-Sutherland clip of a segment to the buffer. `None` when no part of
/// it is visible.
fn clip_line(
    buf: &FrameBuffer,
    (mut x0, mut y0): (i64, i64),
    (mut x1, mut y1): (i64, i64),
) -> Option<((i32, i32), (i32, i32))> {
    if buf.width() == 0 || buf.height() == 0 {
        return None;
    }
    let (max_x, max_y) = (buf.width() as i64 - 1, buf.height() as i64 - 1);

    // Each pass pins one endpoint to an edge; four edges per endpoint.
    for _ in 0..8 {
        let (c0, c1) = (outcode(x0, y0, max_x, max_y), outcode(x1, y1, max_x, max_y));
        if c0 | c1 == 0 {
            return Some(((x0 as i32, y0 as i32), (x1 as i32, y1 as i32)));
        }
        if c0 & c1 != 0 {
            return None;
        }

        let code = if c0 != 0 { c0 } else { c1 };
        let (dx, dy) = ((x1 - x0) as i128, (y1 - y0) as i128);
        let (x, y) = if code & ABOVE != 0 || code & BELOW != 0 {
            let edge = if code & ABOVE != 0 { 0 } else { max_y };
            let x = x0 as i128 + dx * (edge - y0) as i128 / dy;
            (x as i64, edge)
        } else {
            let edge = if code & LEFT != 0 { 0 } else { max_x };
            let y = y0 as i128 + dy * (edge - x0) as i128 / dx;
            (edge, y as i64)
        };

        if code == c0 {
            (x0, y0) = (x, y);
        } else {
            (x1, y1) = (x, y);
        }
    }
    None
}

/// Integer Bresenham line, endpoints inclusive. Segments are clipped to the
/// buffer before stepping.
pub fn draw_line(buf: &mut FrameBuffer, x0: i32, y0: i32, x1: i32, y1: i32) {
    let Some(((x0, y0), (x1, y1))) =
        clip_line(buf, (x0 as i64, y0 as i64), (x1 as i64, y1 as i64))
    else {
        return;
    };

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        buf.set_pixel(x, y);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
}

/// Whether the square of half-size `r` around `(cx, cy)` misses the buffer.
fn disc_offscreen(buf: &FrameBuffer, cx: i64, cy: i64, r: i64) -> bool {
    cx + r < 0 || cy + r < 0 || cx - r >= buf.width() as i64 || cy - r >= buf.height() as i64
}

/// Midpoint circle outline.
pub fn draw_circle(buf: &mut FrameBuffer, cx: i32, cy: i32, r: i32) {
    let (cx, cy, r) = (cx as i64, cy as i64, r as i64);
    if r < 0 || disc_offscreen(buf, cx, cy, r) {
        return;
    }

    let mut x = r;
    let mut y = 0;
    let mut err = 1 - r;

    while x >= y {
        for (px, py) in [
            (x, y),
            (y, x),
            (-y, x),
            (-x, y),
            (-x, -y),
            (-y, -x),
            (y, -x),
            (x, -y),
        ] {
            buf.set_pixel(narrow(cx + px), narrow(cy + py));
        }

        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

/// Filled disc: every pixel with `dx² + dy² <= r²`.
///
/// Only the part of the bounding square inside the buffer is scanned.
pub fn fill_circle(buf: &mut FrameBuffer, cx: i32, cy: i32, r: i32) {
    let (cx, cy, r) = (cx as i64, cy as i64, r as i64);
    if r < 0 || disc_offscreen(buf, cx, cy, r) {
        return;
    }
    let r2 = r * r;
    let (w, h) = (buf.width() as i64, buf.height() as i64);
    for y in (cy - r).max(0)..=(cy + r).min(h - 1) {
        let dy = y - cy;
        for x in (cx - r).max(0)..=(cx + r).min(w - 1) {
            let dx = x - cx;
            if dx * dx + dy * dy <= r2 {
                buf.set_pixel(x as i32, y as i32);
            }
        }
    }
}

/// Filled `w` x `h` rectangle with its top-left corner at `(x, y)`.
///
/// `_radius` is accepted for API compatibility with rounded-rect callers
/// but corners are not rounded.
pub fn draw_round_rect(buf: &mut FrameBuffer, x: i32, y: i32, w: i32, h: i32, _radius: i32) {
    if w <= 0 || h <= 0 {
        return;
    }
    let right = narrow(x as i64 + w as i64 - 1);
    let top = y.max(0) as i64;
    let bottom = (y as i64 + h as i64).min(buf.height() as i64);
    for row in top..bottom {
        draw_hline(buf, x, right, row as i32);
    }
}

/// Edge x-coordinate at scanline `y` on the segment `(xa, ya)`-`(xb, yb)`.
fn edge_x(xa: i32, ya: i32, xb: i32, yb: i32, y: i32) -> i32 {
    if yb == ya {
        return xa;
    }
    let t = y as i128 - ya as i128;
    let x = xa as i128 + (xb as i128 - xa as i128) * t / (yb as i128 - ya as i128);
    x.clamp(i32::MIN as i128, i32::MAX as i128) as i32
}

/// Scanline-filled triangle.
///
/// Vertices are sorted by y and the triangle is split at the middle vertex
/// into a flat-bottom and a flat-top half; each scanline is filled between
/// the long edge (v0-v2) and the active short edge.
#[allow(clippy::too_many_arguments)]
pub fn fill_triangle(
    buf: &mut FrameBuffer,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
) {
    let mut v = [(x0, y0), (x1, y1), (x2, y2)];
    v.sort_by_key(|&(_, y)| y);
    let [(ax, ay), (bx, by), (cx, cy)] = v;

    if ay == cy {
        // All three on one scanline.
        let min = ax.min(bx).min(cx);
        let max = ax.max(bx).max(cx);
        draw_hline(buf, min, max, ay);
        return;
    }

    let top = ay.max(0);
    let bottom = cy.min(buf.height() as i32 - 1);
    for y in top..=bottom {
        let long = edge_x(ax, ay, cx, cy, y);
        let short = if y < by {
            edge_x(ax, ay, bx, by, y)
        } else if by == cy {
            // Flat bottom: the short edge is the bottom side itself.
            if y == by { bx } else { edge_x(bx, by, cx, cy, y) }
        } else {
            edge_x(bx, by, cx, cy, y)
        };
        draw_hline(buf, long, short, y);
    }
}
