//! Monochrome bitmap buffer and the rasterizers that draw into it.

mod framebuffer;
pub mod primitives;

pub use framebuffer::{DirtyRect, FrameBuffer, buffer_len};
pub use primitives::{
    draw_circle, draw_hline, draw_line, draw_round_rect, fill_circle, fill_triangle,
};
