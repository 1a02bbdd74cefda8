//! Packed 1-bit-per-pixel framebuffer with per-pixel change detection.
//!
//! Rows are `ceil(width / 8)` bytes wide, bits are packed MSB-first, and a
//! set bit is a lit pixel. This is the layout SSD1306-class drivers and
//! `ImageRaw<BinaryColor>` expect, so a buffer can be handed to a display
//! without conversion.
//!
//! Every write is clipped to the buffer. Writes that actually change a bit
//! grow a dirty bounding box, and [`FrameBuffer::flush`] sends only that
//! region to the target display.

extern crate alloc;

use alloc::vec::Vec;
use core::convert::Infallible;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::debug;

use crate::error::WeatherError;

/// Bounding box of pixels that have changed since the last flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl DirtyRect {
    /// Expand the dirty region to include the given pixel coordinate.
    fn expand(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Create a new dirty rect covering a single pixel.
    fn from_point(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// Number of bytes a `width` x `height` packed buffer occupies.
pub const fn buffer_len(width: u32, height: u32) -> usize {
    (width as usize).div_ceil(8) * height as usize
}

/// Heap-allocated monochrome framebuffer.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    stride: usize,
    bytes: Vec<u8>,
    dirty: Option<DirtyRect>,
}

impl core::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("lit", &self.count_lit())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl FrameBuffer {
    /// Allocate a blank buffer, reporting heap exhaustion instead of aborting.
    pub fn try_new(width: u32, height: u32) -> Result<Self, WeatherError> {
        let len = buffer_len(width, height);
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| WeatherError::Allocation)?;
        bytes.resize(len, 0);

        Ok(Self {
            width,
            height,
            stride: (width as usize).div_ceil(8),
            bytes,
            dirty: None,
        })
    }

    /// Wrap existing packed bytes, checking the `ceil(W/8) * H` size invariant.
    pub fn from_bytes(width: u32, height: u32, bytes: Vec<u8>) -> Result<Self, WeatherError> {
        let expected = buffer_len(width, height);
        if bytes.len() != expected {
            return Err(WeatherError::FrameSize {
                expected,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            width,
            height,
            stride: (width as usize).div_ceil(8),
            bytes,
            dirty: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw packed bytes, row-major, MSB-first.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn dirty(&self) -> Option<DirtyRect> {
        self.dirty
    }

    /// Mark the whole buffer as changed, e.g. after a new display is attached.
    pub fn mark_all_dirty(&mut self) {
        if self.width > 0 && self.height > 0 {
            self.dirty = Some(DirtyRect {
                min_x: 0,
                min_y: 0,
                max_x: self.width - 1,
                max_y: self.height - 1,
            });
        }
    }

    /// Forget pending changes without flushing them.
    pub fn mark_clean(&mut self) {
        self.dirty = None;
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<(usize, u8)> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        let idx = y as usize * self.stride + x as usize / 8;
        let mask = 0x80u8 >> (x as u32 % 8);
        Some((idx, mask))
    }

    /// Write one pixel, expanding the dirty rect only if the bit changed.
    #[inline]
    pub fn write_pixel(&mut self, x: i32, y: i32, on: bool) {
        let Some((idx, mask)) = self.index(x, y) else {
            return;
        };
        let old = self.bytes[idx];
        let new = if on { old | mask } else { old & !mask };
        if old != new {
            self.bytes[idx] = new;
            match &mut self.dirty {
                Some(rect) => rect.expand(x as u32, y as u32),
                None => self.dirty = Some(DirtyRect::from_point(x as u32, y as u32)),
            }
        }
    }

    /// Light the pixel at `(x, y)`. Out-of-range coordinates are ignored.
    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32) {
        self.write_pixel(x, y, true);
    }

    #[inline]
    pub fn clear_pixel(&mut self, x: i32, y: i32) {
        self.write_pixel(x, y, false);
    }

    /// Whether `(x, y)` is lit. Out-of-range coordinates read as unlit.
    #[inline]
    pub fn get_pixel(&self, x: i32, y: i32) -> bool {
        match self.index(x, y) {
            Some((idx, mask)) => self.bytes[idx] & mask != 0,
            None => false,
        }
    }

    /// Turn every pixel off.
    pub fn clear(&mut self) {
        self.fill(false);
    }

    /// Set every pixel to `on`. Row padding bits stay clear.
    pub fn fill(&mut self, on: bool) {
        if self.stride == 0 {
            return;
        }
        let last = self.stride - 1;
        let tail = match self.width % 8 {
            0 => 0xFF,
            rem => 0xFFu8 << (8 - rem),
        };

        let mut changed = false;
        for row in self.bytes.chunks_exact_mut(self.stride) {
            for (i, byte) in row.iter_mut().enumerate() {
                let value = match (on, i == last) {
                    (false, _) => 0x00,
                    (true, true) => tail,
                    (true, false) => 0xFF,
                };
                if *byte != value {
                    *byte = value;
                    changed = true;
                }
            }
        }
        if changed {
            self.mark_all_dirty();
        }
    }

    pub fn count_lit(&self) -> usize {
        let mut count = 0;
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                if self.get_pixel(x, y) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Light every pixel that is lit in `src`, placed with its origin at
    /// `(dx, dy)`. Pixels that fall outside this buffer are clipped.
    pub fn draw_buffer(&mut self, src: &FrameBuffer, dx: i32, dy: i32) {
        for y in 0..src.height as i32 {
            let ty = y + dy;
            if ty < 0 || ty as u32 >= self.height {
                continue;
            }
            for x in 0..src.width as i32 {
                if src.get_pixel(x, y) {
                    self.set_pixel(x + dx, ty);
                }
            }
        }
    }

    /// Replace this buffer's contents with `src`, marking only changed pixels
    /// dirty. Both buffers must have the same dimensions.
    pub fn copy_from(&mut self, src: &FrameBuffer) -> Result<(), WeatherError> {
        if src.width != self.width || src.height != self.height {
            return Err(WeatherError::FrameSize {
                expected: self.bytes.len(),
                actual: src.bytes.len(),
            });
        }

        for y in 0..self.height as i32 {
            let row = y as usize * self.stride;
            if self.bytes[row..row + self.stride] == src.bytes[row..row + self.stride] {
                continue;
            }
            for x in 0..self.width as i32 {
                self.write_pixel(x, y, src.get_pixel(x, y));
            }
        }
        Ok(())
    }

    /// Flush the dirty region to `display`, then reset the dirty state.
    ///
    /// Each buffer pixel becomes a `scale` x `scale` block placed at
    /// `origin`, coloured through `color`. If nothing changed this is a
    /// no-op.
    pub fn flush<D, F>(
        &mut self,
        display: &mut D,
        origin: Point,
        scale: u32,
        color: F,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget,
        F: Fn(bool) -> D::Color,
    {
        let Some(rect) = self.dirty.take() else {
            return Ok(());
        };
        let scale = scale.max(1);

        debug!(
            "Flushing {}x{} dirty region at ({}, {})",
            rect.width(),
            rect.height(),
            rect.min_x,
            rect.min_y
        );

        let area = Rectangle::new(
            origin + Point::new((rect.min_x * scale) as i32, (rect.min_y * scale) as i32),
            Size::new(rect.width() * scale, rect.height() * scale),
        );

        // Borrow immutably so the iterator does not capture `&mut self`.
        let this = &*self;
        let color = &color;
        let pixel_iter = (0..rect.height() * scale).flat_map(move |row| {
            let y = (rect.min_y + row / scale) as i32;
            (0..rect.width() * scale).map(move |col| {
                let x = (rect.min_x + col / scale) as i32;
                color(this.get_pixel(x, y))
            })
        });

        display.fill_contiguous(&area, pixel_iter)
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            self.write_pixel(coord.x, coord.y, color.is_on());
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        let Some(bottom_right) = area.bottom_right() else {
            return Ok(());
        };

        for y in area.top_left.y..=bottom_right.y {
            for x in area.top_left.x..=bottom_right.x {
                self.write_pixel(x, y, color.is_on());
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color.is_on());
        Ok(())
    }
}
