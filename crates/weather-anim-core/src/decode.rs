//! Image decoding boundary and luminance-threshold conversion.
//!
//! Container formats (PNG, GIF, BMP) are decoded by an [`ImageDecoder`]
//! into greyscale-with-alpha frames. Those frames are then fitted onto the
//! display canvas and thresholded into packed 1-bpp [`FrameBuffer`]s.
//!
//! Only BMP decoding ships in this crate ([`BmpDecoder`], backed by
//! `tinybmp`); hosts with `std` can plug in a richer decoder.

extern crate alloc;

use alloc::vec::Vec;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use log::debug;
use tinybmp::Bmp;

use crate::animation::Animation;
use crate::bitmap::FrameBuffer;
use crate::error::WeatherError;

/// One greyscale pixel with coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LumaA {
    pub luma: u8,
    pub alpha: u8,
}

impl LumaA {
    /// Rec.601 luma of an RGBA pixel.
    pub fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
        Self {
            luma: luma as u8,
            alpha: a,
        }
    }
}

/// A single decoded frame, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<LumaA>,
    /// Display time of this frame; 0 when the container gives none.
    pub delay_ms: u32,
}

impl GrayFrame {
    pub fn pixel(&self, x: u32, y: u32) -> LumaA {
        self.pixels
            .get((y * self.width + x) as usize)
            .copied()
            .unwrap_or_default()
    }
}

/// Every frame of a decoded image. Still images have exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedImage {
    pub frames: Vec<GrayFrame>,
}

/// Turns downloaded bytes into greyscale frames.
pub trait ImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, WeatherError>;
}

/// BMP decoder for on-device use.
#[derive(Debug, Clone, Copy, Default)]
pub struct BmpDecoder;

impl ImageDecoder for BmpDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, WeatherError> {
        let bmp = Bmp::<Rgb888>::from_slice(bytes)
            .map_err(|e| WeatherError::decode(format_args!("bmp: {:?}", e)))?;
        let size = bmp.size();

        let len = size.width as usize * size.height as usize;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|_| WeatherError::Allocation)?;
        pixels.resize(len, LumaA::default());

        for Pixel(point, color) in bmp.pixels() {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < size.width && y < size.height {
                pixels[(y * size.width + x) as usize] =
                    LumaA::from_rgba(color.r(), color.g(), color.b(), 0xFF);
            }
        }

        let mut frames = Vec::new();
        frames.push(GrayFrame {
            width: size.width,
            height: size.height,
            pixels,
            delay_ms: 0,
        });
        Ok(DecodedImage { frames })
    }
}

/// How greyscale pixels become lit or dark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdOptions {
    /// Pixels darker than this are ink.
    pub threshold: u8,
    /// Pixels less opaque than this are always dark.
    pub alpha_cutoff: u8,
    /// Light ink on a dark background instead.
    pub invert: bool,
}

impl Default for ThresholdOptions {
    fn default() -> Self {
        Self {
            threshold: 128,
            alpha_cutoff: 128,
            invert: false,
        }
    }
}

impl ThresholdOptions {
    pub fn is_lit(&self, px: LumaA) -> bool {
        px.alpha >= self.alpha_cutoff && ((px.luma < self.threshold) != self.invert)
    }
}

/// Fit `frame` inside `width` x `height` keeping its aspect ratio, centre
/// it, and threshold it into a packed buffer (nearest-neighbour sampling).
pub fn to_frame_buffer(
    frame: &GrayFrame,
    width: u32,
    height: u32,
    options: &ThresholdOptions,
) -> Result<FrameBuffer, WeatherError> {
    let mut out = FrameBuffer::try_new(width, height)?;
    if frame.width == 0 || frame.height == 0 || width == 0 || height == 0 {
        return Ok(out);
    }

    let (sw, sh) = (frame.width as u64, frame.height as u64);
    let (tw, th) = (width as u64, height as u64);
    let (dw, dh) = if sw * th <= sh * tw {
        ((sw * th / sh).max(1), th)
    } else {
        (tw, (sh * tw / sw).max(1))
    };
    let ox = ((tw - dw) / 2) as i32;
    let oy = ((th - dh) / 2) as i32;

    for y in 0..dh {
        let sy = (y * sh / dh) as u32;
        for x in 0..dw {
            let sx = (x * sw / dw) as u32;
            if options.is_lit(frame.pixel(sx, sy)) {
                out.set_pixel(ox + x as i32, oy + y as i32);
            }
        }
    }
    out.mark_clean();
    Ok(out)
}

/// Convert every decoded frame and wrap them in an [`Animation`].
///
/// The frame delay is the mean of the non-zero per-frame delays, or
/// `fallback_delay_ms` if the image carries none.
pub fn animation_from_decoded(
    decoded: &DecodedImage,
    width: u32,
    height: u32,
    options: &ThresholdOptions,
    fallback_delay_ms: u32,
) -> Result<Animation, WeatherError> {
    if decoded.frames.is_empty() {
        return Err(WeatherError::decode("image has no frames"));
    }

    let mut frames = Vec::new();
    frames
        .try_reserve_exact(decoded.frames.len())
        .map_err(|_| WeatherError::Allocation)?;
    for frame in &decoded.frames {
        frames.push(to_frame_buffer(frame, width, height, options)?);
    }

    let delays: Vec<u32> = decoded
        .frames
        .iter()
        .map(|f| f.delay_ms)
        .filter(|&d| d > 0)
        .collect();
    let delay = if delays.is_empty() {
        fallback_delay_ms
    } else {
        (delays.iter().map(|&d| d as u64).sum::<u64>() / delays.len() as u64) as u32
    };

    debug!(
        "Converted {} decoded frame(s) to {}x{} bitmaps, {} ms/frame",
        frames.len(),
        width,
        height,
        delay
    );
    Animation::new(frames, delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn solid(width: u32, height: u32, px: LumaA, delay_ms: u32) -> GrayFrame {
        GrayFrame {
            width,
            height,
            pixels: vec![px; (width * height) as usize],
            delay_ms,
        }
    }

    const INK: LumaA = LumaA {
        luma: 0,
        alpha: 255,
    };
    const PAPER: LumaA = LumaA {
        luma: 255,
        alpha: 255,
    };
    const CLEAR: LumaA = LumaA { luma: 0, alpha: 0 };

    #[test]
    fn test_luma_weights() {
        assert_eq!(LumaA::from_rgba(255, 255, 255, 255).luma, 255);
        assert_eq!(LumaA::from_rgba(0, 0, 0, 255).luma, 0);
        assert_eq!(LumaA::from_rgba(0, 255, 0, 255).luma, 149);
    }

    #[test]
    fn test_threshold_rules() {
        let opts = ThresholdOptions::default();
        assert!(opts.is_lit(INK));
        assert!(!opts.is_lit(PAPER));
        assert!(!opts.is_lit(CLEAR));

        let inverted = ThresholdOptions {
            invert: true,
            ..Default::default()
        };
        assert!(!inverted.is_lit(INK));
        assert!(inverted.is_lit(PAPER));
        assert!(!inverted.is_lit(CLEAR));
    }

    #[test]
    fn test_square_icon_is_centred_on_wide_canvas() {
        let frame = solid(32, 32, INK, 0);
        let fb = to_frame_buffer(&frame, 128, 64, &ThresholdOptions::default()).unwrap();
        // Scaled to 64x64, centred horizontally.
        assert_eq!(fb.count_lit(), 64 * 64);
        assert!(!fb.get_pixel(31, 10));
        assert!(fb.get_pixel(32, 10));
        assert!(fb.get_pixel(95, 63));
        assert!(!fb.get_pixel(96, 10));
        assert!(fb.dirty().is_none());
    }

    #[test]
    fn test_downsample_keeps_half_split() {
        // Left half ink, right half paper.
        let mut frame = solid(256, 128, PAPER, 0);
        for y in 0..128 {
            for x in 0..128 {
                frame.pixels[(y * 256 + x) as usize] = INK;
            }
        }
        let fb = to_frame_buffer(&frame, 128, 64, &ThresholdOptions::default()).unwrap();
        assert!(fb.get_pixel(0, 0));
        assert!(fb.get_pixel(63, 63));
        assert!(!fb.get_pixel(64, 0));
        assert!(!fb.get_pixel(127, 63));
    }

    #[test]
    fn test_animation_delay_is_mean_of_frame_delays() {
        let decoded = DecodedImage {
            frames: vec![solid(4, 4, INK, 100), solid(4, 4, PAPER, 300), solid(4, 4, INK, 0)],
        };
        let anim =
            animation_from_decoded(&decoded, 16, 8, &ThresholdOptions::default(), 999).unwrap();
        assert_eq!(anim.frame_count(), 3);
        assert_eq!(anim.frame_delay_ms(), 200);
    }

    #[test]
    fn test_animation_fallback_delay_and_empty() {
        let decoded = DecodedImage {
            frames: vec![solid(4, 4, INK, 0)],
        };
        let anim =
            animation_from_decoded(&decoded, 16, 8, &ThresholdOptions::default(), 450).unwrap();
        assert_eq!(anim.frame_delay_ms(), 450);

        let empty = DecodedImage::default();
        assert!(matches!(
            animation_from_decoded(&empty, 16, 8, &ThresholdOptions::default(), 450),
            Err(WeatherError::Decode(_))
        ));
    }

    /// 2x2 24-bit BMP: bottom row black/white, top row white/black.
    fn tiny_bmp() -> Vec<u8> {
        let mut b = Vec::new();
        let row_size = 8u32; // 2 px * 3 bytes, padded to 4
        let data_size = row_size * 2;
        let offset = 14 + 40;
        b.extend_from_slice(b"BM");
        b.extend_from_slice(&(offset + data_size).to_le_bytes());
        b.extend_from_slice(&[0, 0, 0, 0]);
        b.extend_from_slice(&offset.to_le_bytes());
        b.extend_from_slice(&40u32.to_le_bytes());
        b.extend_from_slice(&2i32.to_le_bytes());
        b.extend_from_slice(&2i32.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(&24u16.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());
        b.extend_from_slice(&data_size.to_le_bytes());
        b.extend_from_slice(&2835u32.to_le_bytes());
        b.extend_from_slice(&2835u32.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());
        // Bottom-up rows, BGR.
        b.extend_from_slice(&[0, 0, 0, 255, 255, 255, 0, 0]);
        b.extend_from_slice(&[255, 255, 255, 0, 0, 0, 0, 0]);
        b
    }

    #[test]
    fn test_bmp_decoder_reads_pixels() {
        let decoded = BmpDecoder.decode(&tiny_bmp()).unwrap();
        assert_eq!(decoded.frames.len(), 1);
        let frame = &decoded.frames[0];
        assert_eq!((frame.width, frame.height), (2, 2));
        // Top-left white, top-right black, bottom-left black.
        assert_eq!(frame.pixel(0, 0).luma, 255);
        assert_eq!(frame.pixel(1, 0).luma, 0);
        assert_eq!(frame.pixel(0, 1).luma, 0);
    }

    #[test]
    fn test_bmp_decoder_rejects_garbage() {
        assert!(matches!(
            BmpDecoder.decode(b"definitely not a bitmap"),
            Err(WeatherError::Decode(_))
        ));
    }
}
