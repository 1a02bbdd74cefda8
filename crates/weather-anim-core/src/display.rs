//! Output devices for the rendered canvas.
//!
//! The orchestrator draws into a 1-bpp [`FrameBuffer`] and hands it to a
//! [`WeatherDisplay`] which pushes the changed region to the panel.

use embedded_graphics::pixelcolor::{BinaryColor, Rgb565};
use embedded_graphics::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bitmap::FrameBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayKind {
    /// SSD1306-class OLED.
    Monochrome,
    /// ILI9342C-class TFT.
    Color,
}

pub trait WeatherDisplay {
    type Error: core::fmt::Debug;

    fn kind(&self) -> DisplayKind;

    /// Size of the 1-bpp canvas this display wants.
    fn canvas_size(&self) -> Size;

    /// Send the dirty part of `canvas` to the panel and mark it clean.
    fn present(&mut self, canvas: &mut FrameBuffer) -> Result<(), Self::Error>;
}

/// One canvas pixel per panel pixel.
pub struct MonochromeDisplay<D> {
    target: D,
}

impl<D> MonochromeDisplay<D>
where
    D: DrawTarget<Color = BinaryColor>,
{
    pub fn new(target: D) -> Self {
        Self { target }
    }

    pub fn inner(&self) -> &D {
        &self.target
    }

    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.target
    }

    pub fn into_inner(self) -> D {
        self.target
    }
}

impl<D> WeatherDisplay for MonochromeDisplay<D>
where
    D: DrawTarget<Color = BinaryColor>,
    D::Error: core::fmt::Debug,
{
    type Error = D::Error;

    fn kind(&self) -> DisplayKind {
        DisplayKind::Monochrome
    }

    fn canvas_size(&self) -> Size {
        self.target.bounding_box().size
    }

    fn present(&mut self, canvas: &mut FrameBuffer) -> Result<(), Self::Error> {
        canvas.flush(&mut self.target, Point::zero(), 1, BinaryColor::from)
    }
}

/// Colour panel showing the canvas upscaled by an integer factor, centred.
pub struct ColorDisplay<D> {
    target: D,
    canvas: Size,
    scale: u32,
    origin: Point,
    foreground: Rgb565,
    background: Rgb565,
}

impl<D> ColorDisplay<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    /// Wrap `target`, choosing the largest scale at which `canvas` fits.
    pub fn new(target: D, canvas: Size) -> Self {
        let panel = target.bounding_box().size;
        let scale = if canvas.width == 0 || canvas.height == 0 {
            1
        } else {
            (panel.width / canvas.width)
                .min(panel.height / canvas.height)
                .max(1)
        };
        let origin = Point::new(
            (panel.width.saturating_sub(canvas.width * scale) / 2) as i32,
            (panel.height.saturating_sub(canvas.height * scale) / 2) as i32,
        );

        Self {
            target,
            canvas,
            scale,
            origin,
            foreground: Rgb565::WHITE,
            background: Rgb565::BLACK,
        }
    }

    pub fn with_colors(mut self, foreground: Rgb565, background: Rgb565) -> Self {
        self.foreground = foreground;
        self.background = background;
        self
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Paint the whole panel with the background colour.
    pub fn clear_panel(&mut self) -> Result<(), D::Error> {
        self.target.clear(self.background)
    }

    pub fn inner(&self) -> &D {
        &self.target
    }

    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.target
    }
}

impl<D> WeatherDisplay for ColorDisplay<D>
where
    D: DrawTarget<Color = Rgb565>,
    D::Error: core::fmt::Debug,
{
    type Error = D::Error;

    fn kind(&self) -> DisplayKind {
        DisplayKind::Color
    }

    fn canvas_size(&self) -> Size {
        self.canvas
    }

    fn present(&mut self, canvas: &mut FrameBuffer) -> Result<(), Self::Error> {
        let (fg, bg) = (self.foreground, self.background);
        canvas.flush(&mut self.target, self.origin, self.scale, move |on| {
            if on { fg } else { bg }
        })
    }
}
