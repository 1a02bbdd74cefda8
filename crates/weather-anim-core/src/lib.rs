//! Hardware-independent core of the weather-anim display.
//!
//! Polls a Home Assistant weather entity through a [`source::WeatherSource`],
//! maps its state onto a [`condition::WeatherCondition`], and renders a
//! matching animation into a packed 1-bpp canvas that a
//! [`display::WeatherDisplay`] pushes to a panel.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod animation;
pub mod bitmap;
pub mod cache;
pub mod condition;
pub mod config;
pub mod decode;
pub mod display;
pub mod error;
pub mod glyphs;
pub mod orchestrator;
pub mod source;
pub mod transition;

pub use animation::{Animation, Playback};
pub use bitmap::FrameBuffer;
pub use condition::WeatherCondition;
pub use config::Config;
pub use error::WeatherError;
pub use orchestrator::{Mode, RenderState, WeatherAnimations};
