//! PNG / GIF / BMP decoding with the `image` crate.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageFormat, RgbaImage};
use log::debug;

use weather_anim_core::decode::{DecodedImage, GrayFrame, ImageDecoder, LumaA};
use weather_anim_core::error::WeatherError;

/// Decoder for every format the `image` crate was built with.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, WeatherError> {
        let format = image::guess_format(bytes).map_err(WeatherError::decode)?;
        let frames = match format {
            ImageFormat::Gif => decode_gif(bytes)?,
            other => {
                let image = image::load_from_memory_with_format(bytes, other)
                    .map_err(WeatherError::decode)?;
                vec![gray_frame(&image.to_rgba8(), 0)]
            }
        };
        debug!("Decoded {:?} with {} frame(s)", format, frames.len());
        Ok(DecodedImage { frames })
    }
}

fn decode_gif(bytes: &[u8]) -> Result<Vec<GrayFrame>, WeatherError> {
    let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(WeatherError::decode)?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(WeatherError::decode)?;

    Ok(frames
        .iter()
        .map(|frame| {
            let (numer, denom) = frame.delay().numer_denom_ms();
            gray_frame(frame.buffer(), numer / denom.max(1))
        })
        .collect())
}

fn gray_frame(rgba: &RgbaImage, delay_ms: u32) -> GrayFrame {
    GrayFrame {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba
            .pixels()
            .map(|p| LumaA::from_rgba(p[0], p[1], p[2], p[3]))
            .collect(),
        delay_ms,
    }
}
