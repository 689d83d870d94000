//! Decoding raster payloads and building the intensity field

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{GrayImage, ImageReader, Luma, Rgba, RgbaImage};
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::scene::{ImageData, RasterSettings};

/// Decode an item's pixel payload into RGBA
pub fn decode_rgba(data: &ImageData) -> Result<RgbaImage> {
    match data {
        ImageData::Base64(text) => {
            // Accept both bare base64 and `data:image/png;base64,...` URLs
            let payload = match text.split_once(";base64,") {
                Some((_, rest)) => rest,
                None => text.as_str(),
            };
            let bytes = STANDARD.decode(payload.trim())?;
            let img = ImageReader::new(Cursor::new(bytes))
                .with_guessed_format()?
                .decode()?;
            Ok(img.to_rgba8())
        }
        ImageData::Rgba {
            width,
            height,
            pixels,
        } => RgbaImage::from_raw(*width, *height, pixels.clone()).ok_or_else(|| {
            Error::InvalidImage(format!(
                "{} bytes cannot hold {}x{} RGBA pixels",
                pixels.len(),
                width,
                height
            ))
        }),
    }
}

/// Brightness/contrast adjustment of one channel, as the editor preview does it
fn adjust_channel(v: u8, brightness: f64, contrast: f64) -> f64 {
    let b = brightness / 100.0 * 255.0;
    let c = (contrast + 100.0) / 100.0;
    let v = (f64::from(v) + b - 128.0) * c + 128.0;
    v.round().clamp(0.0, 255.0)
}

/// Build the 0 (black) .. 255 (white) intensity field the ditherers consume.
///
/// Pixels with alpha below 128 count as white so transparent areas never burn.
pub fn intensity_field(img: &RgbaImage, settings: &RasterSettings) -> GrayImage {
    let adjust = settings.brightness != 0.0 || settings.contrast != 0.0;

    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let Rgba([r, g, b, a]) = *img.get_pixel(x, y);
        let (r, g, b) = if adjust {
            (
                adjust_channel(r, settings.brightness, settings.contrast),
                adjust_channel(g, settings.brightness, settings.contrast),
                adjust_channel(b, settings.brightness, settings.contrast),
            )
        } else {
            (f64::from(r), f64::from(g), f64::from(b))
        };

        let mut gray = 0.299 * r + 0.587 * g + 0.114 * b;
        if a < 128 {
            gray = 255.0;
        }
        if settings.invert {
            gray = 255.0 - gray;
        }
        Luma([gray.round().clamp(0.0, 255.0) as u8])
    })
}
