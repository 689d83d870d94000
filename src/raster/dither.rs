//! Grayscale intensity to burn intensity
//!
//! Input pixels are 0 = black .. 255 = white. Output pixels are
//! 0 = no burn .. 255 = full burn, so darker source burns harder.

use image::{GrayImage, Luma};

use crate::scene::{DitherMode, RasterSettings};

const BAYER_4X4: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

/// Dither `gray` with the mode selected in `settings`
pub fn dither(gray: &GrayImage, settings: &RasterSettings) -> GrayImage {
    match settings.dithering {
        DitherMode::Threshold => threshold(gray, settings.threshold),
        DitherMode::Ordered => ordered(gray),
        DitherMode::FloydSteinberg => floyd_steinberg(gray),
        DitherMode::Grayscale => grayscale(gray),
    }
}

/// Full burn where the pixel is darker than `level`
pub fn threshold(gray: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let Luma([v]) = *gray.get_pixel(x, y);
        Luma([if v < level { 255 } else { 0 }])
    })
}

/// Bayer 4x4 ordered dither
pub fn ordered(gray: &GrayImage) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let Luma([v]) = *gray.get_pixel(x, y);
        let level = f64::from(BAYER_4X4[(y % 4) as usize][(x % 4) as usize]) / 16.0 * 255.0;
        Luma([if f64::from(v) < level { 255 } else { 0 }])
    })
}

/// Floyd-Steinberg error diffusion, row-major, left to right on every row
pub fn floyd_steinberg(gray: &GrayImage) -> GrayImage {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let mut buf: Vec<f32> = gray.as_raw().iter().map(|&v| f32::from(v)).collect();
    let mut out = vec![0u8; w * h];

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let old = buf[i];
            let (burn, quantized) = if old < 128.0 { (255, 0.0) } else { (0, 255.0) };
            out[i] = burn;

            let err = old - quantized;
            if x + 1 < w {
                buf[i + 1] += err * 7.0 / 16.0;
            }
            if y + 1 < h {
                if x > 0 {
                    buf[i + w - 1] += err * 3.0 / 16.0;
                }
                buf[i + w] += err * 5.0 / 16.0;
                if x + 1 < w {
                    buf[i + w + 1] += err / 16.0;
                }
            }
        }
    }

    GrayImage::from_raw(gray.width(), gray.height(), out)
        .unwrap_or_else(|| GrayImage::new(gray.width(), gray.height()))
}

/// Continuous power: burn is the inverse of intensity
pub fn grayscale(gray: &GrayImage) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let Luma([v]) = *gray.get_pixel(x, y);
        Luma([255 - v])
    })
}
