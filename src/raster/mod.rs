//! Raster engraving: image decode, dithering and scan-line compilation
//!
//! The pipeline for one image item:
//! 1. Decode the payload to RGBA
//! 2. Build a grayscale intensity field (brightness/contrast, alpha, invert)
//! 3. Dither it into a burn field
//! 4. Scan the burn field line by line, merging equal-power pixels into runs

pub mod dither;
pub mod scan;
pub mod source;

pub use dither::dither;
pub use scan::{POWER_QUANT, Run, compile_raster, merge_runs, quantize_power};
pub use source::{decode_rgba, intensity_field};
