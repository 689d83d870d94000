//! Scan-line compilation of raster items
//!
//! Every scan line is rapid-traversed to its overscan start, then crossed
//! with a zero-power lead-in, run-length merged burn runs, and a zero-power
//! lead-out so the head is at steady speed while it burns.

use image::GrayImage;
use tracing::{debug, warn};

use super::dither::dither;
use super::source::{decode_rgba, intensity_field};
use crate::command::{Command, CutMode, PassContext};
use crate::scene::{Bounds, Point, RasterImage, ScanDirection, XForm};

/// Power quantization step for run merging, percent
pub const POWER_QUANT: f64 = 4.0;

/// One constant-power stretch of a scan line, in scan-axis coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Run {
    pub start: f64,
    pub end: f64,
    pub power: f64,
}

/// Scale a burn value to layer power and snap it to [`POWER_QUANT`]
pub fn quantize_power(burn: u8, layer_power: f64) -> f64 {
    let raw = f64::from(burn) / 255.0 * layer_power;
    (raw / POWER_QUANT).round() * POWER_QUANT
}

/// Merge burn samples spread evenly over `lo..hi` into constant-power runs.
///
/// Samples are given in image order; with `reverse` they are walked from the
/// `hi` end. Run boundaries sit at pixel centres and the outer runs extend to
/// the image edges.
pub fn merge_runs(samples: &[u8], layer_power: f64, lo: f64, hi: f64, reverse: bool) -> Vec<Run> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }
    let centre = |i: usize| lo + (i as f64 + 0.5) / n as f64 * (hi - lo);

    let mut runs = Vec::new();
    let mut run_start = if reverse { hi } else { lo };
    let mut run_power: Option<f64> = None;

    for k in 0..n {
        let i = if reverse { n - 1 - k } else { k };
        let power = quantize_power(samples[i], layer_power);
        if let Some(prev) = run_power
            && prev != power
        {
            let at = centre(i);
            runs.push(Run {
                start: run_start,
                end: at,
                power: prev,
            });
            run_start = at;
        }
        run_power = Some(power);
    }

    if let Some(power) = run_power {
        runs.push(Run {
            start: run_start,
            end: if reverse { lo } else { hi },
            power,
        });
    }
    runs
}

/// Geometry of one scan line
struct ScanLine<'s> {
    samples: &'s [u8],
    /// Image extent along the scan axis
    lo: f64,
    hi: f64,
    reverse: bool,
}

/// Emit one scan line; `at` maps a scan-axis coordinate to a design point
fn emit_line(
    ctx: &PassContext<'_>,
    out: &mut Vec<Command>,
    pos: Point,
    line: &ScanLine<'_>,
    overscan: f64,
    at: impl Fn(f64) -> Point,
) -> Point {
    let (edge_in, edge_out, entry, exit) = if line.reverse {
        (line.hi, line.lo, line.hi + overscan, line.lo - overscan)
    } else {
        (line.lo, line.hi, line.lo - overscan, line.hi + overscan)
    };

    let mut pos = ctx.rapid(out, pos, at(entry));
    if overscan > 0.0 {
        pos = ctx.cut(out, pos, at(edge_in), 0.0, CutMode::Image);
    }
    for run in merge_runs(line.samples, ctx.settings.power, line.lo, line.hi, line.reverse) {
        pos = ctx.cut(out, pos, at(run.end), run.power, CutMode::Image);
    }
    debug_assert!(pos.near(&at(edge_out), 1e-9));
    if overscan > 0.0 {
        pos = ctx.cut(out, pos, at(exit), 0.0, CutMode::Image);
    }
    pos
}

fn row_samples(burn: &GrayImage, row: u32) -> Vec<u8> {
    (0..burn.width()).map(|x| burn.get_pixel(x, row).0[0]).collect()
}

fn column_samples(burn: &GrayImage, col: u32) -> Vec<u8> {
    (0..burn.height()).map(|y| burn.get_pixel(col, y).0[0]).collect()
}

/// Source row (or column) for scan line `line` of `count`
fn source_index(line: usize, count: usize, size: u32) -> u32 {
    let idx = (line as f64 / count as f64 * f64::from(size)).floor() as u32;
    idx.min(size.saturating_sub(1))
}

/// Compile the already-dithered burn field placed on `bounds`
pub fn compile_burn_field(
    burn: &GrayImage,
    bounds: &Bounds,
    image: &RasterImage,
    ctx: &PassContext<'_>,
    out: &mut Vec<Command>,
    mut pos: Point,
) -> Point {
    if burn.width() == 0 || burn.height() == 0 || !(image.settings.dpi > 0.0) {
        return pos;
    }
    let settings = &image.settings;
    let spacing = 25.4 / settings.dpi;
    let overscan = settings.overscan.max(0.0);

    match settings.scan_direction {
        ScanDirection::Horizontal => {
            let count = ((bounds.height() / spacing).round() as usize).max(1);
            for line in 0..count {
                let y = bounds.min_y + (line as f64 + 0.5) * (bounds.height() / count as f64);
                let samples = row_samples(burn, source_index(line, count, burn.height()));
                let scan = ScanLine {
                    samples: &samples,
                    lo: bounds.min_x,
                    hi: bounds.max_x,
                    reverse: settings.bidirectional && line % 2 == 1,
                };
                pos = emit_line(ctx, out, pos, &scan, overscan, |x| Point::new(x, y));
            }
        }
        ScanDirection::Vertical => {
            let count = ((bounds.width() / spacing).round() as usize).max(1);
            for line in 0..count {
                let x = bounds.min_x + (line as f64 + 0.5) * (bounds.width() / count as f64);
                let samples = column_samples(burn, source_index(line, count, burn.width()));
                let scan = ScanLine {
                    samples: &samples,
                    lo: bounds.min_y,
                    hi: bounds.max_y,
                    reverse: settings.bidirectional && line % 2 == 1,
                };
                pos = emit_line(ctx, out, pos, &scan, overscan, |y| Point::new(x, y));
            }
        }
    }
    pos
}

/// Compile a raster item placed under `parent`. A payload that fails to
/// decode produces no commands and leaves the position unchanged.
pub fn compile_raster(
    image: &RasterImage,
    parent: &XForm,
    ctx: &PassContext<'_>,
    out: &mut Vec<Command>,
    pos: Point,
) -> Point {
    let rgba = match decode_rgba(&image.data) {
        Ok(rgba) => rgba,
        Err(e) => {
            warn!(layer = ctx.layer, image = %image.name, "skipping raster item: {}", e);
            return pos;
        }
    };

    let gray = intensity_field(&rgba, &image.settings);
    let burn = dither(&gray, &image.settings);
    let bounds = Bounds::of_placed_box(&parent.compose(&image.xform), image.w, image.h);

    let before = out.len();
    let pos = compile_burn_field(&burn, &bounds, image, ctx, out, pos);
    debug!(
        layer = ctx.layer,
        image = %image.name,
        pixels = burn.width() * burn.height(),
        commands = out.len() - before,
        "compiled raster"
    );
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_power() {
        assert_eq!(quantize_power(255, 80.0), 80.0);
        assert_eq!(quantize_power(0, 80.0), 0.0);
        // 128/255*80 = 40.16 -> 40
        assert_eq!(quantize_power(128, 80.0), 40.0);
        // 20/255*100 = 7.84 -> 8
        assert_eq!(quantize_power(20, 100.0), 8.0);
    }

    #[test]
    fn test_merge_constant_row_is_one_run() {
        let runs = merge_runs(&[255; 10], 60.0, 0.0, 10.0, false);
        assert_eq!(
            runs,
            vec![Run {
                start: 0.0,
                end: 10.0,
                power: 60.0
            }]
        );
    }

    #[test]
    fn test_merge_splits_at_pixel_centres() {
        let runs = merge_runs(&[0, 0, 255, 255], 100.0, 0.0, 4.0, false);
        assert_eq!(
            runs,
            vec![
                Run {
                    start: 0.0,
                    end: 2.5,
                    power: 0.0
                },
                Run {
                    start: 2.5,
                    end: 4.0,
                    power: 100.0
                },
            ]
        );
    }

    #[test]
    fn test_merge_reverse_walks_from_high_end() {
        let runs = merge_runs(&[0, 0, 255, 255], 100.0, 0.0, 4.0, true);
        assert_eq!(runs[0].start, 4.0);
        assert_eq!(runs[0].power, 100.0);
        assert_eq!(runs[0].end, 1.5);
        assert_eq!(runs[1].end, 0.0);
        assert_eq!(runs[1].power, 0.0);
    }

    #[test]
    fn test_source_index_clamps() {
        assert_eq!(source_index(0, 4, 2), 0);
        assert_eq!(source_index(3, 4, 2), 1);
        assert_eq!(source_index(5, 5, 2), 1);
    }
}
