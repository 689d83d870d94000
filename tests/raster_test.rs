use image::{GrayImage, Luma, Rgba, RgbaImage};
use laser_job::raster::dither::{floyd_steinberg, grayscale, threshold};
use laser_job::raster::{merge_runs, quantize_power};
use laser_job::scene::{ImageData, RasterImage, RasterSettings, ScanDirection, XForm};
use laser_job::{CutMode, Item, Layer, LayerSetting, MachineSettings, Point, Scene, compile_scene};
use proptest::prelude::*;

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Raster item of `img`, one pixel per mm, centred on (cx, cy)
fn raster_item(img: &RgbaImage, cx: f64, cy: f64, settings: RasterSettings) -> RasterImage {
    RasterImage {
        name: "test".to_string(),
        data: ImageData::Rgba {
            width: img.width(),
            height: img.height(),
            pixels: img.as_raw().clone(),
        },
        w: f64::from(img.width()),
        h: f64::from(img.height()),
        xform: XForm::translate(cx, cy),
        settings,
    }
}

fn one_mm_lines() -> RasterSettings {
    RasterSettings {
        dpi: 25.4,
        overscan: 0.0,
        ..RasterSettings::default()
    }
}

fn engrave(items: Vec<Item>) -> Scene {
    let settings = LayerSetting {
        power: 100.0,
        ..LayerSetting::default()
    };
    Scene::new(vec![Layer::new("Engrave", settings, items)])
}

#[test]
fn test_floyd_steinberg_extremes() {
    let white = GrayImage::from_pixel(8, 5, Luma([255]));
    assert!(floyd_steinberg(&white).pixels().all(|p| p.0[0] == 0));

    let black = GrayImage::from_pixel(8, 5, Luma([0]));
    assert!(floyd_steinberg(&black).pixels().all(|p| p.0[0] == 255));
}

#[test]
fn test_bidirectional_rows_start_on_opposite_sides() {
    let img = RgbaImage::from_pixel(4, 2, BLACK);
    let item = raster_item(&img, 10.0, 10.0, one_mm_lines());
    let seq = compile_scene(
        &engrave(vec![Item::Raster(item)]),
        &MachineSettings::default(),
    );

    let cuts: Vec<_> = seq.commands().iter().filter(|c| c.is_cut()).collect();
    assert_eq!(cuts.len(), 2);
    assert!(cuts.iter().all(|c| c.mode == CutMode::Image && c.power == 100.0));
    assert_eq!(cuts[0].from, Point::new(8.0, 9.5));
    assert_eq!(cuts[0].to, Point::new(12.0, 9.5));
    assert_eq!(cuts[1].from, Point::new(12.0, 10.5));
    assert_eq!(cuts[1].to, Point::new(8.0, 10.5));
}

#[test]
fn test_unidirectional_rows_share_a_side() {
    let img = RgbaImage::from_pixel(4, 2, BLACK);
    let settings = RasterSettings {
        bidirectional: false,
        ..one_mm_lines()
    };
    let seq = compile_scene(
        &engrave(vec![Item::Raster(raster_item(&img, 10.0, 10.0, settings))]),
        &MachineSettings::default(),
    );
    let cuts: Vec<_> = seq.commands().iter().filter(|c| c.is_cut()).collect();
    assert_eq!(cuts[0].from.x, 8.0);
    assert_eq!(cuts[1].from.x, 8.0);
}

#[test]
fn test_vertical_scan_walks_columns() {
    let img = RgbaImage::from_pixel(2, 4, BLACK);
    let settings = RasterSettings {
        scan_direction: ScanDirection::Vertical,
        ..one_mm_lines()
    };
    let seq = compile_scene(
        &engrave(vec![Item::Raster(raster_item(&img, 10.0, 10.0, settings))]),
        &MachineSettings::default(),
    );
    let cuts: Vec<_> = seq.commands().iter().filter(|c| c.is_cut()).collect();
    assert_eq!(cuts.len(), 2);
    assert_eq!(cuts[0].from, Point::new(9.5, 8.0));
    assert_eq!(cuts[0].to, Point::new(9.5, 12.0));
    assert_eq!(cuts[1].from, Point::new(10.5, 12.0));
    assert_eq!(cuts[1].to, Point::new(10.5, 8.0));
}

#[test]
fn test_overscan_adds_zero_power_lead_in_and_out() {
    let img = RgbaImage::from_pixel(4, 1, BLACK);
    let settings = RasterSettings {
        overscan: 2.0,
        ..one_mm_lines()
    };
    let seq = compile_scene(
        &engrave(vec![Item::Raster(raster_item(&img, 10.0, 10.0, settings))]),
        &MachineSettings::default(),
    );
    let cuts: Vec<_> = seq.commands().iter().filter(|c| c.is_cut()).collect();
    let powers: Vec<f64> = cuts.iter().map(|c| c.power).collect();
    assert_eq!(powers, vec![0.0, 100.0, 0.0]);
    assert_eq!(cuts[0].from, Point::new(6.0, 10.0));
    assert_eq!(cuts[2].to, Point::new(14.0, 10.0));
}

#[test]
fn test_transparent_pixels_never_burn() {
    let mut img = RgbaImage::from_pixel(4, 1, BLACK);
    img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
    img.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
    let seq = compile_scene(
        &engrave(vec![Item::Raster(raster_item(&img, 10.0, 10.0, one_mm_lines()))]),
        &MachineSettings::default(),
    );
    let cuts: Vec<_> = seq.commands().iter().filter(|c| c.is_cut()).collect();
    assert_eq!(cuts.len(), 2);
    assert_eq!(cuts[0].power, 0.0);
    assert_eq!(cuts[0].to, Point::new(10.5, 10.0));
    assert_eq!(cuts[1].power, 100.0);
}

#[test]
fn test_undecodable_image_is_skipped() {
    let broken = RasterImage {
        data: ImageData::Base64("data:image/png;base64,bm90IGFuIGltYWdl".to_string()),
        ..raster_item(&RgbaImage::from_pixel(1, 1, WHITE), 0.0, 0.0, one_mm_lines())
    };
    let line = laser_job::scene::Path::polyline(&[Point::new(1.0, 1.0), Point::new(3.0, 1.0)], false);
    let seq = compile_scene(
        &engrave(vec![Item::Raster(broken), Item::Path(line)]),
        &MachineSettings::default(),
    );

    assert!(seq.commands().iter().all(|c| c.mode == CutMode::Vector));
    assert_eq!(seq.commands()[0].to, Point::new(1.0, 1.0));
    assert_eq!(seq.commands().last().map(|c| c.to), Some(Point::ORIGIN));
}

proptest! {
    #[test]
    fn prop_threshold_idempotent(
        pixels in prop::collection::vec(any::<u8>(), 1..64),
        level in any::<u8>(),
    ) {
        let w = pixels.len() as u32;
        let gray = GrayImage::from_raw(w, 1, pixels).unwrap();
        let once = threshold(&gray, level);
        // Render the burn field back to intensity and threshold again
        let twice = threshold(&grayscale(&once), level);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_runs_reconstruct_burn_profile(
        samples in prop::collection::vec(any::<u8>(), 1..80),
        layer_power in 1.0f64..100.0,
        width in 1.0f64..50.0,
    ) {
        let n = samples.len();
        let runs = merge_runs(&samples, layer_power, 0.0, width, false);
        prop_assert!(runs.len() <= n);
        prop_assert_eq!(runs[0].start, 0.0);
        prop_assert_eq!(runs[runs.len() - 1].end, width);

        for (i, &burn) in samples.iter().enumerate() {
            let centre = 0.0 + (i as f64 + 0.5) / n as f64 * (width - 0.0);
            let run = runs
                .iter()
                .find(|r| r.start <= centre && centre < r.end)
                .unwrap();
            let exact = f64::from(burn) / 255.0 * layer_power;
            prop_assert!((run.power - exact).abs() <= 4.0);
            prop_assert_eq!(run.power, quantize_power(burn, layer_power));
        }
    }
}
