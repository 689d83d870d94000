use serde::{Deserialize, Serialize};

/// Point in design space, millimeters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    /// True when both axes are within `tolerance` of `other`
    pub fn near(&self, other: &Point, tolerance: f64) -> bool {
        (other.x - self.x).abs() <= tolerance && (other.y - self.y).abs() <= tolerance
    }
}

/// 2D affine transformation matrix [a, b, c, d, e, f]
/// Represents: | a  c  e |
///             | b  d  f |
///             | 0  0  1 |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 6]", into = "[f64; 6]")]
pub struct XForm {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl XForm {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            e: x,
            f: y,
            ..Self::identity()
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::identity()
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Compose two transforms: self * other (other is applied first)
    pub fn compose(&self, other: &XForm) -> XForm {
        XForm {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }
}

impl Default for XForm {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<[f64; 6]> for XForm {
    fn from([a, b, c, d, e, f]: [f64; 6]) -> Self {
        Self { a, b, c, d, e, f }
    }
}

impl From<XForm> for [f64; 6] {
    fn from(x: XForm) -> Self {
        [x.a, x.b, x.c, x.d, x.e, x.f]
    }
}

/// One piece of a path, continuing from the previous end point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Segment {
    Line { to: Point },
    /// Cubic Bezier: `c0` leaves the previous point, `c1` arrives at `to`
    Bezier { c0: Point, c1: Point, to: Point },
}

impl Segment {
    pub fn end(&self) -> Point {
        match self {
            Segment::Line { to } | Segment::Bezier { to, .. } => *to,
        }
    }

    fn transformed(&self, xform: &XForm) -> Segment {
        match *self {
            Segment::Line { to } => Segment::Line {
                to: xform.apply(to),
            },
            Segment::Bezier { c0, c1, to } => Segment::Bezier {
                c0: xform.apply(c0),
                c1: xform.apply(c1),
                to: xform.apply(to),
            },
        }
    }
}

/// Open or closed curve made of line and cubic Bezier segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub start: Point,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub closed: bool,
    #[serde(default, skip_serializing_if = "XForm::is_identity")]
    pub xform: XForm,
}

impl Path {
    /// Polyline through `points`; fewer than one point gives an empty path at the origin
    pub fn polyline(points: &[Point], closed: bool) -> Self {
        let start = points.first().copied().unwrap_or_default();
        let segments = points
            .iter()
            .skip(1)
            .map(|&to| Segment::Line { to })
            .collect();
        Self {
            start,
            segments,
            closed,
            xform: XForm::identity(),
        }
    }

    /// Axis-aligned closed rectangle starting at its top-left corner
    pub fn rect(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::polyline(
            &[
                Point::new(x, y),
                Point::new(x + w, y),
                Point::new(x + w, y + h),
                Point::new(x, y + h),
            ],
            true,
        )
    }

    pub fn vertex_count(&self) -> usize {
        self.segments.len() + 1
    }

    /// Bake `parent * self.xform` into the geometry. Affine maps keep Bezier
    /// control points exact, so arc length is measured in design space.
    pub fn baked(&self, parent: &XForm) -> Path {
        let xform = parent.compose(&self.xform);
        Path {
            start: xform.apply(self.start),
            segments: self.segments.iter().map(|s| s.transformed(&xform)).collect(),
            closed: self.closed,
            xform: XForm::identity(),
        }
    }
}

/// Ordered sub-paths that share one transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundPath {
    pub paths: Vec<Path>,
    #[serde(default, skip_serializing_if = "XForm::is_identity")]
    pub xform: XForm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub children: Vec<Item>,
    #[serde(default, skip_serializing_if = "XForm::is_identity")]
    pub xform: XForm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DitherMode {
    #[default]
    Threshold,
    Ordered,
    FloydSteinberg,
    Grayscale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanDirection {
    #[default]
    Horizontal,
    Vertical,
}

/// Per-image engraving settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterSettings {
    pub dpi: f64,
    pub dithering: DitherMode,
    pub threshold: u8,
    /// -100..=100
    pub brightness: f64,
    /// -100..=100
    pub contrast: f64,
    pub invert: bool,
    pub scan_direction: ScanDirection,
    pub bidirectional: bool,
    /// mm of travel added before and after each scan line
    pub overscan: f64,
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            dpi: 254.0,
            dithering: DitherMode::Threshold,
            threshold: 128,
            brightness: 0.0,
            contrast: 0.0,
            invert: false,
            scan_direction: ScanDirection::Horizontal,
            bidirectional: true,
            overscan: 2.5,
        }
    }
}

/// Pixel payload of a raster item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageData {
    /// Base64 encoded PNG/JPEG, optionally as a `data:` URL
    Base64(String),
    /// Already decoded RGBA pixels, row-major
    #[serde(skip)]
    Rgba {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
}

/// Bitmap placed on a `w` x `h` box centered on its transform origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterImage {
    #[serde(default)]
    pub name: String,
    pub data: ImageData,
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub xform: XForm,
    #[serde(default)]
    pub settings: RasterSettings,
}

/// All scene item kinds the compiler understands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Item {
    Path(Path),
    Compound(CompoundPath),
    Group(Group),
    Raster(RasterImage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerMode {
    #[default]
    Cut,
    Engrave,
    Score,
}

/// Laser settings for one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSetting {
    pub mode: LayerMode,
    /// Percent, 0..=100
    pub power: f64,
    /// mm/s
    pub speed: f64,
    pub passes: u32,
    pub air_assist: bool,
    pub output: bool,
    pub visible: bool,
}

impl Default for LayerSetting {
    fn default() -> Self {
        Self {
            mode: LayerMode::Cut,
            power: 80.0,
            speed: 10.0,
            passes: 1,
            air_assist: true,
            output: true,
            visible: true,
        }
    }
}

impl LayerSetting {
    /// Only visible layers with output enabled produce commands
    pub fn is_emitting(&self) -> bool {
        self.output && self.visible
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub settings: LayerSetting,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Layer {
    pub fn new(name: &str, settings: LayerSetting, items: Vec<Item>) -> Self {
        Self {
            name: name.to_string(),
            color: String::new(),
            settings,
            items,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub width: f64,
    pub height: f64,
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            width: 300.0,
            height: 200.0,
        }
    }
}

/// Immutable snapshot of the editor's layer table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub workspace: Workspace,
}
