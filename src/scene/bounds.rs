use super::types::{Point, XForm};

/// Axis-aligned bounding box in design space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest box holding every point, or None for an empty slice
    pub fn from_points(points: &[Point]) -> Option<Bounds> {
        let first = points.first()?;
        let mut bounds = Bounds::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            bounds.expand(&Bounds::new(p.x, p.y, p.x, p.y));
        }
        Some(bounds)
    }

    /// Bounds of a `w` x `h` box centered on the origin, placed by `xform`
    pub fn of_placed_box(xform: &XForm, w: f64, h: f64) -> Bounds {
        let (hw, hh) = (w / 2.0, h / 2.0);
        let corners = [
            xform.apply(Point::new(-hw, -hh)),
            xform.apply(Point::new(hw, -hh)),
            xform.apply(Point::new(hw, hh)),
            xform.apply(Point::new(-hw, hh)),
        ];
        let mut bounds = Bounds::new(corners[0].x, corners[0].y, corners[0].x, corners[0].y);
        for c in &corners[1..] {
            bounds.expand(&Bounds::new(c.x, c.y, c.x, c.y));
        }
        bounds
    }

    pub fn expand(&mut self, other: &Bounds) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}
