//! Cubic Bezier evaluation and arc-length parameterization

use crate::scene::Point;

/// Subintervals in the cumulative length table of one curve
const TABLE_STEPS: usize = 32;

/// 5-point Gauss-Legendre abscissae and weights on [-1, 1]
const GAUSS_NODES: [(f64, f64); 5] = [
    (0.0, 0.568_888_888_888_888_9),
    (-0.538_469_310_105_683_1, 0.478_628_670_499_366_5),
    (0.538_469_310_105_683_1, 0.478_628_670_499_366_5),
    (-0.906_179_845_938_664, 0.236_926_885_056_189_1),
    (0.906_179_845_938_664, 0.236_926_885_056_189_1),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    pub p0: Point,
    pub c0: Point,
    pub c1: Point,
    pub p1: Point,
}

impl CubicBezier {
    pub fn new(p0: Point, c0: Point, c1: Point, p1: Point) -> Self {
        Self { p0, c0, c1, p1 }
    }

    /// Evaluate the curve at parameter t
    pub fn point(&self, t: f64) -> Point {
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;
        let t2 = t * t;
        let t3 = t2 * t;

        Point::new(
            mt3 * self.p0.x + 3.0 * mt2 * t * self.c0.x + 3.0 * mt * t2 * self.c1.x + t3 * self.p1.x,
            mt3 * self.p0.y + 3.0 * mt2 * t * self.c0.y + 3.0 * mt * t2 * self.c1.y + t3 * self.p1.y,
        )
    }

    /// Magnitude of the first derivative at t
    pub fn speed(&self, t: f64) -> f64 {
        let mt = 1.0 - t;
        let a = 3.0 * mt * mt;
        let b = 6.0 * mt * t;
        let c = 3.0 * t * t;
        let dx = a * (self.c0.x - self.p0.x) + b * (self.c1.x - self.c0.x) + c * (self.p1.x - self.c1.x);
        let dy = a * (self.c0.y - self.p0.y) + b * (self.c1.y - self.c0.y) + c * (self.p1.y - self.c1.y);
        dx.hypot(dy)
    }

    /// Arc length between parameters t0 and t1
    pub fn length_between(&self, t0: f64, t1: f64) -> f64 {
        let half = (t1 - t0) / 2.0;
        let mid = (t1 + t0) / 2.0;
        GAUSS_NODES
            .iter()
            .map(|(x, w)| w * self.speed(mid + half * x))
            .sum::<f64>()
            * half
    }
}

/// Curve with a precomputed cumulative arc-length table
#[derive(Debug, Clone)]
pub struct MeasuredBezier {
    curve: CubicBezier,
    /// lengths[i] = arc length from t=0 to t=i/TABLE_STEPS
    lengths: Vec<f64>,
}

impl MeasuredBezier {
    pub fn new(curve: CubicBezier) -> Self {
        let mut lengths = Vec::with_capacity(TABLE_STEPS + 1);
        lengths.push(0.0);
        let mut total = 0.0;
        for i in 0..TABLE_STEPS {
            let t0 = i as f64 / TABLE_STEPS as f64;
            let t1 = (i + 1) as f64 / TABLE_STEPS as f64;
            total += curve.length_between(t0, t1);
            lengths.push(total);
        }
        Self { curve, lengths }
    }

    pub fn length(&self) -> f64 {
        self.lengths[TABLE_STEPS]
    }

    /// Point at arc length `s` from the curve start
    pub fn point_at(&self, s: f64) -> Point {
        self.curve.point(self.t_at_length(s))
    }

    /// Invert arc length to curve parameter: Newton steps inside the table
    /// bracket, falling back to bisection when a step leaves it.
    pub fn t_at_length(&self, s: f64) -> f64 {
        if s <= 0.0 {
            return 0.0;
        }
        if s >= self.length() {
            return 1.0;
        }

        let k = self
            .lengths
            .partition_point(|&l| l <= s)
            .saturating_sub(1)
            .min(TABLE_STEPS - 1);
        let base = self.lengths[k];
        let span = self.lengths[k + 1] - base;
        let mut lo = k as f64 / TABLE_STEPS as f64;
        let mut hi = (k + 1) as f64 / TABLE_STEPS as f64;
        let mut t = if span > 0.0 {
            lo + (s - base) / span * (hi - lo)
        } else {
            lo
        };
        let t_base = lo;

        for _ in 0..16 {
            let err = base + self.curve.length_between(t_base, t) - s;
            if err.abs() < 1e-9 {
                break;
            }
            if err > 0.0 {
                hi = t;
            } else {
                lo = t;
            }
            let d = self.curve.speed(t);
            let next = if d > 1e-12 { t - err / d } else { f64::NAN };
            t = if next > lo && next < hi {
                next
            } else {
                (lo + hi) / 2.0
            };
        }
        t
    }
}
