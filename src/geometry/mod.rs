//! Fixed-step arc-length sampling of paths
//!
//! The laser follows polylines, so every curve is resampled at a constant
//! arc-length step before it becomes cut commands. Bezier segments are
//! measured along their true arc length, not by chord approximation.

mod bezier;

pub use bezier::{CubicBezier, MeasuredBezier};

use crate::scene::{Path, Point, Segment};

/// Sampling step along a path, mm
pub const SAMPLE_STEP: f64 = 0.5;

/// Moves shorter than this on both axes are dropped, mm
pub const MIN_MOVE: f64 = 0.01;

#[derive(Debug, Clone)]
enum Piece {
    Line(Point, Point),
    Curve(MeasuredBezier),
}

impl Piece {
    fn length(&self) -> f64 {
        match self {
            Piece::Line(a, b) => a.distance(b),
            Piece::Curve(c) => c.length(),
        }
    }

    fn point_at(&self, s: f64) -> Point {
        match self {
            Piece::Line(a, b) => {
                let len = a.distance(b);
                if len > 0.0 {
                    a.lerp(b, (s / len).clamp(0.0, 1.0))
                } else {
                    *a
                }
            }
            Piece::Curve(c) => c.point_at(s),
        }
    }
}

/// Arc-length view of a path, including the implicit closing edge
#[derive(Debug, Clone)]
pub struct PathMeasure {
    pieces: Vec<Piece>,
    /// Cumulative length at the end of each piece
    ends: Vec<f64>,
}

impl PathMeasure {
    pub fn new(path: &Path) -> Self {
        let mut pieces = Vec::with_capacity(path.segments.len() + 1);
        let mut at = path.start;
        for seg in &path.segments {
            match *seg {
                Segment::Line { to } => pieces.push(Piece::Line(at, to)),
                Segment::Bezier { c0, c1, to } => pieces.push(Piece::Curve(MeasuredBezier::new(
                    CubicBezier::new(at, c0, c1, to),
                ))),
            }
            at = seg.end();
        }
        if path.closed && !path.segments.is_empty() && at != path.start {
            pieces.push(Piece::Line(at, path.start));
        }

        let mut total = 0.0;
        let ends = pieces
            .iter()
            .map(|p| {
                total += p.length();
                total
            })
            .collect();

        Self { pieces, ends }
    }

    pub fn length(&self) -> f64 {
        self.ends.last().copied().unwrap_or(0.0)
    }

    /// Point at arc-length `offset` from the start, clamped to the path
    pub fn point_at(&self, offset: f64) -> Option<Point> {
        let offset = offset.clamp(0.0, self.length());
        let idx = self
            .ends
            .partition_point(|&e| e < offset)
            .min(self.pieces.len().checked_sub(1)?);
        let before = if idx == 0 { 0.0 } else { self.ends[idx - 1] };
        Some(self.pieces[idx].point_at(offset - before))
    }
}

/// Sample a path at `step` mm of arc length.
///
/// Returns the start point, points at `step, 2*step, ...` strictly before
/// the end, and the exact end (the start again when closed). Paths shorter
/// than [`MIN_MOVE`] or with fewer than two vertices give an empty result.
pub fn sample_path(path: &Path, step: f64) -> Vec<Point> {
    if path.vertex_count() < 2 || !(step > 0.0) {
        return Vec::new();
    }

    let measure = PathMeasure::new(path);
    let len = measure.length();
    if len < MIN_MOVE {
        return Vec::new();
    }

    let Some(start) = measure.point_at(0.0) else {
        return Vec::new();
    };
    let mut points = vec![start];
    let mut prev = start;

    let mut k = 1u32;
    loop {
        let offset = f64::from(k) * step;
        if offset >= len {
            break;
        }
        if let Some(pt) = measure.point_at(offset)
            && !pt.near(&prev, MIN_MOVE)
        {
            points.push(pt);
            prev = pt;
        }
        k += 1;
    }

    let end = if path.closed {
        Some(start)
    } else {
        measure.point_at(len)
    };
    if let Some(end) = end
        && !end.near(&prev, MIN_MOVE)
    {
        points.push(end);
    }

    points
}
