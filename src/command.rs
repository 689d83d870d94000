//! Canonical motion commands produced by the compiler

use serde::Serialize;

use crate::geometry::MIN_MOVE;
use crate::scene::{Bounds, LayerSetting, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveKind {
    /// Non-burning travel at maximum speed
    Rapid,
    /// Travel with the laser engaged
    Cut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CutMode {
    Vector,
    Image,
}

/// One straight move of the laser head
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub kind: MoveKind,
    pub from: Point,
    pub to: Point,
    /// mm/s
    pub speed: f64,
    /// Percent, always 0 for rapids
    pub power: f64,
    pub layer: String,
    pub mode: CutMode,
    pub pass: u32,
    pub total_passes: u32,
    pub air_assist: bool,
}

impl Command {
    pub fn is_cut(&self) -> bool {
        self.kind == MoveKind::Cut
    }

    pub fn length(&self) -> f64 {
        self.from.distance(&self.to)
    }

    /// Seconds needed for this move; a zero speed counts as 1 mm/s
    pub fn duration(&self) -> f64 {
        let speed = if self.speed > 0.0 { self.speed } else { 1.0 };
        self.length() / speed
    }
}

/// Commands plus the cumulative elapsed time after each one
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandSequence {
    commands: Vec<Command>,
    cum_time: Vec<f64>,
}

impl CommandSequence {
    pub fn new(commands: Vec<Command>) -> Self {
        let mut t = 0.0;
        let cum_time = commands
            .iter()
            .map(|cmd| {
                t += cmd.duration();
                t
            })
            .collect();
        Self { commands, cum_time }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn cum_time(&self) -> &[f64] {
        &self.cum_time
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Total job time in seconds
    pub fn total_time(&self) -> f64 {
        self.cum_time.last().copied().unwrap_or(0.0)
    }

    /// Total burning distance in mm
    pub fn cut_length(&self) -> f64 {
        self.commands
            .iter()
            .filter(|c| c.is_cut())
            .map(Command::length)
            .sum()
    }

    /// Bounds of every point the head visits
    pub fn extents(&self) -> Option<Bounds> {
        let points: Vec<Point> = self
            .commands
            .iter()
            .flat_map(|c| [c.from, c.to])
            .collect();
        Bounds::from_points(&points)
    }
}

/// Everything a single layer pass stamps onto its commands
#[derive(Debug, Clone)]
pub struct PassContext<'a> {
    pub layer: &'a str,
    pub settings: &'a LayerSetting,
    pub pass: u32,
    pub total_passes: u32,
    /// mm/s
    pub rapid_speed: f64,
}

impl PassContext<'_> {
    /// Travel to `to` unless already there. Returns the new position.
    pub fn rapid(&self, out: &mut Vec<Command>, pos: Point, to: Point) -> Point {
        if pos.near(&to, MIN_MOVE) {
            return pos;
        }
        out.push(Command {
            kind: MoveKind::Rapid,
            from: pos,
            to,
            speed: self.rapid_speed,
            power: 0.0,
            layer: self.layer.to_string(),
            mode: CutMode::Vector,
            pass: self.pass,
            total_passes: self.total_passes,
            air_assist: self.settings.air_assist,
        });
        to
    }

    /// Burn from `pos` to `to` at the layer speed. Returns the new position.
    pub fn cut(
        &self,
        out: &mut Vec<Command>,
        pos: Point,
        to: Point,
        power: f64,
        mode: CutMode,
    ) -> Point {
        out.push(Command {
            kind: MoveKind::Cut,
            from: pos,
            to,
            speed: self.settings.speed,
            power,
            layer: self.layer.to_string(),
            mode,
            pass: self.pass,
            total_passes: self.total_passes,
            air_assist: self.settings.air_assist,
        });
        to
    }
}

/// Closing travel back to the machine origin
pub(crate) fn return_home(from: Point, rapid_speed: f64) -> Command {
    Command {
        kind: MoveKind::Rapid,
        from,
        to: Point::ORIGIN,
        speed: rapid_speed,
        power: 0.0,
        layer: String::new(),
        mode: CutMode::Vector,
        pass: 0,
        total_passes: 0,
        air_assist: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rapid(from: Point, to: Point, speed: f64) -> Command {
        let mut c = return_home(from, speed);
        c.to = to;
        c
    }

    #[test]
    fn test_cumulative_time() {
        let seq = CommandSequence::new(vec![
            rapid(Point::ORIGIN, Point::new(3.0, 4.0), 5.0),
            rapid(Point::new(3.0, 4.0), Point::new(3.0, 14.0), 2.0),
        ]);
        assert_eq!(seq.cum_time(), &[1.0, 6.0]);
        assert_eq!(seq.total_time(), 6.0);
    }

    #[test]
    fn test_zero_speed_counts_as_one() {
        let seq = CommandSequence::new(vec![rapid(Point::ORIGIN, Point::new(2.0, 0.0), 0.0)]);
        assert_eq!(seq.total_time(), 2.0);
    }

    #[test]
    fn test_empty_sequence() {
        let seq = CommandSequence::default();
        assert!(seq.is_empty());
        assert_eq!(seq.total_time(), 0.0);
        assert!(seq.extents().is_none());
    }

    #[test]
    fn test_rapid_skips_when_already_there() {
        let settings = LayerSetting::default();
        let ctx = PassContext {
            layer: "L",
            settings: &settings,
            pass: 1,
            total_passes: 1,
            rapid_speed: 100.0,
        };
        let mut out = Vec::new();
        let pos = ctx.rapid(&mut out, Point::new(1.0, 1.0), Point::new(1.005, 1.0));
        assert!(out.is_empty());
        assert_eq!(pos, Point::new(1.0, 1.0));
    }
}
