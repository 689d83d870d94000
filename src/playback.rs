//! Time-based playback over a compiled sequence

use crate::command::{Command, CommandSequence};
use crate::scene::Point;

/// Where the head is at some elapsed time
#[derive(Debug, Clone, PartialEq)]
pub struct Playhead<'a> {
    /// Index of the command in progress
    pub index: usize,
    pub command: &'a Command,
    /// Interpolated head position
    pub position: Point,
    /// Fraction of the current command completed, 0..=1
    pub fraction: f64,
}

impl Playhead<'_> {
    /// True while the head is partway through a cut
    pub fn burning(&self) -> bool {
        self.command.is_cut() && self.fraction > 0.0 && self.fraction < 1.0
    }
}

/// Locate the head at `time` seconds. Times outside the job are clamped;
/// an empty sequence has no playhead.
pub fn state_at(seq: &CommandSequence, time: f64) -> Option<Playhead<'_>> {
    let cum = seq.cum_time();
    if cum.is_empty() {
        return None;
    }
    let time = time.clamp(0.0, seq.total_time());
    let index = cum.partition_point(|&t| t < time).min(cum.len() - 1);
    let command = &seq.commands()[index];

    let start = if index > 0 { cum[index - 1] } else { 0.0 };
    let span = cum[index] - start;
    let fraction = if span > 0.0 {
        ((time - start) / span).min(1.0)
    } else {
        1.0
    };

    Some(Playhead {
        index,
        command,
        position: command.from.lerp(&command.to, fraction),
        fraction,
    })
}

/// Format seconds as `mm:ss`, truncating fractions
pub fn format_duration(secs: f64) -> String {
    let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    let whole = secs.floor() as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}
