//! Command sequence to GRBL-style motion code
//!
//! The writer remembers the last feed rate, power, air-assist and laser
//! engage mode it emitted and only writes a line when one of them changes.

use crate::command::{Command, CommandSequence, CutMode, MoveKind};
use crate::config::MachineSettings;

/// Laser engage codes. Dynamic mode scales power with head velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engage {
    /// M3
    Constant,
    /// M4, used for raster engraving
    Dynamic,
}

impl Engage {
    pub fn code(self) -> &'static str {
        match self {
            Engage::Constant => "M3",
            Engage::Dynamic => "M4",
        }
    }

    fn for_mode(mode: CutMode) -> Self {
        match mode {
            CutMode::Image => Engage::Dynamic,
            CutMode::Vector => Engage::Constant,
        }
    }
}

/// Format a coordinate with 3 decimals, treating -0 as 0
fn coord(v: f64) -> String {
    let v = (v * 1000.0).round() / 1000.0;
    let v = if v == 0.0 { 0.0 } else { v };
    format!("{:.3}", v)
}

/// mm/s to the integer mm/min the controller expects
pub fn feed_rate(speed: f64) -> i64 {
    (speed * 60.0).round() as i64
}

struct Writer<'m> {
    machine: &'m MachineSettings,
    lines: Vec<String>,
    feed: Option<i64>,
    /// None forces the next cut to re-emit power
    power: Option<i64>,
    air: bool,
    engage: Option<Engage>,
}

impl<'m> Writer<'m> {
    fn new(machine: &'m MachineSettings) -> Self {
        Self {
            machine,
            lines: Vec::new(),
            feed: None,
            power: None,
            air: false,
            engage: None,
        }
    }

    fn preamble(&mut self) {
        self.lines.push("; laser-job G-code".to_string());
        self.lines.push(format!("; Machine: {}", self.machine.name));
        self.lines.push("G90 G21".to_string());
        self.lines.push("M5 S0".to_string());
        self.power = Some(0);
    }

    fn motion(&mut self, code: &str, cmd: &Command) {
        let mut line = format!("{} X{} Y{}", code, coord(cmd.to.x), coord(cmd.to.y));
        let feed = feed_rate(cmd.speed);
        if self.feed != Some(feed) {
            line.push_str(&format!(" F{}", feed));
            self.feed = Some(feed);
        }
        self.lines.push(line);
    }

    fn rapid(&mut self, cmd: &Command) {
        if self.power != Some(0) {
            self.lines.push("M5 S0".to_string());
            self.power = Some(0);
        }
        self.motion("G0", cmd);
    }

    fn cut(&mut self, cmd: &Command) {
        if cmd.air_assist != self.air {
            self.lines
                .push(if cmd.air_assist { "M8" } else { "M9" }.to_string());
            self.air = cmd.air_assist;
        }

        let engage = Engage::for_mode(cmd.mode);
        if self.engage != Some(engage) {
            self.engage = Some(engage);
            self.power = None;
        }

        let power = self.machine.device_power(cmd.power);
        if self.power != Some(power) {
            self.lines.push(format!("{} S{}", engage.code(), power));
            self.power = Some(power);
        }

        self.motion("G1", cmd);
    }

    fn postamble(&mut self) {
        self.lines.push("M5 S0".to_string());
        if self.air {
            self.lines.push("M9".to_string());
        }
        self.lines.push("G0 X0 Y0".to_string());
        self.lines.push("; End of job".to_string());
    }

    fn finish(self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// Translate a command sequence into dialect text. An empty sequence gives
/// an empty string.
pub fn generate(seq: &CommandSequence, machine: &MachineSettings) -> String {
    if seq.is_empty() {
        return String::new();
    }

    let mut writer = Writer::new(machine);
    writer.preamble();
    for cmd in seq.commands() {
        match cmd.kind {
            MoveKind::Rapid => writer.rapid(cmd),
            MoveKind::Cut => writer.cut(cmd),
        }
    }
    writer.postamble();
    writer.finish()
}

/// Relative jog by (dx, dy) mm at `feed` mm/min
pub fn jog(dx: f64, dy: f64, feed: i64) -> String {
    format!("$J=G91 X{} Y{} F{}", coord(dx), coord(dy), feed)
}

/// Absolute rapid to (x, y) at `feed` mm/min
pub fn goto(x: f64, y: f64, feed: i64) -> String {
    format!("G90 G0 X{} Y{} F{}", coord(x), coord(y), feed)
}

/// Run the homing cycle
pub fn home() -> String {
    "$H".to_string()
}

/// Make the current head position the work origin
pub fn set_origin() -> String {
    "G92 X0 Y0".to_string()
}

/// Low-power beam for positioning by eye, 0.5% of full power
pub fn pointer(on: bool, machine: &MachineSettings) -> String {
    if on {
        format!("M3 S{}", (machine.max_power * 0.005).round() as i64)
    } else {
        "M5 S0".to_string()
    }
}
