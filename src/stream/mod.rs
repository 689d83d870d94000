//! Flow-controlled job streaming
//!
//! [`Streamer`] is a pure state machine: each [`JobEvent`] moves it to a new
//! state and yields the [`Effect`]s the caller must carry out on the
//! hardware channel. Nothing here performs I/O, so every transition can be
//! exercised without a controller attached. [`Link`] drives it over an
//! async byte stream.

pub mod link;
pub mod protocol;

pub use link::{JobOutcome, Link, STATUS_INTERVAL, SerialLink, TcpLink, list_serial_ports};
pub use protocol::{InboundEvent, parse_response};

/// Maximum unacknowledged lines in flight
pub const WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Paused,
}

/// Out-of-band control signals, sent outside the line queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Realtime {
    /// Feed hold, `!`
    Hold,
    /// Cycle resume, `~`
    Resume,
    /// Soft reset, Ctrl-X
    Reset,
    /// Status report request, `?`
    StatusQuery,
}

impl Realtime {
    pub fn byte(self) -> u8 {
        match self {
            Realtime::Hold => b'!',
            Realtime::Resume => b'~',
            Realtime::Reset => 0x18,
            Realtime::StatusQuery => b'?',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// Begin streaming generated program text
    Start(String),
    Pause,
    Resume,
    Abort,
    /// The controller acknowledged one line
    Ack,
    /// Send opportunity: fill the window if anything is eligible
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Queue one program line on the channel
    Send(String),
    Realtime(Realtime),
    Progress { done: usize, total: usize },
    Completed,
    Aborted,
}

/// Keep only lines the controller should see: no blanks, no `;` comments
pub fn program_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|l| !l.trim().is_empty() && !l.starts_with(';'))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Streamer {
    state: JobState,
    lines: Vec<String>,
    cursor: usize,
    in_flight: usize,
}

impl Streamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Lines not yet sent
    pub fn pending(&self) -> &[String] {
        &self.lines[self.cursor..]
    }

    pub fn total(&self) -> usize {
        self.lines.len()
    }

    /// Lines sent and acknowledged
    pub fn done(&self) -> usize {
        self.cursor - self.in_flight
    }

    /// The transition function: consume the current state and an event,
    /// return the next state and its effects.
    pub fn step(mut self, event: JobEvent) -> (Streamer, Vec<Effect>) {
        let effects = self.handle(event);
        (self, effects)
    }

    /// In-place form of [`Streamer::step`]
    pub fn handle(&mut self, event: JobEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        match (self.state, event) {
            (JobState::Idle, JobEvent::Start(text)) => {
                self.lines = program_lines(&text);
                self.cursor = 0;
                self.in_flight = 0;
                if self.lines.is_empty() {
                    return effects;
                }
                self.state = JobState::Running;
                self.send_batch(&mut effects);
            }
            (JobState::Paused, JobEvent::Start(_) | JobEvent::Resume) => {
                self.state = JobState::Running;
                effects.push(Effect::Realtime(Realtime::Resume));
                self.send_batch(&mut effects);
            }
            (JobState::Running, JobEvent::Pause) => {
                self.state = JobState::Paused;
                effects.push(Effect::Realtime(Realtime::Hold));
            }
            (JobState::Running | JobState::Paused, JobEvent::Abort) => {
                effects.push(Effect::Realtime(Realtime::Reset));
                self.reset();
                effects.push(Effect::Aborted);
            }
            (JobState::Running | JobState::Paused, JobEvent::Ack) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.send_batch(&mut effects);
            }
            (JobState::Running | JobState::Paused, JobEvent::Poll) => {
                self.send_batch(&mut effects);
            }
            // Late acks, duplicate starts, pause while paused...
            _ => {}
        }
        effects
    }

    /// Fill the window. Safe to call at any time; does nothing unless running
    /// with capacity and lines left.
    fn send_batch(&mut self, effects: &mut Vec<Effect>) {
        if self.state != JobState::Running {
            return;
        }
        while self.in_flight < WINDOW && self.cursor < self.lines.len() {
            effects.push(Effect::Send(self.lines[self.cursor].clone()));
            self.cursor += 1;
            self.in_flight += 1;
        }
        effects.push(Effect::Progress {
            done: self.done(),
            total: self.total(),
        });

        if self.cursor >= self.lines.len() && self.in_flight == 0 {
            self.reset();
            effects.push(Effect::Completed);
        }
    }

    fn reset(&mut self) {
        self.state = JobState::Idle;
        self.lines.clear();
        self.cursor = 0;
        self.in_flight = 0;
    }
}
