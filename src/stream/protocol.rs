//! Controller response parsing
//!
//! GRBL-style controllers answer every line with `ok` or `error:<code>`,
//! report position in `<State|MPos:x,y,z|...>` status frames and print
//! free text (banners, alarms, settings) otherwise.

use crate::scene::Point;

/// Everything the hardware channel can report
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// One program line was accepted
    Ack,
    Position(Point),
    Status(String),
    Ports(Vec<String>),
    Error(String),
    Connected,
    Disconnected,
}

/// Parse one response line. Blank lines and unparseable status frames
/// yield None.
pub fn parse_response(line: &str) -> Option<InboundEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line == "ok" {
        return Some(InboundEvent::Ack);
    }
    if line.starts_with("error") {
        return Some(InboundEvent::Error(line.to_string()));
    }
    if line.starts_with('<') {
        return parse_machine_position(line).map(InboundEvent::Position);
    }
    Some(InboundEvent::Status(line.to_string()))
}

/// Extract X/Y from the `MPos:` field of a status frame
fn parse_machine_position(frame: &str) -> Option<Point> {
    let (_, rest) = frame.split_once("MPos:")?;
    let field = rest.split(['|', '>']).next()?;
    let mut parts = field.split(',');
    let x = parts.next()?.trim().parse().ok()?;
    let y = parts.next()?.trim().parse().ok()?;
    Some(Point::new(x, y))
}
