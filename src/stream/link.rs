//! Async line channel to a controller
//!
//! A [`Link`] owns one buffered reader and writer pair: the two halves of a
//! TCP connection to a serial bridge, or two handles on a local serial
//! device. Program lines are written newline-terminated, realtime signals
//! as single bytes. Every parsed response is also forwarded to the link's
//! event channel.

use std::path::Path;
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::protocol::{InboundEvent, parse_response};
use super::{Effect, JobEvent, Realtime, Streamer};
use crate::error::{Error, Result};

/// Default period of `?` status queries while a job runs
pub const STATUS_INTERVAL: Duration = Duration::from_millis(250);

/// Device name prefixes of USB serial adapters on Linux and macOS
const SERIAL_PREFIXES: [&str; 4] = ["ttyUSB", "ttyACM", "cu.usbserial", "cu.usbmodem"];

/// How a streamed job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Aborted,
    /// The controller closed the channel mid-job
    Disconnected,
    /// The program had no lines to send
    NothingToSend,
}

pub struct Link<R, W> {
    lines: Lines<R>,
    writer: W,
    events: mpsc::UnboundedSender<InboundEvent>,
    status_interval: Option<Duration>,
}

pub type TcpLink = Link<BufReader<OwnedReadHalf>, OwnedWriteHalf>;
pub type SerialLink = Link<BufReader<File>, File>;

impl TcpLink {
    /// Connect to a controller bridge at `addr` (host:port)
    pub async fn connect(addr: &str, events: mpsc::UnboundedSender<InboundEvent>) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::Channel(format!("cannot connect to {}: {}", addr, e)))?;
        info!(%addr, "connected");
        let (read, write) = stream.into_split();
        let link = Link::new(BufReader::new(read), write, events);
        link.emit(InboundEvent::Connected);
        Ok(link)
    }
}

impl SerialLink {
    /// Open a local serial device at `baud`. The line is switched to raw
    /// mode with `stty`; reads and writes use separate handles.
    pub async fn open_serial(
        path: impl AsRef<Path>,
        baud: u32,
        events: mpsc::UnboundedSender<InboundEvent>,
    ) -> Result<Self> {
        let path = path.as_ref();
        configure_tty(path, baud)?;
        let cannot_open =
            |e: std::io::Error| Error::Channel(format!("cannot open {}: {}", path.display(), e));
        let read = OpenOptions::new()
            .read(true)
            .open(path)
            .await
            .map_err(cannot_open)?;
        let write = OpenOptions::new()
            .write(true)
            .open(path)
            .await
            .map_err(cannot_open)?;
        info!(port = %path.display(), baud, "connected");
        let link = Link::new(BufReader::new(read), write, events);
        link.emit(InboundEvent::Connected);
        Ok(link)
    }
}

fn configure_tty(path: &Path, baud: u32) -> Result<()> {
    let device_flag = if cfg!(target_os = "macos") { "-f" } else { "-F" };
    let status = std::process::Command::new("stty")
        .arg(device_flag)
        .arg(path)
        .arg(baud.to_string())
        .args(["raw", "-echo"])
        .status()
        .map_err(|e| Error::Channel(format!("cannot run stty: {}", e)))?;
    if !status.success() {
        return Err(Error::Channel(format!(
            "stty failed for {} ({})",
            path.display(),
            status
        )));
    }
    Ok(())
}

/// USB serial devices a controller may be attached to, sorted by path
pub fn list_serial_ports() -> InboundEvent {
    let mut ports: Vec<String> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
        .filter(|name| SERIAL_PREFIXES.iter().any(|p| name.starts_with(p)))
        .map(|name| format!("/dev/{}", name))
        .collect();
    ports.sort();
    InboundEvent::Ports(ports)
}

impl<R, W> Link<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, events: mpsc::UnboundedSender<InboundEvent>) -> Self {
        Self {
            lines: reader.lines(),
            writer,
            events,
            status_interval: Some(STATUS_INTERVAL),
        }
    }

    /// Status query period while a job runs. None or zero disables polling.
    pub fn with_status_interval(mut self, every: Option<Duration>) -> Self {
        self.status_interval = every.filter(|d| !d.is_zero());
        self
    }

    fn emit(&self, event: InboundEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Next parsed response, or None once the controller closed the channel
    async fn next_event(&mut self) -> Result<Option<InboundEvent>> {
        loop {
            let Some(text) = self.lines.next_line().await? else {
                self.emit(InboundEvent::Disconnected);
                return Ok(None);
            };
            if let Some(event) = parse_response(&text) {
                if let InboundEvent::Error(msg) = &event {
                    warn!(%msg, "controller error");
                }
                self.emit(event.clone());
                return Ok(Some(event));
            }
        }
    }

    /// Write one line without waiting for its acknowledgment
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Write one line and wait until the controller accepts or rejects it
    pub async fn send_command(&mut self, line: &str) -> Result<()> {
        self.send_line(line).await?;
        debug!(%line, "sent");
        loop {
            match self.next_event().await? {
                Some(InboundEvent::Ack) => return Ok(()),
                Some(InboundEvent::Error(msg)) => {
                    return Err(Error::Channel(format!("'{}' rejected: {}", line, msg)));
                }
                Some(_) => {}
                None => return Err(Error::Channel("controller disconnected".to_string())),
            }
        }
    }

    async fn realtime(&mut self, signal: Realtime) -> Result<()> {
        self.writer.write_all(&[signal.byte()]).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Carry out streamer effects. Returns the outcome once the job has
    /// finished.
    async fn apply(&mut self, effects: Vec<Effect>) -> Result<Option<JobOutcome>> {
        let mut outcome = None;
        for effect in effects {
            match effect {
                Effect::Send(line) => {
                    self.writer.write_all(line.as_bytes()).await?;
                    self.writer.write_all(b"\n").await?;
                }
                Effect::Realtime(signal) => {
                    self.writer.write_all(&[signal.byte()]).await?;
                }
                Effect::Progress { done, total } => {
                    debug!(done, total, "progress");
                }
                Effect::Completed => {
                    info!("job completed");
                    outcome = Some(JobOutcome::Completed);
                }
                Effect::Aborted => {
                    info!("job aborted");
                    outcome = Some(JobOutcome::Aborted);
                }
            }
        }
        self.writer.flush().await?;
        Ok(outcome)
    }

    /// Stream `program` until it completes, is aborted through `controls`,
    /// or the channel closes.
    ///
    /// `controls` carries user requests (pause, resume, abort). Acks come
    /// from the controller and should not be sent through it. While the job
    /// runs the controller is asked for a status report every status
    /// interval.
    pub async fn run_job(
        &mut self,
        program: &str,
        mut controls: mpsc::UnboundedReceiver<JobEvent>,
    ) -> Result<JobOutcome> {
        let mut streamer = Streamer::new();
        let effects = streamer.handle(JobEvent::Start(program.to_string()));
        if effects.is_empty() {
            info!("nothing to send");
            return Ok(JobOutcome::NothingToSend);
        }
        info!(lines = streamer.total(), "job started");
        if let Some(outcome) = self.apply(effects).await? {
            return Ok(outcome);
        }

        let polling = self.status_interval.is_some();
        let mut ticker = time::interval(self.status_interval.unwrap_or(STATUS_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut controls_open = true;

        loop {
            let event = tokio::select! {
                inbound = self.next_event() => match inbound? {
                    Some(InboundEvent::Ack) => JobEvent::Ack,
                    Some(InboundEvent::Position(p)) => {
                        debug!(x = p.x, y = p.y, "position");
                        continue;
                    }
                    Some(_) => continue,
                    None => {
                        warn!(done = streamer.done(), total = streamer.total(), "controller disconnected");
                        return Ok(JobOutcome::Disconnected);
                    }
                },
                control = controls.recv(), if controls_open => match control {
                    Some(event) => event,
                    None => {
                        controls_open = false;
                        continue;
                    }
                },
                _ = ticker.tick(), if polling => {
                    self.realtime(Realtime::StatusQuery).await?;
                    continue;
                }
            };

            let effects = streamer.handle(event);
            if let Some(outcome) = self.apply(effects).await? {
                return Ok(outcome);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Point;
    use tokio::io::{AsyncReadExt, DuplexStream, ReadHalf, WriteHalf, duplex};

    type TestLink = Link<BufReader<ReadHalf<DuplexStream>>, WriteHalf<DuplexStream>>;

    fn host_link(host: DuplexStream) -> (TestLink, mpsc::UnboundedReceiver<InboundEvent>) {
        let (read, write) = tokio::io::split(host);
        let (events, rx) = mpsc::unbounded_channel();
        (Link::new(BufReader::new(read), write, events), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<InboundEvent>) -> Vec<InboundEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[tokio::test]
    async fn test_empty_program_sends_nothing() {
        let (_ctrl, host) = duplex(64);
        let (mut link, _events) = host_link(host);
        let (_tx, rx) = mpsc::unbounded_channel();
        let outcome = link.run_job("; nothing\n", rx).await.unwrap();
        assert_eq!(outcome, JobOutcome::NothingToSend);
    }

    #[tokio::test]
    async fn test_disconnect_is_surfaced() {
        let (ctrl, host) = duplex(256);
        let (link, mut events) = host_link(host);
        let mut link = link.with_status_interval(None);
        let (_tx, rx) = mpsc::unbounded_channel();
        let job = tokio::spawn(async move { link.run_job("G0 X1 Y1\nG0 X2 Y2\n", rx).await });

        let (mut ctrl_read, ctrl_write) = tokio::io::split(ctrl);
        let mut buf = vec![0u8; 18];
        ctrl_read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"G0 X1 Y1\nG0 X2 Y2\n");
        drop(ctrl_write);
        drop(ctrl_read);

        assert_eq!(job.await.unwrap().unwrap(), JobOutcome::Disconnected);
        assert_eq!(drain(&mut events), vec![InboundEvent::Disconnected]);
    }

    #[tokio::test]
    async fn test_status_queries_surface_positions() {
        let (ctrl, host) = duplex(1024);
        let (link, mut events) = host_link(host);
        let mut link = link.with_status_interval(Some(Duration::from_millis(10)));
        let (_tx, rx) = mpsc::unbounded_channel();
        let job = tokio::spawn(async move { link.run_job("G0 X1 Y1\n", rx).await });

        let (mut ctrl_read, mut ctrl_write) = tokio::io::split(ctrl);
        let mut seen = Vec::new();
        let mut byte = [0u8; 1];
        while !(seen.contains(&b'?') && seen.windows(9).any(|w| w == b"G0 X1 Y1\n")) {
            ctrl_read.read_exact(&mut byte).await.unwrap();
            seen.push(byte[0]);
        }
        ctrl_write
            .write_all(b"<Idle|MPos:1.000,1.000,0.000|FS:0,0>\r\nok\r\n")
            .await
            .unwrap();

        assert_eq!(job.await.unwrap().unwrap(), JobOutcome::Completed);
        assert_eq!(
            drain(&mut events),
            vec![
                InboundEvent::Position(Point::new(1.0, 1.0)),
                InboundEvent::Ack
            ]
        );
    }

    #[tokio::test]
    async fn test_send_command_waits_for_reply() {
        let (ctrl, host) = duplex(256);
        let (mut link, mut events) = host_link(host);
        let (mut ctrl_read, mut ctrl_write) = tokio::io::split(ctrl);
        ctrl_write
            .write_all(b"Grbl 1.1h ['$' for help]\r\nok\r\nerror:9\r\n")
            .await
            .unwrap();

        link.send_command("$H").await.unwrap();
        let err = link.send_command("G0 X5 Y5").await.unwrap_err();
        assert!(matches!(err, Error::Channel(_)));

        let mut sent = vec![0u8; 12];
        ctrl_read.read_exact(&mut sent).await.unwrap();
        assert_eq!(&sent, b"$H\nG0 X5 Y5\n");
        assert_eq!(
            drain(&mut events),
            vec![
                InboundEvent::Status("Grbl 1.1h ['$' for help]".into()),
                InboundEvent::Ack,
                InboundEvent::Error("error:9".into()),
            ]
        );
    }

    #[test]
    fn test_serial_ports_are_device_paths() {
        let InboundEvent::Ports(ports) = list_serial_ports() else {
            panic!("expected a port list");
        };
        assert!(ports.iter().all(|p| p.starts_with("/dev/")));
        assert!(ports.windows(2).all(|w| w[0] <= w[1]));
    }
}
