use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use laser_job::gcode::{goto, home, jog, pointer, set_origin};
use laser_job::playback::format_duration;
use laser_job::stream::{InboundEvent, Link, SerialLink, TcpLink, list_serial_ports};
use laser_job::{Error, JobEvent, JobOutcome, MachineSettings, Scene, compile_scene, generate};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Compile laser scenes to G-code and stream them to a controller")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

/// Where the controller is reached
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Target {
    /// Controller bridge address (e.g. 192.168.1.50:23)
    #[arg(long)]
    addr: Option<String>,
    /// Local serial device (e.g. /dev/ttyUSB0), opened at the machine baud rate
    #[arg(long)]
    port: Option<PathBuf>,
}

impl Target {
    fn describe(&self) -> String {
        match (&self.port, &self.addr) {
            (Some(port), _) => port.display().to_string(),
            (None, Some(addr)) => addr.clone(),
            (None, None) => "controller".to_string(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compile a scene to G-code
    Compile {
        scene: PathBuf,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Machine settings JSON
        #[arg(long)]
        machine: Option<PathBuf>,
    },
    /// Print command count, cut length and estimated job time
    Estimate {
        scene: PathBuf,
        #[arg(long)]
        machine: Option<PathBuf>,
    },
    /// Compile a scene and stream it to a controller
    Send {
        scene: PathBuf,
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        machine: Option<PathBuf>,
    },
    /// Move the head by a relative offset
    Jog {
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        dx: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        dy: f64,
        /// mm/min
        #[arg(long, default_value_t = 1000)]
        feed: i64,
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        machine: Option<PathBuf>,
    },
    /// Rapid to an absolute position
    Goto {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        /// mm/min
        #[arg(long, default_value_t = 1000)]
        feed: i64,
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        machine: Option<PathBuf>,
    },
    /// Run the homing cycle
    Home {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        machine: Option<PathBuf>,
    },
    /// Make the current head position the work origin
    Origin {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        machine: Option<PathBuf>,
    },
    /// Switch the low-power positioning beam on, or off with --off
    Pointer {
        #[arg(long)]
        off: bool,
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        machine: Option<PathBuf>,
    },
    /// List local serial devices
    Ports,
}

/// Read failures exit with 2, malformed content with 3
fn load_or_exit<T>(path: &Path, what: &str, result: laser_job::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(Error::Io(e)) => {
            eprintln!("Error reading {} '{}': {}", what, path.display(), e);
            process::exit(2);
        }
        Err(e) => {
            eprintln!("Error parsing {} '{}': {}", what, path.display(), e);
            process::exit(3);
        }
    }
}

fn load_machine(machine: Option<&Path>) -> MachineSettings {
    match machine {
        Some(path) => load_or_exit(path, "machine settings", MachineSettings::load(path)),
        None => MachineSettings::default(),
    }
}

fn load_inputs(scene: &Path, machine: Option<&Path>) -> (Scene, MachineSettings) {
    let scene_data = load_or_exit(scene, "scene", Scene::load(scene));
    (scene_data, load_machine(machine))
}

/// What to do once the channel is open
enum Action {
    /// Stream a whole program under flow control
    Job(String),
    /// Send each line and wait for its reply
    Control(Vec<String>),
}

async fn report(mut inbound: mpsc::UnboundedReceiver<InboundEvent>) {
    while let Some(event) = inbound.recv().await {
        match event {
            InboundEvent::Status(text) => info!(%text, "controller"),
            InboundEvent::Position(p) => debug!(x = p.x, y = p.y, "head position"),
            _ => {}
        }
    }
}

async fn drive<R, W>(mut link: Link<R, W>, action: Action) -> laser_job::Result<JobOutcome>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match action {
        Action::Job(program) => {
            let (controls, rx) = mpsc::unbounded_channel();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, aborting job");
                    let _ = controls.send(JobEvent::Abort);
                }
            });
            link.run_job(&program, rx).await
        }
        Action::Control(lines) => {
            for line in &lines {
                link.send_command(line).await?;
            }
            Ok(JobOutcome::Completed)
        }
    }
}

fn run_on(target: &Target, baud: u32, action: Action) -> laser_job::Result<JobOutcome> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let (events, inbound) = mpsc::unbounded_channel();
        tokio::spawn(report(inbound));
        match (&target.port, &target.addr) {
            (Some(port), _) => {
                drive(SerialLink::open_serial(port, baud, events).await?, action).await
            }
            (None, Some(addr)) => drive(TcpLink::connect(addr, events).await?, action).await,
            (None, None) => Err(Error::Channel(
                "no controller address or serial port given".to_string(),
            )),
        }
    })
}

/// Send machine-control lines, exiting with 4 on failure
fn control(target: &Target, machine: &MachineSettings, lines: Vec<String>) {
    if let Err(e) = run_on(target, machine.baud, Action::Control(lines)) {
        eprintln!("Error talking to '{}': {}", target.describe(), e);
        process::exit(4);
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Cmd::Compile {
            scene,
            output,
            machine,
        } => {
            let (scene, machine) = load_inputs(&scene, machine.as_deref());
            let gcode = generate(&compile_scene(&scene, &machine), &machine);
            match output {
                Some(path) => {
                    if let Err(e) = std::fs::write(&path, &gcode) {
                        eprintln!("Error writing output file '{}': {}", path.display(), e);
                        process::exit(4);
                    }
                    eprintln!("Wrote {} lines to '{}'", gcode.lines().count(), path.display());
                }
                None => print!("{}", gcode),
            }
        }
        Cmd::Estimate { scene, machine } => {
            let (scene, machine) = load_inputs(&scene, machine.as_deref());
            let seq = compile_scene(&scene, &machine);
            println!("Commands:    {}", seq.len());
            println!("Cut length:  {:.1} mm", seq.cut_length());
            println!("Job time:    {}", format_duration(seq.total_time()));
            println!(
                "Workspace:   {} x {} mm",
                scene.workspace.width, scene.workspace.height
            );
            if let Some(b) = seq.extents() {
                println!(
                    "Extents:     ({:.1}, {:.1}) to ({:.1}, {:.1}) mm",
                    b.min_x, b.min_y, b.max_x, b.max_y
                );
                if !machine.bed_contains(&b) {
                    println!(
                        "Warning:     job leaves the {} x {} mm bed",
                        machine.width, machine.height
                    );
                }
            }
        }
        Cmd::Send {
            scene,
            target,
            machine,
        } => {
            let (scene, machine) = load_inputs(&scene, machine.as_deref());
            let gcode = generate(&compile_scene(&scene, &machine), &machine);
            match run_on(&target, machine.baud, Action::Job(gcode)) {
                Ok(JobOutcome::Completed) => println!("Job completed"),
                Ok(JobOutcome::NothingToSend) => {
                    println!("Nothing to send (no paths on output layers)")
                }
                Ok(JobOutcome::Aborted) => {
                    eprintln!("Job aborted");
                    process::exit(4);
                }
                Ok(JobOutcome::Disconnected) => {
                    eprintln!("Controller disconnected before the job finished");
                    process::exit(4);
                }
                Err(e) => {
                    eprintln!("Error streaming to '{}': {}", target.describe(), e);
                    process::exit(4);
                }
            }
        }
        Cmd::Jog {
            dx,
            dy,
            feed,
            target,
            machine,
        } => control(&target, &load_machine(machine.as_deref()), vec![jog(dx, dy, feed)]),
        Cmd::Goto {
            x,
            y,
            feed,
            target,
            machine,
        } => control(&target, &load_machine(machine.as_deref()), vec![goto(x, y, feed)]),
        Cmd::Home { target, machine } => {
            control(&target, &load_machine(machine.as_deref()), vec![home()])
        }
        Cmd::Origin { target, machine } => {
            control(&target, &load_machine(machine.as_deref()), vec![set_origin()])
        }
        Cmd::Pointer {
            off,
            target,
            machine,
        } => {
            let machine = load_machine(machine.as_deref());
            control(&target, &machine, vec![pointer(!off, &machine)]);
        }
        Cmd::Ports => {
            if let InboundEvent::Ports(ports) = list_serial_ports() {
                if ports.is_empty() {
                    eprintln!("No serial ports found");
                }
                for port in ports {
                    println!("{}", port);
                }
            }
        }
    }
}
