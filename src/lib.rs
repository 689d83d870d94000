//! # laser-job
//!
//! A Rust library for turning laser design scenes into machine jobs.
//!
//! ## Features
//!
//! - **Compilation**: Flatten vector paths and dithered bitmaps into one
//!   continuous, time-annotated sequence of rapid and cut moves
//! - **G-code**: Emit GRBL-style motion code with redundant modal words removed
//! - **Streaming**: Feed a program to a controller over TCP or a serial port
//!   with a 3-line ack window, polling its status while the job runs
//!
//! ## Example - Compile to G-code
//!
//! ```rust,ignore
//! use laser_job::{MachineSettings, Scene, compile_scene, generate};
//!
//! let scene = Scene::load("design.json").unwrap();
//! let machine = MachineSettings::default();
//! let seq = compile_scene(&scene, &machine);
//! std::fs::write("job.gcode", generate(&seq, &machine)).unwrap();
//! ```
//!
//! ## Example - Stream a job
//!
//! ```rust,ignore
//! use laser_job::stream::TcpLink;
//! use tokio::sync::mpsc;
//!
//! let (events, _inbound) = mpsc::unbounded_channel();
//! let mut link = TcpLink::connect("192.168.1.50:23", events).await?;
//! let (_controls, rx) = mpsc::unbounded_channel();
//! let outcome = link.run_job(&gcode, rx).await?;
//! ```

pub mod command;
pub mod compile;
pub mod config;
pub mod error;
pub mod gcode;
pub mod geometry;
pub mod playback;
pub mod raster;
pub mod scene;
pub mod stream;

// Re-export commonly used items
pub use command::{Command, CommandSequence, CutMode, MoveKind};
pub use compile::compile_scene;
pub use config::MachineSettings;
pub use error::{Error, Result};
pub use gcode::generate;
pub use scene::{Item, Layer, LayerSetting, Point, Scene};
pub use stream::{JobEvent, JobOutcome, JobState, Streamer};
