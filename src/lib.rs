//! Robokit - hardware-agnostic motion simulation and robot program generation
//!
//! Requests are expressed as [`ActionKind`] values and issued to a
//! [`CursorChain`]. Every stage of the chain is a [`RobotCursor`] that
//! simulates the robot, checks each action against its state and the table
//! height, and hands accepted actions to the next stage. Compilers replay the
//! buffered write stage to produce RAPID, URScript, KRL or a readable listing.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use robokit::{ActionKind, CursorChain, Config, Stage, compiler_for, Platform};
//! use nalgebra::Vector3;
//!
//! fn main() -> robokit::Result<()> {
//!     let config = Config::load_from_path("config/default_config.yaml")?;
//!     let mut chain = CursorChain::from_config(&config)?;
//!
//!     chain.issue(ActionKind::speed_to(100))?;
//!     chain.issue(ActionKind::translate(Vector3::new(100.0, 0.0, 0.0)))?;
//!
//!     let compiler = compiler_for(Platform::Abb);
//!     if let Some(write) = chain.cursor(Stage::Write) {
//!         for line in compiler.generate_program("Demo", write, false, false)? {
//!             println!("{}", line);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **CursorChain**: virtual, write and motion stages fed in issue order
//! - **RobotCursor**: per-stage state machine with its own action buffer
//! - **Compiler**: one backend per target language
//! - **ChainService**: tokio task owning a chain, with execute and streaming modes
//! - **DeviceLink**: seam to whatever talks to the real controller

pub mod action;
pub mod buffer;
pub mod chain;
pub mod compiler;
pub mod config;
pub mod cursor;
pub mod device;
pub mod error;
pub mod events;
pub mod geometry;
pub mod job;
pub mod service;
pub mod settings;
pub mod streaming;

pub use action::{Action, ActionKind, MotionType, ReferenceFrame};
pub use buffer::ActionBuffer;
pub use chain::{CursorChain, Issued, Released, Stage};
pub use compiler::{
    compiler_for, Compiler, HumanCompiler, KrlCompiler, Platform, RapidCompiler, UrScriptCompiler,
};
pub use config::{
    CollisionPolicy, CompilerConfig, Config, CursorConfig, ExecutionConfig, ExecutionMode, SafetyConfig,
};
pub use cursor::{CursorState, InitialState, IssueOutcome, RobotCursor, SafetyWarning};
pub use device::{ConsoleDevice, DeviceLink, NoOpDevice};
pub use error::{CompileError, CursorError, Result, RobokitError};
pub use events::{ActionEvent, ProgramEvent, SafetyEvent};
pub use geometry::{Joints, Point, Rotation};
pub use job::{Instruction, JobFile, JobStep};
pub use service::{ChainHandle, ChainService, ServiceStatus, StageSnapshot};
pub use settings::{Settings, SettingsStack};
pub use streaming::{Streamed, Streamer};
