//! # fzpilot-harness - Finder Process Orchestration
//!
//! Spawns the external fuzzy finder, feeds it entries, serves its callbacks
//! through [`fzpilot_rpc`], optionally drives it with an automation script,
//! and returns the session's recorded result.
//!
//! ## Public API
//!
//! ### Orchestrator
//! - [`Finder`] - `run` / `run_scripted` / `run_streaming` drivers
//! - [`EXIT_NO_MATCH`], [`EXIT_ABORTED`] - tolerated finder exit codes
//!
//! ### Process Management
//! - [`FinderProcess`] - Piped finder subprocess with a dedicated wait task
//!
//! ### Automation
//! - [`Automator`], [`ScriptStep`] - Lock-step scripted playback
//! - [`Controller`] - HTTP POST wrapper over the finder's remote-control port
//!
//! ### Configuration
//! - [`FinderConfig`], [`EntryDelimiter`] - Program, flags, delimiter, env

pub mod automator;
pub mod config;
pub mod controller;
pub mod orchestrator;
pub mod process;

pub use automator::{Automator, ScriptStep};
pub use config::{EntryDelimiter, FinderConfig, DEFAULT_PROGRAM};
pub use controller::Controller;
pub use orchestrator::{Finder, EXIT_ABORTED, EXIT_NO_MATCH};
pub use process::FinderProcess;
