#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`cli`]: Command-line flags (`Cli`)
//! - [`app`]: Config loading and command execution
//! - [`orchestrator`]: Batch run driver (`Orchestrator`, `Collaborators`)
//! - [`task`]: Per-container state machine (`ContainerTask`, `Disposition`)
//! - [`run`]: Run identity and container list (`PipelineRun`)
//! - [`report`]: Run report (`RunReport`)
//! - [`output`]: Text/JSON rendering (`OutputWriter`, `Render`)
//! - [`error`]: Run-level errors and exit codes (`RunError`)
//! - [`logging`], [`metrics_server`], [`signal`]: process plumbing

pub mod app;
pub mod cli;
pub mod error;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
pub mod output;
pub mod report;
pub mod run;
pub mod signal;
pub mod task;

// --- Public API Re-exports ---

pub use error::RunError;
pub use orchestrator::{Collaborators, Orchestrator, ProductionOrchestrator};
pub use report::{ContainerReport, RunReport};
pub use run::PipelineRun;
pub use task::{ContainerTask, Disposition, Step, TaskState};
