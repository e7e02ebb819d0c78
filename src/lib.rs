//! matrix-ci - a build verification pipeline over an OS matrix

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runner;

// Re-export commonly used types
pub use core::config::WorkflowConfig;
pub use core::{Cell, CellContext, EventKind, ExecutionStatus, Run, StepState, TriggerEvent, Workflow};
pub use execution::{ExecutionEngine, ExecutionEvent, SchedulingStrategy};
pub use runner::{CommandOutput, LocalProcessRunner, RunnerConfig, RunnerError, StepRunner};
