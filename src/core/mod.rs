//! Core domain models
//!
//! Workflows, trigger events, runs, matrix cells and their steps.

pub mod config;
pub mod context;
pub mod run;
pub mod state;
pub mod step;
pub mod trigger;
pub mod workflow;

pub use context::*;
pub use run::*;
pub use state::*;
pub use step::*;
pub use trigger::{EventKind, TriggerEvent, TriggerFilter};
pub use workflow::*;
