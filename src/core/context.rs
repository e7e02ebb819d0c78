//! Cell context - the values one matrix cell renders its commands with

use crate::core::trigger::TriggerEvent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Platform family of a matrix OS identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunnerOs {
    Linux,
    Windows,
    MacOs,
    Other(String),
}

impl RunnerOs {
    /// `ubuntu-latest` -> Linux, `windows-2022` -> Windows, `macos-14` -> macOS
    pub fn from_identifier(os: &str) -> Self {
        let lower = os.to_ascii_lowercase();
        if lower.starts_with("ubuntu") || lower.starts_with("linux") || lower.starts_with("debian") {
            RunnerOs::Linux
        } else if lower.starts_with("windows") {
            RunnerOs::Windows
        } else if lower.starts_with("macos") || lower.starts_with("osx") {
            RunnerOs::MacOs
        } else {
            RunnerOs::Other(os.to_string())
        }
    }

    /// The family the current process runs on
    pub fn host() -> Self {
        Self::from_identifier(std::env::consts::OS)
    }
}

impl fmt::Display for RunnerOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerOs::Linux => f.write_str("Linux"),
            RunnerOs::Windows => f.write_str("Windows"),
            RunnerOs::MacOs => f.write_str("macOS"),
            RunnerOs::Other(name) => f.write_str(name),
        }
    }
}

/// Execution context for one cell of a run
///
/// Built once per cell before any step starts and never shared with other cells.
#[derive(Debug, Clone)]
pub struct CellContext {
    pub run_id: Uuid,
    pub workflow_name: String,
    pub event: TriggerEvent,

    /// Matrix OS identifier (`ubuntu-latest`)
    pub os: String,
    pub runner_os: RunnerOs,

    /// Scratch directory owned by this cell alone
    pub cell_dir: PathBuf,

    /// Workflow variables plus CLI overrides
    pub variables: HashMap<String, String>,
}

impl CellContext {
    /// Get a variable
    pub fn get_variable(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    /// Get all variables available for command rendering
    pub fn get_rendering_variables(&self) -> HashMap<String, String> {
        let mut vars = self.variables.clone();

        vars.insert("matrix.os".to_string(), self.os.clone());
        vars.insert("runner.os".to_string(), self.runner_os.to_string());
        vars.insert("workflow".to_string(), self.workflow_name.clone());
        vars.insert("run_id".to_string(), self.run_id.to_string());
        vars.insert("event".to_string(), self.event.kind.to_string());
        vars.insert("branch".to_string(), self.event.branch.clone());
        vars.insert("cell_dir".to_string(), self.cell_dir.display().to_string());

        vars
    }
}
