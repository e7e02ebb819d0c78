//! Runner configuration

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the local process runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Directory commands run in; step `working_directory` is relative to it
    pub workdir: PathBuf,

    /// Root of the per-cell scratch directories
    pub scratch_root: PathBuf,

    /// Shell invocation, e.g. `bash -c`. Defaults to `sh -c` or `cmd /C`.
    pub shell: Option<String>,

    /// Limit applied to steps without their own timeout
    pub default_timeout: Option<Duration>,

    /// Extra environment exported to every command
    pub env: BTreeMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            scratch_root: std::env::temp_dir().join("matrix-ci"),
            shell: None,
            default_timeout: None,
            env: BTreeMap::new(),
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn with_scratch_root(mut self, scratch_root: impl Into<PathBuf>) -> Self {
        self.scratch_root = scratch_root.into();
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Program and leading arguments of the shell invocation
    pub fn shell_invocation(&self) -> (String, Vec<String>) {
        if let Some(shell) = &self.shell {
            let mut parts = shell.split_whitespace().map(str::to_string);
            if let Some(program) = parts.next() {
                return (program, parts.collect());
            }
        }

        if cfg!(windows) {
            ("cmd".to_string(), vec!["/C".to_string()])
        } else {
            ("sh".to_string(), vec!["-c".to_string()])
        }
    }
}
