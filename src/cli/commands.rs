//! CLI command definitions

use crate::core::EventKind;
use crate::execution::SchedulingStrategy;
use clap::Args;
use std::path::PathBuf;

/// Concurrency used by `parallel-limited` when no `--max-parallel` is given
pub const DEFAULT_PARALLEL_LIMIT: usize = 2;

/// Run a workflow for a trigger event
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file (defaults to the bundled Rust workflow)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Event kind to simulate
    #[arg(long, value_enum, default_value_t = EventArg::Push)]
    pub event: EventArg,

    /// Target branch of the event
    #[arg(short, long, default_value = "main")]
    pub branch: String,

    /// Only run these matrix cells (repeatable)
    #[arg(long)]
    pub os: Vec<String>,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub variable: Vec<(String, String)>,

    /// Scheduling strategy for matrix cells
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Parallel)]
    pub strategy: SchedulingStrategyArg,

    /// Cap on concurrently running cells
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Directory the step commands run in
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,

    /// Root for per-cell scratch directories
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Shell invocation used for step commands, e.g. "bash -c"
    #[arg(long)]
    pub shell: Option<String>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Print the output of every step, not only failed ones
    #[arg(long)]
    pub show_output: bool,
}

/// Validate a workflow configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show the cell x step plan of a workflow without running it
#[derive(Debug, Args, Clone)]
pub struct MatrixCommand {
    /// Path to workflow YAML file (defaults to the bundled Rust workflow)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List workflows present in history
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show run counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Workflow name to filter by
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run (full details with -v)
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Event kind argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventArg {
    Push,
    #[clap(name = "pull-request")]
    PullRequest,
}

impl From<EventArg> for EventKind {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Push => EventKind::Push,
            EventArg::PullRequest => EventKind::PullRequest,
        }
    }
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl SchedulingStrategyArg {
    /// Resolve against `--max-parallel`
    pub fn to_strategy(self, max_parallel: Option<usize>) -> SchedulingStrategy {
        match self {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => {
                SchedulingStrategy::Parallel.with_max_parallel(max_parallel)
            }
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(
                max_parallel.unwrap_or(DEFAULT_PARALLEL_LIMIT),
            ),
        }
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
