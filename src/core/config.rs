//! Workflow configuration from YAML

use crate::core::{trigger::BranchPattern, Workflow};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// The workflow this repository verifies itself with
pub const DEFAULT_WORKFLOW_YAML: &str = include_str!("../../workflows/verify.yml");

/// Upper bound on a step timeout (one year)
pub const MAX_TIMEOUT_MINUTES: u64 = 60 * 24 * 365;

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    pub name: String,

    /// Events that start a run
    #[serde(rename = "on")]
    pub triggers: TriggerConfig,

    /// Values available to step commands as `{{ name }}`
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Environment exported to every step of every cell
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Matrix definition
    pub strategy: StrategyConfig,

    /// Ordered steps, identical across cells
    pub steps: Vec<StepConfig>,
}

/// `on:` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<BranchFilterConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<BranchFilterConfig>,
}

/// Branch list for one event kind; empty matches every branch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchFilterConfig {
    #[serde(default)]
    pub branches: Vec<String>,
}

/// Matrix strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// OS identifiers, one cell each
    pub os: Vec<String>,

    /// Cap on concurrently running cells (unset = all at once)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Step name, unique within the workflow
    pub name: String,

    /// Shell command; may contain `{{ variable }}` placeholders
    pub run: String,

    /// Extra environment for this step only
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Directory relative to the run workdir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,

    /// Limit imposed by the runner; exceeding it fails the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u64>,
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Format, Build and Test on ubuntu, windows and macos, on pushes and pull requests to main
    pub fn default_workflow() -> Result<Self> {
        Self::from_yaml(DEFAULT_WORKFLOW_YAML).context("Bundled workflow is invalid")
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Workflow name must not be empty");
        }

        if self.triggers.push.is_none() && self.triggers.pull_request.is_none() {
            anyhow::bail!("Workflow '{}' has no triggers (expected 'push' or 'pull_request')", self.name);
        }

        for filter in [&self.triggers.push, &self.triggers.pull_request].into_iter().flatten() {
            for branch in &filter.branches {
                if branch.trim().is_empty() {
                    anyhow::bail!("Branch pattern must not be empty");
                }
                BranchPattern::parse(branch)?;
            }
        }

        if self.strategy.os.is_empty() {
            anyhow::bail!("Matrix must list at least one OS");
        }
        let mut seen_os = HashSet::new();
        for os in &self.strategy.os {
            if os.trim().is_empty() {
                anyhow::bail!("Matrix OS identifier must not be empty");
            }
            if !seen_os.insert(os) {
                anyhow::bail!("Duplicate matrix OS: {}", os);
            }
        }
        if self.strategy.max_parallel == Some(0) {
            anyhow::bail!("max_parallel must be at least 1");
        }

        if self.steps.is_empty() {
            anyhow::bail!("Workflow '{}' has no steps", self.name);
        }
        let mut seen_steps = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                anyhow::bail!("Step name must not be empty");
            }
            if !seen_steps.insert(&step.name) {
                anyhow::bail!("Duplicate step name: {}", step.name);
            }
            if step.run.trim().is_empty() {
                anyhow::bail!("Step '{}' has an empty command", step.name);
            }
            if let Some(minutes) = step.timeout_minutes {
                if minutes == 0 {
                    anyhow::bail!("Step '{}' timeout_minutes must be at least 1", step.name);
                }
                if minutes > MAX_TIMEOUT_MINUTES {
                    anyhow::bail!(
                        "Step '{}' timeout_minutes must be at most {}",
                        step.name,
                        MAX_TIMEOUT_MINUTES
                    );
                }
            }
        }

        Ok(())
    }

    /// Convert config to a Workflow domain model
    pub fn to_workflow(&self) -> Result<Workflow> {
        Workflow::from_config(self)
    }
}
