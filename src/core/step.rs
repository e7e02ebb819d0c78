//! Step domain model

use crate::core::config::StepConfig;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use std::time::Duration;

static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();

/// A step definition shared by every cell of a workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDefinition {
    /// Step name (Format, Build, Test, ...)
    pub name: String,

    /// Command template
    pub command_template: String,

    /// Step-level environment templates
    pub env: BTreeMap<String, String>,

    /// Directory relative to the run workdir
    pub working_directory: Option<String>,

    /// Optional per-step limit
    pub timeout: Option<Duration>,
}

/// A step resolved for one cell: everything the runner needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCommand {
    pub step_name: String,
    pub command: String,
    pub env: BTreeMap<String, String>,
    pub working_directory: Option<String>,
    pub timeout: Option<Duration>,
}

impl StepDefinition {
    /// Create a step from a step config
    pub fn from_config(config: &StepConfig) -> Self {
        StepDefinition {
            name: config.name.clone(),
            command_template: config.run.clone(),
            env: config.env.clone(),
            working_directory: config.working_directory.clone(),
            timeout: config
                .timeout_minutes
                .map(|m| Duration::from_secs(m.saturating_mul(60))),
        }
    }

    /// Shorthand used by tests and the built-in workflow
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        StepDefinition {
            name: name.into(),
            command_template: command.into(),
            env: BTreeMap::new(),
            working_directory: None,
            timeout: None,
        }
    }

    /// Render the command with variable substitution
    pub fn render_command(&self, variables: &HashMap<String, String>) -> String {
        render_template(&self.command_template, variables)
    }

    /// Resolve this step for a cell; workflow env is overridden by step env
    pub fn resolve(
        &self,
        workflow_env: &BTreeMap<String, String>,
        variables: &HashMap<String, String>,
    ) -> StepCommand {
        let env = workflow_env
            .iter()
            .chain(self.env.iter())
            .map(|(k, v)| (k.clone(), render_template(v, variables)))
            .collect();

        StepCommand {
            step_name: self.name.clone(),
            command: self.render_command(variables),
            env,
            working_directory: self
                .working_directory
                .as_ref()
                .map(|dir| render_template(dir, variables)),
            timeout: self.timeout,
        }
    }
}

/// Replace variables in the form `{{ variable_name }}`
///
/// Single pass: substituted values are never scanned for placeholders again.
/// Unknown placeholders are left as written.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    let Some(placeholder) =
        PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{\s*([\w.-]+)\s*\}\}").ok())
    else {
        return template.to_string();
    };

    placeholder
        .replace_all(template, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
