//! Workflow domain model

use crate::core::{
    config::{BranchFilterConfig, WorkflowConfig},
    run::{Cell, Run},
    state::RunState,
    step::StepDefinition,
    trigger::{BranchFilter, TriggerEvent, TriggerFilter},
};
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// A validated workflow definition
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    /// Which events start a run
    pub triggers: TriggerFilter,

    /// Matrix OS identifiers, in declaration order
    pub os: Vec<String>,

    /// Cap on concurrently running cells
    pub max_parallel: Option<usize>,

    /// Ordered steps, identical across all cells
    pub steps: Vec<StepDefinition>,

    /// Variables available to step commands
    pub variables: HashMap<String, String>,

    /// Environment exported to every step
    pub env: BTreeMap<String, String>,
}

impl Workflow {
    /// Create a workflow from configuration
    pub fn from_config(config: &WorkflowConfig) -> Result<Self> {
        let branch_filter = |filter: &Option<BranchFilterConfig>| -> Result<Option<BranchFilter>> {
            filter
                .as_ref()
                .map(|f| BranchFilter::from_patterns(&f.branches))
                .transpose()
        };

        Ok(Workflow {
            name: config.name.clone(),
            triggers: TriggerFilter {
                push: branch_filter(&config.triggers.push)?,
                pull_request: branch_filter(&config.triggers.pull_request)?,
            },
            os: config.strategy.os.clone(),
            max_parallel: config.strategy.max_parallel,
            steps: config.steps.iter().map(StepDefinition::from_config).collect(),
            variables: config
                .variables
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            env: config.env.clone(),
        })
    }

    /// Check whether an event starts a run; no side effects
    pub fn should_trigger(&self, event: &TriggerEvent) -> bool {
        self.triggers.matches(event)
    }

    /// One pending cell per OS identifier, each with the full step list
    pub fn expand_matrix(&self) -> Vec<Cell> {
        self.os
            .iter()
            .enumerate()
            .map(|(index, os)| Cell::new(index, os.clone(), &self.steps))
            .collect()
    }

    /// Create a run for an event, or `None` when the event does not match
    pub fn create_run(&self, event: &TriggerEvent) -> Option<Run> {
        if !self.should_trigger(event) {
            return None;
        }

        Some(Run {
            id: Uuid::new_v4(),
            workflow_name: self.name.clone(),
            event: event.clone(),
            env: self.env.clone(),
            variables: self.variables.clone(),
            max_parallel: self.max_parallel,
            cells: self.expand_matrix(),
            state: RunState::new(),
        })
    }

    /// Step names in execution order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}
