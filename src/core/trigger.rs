//! Trigger events and branch filtering

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of repository event that may start a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(EventKind::Push),
            "pull_request" | "pull-request" => Ok(EventKind::PullRequest),
            other => Err(format!("Unknown event kind: {}", other)),
        }
    }
}

/// A repository event: what happened and which branch it targets
///
/// For pull requests `branch` is the base (target) branch, not the head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub kind: EventKind,
    pub branch: String,
}

impl TriggerEvent {
    pub fn new(kind: EventKind, branch: impl Into<String>) -> Self {
        Self {
            kind,
            branch: branch.into(),
        }
    }

    pub fn push(branch: impl Into<String>) -> Self {
        Self::new(EventKind::Push, branch)
    }

    pub fn pull_request(branch: impl Into<String>) -> Self {
        Self::new(EventKind::PullRequest, branch)
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.kind, self.branch)
    }
}

/// Pattern for matching a branch name
#[derive(Debug, Clone)]
pub enum BranchPattern {
    /// Branch name must be equal
    Exact(String),
    /// Glob compiled to an anchored regex (`*` stays inside a segment, `**` crosses `/`)
    Glob { source: String, regex: Regex },
}

impl BranchPattern {
    /// Compile a pattern from its configured text
    pub fn parse(pattern: &str) -> Result<Self> {
        if !pattern.contains('*') {
            return Ok(BranchPattern::Exact(pattern.to_string()));
        }

        let mut expr = String::from("^");
        let mut rest = pattern;
        while !rest.is_empty() {
            if let Some(tail) = rest.strip_prefix("**") {
                expr.push_str(".*");
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix('*') {
                expr.push_str("[^/]*");
                rest = tail;
            } else {
                let next = rest.find('*').unwrap_or(rest.len());
                expr.push_str(&regex::escape(&rest[..next]));
                rest = &rest[next..];
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr)
            .with_context(|| format!("Invalid branch pattern '{}'", pattern))?;
        Ok(BranchPattern::Glob {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Check if the pattern matches the given branch name
    pub fn matches(&self, branch: &str) -> bool {
        match self {
            BranchPattern::Exact(name) => name == branch,
            BranchPattern::Glob { regex, .. } => regex.is_match(branch),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BranchPattern::Exact(name) => name,
            BranchPattern::Glob { source, .. } => source,
        }
    }
}

/// Branch filter for one event kind; empty means every branch
#[derive(Debug, Clone, Default)]
pub struct BranchFilter {
    pub patterns: Vec<BranchPattern>,
}

impl BranchFilter {
    pub fn from_patterns(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| BranchPattern::parse(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, branch: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(branch))
    }
}

/// Which events start a run
#[derive(Debug, Clone, Default)]
pub struct TriggerFilter {
    /// Filter for push events (`None` = pushes never trigger)
    pub push: Option<BranchFilter>,

    /// Filter for pull request events (`None` = pull requests never trigger)
    pub pull_request: Option<BranchFilter>,
}

impl TriggerFilter {
    /// Push and pull requests, both restricted to `main`
    pub fn main_only() -> Self {
        let main = BranchFilter {
            patterns: vec![BranchPattern::Exact("main".to_string())],
        };
        Self {
            push: Some(main.clone()),
            pull_request: Some(main),
        }
    }

    /// Pure predicate: does this event start a run?
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        let filter = match event.kind {
            EventKind::Push => self.push.as_ref(),
            EventKind::PullRequest => self.pull_request.as_ref(),
        };
        filter.is_some_and(|f| f.matches(&event.branch))
    }
}
