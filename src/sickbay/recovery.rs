//! Corrective actions and sweep reports
//!
//! Records what each pass decided for each container and how it went.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Action taken on a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Restart an unhealthy container
    Restart { timeout_ms: u64 },
    /// Remove a container that exited cleanly
    Remove,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Restart { timeout_ms } => write!(f, "restart (timeout {}ms)", timeout_ms),
            Action::Remove => write!(f, "remove"),
        }
    }
}

/// Which pass produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    Health,
    Cleanup,
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::Health => write!(f, "health"),
            Pass::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// Result of issuing an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "error", rename_all = "snake_case")]
pub enum Disposition {
    /// The runtime accepted the command
    Applied,
    /// Dry run; nothing was sent
    Planned,
    /// The command failed after retries
    Failed(String),
}

/// One action decision for one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub pass: Pass,
    pub container_id: String,
    pub name: String,
    #[serde(flatten)]
    pub action: Action,
    pub disposition: Disposition,
}

/// A failure that stopped a whole pass (no container) or one container's evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    pub pass: Pass,
    pub container_id: Option<String>,
    pub error: String,
}

/// Everything one sweep did
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub outcomes: Vec<Outcome>,
    pub faults: Vec<Fault>,
}

impl Report {
    pub fn new(started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            started_at,
            dry_run,
            outcomes: Vec::new(),
            faults: Vec::new(),
        }
    }

    /// Number of restart outcomes, whatever their disposition
    pub fn restarts(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.action, Action::Restart { .. }))
            .count()
    }

    /// Number of remove outcomes, whatever their disposition
    pub fn removals(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action == Action::Remove)
            .count()
    }

    /// True when a pass could not list its candidates
    #[cfg(test)]
    pub fn pass_failed(&self, pass: Pass) -> bool {
        self.faults
            .iter()
            .any(|f| f.pass == pass && f.container_id.is_none())
    }

    /// One-line summary for logs and the CLI
    pub fn summary(&self) -> String {
        let failed = self
            .outcomes
            .iter()
            .filter(|o| matches!(o.disposition, Disposition::Failed(_)))
            .count();
        format!(
            "{} restart(s), {} removal(s), {} failed action(s), {} fault(s){}",
            self.restarts(),
            self.removals(),
            failed,
            self.faults.len(),
            if self.dry_run { " [dry run]" } else { "" }
        )
    }
}
