//! Container snapshot types
//!
//! Values here are read-only copies of what the runtime reported at the
//! time of the call. They are never cached across polls.

use serde::Serialize;
use std::collections::HashMap;

/// Listed state of a container, as reported by a container listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "created" => Status::Created,
            "running" => Status::Running,
            "paused" => Status::Paused,
            "restarting" => Status::Restarting,
            "removing" => Status::Removing,
            "exited" => Status::Exited,
            "dead" => Status::Dead,
            _ => Status::Unknown,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Created => write!(f, "created"),
            Status::Running => write!(f, "running"),
            Status::Paused => write!(f, "paused"),
            Status::Restarting => write!(f, "restarting"),
            Status::Removing => write!(f, "removing"),
            Status::Exited => write!(f, "exited"),
            Status::Dead => write!(f, "dead"),
            Status::Unknown => write!(f, "unknown"),
        }
    }
}

/// Health status computed by the runtime's own health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Starting,
    /// Health check configured but no status reported
    None,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Starting => write!(f, "starting"),
            HealthStatus::None => write!(f, "none"),
        }
    }
}

/// A container as returned by a listing query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Container {
    /// Opaque runtime identifier
    pub id: String,
    /// Human-readable names, primary first
    pub names: Vec<String>,
    /// Labels, used both for selection and per-container overrides
    pub labels: HashMap<String, String>,
    /// Listed state
    pub status: Status,
}

impl Container {
    /// Primary name, falling back to the id for unnamed containers
    pub fn display_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or(&self.id)
    }

    /// Check whether any name starts with `prefix`
    pub fn has_name_prefix(&self, prefix: &str) -> bool {
        self.names.iter().any(|n| n.starts_with(prefix))
    }
}

#[cfg(test)]
impl Container {
    pub fn new(id: impl Into<String>, status: Status) -> Self {
        Self {
            id: id.into(),
            names: Vec::new(),
            labels: HashMap::new(),
            status,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Detailed state returned by an inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ContainerState {
    pub running: bool,
    pub restarting: bool,
    pub exit_code: i64,
    /// `None` when the container has no health check configured
    pub health: Option<HealthStatus>,
}

impl ContainerState {
    pub fn is_unhealthy(&self) -> bool {
        self.health == Some(HealthStatus::Unhealthy)
    }

    /// Not running and not about to be restarted by the runtime
    pub fn is_settled(&self) -> bool {
        !self.running && !self.restarting
    }
}

#[cfg(test)]
impl ContainerState {
    /// Running container with the given health
    pub fn running(health: HealthStatus) -> Self {
        Self {
            running: true,
            health: Some(health),
            ..Default::default()
        }
    }

    /// Stopped container that exited with `exit_code`
    pub fn exited(exit_code: i64) -> Self {
        Self {
            exit_code,
            ..Default::default()
        }
    }
}
