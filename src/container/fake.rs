//! In-memory runtime for tests
//!
//! Listing honors `key=value` label filters the way the Docker daemon does, so
//! containers without the required labels are never returned. Every call is
//! recorded for later assertions.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::container::client::RuntimeClient;
use crate::container::types::{Container, ContainerState};
use crate::error::{Error, Result};

/// Calls observed by a [`FakeRuntime`]
#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub list: Vec<Vec<String>>,
    pub inspect: Vec<String>,
    pub restart: Vec<(u64, String)>,
    pub remove: Vec<String>,
}

struct Entry {
    container: Container,
    state: ContainerState,
}

/// Scriptable runtime double
#[derive(Default)]
pub struct FakeRuntime {
    entries: Vec<Entry>,
    /// Listing fails when the filter set contains any of these labels
    fail_list_on: Vec<String>,
    fail_inspect: HashSet<String>,
    fail_restart: bool,
    fail_remove: bool,
    calls: Mutex<Calls>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a container with the state an inspection will report
    pub fn with_container(mut self, container: Container, state: ContainerState) -> Self {
        self.entries.push(Entry { container, state });
        self
    }

    /// Fail every listing whose filters include `label`
    pub fn failing_list(mut self, label: &str) -> Self {
        self.fail_list_on.push(label.to_string());
        self
    }

    pub fn failing_inspect(mut self, id: &str) -> Self {
        self.fail_inspect.insert(id.to_string());
        self
    }

    pub fn failing_restart(mut self) -> Self {
        self.fail_restart = true;
        self
    }

    pub fn failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    /// Snapshot of the calls made so far
    pub fn calls(&self) -> Calls {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn matches_filters(container: &Container, filters: &[String]) -> bool {
    filters.iter().all(|filter| match filter.split_once('=') {
        Some((key, value)) => container.labels.get(key).map(String::as_str) == Some(value),
        None => container.labels.contains_key(filter.as_str()),
    })
}

impl RuntimeClient for FakeRuntime {
    fn list_containers(&self, label_filters: &[String]) -> Result<Vec<Container>> {
        self.lock().list.push(label_filters.to_vec());

        if label_filters.iter().any(|f| self.fail_list_on.contains(f)) {
            return Err(Error::Transport("test list failure".to_string()));
        }

        Ok(self
            .entries
            .iter()
            .filter(|e| matches_filters(&e.container, label_filters))
            .map(|e| e.container.clone())
            .collect())
    }

    fn inspect(&self, container: &Container) -> Result<ContainerState> {
        self.lock().inspect.push(container.id.clone());

        if self.fail_inspect.contains(&container.id) {
            return Err(Error::Transport("test inspect failure".to_string()));
        }

        self.entries
            .iter()
            .find(|e| e.container.id == container.id)
            .map(|e| e.state)
            .ok_or_else(|| Error::NotFound(container.id.clone()))
    }

    fn restart(&self, timeout_ms: u64, container: &Container) -> Result<()> {
        self.lock().restart.push((timeout_ms, container.id.clone()));

        if self.fail_restart {
            return Err(Error::Transport("test restart failure".to_string()));
        }
        Ok(())
    }

    fn remove(&self, container: &Container) -> Result<()> {
        self.lock().remove.push(container.id.clone());

        if self.fail_remove {
            return Err(Error::Transport("test remove failure".to_string()));
        }
        Ok(())
    }
}
