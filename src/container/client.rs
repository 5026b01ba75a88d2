//! Runtime capability interface
//!
//! The monitor only ever talks to the runtime through this trait, so the
//! Docker adapter and the in-memory test double are interchangeable.

use crate::container::types::{Container, ContainerState};
use crate::error::Result;
use std::sync::Arc;

/// Operations the monitor needs from a container runtime
///
/// All calls block until the runtime answers. Restart and remove are assumed
/// safe to re-issue after a transient failure.
pub trait RuntimeClient: Send + Sync {
    /// List all containers (running or not) carrying every `key=value` label
    fn list_containers(&self, label_filters: &[String]) -> Result<Vec<Container>>;

    /// Fetch the detailed state of a container
    fn inspect(&self, container: &Container) -> Result<ContainerState>;

    /// Restart a container, allowing `timeout_ms` for it to stop
    fn restart(&self, timeout_ms: u64, container: &Container) -> Result<()>;

    /// Remove a stopped container
    fn remove(&self, container: &Container) -> Result<()>;
}

impl<T: RuntimeClient + ?Sized> RuntimeClient for Arc<T> {
    fn list_containers(&self, label_filters: &[String]) -> Result<Vec<Container>> {
        (**self).list_containers(label_filters)
    }

    fn inspect(&self, container: &Container) -> Result<ContainerState> {
        (**self).inspect(container)
    }

    fn restart(&self, timeout_ms: u64, container: &Container) -> Result<()> {
        (**self).restart(timeout_ms, container)
    }

    fn remove(&self, container: &Container) -> Result<()> {
        (**self).remove(container)
    }
}
