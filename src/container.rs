//! Container runtime access
//!
//! This module provides:
//! - Immutable container snapshots (listing and inspection)
//! - The `RuntimeClient` capability trait the monitor depends on
//! - A bounded retry executor for flaky remote calls
//! - The Docker Engine adapter

pub mod client;
pub mod docker;
pub mod retry;
pub mod types;

#[cfg(test)]
pub mod fake;

// Re-exports
pub use client::RuntimeClient;
pub use docker::DockerRuntime;
pub use retry::Retry;
pub use types::{Container, ContainerState, HealthStatus, Status};
