//! Docker Engine adapter
//!
//! Implements [`RuntimeClient`] on top of bollard. The adapter owns a
//! single-threaded tokio runtime and blocks on every request so callers stay
//! synchronous. Each request goes through [`Retry`].

use std::collections::HashMap;

use bollard::container::{
    InspectContainerOptions, ListContainersOptions, RemoveContainerOptions,
    RestartContainerOptions,
};
use bollard::models::{ContainerInspectResponse, ContainerSummary, HealthStatusEnum};
use bollard::{API_DEFAULT_VERSION, Docker};
use tokio::runtime::Runtime;

use crate::container::{Container, ContainerState, HealthStatus, Retry, RuntimeClient, Status};
use crate::error::{Error, Result};
use crate::manifest::Settings;

/// Where the Docker daemon listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Path to a Unix domain socket
    Unix(String),
    /// `http://host:port` address
    Http(String),
}

impl Endpoint {
    /// Parse a control address (`unix://`, `tcp://`, `http://` or a bare socket path)
    pub fn parse(addr: &str) -> Result<Self> {
        if let Some(path) = addr.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(Error::ConfigValidation(format!(
                    "Control address '{}' has no socket path",
                    addr
                )));
            }
            return Ok(Endpoint::Unix(path.to_string()));
        }
        if let Some(rest) = addr.strip_prefix("tcp://") {
            return Ok(Endpoint::Http(format!("http://{}", rest)));
        }
        if addr.starts_with("http://") {
            return Ok(Endpoint::Http(addr.to_string()));
        }
        if addr.starts_with('/') {
            return Ok(Endpoint::Unix(addr.to_string()));
        }
        Err(Error::ConfigValidation(format!(
            "Unsupported control address '{}' (expected unix://, tcp:// or http://)",
            addr
        )))
    }
}

/// Docker daemon client with retry on every call
pub struct DockerRuntime {
    docker: Docker,
    rt: Runtime,
    retry: Retry,
}

impl DockerRuntime {
    /// Build a client for the daemon described by `settings`
    ///
    /// No request is made here; an unreachable daemon surfaces on the first poll.
    pub fn connect(settings: &Settings) -> Result<Self> {
        let retry = Retry::new(settings.retries)?;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let docker = {
            let _guard = rt.enter();
            match Endpoint::parse(&settings.control)? {
                Endpoint::Unix(path) => {
                    Docker::connect_with_unix(&path, settings.api_timeout, API_DEFAULT_VERSION)?
                }
                Endpoint::Http(addr) => {
                    Docker::connect_with_http(&addr, settings.api_timeout, API_DEFAULT_VERSION)?
                }
            }
        };

        Ok(Self { docker, rt, retry })
    }
}

impl RuntimeClient for DockerRuntime {
    fn list_containers(&self, label_filters: &[String]) -> Result<Vec<Container>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), label_filters.to_vec());

        let summaries = self.retry.run("list containers", || {
            let options = ListContainersOptions {
                all: true,
                filters: filters.clone(),
                ..Default::default()
            };
            self.rt
                .block_on(self.docker.list_containers(Some(options)))
                .map_err(Error::from)
        })?;

        Ok(summaries.into_iter().map(container_from_summary).collect())
    }

    fn inspect(&self, container: &Container) -> Result<ContainerState> {
        let operation = format!("inspect {}", container.id);
        let response = self.retry.run(&operation, || {
            self.rt
                .block_on(
                    self.docker
                        .inspect_container(&container.id, None::<InspectContainerOptions>),
                )
                .map_err(|e| map_not_found(e, &container.id))
        })?;

        Ok(state_from_inspect(&response))
    }

    fn restart(&self, timeout_ms: u64, container: &Container) -> Result<()> {
        let operation = format!("restart {}", container.id);
        let t = timeout_secs(timeout_ms);
        self.retry.run(&operation, || {
            self.rt
                .block_on(
                    self.docker
                        .restart_container(&container.id, Some(RestartContainerOptions { t })),
                )
                .map_err(|e| map_not_found(e, &container.id))
        })
    }

    fn remove(&self, container: &Container) -> Result<()> {
        let operation = format!("remove {}", container.id);
        self.retry.run(&operation, || {
            self.rt
                .block_on(
                    self.docker
                        .remove_container(&container.id, None::<RemoveContainerOptions>),
                )
                .map_err(|e| map_not_found(e, &container.id))
        })
    }
}

fn map_not_found(err: bollard::errors::Error, id: &str) -> Error {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => Error::NotFound(id.to_string()),
        bollard::errors::Error::RequestTimeoutError => {
            Error::Transport(format!("request for container {} timed out", id))
        }
        other => Error::Docker(other),
    }
}

/// Restart timeout in whole seconds, rounded up so short timeouts are not zero
fn timeout_secs(timeout_ms: u64) -> isize {
    let secs = timeout_ms.div_ceil(1000);
    isize::try_from(secs).unwrap_or(isize::MAX)
}

fn container_from_summary(summary: ContainerSummary) -> Container {
    Container {
        id: summary.id.unwrap_or_default(),
        names: summary
            .names
            .unwrap_or_default()
            .into_iter()
            .map(|n| n.trim_start_matches('/').to_string())
            .collect(),
        labels: summary.labels.unwrap_or_default(),
        status: summary
            .state
            .as_deref()
            .map(Status::from)
            .unwrap_or(Status::Unknown),
    }
}

fn state_from_inspect(response: &ContainerInspectResponse) -> ContainerState {
    let Some(state) = &response.state else {
        return ContainerState::default();
    };

    let health = state
        .health
        .as_ref()
        .and_then(|h| h.status.as_ref())
        .map(|status| match status {
            HealthStatusEnum::HEALTHY => HealthStatus::Healthy,
            HealthStatusEnum::UNHEALTHY => HealthStatus::Unhealthy,
            HealthStatusEnum::STARTING => HealthStatus::Starting,
            HealthStatusEnum::NONE | HealthStatusEnum::EMPTY => HealthStatus::None,
        });

    ContainerState {
        running: state.running.unwrap_or(false),
        restarting: state.restarting.unwrap_or(false),
        exit_code: state.exit_code.unwrap_or(0),
        health,
    }
}
