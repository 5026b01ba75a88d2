//! Health and cleanup passes
//!
//! Each poll runs two independent passes over the containers selected by
//! label filters:
//! - health: restart running containers the runtime reports as unhealthy
//! - cleanup: remove exited containers whose exit code matches the expected one
//!
//! Listing is cheap and returns only the listed state, so the detailed
//! inspection is issued only for containers already in the state of interest.

use chrono::{DateTime, Utc};

use crate::container::{Container, RuntimeClient, Status};
use crate::error::Result;
use crate::sickbay::labels::LabelPolicy;
use crate::sickbay::recovery::{Action, Disposition, Fault, Outcome, Pass, Report};
use crate::warden::PollHandler;

/// Decision engine driven by the poller
pub struct Monitor<C> {
    client: C,
    policy: LabelPolicy,
    /// Only containers with a name starting with this are considered
    prefix: Option<String>,
    quiet: bool,
    dry_run: bool,
}

impl<C: RuntimeClient> Monitor<C> {
    pub fn new(client: C, policy: LabelPolicy) -> Self {
        Self {
            client,
            policy,
            prefix: None,
            quiet: false,
            dry_run: false,
        }
    }

    /// Restrict actions to containers with a name starting with `prefix`
    ///
    /// An empty prefix disables the gate.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Demote per-tick start/end logs to debug
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Decide without issuing restart/remove commands
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the health pass then the cleanup pass
    pub fn sweep(&self, now: DateTime<Utc>) -> Report {
        if self.quiet {
            tracing::debug!("Check start for {}", now);
        } else {
            tracing::info!("Check start for {}", now);
        }

        let mut report = Report::new(now, self.dry_run);

        if let Err(e) = self.handle_health(&mut report) {
            tracing::error!("Health pass aborted: {}", e);
            report.faults.push(Fault {
                pass: Pass::Health,
                container_id: None,
                error: e.to_string(),
            });
        }

        if let Err(e) = self.handle_cleanup(&mut report) {
            tracing::error!("Cleanup pass aborted: {}", e);
            report.faults.push(Fault {
                pass: Pass::Cleanup,
                container_id: None,
                error: e.to_string(),
            });
        }

        if self.quiet {
            tracing::debug!("Check end for {}: {}", now, report.summary());
        } else {
            tracing::info!("Check end for {}: {}", now, report.summary());
        }

        report
    }

    /// Restart running containers that report an unhealthy status
    fn handle_health(&self, report: &mut Report) -> Result<()> {
        let containers = self.client.list_containers(&self.policy.health_filters())?;

        for cont in &containers {
            if !self.admits(cont) {
                continue;
            }

            let timeout_ms = self.policy.restart_timeout_ms(cont);

            if cont.status != Status::Running {
                tracing::debug!(
                    "Skipping {} ({}): listed as {}",
                    cont.id,
                    cont.display_name(),
                    cont.status
                );
                continue;
            }

            let state = match self.client.inspect(cont) {
                Ok(state) => state,
                Err(e) => {
                    self.record_inspect_failure(report, Pass::Health, cont, e);
                    continue;
                }
            };

            if state.running && state.is_unhealthy() {
                tracing::info!(
                    "Found unhealthy running container: {} ({})",
                    cont.id,
                    cont.display_name()
                );
                self.apply(report, Pass::Health, cont, Action::Restart { timeout_ms });
            }
        }

        Ok(())
    }

    /// Remove exited containers whose exit code is the expected one
    fn handle_cleanup(&self, report: &mut Report) -> Result<()> {
        let containers = self.client.list_containers(&self.policy.cleanup_filters())?;

        for cont in &containers {
            if !self.admits(cont) {
                continue;
            }

            let expected = self.policy.cleanup_exit_code(cont);

            if cont.status != Status::Exited {
                tracing::debug!(
                    "Skipping {} ({}): listed as {}",
                    cont.id,
                    cont.display_name(),
                    cont.status
                );
                continue;
            }

            let state = match self.client.inspect(cont) {
                Ok(state) => state,
                Err(e) => {
                    self.record_inspect_failure(report, Pass::Cleanup, cont, e);
                    continue;
                }
            };

            // the runtime may have restarted it between listing and inspection
            if state.is_settled() && state.exit_code == expected {
                tracing::info!(
                    "Found container to cleanup: {} ({})",
                    cont.id,
                    cont.display_name()
                );
                self.apply(report, Pass::Cleanup, cont, Action::Remove);
            }
        }

        Ok(())
    }

    fn admits(&self, cont: &Container) -> bool {
        match &self.prefix {
            Some(prefix) => cont.has_name_prefix(prefix),
            None => true,
        }
    }

    fn apply(&self, report: &mut Report, pass: Pass, cont: &Container, action: Action) {
        let disposition = if self.dry_run {
            tracing::info!("Dry run: would {} {} ({})", action, cont.id, cont.display_name());
            Disposition::Planned
        } else {
            let result = match action {
                Action::Restart { timeout_ms } => self.client.restart(timeout_ms, cont),
                Action::Remove => self.client.remove(cont),
            };
            match result {
                Ok(()) => Disposition::Applied,
                Err(e) => {
                    tracing::error!(
                        "Failed to {} container {} ({}): {}",
                        action,
                        cont.id,
                        cont.display_name(),
                        e
                    );
                    Disposition::Failed(e.to_string())
                }
            }
        };

        report.outcomes.push(Outcome {
            pass,
            container_id: cont.id.clone(),
            name: cont.display_name().to_string(),
            action,
            disposition,
        });
    }

    fn record_inspect_failure(
        &self,
        report: &mut Report,
        pass: Pass,
        cont: &Container,
        err: crate::error::Error,
    ) {
        tracing::warn!(
            "Failed to inspect container {} ({}): {}",
            cont.id,
            cont.display_name(),
            err
        );
        report.faults.push(Fault {
            pass,
            container_id: Some(cont.id.clone()),
            error: err.to_string(),
        });
    }
}

impl<C: RuntimeClient> PollHandler for Monitor<C> {
    fn poll(&self, now: DateTime<Utc>) {
        self.sweep(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerState;
    use crate::container::HealthStatus;
    use crate::container::fake::FakeRuntime;
    use crate::sickbay::labels::DEFAULT_RESTART_TIMEOUT_MS;
    use std::sync::Arc;

    const TEST_PREFIX: &str = "test_cont";

    fn health_labelled(id: &str, name: &str) -> Container {
        Container::new(id, Status::Running)
            .name(name)
            .label("mon.observe", "1")
            .label("mon.checks.health", "1")
    }

    fn cleanup_labelled(id: &str, name: &str) -> Container {
        Container::new(id, Status::Exited)
            .name(name)
            .label("mon.observe", "1")
            .label("mon.checks.cleanup", "1")
    }

    fn unhealthy_runtime() -> FakeRuntime {
        FakeRuntime::new()
            .with_container(
                health_labelled("abc123", "test_conttest-container-1")
                    .label("mon.checks.health.timeout", "1337"),
                ContainerState::running(HealthStatus::Unhealthy),
            )
            .with_container(
                health_labelled("def123", "test-container-2"),
                ContainerState::running(HealthStatus::Unhealthy),
            )
            .with_container(
                health_labelled("ghi123", "test_conttest-container-3"),
                ContainerState::running(HealthStatus::Unhealthy),
            )
            .with_container(
                health_labelled("jkl123", "test_conttest-container-4"),
                ContainerState::running(HealthStatus::Healthy),
            )
    }

    fn dirty_runtime() -> FakeRuntime {
        FakeRuntime::new()
            .with_container(
                cleanup_labelled("abc123", "test_conttest-container-1"),
                ContainerState::exited(0),
            )
            .with_container(
                cleanup_labelled("def123", "test_conttest-container-2"),
                ContainerState::exited(2),
            )
            .with_container(
                cleanup_labelled("ghi123", "test_conttest-container-3")
                    .label("mon.checks.cleanup.code", "3"),
                ContainerState::exited(3),
            )
    }

    fn monitor(fake: &Arc<FakeRuntime>) -> Monitor<Arc<FakeRuntime>> {
        Monitor::new(Arc::clone(fake), LabelPolicy::default()).with_prefix(TEST_PREFIX)
    }

    #[test]
    fn test_health_restarts_unhealthy() {
        let fake = Arc::new(unhealthy_runtime());
        let report = monitor(&fake).sweep(Utc::now());

        let calls = fake.calls();
        assert_eq!(calls.list.len(), 2);
        assert_eq!(calls.list[0], vec!["mon.observe=1", "mon.checks.health=1"]);
        assert_eq!(
            calls.restart,
            vec![
                (1337, "abc123".to_string()),
                (DEFAULT_RESTART_TIMEOUT_MS, "ghi123".to_string()),
            ]
        );
        assert!(calls.remove.is_empty());
        assert_eq!(report.restarts(), 2);
        assert!(report.faults.is_empty());
    }

    #[test]
    fn test_health_list_error() {
        let fake = Arc::new(unhealthy_runtime().failing_list("mon.checks.health=1"));
        let report = monitor(&fake).sweep(Utc::now());

        let calls = fake.calls();
        assert!(calls.restart.is_empty());
        assert!(calls.remove.is_empty());
        assert!(calls.inspect.is_empty());
        // cleanup pass still lists
        assert_eq!(calls.list.len(), 2);
        assert_eq!(calls.list[1], vec!["mon.observe=1", "mon.checks.cleanup=1"]);
        assert!(report.pass_failed(Pass::Health));
        assert!(!report.pass_failed(Pass::Cleanup));
    }

    #[test]
    fn test_health_restart_failure_continues() {
        let fake = Arc::new(unhealthy_runtime().failing_restart());
        let report = monitor(&fake).sweep(Utc::now());

        let calls = fake.calls();
        assert_eq!(calls.restart.len(), 2);
        assert!(calls.remove.is_empty());
        assert!(
            report
                .outcomes
                .iter()
                .all(|o| matches!(o.disposition, Disposition::Failed(_)))
        );
    }

    #[test]
    fn test_health_inspects_only_running() {
        let fake = Arc::new(
            FakeRuntime::new()
                .with_container(
                    health_labelled("run1", "test_cont-a"),
                    ContainerState::running(HealthStatus::Unhealthy),
                )
                .with_container(
                    Container {
                        status: Status::Exited,
                        ..health_labelled("exit1", "test_cont-b")
                    },
                    ContainerState::running(HealthStatus::Unhealthy),
                )
                .with_container(
                    Container {
                        status: Status::Paused,
                        ..health_labelled("pause1", "test_cont-c")
                    },
                    ContainerState::running(HealthStatus::Unhealthy),
                ),
        );
        monitor(&fake).sweep(Utc::now());

        let calls = fake.calls();
        assert_eq!(calls.inspect, vec!["run1"]);
        assert_eq!(calls.restart, vec![(DEFAULT_RESTART_TIMEOUT_MS, "run1".to_string())]);
    }

    #[test]
    fn test_health_inspect_failure_skips_container() {
        let fake = Arc::new(unhealthy_runtime().failing_inspect("abc123"));
        let report = monitor(&fake).sweep(Utc::now());

        let calls = fake.calls();
        assert_eq!(calls.restart, vec![(DEFAULT_RESTART_TIMEOUT_MS, "ghi123".to_string())]);
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].container_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_health_ignores_starting_and_missing_health() {
        let fake = Arc::new(
            FakeRuntime::new()
                .with_container(
                    health_labelled("a", "test_cont-a"),
                    ContainerState::running(HealthStatus::Starting),
                )
                .with_container(
                    health_labelled("b", "test_cont-b"),
                    ContainerState {
                        running: true,
                        ..Default::default()
                    },
                ),
        );
        monitor(&fake).sweep(Utc::now());

        assert!(fake.calls().restart.is_empty());
    }

    #[test]
    fn test_cleanup_removes_expected_exit() {
        let fake = Arc::new(dirty_runtime());
        let report = monitor(&fake).sweep(Utc::now());

        let calls = fake.calls();
        assert_eq!(calls.list.len(), 2);
        assert_eq!(calls.list[1], vec!["mon.observe=1", "mon.checks.cleanup=1"]);
        assert!(calls.restart.is_empty());
        assert_eq!(calls.remove, vec!["abc123", "ghi123"]);
        assert_eq!(report.removals(), 2);
    }

    #[test]
    fn test_cleanup_skips_unprefixed() {
        let fake = Arc::new(FakeRuntime::new().with_container(
            cleanup_labelled("def123", "test-container-2"),
            ContainerState::exited(0),
        ));
        let report = monitor(&fake).sweep(Utc::now());

        let calls = fake.calls();
        assert!(calls.inspect.is_empty());
        assert!(calls.remove.is_empty());
        assert_eq!(report.removals(), 0);
    }

    #[test]
    fn test_cleanup_list_error() {
        let fake = Arc::new(dirty_runtime().failing_list("mon.checks.cleanup=1"));
        let report = monitor(&fake).sweep(Utc::now());

        let calls = fake.calls();
        assert_eq!(calls.list.len(), 2);
        assert!(calls.remove.is_empty());
        assert!(calls.restart.is_empty());
        assert!(report.pass_failed(Pass::Cleanup));
    }

    #[test]
    fn test_cleanup_remove_failure_continues() {
        let fake = Arc::new(dirty_runtime().failing_remove());
        monitor(&fake).sweep(Utc::now());

        let calls = fake.calls();
        assert_eq!(calls.remove.len(), 2);
        assert!(calls.restart.is_empty());
    }

    #[test]
    fn test_cleanup_skips_restarting() {
        let fake = Arc::new(FakeRuntime::new().with_container(
            cleanup_labelled("abc", "test_cont-a"),
            ContainerState {
                restarting: true,
                ..ContainerState::exited(0)
            },
        ));
        monitor(&fake).sweep(Utc::now());

        let calls = fake.calls();
        assert_eq!(calls.inspect, vec!["abc"]);
        assert!(calls.remove.is_empty());
    }

    #[test]
    fn test_cleanup_inspects_only_exited() {
        let fake = Arc::new(FakeRuntime::new().with_container(
            Container {
                status: Status::Running,
                ..cleanup_labelled("abc", "test_cont-a")
            },
            ContainerState::exited(0),
        ));
        monitor(&fake).sweep(Utc::now());

        let calls = fake.calls();
        assert!(calls.inspect.is_empty());
        assert!(calls.remove.is_empty());
    }

    #[test]
    fn test_unobserved_never_touched() {
        let fake = Arc::new(
            FakeRuntime::new()
                .with_container(
                    Container::new("h", Status::Running)
                        .name("test_cont-h")
                        .label("mon.checks.health", "1"),
                    ContainerState::running(HealthStatus::Unhealthy),
                )
                .with_container(
                    Container::new("c", Status::Exited)
                        .name("test_cont-c")
                        .label("mon.observe", "0")
                        .label("mon.checks.cleanup", "1"),
                    ContainerState::exited(0),
                ),
        );
        monitor(&fake).sweep(Utc::now());

        let calls = fake.calls();
        assert!(calls.inspect.is_empty());
        assert!(calls.restart.is_empty());
        assert!(calls.remove.is_empty());
    }

    #[test]
    fn test_no_prefix_admits_all() {
        let fake = Arc::new(unhealthy_runtime());
        Monitor::new(Arc::clone(&fake), LabelPolicy::default()).sweep(Utc::now());

        let restarted: Vec<String> = fake.calls().restart.into_iter().map(|(_, id)| id).collect();
        assert_eq!(restarted, vec!["abc123", "def123", "ghi123"]);
    }

    #[test]
    fn test_dry_run_issues_nothing() {
        let fake = Arc::new(
            FakeRuntime::new()
                .with_container(
                    health_labelled("h", "test_cont-h"),
                    ContainerState::running(HealthStatus::Unhealthy),
                )
                .with_container(cleanup_labelled("c", "test_cont-c"), ContainerState::exited(0)),
        );
        let report = monitor(&fake).dry_run(true).sweep(Utc::now());

        let calls = fake.calls();
        assert_eq!(calls.inspect, vec!["h", "c"]);
        assert!(calls.restart.is_empty());
        assert!(calls.remove.is_empty());
        assert!(report.dry_run);
        assert_eq!(report.outcomes.len(), 2);
        assert!(
            report
                .outcomes
                .iter()
                .all(|o| o.disposition == Disposition::Planned)
        );
    }

    #[test]
    fn test_alternate_taxonomy() {
        let fake = Arc::new(FakeRuntime::new().with_container(
            Container::new("abc", Status::Exited)
                .name("job")
                .label("acme.observe", "1")
                .label("acme.checks.cleanup", "1")
                .label("acme.checks.cleanup.code", "7"),
            ContainerState::exited(7),
        ));
        Monitor::new(Arc::clone(&fake), LabelPolicy::new("acme")).sweep(Utc::now());

        let calls = fake.calls();
        assert_eq!(calls.list[0], vec!["acme.observe=1", "acme.checks.health=1"]);
        assert_eq!(calls.remove, vec!["abc"]);
    }

    #[test]
    fn test_poll_runs_both_passes_on_failure() {
        let fake = Arc::new(
            FakeRuntime::new()
                .failing_list("mon.checks.health=1")
                .failing_list("mon.checks.cleanup=1"),
        );
        monitor(&fake).quiet(true).poll(Utc::now());

        let calls = fake.calls();
        assert_eq!(calls.list.len(), 2);
        assert!(calls.restart.is_empty());
        assert!(calls.remove.is_empty());
    }
}
