//! Label taxonomy
//!
//! Containers opt in through labels, and may override the restart timeout and
//! the expected exit code the same way. The vocabulary lives in an immutable
//! [`LabelPolicy`] so alternate namespaces can be configured or injected.

use crate::container::Container;

/// Default label namespace (`mon.observe=1`, `mon.checks.health=1`, ...)
pub const DEFAULT_NAMESPACE: &str = "mon";

/// Default stop timeout for health restarts, in milliseconds
pub const DEFAULT_RESTART_TIMEOUT_MS: u64 = 10_000;

/// Default exit code considered clean by the cleanup pass
pub const DEFAULT_CLEANUP_EXIT_CODE: i64 = 0;

/// A `key=value` selector label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub key: String,
    pub value: String,
}

impl Label {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Selection labels, override keys and defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPolicy {
    observe: Label,
    check_health: Label,
    check_cleanup: Label,
    health_timeout_key: String,
    cleanup_code_key: String,
    default_restart_timeout_ms: u64,
    default_cleanup_exit_code: i64,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl LabelPolicy {
    /// Build the taxonomy under `namespace`
    pub fn new(namespace: &str) -> Self {
        Self {
            observe: Label::new(format!("{}.observe", namespace), "1"),
            check_health: Label::new(format!("{}.checks.health", namespace), "1"),
            check_cleanup: Label::new(format!("{}.checks.cleanup", namespace), "1"),
            health_timeout_key: format!("{}.checks.health.timeout", namespace),
            cleanup_code_key: format!("{}.checks.cleanup.code", namespace),
            default_restart_timeout_ms: DEFAULT_RESTART_TIMEOUT_MS,
            default_cleanup_exit_code: DEFAULT_CLEANUP_EXIT_CODE,
        }
    }

    pub fn with_restart_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_restart_timeout_ms = timeout_ms;
        self
    }

    pub fn with_cleanup_exit_code(mut self, code: i64) -> Self {
        self.default_cleanup_exit_code = code;
        self
    }

    pub fn observe(&self) -> &Label {
        &self.observe
    }

    pub fn check_health(&self) -> &Label {
        &self.check_health
    }

    pub fn check_cleanup(&self) -> &Label {
        &self.check_cleanup
    }

    /// Listing filters for the health pass
    pub fn health_filters(&self) -> Vec<String> {
        vec![self.observe().to_string(), self.check_health().to_string()]
    }

    /// Listing filters for the cleanup pass
    pub fn cleanup_filters(&self) -> Vec<String> {
        vec![self.observe().to_string(), self.check_cleanup().to_string()]
    }

    /// Effective restart timeout for `container`
    pub fn restart_timeout_ms(&self, container: &Container) -> u64 {
        override_value(container, &self.health_timeout_key)
            .unwrap_or(self.default_restart_timeout_ms)
    }

    /// Effective clean exit code for `container`
    pub fn cleanup_exit_code(&self, container: &Container) -> i64 {
        override_value(container, &self.cleanup_code_key)
            .unwrap_or(self.default_cleanup_exit_code)
    }
}

/// Read an integer override label; malformed values are ignored
fn override_value<T: std::str::FromStr>(container: &Container, key: &str) -> Option<T> {
    let raw = container.labels.get(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::debug!(
                "Ignoring malformed label {}='{}' on container {}",
                key,
                raw,
                container.id
            );
            None
        }
    }
}
