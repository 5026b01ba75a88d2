//! Configuration loading for mon
//!
//! Settings are layered, lowest precedence first:
//! built-in defaults, an optional `mon.toml` file, environment variables and
//! command-line flags. clap resolves the last two, so this module only sees
//! them as one set of [`Overrides`].

use crate::error::{Error, Result};
use crate::sickbay::LabelPolicy;
use crate::sickbay::labels::{
    DEFAULT_CLEANUP_EXIT_CODE, DEFAULT_NAMESPACE, DEFAULT_RESTART_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Load settings from an optional file and apply overrides
pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Settings> {
    let base = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|e| Error::ConfigRead {
                path: path.to_path_buf(),
                source: e,
            })?;
            toml::from_str(&content)?
        }
        None => Settings::default(),
    };

    let settings = base.apply(overrides);
    settings.validate()?;

    Ok(settings)
}

/// Effective daemon configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Docker control socket address
    #[serde(default = "default_control")]
    pub control: String,

    /// Only act on containers with a name starting with this (empty = all)
    #[serde(default)]
    pub prefix: String,

    /// Poll interval in milliseconds
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Maximum attempts per Docker API call
    #[serde(default = "default_retries")]
    pub retries: u8,

    /// Only log when action is taken
    #[serde(default)]
    pub quiet: bool,

    /// Docker API request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub api_timeout: u64,

    /// Label taxonomy
    #[serde(default)]
    pub labels: LabelConfig,
}

fn default_control() -> String {
    "unix:///var/run/docker.sock".to_string()
}

fn default_interval() -> u64 {
    5000
}

fn default_retries() -> u8 {
    10
}

fn default_api_timeout() -> u64 {
    120
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            control: default_control(),
            prefix: String::new(),
            interval: default_interval(),
            retries: default_retries(),
            quiet: false,
            api_timeout: default_api_timeout(),
            labels: LabelConfig::default(),
        }
    }
}

/// Label namespace and defaults for the override labels
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LabelConfig {
    /// Prefix of every label key (`<namespace>.observe=1`, ...)
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Restart timeout when `<namespace>.checks.health.timeout` is absent
    #[serde(default = "default_restart_timeout_ms")]
    pub restart_timeout_ms: u64,

    /// Clean exit code when `<namespace>.checks.cleanup.code` is absent
    #[serde(default = "default_cleanup_exit_code")]
    pub cleanup_exit_code: i64,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_restart_timeout_ms() -> u64 {
    DEFAULT_RESTART_TIMEOUT_MS
}

fn default_cleanup_exit_code() -> i64 {
    DEFAULT_CLEANUP_EXIT_CODE
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            restart_timeout_ms: default_restart_timeout_ms(),
            cleanup_exit_code: default_cleanup_exit_code(),
        }
    }
}

/// Values taken from the environment or command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub control: Option<String>,
    pub prefix: Option<String>,
    pub interval: Option<u64>,
    pub retries: Option<u8>,
    pub quiet: Option<bool>,
    pub api_timeout: Option<u64>,
}

impl Settings {
    /// Apply overrides on top of these settings
    pub fn apply(self, overrides: &Overrides) -> Settings {
        Settings {
            control: overrides.control.clone().unwrap_or(self.control),
            prefix: overrides.prefix.clone().unwrap_or(self.prefix),
            interval: overrides.interval.unwrap_or(self.interval),
            retries: overrides.retries.unwrap_or(self.retries),
            quiet: overrides.quiet.unwrap_or(self.quiet),
            api_timeout: overrides.api_timeout.unwrap_or(self.api_timeout),
            labels: self.labels,
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.control.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "control address must not be empty".to_string(),
            ));
        }

        if self.interval == 0 {
            return Err(Error::ConfigValidation(
                "interval must be greater than 0ms".to_string(),
            ));
        }

        if self.retries == 0 {
            return Err(Error::ConfigValidation(
                "retries must be at least 1".to_string(),
            ));
        }

        if self.api_timeout == 0 {
            return Err(Error::ConfigValidation(
                "api_timeout must be greater than 0s".to_string(),
            ));
        }

        let namespace = &self.labels.namespace;
        if namespace.is_empty() || namespace.contains('=') || namespace.ends_with('.') {
            return Err(Error::ConfigValidation(format!(
                "Invalid label namespace '{}'",
                namespace
            )));
        }

        Ok(())
    }

    /// Build the label policy these settings describe
    pub fn label_policy(&self) -> LabelPolicy {
        LabelPolicy::new(&self.labels.namespace)
            .with_restart_timeout_ms(self.labels.restart_timeout_ms)
            .with_cleanup_exit_code(self.labels.cleanup_exit_code)
    }
}
