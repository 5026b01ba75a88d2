//! Unified error types for mon

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mon operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Config errors
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    // Poller lifecycle errors
    #[error("Poller is already running")]
    AlreadyRunning,

    #[error("Poller is not running")]
    NotRunning,

    #[error("Poller worker thread panicked")]
    WorkerPanicked,

    // Runtime errors
    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Container '{0}' not found")]
    NotFound(String),

    #[error("{operation} failed after {attempts} attempt(s): {last}")]
    RetryExhausted {
        operation: String,
        attempts: u8,
        last: String,
    },
}

impl Error {
    /// Errors that cannot succeed on a later attempt
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::ConfigValidation(_) | Error::ConfigParse(_)
        )
    }
}

/// Result type alias for mon operations
pub type Result<T> = std::result::Result<T, Error>;
