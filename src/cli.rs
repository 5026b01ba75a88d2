//! Command-line interface for mon
//!
//! Uses clap with derive for type-safe CLI parsing. Every option can also be
//! supplied through a `MON_*` environment variable; flags win over the
//! environment.

use clap::builder::BoolishValueParser;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::manifest::Overrides;

/// mon - label-driven container self-healing
#[derive(Parser, Debug)]
#[command(name = "mon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MON_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Docker control socket
    #[arg(long, env = "MON_CONTROL", global = true)]
    pub control: Option<String>,

    /// Docker container prefix to limit observation to
    #[arg(long, env = "MON_PREFIX", global = true)]
    pub prefix: Option<String>,

    /// Interval to poll at (in ms)
    #[arg(long, env = "MON_INTERVAL", global = true)]
    pub interval: Option<u64>,

    /// Max attempts for failed Docker commands
    #[arg(long, env = "MON_RETRIES", global = true)]
    pub retries: Option<u8>,

    /// Only log when action is taken
    #[arg(
        long,
        env = "MON_QUIET",
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub quiet: Option<bool>,

    /// Docker API request timeout (in seconds)
    #[arg(long, env = "MON_API_TIMEOUT", global = true)]
    pub api_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Poll the Docker daemon until SIGTERM (default)
    Watch,

    /// Run a single poll now and print what happened
    Sweep {
        /// Decide but do not restart or remove anything
        #[arg(long)]
        dry_run: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration and print the effective settings
    Check,

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Command to run, `watch` when none was given
    pub fn action(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Watch)
    }

    /// Settings given on the command line or in the environment
    pub fn overrides(&self) -> Overrides {
        Overrides {
            control: self.control.clone(),
            prefix: self.prefix.clone(),
            interval: self.interval,
            retries: self.retries,
            quiet: self.quiet,
            api_timeout: self.api_timeout,
        }
    }

    /// Generate shell completion scripts
    pub fn generate_completion(shell: Shell) {
        let mut cmd = Self::command_factory();
        clap_complete::generate(shell, &mut cmd, "mon", &mut std::io::stdout());
    }

    fn command_factory() -> clap::Command {
        <Self as CommandFactory>::command()
    }
}
