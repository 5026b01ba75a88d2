//! mon - label-driven container self-healing
//!
//! A sidecar that polls the Docker daemon, restarts containers whose health
//! check failed and removes containers that exited with an expected code.

mod cli;
mod container;
mod error;
mod manifest;
mod sickbay;
mod warden;

use cli::{Cli, Commands};
use container::DockerRuntime;
use error::{Error, Result};
use manifest::Settings;
use sickbay::recovery::Disposition;
use sickbay::{Monitor, Report};

use chrono::Utc;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    match cli.action() {
        Commands::Completion { shell } => {
            Cli::generate_completion(shell);
            Ok(())
        }

        Commands::Check => {
            let settings = load_settings(&cli)?;
            container::docker::Endpoint::parse(&settings.control)?;

            let rendered = toml::to_string_pretty(&settings)
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;
            print!("{}", rendered);
            println!("\nConfiguration OK");
            Ok(())
        }

        Commands::Sweep { dry_run, json } => {
            let settings = load_settings(&cli)?;
            let monitor = build_monitor(&settings)?.dry_run(dry_run);
            let report = monitor.sweep(Utc::now());

            if json {
                let rendered = serde_json::to_string_pretty(&report)
                    .map_err(|e| Error::Io(std::io::Error::other(e)))?;
                println!("{}", rendered);
            } else {
                print_report(&report);
            }
            Ok(())
        }

        Commands::Watch => {
            let settings = load_settings(&cli)?;
            watch(&settings)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    manifest::load(cli.config.as_deref(), &cli.overrides())
}

fn build_monitor(settings: &Settings) -> Result<Monitor<DockerRuntime>> {
    let runtime = DockerRuntime::connect(settings)?;
    Ok(Monitor::new(runtime, settings.label_policy())
        .with_prefix(settings.prefix.clone())
        .quiet(settings.quiet))
}

/// Run the poller until SIGTERM or Ctrl+C
fn watch(settings: &Settings) -> Result<()> {
    tracing::info!(
        "control: '{}', prefix: '{}', interval: {}ms, retries: {}, quiet: {}",
        settings.control,
        settings.prefix,
        settings.interval,
        settings.retries,
        settings.quiet
    );

    let monitor = build_monitor(settings)?;
    let poller = warden::Warden::new(settings.interval, Arc::new(monitor))?;

    // startup errors abort the process
    poller.start()?;

    wait_for_shutdown()?;

    if let Err(e) = poller.stop() {
        tracing::error!("Error on shutdown: {}", e);
    }

    Ok(())
}

fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let mut term = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = term.recv() => tracing::info!("Caught SIGTERM, stopping"),
            res = tokio::signal::ctrl_c() => {
                res?;
                tracing::info!("Caught SIGINT, stopping");
            }
        }

        Ok::<(), std::io::Error>(())
    })?;

    Ok(())
}

fn print_report(report: &Report) {
    if report.outcomes.is_empty() && report.faults.is_empty() {
        println!("Nothing to do");
    }

    for outcome in &report.outcomes {
        let result = match &outcome.disposition {
            Disposition::Applied => "done".to_string(),
            Disposition::Planned => "planned".to_string(),
            Disposition::Failed(e) => format!("failed: {}", e),
        };
        println!(
            "{:<8} {:<14} {:<32} {:<28} {}",
            outcome.pass.to_string(),
            short_id(&outcome.container_id),
            outcome.name,
            outcome.action.to_string(),
            result
        );
    }

    for fault in &report.faults {
        match &fault.container_id {
            Some(id) => eprintln!("{} pass: container {}: {}", fault.pass, short_id(id), fault.error),
            None => eprintln!("{} pass aborted: {}", fault.pass, fault.error),
        }
    }

    println!("{}", report.summary());
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
