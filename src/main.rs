//! backup-orchestrator - Main entry point

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use backup_orchestrator::cli::{Cli, Commands};
use backup_orchestrator::plugins::{builtin_registry, describe};
use backup_orchestrator::{ProcessGuard, RunDriver, Settings};

/// Initialize logging; `RUST_LOG` overrides the level picked by `--debug`
fn init_logger(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn settings_file(cli: &Cli) -> Result<&PathBuf> {
    cli.file
        .as_ref()
        .context("no settings file given (use -f/--file)")
}

fn load_driver(cli: &Cli) -> Result<RunDriver> {
    let path = settings_file(cli)?;
    info!("loading settings: {}", path.display());
    let settings = Settings::load_from_file(path)?;
    let registry = builtin_registry()?;
    let driver = RunDriver::new(settings, registry)?;
    debug!("notifiers: {:?}", driver.notifiers());
    Ok(driver)
}

fn run(cli: &Cli) -> Result<ExitCode> {
    match cli.command() {
        Commands::Plugins => {
            for line in describe(&builtin_registry()?) {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate => {
            let driver = load_driver(cli)?;
            let set = driver.validate()?;
            for project in set.projects() {
                let keys: Vec<&str> = project.operation_keys().collect();
                println!("{}: {}", project.name(), keys.join(", "));
            }
            info!("settings are valid ({} projects)", set.len());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run => {
            let driver = load_driver(cli)?;
            let _guard = ProcessGuard::new();
            let report = driver.run_interruptible()?;
            if report.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logger(cli.debug);
    debug!("CLI arguments parsed: {:?}", cli);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
