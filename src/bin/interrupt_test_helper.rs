//! Test helper binary for interrupt handling tests
//!
//! Runs a settings file like the real binary, with one extra plugin, `wait`,
//! that writes the PID of its shell to `pid_file` and then sleeps for
//! `seconds`. The test harness signals this process mid-run and checks what
//! the interrupt handler left behind.
//!
//! Usage:
//!   interrupt_test_helper <config.yaml>

use std::process::ExitCode;

use backup_orchestrator::command::{argv, run_command};
use backup_orchestrator::{
    OperationConfig, PathContext, Plugin, PluginFactory, ProcessGuard, RunDriver, RunOutcome,
    Settings, ValidationError, builtin_registry,
};

struct Wait {
    pid_file: String,
    seconds: i64,
}

impl Plugin for Wait {
    fn run(&mut self) -> RunOutcome {
        let script = format!("echo $$ > '{}'; exec sleep {}", self.pid_file, self.seconds);
        run_command(&argv(["sh", "-c", script.as_str()]), None)
    }
}

struct WaitFactory;

impl PluginFactory for WaitFactory {
    fn name(&self) -> &str {
        "wait"
    }

    fn description(&self) -> &str {
        "sleeps in a child process"
    }

    fn setup(
        &self,
        _paths: &PathContext,
        _project: &str,
        config: &OperationConfig,
    ) -> Result<Box<dyn Plugin>, ValidationError> {
        Ok(Box::new(Wait {
            pid_file: config.required_str("pid_file")?.to_string(),
            seconds: config.optional_i64("seconds")?.unwrap_or(600),
        }))
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_ansi(false).init();

    let Some(config) = std::env::args().nth(1) else {
        eprintln!("usage: interrupt_test_helper <config.yaml>");
        return ExitCode::FAILURE;
    };

    let driver = Settings::load_from_file(&config)
        .and_then(|settings| {
            let mut registry = builtin_registry()?;
            registry.register(WaitFactory)?;
            RunDriver::new(settings, registry)
        });
    let driver = match driver {
        Ok(driver) => driver,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let _guard = ProcessGuard::new();
    match driver.run_interruptible() {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
