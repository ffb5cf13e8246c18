//! Blocking subprocess execution for plugins
//!
//! Every external tool a plugin drives goes through [`run_command`], so that:
//!
//! - the child runs in its own process group
//! - it is tracked in [`ChildRegistry::global`] while it runs
//! - failures surface as a [`RunOutcome`] naming the command line

use std::os::unix::process::CommandExt;
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};

use crate::plugin::RunOutcome;
use crate::process_guard::{ChildRegistry, CommandProcessGroup};

/// User and group a command is demoted to before exec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunAs {
    pub uid: u32,
    pub gid: u32,
}

/// Render an argument vector the way it would be typed in a shell
pub fn command_line(args: &[String]) -> String {
    args.join(" ")
}

/// Spawn `args[0]` with the remaining arguments and wait for it.
///
/// Output is captured. The child is tracked in the global registry until it
/// has been reaped.
pub fn execute(args: &[String], run_as: Option<RunAs>) -> Result<Output> {
    let (program, rest) = args.split_first().context("empty command")?;

    let mut cmd = Command::new(program);
    cmd.args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .in_new_process_group();

    if let Some(RunAs { uid, gid }) = run_as {
        cmd.gid(gid).uid(uid);
    }

    let child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {}", program))?;
    let _registration = ChildRegistry::track(&ChildRegistry::global(), child.id(), program);

    child
        .wait_with_output()
        .with_context(|| format!("failed waiting for {}", program))
}

/// Run a command to completion and translate its status into a [`RunOutcome`].
///
/// A nonzero exit, a death by signal or a spawn failure all yield
/// `Failure("Failed: <command line>")`.
pub fn run_command(args: &[String], run_as: Option<RunAs>) -> RunOutcome {
    let line = command_line(args);
    tracing::debug!("running command: {}", line);
    if let Some(run_as) = run_as {
        tracing::debug!("as uid {} gid {}", run_as.uid, run_as.gid);
    }

    match execute(args, run_as) {
        Ok(output) if output.status.success() => RunOutcome::Success,
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            match output.status.code() {
                Some(code) => tracing::error!("{} exited with code {}", line, code),
                None => tracing::error!("{} terminated by signal", line),
            }
            if !stderr.trim().is_empty() {
                tracing::error!("{}", stderr.trim());
            }
            RunOutcome::failure(format!("Failed: {}", line))
        }
        Err(err) => {
            tracing::error!("{:#}", err);
            RunOutcome::failure(format!("Failed: {}", line))
        }
    }
}

/// Build an owned argument vector from string slices
pub fn argv<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}
