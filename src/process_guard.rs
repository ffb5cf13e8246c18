//! Lifetime of the external tools a run drives
//!
//! rsync, docker, sshfs and friends run as children of the orchestrator.
//! Each one is started as the leader of its own process group and tracked
//! in the global [`ChildRegistry`] for as long as [`ChildRegistration`]
//! lives. When the run is interrupted, or the [`ProcessGuard`] held by the
//! binary goes out of scope, every tracked group gets SIGTERM and, after a
//! grace period, SIGKILL.

use std::collections::BTreeMap;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// Grace period given to children after SIGTERM when a signal arrives
pub const SIGNAL_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Grace period used when a [`ProcessGuard`] is dropped
pub const DROP_GRACE_PERIOD: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Registry shared between the thread running plugins and the signal thread
pub type SharedRegistry = Arc<Mutex<ChildRegistry>>;

static CHILD_REGISTRY: OnceLock<SharedRegistry> = OnceLock::new();

fn lock(registry: &SharedRegistry) -> MutexGuard<'_, ChildRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of [`ChildRegistry::shutdown`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Shutdown {
    /// Groups that exited within the grace period
    pub stopped: usize,
    /// Groups that had to be sent SIGKILL
    pub killed: usize,
}

/// Process groups of the commands currently running, keyed by leader PID
#[derive(Debug, Default)]
pub struct ChildRegistry {
    children: BTreeMap<u32, String>,
    shut_down: bool,
}

impl ChildRegistry {
    /// The registry every plugin command is tracked in
    pub fn global() -> SharedRegistry {
        Arc::clone(CHILD_REGISTRY.get_or_init(SharedRegistry::default))
    }

    /// Track `pid` (running `command`) until the returned handle is dropped.
    pub fn track(registry: &SharedRegistry, pid: u32, command: &str) -> ChildRegistration {
        lock(registry).children.insert(pid, command.to_string());
        tracing::debug!("tracking {} (pid {})", command, pid);
        ChildRegistration {
            registry: Arc::clone(registry),
            pid,
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.children.contains_key(&pid)
    }

    /// Whether [`ChildRegistry::shutdown`] has already run
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Stop every tracked process group.
    ///
    /// SIGTERM goes to each group first. Groups whose leader is still running
    /// once `grace_period` has passed get SIGKILL. Only the first call does
    /// anything; later calls report nothing stopped.
    pub fn shutdown(&mut self, grace_period: Duration) -> Shutdown {
        if self.shut_down {
            return Shutdown::default();
        }
        self.shut_down = true;

        let children = std::mem::take(&mut self.children);
        if children.is_empty() {
            tracing::debug!("no running commands to stop");
            return Shutdown::default();
        }

        for (&pid, command) in &children {
            tracing::info!("stopping {} (pid {})", command, pid);
            signal_group(pid, Signal::SIGTERM);
        }

        let deadline = Instant::now() + grace_period;
        let mut remaining: Vec<u32> = children.keys().copied().collect();
        loop {
            remaining.retain(|&pid| is_running(pid));
            if remaining.is_empty() || Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        for &pid in &remaining {
            let command = children.get(&pid).map(String::as_str).unwrap_or("?");
            tracing::warn!("{} (pid {}) ignored SIGTERM, killing", command, pid);
            signal_group(pid, Signal::SIGKILL);
        }

        Shutdown {
            stopped: children.len() - remaining.len(),
            killed: remaining.len(),
        }
    }
}

/// Removes its PID from the registry when dropped
#[must_use = "the child is untracked as soon as the registration is dropped"]
#[derive(Debug)]
pub struct ChildRegistration {
    registry: SharedRegistry,
    pid: u32,
}

impl ChildRegistration {
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for ChildRegistration {
    fn drop(&mut self) {
        if lock(&self.registry).children.remove(&self.pid).is_some() {
            tracing::debug!("pid {} finished", self.pid);
        }
    }
}

/// Signal the whole group led by `pgid`, or just the leader if it never
/// made it into a group of its own.
fn signal_group(pgid: u32, sig: Signal) {
    let pid = Pid::from_raw(pgid as i32);
    if let Err(e) = signal::killpg(pid, sig).or_else(|_| signal::kill(pid, sig)) {
        tracing::debug!("{} to pid {}: {}", sig.as_str(), pgid, e);
    }
}

/// True while `pid` exists and is neither a zombie nor dead
fn is_running(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return false;
    };
    // The state follows the parenthesised command name, which may hold spaces
    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .is_some_and(|state| !matches!(state, "Z" | "X"))
}

/// Stops every tracked command when dropped.
///
/// The binary holds one for the duration of a run.
pub struct ProcessGuard {
    registry: SharedRegistry,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        let shutdown = lock(&self.registry).shutdown(DROP_GRACE_PERIOD);
        if shutdown != Shutdown::default() {
            tracing::info!(
                "stopped {} command(s), killed {}",
                shutdown.stopped,
                shutdown.killed
            );
        }
    }
}

/// Map a signal number to its name
pub fn signal_name(sig: i32) -> &'static str {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};

    match sig {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        SIGHUP => "SIGHUP",
        _ => "UNKNOWN",
    }
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP.
///
/// When a signal arrives, every tracked command is stopped, then
/// `on_interrupt` is called with the signal name, and the process exits with
/// status `128 + signal`.
pub fn init_signal_handlers<F>(on_interrupt: F) -> Result<(), io::Error>
where
    F: Fn(&'static str) + Send + 'static,
{
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let name = signal_name(sig);
            tracing::warn!("received {}, cleaning up", name);

            // Held until exit: the engine thread blocks on it instead of
            // finishing the interrupted run on its own.
            let global = ChildRegistry::global();
            let mut registry = lock(&global);
            registry.shutdown(SIGNAL_GRACE_PERIOD);

            on_interrupt(name);

            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Spawn configuration for plugin commands
pub trait CommandProcessGroup {
    /// Make the child the leader of a new process group that receives
    /// SIGTERM when the orchestrator dies
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        self.process_group(0);
        // SAFETY: prctl only changes the calling (child) process
        unsafe {
            self.pre_exec(|| {
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_registry() -> SharedRegistry {
        SharedRegistry::default()
    }

    fn wait_until_stopped(pid: u32, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if !is_running(pid) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    // =========================================================================
    // Registration
    // =========================================================================

    #[test]
    fn test_registration_untracks_on_drop() {
        let registry = local_registry();

        let rsync = ChildRegistry::track(&registry, 1234, "rsync");
        let docker = ChildRegistry::track(&registry, 5678, "docker");
        assert_eq!(lock(&registry).len(), 2);
        assert_eq!(rsync.pid(), 1234);

        drop(rsync);
        assert!(!lock(&registry).contains(1234));
        assert!(lock(&registry).contains(5678));

        drop(docker);
        assert!(lock(&registry).is_empty());
    }

    #[test]
    fn test_registration_after_shutdown_is_harmless() {
        let registry = local_registry();
        let shutdown = lock(&registry).shutdown(Duration::from_millis(10));
        assert_eq!(shutdown, Shutdown::default());

        let late = ChildRegistry::track(&registry, 4321, "umount");
        drop(late);
        assert!(lock(&registry).is_empty());
        assert!(lock(&registry).is_shut_down());
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(signal_name(libc::SIGINT), "SIGINT");
        assert_eq!(signal_name(libc::SIGTERM), "SIGTERM");
        assert_eq!(signal_name(libc::SIGHUP), "SIGHUP");
        assert_eq!(signal_name(libc::SIGUSR1), "UNKNOWN");
    }

    // =========================================================================
    // Shutdown of real processes
    // =========================================================================

    #[test]
    fn test_shutdown_stops_whole_group() {
        let mut leader = Command::new("sh")
            .args(["-c", "sleep 60 & wait"])
            .in_new_process_group()
            .spawn()
            .expect("Failed to spawn sh");
        let pid = leader.id();
        let registry = local_registry();
        let _registration = ChildRegistry::track(&registry, pid, "sh");
        assert!(is_running(pid));

        let shutdown = lock(&registry).shutdown(Duration::from_secs(2));
        let _ = leader.wait();

        assert_eq!(shutdown, Shutdown { stopped: 1, killed: 0 });
        assert!(!is_running(pid));
    }

    #[test]
    fn test_shutdown_kills_commands_ignoring_sigterm() {
        let mut leader = Command::new("sh")
            .args(["-c", "trap '' TERM; while :; do sleep 0.1; done"])
            .in_new_process_group()
            .spawn()
            .expect("Failed to spawn sh with trap");
        let pid = leader.id();
        std::thread::sleep(Duration::from_millis(100));

        let registry = local_registry();
        let _registration = ChildRegistry::track(&registry, pid, "sh");
        let shutdown = lock(&registry).shutdown(Duration::from_millis(300));
        let _ = leader.wait();

        assert_eq!(shutdown, Shutdown { stopped: 0, killed: 1 });
        assert!(wait_until_stopped(pid, Duration::from_secs(2)));
    }

    #[test]
    fn test_shutdown_runs_once() {
        let mut finished = Command::new("true").spawn().expect("Failed to spawn true");
        let pid = finished.id();
        let _ = finished.wait();

        let registry = local_registry();
        let _registration = ChildRegistry::track(&registry, pid, "true");

        assert_eq!(
            lock(&registry).shutdown(Duration::from_millis(100)),
            Shutdown { stopped: 1, killed: 0 }
        );
        assert_eq!(lock(&registry).shutdown(Duration::from_millis(100)), Shutdown::default());
    }

    #[test]
    fn test_is_running() {
        assert!(is_running(std::process::id()));
        assert!(!is_running(999_999_999));
    }
}
