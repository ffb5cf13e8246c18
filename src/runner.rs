//! Run driver
//!
//! Ties settings, the plugin registry, the path context and the notifiers
//! together for one invocation. The driver owns every process-wide decision
//! the engine refuses to make: cleanup of run artifacts, what gets notified
//! and how an interrupted run is reported.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::notify::NotifierHolder;
use crate::paths::PathContext;
use crate::plugin::{PluginRegistry, RunOutcome};
use crate::process_guard::init_signal_handlers;
use crate::project::{ProjectSet, RunObserver, RunReport};
use crate::settings::Settings;

/// Last project/operation the engine reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub project: String,
    pub operation: Option<(String, String)>,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operation {
            Some((key, plugin)) => write!(f, "{}: {} ({})", self.project, key, plugin),
            None => write!(f, "{}", self.project),
        }
    }
}

/// Shared record of run progress.
///
/// Clones share state, so the signal handler can read what the engine thread
/// last reported.
#[derive(Debug, Clone, Default)]
pub struct RunTracker {
    position: Arc<Mutex<Option<Position>>>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent position, if the run got anywhere
    pub fn position(&self) -> Option<Position> {
        self.position.lock().ok().and_then(|p| p.clone())
    }

    fn set(&self, position: Position) {
        if let Ok(mut current) = self.position.lock() {
            *current = Some(position);
        }
    }
}

impl RunObserver for RunTracker {
    fn project_started(&mut self, project: &str) {
        self.set(Position {
            project: project.to_string(),
            operation: None,
        });
    }

    fn operation_started(&mut self, project: &str, operation: &str, plugin: &str) {
        self.set(Position {
            project: project.to_string(),
            operation: Some((operation.to_string(), plugin.to_string())),
        });
    }

    fn project_finished(&mut self, project: &str, outcome: &RunOutcome) {
        if outcome.is_success() {
            tracing::debug!("{}: finished", project);
        }
    }
}

/// Remove this run's directory and archive when `enabled`.
///
/// Problems are logged; cleanup never changes the outcome of a run.
pub fn clean_up(paths: &PathContext, enabled: bool) {
    if !enabled {
        tracing::info!("leaving run artifacts in place: {}", paths.run_path().display());
        return;
    }
    if let Err(e) = paths.remove_run_artifacts() {
        tracing::error!("cleanup of {} failed: {}", paths.run_path().display(), e);
    }
}

/// Message sent when a signal interrupts the run
pub fn interrupt_message(signal: &str, position: Option<&Position>) -> String {
    match position {
        Some(position) => format!("interrupted by {} during {}", signal, position),
        None => format!("interrupted by {}", signal),
    }
}

/// Everything needed to carry out one invocation
pub struct RunDriver {
    settings: Settings,
    registry: PluginRegistry,
    notifiers: Arc<NotifierHolder>,
}

impl RunDriver {
    /// Build the driver, validating every configured notifier.
    ///
    /// Nothing is created on disk here, so a bad notifier section fails the
    /// invocation before any run directory exists.
    pub fn new(settings: Settings, registry: PluginRegistry) -> Result<Self> {
        let mut notifiers = NotifierHolder::new();
        notifiers.add_console();
        for (name, value) in &settings.notifiers {
            notifiers.add(name, value)?;
        }
        Ok(Self::with_notifiers(settings, registry, notifiers))
    }

    /// Build the driver around an existing notifier set
    pub fn with_notifiers(
        settings: Settings,
        registry: PluginRegistry,
        notifiers: NotifierHolder,
    ) -> Self {
        Self {
            settings,
            registry,
            notifiers: Arc::new(notifiers),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn notifiers(&self) -> &NotifierHolder {
        &self.notifiers
    }

    /// Perform a full run without touching signal dispositions.
    pub fn run(&self) -> Result<RunReport> {
        self.execute(false)
    }

    /// Perform a full run with SIGINT, SIGTERM and SIGHUP handlers installed.
    ///
    /// On a signal the handler terminates child processes, notifies, cleans
    /// up and exits the process with `128 + signal`.
    pub fn run_interruptible(&self) -> Result<RunReport> {
        self.execute(true)
    }

    fn execute(&self, interruptible: bool) -> Result<RunReport> {
        let clean = self.settings.backup.clean_on_failure;

        let paths = match PathContext::create(&self.settings.backup.path) {
            Ok(paths) => paths,
            Err(e) => {
                self.notifiers.failure(&e.to_string());
                return Err(e);
            }
        };
        tracing::info!("backup run: {}", paths.run_path().display());

        let tracker = RunTracker::new();

        if interruptible {
            let notifiers = Arc::clone(&self.notifiers);
            let handler_paths = paths.clone();
            let handler_tracker = tracker.clone();
            let installed = init_signal_handlers(move |signal| {
                let msg = interrupt_message(signal, handler_tracker.position().as_ref());
                notifiers.failure(&msg);
                clean_up(&handler_paths, clean);
            });
            if let Err(e) = installed {
                self.notifiers.failure(&format!("signal handlers: {}", e));
                clean_up(&paths, clean);
                return Err(e.into());
            }
        }

        let projects = &self.settings.backup.projects;
        let mut set = match ProjectSet::setup(&paths, &self.registry, projects) {
            Ok(set) => set,
            Err(e) => {
                self.notifiers.failure(&e.to_string());
                clean_up(&paths, clean);
                return Err(e.into());
            }
        };

        self.notifiers
            .info(&format!("starting backup {} ({} projects)", paths.run_name(), set.len()));

        let report = set.run_observed(&mut tracker.clone());
        if report.is_success() {
            self.notifiers
                .success(&format!("backup {} completed", paths.run_name()));
        } else {
            self.notifiers.failure(&report.to_string());
            clean_up(&paths, clean);
        }

        Ok(report)
    }

    /// Build the project set without running it.
    ///
    /// A throwaway run directory is derived for the factories and removed
    /// again before returning.
    pub fn validate(&self) -> Result<ProjectSet> {
        let paths = PathContext::create(&self.settings.backup.path)?;
        let result = ProjectSet::setup(&paths, &self.registry, &self.settings.backup.projects);
        clean_up(&paths, true);
        Ok(result?)
    }
}

impl fmt::Debug for RunDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunDriver")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("notifiers", &self.notifiers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_records_latest_position() {
        let tracker = RunTracker::new();
        assert_eq!(tracker.position(), None);

        let mut observer = tracker.clone();
        observer.project_started("web");
        assert_eq!(tracker.position().unwrap().to_string(), "web");

        observer.operation_started("web", "stop", "docker");
        assert_eq!(tracker.position().unwrap().to_string(), "web: stop (docker)");
    }

    #[test]
    fn test_interrupt_message() {
        let position = Position {
            project: "db".to_string(),
            operation: Some(("copy".to_string(), "local_rsync".to_string())),
        };
        assert_eq!(
            interrupt_message("SIGTERM", Some(&position)),
            "interrupted by SIGTERM during db: copy (local_rsync)"
        );
        assert_eq!(interrupt_message("SIGINT", None), "interrupted by SIGINT");
    }

    #[test]
    fn test_clean_up_respects_flag() {
        let root = tempfile::tempdir().unwrap();
        let paths = PathContext::derive(root.path(), "run").unwrap();

        clean_up(&paths, false);
        assert!(paths.run_path().exists());

        clean_up(&paths, true);
        assert!(!paths.run_path().exists());
    }
}
