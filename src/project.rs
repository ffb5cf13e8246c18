//! Project execution engine
//!
//! A [`Project`] is an ordered chain of bound plugins. A [`ProjectSet`] is the
//! ordered collection of every configured project. Both are built eagerly:
//! every operation of every project is validated before anything runs, and a
//! single problem aborts construction of the whole set.
//!
//! # Project lifecycle
//!
//! ```text
//! (settings) --setup--> Configured --run--> Succeeded
//!                                     \---> Failed
//! ```
//!
//! There is no transition back. Running stops at the first failing operation
//! and the set stops at the first failing project.

use std::collections::HashSet;
use std::fmt;

use crate::error::ConfigError;
use crate::paths::{PathContext, is_plain_name};
use crate::plugin::{Plugin, PluginRegistry, RunOutcome};
use crate::settings::{OperationSettings, ProjectSettings};

/// Passive hooks called while a project set runs.
///
/// Observers see progress; they cannot influence control flow.
pub trait RunObserver {
    fn project_started(&mut self, _project: &str) {}

    fn operation_started(&mut self, _project: &str, _operation: &str, _plugin: &str) {}

    fn project_finished(&mut self, _project: &str, _outcome: &RunOutcome) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Where a project is in its single-use lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectState {
    Configured,
    Succeeded,
    Failed,
}

/// One bound step of a project
struct Operation {
    key: String,
    plugin_name: String,
    plugin: Box<dyn Plugin>,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("key", &self.key)
            .field("plugin", &self.plugin_name)
            .finish()
    }
}

/// Operation whose structure has been checked but whose plugin is not bound yet
struct ResolvedOperation<'a> {
    key: String,
    plugin_name: &'a str,
    settings: &'a OperationSettings,
}

/// Check keys and plugin names of a project without touching any factory.
fn resolve_operations<'a>(
    project: &str,
    registry: &PluginRegistry,
    operations: &'a [OperationSettings],
) -> Result<Vec<ResolvedOperation<'a>>, ConfigError> {
    if operations.is_empty() {
        return Err(ConfigError::NoOperations {
            project: project.to_string(),
        });
    }

    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(operations.len());

    for (idx, settings) in operations.iter().enumerate() {
        let key = settings.effective_key(idx);
        if !seen.insert(key.clone()) {
            return Err(ConfigError::DuplicateOperation {
                project: project.to_string(),
                operation: key,
            });
        }

        let Some(plugin_name) = settings.plugin_name() else {
            return Err(ConfigError::MissingPlugin {
                project: project.to_string(),
                operation: key,
            });
        };

        if !registry.contains(plugin_name) {
            return Err(ConfigError::UnknownPlugin {
                project: project.to_string(),
                operation: key,
                plugin: plugin_name.to_string(),
            });
        }

        resolved.push(ResolvedOperation {
            key,
            plugin_name,
            settings,
        });
    }

    Ok(resolved)
}

/// Reject a destination folder name that would land outside the run directory
fn check_destination(project: &str, field: &'static str, value: &str) -> Result<(), ConfigError> {
    if is_plain_name(value) {
        return Ok(());
    }
    Err(ConfigError::InvalidDestination {
        project: project.to_string(),
        field,
        value: value.to_string(),
    })
}

/// A named, ordered sequence of bound operations.
#[derive(Debug)]
pub struct Project {
    name: String,
    operations: Vec<Operation>,
    state: ProjectState,
    failed_at: Option<usize>,
}

impl Project {
    /// Validate `operations` and bind each one to its plugin.
    ///
    /// # Errors
    ///
    /// - `InvalidDestination` if `name` is not a single directory name
    /// - `NoOperations` if the list is empty
    /// - `DuplicateOperation` if two operations share a key
    /// - `MissingPlugin` / `UnknownPlugin` for a bad `plugin` reference
    /// - `Plugin` if a factory rejects its payload
    pub fn setup(
        paths: &PathContext,
        registry: &PluginRegistry,
        name: &str,
        operations: &[OperationSettings],
    ) -> Result<Self, ConfigError> {
        check_destination(name, "name", name)?;
        let resolved = resolve_operations(name, registry, operations)?;
        Self::bind(paths, registry, name, resolved)
    }

    fn bind(
        paths: &PathContext,
        registry: &PluginRegistry,
        name: &str,
        resolved: Vec<ResolvedOperation<'_>>,
    ) -> Result<Self, ConfigError> {
        let mut bound = Vec::with_capacity(resolved.len());

        for op in resolved {
            let factory = registry
                .get(op.plugin_name)
                .ok_or_else(|| ConfigError::UnknownPlugin {
                    project: name.to_string(),
                    operation: op.key.clone(),
                    plugin: op.plugin_name.to_string(),
                })?;

            let plugin = factory
                .setup(paths, name, &op.settings.config())
                .map_err(|source| ConfigError::Plugin {
                    project: name.to_string(),
                    operation: op.key.clone(),
                    plugin: op.plugin_name.to_string(),
                    source,
                })?;

            tracing::debug!("{}: bound operation {} ({})", name, op.key, op.plugin_name);
            bound.push(Operation {
                key: op.key,
                plugin_name: op.plugin_name.to_string(),
                plugin,
            });
        }

        Ok(Self {
            name: name.to_string(),
            operations: bound,
            state: ProjectState::Configured,
            failed_at: None,
        })
    }

    /// Project name used for logging and error attribution
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProjectState {
        self.state
    }

    /// Key and plugin name of the operation that failed the last run
    pub fn failed_operation(&self) -> Option<(&str, &str)> {
        self.failed_at
            .and_then(|idx| self.operations.get(idx))
            .map(|op| (op.key.as_str(), op.plugin_name.as_str()))
    }

    /// Operation keys in execution order
    pub fn operation_keys(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().map(|op| op.key.as_str())
    }

    /// Run every operation in order, stopping at the first failure.
    pub fn run(&mut self) -> RunOutcome {
        self.run_observed(&mut NoopObserver)
    }

    /// [`Project::run`] with progress reported to `observer`.
    ///
    /// A project that has already run returns a failure without running
    /// anything again.
    pub fn run_observed(&mut self, observer: &mut dyn RunObserver) -> RunOutcome {
        if self.state != ProjectState::Configured {
            return RunOutcome::failure(format!("project '{}' has already run", self.name));
        }

        tracing::info!("running project: {}", self.name);
        observer.project_started(&self.name);

        let mut outcome = RunOutcome::Success;
        for (idx, op) in self.operations.iter_mut().enumerate() {
            tracing::debug!("{}: running operation {} ({})", self.name, op.key, op.plugin_name);
            observer.operation_started(&self.name, &op.key, &op.plugin_name);

            if let RunOutcome::Failure(msg) = op.plugin.run() {
                tracing::error!(
                    "{}: operation {} ({}) failed: {}",
                    self.name,
                    op.key,
                    op.plugin_name,
                    msg
                );
                outcome = RunOutcome::failure(format!("{} ({}): {}", op.key, op.plugin_name, msg));
                self.failed_at = Some(idx);
                break;
            }
        }

        self.state = if outcome.is_success() {
            ProjectState::Succeeded
        } else {
            ProjectState::Failed
        };
        observer.project_finished(&self.name, &outcome);
        outcome
    }
}

/// Final result of running a project set
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum RunReport {
    /// Every project ran to completion
    Completed,
    /// `project` failed at `operation`; later projects did not run
    Failed {
        project: String,
        operation: String,
        plugin: String,
        message: String,
    },
}

impl RunReport {
    /// Returns true if every project succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Name of the failing project
    pub fn project(&self) -> Option<&str> {
        match self {
            Self::Completed => None,
            Self::Failed { project, .. } => Some(project),
        }
    }

    /// Failure message, empty on success
    pub fn message(&self) -> &str {
        match self {
            Self::Completed => "",
            Self::Failed { message, .. } => message,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "all projects completed"),
            Self::Failed {
                project, message, ..
            } => write!(f, "{}: {}", project, message),
        }
    }
}

/// Every configured project, in execution order.
#[derive(Debug)]
pub struct ProjectSet {
    projects: Vec<Project>,
}

impl ProjectSet {
    /// Build every project described by `projects`.
    ///
    /// Construction is all-or-nothing. Keys and plugin references of every
    /// project are checked before any factory is asked to set up a plugin.
    ///
    /// # Errors
    ///
    /// - `NoProjects` if `projects` is empty
    /// - `DuplicateProject` if two projects share a key
    /// - `InvalidDestination` if a project name or `backup_dir` is not a
    ///   single directory name
    /// - anything [`Project::setup`] reports
    pub fn setup(
        paths: &PathContext,
        registry: &PluginRegistry,
        projects: &[ProjectSettings],
    ) -> Result<Self, ConfigError> {
        if projects.is_empty() {
            return Err(ConfigError::NoProjects);
        }

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(projects.len());
        for settings in projects {
            if !seen.insert(settings.key.as_str()) {
                return Err(ConfigError::DuplicateProject {
                    project: settings.key.clone(),
                });
            }
            let name = settings.effective_name();
            let name_field = if settings.name.is_some() { "name" } else { "key" };
            check_destination(name, name_field, name)?;
            if let Some(dir) = settings.effective_backup_dir() {
                check_destination(name, "backup_dir", dir)?;
            }
            let operations = resolve_operations(name, registry, &settings.operations)?;
            resolved.push((settings, operations));
        }

        let mut built = Vec::with_capacity(resolved.len());
        for (settings, operations) in resolved {
            let project_paths = match settings.effective_backup_dir() {
                Some(dir) => paths.copy_with_subdir(dir),
                None => paths.clone(),
            };
            built.push(Project::bind(
                &project_paths,
                registry,
                settings.effective_name(),
                operations,
            )?);
        }

        Ok(Self { projects: built })
    }

    /// Number of projects
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Always false for a successfully built set
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Projects in execution order
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Run every project in order, stopping at the first failure.
    pub fn run(&mut self) -> RunReport {
        self.run_observed(&mut NoopObserver)
    }

    /// [`ProjectSet::run`] with progress reported to `observer`.
    pub fn run_observed(&mut self, observer: &mut dyn RunObserver) -> RunReport {
        for project in &mut self.projects {
            if let RunOutcome::Failure(message) = project.run_observed(observer) {
                let (operation, plugin) = project.failed_operation().unwrap_or_default();
                return RunReport::Failed {
                    project: project.name().to_string(),
                    operation: operation.to_string(),
                    plugin: plugin.to_string(),
                    message,
                };
            }
        }
        RunReport::Completed
    }
}
