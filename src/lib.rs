//! Backup Orchestrator Library
//!
//! Runs backup "projects" described by a YAML settings file. Each project is
//! an ordered list of operations, and each operation is bound to a plugin
//! (rsync copy, compression, container control, sshfs mounts, retention).

pub mod archive;
pub mod cli;
pub mod command;
pub mod error;
pub mod notify;
pub mod paths;
pub mod plugin;
pub mod plugins;
pub mod process_guard;
pub mod project;
pub mod runner;
pub mod settings;

// Re-export main types for convenience
pub use error::{BackupError, ConfigError, Result, ValidationError};
pub use notify::{Console, Gotify, Notifier, NotifierHolder};
pub use paths::{PathContext, child_directory, terminated_path};
pub use plugin::{OperationConfig, Plugin, PluginFactory, PluginRegistry, RunOutcome};
pub use plugins::builtin_registry;
pub use process_guard::{ChildRegistration, ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use project::{NoopObserver, Project, ProjectSet, ProjectState, RunObserver, RunReport};
pub use runner::{RunDriver, RunTracker};
pub use settings::{BackupSettings, OperationSettings, ProjectSettings, Settings};
