//! Error handling module for the backup orchestrator
//!
//! Setup-time problems are reported through typed errors built with thiserror.
//! Runtime failures of a plugin never surface here; they travel as a
//! [`RunOutcome`](crate::plugin::RunOutcome) instead.

use thiserror::Error;

/// Validation failure raised by a plugin factory while checking its payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required key is absent or empty
    #[error("{field} not set")]
    MissingField { field: String },

    /// A key holds a value of the wrong shape
    #[error("{field} must be {expected}")]
    WrongType { field: String, expected: &'static str },

    /// A key holds a well-typed but unacceptable value
    #[error("{field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// A referenced path does not exist
    #[error("{field}: {path} not found")]
    PathNotFound { field: String, path: String },

    /// A referenced path exists but is not a regular file
    #[error("{field}: {path} not a file")]
    NotAFile { field: String, path: String },
}

impl ValidationError {
    /// Create a missing field error
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create a wrong type error
    pub fn wrong_type(field: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongType {
            field: field.into(),
            expected,
        }
    }

    /// Create an invalid value error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Configuration error detected while building the project set.
///
/// Any of these aborts construction before a single plugin runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("backup path cannot be empty")]
    EmptyBackupPath,

    #[error("backup path must be absolute: {path}")]
    RelativeBackupPath { path: String },

    #[error("no projects defined for backup")]
    NoProjects,

    #[error("no operations defined for project '{project}'")]
    NoOperations { project: String },

    #[error("project '{project}' defined more than once")]
    DuplicateProject { project: String },

    #[error("operation '{operation}' defined more than once in project '{project}'")]
    DuplicateOperation { project: String, operation: String },

    #[error("no plugin defined for operation '{operation}' in project '{project}'")]
    MissingPlugin { project: String, operation: String },

    #[error("plugin not found: {plugin} (operation '{operation}' in project '{project}')")]
    UnknownPlugin {
        project: String,
        operation: String,
        plugin: String,
    },

    #[error("project '{project}': {field} '{value}' must be a single directory name")]
    InvalidDestination {
        project: String,
        field: &'static str,
        value: String,
    },

    #[error("plugin '{plugin}' registered more than once")]
    DuplicatePlugin { plugin: String },

    #[error("{project}.{operation} ({plugin}): {source}")]
    Plugin {
        project: String,
        operation: String,
        plugin: String,
        #[source]
        source: ValidationError,
    },
}

impl ConfigError {
    /// Name of the project the error is attributed to, if any
    pub fn project(&self) -> Option<&str> {
        match self {
            Self::NoOperations { project }
            | Self::DuplicateProject { project }
            | Self::DuplicateOperation { project, .. }
            | Self::MissingPlugin { project, .. }
            | Self::UnknownPlugin { project, .. }
            | Self::InvalidDestination { project, .. }
            | Self::Plugin { project, .. } => Some(project),
            Self::EmptyBackupPath
            | Self::RelativeBackupPath { .. }
            | Self::NoProjects
            | Self::DuplicatePlugin { .. } => None,
        }
    }
}

/// Main error type for the run driver
#[derive(Error, Debug)]
pub enum BackupError {
    /// IO errors (directory creation, cleanup, archive writes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Project set construction failed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Settings file could not be used
    #[error("Settings error: {0}")]
    Settings(String),

    /// Settings file is not valid YAML for the schema
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A notifier rejected its settings
    #[error("Notifier error: {0}")]
    Notifier(String),
}

/// Result type alias for run driver operations
pub type Result<T> = std::result::Result<T, BackupError>;

impl BackupError {
    /// Create a settings error
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    /// Create a notifier error
    pub fn notifier(msg: impl Into<String>) -> Self {
        Self::Notifier(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::UnknownPlugin {
            project: "web".to_string(),
            operation: "1".to_string(),
            plugin: "nope".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "plugin not found: nope (operation '1' in project 'web')"
        );

        let err = BackupError::settings("config.yaml: not found");
        assert_eq!(err.to_string(), "Settings error: config.yaml: not found");
    }

    #[test]
    fn test_plugin_error_carries_context() {
        let err = ConfigError::Plugin {
            project: "db".to_string(),
            operation: "stop".to_string(),
            plugin: "docker".to_string(),
            source: ValidationError::missing("container"),
        };
        assert_eq!(err.to_string(), "db.stop (docker): container not set");
        assert_eq!(err.project(), Some("db"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BackupError = io_err.into();
        assert!(matches!(err, BackupError::Io(_)));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: BackupError = ConfigError::NoProjects.into();
        assert!(matches!(err, BackupError::Config(ConfigError::NoProjects)));
        assert_eq!(ConfigError::NoProjects.project(), None);
    }
}
