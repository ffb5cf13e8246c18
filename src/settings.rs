//! Settings file handling.
//!
//! The settings file is YAML. It is read once into an immutable [`Settings`]
//! value that is passed by reference to everything that needs it.
//!
//! ```yaml
//! backup:
//!   path: /srv/backups
//!   clean_on_failure: true
//!   projects:
//!     - key: nextcloud
//!       backup_dir: cloud
//!       operations:
//!         - key: stop
//!           plugin: docker
//!           action: stop
//!           container: nextcloud
//! notifiers:
//!   gotify:
//!     url: https://gotify.example
//!     gotify_key: XXXX
//!     message_title: backups
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::{BackupError, Result};
use crate::plugin::OperationConfig;

/// Whole settings file
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub backup: BackupSettings,

    /// Notifier name => notifier-specific settings
    #[serde(default)]
    pub notifiers: BTreeMap<String, Value>,
}

/// The `backup` section
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BackupSettings {
    /// Base directory holding all runs
    #[serde(default)]
    pub path: PathBuf,

    /// Remove this run's directory and archive when the run fails
    #[serde(default = "default_clean_on_failure")]
    pub clean_on_failure: bool,

    /// Projects in execution order
    #[serde(default)]
    pub projects: Vec<ProjectSettings>,
}

fn default_clean_on_failure() -> bool {
    true
}

/// One project
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectSettings {
    /// Unique identity of the project
    pub key: String,

    /// Display and default destination name (defaults to `key`)
    #[serde(default)]
    pub name: Option<String>,

    /// Destination subdirectory override
    #[serde(default)]
    pub backup_dir: Option<String>,

    /// Operations in execution order
    #[serde(default)]
    pub operations: Vec<OperationSettings>,
}

impl ProjectSettings {
    /// Name used for logging, errors and the default destination folder
    pub fn effective_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.key)
    }

    /// Destination override, ignoring an empty value
    pub fn effective_backup_dir(&self) -> Option<&str> {
        self.backup_dir.as_deref().filter(|d| !d.is_empty())
    }
}

/// One operation: a plugin reference plus its payload
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OperationSettings {
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub plugin: Option<String>,

    /// Everything else is handed to the plugin
    #[serde(flatten)]
    pub payload: BTreeMap<String, Value>,
}

impl OperationSettings {
    /// Operation key, defaulting to the 1-based position
    pub fn effective_key(&self, index: usize) -> String {
        match self.key.as_deref() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => (index + 1).to_string(),
        }
    }

    /// Referenced plugin name, ignoring an empty value
    pub fn plugin_name(&self) -> Option<&str> {
        self.plugin.as_deref().filter(|p| !p.is_empty())
    }

    /// Payload for the plugin factory
    pub fn config(&self) -> OperationConfig {
        OperationConfig::new(self.payload.clone())
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BackupError::settings(format!(
                "{}: not found",
                path.display()
            )));
        }
        if !path.is_file() {
            return Err(BackupError::settings(format!(
                "{}: not a file",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(content)?;
        Ok(settings)
    }
}
