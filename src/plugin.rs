//! Plugin contract and registry.
//!
//! Every capability (copy, compress, mount, container control, retention) is
//! a [`PluginFactory`] that validates an operation's payload and hands back a
//! ready-to-run [`Plugin`].
//!
//! # Contract
//!
//! - `PluginFactory::setup` checks the payload and may look at the filesystem
//!   to confirm referenced paths exist. It performs no other I/O.
//! - `Plugin::run` does the work once and reports a [`RunOutcome`]. It never
//!   decides cleanup or exit codes; that belongs to the caller.
//!
//! # Invariants
//!
//! - Plugin names are unique within a [`PluginRegistry`].
//! - The registry is built once at startup and only read afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde_yaml::{Mapping, Value};

use crate::error::{ConfigError, ValidationError};
use crate::paths::{PathContext, is_plain_name};

/// Result of running one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum RunOutcome {
    /// The unit of work completed
    Success,
    /// The unit of work failed, with a human-readable reason
    Failure(String),
}

impl RunOutcome {
    /// Create a failure outcome
    pub fn failure(msg: impl Into<String>) -> Self {
        Self::Failure(msg.into())
    }

    /// Returns true for [`RunOutcome::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Failure message, empty on success
    pub fn message(&self) -> &str {
        match self {
            Self::Success => "",
            Self::Failure(msg) => msg,
        }
    }
}

/// A configured unit of work.
pub trait Plugin: Send {
    /// Perform the work. Called at most once per instance.
    fn run(&mut self) -> RunOutcome;
}

/// Validates an operation payload and produces a bound [`Plugin`].
pub trait PluginFactory: Send + Sync {
    /// Registry key, as referenced by an operation's `plugin` field
    fn name(&self) -> &str;

    /// One-line description for `plugins` listings
    fn description(&self) -> &str;

    /// Validate `config` and return a plugin bound to `paths` and `project`.
    fn setup(
        &self,
        paths: &PathContext,
        project: &str,
        config: &OperationConfig,
    ) -> Result<Box<dyn Plugin>, ValidationError>;
}

/// Mapping from plugin name to factory.
#[derive(Default)]
pub struct PluginRegistry {
    factories: BTreeMap<String, Box<dyn PluginFactory>>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under its own name.
    ///
    /// # Errors
    ///
    /// `DuplicatePlugin` if the name is already taken.
    pub fn register<F>(&mut self, factory: F) -> Result<(), ConfigError>
    where
        F: PluginFactory + 'static,
    {
        let name = factory.name().to_string();
        if self.factories.contains_key(&name) {
            return Err(ConfigError::DuplicatePlugin { plugin: name });
        }
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    /// Look up a factory by name
    pub fn get(&self, name: &str) -> Option<&dyn PluginFactory> {
        self.factories.get(name).map(|f| f.as_ref())
    }

    /// Returns true if `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Factories in name order
    pub fn iter(&self) -> impl Iterator<Item = &dyn PluginFactory> {
        self.factories.values().map(|f| f.as_ref())
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

/// Plugin-specific payload of one operation, with typed extraction.
///
/// `null` values count as absent. Nested records (list entries, `run_as`)
/// carry a prefix so errors name the full field, e.g. `paths[1].from`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationConfig {
    fields: BTreeMap<String, Value>,
    prefix: String,
}

impl OperationConfig {
    /// Wrap a payload
    pub fn new(fields: BTreeMap<String, Value>) -> Self {
        Self {
            fields,
            prefix: String::new(),
        }
    }

    /// Parse a payload from a YAML mapping
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml).map(Self::new)
    }

    fn nested(mapping: &Mapping, prefix: String) -> Self {
        let fields = mapping
            .iter()
            .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
            .collect();
        Self { fields, prefix }
    }

    fn field_name(&self, field: &str) -> String {
        format!("{}{}", self.prefix, field)
    }

    /// Raw value of `field`, treating `null` as absent
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// Returns true if the payload has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Required non-empty string
    pub fn required_str(&self, field: &str) -> Result<&str, ValidationError> {
        match self.optional_str(field)? {
            Some(value) => Ok(value),
            None => Err(ValidationError::missing(self.field_name(field))),
        }
    }

    /// Optional string; an empty string counts as absent
    pub fn optional_str(&self, field: &str) -> Result<Option<&str>, ValidationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ValidationError::wrong_type(
                self.field_name(field),
                "a string",
            )),
        }
    }

    /// Optional folder name that must stay a single path component
    pub fn optional_dir_name(&self, field: &str) -> Result<Option<&str>, ValidationError> {
        match self.optional_str(field)? {
            Some(name) if !is_plain_name(name) => Err(ValidationError::invalid(
                self.field_name(field),
                format!("{} must be a single directory name", name),
            )),
            name => Ok(name),
        }
    }

    /// Optional boolean
    pub fn optional_bool(&self, field: &str) -> Result<Option<bool>, ValidationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(ValidationError::wrong_type(
                self.field_name(field),
                "a boolean",
            )),
        }
    }

    /// Optional integer
    pub fn optional_i64(&self, field: &str) -> Result<Option<i64>, ValidationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| ValidationError::wrong_type(self.field_name(field), "an integer")),
            Some(_) => Err(ValidationError::wrong_type(
                self.field_name(field),
                "an integer",
            )),
        }
    }

    /// Required integer that fits a `u32` (uids, gids)
    pub fn required_u32(&self, field: &str) -> Result<u32, ValidationError> {
        let value = self
            .optional_i64(field)?
            .ok_or_else(|| ValidationError::missing(self.field_name(field)))?;
        u32::try_from(value).map_err(|_| {
            ValidationError::invalid(self.field_name(field), format!("{} out of range", value))
        })
    }

    /// Required string parsed into `T`, one of `choices`.
    pub fn required_choice<T: FromStr>(
        &self,
        field: &str,
        choices: &[&str],
    ) -> Result<T, ValidationError> {
        let raw = self.required_str(field)?;
        raw.parse().map_err(|_| {
            ValidationError::invalid(
                self.field_name(field),
                format!("'{}' not one of {}", raw, choices.join(", ")),
            )
        })
    }

    /// Required non-empty list of strings
    pub fn string_list(&self, field: &str) -> Result<Vec<String>, ValidationError> {
        let list = self.optional_string_list(field)?;
        if list.is_empty() {
            return Err(ValidationError::missing(self.field_name(field)));
        }
        Ok(list)
    }

    /// Optional list of strings; absent yields an empty list
    pub fn optional_string_list(&self, field: &str) -> Result<Vec<String>, ValidationError> {
        let Some(value) = self.get(field) else {
            return Ok(Vec::new());
        };
        let expected = "a list of strings";
        let Value::Sequence(items) = value else {
            return Err(ValidationError::wrong_type(self.field_name(field), expected));
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(ValidationError::wrong_type(self.field_name(field), expected)),
            })
            .collect()
    }

    /// Required non-empty list of key/value records
    pub fn records(&self, field: &str) -> Result<Vec<OperationConfig>, ValidationError> {
        let expected = "a list of mappings";
        let Some(value) = self.get(field) else {
            return Err(ValidationError::missing(self.field_name(field)));
        };
        let Value::Sequence(items) = value else {
            return Err(ValidationError::wrong_type(self.field_name(field), expected));
        };
        if items.is_empty() {
            return Err(ValidationError::missing(self.field_name(field)));
        }
        items
            .iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Mapping(m) => Ok(Self::nested(
                    m,
                    format!("{}[{}].", self.field_name(field), idx),
                )),
                _ => Err(ValidationError::wrong_type(self.field_name(field), expected)),
            })
            .collect()
    }

    /// Optional key/value record
    pub fn optional_record(&self, field: &str) -> Result<Option<OperationConfig>, ValidationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Mapping(m)) => Ok(Some(Self::nested(
                m,
                format!("{}.", self.field_name(field)),
            ))),
            Some(_) => Err(ValidationError::wrong_type(
                self.field_name(field),
                "a mapping",
            )),
        }
    }

    /// Required path that must name an existing regular file
    pub fn existing_file(&self, field: &str) -> Result<PathBuf, ValidationError> {
        let raw = self.required_str(field)?;
        let path = PathBuf::from(raw);
        if !path.exists() {
            return Err(ValidationError::PathNotFound {
                field: self.field_name(field),
                path: raw.to_string(),
            });
        }
        if !path.is_file() {
            return Err(ValidationError::NotAFile {
                field: self.field_name(field),
                path: raw.to_string(),
            });
        }
        Ok(path)
    }
}

impl FromIterator<(String, Value)> for OperationConfig {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
