//! `rsync_copy`: copy between arbitrary paths with rsync

use std::path::Path;

use super::{RsyncSource, excludes, push_excludes};
use crate::command::run_command;
use crate::error::ValidationError;
use crate::paths::{PathContext, terminated_path};
use crate::plugin::{OperationConfig, Plugin, PluginFactory, RunOutcome};

pub struct RsyncCopyFactory;

impl PluginFactory for RsyncCopyFactory {
    fn name(&self) -> &str {
        "rsync_copy"
    }

    fn description(&self) -> &str {
        "copy a path to a new location using rsync"
    }

    fn setup(
        &self,
        _paths: &PathContext,
        _project: &str,
        config: &OperationConfig,
    ) -> Result<Box<dyn Plugin>, ValidationError> {
        Ok(Box::new(RsyncCopy::from_config(config)?))
    }
}

#[derive(Debug)]
pub struct RsyncCopy {
    options: Vec<String>,
    copies: Vec<RsyncSource>,
}

impl RsyncCopy {
    pub fn from_config(config: &OperationConfig) -> Result<Self, ValidationError> {
        let copies = config
            .records("paths")?
            .iter()
            .map(|record| {
                Ok(RsyncSource {
                    source: record.required_str("from")?.to_string(),
                    target: Some(record.required_str("to")?.to_string()),
                    excludes: excludes(record)?,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        let mut options = config.optional_string_list("rsync_options")?;
        if options.is_empty() {
            options.push("-a".to_string());
        }

        Ok(Self { options, copies })
    }

    /// Command lines this plugin runs, in order
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.copies
            .iter()
            .map(|copy| {
                let mut args = vec!["rsync".to_string()];
                args.extend(self.options.iter().cloned());
                push_excludes(&mut args, &copy.excludes);
                args.push(terminated_path(Path::new(&copy.source)).to_string_lossy().into_owned());
                let to = copy.target.as_deref().unwrap_or_default();
                args.push(terminated_path(Path::new(to)).to_string_lossy().into_owned());
                args
            })
            .collect()
    }
}

impl Plugin for RsyncCopy {
    fn run(&mut self) -> RunOutcome {
        for args in self.commands() {
            let outcome = run_command(&args, None);
            if !outcome.is_success() {
                return outcome;
            }
        }
        RunOutcome::Success
    }
}
