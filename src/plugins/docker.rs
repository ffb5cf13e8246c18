//! `docker`: start, stop or restart a single container

use strum::{Display, EnumString, VariantNames};

use crate::command::run_command;
use crate::error::ValidationError;
use crate::paths::PathContext;
use crate::plugin::{OperationConfig, Plugin, PluginFactory, RunOutcome};

/// Container action, passed verbatim to `docker`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum DockerAction {
    Restart,
    Start,
    Stop,
}

pub struct DockerFactory;

impl PluginFactory for DockerFactory {
    fn name(&self) -> &str {
        "docker"
    }

    fn description(&self) -> &str {
        "simple docker container operations"
    }

    fn setup(
        &self,
        _paths: &PathContext,
        _project: &str,
        config: &OperationConfig,
    ) -> Result<Box<dyn Plugin>, ValidationError> {
        Ok(Box::new(Docker::from_config(config)?))
    }
}

#[derive(Debug)]
pub struct Docker {
    action: DockerAction,
    container: String,
}

impl Docker {
    pub fn from_config(config: &OperationConfig) -> Result<Self, ValidationError> {
        Ok(Self {
            action: config.required_choice("action", DockerAction::VARIANTS)?,
            container: config.required_str("container")?.to_string(),
        })
    }

    /// Command line this plugin runs
    pub fn command(&self) -> Vec<String> {
        vec![
            "docker".to_string(),
            self.action.to_string(),
            self.container.clone(),
        ]
    }
}

impl Plugin for Docker {
    fn run(&mut self) -> RunOutcome {
        run_command(&self.command(), None)
    }
}
