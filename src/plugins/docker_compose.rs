//! `docker_compose`: bring a compose stack down or up

use std::path::PathBuf;

use strum::{Display, EnumString, VariantNames};

use crate::command::{RunAs, run_command};
use crate::error::ValidationError;
use crate::paths::PathContext;
use crate::plugin::{OperationConfig, Plugin, PluginFactory, RunOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum ComposeAction {
    Down,
    Up,
}

pub struct DockerComposeFactory;

impl PluginFactory for DockerComposeFactory {
    fn name(&self) -> &str {
        "docker_compose"
    }

    fn description(&self) -> &str {
        "docker compose stack operations"
    }

    fn setup(
        &self,
        _paths: &PathContext,
        _project: &str,
        config: &OperationConfig,
    ) -> Result<Box<dyn Plugin>, ValidationError> {
        Ok(Box::new(DockerCompose::from_config(config)?))
    }
}

#[derive(Debug)]
pub struct DockerCompose {
    action: ComposeAction,
    compose_file: PathBuf,
    stack_name: Option<String>,
    run_as: Option<RunAs>,
}

impl DockerCompose {
    pub fn from_config(config: &OperationConfig) -> Result<Self, ValidationError> {
        let action = config.required_choice("action", ComposeAction::VARIANTS)?;
        let compose_file = config.existing_file("path")?;
        let stack_name = config.optional_str("stack_name")?.map(str::to_string);

        let run_as = match config.optional_record("run_as")? {
            Some(record) => Some(RunAs {
                uid: record.required_u32("uid")?,
                gid: record.required_u32("gid")?,
            }),
            None => None,
        };

        Ok(Self {
            action,
            compose_file,
            stack_name,
            run_as,
        })
    }

    /// Command line this plugin runs
    pub fn command(&self) -> Vec<String> {
        let mut args = vec![
            "docker-compose".to_string(),
            "-f".to_string(),
            self.compose_file.to_string_lossy().into_owned(),
        ];
        if let Some(stack) = &self.stack_name {
            args.push("-p".to_string());
            args.push(stack.clone());
        }
        args.push(self.action.to_string());
        if self.action == ComposeAction::Up {
            args.push("-d".to_string());
        }
        args
    }

    pub fn run_as(&self) -> Option<RunAs> {
        self.run_as
    }
}

impl Plugin for DockerCompose {
    fn run(&mut self) -> RunOutcome {
        run_command(&self.command(), self.run_as)
    }
}
