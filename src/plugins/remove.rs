//! `remove`: delete paths from a project's backup folder

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::ValidationError;
use crate::paths::PathContext;
use crate::plugin::{OperationConfig, Plugin, PluginFactory, RunOutcome};

pub struct RemoveFactory;

impl PluginFactory for RemoveFactory {
    fn name(&self) -> &str {
        "remove"
    }

    fn description(&self) -> &str {
        "remove paths from backup"
    }

    fn setup(
        &self,
        paths: &PathContext,
        project: &str,
        config: &OperationConfig,
    ) -> Result<Box<dyn Plugin>, ValidationError> {
        let targets = config.string_list("paths")?;
        for target in &targets {
            check_relative(target)?;
        }

        Ok(Box::new(Remove {
            base: paths.run_path().join(paths.destination_name(project)),
            targets,
        }))
    }
}

/// Reject anything that could point outside the project folder
fn check_relative(target: &str) -> Result<(), ValidationError> {
    let path = Path::new(target);
    if path.is_absolute() {
        return Err(ValidationError::invalid(
            "paths",
            format!("{} must be relative", target),
        ));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ValidationError::invalid(
            "paths",
            format!("{} must not contain '..'", target),
        ));
    }
    if !path.components().any(|c| matches!(c, Component::Normal(_))) {
        return Err(ValidationError::invalid(
            "paths",
            format!("'{}' names the whole project folder", target),
        ));
    }
    Ok(())
}

#[derive(Debug)]
pub struct Remove {
    base: PathBuf,
    targets: Vec<String>,
}

fn remove_path(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("{} already absent", path.display());
            Ok(())
        }
        Err(e) => Err(e),
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
    }
}

impl Plugin for Remove {
    fn run(&mut self) -> RunOutcome {
        for target in &self.targets {
            let path = self.base.join(target);
            tracing::info!("removing from backup: {}", path.display());
            if let Err(e) = remove_path(&path) {
                return RunOutcome::failure(format!("remove {}: {}", path.display(), e));
            }
        }
        RunOutcome::Success
    }
}
