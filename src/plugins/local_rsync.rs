//! `local_rsync`: copy local paths into the current run with rsync

use std::path::{Path, PathBuf};

use super::{RsyncSource, excludes, push_excludes};
use crate::command::run_command;
use crate::error::ValidationError;
use crate::paths::{PathContext, child_directory, terminated_path};
use crate::plugin::{OperationConfig, Plugin, PluginFactory, RunOutcome};

pub struct LocalRsyncFactory;

impl PluginFactory for LocalRsyncFactory {
    fn name(&self) -> &str {
        "local_rsync"
    }

    fn description(&self) -> &str {
        "backup paths locally using rsync"
    }

    fn setup(
        &self,
        paths: &PathContext,
        project: &str,
        config: &OperationConfig,
    ) -> Result<Box<dyn Plugin>, ValidationError> {
        let sources = config
            .records("paths")?
            .iter()
            .map(|record| {
                Ok(RsyncSource {
                    source: record.required_str("path")?.to_string(),
                    target: record.optional_dir_name("backup_dir")?.map(str::to_string),
                    excludes: excludes(record)?,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(Box::new(LocalRsync {
            run_path: paths.run_path().to_path_buf(),
            destination: paths.destination_name(project).to_string(),
            sources,
        }))
    }
}

#[derive(Debug)]
pub struct LocalRsync {
    run_path: PathBuf,
    destination: String,
    sources: Vec<RsyncSource>,
}

/// `rsync -a [--exclude X]... <source/> <target>`
fn rsync_command(source: &RsyncSource, target: &Path) -> Vec<String> {
    let mut args = vec!["rsync".to_string(), "-a".to_string()];
    push_excludes(&mut args, &source.excludes);
    args.push(terminated_path(Path::new(&source.source)).to_string_lossy().into_owned());
    args.push(terminated_path(target).to_string_lossy().into_owned());
    args
}

impl Plugin for LocalRsync {
    fn run(&mut self) -> RunOutcome {
        let base = match child_directory(&self.run_path, &self.destination) {
            Ok(base) => base,
            Err(e) => {
                let msg = format!("create backup path: {}: {}", self.destination, e);
                return RunOutcome::failure(msg);
            }
        };

        for source in &self.sources {
            let target = match &source.target {
                Some(subdir) => match child_directory(&base, subdir) {
                    Ok(dir) => dir,
                    Err(e) => {
                        let msg = format!("create backup path: {}: {}", subdir, e);
                        return RunOutcome::failure(msg);
                    }
                },
                None => base.clone(),
            };

            let outcome = run_command(&rsync_command(source, &target), None);
            if !outcome.is_success() {
                return outcome;
            }
        }

        RunOutcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsync_command_terminates_paths() {
        let source = RsyncSource {
            source: "/srv/web".to_string(),
            target: None,
            excludes: vec!["cache".to_string()],
        };
        assert_eq!(
            rsync_command(&source, Path::new("/backups/run/web")),
            vec!["rsync", "-a", "--exclude", "cache", "/srv/web/", "/backups/run/web/"]
        );
    }

    #[test]
    fn test_setup_requires_path() {
        let root = tempfile::tempdir().unwrap();
        let paths = PathContext::derive(root.path(), "run").unwrap();
        let config =
            OperationConfig::from_yaml("paths:\n  - path: /a\n  - backup_dir: b\n").unwrap();
        let err = LocalRsyncFactory.setup(&paths, "p", &config).err().unwrap();
        assert_eq!(err.to_string(), "paths[1].path not set");

        let config = OperationConfig::from_yaml("paths: []").unwrap();
        let err = LocalRsyncFactory.setup(&paths, "p", &config).err().unwrap();
        assert_eq!(err.to_string(), "paths not set");
    }

    #[test]
    fn test_backup_dir_stays_inside_project_folder() {
        let root = tempfile::tempdir().unwrap();
        let paths = PathContext::derive(root.path(), "run").unwrap();
        for backup_dir in ["/srv/elsewhere", "../next-door", "a/b"] {
            let config = OperationConfig::from_yaml(&format!(
                "paths:\n  - path: /srv/web\n    backup_dir: '{}'\n",
                backup_dir
            ))
            .unwrap();
            let err = LocalRsyncFactory.setup(&paths, "web", &config).err().unwrap();
            assert_eq!(
                err.to_string(),
                format!("paths[0].backup_dir: {} must be a single directory name", backup_dir)
            );
        }
    }

    #[test]
    fn test_failure_reports_command() {
        let root = tempfile::tempdir().unwrap();
        let paths = PathContext::derive(root.path(), "run").unwrap();
        let missing = root.path().join("no-such-source");
        let config = OperationConfig::from_yaml(&format!(
            "paths:\n  - path: '{}'\n    backup_dir: data\n",
            missing.display()
        ))
        .unwrap();
        let mut plugin = LocalRsyncFactory.setup(&paths, "web", &config).unwrap();

        let outcome = plugin.run();
        assert!(!outcome.is_success());
        assert!(outcome.message().starts_with("Failed: rsync -a "));
        assert!(paths.run_path().join("web").join("data").is_dir());
    }
}
