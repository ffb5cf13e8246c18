//! `compress`: archive the current run and drop the uncompressed copy

use std::path::PathBuf;

use crate::archive::compress_directory;
use crate::error::ValidationError;
use crate::paths::PathContext;
use crate::plugin::{OperationConfig, Plugin, PluginFactory, RunOutcome};

pub struct CompressFactory;

impl PluginFactory for CompressFactory {
    fn name(&self) -> &str {
        "compress"
    }

    fn description(&self) -> &str {
        "compresses the current backup run into a tar.bz2 archive"
    }

    fn setup(
        &self,
        paths: &PathContext,
        _project: &str,
        config: &OperationConfig,
    ) -> Result<Box<dyn Plugin>, ValidationError> {
        Ok(Box::new(Compress {
            root: paths.backups_root().to_path_buf(),
            run_path: paths.run_path().to_path_buf(),
            run_name: paths.run_name().to_string(),
            enabled: config.optional_bool("do_compress")?.unwrap_or(false),
        }))
    }
}

/// Archives `run_path` as `root/<run_name>.tar.bz2` when enabled
#[derive(Debug)]
pub struct Compress {
    root: PathBuf,
    run_path: PathBuf,
    run_name: String,
    enabled: bool,
}

impl Plugin for Compress {
    fn run(&mut self) -> RunOutcome {
        if !self.enabled {
            tracing::debug!("compression disabled, skipping");
            return RunOutcome::Success;
        }

        if let Err(e) = compress_directory(&self.root, &self.run_path, &self.run_name) {
            return RunOutcome::failure(format!("compress {}: {}", self.run_path.display(), e));
        }

        if let Err(e) = std::fs::remove_dir_all(&self.run_path) {
            return RunOutcome::failure(format!("remove {}: {}", self.run_path.display(), e));
        }

        RunOutcome::Success
    }
}
