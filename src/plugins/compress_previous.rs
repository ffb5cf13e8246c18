//! `compress_previous`: archive the uncompressed runs left by earlier invocations

use std::path::PathBuf;

use crate::archive::{compress_directory, directories_except};
use crate::error::ValidationError;
use crate::paths::PathContext;
use crate::plugin::{OperationConfig, Plugin, PluginFactory, RunOutcome};

pub struct CompressPreviousFactory;

impl PluginFactory for CompressPreviousFactory {
    fn name(&self) -> &str {
        "compress_previous"
    }

    fn description(&self) -> &str {
        "compresses previous backup runs"
    }

    fn setup(
        &self,
        paths: &PathContext,
        _project: &str,
        _config: &OperationConfig,
    ) -> Result<Box<dyn Plugin>, ValidationError> {
        Ok(Box::new(CompressPrevious {
            root: paths.backups_root().to_path_buf(),
            current: paths.run_name().to_string(),
        }))
    }
}

/// Archives every directory under `root` other than `current`
#[derive(Debug)]
pub struct CompressPrevious {
    root: PathBuf,
    current: String,
}

impl Plugin for CompressPrevious {
    fn run(&mut self) -> RunOutcome {
        let previous = match directories_except(&self.root, &self.current) {
            Ok(names) => names,
            Err(e) => return RunOutcome::failure(format!("list {}: {}", self.root.display(), e)),
        };

        for name in previous {
            let dir = self.root.join(&name);
            if let Err(e) = compress_directory(&self.root, &dir, &name) {
                return RunOutcome::failure(format!("compress {}: {}", dir.display(), e));
            }
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                return RunOutcome::failure(format!("remove {}: {}", dir.display(), e));
            }
        }

        RunOutcome::Success
    }
}
