//! `limit_backups`: keep only the newest runs under the backups root

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ValidationError;
use crate::paths::PathContext;
use crate::plugin::{OperationConfig, Plugin, PluginFactory, RunOutcome};

/// Runs kept when `total` is not configured
pub const DEFAULT_TOTAL: usize = 5;

pub struct LimitBackupsFactory;

impl PluginFactory for LimitBackupsFactory {
    fn name(&self) -> &str {
        "limit_backups"
    }

    fn description(&self) -> &str {
        "limit the number of stored backups"
    }

    fn setup(
        &self,
        paths: &PathContext,
        _project: &str,
        config: &OperationConfig,
    ) -> Result<Box<dyn Plugin>, ValidationError> {
        let total = match config.optional_i64("total")? {
            None => DEFAULT_TOTAL,
            Some(n) if n >= 1 => usize::try_from(n)
                .map_err(|_| ValidationError::invalid("total", format!("{} out of range", n)))?,
            Some(_) => return Err(ValidationError::invalid("total", "must be greater than zero")),
        };

        Ok(Box::new(LimitBackups {
            root: paths.backups_root().to_path_buf(),
            total,
        }))
    }
}

#[derive(Debug)]
pub struct LimitBackups {
    root: PathBuf,
    total: usize,
}

/// Entries of `root` that have to go so that at most `total` remain.
///
/// Run names sort chronologically, so the oldest come first.
pub fn entries_to_remove(root: &Path, total: usize) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(root)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();

    let excess = entries.len().saturating_sub(total);
    entries.truncate(excess);
    Ok(entries)
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if path.is_dir() && !path.is_symlink() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

impl Plugin for LimitBackups {
    fn run(&mut self) -> RunOutcome {
        let doomed = match entries_to_remove(&self.root, self.total) {
            Ok(doomed) => doomed,
            Err(e) => return RunOutcome::failure(format!("list {}: {}", self.root.display(), e)),
        };

        for path in doomed {
            tracing::info!("removing old backup: {}", path.display());
            if let Err(e) = remove_entry(&path) {
                return RunOutcome::failure(format!("remove {}: {}", path.display(), e));
            }
        }

        RunOutcome::Success
    }
}
