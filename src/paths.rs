//! Path context for a backup run.
//!
//! A [`PathContext`] names the backups root, the directory of the run in
//! progress, the run's name and an optional destination subdirectory. It is
//! created once per invocation and never mutated; per-project overrides are
//! made with [`PathContext::copy_with_subdir`], which returns a new value.

use std::ffi::OsString;
use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Component, Path, PathBuf};

use crate::archive::ARCHIVE_EXTENSION;
use crate::error::{BackupError, ConfigError, Result};

/// Permission mode used for every directory created under the backups root
pub const DIRECTORY_MODE: u32 = 0o750;

/// `chrono` format string for run names (e.g. `2024-01-31_23-59-00`)
pub const RUN_NAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Directories and names describing where the current run writes its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathContext {
    backups_root: PathBuf,
    run_path: PathBuf,
    run_name: String,
    subdir: Option<String>,
}

impl PathContext {
    /// Derive the context for run `run_name` under `root`.
    ///
    /// The run directory `root/run_name` is created (with parents) before
    /// returning. Calling this again for an existing run directory succeeds.
    pub fn derive(root: impl AsRef<Path>, run_name: impl Into<String>) -> Result<Self> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyBackupPath.into());
        }
        if !root.is_absolute() {
            return Err(ConfigError::RelativeBackupPath {
                path: root.display().to_string(),
            }
            .into());
        }

        let run_name = run_name.into();
        if !is_plain_name(&run_name) {
            return Err(BackupError::settings(format!(
                "invalid run name '{}'",
                run_name
            )));
        }

        let run_path = root.join(&run_name);
        create_directory(&run_path)?;
        tracing::debug!("created directory: {}", run_path.display());

        Ok(Self {
            backups_root: root.to_path_buf(),
            run_path,
            run_name,
            subdir: None,
        })
    }

    /// Derive the context for a run named after the current local time.
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let run_name = chrono::Local::now().format(RUN_NAME_FORMAT).to_string();
        Self::derive(root, run_name)
    }

    /// Base directory holding all historical runs
    pub fn backups_root(&self) -> &Path {
        &self.backups_root
    }

    /// Directory of the current run
    pub fn run_path(&self) -> &Path {
        &self.run_path
    }

    /// Name of the current run
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Destination override, if one was applied
    pub fn subdir(&self) -> Option<&str> {
        self.subdir.as_deref()
    }

    /// Return a copy of this context whose subdirectory is `subdir`.
    ///
    /// The override replaces any previous one; it never accumulates.
    pub fn copy_with_subdir(&self, subdir: impl Into<String>) -> Self {
        Self {
            subdir: Some(subdir.into()),
            ..self.clone()
        }
    }

    /// Folder name a plugin should write into for `project`.
    pub fn destination_name<'a>(&'a self, project: &'a str) -> &'a str {
        self.subdir.as_deref().unwrap_or(project)
    }

    /// Ensure and return `run_path/<destination_name(project)>`.
    pub fn project_directory(&self, project: &str) -> io::Result<PathBuf> {
        child_directory(&self.run_path, self.destination_name(project))
    }

    /// Path of the archive `compress` produces for this run
    pub fn archive_path(&self) -> PathBuf {
        self.backups_root
            .join(format!("{}.{}", self.run_name, ARCHIVE_EXTENSION))
    }

    /// Remove the run directory and this run's archive, whichever exist.
    pub fn remove_run_artifacts(&self) -> io::Result<()> {
        if self.run_path.is_dir() {
            std::fs::remove_dir_all(&self.run_path)?;
            tracing::info!("removed directory: {}", self.run_path.display());
        }

        let archive = self.archive_path();
        if archive.is_file() {
            std::fs::remove_file(&archive)?;
            tracing::info!("removed archive: {}", archive.display());
        }

        Ok(())
    }
}

/// True when `name` is exactly one ordinary path component.
///
/// Empty names, `.`, `..`, absolute paths and anything with a separator
/// between two components are not plain.
pub fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Create `path` and any missing parents with [`DIRECTORY_MODE`].
///
/// An already existing directory is not an error.
pub fn create_directory(path: &Path) -> io::Result<()> {
    DirBuilder::new()
        .recursive(true)
        .mode(DIRECTORY_MODE)
        .create(path)
}

/// Ensure `base/name` exists and return it.
pub fn child_directory(base: &Path, name: &str) -> io::Result<PathBuf> {
    let path = base.join(name);
    create_directory(&path)?;
    tracing::debug!("created directory: {}", path.display());
    Ok(path)
}

/// Give a copy-destination path a trailing separator.
///
/// Paths that already end in a separator, name an existing regular file, or
/// are empty are returned unchanged. rsync treats `src/` and `src`
/// differently, so every directory argument goes through here.
pub fn terminated_path(path: &Path) -> PathBuf {
    let raw = path.as_os_str();
    if raw.is_empty() || raw.as_encoded_bytes().ends_with(b"/") || path.is_file() {
        return path.to_path_buf();
    }

    let mut terminated = OsString::from(raw);
    terminated.push("/");
    PathBuf::from(terminated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_derive_creates_run_directory() {
        let root = tempfile::tempdir().unwrap();
        let ctx = PathContext::derive(root.path(), "2024-01-01_00-00-00").unwrap();

        assert!(ctx.run_path().is_dir());
        assert_eq!(ctx.run_path(), root.path().join("2024-01-01_00-00-00"));
        assert_eq!(ctx.run_name(), "2024-01-01_00-00-00");
        assert_eq!(ctx.subdir(), None);

        let mode = std::fs::metadata(ctx.run_path()).unwrap().permissions().mode();
        // umask can only clear bits
        assert_eq!(mode & 0o777 & !DIRECTORY_MODE, 0);
    }

    #[test]
    fn test_derive_creates_missing_parents() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        let ctx = PathContext::derive(&nested, "run").unwrap();
        assert!(ctx.run_path().is_dir());
        assert_eq!(ctx.backups_root(), nested.as_path());
    }

    #[test]
    fn test_derive_rejects_empty_root() {
        let err = PathContext::derive("", "run").unwrap_err();
        assert!(matches!(
            err,
            BackupError::Config(ConfigError::EmptyBackupPath)
        ));
    }

    #[test]
    fn test_derive_rejects_bad_run_name() {
        let root = tempfile::tempdir().unwrap();
        assert!(PathContext::derive(root.path(), "").is_err());
        assert!(PathContext::derive(root.path(), "a/b").is_err());
        assert!(PathContext::derive(root.path(), ".").is_err());
        assert!(PathContext::derive(root.path(), "/abs").is_err());
    }

    #[test]
    fn test_parent_run_name_cannot_reach_outside_root() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("backups");
        let earlier = PathContext::derive(&root, "2024-01-01_00-00-00").unwrap();

        let err = PathContext::derive(&root, "..").unwrap_err();
        assert!(matches!(err, BackupError::Settings(_)));
        assert!(earlier.run_path().is_dir());
        assert!(root.is_dir());
    }

    #[test]
    fn test_derive_rejects_relative_root() {
        let err = PathContext::derive("relative-backups", "run").unwrap_err();
        assert!(matches!(
            err,
            BackupError::Config(ConfigError::RelativeBackupPath { ref path })
                if path == "relative-backups"
        ));
        assert!(!Path::new("relative-backups").exists());
    }

    #[test]
    fn test_is_plain_name() {
        assert!(is_plain_name("nextcloud"));
        assert!(is_plain_name("2024-01-01_00-00-00"));
        for name in ["", ".", "..", "/srv/data", "a/b", "../x", "./a"] {
            assert!(!is_plain_name(name), "{:?} accepted", name);
        }
    }

    #[test]
    fn test_create_uses_timestamp_run_name() {
        let root = tempfile::tempdir().unwrap();
        let ctx = PathContext::create(root.path()).unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(ctx.run_name(), RUN_NAME_FORMAT).is_ok());
    }

    #[test]
    fn test_copy_with_subdir_leaves_original_untouched() {
        let root = tempfile::tempdir().unwrap();
        let ctx = PathContext::derive(root.path(), "run").unwrap();
        let copy = ctx.copy_with_subdir("cloud");

        assert_eq!(ctx.subdir(), None);
        assert_eq!(copy.subdir(), Some("cloud"));
        assert_eq!(copy.run_path(), ctx.run_path());
        assert_eq!(copy.destination_name("nextcloud"), "cloud");
        assert_eq!(ctx.destination_name("nextcloud"), "nextcloud");
    }

    #[test]
    fn test_child_directory_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let first = child_directory(root.path(), "sub").unwrap();
        let second = child_directory(root.path(), "sub").unwrap();
        assert_eq!(first, second);
        assert!(second.is_dir());
    }

    #[test]
    fn test_terminated_path() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("file.txt");
        std::fs::write(&file, b"data").unwrap();

        assert_eq!(terminated_path(Path::new("/srv/data")), PathBuf::from("/srv/data/"));
        assert_eq!(terminated_path(Path::new("/srv/data/")), PathBuf::from("/srv/data/"));
        assert_eq!(terminated_path(&file), file);
        assert_eq!(terminated_path(Path::new("")), PathBuf::new());
    }

    #[test]
    fn test_remove_run_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let ctx = PathContext::derive(root.path(), "run").unwrap();
        std::fs::write(ctx.run_path().join("partial"), b"x").unwrap();
        std::fs::write(ctx.archive_path(), b"x").unwrap();

        ctx.remove_run_artifacts().unwrap();
        assert!(!ctx.run_path().exists());
        assert!(!ctx.archive_path().exists());

        // Nothing left to remove is fine
        ctx.remove_run_artifacts().unwrap();
    }
}
