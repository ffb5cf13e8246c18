//! Built-in plugins.
//!
//! Each submodule provides one [`PluginFactory`]. The registry is assembled
//! from the explicit table in [`builtin_registry`]; nothing registers itself.

pub mod compress;
pub mod compress_previous;
pub mod docker;
pub mod docker_compose;
pub mod limit_backups;
pub mod local_rsync;
pub mod remove;
pub mod rsync_copy;
pub mod sshfs;

use crate::error::ConfigError;
use crate::error::ValidationError;
use crate::plugin::{OperationConfig, PluginRegistry};

pub use compress::CompressFactory;
pub use compress_previous::CompressPreviousFactory;
pub use docker::DockerFactory;
pub use docker_compose::DockerComposeFactory;
pub use limit_backups::LimitBackupsFactory;
pub use local_rsync::LocalRsyncFactory;
pub use remove::RemoveFactory;
pub use rsync_copy::RsyncCopyFactory;
pub use sshfs::SshfsFactory;

/// Registry holding every built-in plugin.
pub fn builtin_registry() -> Result<PluginRegistry, ConfigError> {
    let mut registry = PluginRegistry::new();
    registry.register(CompressFactory)?;
    registry.register(CompressPreviousFactory)?;
    registry.register(DockerFactory)?;
    registry.register(DockerComposeFactory)?;
    registry.register(LimitBackupsFactory)?;
    registry.register(LocalRsyncFactory)?;
    registry.register(RemoveFactory)?;
    registry.register(RsyncCopyFactory)?;
    registry.register(SshfsFactory)?;
    Ok(registry)
}

/// Lines for the `plugins` subcommand: `name  description`, name-sorted
pub fn describe(registry: &PluginRegistry) -> Vec<String> {
    let width = registry.iter().map(|f| f.name().len()).max().unwrap_or(0);
    registry
        .iter()
        .map(|f| format!("{:width$}  {}", f.name(), f.description()))
        .collect()
}

/// One rsync source: a path, its excludes and where it lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RsyncSource {
    pub source: String,
    pub target: Option<String>,
    pub excludes: Vec<String>,
}

/// Push `--exclude X` for every exclude
pub(crate) fn push_excludes(args: &mut Vec<String>, excludes: &[String]) {
    for exclude in excludes {
        args.push("--exclude".to_string());
        args.push(exclude.clone());
    }
}

/// Read the `excludes` list shared by the rsync plugins
pub(crate) fn excludes(record: &OperationConfig) -> Result<Vec<String>, ValidationError> {
    record.optional_string_list("excludes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_contents() {
        let registry = builtin_registry().unwrap();
        let names: Vec<&str> = registry.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                "compress",
                "compress_previous",
                "docker",
                "docker_compose",
                "limit_backups",
                "local_rsync",
                "remove",
                "rsync_copy",
                "sshfs",
            ]
        );
    }

    #[test]
    fn test_describe_aligns_names() {
        let registry = builtin_registry().unwrap();
        let lines = describe(&registry);
        assert_eq!(lines.len(), registry.len());
        assert!(lines[0].starts_with(&format!("{:17}  compresses", "compress")));
    }

    #[test]
    fn test_push_excludes() {
        let mut args = vec!["rsync".to_string()];
        push_excludes(&mut args, &["cache".to_string(), "*.tmp".to_string()]);
        assert_eq!(args, vec!["rsync", "--exclude", "cache", "--exclude", "*.tmp"]);
    }
}
