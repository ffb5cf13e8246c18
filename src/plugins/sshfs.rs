//! `sshfs`: mount or unmount a remote filesystem

use strum::{Display, EnumString, VariantNames};

use crate::command::run_command;
use crate::error::ValidationError;
use crate::paths::PathContext;
use crate::plugin::{OperationConfig, Plugin, PluginFactory, RunOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum SshfsAction {
    Mount,
    Unmount,
}

pub struct SshfsFactory;

impl PluginFactory for SshfsFactory {
    fn name(&self) -> &str {
        "sshfs"
    }

    fn description(&self) -> &str {
        "mount or unmount an sshfs filesystem"
    }

    fn setup(
        &self,
        _paths: &PathContext,
        _project: &str,
        config: &OperationConfig,
    ) -> Result<Box<dyn Plugin>, ValidationError> {
        Ok(Box::new(Sshfs::from_config(config)?))
    }
}

#[derive(Debug)]
pub struct Sshfs {
    action: SshfsAction,
    local_path: String,
    remote_addr: String,
    remote_path: String,
    mount_options: Vec<String>,
    config_file: Option<String>,
}

impl Sshfs {
    pub fn from_config(config: &OperationConfig) -> Result<Self, ValidationError> {
        Ok(Self {
            action: config.required_choice("action", SshfsAction::VARIANTS)?,
            local_path: config.required_str("local_path")?.to_string(),
            remote_addr: config.required_str("remote_addr")?.to_string(),
            remote_path: config.required_str("remote_path")?.to_string(),
            mount_options: config.optional_string_list("mount_options")?,
            config_file: config.optional_str("config_file")?.map(str::to_string),
        })
    }

    /// Command line this plugin runs
    pub fn command(&self) -> Vec<String> {
        match self.action {
            SshfsAction::Mount => {
                let mut args = vec!["sshfs".to_string()];
                if !self.mount_options.is_empty() {
                    args.push("-o".to_string());
                    args.push(self.mount_options.join(","));
                }
                if let Some(config_file) = &self.config_file {
                    args.push("-F".to_string());
                    args.push(config_file.clone());
                }
                args.push(format!("{}:{}", self.remote_addr, self.remote_path));
                args.push(self.local_path.clone());
                args
            }
            SshfsAction::Unmount => vec!["umount".to_string(), self.local_path.clone()],
        }
    }
}

impl Plugin for Sshfs {
    fn run(&mut self) -> RunOutcome {
        tracing::info!("{}: {}", self.action, self.local_path);
        run_command(&self.command(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sshfs(yaml: &str) -> Result<Sshfs, ValidationError> {
        Sshfs::from_config(&OperationConfig::from_yaml(yaml).unwrap())
    }

    const BASE: &str = "local_path: /mnt/remote\nremote_addr: backup@host\nremote_path: /data\n";

    #[test]
    fn test_mount_command() {
        let plugin = sshfs(&format!(
            "{}action: mount\nmount_options: [ro, reconnect]\nconfig_file: /etc/ssh/backup.conf\n",
            BASE
        ))
        .unwrap();
        assert_eq!(
            plugin.command(),
            vec![
                "sshfs",
                "-o",
                "ro,reconnect",
                "-F",
                "/etc/ssh/backup.conf",
                "backup@host:/data",
                "/mnt/remote"
            ]
        );
    }

    #[test]
    fn test_plain_mount() {
        let plugin = sshfs(&format!("{}action: mount\n", BASE)).unwrap();
        assert_eq!(plugin.command(), vec!["sshfs", "backup@host:/data", "/mnt/remote"]);
    }

    #[test]
    fn test_unmount_command() {
        let plugin = sshfs(&format!("{}action: unmount\n", BASE)).unwrap();
        assert_eq!(plugin.command(), vec!["umount", "/mnt/remote"]);
    }

    #[test]
    fn test_validation() {
        let err = sshfs("action: mount\nremote_addr: h\nremote_path: /d\n").unwrap_err();
        assert_eq!(err.to_string(), "local_path not set");

        let err = sshfs(&format!("{}action: attach\n", BASE)).unwrap_err();
        assert_eq!(err.to_string(), "action: 'attach' not one of mount, unmount");

        let err = sshfs(&format!("{}action: mount\nmount_options: ro\n", BASE)).unwrap_err();
        assert_eq!(err.to_string(), "mount_options must be a list of strings");
    }
}
