use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// backup-orchestrator - configuration-driven backups from ordered operations
#[derive(Parser, Debug)]
#[command(name = "backup-orchestrator")]
#[command(about = "Run backup projects described by a YAML settings file")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Settings file to use
    #[arg(short = 'f', long = "file", global = true, value_name = "CONFIG")]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run every configured project (the default)
    Run,
    /// Load the settings and set up every operation without running anything
    Validate,
    /// List the built-in plugins
    Plugins,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Subcommand to run, `run` when none was given
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}
