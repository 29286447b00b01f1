//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Dockstore Sync - Keep workflow versions in step with GitHub
#[derive(Parser, Debug)]
#[command(name = "dockstore-sync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE", env = "DOCKSTORE_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// GitHub API base URL
    #[arg(long, global = true, value_name = "URL", env = "DOCKSTORE_SYNC_API_URL")]
    api_url: Option<String>,

    /// GitHub user the token belongs to, reported in rate-limit logs
    #[arg(long, global = true, value_name = "USER", env = "DOCKSTORE_SYNC_USERNAME")]
    username: Option<String>,

    /// GitHub token
    #[arg(
        long,
        global = true,
        value_name = "TOKEN",
        env = "DOCKSTORE_SYNC_TOKEN",
        hide_env_values = true
    )]
    token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover manifest-declared entries and build their versions
    Sync(commands::sync::SyncArgs),

    /// List the branches and tags of a repository
    Refs(commands::refs::RefsArgs),

    /// Print a file at a reference, following symlinks and submodules
    Read(commands::read::ReadArgs),

    /// Rebuild the versions of a single entry
    Refresh(commands::refresh::RefreshArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        let global = commands::GlobalOptions {
            color: self.color,
            config: self.config,
            api_url: self.api_url,
            username: self.username,
            token: self.token,
        };

        match self.command {
            Commands::Sync(args) => commands::sync::execute(args, &global),
            Commands::Refs(args) => commands::refs::execute(args, &global),
            Commands::Read(args) => commands::read::execute(args, &global),
            Commands::Refresh(args) => commands::refresh::execute(args, &global),
        }
    }
}

/// `RUST_LOG` wins over `--log-level`.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level.to_string());
    // A logger may already be installed when embedded; keep it.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dockstore-sync",
            "refs",
            "octo/demo",
            "--log-level",
            "debug",
            "--api-url",
            "http://127.0.0.1:9",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        assert_eq!(cli.api_url.as_deref(), Some("http://127.0.0.1:9"));
    }
}
