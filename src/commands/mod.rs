//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `dockstore-sync` command-line tool. Each subcommand is defined in its own
//! file to keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and the
//!   [`GlobalOptions`] and performs the command's logic.

pub mod read;
pub mod refresh;
pub mod refs;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use dockstore_sync::config::{Settings, SettingsOverrides};
use dockstore_sync::context::SyncContext;
use dockstore_sync::github::client::GitHubClient;
use dockstore_sync::model::EntryVersion;
use dockstore_sync::output::{version_lines, OutputConfig};

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub color: String,
    pub config: Option<PathBuf>,
    pub api_url: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
}

impl GlobalOptions {
    /// Settings from the settings file with command-line overrides applied.
    pub fn settings(&self, mut overrides: SettingsOverrides) -> Result<Settings> {
        let settings = Settings::load(self.config.as_deref()).context("Failed to load settings")?;
        overrides.api_url = self.api_url.clone();
        overrides.username = self.username.clone();
        overrides.token = self.token.clone();
        Ok(settings.with_overrides(overrides))
    }

    /// A context talking to the configured GitHub API.
    pub fn connect(&self, overrides: SettingsOverrides) -> Result<SyncContext> {
        let settings = self.settings(overrides)?;
        log::debug!("Using GitHub API at {}", settings.api_url);
        let client = GitHubClient::new(&settings)?;
        Ok(SyncContext::new(Arc::new(client), settings))
    }

    pub fn output(&self) -> OutputConfig {
        OutputConfig::from_env_and_flag(&self.color)
    }
}

/// Prints each version with the diagnostics of its failing validations.
pub fn print_versions(out: &OutputConfig, versions: &[&EntryVersion], default: Option<&str>) {
    for version in versions {
        for line in version_lines(out, version, default) {
            println!("   {}", line);
        }
    }
}
