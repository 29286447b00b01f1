//! # Read Command Implementation
//!
//! Prints the content of one file at a reference. Symlinks and submodules on
//! the way are followed, exactly as during synchronization.

use anyhow::{bail, Result};
use clap::Args;

use dockstore_sync::config::SettingsOverrides;

use super::GlobalOptions;

/// Print a file at a reference, following symlinks and submodules
#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Repository, as `owner/repo`
    #[arg(value_name = "REPOSITORY")]
    pub repository: String,

    /// Branch, tag or commit SHA
    #[arg(value_name = "REFERENCE")]
    pub reference: String,

    /// Path of the file, from the repository root
    #[arg(value_name = "PATH")]
    pub path: String,

    /// List the directory at PATH instead of reading a file
    #[arg(long)]
    pub list: bool,
}

/// Execute the `read` command.
pub fn execute(args: ReadArgs, global: &GlobalOptions) -> Result<()> {
    let ctx = global.connect(SettingsOverrides::default())?;
    let resolver = ctx.resolver();

    if args.list {
        for name in resolver.list_files(&args.repository, &args.reference, &args.path)? {
            println!("{}", name);
        }
        return Ok(());
    }

    match resolver.read(&args.repository, &args.reference, &args.path)? {
        Some(content) => {
            print!("{}", content);
            Ok(())
        }
        None => bail!(
            "No file at {} on {} of {}",
            args.path,
            args.reference,
            args.repository
        ),
    }
}
