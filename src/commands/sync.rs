//! # Sync Command Implementation
//!
//! This module implements the `sync` subcommand, which reads the manifest at
//! every branch and tag of a repository and builds a version for each entry
//! it declares.
//!
//! Nothing is written anywhere: the result is printed, either as a summary
//! or, with `--json`, as the full report.

use std::time::Instant;

use anyhow::Result;
use clap::Args;

use dockstore_sync::config::SettingsOverrides;
use dockstore_sync::output::emoji;
use dockstore_sync::sync::VersionSynchronizer;

use super::{print_versions, GlobalOptions};

/// Discover manifest-declared entries and build their versions
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Repository to synchronize, as `owner/repo`
    #[arg(value_name = "REPOSITORY")]
    pub repository: String,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,

    /// Promote the newest tag to default version
    #[arg(long, value_name = "BOOL")]
    pub latest_tag_default: Option<bool>,

    /// Only process the N most recently changed references
    #[arg(long, value_name = "N")]
    pub max_references: Option<usize>,
}

/// Execute the `sync` command.
pub fn execute(args: SyncArgs, global: &GlobalOptions) -> Result<()> {
    let start_time = Instant::now();
    let ctx = global.connect(SettingsOverrides {
        latest_tag_as_default: args.latest_tag_default,
        max_references: args.max_references,
        ..SettingsOverrides::default()
    })?;

    let report = VersionSynchronizer::new(&ctx).process_repository(&args.repository)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let out = global.output();
    println!(
        "{} {} ({:?}): {} references, {} without a usable manifest",
        emoji(&out, "🔍", "[SYNC]"),
        report.repository,
        report.visibility,
        report.references,
        report.skipped
    );
    if report.entries.is_empty() {
        println!("   No entries declared");
    }
    for entry in &report.entries {
        println!(
            "\n{} {} [{} {}]",
            emoji(&out, "📦", "[ENTRY]"),
            entry.entry_path(),
            entry.kind,
            entry.language
        );
        let default = entry.actual_default_version().map(|v| v.name());
        print_versions(&out, &entry.versions(), default);
    }

    let stats = ctx.guard().stats();
    println!(
        "\n{} Done in {:.2}s, {} rate limited requests",
        emoji(&out, "✅", "[DONE]"),
        start_time.elapsed().as_secs_f64(),
        stats.consumed
    );
    Ok(())
}
