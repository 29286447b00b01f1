//! # Refs Command Implementation
//!
//! Lists the branches and tags of a repository with the commit and date each
//! one resolves to. Pull-request refs are not shown.

use anyhow::Result;
use clap::Args;

use dockstore_sync::config::SettingsOverrides;
use dockstore_sync::output::emoji;

use super::GlobalOptions;

/// List the branches and tags of a repository
#[derive(Args, Debug)]
pub struct RefsArgs {
    /// Repository, as `owner/repo`
    #[arg(value_name = "REPOSITORY")]
    pub repository: String,

    /// Print the references as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the `refs` command.
pub fn execute(args: RefsArgs, global: &GlobalOptions) -> Result<()> {
    let ctx = global.connect(SettingsOverrides::default())?;
    let label = format!("list references of {}", args.repository);
    let mut references = ctx.guard().with_quota_check(ctx.api(), &label, || {
        ctx.references().list_references(&args.repository)
    })?;
    references.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.name.cmp(&b.name)));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&references)?);
        return Ok(());
    }

    let out = global.output();
    println!(
        "{} {}: {} references",
        emoji(&out, "🔖", "[REFS]"),
        args.repository,
        references.len()
    );
    for reference in &references {
        println!(
            "   {:<8} {:<40} {} {}",
            format!("{:?}", reference.kind),
            reference.name,
            reference.sha.as_deref().unwrap_or("-"),
            reference.date.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
