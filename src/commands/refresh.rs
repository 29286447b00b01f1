//! # Refresh Command Implementation
//!
//! Rebuilds the versions of one entry. Without `--path` the entry is treated
//! as manifest-driven and its files come from `.dockstore.yml` at each
//! reference; with `--path` the single descriptor at that path is read.
//!
//! The command holds no stored versions, so every reference is rebuilt.
//! Skipping unchanged commits and refreshing a named manifest version both
//! need stored versions and are only available through
//! [`VersionSynchronizer::setup_entry_versions`].

use std::collections::BTreeMap;

use anyhow::Result;
use clap::{Args, ValueEnum};

use dockstore_sync::config::SettingsOverrides;
use dockstore_sync::model::{DescriptorLanguage, DescriptorLanguageSubclass, Entry, EntryKind};
use dockstore_sync::output::emoji;
use dockstore_sync::sync::{set_entry_info, RepositoryFacts, VersionSynchronizer};

use super::{print_versions, GlobalOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Workflow,
    Tool,
    Notebook,
}

impl From<KindArg> for EntryKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Workflow => EntryKind::Pipeline,
            KindArg::Tool => EntryKind::SingleStepTool,
            KindArg::Notebook => EntryKind::Notebook,
        }
    }
}

/// Rebuild the versions of a single entry
#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Repository, as `owner/repo`
    #[arg(value_name = "REPOSITORY")]
    pub repository: String,

    /// Descriptor language (CWL, WDL, NFL, gxformat2, SMK, jupyter)
    #[arg(long, value_name = "LANGUAGE")]
    pub language: String,

    /// Kind of entry
    #[arg(long, value_enum, default_value = "workflow")]
    pub kind: KindArg,

    /// Entry name, for repositories declaring several entries
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Notebook language (python, r, julia)
    #[arg(long, value_name = "SUBCLASS")]
    pub subclass: Option<String>,

    /// Read the descriptor at this path instead of using the manifest
    #[arg(long, value_name = "PATH")]
    pub path: Option<String>,

    /// Only rebuild this version
    #[arg(long = "version", value_name = "NAME", requires = "path")]
    pub version_name: Option<String>,

    /// Print the versions as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the `refresh` command.
pub fn execute(args: RefreshArgs, global: &GlobalOptions) -> Result<()> {
    let ctx = global.connect(SettingsOverrides::default())?;

    let language = DescriptorLanguage::from_short_name(&args.language)?;
    let subclass = match &args.subclass {
        Some(subclass) => DescriptorLanguageSubclass::from_short_name(subclass)?,
        None => DescriptorLanguageSubclass::NotApplicable,
    };
    let mut entry = Entry::new(
        args.kind.into(),
        &args.repository,
        args.name.clone(),
        language,
        subclass,
    )?;
    match &args.path {
        Some(path) => entry.set_default_descriptor_path(path.as_str()),
        None => {
            let facts = RepositoryFacts::fetch(ctx.api(), &args.repository)?;
            set_entry_info(&mut entry, &facts);
        }
    }

    let synchronizer = VersionSynchronizer::new(&ctx);
    let versions = synchronizer.setup_entry_versions(
        &args.repository,
        &entry,
        &BTreeMap::new(),
        args.version_name.as_deref(),
        false,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&versions)?);
        return Ok(());
    }

    let out = global.output();
    println!(
        "{} {}: {} versions",
        emoji(&out, "🔄", "[REFRESH]"),
        entry.entry_path(),
        versions.len()
    );
    let versions: Vec<_> = versions.iter().collect();
    print_versions(&out, &versions, None);
    Ok(())
}
