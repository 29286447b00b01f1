//! # Version Synchronization
//!
//! Turns the branches and tags of a repository into entry versions.
//!
//! ## Passes
//!
//! - [`VersionSynchronizer::process_repository`]: reads the manifest at
//!   every reference, creates the entries it declares and attaches one
//!   version per entry and reference.
//! - [`VersionSynchronizer::setup_entry_versions`]: rebuilds the versions of
//!   one known entry, skipping references whose commit did not change.
//! - [`VersionSynchronizer::add_manifest_version`]: attaches the version of
//!   a single reference, as done when a push event arrives.
//!
//! References are processed in parallel. Quota and transport failures abort
//! the pass; anything else only drops the reference it happened on.

pub mod entries;
pub mod validation;
pub mod versions;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::context::SyncContext;
use crate::error::{Error, Result};
use crate::github::refs::GitReferenceInfo;
use crate::languages::LanguageRegistry;
use crate::manifest::{self, EntryDeclaration};
use crate::model::{Entry, GitVisibility, ReferenceKind};

pub use entries::{set_entry_info, RepositoryFacts};
pub use validation::{version_validation, PRIMARY_NOT_FOUND};
pub use versions::{initialize_version, should_refresh, skip_placeholder};

/// Outcome of [`VersionSynchronizer::process_repository`].
#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub repository: String,
    pub visibility: GitVisibility,
    /// References that were considered
    pub references: usize,
    /// References without a usable manifest
    pub skipped: usize,
    /// Entries sorted by entry path
    pub entries: Vec<Entry>,
}

/// Synchronizes entries against one remote through a [`SyncContext`].
pub struct VersionSynchronizer<'a> {
    ctx: &'a SyncContext,
    languages: LanguageRegistry,
}

type EntryMap = Mutex<BTreeMap<String, Arc<Mutex<Entry>>>>;

impl<'a> VersionSynchronizer<'a> {
    pub fn new(ctx: &'a SyncContext) -> Self {
        Self::with_languages(ctx, LanguageRegistry::builtin())
    }

    pub fn with_languages(ctx: &'a SyncContext, languages: LanguageRegistry) -> Self {
        Self { ctx, languages }
    }

    pub fn context(&self) -> &SyncContext {
        self.ctx
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    /// Discovers every manifest-declared entry of `repository` and builds
    /// its versions.
    pub fn process_repository(&self, repository: &str) -> Result<SyncReport> {
        let label = format!("process {}", repository);
        self.ctx
            .guard()
            .with_quota_check(self.ctx.api(), &label, || self.process_unguarded(repository))
    }

    fn process_unguarded(&self, repository: &str) -> Result<SyncReport> {
        let facts = RepositoryFacts::fetch(self.ctx.api(), repository)?;
        let references = match self.ctx.references().list_references(repository) {
            Ok(references) => references,
            Err(e) if e.is_not_found() => {
                debug!("No references found for {}", repository);
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        let references = bound_references(references, self.ctx.settings().max_references);

        let entries: EntryMap = Mutex::new(BTreeMap::new());
        let errors: Mutex<Vec<Error>> = Mutex::new(Vec::new());
        let skipped = AtomicUsize::new(0);

        references.par_iter().for_each(|reference| {
            if errors.lock().map(|e| !e.is_empty()).unwrap_or(true) {
                return;
            }
            match self.process_reference(repository, reference, &facts, &entries) {
                Ok(true) => {}
                Ok(false) => {
                    skipped.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) if e.is_fatal() => {
                    if let Ok(mut errors) = errors.lock() {
                        errors.push(e);
                    }
                }
                Err(e) => {
                    warn!("Skipping {} of {}: {}", reference.name, repository, e);
                    skipped.fetch_add(1, Ordering::Relaxed);
                }
            }
        });

        let errors = errors
            .into_inner()
            .map_err(|_| Error::lock_poisoned("synchronization errors"))?;
        if let Some(first) = errors.into_iter().next() {
            return Err(first);
        }

        let entries = entries
            .into_inner()
            .map_err(|_| Error::lock_poisoned("entries"))?;
        let mut collected = Vec::with_capacity(entries.len());
        for entry in entries.into_values() {
            let entry = entry.lock().map_err(|_| Error::lock_poisoned("entry"))?;
            collected.push(entry.clone());
        }

        Ok(SyncReport {
            repository: repository.to_string(),
            visibility: facts.visibility,
            references: references.len(),
            skipped: skipped.into_inner(),
            entries: collected,
        })
    }

    /// Processes the manifest at one reference. `Ok(false)` means the
    /// reference had no usable manifest.
    fn process_reference(
        &self,
        repository: &str,
        reference: &GitReferenceInfo,
        facts: &RepositoryFacts,
        entries: &EntryMap,
    ) -> Result<bool> {
        let Some(manifest_file) = self.read_manifest(repository, &reference.name)? else {
            return Ok(false);
        };
        let document = match manifest::parse(&manifest_file.content) {
            Ok(document) => document,
            Err(e) => {
                warn!(
                    "Invalid {} at {} of {}: {}",
                    manifest_file.path, reference.name, repository, e
                );
                return Ok(false);
            }
        };
        let declarations = match document.entries() {
            Ok(declarations) => declarations,
            Err(e) => {
                warn!("Invalid entries at {} of {}: {}", reference.name, repository, e);
                return Ok(false);
            }
        };

        let is_tag = reference.kind == ReferenceKind::Tag;
        for declaration in declarations {
            if !declaration.filters.accepts(&reference.name, is_tag) {
                debug!(
                    "{} filters out {}",
                    declaration.entry_path(repository),
                    reference.name
                );
                continue;
            }
            let entry = self.entry_for(repository, &declaration, facts, entries)?;
            let latest_tag_as_default =
                declaration.latest_tag_as_default || self.ctx.settings().latest_tag_as_default;
            if let Err(e) = self.add_manifest_version_at(
                repository,
                reference,
                &manifest_file,
                &entry,
                latest_tag_as_default,
                facts,
            ) {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(
                    "Could not add {} to {}: {}",
                    reference.name,
                    declaration.entry_path(repository),
                    e
                );
            }
        }
        Ok(true)
    }

    /// The shared entry for a declaration, created on first sight.
    fn entry_for(
        &self,
        repository: &str,
        declaration: &EntryDeclaration<'_>,
        facts: &RepositoryFacts,
        entries: &EntryMap,
    ) -> Result<Arc<Mutex<Entry>>> {
        let path = declaration.entry_path(repository);
        let mut map = entries.lock().map_err(|_| Error::lock_poisoned("entries"))?;
        if let Some(existing) = map.get(&path) {
            return Ok(Arc::clone(existing));
        }
        let mut entry = Entry::new(
            declaration.kind,
            repository,
            declaration.name.map(str::to_string),
            declaration.language,
            declaration.subclass,
        )?;
        set_entry_info(&mut entry, facts);
        debug!("Tracking new entry {}", path);
        let entry = Arc::new(Mutex::new(entry));
        map.insert(path, Arc::clone(&entry));
        Ok(entry)
    }
}

/// Keeps the `max` most recently changed references.
fn bound_references(
    mut references: Vec<GitReferenceInfo>,
    max: Option<usize>,
) -> Vec<GitReferenceInfo> {
    let Some(max) = max else {
        return references;
    };
    if references.len() > max {
        log::info!(
            "Limiting synchronization to the {} most recent of {} references",
            max,
            references.len()
        );
        references.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.name.cmp(&b.name)));
        references.truncate(max);
    }
    references
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reference(name: &str, day: u32) -> GitReferenceInfo {
        GitReferenceInfo {
            name: name.to_string(),
            full_ref: format!("refs/heads/{}", name),
            kind: ReferenceKind::Branch,
            sha: Some(format!("sha-{}", name)),
            date: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_bound_references_keeps_newest() {
        let refs = vec![reference("a", 1), reference("b", 3), reference("c", 2)];
        let kept: Vec<String> = bound_references(refs, Some(2))
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(kept, vec!["b", "c"]);
    }

    #[test]
    fn test_bound_references_unbounded() {
        let refs = vec![reference("a", 1), reference("b", 3)];
        assert_eq!(bound_references(refs, None).len(), 2);
    }
}
