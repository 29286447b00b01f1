//! Manifest-driven entries: entry setup, manifest file materialization and
//! attaching versions with default-version promotion.

use std::sync::Mutex;

use log::{debug, info, warn};

use super::versions::record_language_metadata;
use super::VersionSynchronizer;
use crate::defaults::MANIFEST_PATHS;
use crate::error::{Error, Result};
use crate::github::refs::GitReferenceInfo;
use crate::github::RemoteApi;
use crate::languages::{FileSource, VersionFiles};
use crate::manifest;
use crate::model::{
    Entry, EntryMode, EntryVersion, FileType, GitVisibility, ReferenceKind, SourceFile,
    Validation, VersionTypeValidation,
};

/// Repository-level facts an entry inherits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryFacts {
    pub visibility: GitVisibility,
    /// Branch the provider reports as default
    pub default_branch: Option<String>,
}

impl RepositoryFacts {
    /// Reads repository metadata.
    ///
    /// Not found means private without access or absent; any other
    /// non-fatal failure leaves the visibility unknown.
    pub fn fetch(api: &dyn RemoteApi, repository: &str) -> Result<Self> {
        match api.repository(repository) {
            Ok(info) => Ok(Self {
                visibility: if info.private {
                    GitVisibility::Private
                } else {
                    GitVisibility::Public
                },
                default_branch: Some(info.default_branch),
            }),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) if e.is_not_found() => Ok(Self {
                visibility: GitVisibility::PrivateOrNonExistent,
                default_branch: None,
            }),
            Err(e) => {
                warn!("Could not determine visibility of {}: {}", repository, e);
                Ok(Self {
                    visibility: GitVisibility::Unknown,
                    default_branch: None,
                })
            }
        }
    }
}

/// Marks an entry as manifest-driven and copies repository facts onto it.
pub fn set_entry_info(entry: &mut Entry, facts: &RepositoryFacts) {
    entry.mode = EntryMode::ManifestDriven;
    entry.git_url = format!("git@github.com:{}.git", entry.repository_id());
    entry.set_default_descriptor_path(MANIFEST_PATHS[0]);
    entry.visibility = facts.visibility;
}

fn missing_files_message(missing: &[&str]) -> String {
    let quoted: Vec<String> = missing.iter().map(|p| format!("'{}'", p)).collect();
    if missing.len() == 1 {
        format!("The following file is missing: {}.", quoted.join(", "))
    } else {
        format!("The following files are missing: {}.", quoted.join(", "))
    }
}

/// Whether `candidate` should become the entry's default version.
///
/// With the latest-tag policy a tag wins when nothing is default yet or
/// when it is strictly newer than the current default. Otherwise the
/// repository's default branch is promoted when nothing is default yet.
pub fn should_promote(
    entry: &Entry,
    candidate: &EntryVersion,
    latest_tag_as_default: bool,
    default_branch: Option<&str>,
) -> bool {
    let current = entry.actual_default_version();
    let kind = candidate.reference_kind();
    if latest_tag_as_default && kind == ReferenceKind::Tag {
        return match current {
            None => true,
            Some(current) => match (current.last_modified(), candidate.last_modified()) {
                (Some(old), Some(new)) => old < new,
                (None, Some(_)) => true,
                _ => false,
            },
        };
    }
    current.is_none()
        && !latest_tag_as_default
        && kind == ReferenceKind::Branch
        && default_branch == Some(candidate.name())
}

impl VersionSynchronizer<'_> {
    /// The manifest at `reference`, from the first of the known locations
    /// that holds one.
    pub fn read_manifest(&self, repository: &str, reference: &str) -> Result<Option<SourceFile>> {
        let resolver = self.ctx.resolver();
        for path in MANIFEST_PATHS {
            if let Some(content) = resolver.read(repository, reference, path)? {
                return Ok(Some(SourceFile::new(FileType::DockstoreYml, path, content)));
            }
        }
        debug!("No manifest at {} of {}", reference, repository);
        Ok(None)
    }

    /// Attaches the files the manifest declares for `entry` to `version`.
    ///
    /// Returns the primary descriptor path to validate against, or `None`
    /// when the manifest is unusable or does not declare the entry.
    pub(super) fn setup_entry_files(
        &self,
        repository: &str,
        reference: &GitReferenceInfo,
        entry: &Entry,
        existing: Option<&EntryVersion>,
        manifest_file: &SourceFile,
        version: &mut EntryVersion,
    ) -> Result<Option<String>> {
        let document = match manifest::parse(&manifest_file.content) {
            Ok(document) => document,
            Err(e) => {
                warn!(
                    "Invalid {} at {} of {}: {}",
                    manifest_file.path, reference.name, repository, e
                );
                return Ok(None);
            }
        };
        let manifest_type = if entry.is_service() {
            FileType::DockstoreServiceYml
        } else {
            FileType::DockstoreYml
        };
        version.add_source_file(manifest_file.with_type(manifest_type));
        version.set_legacy(false);

        let resolver = self.ctx.resolver();
        if entry.is_service() {
            let Some(service) = document.service.as_ref() else {
                info!("No service declared at {} of {}", reference.name, repository);
                return Ok(None);
            };
            for path in &service.files {
                match resolver.read(repository, &reference.name, path)? {
                    Some(content) => version.add_source_file(SourceFile::new(
                        FileType::DockstoreServiceOther,
                        path.clone(),
                        content,
                    )),
                    None => warn!(
                        "Service file {} is missing at {} of {}",
                        path, reference.name, repository
                    ),
                }
            }
            version.set_descriptor_path(manifest_file.path.clone());
            return Ok(Some(manifest_file.path.clone()));
        }

        let declaration =
            match document.find_entry(&entry.repository_id(), entry.kind, &entry.entry_path()) {
                Ok(Some(declaration)) => declaration,
                Ok(None) => {
                    info!(
                        "{} is not declared at {} of {}",
                        entry.entry_path(),
                        reference.name,
                        repository
                    );
                    return Ok(None);
                }
                Err(e) => {
                    warn!("Invalid entries at {} of {}: {}", reference.name, repository, e);
                    return Ok(None);
                }
            };
        let Some(primary_path) = declaration.primary_path else {
            return Ok(None);
        };

        version.set_auxiliary_paths(declaration.other_files.to_vec());
        version.set_runtime_image_path(declaration.runtime_image.map(str::to_string));
        version.set_descriptor_path(primary_path);

        let source = VersionFiles::new(
            &resolver,
            repository,
            &reference.name,
            version.working_directory(),
        );
        let mut messages = Vec::new();
        match resolver.read(repository, &reference.name, primary_path)? {
            Some(content) => {
                let primary = SourceFile::new(entry.file_type(), primary_path, content);
                self.combine(entry, &source, primary, declaration.other_files, existing, version)?;

                let test_type = entry.test_parameter_type();
                let mut missing = Vec::new();
                for path in declaration.test_parameter_files {
                    if version.source_files().contains(path, test_type) {
                        continue;
                    }
                    match source.read(path)? {
                        Some(content) => version
                            .add_source_file(SourceFile::new(test_type, path.clone(), content)),
                        None => missing.push(path.as_str()),
                    }
                }
                if !missing.is_empty() {
                    messages.push(missing_files_message(&missing));
                }
            }
            None => messages.push(format!(
                "Could not find the primary descriptor file '{}'.",
                primary_path
            )),
        }

        if !messages.is_empty() {
            let mut outcome = VersionTypeValidation::valid();
            outcome
                .messages
                .insert(manifest_file.path.clone(), messages.join(" "));
            version.add_or_update_validation(Validation::new(FileType::DockstoreYml, outcome));
        }
        Ok(Some(primary_path.to_string()))
    }

    /// Builds the version of `git_ref` from `manifest_file`, attaches it to
    /// `entry` and runs default-version promotion.
    ///
    /// Returns the stored version, or `None` when the manifest does not
    /// declare the entry.
    pub fn add_manifest_version(
        &self,
        repository: &str,
        git_ref: &str,
        manifest_file: &SourceFile,
        entry: &Mutex<Entry>,
        latest_tag_as_default: bool,
    ) -> Result<Option<EntryVersion>> {
        let reference = self.ctx.references().lookup(repository, git_ref)?;
        let facts = RepositoryFacts::fetch(self.ctx.api(), repository)?;
        self.add_manifest_version_at(
            repository,
            &reference,
            manifest_file,
            entry,
            latest_tag_as_default,
            &facts,
        )
    }

    pub(super) fn add_manifest_version_at(
        &self,
        repository: &str,
        reference: &GitReferenceInfo,
        manifest_file: &SourceFile,
        entry: &Mutex<Entry>,
        latest_tag_as_default: bool,
        facts: &RepositoryFacts,
    ) -> Result<Option<EntryVersion>> {
        // Materialize on a snapshot so other references are not blocked.
        let snapshot = entry
            .lock()
            .map_err(|_| Error::lock_poisoned("entry"))?
            .clone();
        let existing = snapshot.version(&reference.name);
        let Some(mut version) = self.build_version(
            repository,
            reference,
            &snapshot,
            existing,
            None,
            Some(manifest_file),
        )?
        else {
            return Ok(None);
        };
        version.set_reference_kind(ReferenceKind::from_git_ref(&reference.full_ref));
        record_language_metadata(&mut version, snapshot.language);

        let mut entry = entry.lock().map_err(|_| Error::lock_poisoned("entry"))?;
        let name = version.name().to_string();
        if entry.add_version(version) {
            let promote = entry
                .version(&name)
                .map(|v| {
                    should_promote(
                        &entry,
                        v,
                        latest_tag_as_default,
                        facts.default_branch.as_deref(),
                    )
                })
                .unwrap_or(false);
            if promote {
                info!("Default version of {} is now {}", entry.entry_path(), name);
                entry.set_actual_default_version(&name);
            }
        }
        Ok(entry.version(&name).cloned())
    }
}
