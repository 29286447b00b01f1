//! Building one entry version per reference.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use rayon::prelude::*;

use super::{bound_references, validation, VersionSynchronizer};
use crate::defaults::SKIP_COMMIT_ID;
use crate::error::{Error, Result};
use crate::github::refs::GitReferenceInfo;
use crate::languages::{FileSource, VersionFiles};
use crate::model::{
    DescriptorLanguage, Entry, EntryMode, EntryVersion, ParsedInformation, SourceFile,
};
use crate::path::{parent_dir, strip_leading_slash};

/// Whether the version at a reference has to be rebuilt.
///
/// Always when forced, when there is no prior version or it has no commit,
/// or when the commit moved.
pub fn should_refresh(new_commit: Option<&str>, existing: Option<&EntryVersion>, force: bool) -> bool {
    if force {
        return true;
    }
    match existing.and_then(EntryVersion::commit_id) {
        None => true,
        Some(old) => Some(old) != new_commit,
    }
}

/// Stand-in for a version that was not rebuilt, so callers diffing version
/// sets do not delete it.
pub fn skip_placeholder(reference: &GitReferenceInfo) -> EntryVersion {
    let mut version = EntryVersion::new(reference.name.as_str());
    version.set_last_modified(Some(reference.date));
    version.set_reference_kind(reference.kind);
    version.set_commit_id(Some(SKIP_COMMIT_ID.to_string()));
    version
}

/// Fresh version for `reference`, before any file is attached.
///
/// The descriptor path is the entry default, unless the prior version was
/// edited by hand (dirty), whose path is kept.
pub fn initialize_version(
    entry: &Entry,
    reference: &GitReferenceInfo,
    existing: Option<&EntryVersion>,
) -> EntryVersion {
    let mut version = EntryVersion::new(reference.name.as_str());
    version.set_valid(false);
    version.set_synced(true);
    let dirty = existing.map(EntryVersion::is_dirty).unwrap_or(false);
    let path = existing
        .filter(|e| e.is_dirty())
        .and_then(EntryVersion::descriptor_path)
        .unwrap_or_else(|| entry.default_descriptor_path());
    version.set_descriptor_path(path);
    version.set_dirty(dirty);
    version.set_last_modified(Some(reference.date));
    version.set_commit_id(reference.sha.clone());
    version.set_reference_kind(reference.kind);
    version
}

/// Descriptor type versions and import flags gathered from the attached
/// files, copied into the version metadata.
pub(super) fn record_language_metadata(version: &mut EntryVersion, language: DescriptorLanguage) {
    let descriptor_type = language.file_type();
    let mut type_versions: Vec<String> = version
        .source_files()
        .of_type(descriptor_type)
        .filter_map(|f| f.metadata.type_version.clone())
        .collect();
    type_versions.sort();
    type_versions.dedup();
    let parsed = ParsedInformation {
        language,
        has_http_imports: version
            .source_files()
            .of_type(descriptor_type)
            .any(|f| f.metadata.has_http_imports),
        has_local_imports: version
            .source_files()
            .of_type(descriptor_type)
            .any(|f| f.metadata.has_local_imports),
    };
    let metadata = version.metadata_mut();
    metadata.descriptor_type_versions = type_versions;
    metadata.parsed_information = vec![parsed];
}

impl VersionSynchronizer<'_> {
    /// Rebuilds the versions of `entry` from the references of
    /// `repository`.
    ///
    /// `existing` holds the caller's stored versions by name. References
    /// whose commit is unchanged yield a skip placeholder unless
    /// `hard_refresh` is set. With `version_name` only that reference is
    /// considered.
    pub fn setup_entry_versions(
        &self,
        repository: &str,
        entry: &Entry,
        existing: &BTreeMap<String, EntryVersion>,
        version_name: Option<&str>,
        hard_refresh: bool,
    ) -> Result<Vec<EntryVersion>> {
        let label = format!("refresh {}", entry.entry_path());
        self.ctx.guard().with_quota_check(self.ctx.api(), &label, || {
            let mut references = self.ctx.references().list_references(repository)?;
            if let Some(name) = version_name {
                references.retain(|r| r.name == name);
                if references.is_empty() {
                    return Err(Error::InvalidRefresh {
                        version: name.to_string(),
                    });
                }
            }
            let references = bound_references(references, self.ctx.settings().max_references);

            let built: Result<Vec<Option<EntryVersion>>> = references
                .par_iter()
                .map(|reference| {
                    let prior = existing.get(&reference.name);
                    if !should_refresh(reference.sha.as_deref(), prior, hard_refresh) {
                        info!(
                            "Skipping {} of {}: commit is unchanged",
                            reference.name,
                            entry.entry_path()
                        );
                        return Ok(Some(skip_placeholder(reference)));
                    }
                    match self.build_version(repository, reference, entry, prior, version_name, None) {
                        Ok(Some(mut version)) => {
                            record_language_metadata(&mut version, entry.language);
                            Ok(Some(version))
                        }
                        Ok(None) => Ok(None),
                        Err(e) if e.is_fatal() || matches!(e, Error::InvalidRefresh { .. }) => {
                            Err(e)
                        }
                        Err(e) => {
                            warn!(
                                "Could not refresh {} of {}: {}",
                                reference.name,
                                entry.entry_path(),
                                e
                            );
                            Ok(None)
                        }
                    }
                })
                .collect();

            let mut versions: Vec<EntryVersion> = built?.into_iter().flatten().collect();
            versions.sort();
            Ok(versions)
        })
    }

    /// Builds and validates the version of `entry` at `reference`.
    ///
    /// `None` means the reference does not produce a version, for instance
    /// because its manifest is missing or broken.
    pub fn build_version(
        &self,
        repository: &str,
        reference: &GitReferenceInfo,
        entry: &Entry,
        existing: Option<&EntryVersion>,
        version_name: Option<&str>,
        manifest_file: Option<&SourceFile>,
    ) -> Result<Option<EntryVersion>> {
        let mut version = initialize_version(entry, reference, existing);

        let calculated_path = match (entry.mode, version_name) {
            (EntryMode::ManifestDriven, None) => {
                let manifest_file = match manifest_file {
                    Some(file) => file.clone(),
                    None => match self.read_manifest(repository, &reference.name)? {
                        Some(file) => file,
                        None => return Ok(None),
                    },
                };
                match self.setup_entry_files(
                    repository,
                    reference,
                    entry,
                    existing,
                    &manifest_file,
                    &mut version,
                )? {
                    Some(path) => path,
                    None => return Ok(None),
                }
            }
            (EntryMode::ManifestDriven, Some(name)) => {
                let stored = existing
                    .filter(|e| e.name() == name)
                    .ok_or_else(|| Error::InvalidRefresh {
                        version: name.to_string(),
                    })?;
                let path = stored
                    .descriptor_path()
                    .unwrap_or_else(|| entry.default_descriptor_path())
                    .to_string();
                version.set_descriptor_path(path.as_str());
                self.setup_legacy_files(repository, reference, entry, existing, &path, &mut version)?;
                path
            }
            _ => {
                let path = version
                    .descriptor_path()
                    .unwrap_or_else(|| entry.default_descriptor_path())
                    .to_string();
                self.setup_legacy_files(repository, reference, entry, existing, &path, &mut version)?;
                path
            }
        };

        validation::version_validation(&self.languages, entry, &mut version, &calculated_path);
        Ok(Some(version))
    }

    /// Attaches the single descriptor at `path` and its imports.
    fn setup_legacy_files(
        &self,
        repository: &str,
        reference: &GitReferenceInfo,
        entry: &Entry,
        existing: Option<&EntryVersion>,
        path: &str,
        version: &mut EntryVersion,
    ) -> Result<()> {
        let resolver = self.ctx.resolver();
        let Some(content) = resolver.read(repository, &reference.name, path)? else {
            info!(
                "No descriptor at {} on {} of {}",
                path, reference.name, repository
            );
            return Ok(());
        };
        let user_files = existing
            .map(|e| e.auxiliary_paths().to_vec())
            .unwrap_or_default();
        version.set_auxiliary_paths(user_files.clone());
        let source = VersionFiles::new(&resolver, repository, &reference.name, parent_dir(path));
        let primary = SourceFile::new(entry.file_type(), path, content);
        self.combine(entry, &source, primary, &user_files, existing, version)
    }

    /// Merges the primary descriptor, its imports, the declared auxiliary
    /// files and refreshed test-parameter files into `version`.
    pub(super) fn combine(
        &self,
        entry: &Entry,
        source: &dyn FileSource,
        mut primary: SourceFile,
        user_files: &[String],
        existing: Option<&EntryVersion>,
        version: &mut EntryVersion,
    ) -> Result<()> {
        let handler = self.languages.handler_for(entry.language);
        let mut imports = handler.resolve_imports(source, &primary.content, &primary.path)?;

        let import_paths: Vec<String> = imports.keys().cloned().collect();
        let auxiliary = handler.resolve_auxiliary_files(source, user_files, &import_paths)?;
        version.add_source_files(auxiliary.into_values());

        if let Some(existing) = existing {
            let test_type = entry.test_parameter_type();
            for stale in existing.source_files().of_type(test_type) {
                match source.read(&stale.path)? {
                    Some(content) => version.add_source_file(SourceFile::new(
                        test_type,
                        stale.path.clone(),
                        content,
                    )),
                    None => debug!(
                        "Test parameter file {} is gone from {}",
                        stale.path,
                        version.name()
                    ),
                }
            }
        }

        let stripped = strip_leading_slash(&primary.path).to_string();
        if let Some(probed) = imports.get(&primary.path).or_else(|| imports.get(&stripped)) {
            primary.metadata = probed.metadata.clone();
        }
        imports.retain(|path, _| *path != primary.path && *path != stripped);
        version.add_source_file(primary);
        version.add_source_files(imports.into_values());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::context::SyncContext;
    use crate::github::memory::InMemoryRemote;
    use crate::languages::testing::MapSource;
    use crate::languages::{LanguageHandler, LanguageRegistry};
    use crate::model::{
        DescriptorLanguageSubclass, EntryKind, FileType, ReferenceKind, SourceFileSet,
        VersionTypeValidation,
    };
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    /// CWL handler that reports the primary under its slash-less path.
    struct RelativeKeyHandler;

    impl LanguageHandler for RelativeKeyHandler {
        fn language(&self) -> DescriptorLanguage {
            DescriptorLanguage::Cwl
        }

        fn resolve_imports(
            &self,
            _source: &dyn FileSource,
            content: &str,
            path: &str,
        ) -> Result<BTreeMap<String, SourceFile>> {
            let mut primary = SourceFile::new(FileType::DockstoreCwl, strip_leading_slash(path), content);
            primary.metadata.type_version = Some("v1.2".to_string());
            let tool = SourceFile::new(FileType::DockstoreCwl, "tools/x.cwl", "class: CommandLineTool");
            Ok(BTreeMap::from([
                (primary.path.clone(), primary),
                (tool.path.clone(), tool),
            ]))
        }

        fn validate_entry_set(&self, _files: &SourceFileSet, _primary_path: &str) -> VersionTypeValidation {
            VersionTypeValidation::valid()
        }
    }

    fn reference(name: &str, sha: &str) -> GitReferenceInfo {
        GitReferenceInfo {
            name: name.to_string(),
            full_ref: format!("refs/tags/{}", name),
            kind: ReferenceKind::Tag,
            sha: Some(sha.to_string()),
            date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn entry() -> Entry {
        Entry::new(
            EntryKind::Pipeline,
            "octo/demo",
            None,
            DescriptorLanguage::Cwl,
            DescriptorLanguageSubclass::NotApplicable,
        )
        .unwrap()
    }

    #[test]
    fn test_should_refresh() {
        let mut stored = EntryVersion::new("v1");
        assert!(should_refresh(Some("abc"), None, false));
        assert!(should_refresh(Some("abc"), Some(&stored), false));
        stored.set_commit_id(Some("abc".to_string()));
        assert!(!should_refresh(Some("abc"), Some(&stored), false));
        assert!(should_refresh(Some("abc"), Some(&stored), true));
        assert!(should_refresh(Some("def"), Some(&stored), false));
    }

    #[test]
    fn test_skip_placeholder() {
        let placeholder = skip_placeholder(&reference("v1", "abc"));
        assert_eq!(placeholder.name(), "v1");
        assert_eq!(placeholder.reference(), Some("v1"));
        assert_eq!(placeholder.commit_id(), Some(SKIP_COMMIT_ID));
        assert!(placeholder.last_modified().is_some());
    }

    #[test]
    fn test_initialize_uses_default_path() {
        let mut entry = entry();
        entry.set_default_descriptor_path("/main.cwl");
        let version = initialize_version(&entry, &reference("v1", "abc"), None);
        assert_eq!(version.descriptor_path(), Some("/main.cwl"));
        assert!(!version.is_valid());
        assert!(version.is_synced());
        assert!(!version.is_dirty());
        assert_eq!(version.commit_id(), Some("abc"));
    }

    #[test]
    fn test_initialize_keeps_dirty_path() {
        let entry = entry();
        let mut stored = EntryVersion::new("v1");
        stored.set_descriptor_path("/custom.cwl");
        let clean = initialize_version(&entry, &reference("v1", "abc"), Some(&stored));
        assert_eq!(clean.descriptor_path(), Some("/Dockstore.cwl"));

        stored.set_dirty(true);
        let dirty = initialize_version(&entry, &reference("v1", "abc"), Some(&stored));
        assert_eq!(dirty.descriptor_path(), Some("/custom.cwl"));
        assert!(dirty.is_dirty());
    }

    #[test]
    fn test_combine_drops_primary_keyed_without_slash() {
        let ctx = SyncContext::new(Arc::new(InMemoryRemote::new()), Settings::default());
        let mut languages = LanguageRegistry::builtin();
        languages.register(Arc::new(RelativeKeyHandler));
        let synchronizer = VersionSynchronizer::with_languages(&ctx, languages);

        let source = MapSource::new(&[("/wf.cwl", "class: Workflow")]);
        let primary = SourceFile::new(FileType::DockstoreCwl, "/wf.cwl", "class: Workflow");
        let mut version = EntryVersion::new("v1");
        synchronizer
            .combine(&entry(), &source, primary, &[], None, &mut version)
            .unwrap();

        let descriptors: Vec<&SourceFile> =
            version.source_files().of_type(FileType::DockstoreCwl).collect();
        assert_eq!(descriptors.len(), 2);
        let primaries: Vec<&&SourceFile> = descriptors
            .iter()
            .filter(|f| strip_leading_slash(&f.path) == "wf.cwl")
            .collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].path, "/wf.cwl");
        assert_eq!(primaries[0].metadata.type_version.as_deref(), Some("v1.2"));
        assert!(version.source_files().contains("tools/x.cwl", FileType::DockstoreCwl));
    }

    #[test]
    fn test_record_language_metadata() {
        let mut version = EntryVersion::new("v1");
        let mut primary = SourceFile::new(crate::model::FileType::DockstoreCwl, "/a.cwl", "");
        primary.metadata.type_version = Some("v1.2".to_string());
        primary.metadata.has_http_imports = true;
        let mut other = SourceFile::new(crate::model::FileType::DockstoreCwl, "/b.cwl", "");
        other.metadata.type_version = Some("v1.2".to_string());
        version.add_source_files([primary, other]);

        record_language_metadata(&mut version, DescriptorLanguage::Cwl);
        let metadata = version.metadata();
        assert_eq!(metadata.descriptor_type_versions, vec!["v1.2"]);
        assert!(metadata.parsed_information[0].has_http_imports);
        assert!(!metadata.parsed_information[0].has_local_imports);
    }
}
