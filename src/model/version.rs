//! # Entry versions
//!
//! An [`EntryVersion`] is the snapshot of an entry at one repository
//! reference. Versions move through a two-state lifecycle:
//!
//! - **Editable**: every setter applies.
//! - **Frozen**: every setter is a no-op. Only [`VersionMetadata`], reached
//!   through [`EntryVersion::metadata_mut`], stays writable.
//!
//! All writes to the snapshot fields go through a single guard, so a frozen
//! version cannot be changed by adding a new setter and forgetting a check.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::source_file::{DescriptorLanguage, SourceFile, SourceFileSet};
use super::validation::{Validation, ValidationSet};
use crate::path::parent_dir;

/// What kind of git object a version was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceKind {
    Commit,
    Tag,
    Branch,
    NotApplicable,
    #[default]
    Unset,
}

impl ReferenceKind {
    /// Kind of a fully-qualified git reference.
    pub fn from_git_ref(git_ref: &str) -> Self {
        if git_ref.starts_with("refs/heads/") {
            ReferenceKind::Branch
        } else if git_ref.starts_with("refs/tags/") {
            ReferenceKind::Tag
        } else {
            ReferenceKind::NotApplicable
        }
    }
}

/// Lifecycle state of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VersionState {
    #[default]
    Editable,
    Frozen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DescriptionSource {
    Descriptor,
    Readme,
    CustomReadme,
}

/// Language facts gathered while resolving a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedInformation {
    pub language: DescriptorLanguage,
    pub has_http_imports: bool,
    pub has_local_imports: bool,
}

/// The part of a version that stays writable after freezing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionMetadata {
    pub description: Option<String>,
    pub description_source: Option<DescriptionSource>,
    pub parsed_information: Vec<ParsedInformation>,
    pub descriptor_type_versions: Vec<String>,
    pub engine_versions: Vec<String>,
}

impl VersionMetadata {
    pub fn set_description(&mut self, description: impl Into<String>, source: DescriptionSource) {
        self.description = Some(description.into());
        self.description_source = Some(source);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
struct VersionFields {
    name: String,
    reference: Option<String>,
    commit_id: Option<String>,
    last_modified: Option<DateTime<Utc>>,
    descriptor_path: Option<String>,
    reference_kind: ReferenceKind,
    valid: bool,
    dirty: bool,
    legacy: bool,
    synced: bool,
    runtime_image_path: Option<String>,
    auxiliary_paths: Vec<String>,
    source_files: SourceFileSet,
    validations: ValidationSet,
}

/// A snapshot of an entry at one reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryVersion {
    #[serde(flatten)]
    fields: VersionFields,
    state: VersionState,
    metadata: VersionMetadata,
}

impl EntryVersion {
    /// New editable version whose name and reference are both `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut version = Self::default();
        version.fields.reference = Some(name.clone());
        version.fields.name = name;
        version.fields.legacy = true;
        version
    }

    fn mutate(&mut self, change: impl FnOnce(&mut VersionFields)) -> bool {
        match self.state {
            VersionState::Editable => {
                change(&mut self.fields);
                true
            }
            VersionState::Frozen => {
                log::debug!("Ignoring change to frozen version {}", self.fields.name);
                false
            }
        }
    }

    /// Moves the version to the frozen state. There is no way back.
    pub fn freeze(&mut self) {
        self.state = VersionState::Frozen;
    }

    pub fn state(&self) -> VersionState {
        self.state
    }

    pub fn is_frozen(&self) -> bool {
        self.state == VersionState::Frozen
    }

    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn reference(&self) -> Option<&str> {
        self.fields.reference.as_deref()
    }

    pub fn commit_id(&self) -> Option<&str> {
        self.fields.commit_id.as_deref()
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.fields.last_modified
    }

    pub fn descriptor_path(&self) -> Option<&str> {
        self.fields.descriptor_path.as_deref()
    }

    pub fn reference_kind(&self) -> ReferenceKind {
        self.fields.reference_kind
    }

    pub fn is_valid(&self) -> bool {
        self.fields.valid
    }

    pub fn is_dirty(&self) -> bool {
        self.fields.dirty
    }

    pub fn is_legacy(&self) -> bool {
        self.fields.legacy
    }

    pub fn is_synced(&self) -> bool {
        self.fields.synced
    }

    pub fn runtime_image_path(&self) -> Option<&str> {
        self.fields.runtime_image_path.as_deref()
    }

    pub fn auxiliary_paths(&self) -> &[String] {
        &self.fields.auxiliary_paths
    }

    pub fn source_files(&self) -> &SourceFileSet {
        &self.fields.source_files
    }

    pub fn validations(&self) -> &ValidationSet {
        &self.fields.validations
    }

    pub fn metadata(&self) -> &VersionMetadata {
        &self.metadata
    }

    /// Metadata is writable in every state.
    pub fn metadata_mut(&mut self) -> &mut VersionMetadata {
        &mut self.metadata
    }

    /// Parent directory of the descriptor path, without a leading slash.
    pub fn working_directory(&self) -> String {
        self.fields
            .descriptor_path
            .as_deref()
            .map(parent_dir)
            .unwrap_or_default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.mutate(|f| f.name = name);
    }

    pub fn set_reference(&mut self, reference: impl Into<String>) {
        let reference = reference.into();
        self.mutate(|f| f.reference = Some(reference));
    }

    pub fn set_commit_id(&mut self, commit_id: Option<String>) {
        self.mutate(|f| f.commit_id = commit_id);
    }

    pub fn set_last_modified(&mut self, last_modified: Option<DateTime<Utc>>) {
        self.mutate(|f| f.last_modified = last_modified);
    }

    pub fn set_descriptor_path(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.mutate(|f| f.descriptor_path = Some(path));
    }

    pub fn set_reference_kind(&mut self, kind: ReferenceKind) {
        self.mutate(|f| f.reference_kind = kind);
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.mutate(|f| f.valid = valid);
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.mutate(|f| f.dirty = dirty);
    }

    pub fn set_legacy(&mut self, legacy: bool) {
        self.mutate(|f| f.legacy = legacy);
    }

    pub fn set_synced(&mut self, synced: bool) {
        self.mutate(|f| f.synced = synced);
    }

    pub fn set_runtime_image_path(&mut self, path: Option<String>) {
        self.mutate(|f| f.runtime_image_path = path);
    }

    pub fn set_auxiliary_paths(&mut self, paths: Vec<String>) {
        self.mutate(|f| f.auxiliary_paths = paths);
    }

    /// Adds a file, evicting any earlier file with the same path and type.
    pub fn add_source_file(&mut self, file: SourceFile) {
        self.mutate(|f| {
            f.source_files.insert(file);
        });
    }

    pub fn add_source_files(&mut self, files: impl IntoIterator<Item = SourceFile>) {
        self.mutate(|f| f.source_files.extend(files));
    }

    pub fn add_or_update_validation(&mut self, validation: Validation) {
        self.mutate(|f| f.validations.add_or_update(validation));
    }
}

impl Eq for EntryVersion {}

impl PartialOrd for EntryVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Newest first, then name, then reference; missing values sort last.
impl Ord for EntryVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_date = match (self.fields.last_modified, other.fields.last_modified) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let by_reference = match (&self.fields.reference, &other.fields.reference) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date
            .then_with(|| self.fields.name.cmp(&other.fields.name))
            .then(by_reference)
    }
}
