//! # Entries
//!
//! An [`Entry`] is a unit of work tracked across versions: a pipeline, a
//! notebook or a single-step tool. The variant is a plain discriminant,
//! [`EntryKind`], and every kind-dependent decision (manifest section,
//! validator choice) matches on it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::source_file::{DescriptorLanguage, DescriptorLanguageSubclass, FileType};
use super::version::EntryVersion;
use crate::defaults::DEFAULT_DESCRIPTOR_PATH;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Pipeline,
    Notebook,
    SingleStepTool,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryKind::Pipeline => "workflow",
            EntryKind::Notebook => "notebook",
            EntryKind::SingleStepTool => "tool",
        };
        f.write_str(name)
    }
}

/// How an entry's versions are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryMode {
    Stub,
    Full,
    Hosted,
    ManifestDriven,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceControl {
    #[default]
    GitHub,
}

impl SourceControl {
    pub fn host(self) -> &'static str {
        match self {
            SourceControl::GitHub => "github.com",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GitVisibility {
    /// Visibility could not be determined
    #[default]
    Unknown,
    Private,
    Public,
    /// Not found: either private without access, or absent
    PrivateOrNonExistent,
}

/// A tracked unit of work and its versions.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub kind: EntryKind,
    pub organization: String,
    pub repository: String,
    pub name: Option<String>,
    pub language: DescriptorLanguage,
    pub subclass: DescriptorLanguageSubclass,
    pub mode: EntryMode,
    pub source_control: SourceControl,
    pub git_url: String,
    pub visibility: GitVisibility,
    pub last_updated: DateTime<Utc>,
    default_paths: BTreeMap<FileType, String>,
    versions: BTreeMap<String, EntryVersion>,
    actual_default_version: Option<String>,
}

impl Entry {
    /// Creates an entry for `repository_id` (`owner/repo`).
    ///
    /// Fails when the language or subclass does not support `kind`.
    pub fn new(
        kind: EntryKind,
        repository_id: &str,
        name: Option<String>,
        language: DescriptorLanguage,
        subclass: DescriptorLanguageSubclass,
    ) -> Result<Self> {
        if !language.supports(kind) {
            return Err(Error::UnsupportedDescriptor {
                message: format!("The descriptor type {} is not supported by the {}", language, kind),
            });
        }
        if !subclass.supports(kind) {
            return Err(Error::UnsupportedDescriptor {
                message: format!(
                    "The descriptor type subclass {:?} is not supported by the {}",
                    subclass, kind
                ),
            });
        }
        let (organization, repository) =
            repository_id
                .split_once('/')
                .ok_or_else(|| Error::InvalidReference {
                    reference: repository_id.to_string(),
                })?;
        Ok(Self {
            kind,
            organization: organization.to_string(),
            repository: repository.to_string(),
            name: name.filter(|n| !n.is_empty()),
            language,
            subclass,
            mode: EntryMode::Full,
            source_control: SourceControl::GitHub,
            git_url: format!("git@github.com:{}.git", repository_id),
            visibility: GitVisibility::Unknown,
            last_updated: Utc::now(),
            default_paths: BTreeMap::new(),
            versions: BTreeMap::new(),
            actual_default_version: None,
        })
    }

    /// `owner/repo`
    pub fn repository_id(&self) -> String {
        format!("{}/{}", self.organization, self.repository)
    }

    /// `github.com/<owner>/<repo>[/<name>]`
    pub fn entry_path(&self) -> String {
        entry_path(
            self.source_control,
            &self.repository_id(),
            self.name.as_deref(),
        )
    }

    pub fn file_type(&self) -> FileType {
        self.language.file_type()
    }

    pub fn test_parameter_type(&self) -> FileType {
        self.language.test_param_type()
    }

    pub fn is_tool(&self) -> bool {
        self.kind == EntryKind::SingleStepTool
    }

    pub fn is_service(&self) -> bool {
        self.language == DescriptorLanguage::Service
    }

    /// Default descriptor path for this entry's file type.
    ///
    /// Never absent: falls back to `/Dockstore.cwl`.
    pub fn default_descriptor_path(&self) -> &str {
        self.default_paths
            .get(&self.file_type())
            .map(String::as_str)
            .unwrap_or(DEFAULT_DESCRIPTOR_PATH)
    }

    pub fn set_default_descriptor_path(&mut self, path: impl Into<String>) {
        self.default_paths.insert(self.file_type(), path.into());
    }

    pub fn version(&self, name: &str) -> Option<&EntryVersion> {
        self.versions.get(name)
    }

    /// Versions sorted newest first.
    pub fn versions(&self) -> Vec<&EntryVersion> {
        let mut versions: Vec<&EntryVersion> = self.versions.values().collect();
        versions.sort();
        versions
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    /// Adds or replaces the version with the same name.
    ///
    /// A frozen version already stored under that name is kept and `false`
    /// is returned.
    pub fn add_version(&mut self, version: EntryVersion) -> bool {
        if let Some(existing) = self.versions.get(version.name()) {
            if existing.is_frozen() {
                log::info!(
                    "Version {} of {} is frozen, keeping the stored snapshot",
                    version.name(),
                    self.entry_path()
                );
                return false;
            }
        }
        self.versions.insert(version.name().to_string(), version);
        true
    }

    pub fn actual_default_version(&self) -> Option<&EntryVersion> {
        self.actual_default_version
            .as_deref()
            .and_then(|name| self.versions.get(name))
    }

    /// Points the default at the stored version called `name`.
    pub fn set_actual_default_version(&mut self, name: &str) {
        if self.versions.contains_key(name) {
            self.actual_default_version = Some(name.to_string());
        }
    }
}

/// Builds the `github.com/<owner>/<repo>[/<name>]` path of an entry.
pub fn entry_path(source_control: SourceControl, repository_id: &str, name: Option<&str>) -> String {
    match name.filter(|n| !n.is_empty()) {
        Some(name) => format!("{}/{}/{}", source_control.host(), repository_id, name),
        None => format!("{}/{}", source_control.host(), repository_id),
    }
}
