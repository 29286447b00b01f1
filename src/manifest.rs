//! # Manifest Schema and Parsing
//!
//! This module defines the `.dockstore.yml` (version 1.2) manifest that
//! declares the entries a repository publishes, and the logic for parsing it.
//!
//! ## Key Components
//!
//! - **`ManifestDocument`**: the whole file, with one list per entry variant
//!   (`workflows`, `tools`, `notebooks`) and an optional `service`.
//! - **`EntryDeclaration`**: a uniform, language-resolved view of one
//!   declared entry, used by the synchronizer.
//! - **`Filters`**: branch and tag filters restricting which references
//!   produce versions.
//!
//! ## Parsing
//!
//! Parsing happens in two steps. The text is first read as a generic YAML
//! value; text that is not YAML, or whose root is not a mapping, is
//! [`ManifestError::Malformed`]. The value is then checked for the supported
//! version, deserialized into typed structs and validated (names, languages,
//! duplicates); any failure there is a [`ManifestError::SchemaViolation`].

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

use crate::model::{entry_path, DescriptorLanguage, DescriptorLanguageSubclass, EntryKind, SourceControl};
use crate::path::glob_match;

pub const SUPPORTED_VERSION: &str = "1.2";

/// Why a manifest could not be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// Not YAML, or not a mapping at the root.
    #[error("Malformed .dockstore.yml: {message}")]
    Malformed { message: String },

    /// Well-formed YAML that does not follow the manifest schema.
    #[error("Invalid .dockstore.yml: {message}")]
    SchemaViolation { message: String },
}

fn violation(message: impl Into<String>) -> ManifestError {
    ManifestError::SchemaViolation {
        message: message.into(),
    }
}

/// Branch and tag filters.
///
/// A pattern wrapped in slashes (`/release-.*/`) is a regular expression
/// matched against the whole name; anything else is a glob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filters {
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Filters {
    /// Whether a reference passes the filters.
    ///
    /// With no patterns at all every reference passes. Otherwise a branch
    /// must match a branch pattern and a tag must match a tag pattern.
    pub fn accepts(&self, name: &str, is_tag: bool) -> bool {
        if self.branches.is_empty() && self.tags.is_empty() {
            return true;
        }
        let patterns = if is_tag { &self.tags } else { &self.branches };
        patterns.iter().any(|p| pattern_matches(p, name))
    }
}

fn pattern_matches(pattern: &str, name: &str) -> bool {
    let matched = match pattern
        .strip_prefix('/')
        .and_then(|p| p.strip_suffix('/'))
    {
        Some(expression) => Regex::new(&format!("^(?:{})$", expression))
            .map(|re| re.is_match(name))
            .map_err(crate::error::Error::from),
        None => glob_match(pattern, name),
    };
    matched.unwrap_or_else(|e| {
        log::warn!("Ignoring unusable filter pattern {}: {}", pattern, e);
        false
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Author {
    pub name: Option<String>,
    pub email: Option<String>,
    pub orcid: Option<String>,
    pub affiliation: Option<String>,
    pub role: Option<String>,
}

/// A `workflows` or `tools` item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkflowDeclaration {
    pub name: Option<String>,
    /// Descriptor language short name (`CWL`, `WDL`, ...)
    pub subclass: String,
    pub primary_descriptor_path: String,
    #[serde(default)]
    pub test_parameter_files: Vec<String>,
    #[serde(default)]
    pub other_files: Vec<String>,
    pub read_me_path: Option<String>,
    pub publish: Option<bool>,
    #[serde(default)]
    pub latest_tag_as_default: bool,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub authors: Vec<Author>,
}

/// A `notebooks` item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NotebookDeclaration {
    pub name: Option<String>,
    #[serde(default = "default_notebook_format")]
    pub format: String,
    #[serde(default = "default_notebook_language")]
    pub language: String,
    pub path: String,
    /// Runtime image the notebook runs in
    pub kernel: Option<String>,
    #[serde(default)]
    pub test_parameter_files: Vec<String>,
    #[serde(default)]
    pub other_files: Vec<String>,
    pub read_me_path: Option<String>,
    pub publish: Option<bool>,
    #[serde(default)]
    pub latest_tag_as_default: bool,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub authors: Vec<Author>,
}

fn default_notebook_format() -> String {
    "ipynb".to_string()
}

fn default_notebook_language() -> String {
    "python".to_string()
}

/// The `service` item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServiceDeclaration {
    pub name: Option<String>,
    /// Service flavour (`DOCKER_COMPOSE`, `HELM`, ...)
    pub subclass: String,
    #[serde(default)]
    pub files: Vec<String>,
    pub read_me_path: Option<String>,
    pub publish: Option<bool>,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub authors: Vec<Author>,
    /// Service-specific launch data; kept opaque
    pub data: Option<Value>,
    pub scripts: Option<Value>,
    pub environment: Option<Value>,
}

/// A parsed `.dockstore.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestDocument {
    pub version: String,
    #[serde(default)]
    pub workflows: Vec<WorkflowDeclaration>,
    #[serde(default)]
    pub tools: Vec<WorkflowDeclaration>,
    #[serde(default)]
    pub notebooks: Vec<NotebookDeclaration>,
    pub service: Option<ServiceDeclaration>,
}

/// One declared entry with its language resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDeclaration<'a> {
    pub kind: EntryKind,
    pub name: Option<&'a str>,
    pub language: DescriptorLanguage,
    pub subclass: DescriptorLanguageSubclass,
    /// `None` for services, which have no single primary descriptor
    pub primary_path: Option<&'a str>,
    pub other_files: &'a [String],
    pub test_parameter_files: &'a [String],
    /// Declared files of a service
    pub service_files: &'a [String],
    pub runtime_image: Option<&'a str>,
    pub filters: &'a Filters,
    pub latest_tag_as_default: bool,
}

impl EntryDeclaration<'_> {
    pub fn is_service(&self) -> bool {
        self.language == DescriptorLanguage::Service
    }

    /// `github.com/<org>/<repo>[/<name>]` of the entry this declares.
    pub fn entry_path(&self, repository_id: &str) -> String {
        entry_path(SourceControl::GitHub, repository_id, self.name)
    }
}

impl ManifestDocument {
    /// All declared entries in manifest order: workflows, tools, notebooks,
    /// then the service.
    pub fn entries(&self) -> Result<Vec<EntryDeclaration<'_>>, ManifestError> {
        let mut declared = Vec::new();
        for (kind, items) in [
            (EntryKind::Pipeline, &self.workflows),
            (EntryKind::SingleStepTool, &self.tools),
        ] {
            for item in items {
                let language = DescriptorLanguage::from_short_name(&item.subclass)
                    .map_err(|e| violation(e.to_string()))?;
                if !language.supports(kind) || language == DescriptorLanguage::Service {
                    return Err(violation(format!(
                        "The descriptor type {} is not supported by the {}",
                        language, kind
                    )));
                }
                declared.push(EntryDeclaration {
                    kind,
                    name: item.name.as_deref(),
                    language,
                    subclass: DescriptorLanguageSubclass::NotApplicable,
                    primary_path: Some(item.primary_descriptor_path.as_str()),
                    other_files: &item.other_files,
                    test_parameter_files: &item.test_parameter_files,
                    service_files: &[],
                    runtime_image: None,
                    filters: &item.filters,
                    latest_tag_as_default: item.latest_tag_as_default,
                });
            }
        }
        for item in &self.notebooks {
            let language = DescriptorLanguage::from_short_name(&item.format)
                .map_err(|e| violation(e.to_string()))?;
            if language != DescriptorLanguage::Jupyter {
                return Err(violation(format!("Unsupported notebook format {}", item.format)));
            }
            let subclass = DescriptorLanguageSubclass::from_short_name(&item.language)
                .map_err(|e| violation(e.to_string()))?;
            if !subclass.supports(EntryKind::Notebook) {
                return Err(violation(format!(
                    "Unsupported notebook language {}",
                    item.language
                )));
            }
            declared.push(EntryDeclaration {
                kind: EntryKind::Notebook,
                name: item.name.as_deref(),
                language,
                subclass,
                primary_path: Some(item.path.as_str()),
                other_files: &item.other_files,
                test_parameter_files: &item.test_parameter_files,
                service_files: &[],
                runtime_image: item.kernel.as_deref(),
                filters: &item.filters,
                latest_tag_as_default: item.latest_tag_as_default,
            });
        }
        if let Some(service) = &self.service {
            let subclass = DescriptorLanguageSubclass::from_short_name(&service.subclass)
                .map_err(|e| violation(e.to_string()))?;
            if subclass == DescriptorLanguageSubclass::NotApplicable
                || !subclass.supports(EntryKind::Pipeline)
            {
                return Err(violation(format!(
                    "Unsupported service subclass {}",
                    service.subclass
                )));
            }
            declared.push(EntryDeclaration {
                kind: EntryKind::Pipeline,
                name: service.name.as_deref(),
                language: DescriptorLanguage::Service,
                subclass,
                primary_path: None,
                other_files: &[],
                test_parameter_files: &[],
                service_files: &service.files,
                runtime_image: None,
                filters: &service.filters,
                latest_tag_as_default: false,
            });
        }
        Ok(declared)
    }

    /// The declaration whose entry path equals `entry_path`, among
    /// declarations of `kind`.
    pub fn find_entry(
        &self,
        repository_id: &str,
        kind: EntryKind,
        entry_path: &str,
    ) -> Result<Option<EntryDeclaration<'_>>, ManifestError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|d| d.kind == kind && !d.is_service())
            .find(|d| d.entry_path(repository_id) == entry_path))
    }

    fn validate(&self) -> Result<(), ManifestError> {
        let declared = self.entries()?;
        if declared.is_empty() {
            return Err(violation(
                "At least one workflow, tool, notebook or service must be declared",
            ));
        }
        let name_pattern = Regex::new(r"^[a-zA-Z0-9]+([-_][a-zA-Z0-9]+)*$")
            .map_err(|e| violation(e.to_string()))?;
        let mut seen = HashSet::new();
        for d in &declared {
            if let Some(name) = d.name {
                if !name_pattern.is_match(name) {
                    return Err(violation(format!(
                        "Invalid name '{}': names may only contain letters, digits, and single '-' or '_' separators",
                        name
                    )));
                }
            }
            if let Some(path) = d.primary_path {
                if !path.starts_with('/') {
                    return Err(violation(format!(
                        "Descriptor path '{}' must be absolute",
                        path
                    )));
                }
            }
            if !seen.insert(d.name.map(str::to_ascii_lowercase)) {
                return Err(violation(match d.name {
                    Some(name) => format!("Duplicate entry name '{}'", name),
                    None => "More than one unnamed entry".to_string(),
                }));
            }
        }
        Ok(())
    }
}

/// Parses and validates `.dockstore.yml` content.
pub fn parse(content: &str) -> Result<ManifestDocument, ManifestError> {
    let value: Value = serde_yaml::from_str(content).map_err(|e| ManifestError::Malformed {
        message: e.to_string(),
    })?;
    let Value::Mapping(map) = &value else {
        return Err(ManifestError::Malformed {
            message: "expected a mapping at the top level".to_string(),
        });
    };

    let version = match map.get("version") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(violation("'version' must be a string")),
        None => return Err(violation("missing required property 'version'")),
    };
    if version != SUPPORTED_VERSION {
        return Err(violation(format!(
            "unsupported version {}; expected {}",
            version, SUPPORTED_VERSION
        )));
    }

    let mut normalized = map.clone();
    normalized.insert(Value::from("version"), Value::from(version));
    let document: ManifestDocument = serde_yaml::from_value(Value::Mapping(normalized))
        .map_err(|e| violation(e.to_string()))?;
    document.validate()?;
    Ok(document)
}
