//! Handler for languages without import resolution.
//!
//! The primary descriptor is the only file it returns. Validation checks
//! that the primary has the overall shape its language expects.

use std::collections::BTreeMap;

use serde_yaml::Value;

use super::{find_primary, FileSource, LanguageHandler};
use crate::error::Result;
use crate::model::{DescriptorLanguage, FileType, SourceFile, SourceFileSet, VersionTypeValidation};

pub struct GenericHandler {
    language: DescriptorLanguage,
}

impl GenericHandler {
    pub fn new(language: DescriptorLanguage) -> Self {
        Self { language }
    }

    fn type_version(&self, content: &str) -> Option<String> {
        match self.language {
            DescriptorLanguage::Galaxy => serde_yaml::from_str::<Value>(content)
                .ok()
                .and_then(|d| d.get("format-version").cloned())
                .and_then(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                }),
            DescriptorLanguage::Jupyter => {
                let notebook: serde_json::Value = serde_json::from_str(content).ok()?;
                let major = notebook.get("nbformat")?.as_u64()?;
                let minor = notebook.get("nbformat_minor").and_then(|m| m.as_u64()).unwrap_or(0);
                Some(format!("{}.{}", major, minor))
            }
            _ => None,
        }
    }

    /// Problem with the primary's content, if any.
    fn shape_problem(&self, content: &str) -> Option<String> {
        if content.trim().is_empty() {
            return Some(format!("The {} descriptor is empty.", self.language));
        }
        match self.language {
            DescriptorLanguage::Galaxy => {
                let document: Value = match serde_yaml::from_str(content) {
                    Ok(d) => d,
                    Err(e) => return Some(format!("Galaxy workflow could not be parsed: {}", e)),
                };
                let gxformat2 = document.get("class").and_then(Value::as_str) == Some("GalaxyWorkflow");
                let native = document.get("a_galaxy_workflow").is_some();
                if gxformat2 || native {
                    None
                } else {
                    Some("Not a Galaxy workflow: expected class GalaxyWorkflow.".to_string())
                }
            }
            DescriptorLanguage::Jupyter => match serde_json::from_str::<serde_json::Value>(content) {
                Ok(notebook) if notebook.get("cells").map(|c| c.is_array()).unwrap_or(false) => {
                    None
                }
                Ok(_) => Some("Notebook has no cells.".to_string()),
                Err(e) => Some(format!("Notebook is not valid JSON: {}", e)),
            },
            DescriptorLanguage::Service => match serde_yaml::from_str::<Value>(content) {
                Ok(document) if document.get("service").is_some() => None,
                Ok(_) => Some("The .dockstore.yml does not declare a service.".to_string()),
                Err(e) => Some(format!("The .dockstore.yml could not be parsed: {}", e)),
            },
            _ => None,
        }
    }
}

impl LanguageHandler for GenericHandler {
    fn language(&self) -> DescriptorLanguage {
        self.language
    }

    fn resolve_imports(
        &self,
        _source: &dyn FileSource,
        content: &str,
        path: &str,
    ) -> Result<BTreeMap<String, SourceFile>> {
        let mut primary = SourceFile::new(self.language.file_type(), path, content);
        primary.metadata.type_version = self.type_version(content);
        Ok(BTreeMap::from([(path.to_string(), primary)]))
    }

    fn auxiliary_type(&self, path: &str) -> FileType {
        if self.language == DescriptorLanguage::Nfl && path.ends_with(".config") {
            FileType::NextflowConfig
        } else if self.language == DescriptorLanguage::Service {
            FileType::DockstoreServiceOther
        } else {
            self.language.file_type()
        }
    }

    fn validate_entry_set(&self, files: &SourceFileSet, primary_path: &str) -> VersionTypeValidation {
        let Some(primary) = find_primary(files, primary_path) else {
            return VersionTypeValidation::invalid(
                primary_path,
                format!("Primary {} descriptor is not present.", self.language),
            );
        };
        match self.shape_problem(&primary.content) {
            Some(problem) => VersionTypeValidation::invalid(primary.path.clone(), problem),
            None => VersionTypeValidation::valid(),
        }
    }
}
