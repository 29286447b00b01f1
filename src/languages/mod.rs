//! # Descriptor Languages
//!
//! Everything language-specific lives behind [`LanguageHandler`]: finding
//! the files a descriptor imports, reading user-declared auxiliary files and
//! validating the resulting file set. The synchronizer only ever merges the
//! returned files by path.
//!
//! Handlers read through a [`FileSource`], a capability bound to one
//! repository, reference and working directory, so they never see how
//! files are fetched. [`LanguageRegistry`] maps a descriptor file type to
//! its handler; languages without a dedicated handler get
//! [`generic::GenericHandler`].

pub mod cwl;
pub mod generic;
pub mod wdl;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::Result;
use crate::model::{DescriptorLanguage, FileType, SourceFile, SourceFileSet, VersionTypeValidation};
use crate::path::resolve_relative;
use crate::resolver::FileResolver;

/// Read access to the files of one version.
pub trait FileSource {
    /// Directory relative paths are resolved against.
    fn working_directory(&self) -> &str;

    /// Content of a file; relative paths start at the working directory.
    fn read(&self, path: &str) -> Result<Option<String>>;

    /// Every file at or below `path`, skipping `excludes`.
    fn read_path(&self, path: &str, excludes: &[String]) -> Result<BTreeMap<String, String>>;
}

/// [`FileSource`] over a [`FileResolver`].
pub struct VersionFiles<'a> {
    resolver: &'a FileResolver<'a>,
    repository: &'a str,
    reference: &'a str,
    working_directory: String,
}

impl<'a> VersionFiles<'a> {
    pub fn new(
        resolver: &'a FileResolver<'a>,
        repository: &'a str,
        reference: &'a str,
        working_directory: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            repository,
            reference,
            working_directory: working_directory.into(),
        }
    }
}

impl FileSource for VersionFiles<'_> {
    fn working_directory(&self) -> &str {
        &self.working_directory
    }

    fn read(&self, path: &str) -> Result<Option<String>> {
        let resolved = resolve_relative(&self.working_directory, path);
        self.resolver.read(self.repository, self.reference, &resolved)
    }

    fn read_path(&self, path: &str, excludes: &[String]) -> Result<BTreeMap<String, String>> {
        let resolved = resolve_relative(&self.working_directory, path);
        self.resolver
            .read_path(self.repository, self.reference, &resolved, excludes)
    }
}

/// Language-specific import resolution and validation.
pub trait LanguageHandler: Send + Sync {
    fn language(&self) -> DescriptorLanguage;

    /// The primary descriptor at `path` plus every file it transitively
    /// imports, keyed by path. The primary carries the metadata probed from
    /// its content.
    fn resolve_imports(
        &self,
        source: &dyn FileSource,
        content: &str,
        path: &str,
    ) -> Result<BTreeMap<String, SourceFile>>;

    /// Type given to a user-declared auxiliary file.
    fn auxiliary_type(&self, _path: &str) -> FileType {
        self.language().file_type()
    }

    /// Reads user-declared auxiliary files, skipping `excludes`.
    fn resolve_auxiliary_files(
        &self,
        source: &dyn FileSource,
        declared: &[String],
        excludes: &[String],
    ) -> Result<BTreeMap<String, SourceFile>> {
        let mut files = BTreeMap::new();
        for path in declared {
            for (found, content) in source.read_path(path, excludes)? {
                let file = SourceFile::new(self.auxiliary_type(&found), found.clone(), content);
                files.insert(found, file);
            }
        }
        Ok(files)
    }

    /// Validates the files of a pipeline or notebook.
    fn validate_entry_set(&self, files: &SourceFileSet, primary_path: &str) -> VersionTypeValidation;

    /// Validates the files of a single-step tool.
    fn validate_tool_set(&self, files: &SourceFileSet, primary_path: &str) -> VersionTypeValidation {
        self.validate_entry_set(files, primary_path)
    }

    /// Validates the test-parameter files: each one must hold structured
    /// data.
    fn validate_test_parameter_set(&self, files: &SourceFileSet) -> VersionTypeValidation {
        let mut outcome = VersionTypeValidation::valid();
        for file in files.of_type(self.language().test_param_type()) {
            if let Some(problem) = structured_content_problem(&file.content) {
                outcome.fail(file.path.clone(), problem);
            }
        }
        outcome
    }
}

/// Why `content` is not a JSON or YAML document, if it is not.
pub fn structured_content_problem(content: &str) -> Option<String> {
    if content.trim().is_empty() {
        return Some("File is empty".to_string());
    }
    if serde_json::from_str::<serde_json::Value>(content).is_ok() {
        return None;
    }
    match serde_yaml::from_str::<serde_yaml::Value>(content) {
        Ok(serde_yaml::Value::Mapping(_)) | Ok(serde_yaml::Value::Sequence(_)) => None,
        Ok(_) => Some("File is not a JSON or YAML object".to_string()),
        Err(e) => Some(format!("File could not be parsed: {}", e)),
    }
}

/// The file at `primary_path`, matching with or without a leading slash.
pub fn find_primary<'s>(files: &'s SourceFileSet, primary_path: &str) -> Option<&'s SourceFile> {
    files.find_by_path(primary_path).or_else(|| {
        let stripped = primary_path.trim_start_matches('/');
        files.iter().find(|f| f.path.trim_start_matches('/') == stripped)
    })
}

/// Handlers by descriptor file type.
#[derive(Clone)]
pub struct LanguageRegistry {
    handlers: HashMap<FileType, Arc<dyn LanguageHandler>>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LanguageRegistry {
    /// An empty registry; every language falls back to the generic handler.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with the built-in handlers.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(cwl::CwlHandler));
        registry.register(Arc::new(wdl::WdlHandler));
        for language in [
            DescriptorLanguage::Nfl,
            DescriptorLanguage::Galaxy,
            DescriptorLanguage::Smk,
            DescriptorLanguage::Jupyter,
            DescriptorLanguage::Service,
        ] {
            registry.register(Arc::new(generic::GenericHandler::new(language)));
        }
        registry
    }

    /// Adds or replaces the handler for its language's descriptor type.
    pub fn register(&mut self, handler: Arc<dyn LanguageHandler>) {
        self.handlers
            .insert(handler.language().file_type(), handler);
    }

    pub fn handler_for(&self, language: DescriptorLanguage) -> Arc<dyn LanguageHandler> {
        self.handlers
            .get(&language.file_type())
            .cloned()
            .unwrap_or_else(|| Arc::new(generic::GenericHandler::new(language)))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MapSource;
    use super::*;

    #[test]
    fn test_registry_dispatch() {
        let registry = LanguageRegistry::builtin();
        assert_eq!(
            registry.handler_for(DescriptorLanguage::Wdl).language(),
            DescriptorLanguage::Wdl
        );
        let fallback = LanguageRegistry::empty().handler_for(DescriptorLanguage::Cwl);
        assert_eq!(fallback.language(), DescriptorLanguage::Cwl);
    }

    #[test]
    fn test_auxiliary_files_skip_excludes() {
        let source = MapSource::new(&[
            ("/wf/data/a.txt", "a"),
            ("/wf/data/b.txt", "b"),
            ("/wf/main.cwl", "class: Workflow"),
        ]);
        let handler = LanguageRegistry::builtin().handler_for(DescriptorLanguage::Cwl);
        let files = handler
            .resolve_auxiliary_files(
                &source,
                &["/wf/data".to_string()],
                &["/wf/data/b.txt".to_string()],
            )
            .unwrap();
        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["/wf/data/a.txt"]);
        assert_eq!(files["/wf/data/a.txt"].file_type, FileType::DockstoreCwl);
    }

    #[test]
    fn test_structured_content_problem() {
        assert_eq!(structured_content_problem(r#"{"x": 1}"#), None);
        assert_eq!(structured_content_problem("x: 1\ny: 2\n"), None);
        assert!(structured_content_problem("").is_some());
        assert!(structured_content_problem("just words").is_some());
    }

    #[test]
    fn test_test_parameter_validation() {
        let mut files = SourceFileSet::new();
        files.insert(SourceFile::new(FileType::CwlTestJson, "/ok.json", r#"{"a": 1}"#));
        files.insert(SourceFile::new(FileType::CwlTestJson, "/bad.json", "{"));
        let outcome = LanguageRegistry::builtin()
            .handler_for(DescriptorLanguage::Cwl)
            .validate_test_parameter_set(&files);
        assert!(!outcome.valid);
        assert!(outcome.messages.contains_key("/bad.json"));
        assert!(!outcome.messages.contains_key("/ok.json"));
    }
}
