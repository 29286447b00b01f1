//! Workflow Description Language handler.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;

use super::{find_primary, FileSource, LanguageHandler};
use crate::error::Result;
use crate::model::{DescriptorLanguage, FileType, SourceFile, SourceFileSet, VersionTypeValidation};
use crate::path::{join_normalized, parent_dir};

/// Files without a `version` statement are WDL draft-2.
const DRAFT_2: &str = "draft-2";

pub struct WdlHandler;

struct Syntax {
    import: Regex,
    version: Regex,
    workflow: Regex,
    task: Regex,
}

impl Syntax {
    fn new() -> Result<Self> {
        Ok(Self {
            import: Regex::new(r#"(?m)^\s*import\s+["']([^"']+)["']"#)?,
            version: Regex::new(r"(?m)^\s*version\s+([\w.\-]+)")?,
            workflow: Regex::new(r"(?m)^\s*workflow\s+\w+\s*\{")?,
            task: Regex::new(r"(?m)^\s*task\s+\w+\s*\{")?,
        })
    }

    fn imports<'c>(&self, content: &'c str) -> Vec<&'c str> {
        self.import
            .captures_iter(content)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }

    fn version(&self, content: &str) -> String {
        self.version
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| DRAFT_2.to_string())
    }
}

fn is_remote(import: &str) -> bool {
    import.starts_with("http://") || import.starts_with("https://")
}

impl WdlHandler {
    fn collect(
        &self,
        syntax: &Syntax,
        source: &dyn FileSource,
        content: &str,
        path: &str,
        files: &mut BTreeMap<String, SourceFile>,
        visited: &mut HashSet<String>,
    ) -> Result<()> {
        visited.insert(join_normalized("", path));
        let imports = syntax.imports(content);

        let mut file = SourceFile::new(FileType::DockstoreWdl, path, content);
        file.metadata.type_version = Some(syntax.version(content));
        file.metadata.has_http_imports = imports.iter().any(|i| is_remote(i));
        file.metadata.has_local_imports = imports.iter().any(|i| !is_remote(i));
        files.insert(path.to_string(), file);

        let dir = parent_dir(path);
        for import in imports.into_iter().filter(|i| !is_remote(i)) {
            let target = join_normalized(&dir, import);
            if !visited.insert(target.clone()) {
                continue;
            }
            match source.read(&target)? {
                Some(imported) => {
                    self.collect(syntax, source, &imported, &target, files, visited)?
                }
                None => log::debug!("Import {} of {} not found", target, path),
            }
        }
        Ok(())
    }

    fn validate(&self, files: &SourceFileSet, primary_path: &str, tool: bool) -> VersionTypeValidation {
        let Some(primary) = find_primary(files, primary_path) else {
            return VersionTypeValidation::invalid(primary_path, "Primary WDL descriptor is not present.");
        };
        let syntax = match Syntax::new() {
            Ok(s) => s,
            Err(e) => return VersionTypeValidation::invalid(primary_path, e.to_string()),
        };
        let mut outcome = VersionTypeValidation::valid();
        if !syntax.workflow.is_match(&primary.content) {
            outcome.fail(primary.path.clone(), "Primary WDL file must have a workflow section.");
        }
        if tool && syntax.task.find_iter(&primary.content).count() != 1 {
            outcome.fail(primary.path.clone(), "A WDL tool must have exactly one task.");
        }

        let present: HashSet<String> = files
            .of_type(FileType::DockstoreWdl)
            .map(|f| join_normalized("", &f.path))
            .collect();
        for file in files.of_type(FileType::DockstoreWdl) {
            let dir = parent_dir(&file.path);
            let missing: Vec<&str> = syntax
                .imports(&file.content)
                .into_iter()
                .filter(|i| !is_remote(i))
                .filter(|i| !present.contains(&join_normalized(&dir, i)))
                .collect();
            if !missing.is_empty() {
                outcome.fail(
                    file.path.clone(),
                    format!("Could not find imported file(s): {}", missing.join(", ")),
                );
            }
        }
        outcome
    }
}

impl LanguageHandler for WdlHandler {
    fn language(&self) -> DescriptorLanguage {
        DescriptorLanguage::Wdl
    }

    fn resolve_imports(
        &self,
        source: &dyn FileSource,
        content: &str,
        path: &str,
    ) -> Result<BTreeMap<String, SourceFile>> {
        let syntax = Syntax::new()?;
        let mut files = BTreeMap::new();
        let mut visited = HashSet::new();
        self.collect(&syntax, source, content, path, &mut files, &mut visited)?;
        Ok(files)
    }

    fn validate_entry_set(&self, files: &SourceFileSet, primary_path: &str) -> VersionTypeValidation {
        self.validate(files, primary_path, false)
    }

    fn validate_tool_set(&self, files: &SourceFileSet, primary_path: &str) -> VersionTypeValidation {
        self.validate(files, primary_path, true)
    }

    /// WDL inputs are JSON only.
    fn validate_test_parameter_set(&self, files: &SourceFileSet) -> VersionTypeValidation {
        let mut outcome = VersionTypeValidation::valid();
        for file in files.of_type(FileType::WdlTestJson) {
            match serde_json::from_str::<serde_json::Value>(&file.content) {
                Ok(serde_json::Value::Object(_)) => {}
                Ok(_) => outcome.fail(file.path.clone(), "Test parameter file must be a JSON object"),
                Err(e) => outcome.fail(file.path.clone(), format!("Invalid JSON: {}", e)),
            }
        }
        outcome
    }
}
