//! Common Workflow Language handler.
//!
//! Imports are the string values of `run`, `$import` and `$include`,
//! resolved relative to the importing file. Remote (`http(s)://`) imports
//! are flagged but not fetched.

use std::collections::{BTreeMap, HashSet};

use serde_yaml::Value;

use super::{find_primary, FileSource, LanguageHandler};
use crate::error::Result;
use crate::model::{DescriptorLanguage, FileType, SourceFile, SourceFileSet, VersionTypeValidation};
use crate::path::{join_normalized, parent_dir};

const IMPORT_KEYS: [&str; 3] = ["run", "$import", "$include"];
const TOOL_CLASSES: [&str; 2] = ["CommandLineTool", "ExpressionTool"];

pub struct CwlHandler;

#[derive(Debug, Default, PartialEq, Eq)]
struct References {
    local: Vec<String>,
    http: bool,
}

fn scan(value: &Value, found: &mut References) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let is_import = key
                    .as_str()
                    .map(|k| IMPORT_KEYS.contains(&k))
                    .unwrap_or(false);
                if let (true, Some(target)) = (is_import, child.as_str()) {
                    let target = target.split('#').next().unwrap_or_default();
                    if target.starts_with("http://") || target.starts_with("https://") {
                        found.http = true;
                    } else if !target.is_empty() {
                        found.local.push(target.to_string());
                    }
                } else {
                    scan(child, found);
                }
            }
        }
        Value::Sequence(items) => items.iter().for_each(|i| scan(i, found)),
        Value::Tagged(tagged) => scan(&tagged.value, found),
        _ => {}
    }
}

fn cwl_version(document: &Value) -> Option<String> {
    document
        .get("cwlVersion")
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl CwlHandler {
    fn collect(
        &self,
        source: &dyn FileSource,
        content: &str,
        path: &str,
        files: &mut BTreeMap<String, SourceFile>,
        visited: &mut HashSet<String>,
    ) -> Result<()> {
        visited.insert(join_normalized("", path));
        let document: Option<Value> = serde_yaml::from_str(content).ok();
        let mut references = References::default();
        if let Some(document) = &document {
            scan(document, &mut references);
        }

        let mut file = SourceFile::new(FileType::DockstoreCwl, path, content);
        file.metadata.type_version = document.as_ref().and_then(cwl_version);
        file.metadata.has_http_imports = references.http;
        file.metadata.has_local_imports = !references.local.is_empty();
        files.insert(path.to_string(), file);

        let dir = parent_dir(path);
        for relative in references.local {
            let target = join_normalized(&dir, &relative);
            if !visited.insert(target.clone()) {
                continue;
            }
            match source.read(&target)? {
                Some(imported) => self.collect(source, &imported, &target, files, visited)?,
                None => log::debug!("Import {} of {} not found", target, path),
            }
        }
        Ok(())
    }

    fn validate(&self, files: &SourceFileSet, primary_path: &str, tool: bool) -> VersionTypeValidation {
        let Some(primary) = find_primary(files, primary_path) else {
            return VersionTypeValidation::invalid(primary_path, "Primary CWL descriptor is not present.");
        };
        let mut outcome = VersionTypeValidation::valid();
        match serde_yaml::from_str::<Value>(&primary.content) {
            Ok(document) => {
                if cwl_version(&document).is_none() {
                    outcome.fail(primary.path.clone(), "Missing valid cwlVersion.");
                }
                let classes = top_level_classes(&document);
                let expected = if tool {
                    classes.iter().any(|c| TOOL_CLASSES.contains(&c.as_str()))
                } else {
                    classes.iter().any(|c| c == "Workflow")
                };
                if !expected {
                    let message = if tool {
                        "A CWL tool must have class CommandLineTool or ExpressionTool."
                    } else {
                        "A CWL workflow must have class Workflow."
                    };
                    outcome.fail(primary.path.clone(), message);
                }
            }
            Err(e) => outcome.fail(
                primary.path.clone(),
                format!("CWL file is malformed, cannot extract metadata: {}", e),
            ),
        }
        for file in files.of_type(FileType::DockstoreCwl) {
            if file.path == primary.path {
                continue;
            }
            if let Err(e) = serde_yaml::from_str::<Value>(&file.content) {
                outcome.fail(file.path.clone(), format!("CWL file is malformed: {}", e));
            }
        }
        outcome
    }
}

/// `class` of the document, or of each `$graph` item.
fn top_level_classes(document: &Value) -> Vec<String> {
    let class_of = |v: &Value| v.get("class").and_then(Value::as_str).map(str::to_string);
    match document.get("$graph").and_then(Value::as_sequence) {
        Some(graph) => graph.iter().filter_map(class_of).collect(),
        None => class_of(document).into_iter().collect(),
    }
}

impl LanguageHandler for CwlHandler {
    fn language(&self) -> DescriptorLanguage {
        DescriptorLanguage::Cwl
    }

    fn resolve_imports(
        &self,
        source: &dyn FileSource,
        content: &str,
        path: &str,
    ) -> Result<BTreeMap<String, SourceFile>> {
        let mut files = BTreeMap::new();
        let mut visited = HashSet::new();
        self.collect(source, content, path, &mut files, &mut visited)?;
        Ok(files)
    }

    fn validate_entry_set(&self, files: &SourceFileSet, primary_path: &str) -> VersionTypeValidation {
        self.validate(files, primary_path, false)
    }

    fn validate_tool_set(&self, files: &SourceFileSet, primary_path: &str) -> VersionTypeValidation {
        self.validate(files, primary_path, true)
    }
}
