//! Validation of a materialized version.

use crate::languages::{find_primary, LanguageRegistry};
use crate::model::{Entry, EntryVersion, FileType, Validation, VersionTypeValidation};

pub const PRIMARY_NOT_FOUND: &str = "Primary descriptor file not found.";

/// Validates the files of `version` and sets its validity.
///
/// The descriptor validation is keyed by the entry's descriptor type and
/// uses the tool-set rules for tools. The test-parameter validation always
/// runs. The manifest validation is informational and never makes a
/// version invalid.
pub fn version_validation(
    languages: &LanguageRegistry,
    entry: &Entry,
    version: &mut EntryVersion,
    primary_path: &str,
) {
    let handler = languages.handler_for(entry.language);
    let files = version.source_files();
    let descriptor = match find_primary(files, primary_path) {
        Some(_) if entry.is_tool() => handler.validate_tool_set(files, primary_path),
        Some(_) => handler.validate_entry_set(files, primary_path),
        None => VersionTypeValidation::invalid(primary_path, PRIMARY_NOT_FOUND),
    };
    let test_parameters = handler.validate_test_parameter_set(files);

    version.add_or_update_validation(Validation::new(entry.file_type(), descriptor));
    version.add_or_update_validation(Validation::new(
        entry.test_parameter_type(),
        test_parameters,
    ));
    let valid = version.validations().all_valid_except(FileType::DockstoreYml);
    version.set_valid(valid);
}
