//! Manifest parsing tests using datatest-stable for test data discovery
//!
//! Every `.yml` file under `tests/testdata/manifests/valid` must parse and
//! declare at least one entry; every file under
//! `tests/testdata/manifests/invalid` must be rejected.

use dockstore_sync::manifest::{parse, ManifestError};
use std::path::Path;

/// A valid manifest parses and every declared entry is usable.
fn test_valid_manifest(path: &Path) -> datatest_stable::Result<()> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read test file {}: {}", path.display(), e))?;

    let document = parse(&content)
        .map_err(|e| format!("Failed to parse manifest {}: {}", path.display(), e))?;
    let entries = document
        .entries()
        .map_err(|e| format!("Invalid entries in {}: {}", path.display(), e))?;

    assert!(
        !entries.is_empty(),
        "Manifest {} should declare at least one entry",
        path.display()
    );
    for entry in &entries {
        if let Some(primary) = entry.primary_path {
            assert!(
                primary.starts_with('/'),
                "Primary path {} in {} is not absolute",
                primary,
                path.display()
            );
        } else {
            assert!(entry.is_service(), "Only services lack a primary path");
        }
        assert!(entry
            .entry_path("octo/demo")
            .starts_with("github.com/octo/demo"));
    }
    Ok(())
}

/// An invalid manifest is rejected with a readable message.
fn test_invalid_manifest(path: &Path) -> datatest_stable::Result<()> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read test file {}: {}", path.display(), e))?;

    match parse(&content) {
        Ok(_) => Err(format!("Manifest {} should have been rejected", path.display()).into()),
        Err(ManifestError::Malformed { message }) | Err(ManifestError::SchemaViolation { message }) => {
            assert!(!message.is_empty(), "Rejection of {} has no message", path.display());
            Ok(())
        }
    }
}

datatest_stable::harness!(
    test_valid_manifest,
    "tests/testdata/manifests/valid",
    r".*\.yml$",
    test_invalid_manifest,
    "tests/testdata/manifests/invalid",
    r".*\.yml$"
);
