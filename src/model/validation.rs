//! Validation results recorded on a version.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

use super::source_file::FileType;

/// Outcome of one validator run: a flag plus path-to-diagnostic messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTypeValidation {
    pub valid: bool,
    pub messages: BTreeMap<String, String>,
}

impl VersionTypeValidation {
    pub fn valid() -> Self {
        Self {
            valid: true,
            messages: BTreeMap::new(),
        }
    }

    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        let mut messages = BTreeMap::new();
        messages.insert(path.into(), message.into());
        Self {
            valid: false,
            messages,
        }
    }

    /// Records a diagnostic and marks the outcome invalid.
    pub fn fail(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.messages.insert(path.into(), message.into());
    }
}

/// Stored validation: file type, flag and a JSON-serialized message map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub file_type: FileType,
    pub valid: bool,
    pub message: String,
}

impl Validation {
    pub fn new(file_type: FileType, outcome: VersionTypeValidation) -> Self {
        let message = serde_json::to_string(&outcome.messages).unwrap_or_else(|_| "{}".into());
        Self {
            file_type,
            valid: outcome.valid,
            message,
        }
    }

    /// Decodes the message map. An undecodable message yields an empty map.
    pub fn messages(&self) -> BTreeMap<String, String> {
        serde_json::from_str(&self.message).unwrap_or_default()
    }
}

/// Validations of a version, unique by file type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationSet {
    by_type: BTreeMap<FileType, Validation>,
}

impl ValidationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a validation; an existing one of the same type takes the new
    /// flag and message.
    pub fn add_or_update(&mut self, validation: Validation) {
        match self.by_type.get_mut(&validation.file_type) {
            Some(existing) => {
                existing.valid = validation.valid;
                existing.message = validation.message;
            }
            None => {
                self.by_type.insert(validation.file_type, validation);
            }
        }
    }

    pub fn get(&self, file_type: FileType) -> Option<&Validation> {
        self.by_type.get(&file_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Validation> {
        self.by_type.values()
    }

    /// Logical AND over every validation except the one of type `excluded`.
    pub fn all_valid_except(&self, excluded: FileType) -> bool {
        self.by_type
            .values()
            .filter(|v| v.file_type != excluded)
            .all(|v| v.valid)
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

impl Serialize for ValidationSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.by_type.values())
    }
}
