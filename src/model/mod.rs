//! # Data Model
//!
//! Entities produced by a synchronization pass:
//!
//! - [`Entry`]: a pipeline, notebook or single-step tool.
//! - [`EntryVersion`]: a snapshot of an entry at one reference.
//! - [`SourceFile`]: one retrieved file, unique per version by path and type.
//! - [`Validation`]: per file-type validation outcome.
//!
//! All entities derive `serde::Serialize` so callers can hand them to a
//! persistence layer or print them as JSON.

pub mod entry;
pub mod source_file;
pub mod validation;
pub mod version;

pub use entry::{entry_path, Entry, EntryKind, EntryMode, GitVisibility, SourceControl};
pub use source_file::{
    DescriptorLanguage, DescriptorLanguageSubclass, FileType, SourceFile, SourceFileMetadata,
    SourceFileSet,
};
pub use validation::{Validation, ValidationSet, VersionTypeValidation};
pub use version::{
    DescriptionSource, EntryVersion, ParsedInformation, ReferenceKind, VersionMetadata,
    VersionState,
};
