//! # Dockstore Sync Library
//!
//! This library discovers the workflows, tools, notebooks and services a
//! GitHub repository declares in its `.dockstore.yml` manifest, and builds one
//! validated version of each of them per branch and tag. It is used by the
//! `dockstore-sync` command-line tool but can be embedded by any service that
//! needs to keep a registry of versioned entries in step with GitHub.
//!
//! ## Quick Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use chrono::{TimeZone, Utc};
//! use dockstore_sync::config::Settings;
//! use dockstore_sync::context::SyncContext;
//! use dockstore_sync::github::memory::InMemoryRemote;
//! use dockstore_sync::sync::VersionSynchronizer;
//!
//! let remote = InMemoryRemote::new();
//! remote.add_repository("octo/demo", "main", false);
//! remote.commit(
//!     "octo/demo",
//!     "c1",
//!     Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
//!     &[
//!         (
//!             "/.dockstore.yml",
//!             "version: 1.2\nworkflows:\n  - subclass: CWL\n    primaryDescriptorPath: /wf.cwl\n",
//!         ),
//!         ("/wf.cwl", "cwlVersion: v1.2\nclass: Workflow\ninputs: []\noutputs: []\nsteps: {}\n"),
//!     ],
//! );
//! remote.set_branch("octo/demo", "main", "c1");
//!
//! let ctx = SyncContext::new(Arc::new(remote), Settings::default());
//! let report = VersionSynchronizer::new(&ctx).process_repository("octo/demo").unwrap();
//! assert_eq!(report.entries.len(), 1);
//! assert!(report.entries[0].version("main").unwrap().is_valid());
//! ```
//!
//! ## Core Concepts
//!
//! - **Remote access (`github`)**: the [`github::RemoteApi`] trait, its REST
//!   client and an in-memory implementation, reference enumeration and the
//!   rate-limit guard.
//! - **File resolution (`resolver`)**: reads files at a reference, following
//!   symlinks and submodules, through a shared directory-listing cache.
//! - **Manifests (`manifest`)**: parsing and validating `.dockstore.yml`.
//! - **Languages (`languages`)**: per-language import resolution and
//!   validation behind the [`languages::LanguageHandler`] trait.
//! - **Synchronization (`sync`)**: builds versions, attaches them to entries
//!   and picks default versions.
//! - **Model (`model`)**: entries, versions, source files and validations.
//!
//! All shared state of a run lives in an explicitly constructed
//! [`context::SyncContext`].

pub mod cache;
pub mod config;
pub mod context;
pub mod defaults;
pub mod error;
pub mod github;
pub mod languages;
pub mod manifest;
pub mod model;
pub mod output;
pub mod path;
pub mod resolver;
pub mod sync;

#[cfg(test)]
mod path_proptest;
