//! # Remote Repository Access
//!
//! This module owns the abstraction through which the engine talks to the
//! source-control provider. Everything above it sees only [`RemoteApi`]:
//!
//! - **[`client::GitHubClient`]**: the REST implementation over blocking
//!   `reqwest`.
//! - **[`memory::InMemoryRemote`]**: a fixture implementation holding
//!   repositories in memory, used by tests, benches and demos.
//!
//! Implementations perform a single attempt per call; retries are left to
//! callers. They report "nothing there" as [`Error::NotFound`], an empty
//! repository as [`Error::EmptyRepository`], and reserve
//! [`Error::Transport`], [`Error::RateLimitExceeded`] and
//! [`Error::AbuseLimitReached`] for failures that must abort a batch.
//!
//! [`Error::NotFound`]: crate::error::Error::NotFound
//! [`Error::EmptyRepository`]: crate::error::Error::EmptyRepository
//! [`Error::Transport`]: crate::error::Error::Transport
//! [`Error::RateLimitExceeded`]: crate::error::Error::RateLimitExceeded
//! [`Error::AbuseLimitReached`]: crate::error::Error::AbuseLimitReached

pub mod client;
pub mod memory;
pub mod rate_limit;
pub mod refs;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Repository facts needed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// `owner/repo`
    pub full_name: String,
    pub default_branch: String,
    pub private: bool,
}

/// A raw git reference as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRef {
    /// Fully-qualified name, e.g. `refs/heads/main`
    pub name: String,
    /// Object type: `commit`, `tag`, `branch`, ...
    pub object_type: String,
    pub sha: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Dir,
    Symlink,
    Submodule,
}

/// One item of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    /// Path from the repository root, no leading slash
    pub path: String,
    pub kind: ContentKind,
    pub sha: String,
    pub size: u64,
}

/// A single item fetched by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub kind: ContentKind,
    pub path: String,
    pub sha: String,
    pub size: u64,
    /// Decoded text; empty for oversized files
    pub content: String,
    /// Transfer encoding reported by the provider; `none` marks oversized files
    pub encoding: String,
    /// Symlink target
    pub target: Option<String>,
    /// Submodule API URL
    pub git_url: Option<String>,
}

impl FileContent {
    /// The provider left the content out because the file is too large.
    pub fn is_oversized_marker(&self) -> bool {
        self.content.is_empty() && self.encoding == "none"
    }
}

/// Quota snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub limit: u64,
    pub remaining: u64,
}

/// Operations the engine needs from a source-control provider.
pub trait RemoteApi: Send + Sync {
    /// Repository metadata for `owner/repo`.
    fn repository(&self, repository: &str) -> Result<RepositoryInfo>;

    /// References under `namespace` (`refs/heads/` or `refs/tags/`).
    fn list_refs(&self, repository: &str, namespace: &str) -> Result<Vec<RawRef>>;

    /// Whether the repository has at least one tag.
    fn has_tags(&self, repository: &str) -> Result<bool>;

    /// One reference, given without the `refs/` prefix (`heads/main`).
    fn get_ref(&self, repository: &str, qualified: &str) -> Result<RawRef>;

    /// Target SHA of an annotated tag object.
    fn tag_target(&self, repository: &str, tag_sha: &str) -> Result<String>;

    /// Head commit SHA of a branch.
    fn branch_head(&self, repository: &str, branch: &str) -> Result<String>;

    /// Committer date of a commit.
    fn commit_date(&self, repository: &str, sha: &str) -> Result<DateTime<Utc>>;

    /// Items of a directory; `""` lists the root.
    fn directory_listing(
        &self,
        repository: &str,
        dir: &str,
        reference: &str,
    ) -> Result<Vec<ContentEntry>>;

    /// A single file, symlink or submodule.
    fn file_content(&self, repository: &str, path: &str, reference: &str) -> Result<FileContent>;

    /// Raw content of a blob.
    fn blob(&self, repository: &str, sha: &str) -> Result<String>;

    /// Current quota of the acting identity.
    fn rate_limit(&self) -> Result<Quota>;
}
