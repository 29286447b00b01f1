//! In-memory [`RemoteApi`] implementation.
//!
//! Holds repositories as commits of path-to-node maps, plus branches and
//! tags pointing at commits. Every call is recorded and consumes one unit of
//! a simulated quota, so callers can assert on caching and rate-limit
//! behaviour without a network.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};

use super::{ContentEntry, ContentKind, FileContent, Quota, RawRef, RemoteApi, RepositoryInfo};
use crate::error::{Error, Result};
use crate::defaults::MAX_SYMLINK_HOPS;
use crate::path::{join_normalized, parent_dir, strip_leading_slash};

const DEFAULT_QUOTA: u64 = 5000;

/// A failure every call returns while injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Offline,
    RateLimited,
    AbuseLimited,
}

#[derive(Debug, Clone)]
enum Node {
    File { sha: String, size: u64, oversized: bool },
    Symlink { target: String },
    Submodule { git_url: Option<String> },
}

#[derive(Debug, Clone)]
struct Commit {
    date: Option<DateTime<Utc>>,
    nodes: BTreeMap<String, Node>,
}

#[derive(Debug, Clone)]
struct Tag {
    commit: String,
    annotated: bool,
}

#[derive(Debug, Clone)]
struct Repo {
    info: RepositoryInfo,
    branches: BTreeMap<String, String>,
    tags: BTreeMap<String, Tag>,
    commits: HashMap<String, Commit>,
    blobs: HashMap<String, String>,
    empty: bool,
}

/// Fixture remote backed by in-memory repositories
#[derive(Debug)]
pub struct InMemoryRemote {
    repos: RwLock<HashMap<String, Repo>>,
    calls: Mutex<Vec<String>>,
    quota_limit: u64,
    remaining: AtomicU64,
    failure: RwLock<Option<InjectedFailure>>,
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA)
    }

    /// A remote whose simulated quota starts at `quota`.
    pub fn with_quota(quota: u64) -> Self {
        Self {
            repos: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            quota_limit: quota,
            remaining: AtomicU64::new(quota),
            failure: RwLock::new(None),
        }
    }

    pub fn add_repository(&self, repository: &str, default_branch: &str, private: bool) {
        if let Ok(mut repos) = self.repos.write() {
            repos.insert(
                repository.to_string(),
                Repo {
                    info: RepositoryInfo {
                        full_name: repository.to_string(),
                        default_branch: default_branch.to_string(),
                        private,
                    },
                    branches: BTreeMap::new(),
                    tags: BTreeMap::new(),
                    commits: HashMap::new(),
                    blobs: HashMap::new(),
                    empty: false,
                },
            );
        }
    }

    /// Makes reference listing report the repository as having no refs.
    pub fn mark_empty(&self, repository: &str) {
        self.edit(repository, |repo| repo.empty = true);
    }

    /// Adds a commit holding `files` (path, content).
    pub fn commit(
        &self,
        repository: &str,
        sha: &str,
        date: Option<DateTime<Utc>>,
        files: &[(&str, &str)],
    ) {
        self.edit(repository, |repo| {
            let mut nodes = BTreeMap::new();
            for (path, content) in files {
                let path = strip_leading_slash(path).to_string();
                let blob_sha = format!("blob-{}-{}", sha, path);
                repo.blobs.insert(blob_sha.clone(), content.to_string());
                nodes.insert(
                    path,
                    Node::File {
                        sha: blob_sha,
                        size: content.len() as u64,
                        oversized: false,
                    },
                );
            }
            repo.commits.insert(sha.to_string(), Commit { date, nodes });
        });
    }

    /// Adds a file the provider serves without inline content.
    ///
    /// `reported_size` is what listings and content calls report.
    pub fn add_oversized_file(
        &self,
        repository: &str,
        commit: &str,
        path: &str,
        content: &str,
        reported_size: u64,
    ) {
        self.edit(repository, |repo| {
            let path = strip_leading_slash(path).to_string();
            let blob_sha = format!("blob-{}-{}", commit, path);
            repo.blobs.insert(blob_sha.clone(), content.to_string());
            if let Some(c) = repo.commits.get_mut(commit) {
                c.nodes.insert(
                    path,
                    Node::File {
                        sha: blob_sha,
                        size: reported_size,
                        oversized: true,
                    },
                );
            }
        });
    }

    pub fn add_symlink(&self, repository: &str, commit: &str, path: &str, target: &str) {
        self.edit(repository, |repo| {
            if let Some(c) = repo.commits.get_mut(commit) {
                c.nodes.insert(
                    strip_leading_slash(path).to_string(),
                    Node::Symlink {
                        target: target.to_string(),
                    },
                );
            }
        });
    }

    pub fn add_submodule(&self, repository: &str, commit: &str, path: &str, git_url: Option<&str>) {
        self.edit(repository, |repo| {
            if let Some(c) = repo.commits.get_mut(commit) {
                c.nodes.insert(
                    strip_leading_slash(path).to_string(),
                    Node::Submodule {
                        git_url: git_url.map(str::to_string),
                    },
                );
            }
        });
    }

    pub fn set_branch(&self, repository: &str, branch: &str, commit: &str) {
        self.edit(repository, |repo| {
            repo.branches.insert(branch.to_string(), commit.to_string());
        });
    }

    pub fn set_tag(&self, repository: &str, tag: &str, commit: &str, annotated: bool) {
        self.edit(repository, |repo| {
            repo.tags.insert(
                tag.to_string(),
                Tag {
                    commit: commit.to_string(),
                    annotated,
                },
            );
        });
    }

    pub fn inject_failure(&self, failure: Option<InjectedFailure>) {
        if let Ok(mut slot) = self.failure.write() {
            *slot = failure;
        }
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of recorded calls whose description starts with `prefix`.
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn edit(&self, repository: &str, change: impl FnOnce(&mut Repo)) {
        if let Ok(mut repos) = self.repos.write() {
            if let Some(repo) = repos.get_mut(repository) {
                change(repo);
            }
        }
    }

    /// Records and charges a call, then runs `read` against the repository.
    fn call<T>(
        &self,
        description: String,
        repository: &str,
        read: impl FnOnce(&Repo) -> Result<T>,
    ) -> Result<T> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(description);
        }
        match self.failure.read().ok().and_then(|f| *f) {
            Some(InjectedFailure::Offline) => {
                return Err(Error::Transport {
                    detail: "in-memory remote is offline".to_string(),
                })
            }
            Some(InjectedFailure::RateLimited) => return Err(Error::RateLimitExceeded),
            Some(InjectedFailure::AbuseLimited) => return Err(Error::AbuseLimitReached),
            None => {}
        }
        let charged = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| r.checked_sub(1));
        if charged.is_err() {
            return Err(Error::RateLimitExceeded);
        }
        let repos = self
            .repos
            .read()
            .map_err(|_| Error::lock_poisoned("in-memory remote"))?;
        let repo = repos.get(repository).ok_or_else(|| Error::NotFound {
            resource: repository.to_string(),
        })?;
        read(repo)
    }
}

impl Commit {
    /// Regular file a symlink at `path` ends on, following chained links.
    /// Links to directories and dangling links give `None`.
    fn file_behind_link(&self, path: &str, target: &str) -> Option<(String, &Node)> {
        let mut current = linked_path(path, target);
        for _ in 0..MAX_SYMLINK_HOPS {
            match self.nodes.get(&current)? {
                node @ Node::File { .. } => return Some((current, node)),
                Node::Symlink { target } => current = linked_path(&current, target),
                Node::Submodule { .. } => return None,
            }
        }
        None
    }
}

fn linked_path(link: &str, target: &str) -> String {
    strip_leading_slash(&join_normalized(&parent_dir(link), target)).to_string()
}

impl Repo {
    fn file(&self, path: &str, sha: &str, size: u64, oversized: bool) -> FileContent {
        FileContent {
            kind: ContentKind::File,
            path: path.to_string(),
            sha: sha.to_string(),
            size,
            content: if oversized {
                String::new()
            } else {
                self.blobs.get(sha).cloned().unwrap_or_default()
            },
            encoding: if oversized { "none" } else { "base64" }.to_string(),
            target: None,
            git_url: None,
        }
    }

    /// Commit a branch, tag or raw SHA points at.
    fn resolve(&self, reference: &str) -> Result<&Commit> {
        let sha = self
            .branches
            .get(reference)
            .or_else(|| self.tags.get(reference).map(|t| &t.commit))
            .map(String::as_str)
            .unwrap_or(reference);
        self.commits.get(sha).ok_or_else(|| Error::NotFound {
            resource: format!("{}@{}", self.info.full_name, reference),
        })
    }

    fn raw_branch(&self, name: &str, sha: &str) -> RawRef {
        RawRef {
            name: format!("refs/heads/{}", name),
            object_type: "commit".to_string(),
            sha: sha.to_string(),
        }
    }

    fn raw_tag(&self, name: &str, tag: &Tag) -> RawRef {
        if tag.annotated {
            RawRef {
                name: format!("refs/tags/{}", name),
                object_type: "tag".to_string(),
                sha: format!("tag-{}", name),
            }
        } else {
            RawRef {
                name: format!("refs/tags/{}", name),
                object_type: "commit".to_string(),
                sha: tag.commit.clone(),
            }
        }
    }
}

fn not_found(resource: String) -> Error {
    Error::NotFound { resource }
}

impl RemoteApi for InMemoryRemote {
    fn repository(&self, repository: &str) -> Result<RepositoryInfo> {
        self.call(format!("repository {}", repository), repository, |repo| {
            Ok(repo.info.clone())
        })
    }

    fn list_refs(&self, repository: &str, namespace: &str) -> Result<Vec<RawRef>> {
        self.call(
            format!("list_refs {} {}", repository, namespace),
            repository,
            |repo| {
                if repo.empty {
                    return Err(Error::EmptyRepository {
                        repository: repository.to_string(),
                    });
                }
                let refs: Vec<RawRef> = match namespace {
                    "refs/heads/" => repo
                        .branches
                        .iter()
                        .map(|(name, sha)| repo.raw_branch(name, sha))
                        .collect(),
                    "refs/tags/" => repo
                        .tags
                        .iter()
                        .map(|(name, tag)| repo.raw_tag(name, tag))
                        .collect(),
                    _ => Vec::new(),
                };
                if refs.is_empty() {
                    return Err(not_found(format!("{} {}", repository, namespace)));
                }
                Ok(refs)
            },
        )
    }

    fn has_tags(&self, repository: &str) -> Result<bool> {
        self.call(format!("has_tags {}", repository), repository, |repo| {
            Ok(!repo.tags.is_empty())
        })
    }

    fn get_ref(&self, repository: &str, qualified: &str) -> Result<RawRef> {
        self.call(
            format!("get_ref {} {}", repository, qualified),
            repository,
            |repo| {
                if let Some(branch) = qualified.strip_prefix("heads/") {
                    if let Some(sha) = repo.branches.get(branch) {
                        return Ok(repo.raw_branch(branch, sha));
                    }
                } else if let Some(tag_name) = qualified.strip_prefix("tags/") {
                    if let Some(tag) = repo.tags.get(tag_name) {
                        return Ok(repo.raw_tag(tag_name, tag));
                    }
                }
                Err(not_found(format!("{} {}", repository, qualified)))
            },
        )
    }

    fn tag_target(&self, repository: &str, tag_sha: &str) -> Result<String> {
        self.call(
            format!("tag_target {} {}", repository, tag_sha),
            repository,
            |repo| {
                tag_sha
                    .strip_prefix("tag-")
                    .and_then(|name| repo.tags.get(name))
                    .map(|tag| tag.commit.clone())
                    .ok_or_else(|| not_found(tag_sha.to_string()))
            },
        )
    }

    fn branch_head(&self, repository: &str, branch: &str) -> Result<String> {
        self.call(
            format!("branch_head {} {}", repository, branch),
            repository,
            |repo| {
                repo.branches
                    .get(branch)
                    .cloned()
                    .ok_or_else(|| not_found(branch.to_string()))
            },
        )
    }

    fn commit_date(&self, repository: &str, sha: &str) -> Result<DateTime<Utc>> {
        self.call(
            format!("commit_date {} {}", repository, sha),
            repository,
            |repo| {
                repo.commits
                    .get(sha)
                    .and_then(|c| c.date)
                    .ok_or_else(|| not_found(format!("commit {}", sha)))
            },
        )
    }

    fn directory_listing(
        &self,
        repository: &str,
        dir: &str,
        reference: &str,
    ) -> Result<Vec<ContentEntry>> {
        let dir = dir.trim_matches('/').to_string();
        self.call(
            format!("directory_listing {} {}:{}", repository, reference, dir),
            repository,
            |repo| {
                let commit = repo.resolve(reference)?;
                let prefix = if dir.is_empty() {
                    String::new()
                } else {
                    format!("{}/", dir)
                };
                let mut children: BTreeMap<String, ContentEntry> = BTreeMap::new();
                for (path, node) in &commit.nodes {
                    let Some(rest) = path.strip_prefix(&prefix) else {
                        continue;
                    };
                    let (name, nested) = match rest.split_once('/') {
                        Some((name, _)) => (name, true),
                        None => (rest, false),
                    };
                    let child_path = format!("{}{}", prefix, name);
                    let entry = if nested {
                        ContentEntry {
                            name: name.to_string(),
                            path: child_path.clone(),
                            kind: ContentKind::Dir,
                            sha: format!("tree-{}", child_path),
                            size: 0,
                        }
                    } else {
                        let (kind, sha, size) = match node {
                            Node::File { sha, size, .. } => (ContentKind::File, sha.clone(), *size),
                            Node::Symlink { .. } => {
                                (ContentKind::Symlink, format!("link-{}", child_path), 0)
                            }
                            Node::Submodule { .. } => {
                                (ContentKind::Submodule, format!("module-{}", child_path), 0)
                            }
                        };
                        ContentEntry {
                            name: name.to_string(),
                            path: child_path.clone(),
                            kind,
                            sha,
                            size,
                        }
                    };
                    children.entry(child_path).or_insert(entry);
                }
                if children.is_empty() && !dir.is_empty() {
                    return Err(not_found(format!("{}:{}", reference, dir)));
                }
                Ok(children.into_values().collect())
            },
        )
    }

    fn file_content(&self, repository: &str, path: &str, reference: &str) -> Result<FileContent> {
        let path = strip_leading_slash(path).to_string();
        self.call(
            format!("file_content {} {}:{}", repository, reference, path),
            repository,
            |repo| {
                let commit = repo.resolve(reference)?;
                let node = commit
                    .nodes
                    .get(&path)
                    .ok_or_else(|| not_found(format!("{}:{}", reference, path)))?;
                let content = match node {
                    Node::File {
                        sha,
                        size,
                        oversized,
                    } => repo.file(&path, sha, *size, *oversized),
                    Node::Symlink { target } => match commit.file_behind_link(&path, target) {
                        Some((target_path, Node::File {
                            sha,
                            size,
                            oversized,
                        })) => repo.file(&target_path, sha, *size, *oversized),
                        _ => FileContent {
                            kind: ContentKind::Symlink,
                            path: path.clone(),
                            sha: format!("link-{}", path),
                            size: target.len() as u64,
                            content: String::new(),
                            encoding: String::new(),
                            target: Some(target.clone()),
                            git_url: None,
                        },
                    },
                    Node::Submodule { git_url } => FileContent {
                        kind: ContentKind::Submodule,
                        path: path.clone(),
                        sha: format!("module-{}", path),
                        size: 0,
                        content: String::new(),
                        encoding: String::new(),
                        target: None,
                        git_url: git_url.clone(),
                    },
                };
                Ok(content)
            },
        )
    }

    fn blob(&self, repository: &str, sha: &str) -> Result<String> {
        self.call(format!("blob {} {}", repository, sha), repository, |repo| {
            repo.blobs
                .get(sha)
                .cloned()
                .ok_or_else(|| not_found(format!("blob {}", sha)))
        })
    }

    fn rate_limit(&self) -> Result<Quota> {
        if let Some(InjectedFailure::Offline) = self.failure.read().ok().and_then(|f| *f) {
            return Err(Error::Transport {
                detail: "in-memory remote is offline".to_string(),
            });
        }
        Ok(Quota {
            limit: self.quota_limit,
            remaining: self.remaining.load(Ordering::SeqCst),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> InMemoryRemote {
        let remote = InMemoryRemote::new();
        remote.add_repository("octo/demo", "main", false);
        remote.commit(
            "octo/demo",
            "c1",
            None,
            &[("/wf/main.cwl", "class: Workflow"), ("/README.md", "# demo")],
        );
        remote.set_branch("octo/demo", "main", "c1");
        remote
    }

    #[test]
    fn test_root_listing() {
        let remote = remote();
        let listing = remote.directory_listing("octo/demo", "", "main").unwrap();
        let names: Vec<(&str, ContentKind)> =
            listing.iter().map(|e| (e.name.as_str(), e.kind)).collect();
        assert_eq!(
            names,
            vec![("README.md", ContentKind::File), ("wf", ContentKind::Dir)]
        );
    }

    #[test]
    fn test_calls_consume_quota() {
        let remote = remote();
        remote.file_content("octo/demo", "/README.md", "main").unwrap();
        assert_eq!(remote.rate_limit().unwrap().remaining, DEFAULT_QUOTA - 1);
        assert_eq!(remote.call_count("file_content"), 1);
    }

    #[test]
    fn test_exhausted_quota() {
        let remote = InMemoryRemote::with_quota(1);
        remote.add_repository("octo/demo", "main", false);
        remote.repository("octo/demo").unwrap();
        assert!(matches!(
            remote.repository("octo/demo"),
            Err(Error::RateLimitExceeded)
        ));
    }

    #[test]
    fn test_annotated_tag_object() {
        let remote = remote();
        remote.set_tag("octo/demo", "v1", "c1", true);
        let raw = remote.get_ref("octo/demo", "tags/v1").unwrap();
        assert_eq!(raw.object_type, "tag");
        assert_eq!(remote.tag_target("octo/demo", &raw.sha).unwrap(), "c1");
    }

    #[test]
    fn test_symlink_to_file_answers_with_target() {
        let remote = remote();
        remote.add_symlink("octo/demo", "c1", "/Dockstore.cwl", "wf/main.cwl");
        let content = remote.file_content("octo/demo", "/Dockstore.cwl", "main").unwrap();
        assert_eq!(content.kind, ContentKind::File);
        assert_eq!(content.path, "wf/main.cwl");
        assert_eq!(content.content, "class: Workflow");
        assert_eq!(content.target, None);
    }

    #[test]
    fn test_symlink_to_directory_reports_target() {
        let remote = remote();
        remote.add_symlink("octo/demo", "c1", "/alias", "wf");
        let content = remote.file_content("octo/demo", "/alias", "main").unwrap();
        assert_eq!(content.kind, ContentKind::Symlink);
        assert_eq!(content.target.as_deref(), Some("wf"));
    }

    #[test]
    fn test_offline_failure() {
        let remote = remote();
        remote.inject_failure(Some(InjectedFailure::Offline));
        assert!(remote.repository("octo/demo").unwrap_err().is_fatal());
    }
}
