//! # File Resolution
//!
//! [`FileResolver`] reads a file at a reference of a repository the way a
//! checkout would see it: symbolic links are followed and submodules are
//! crossed into the repository and commit they point at.
//!
//! ## The walk
//!
//! A path is resolved component by component from the root. The state of the
//! walk (current repository, current reference, remaining segments and
//! whether a submodule has been entered) lives in a small accumulator that is
//! replaced, never shared, as redirections happen:
//!
//! 1. For each ancestor segment the parent directory is listed (listings are
//!    cached). A symlink restarts the walk on its target followed by the
//!    unprocessed suffix; a submodule restarts it inside the submodule's
//!    repository at the submodule's commit.
//! 2. A failed lookup for one segment is logged and the walk continues as if
//!    there were no redirection at that level.
//! 3. The final segment is looked up in its parent listing. Directories and
//!    submodules read as absent; files are fetched, with a blob fallback for
//!    content the provider leaves out because of its size.
//!
//! Only [fatal](crate::error::Error::is_fatal) errors leave this module;
//! everything else reads as absent.

use std::collections::BTreeMap;

use crate::cache::CacheKey;
use crate::context::SyncContext;
use crate::defaults::{LARGE_FILE_PLACEHOLDER, MAX_SYMLINK_HOPS};
use crate::error::{Error, Result};
use crate::github::{ContentEntry, ContentKind, FileContent};
use crate::path::{
    join_dir, join_normalized, parse_submodule_url, split_segments, strip_leading_slash,
    SubmoduleTarget,
};

/// Accumulated state of one path walk.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Walk {
    repository: String,
    reference: String,
    segments: Vec<String>,
    redirected: bool,
    hops: usize,
}

impl Walk {
    fn new(repository: &str, reference: &str, path: &str) -> Self {
        Self {
            repository: repository.to_string(),
            reference: reference.to_string(),
            segments: split_segments(path),
            redirected: false,
            hops: 0,
        }
    }

    fn dir_of(&self, index: usize) -> String {
        self.segments[..index].join("/")
    }

    fn path_of(&self, index: usize) -> String {
        self.segments[..=index].join("/")
    }

    fn full_path(&self) -> String {
        self.segments.join("/")
    }

    /// Replaces the segment at `index` by a symlink target.
    ///
    /// Relative targets are taken from the link's directory.
    fn through_symlink(self, index: usize, target: &str) -> Self {
        let mut segments = split_segments(&join_normalized(&self.dir_of(index), target));
        segments.extend_from_slice(&self.segments[index + 1..]);
        Self {
            segments,
            hops: self.hops + 1,
            ..self
        }
    }

    /// Continues inside a submodule found at `index`.
    fn into_submodule(self, index: usize, target: SubmoduleTarget) -> Self {
        Self {
            repository: target.repository,
            reference: target.reference,
            segments: self.segments[index + 1..].to_vec(),
            redirected: true,
            hops: self.hops + 1,
        }
    }
}

/// Outcome of looking at one segment.
enum Step {
    Continue,
    Restart(Walk),
    /// The provider answered a link with the file it points at.
    Linked(FileContent),
    Absent,
}

/// Reads files through symlinks and submodules.
pub struct FileResolver<'a> {
    ctx: &'a SyncContext,
}

impl<'a> FileResolver<'a> {
    pub fn new(ctx: &'a SyncContext) -> Self {
        Self { ctx }
    }

    /// Content of `path` at `reference`, or `None` when there is no file.
    pub fn read(&self, repository: &str, reference: &str, path: &str) -> Result<Option<String>> {
        let label = format!("read {} at {} of {}", path, reference, repository);
        self.ctx
            .guard()
            .with_quota_check(self.ctx.api(), &label, || {
                self.read_unguarded(repository, reference, path)
            })
    }

    /// Names of the items in directory `dir`; empty when it is not a
    /// directory.
    pub fn list_files(&self, repository: &str, reference: &str, dir: &str) -> Result<Vec<String>> {
        let label = format!("list {} at {} of {}", dir, reference, repository);
        self.ctx
            .guard()
            .with_quota_check(self.ctx.api(), &label, || {
                if !self.reference_exists(repository, reference)? {
                    return Ok(Vec::new());
                }
                let Some(walk) = self.walk(Walk::new(repository, reference, dir), true)? else {
                    return Ok(Vec::new());
                };
                let listing = self.recoverable(self.listing(&walk, &walk.full_path()))?;
                Ok(listing
                    .unwrap_or_default()
                    .into_iter()
                    .map(|e| e.name)
                    .collect())
            })
    }

    /// Reads `path` as a file, or every file below it when it is a
    /// directory. Paths in `excludes` (and everything below them) are
    /// skipped.
    ///
    /// Keys of the result are the paths as they were reached from `path`.
    pub fn read_path(
        &self,
        repository: &str,
        reference: &str,
        path: &str,
        excludes: &[String],
    ) -> Result<BTreeMap<String, String>> {
        let mut found = BTreeMap::new();
        self.collect_path(repository, reference, path, excludes, &mut found)?;
        Ok(found)
    }

    fn collect_path(
        &self,
        repository: &str,
        reference: &str,
        path: &str,
        excludes: &[String],
        found: &mut BTreeMap<String, String>,
    ) -> Result<()> {
        let normalized = strip_leading_slash(path);
        if excludes
            .iter()
            .any(|e| strip_leading_slash(e) == normalized)
        {
            return Ok(());
        }
        if let Some(content) = self.read(repository, reference, path)? {
            found.insert(path.to_string(), content);
            return Ok(());
        }
        for name in self.list_files(repository, reference, path)? {
            let child = join_dir(path, &name);
            self.collect_path(repository, reference, &child, excludes, found)?;
        }
        Ok(())
    }

    fn read_unguarded(&self, repository: &str, reference: &str, path: &str) -> Result<Option<String>> {
        if !self.reference_exists(repository, reference)? {
            log::debug!("{} is not a reference of {}", reference, repository);
            return Ok(None);
        }
        let mut walk = Walk::new(repository, reference, path);
        loop {
            walk = match self.walk(walk, false)? {
                Some(w) => w,
                None => return Ok(None),
            };
            let Some(last) = walk.segments.len().checked_sub(1) else {
                return Ok(None);
            };
            let Some(entry) = self.lookup(&walk, last)? else {
                return Ok(None);
            };
            match entry.kind {
                ContentKind::Dir | ContentKind::Submodule => return Ok(None),
                ContentKind::Symlink => match self.follow_symlink(walk.clone(), last, &entry)? {
                    Step::Restart(next) => walk = next,
                    Step::Linked(content) => return self.file_text(&walk, content),
                    Step::Continue | Step::Absent => return Ok(None),
                },
                ContentKind::File => return self.fetch(&walk, &entry.path),
            }
        }
    }

    /// Resolves the ancestor segments of `walk`, or all of them when
    /// `include_last` is set.
    fn walk(&self, mut walk: Walk, include_last: bool) -> Result<Option<Walk>> {
        'restart: loop {
            let ancestors = if include_last {
                walk.segments.len()
            } else {
                walk.segments.len().saturating_sub(1)
            };
            for index in 0..ancestors {
                let Some(entry) = self.lookup(&walk, index)? else {
                    continue;
                };
                let step = match entry.kind {
                    ContentKind::Symlink => self.follow_symlink(walk.clone(), index, &entry)?,
                    ContentKind::Submodule => self.enter_submodule(walk.clone(), index, &entry)?,
                    ContentKind::File | ContentKind::Dir => Step::Continue,
                };
                match step {
                    Step::Continue => {}
                    Step::Restart(next) => {
                        walk = next;
                        continue 'restart;
                    }
                    Step::Linked(_) | Step::Absent => return Ok(None),
                }
            }
            return Ok(Some(walk));
        }
    }

    fn follow_symlink(&self, walk: Walk, index: usize, entry: &ContentEntry) -> Result<Step> {
        if walk.hops >= MAX_SYMLINK_HOPS {
            log::warn!(
                "Too many links while resolving {} in {}",
                walk.full_path(),
                walk.repository
            );
            return Ok(Step::Absent);
        }
        let Some(content) = self.recoverable(self.content(&walk, &entry.path))? else {
            return Ok(Step::Continue);
        };
        if content.kind == ContentKind::File {
            log::debug!("{} links to file {}", walk.path_of(index), content.path);
            return Ok(Step::Linked(content));
        }
        match content.target {
            Some(target) => {
                log::debug!("{} links to {}", walk.path_of(index), target);
                Ok(Step::Restart(walk.through_symlink(index, &target)))
            }
            None => Ok(Step::Continue),
        }
    }

    fn enter_submodule(&self, walk: Walk, index: usize, entry: &ContentEntry) -> Result<Step> {
        let Some(content) = self.recoverable(self.content(&walk, &entry.path))? else {
            return Ok(Step::Continue);
        };
        let Some(git_url) = content.git_url else {
            log::warn!(
                "Submodule {} of {} is not hosted on GitHub",
                entry.path,
                walk.repository
            );
            return Ok(Step::Absent);
        };
        match parse_submodule_url(&git_url) {
            Ok(target) => {
                log::debug!(
                    "{} is a submodule of {} at {}",
                    walk.path_of(index),
                    target.repository,
                    target.reference
                );
                Ok(Step::Restart(walk.into_submodule(index, target)))
            }
            Err(e) => {
                log::warn!("Could not follow submodule {}: {}", entry.path, e);
                Ok(Step::Continue)
            }
        }
    }

    /// Entry for segment `index` in its parent's listing.
    fn lookup(&self, walk: &Walk, index: usize) -> Result<Option<ContentEntry>> {
        let dir = walk.dir_of(index);
        let name = &walk.segments[index];
        let listing = self.recoverable(self.listing(walk, &dir))?;
        Ok(listing.and_then(|items| items.into_iter().find(|e| &e.name == name)))
    }

    fn listing(&self, walk: &Walk, dir: &str) -> Result<Vec<ContentEntry>> {
        let key = CacheKey::new(&walk.repository, &walk.reference, dir);
        self.ctx.listings().get_or_process(key, || {
            self.ctx
                .api()
                .directory_listing(&walk.repository, dir, &walk.reference)
        })
    }

    fn content(&self, walk: &Walk, path: &str) -> Result<FileContent> {
        self.ctx
            .api()
            .file_content(&walk.repository, path, &walk.reference)
    }

    fn fetch(&self, walk: &Walk, path: &str) -> Result<Option<String>> {
        if !walk.redirected && !self.reference_exists(&walk.repository, &walk.reference)? {
            return Ok(None);
        }
        let Some(content) = self.recoverable(self.content(walk, path))? else {
            return Ok(None);
        };
        self.file_text(walk, content)
    }

    /// Text of fetched file content, going through the blob API when the
    /// provider left it out because of its size.
    fn file_text(&self, walk: &Walk, content: FileContent) -> Result<Option<String>> {
        if content.kind != ContentKind::File {
            return Ok(None);
        }
        if !content.is_oversized_marker() {
            return Ok(Some(content.content));
        }
        if content.size > self.ctx.settings().max_file_download_size {
            log::info!(
                "{} in {} is {} bytes, not downloading",
                content.path,
                walk.repository,
                content.size
            );
            return Ok(Some(LARGE_FILE_PLACEHOLDER.to_string()));
        }
        self.recoverable(self.ctx.api().blob(&walk.repository, &content.sha))
    }

    /// Whether `reference` names a branch or tag of `repository`.
    ///
    /// Commit SHAs are taken as existing.
    fn reference_exists(&self, repository: &str, reference: &str) -> Result<bool> {
        if is_commit_sha(reference) {
            return Ok(true);
        }
        let names = self.ctx.reference_names().get_or_process(repository.to_string(), || {
            self.ctx.references().list_reference_names(repository)
        });
        match names {
            Ok(names) => Ok(names.iter().any(|n| n == reference)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                log::debug!("Could not list references of {}: {}", repository, e);
                Ok(false)
            }
        }
    }

    /// Turns non-fatal errors into `None`.
    fn recoverable<T>(&self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_fatal() => Err(e),
            Err(Error::NotFound { resource }) => {
                log::debug!("{} not found", resource);
                Ok(None)
            }
            Err(e) => {
                log::warn!("{}", e);
                Ok(None)
            }
        }
    }
}

fn is_commit_sha(reference: &str) -> bool {
    reference.len() == 40 && reference.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::github::memory::{InMemoryRemote, InjectedFailure};
    use std::sync::Arc;

    const REPO: &str = "octo/demo";

    fn context(remote: &Arc<InMemoryRemote>) -> SyncContext {
        SyncContext::new(remote.clone(), Settings::default())
    }

    fn remote() -> Arc<InMemoryRemote> {
        let remote = Arc::new(InMemoryRemote::new());
        remote.add_repository(REPO, "main", false);
        remote.commit(
            REPO,
            "c1",
            None,
            &[
                ("/x/y/b/c.cwl", "class: CommandLineTool"),
                ("/tools/echo.cwl", "class: CommandLineTool\nid: echo"),
                ("/README.md", "# demo"),
            ],
        );
        remote.set_branch(REPO, "main", "c1");
        remote
    }

    #[test]
    fn test_plain_read() {
        let remote = remote();
        let ctx = context(&remote);
        let content = ctx.resolver().read(REPO, "main", "/tools/echo.cwl").unwrap();
        assert_eq!(content.as_deref(), Some("class: CommandLineTool\nid: echo"));
    }

    #[test]
    fn test_missing_file_is_absent() {
        let remote = remote();
        let ctx = context(&remote);
        assert_eq!(ctx.resolver().read(REPO, "main", "/nope.cwl").unwrap(), None);
        assert_eq!(ctx.resolver().read(REPO, "main", "/nope/deeper.cwl").unwrap(), None);
    }

    #[test]
    fn test_directory_is_absent() {
        let remote = remote();
        let ctx = context(&remote);
        assert_eq!(ctx.resolver().read(REPO, "main", "/tools").unwrap(), None);
    }

    #[test]
    fn test_unknown_reference_skips_file_calls() {
        let remote = remote();
        let ctx = context(&remote);
        assert_eq!(ctx.resolver().read(REPO, "v9", "/README.md").unwrap(), None);
        assert_eq!(remote.call_count("file_content"), 0);
        assert_eq!(remote.call_count("directory_listing"), 0);
    }

    #[test]
    fn test_symlinked_directory() {
        let remote = remote();
        remote.add_symlink(REPO, "c1", "/a", "x/y");
        let ctx = context(&remote);
        let via_link = ctx.resolver().read(REPO, "main", "/a/b/c.cwl").unwrap();
        let direct = ctx.resolver().read(REPO, "main", "/x/y/b/c.cwl").unwrap();
        assert!(via_link.is_some());
        assert_eq!(via_link, direct);
    }

    #[test]
    fn test_relative_symlink_target_in_subdirectory() {
        let remote = remote();
        remote.add_symlink(REPO, "c1", "/x/alias", "../tools");
        let ctx = context(&remote);
        let content = ctx.resolver().read(REPO, "main", "/x/alias/echo.cwl").unwrap();
        assert_eq!(content.as_deref(), Some("class: CommandLineTool\nid: echo"));
    }

    #[test]
    fn test_symlinked_file() {
        let remote = remote();
        remote.add_symlink(REPO, "c1", "/Dockstore.cwl", "tools/echo.cwl");
        let ctx = context(&remote);
        let content = ctx.resolver().read(REPO, "main", "/Dockstore.cwl").unwrap();
        assert_eq!(content.as_deref(), Some("class: CommandLineTool\nid: echo"));
    }

    #[test]
    fn test_chained_symlinks_to_file() {
        let remote = remote();
        remote.add_symlink(REPO, "c1", "/tools/current.cwl", "echo.cwl");
        remote.add_symlink(REPO, "c1", "/Dockstore.cwl", "tools/current.cwl");
        let ctx = context(&remote);
        let content = ctx.resolver().read(REPO, "main", "/Dockstore.cwl").unwrap();
        assert_eq!(content.as_deref(), Some("class: CommandLineTool\nid: echo"));
    }

    #[test]
    fn test_symlinked_oversized_file_uses_blob() {
        let remote = remote();
        remote.add_oversized_file(REPO, "c1", "/big.wdl", "version 1.0", 2_000_000);
        remote.add_symlink(REPO, "c1", "/main.wdl", "big.wdl");
        let ctx = context(&remote);
        let content = ctx.resolver().read(REPO, "main", "/main.wdl").unwrap();
        assert_eq!(content.as_deref(), Some("version 1.0"));
        assert_eq!(remote.call_count("blob"), 1);
    }

    #[test]
    fn test_path_below_symlinked_file_is_absent() {
        let remote = remote();
        remote.add_symlink(REPO, "c1", "/Dockstore.cwl", "tools/echo.cwl");
        let ctx = context(&remote);
        assert_eq!(ctx.resolver().read(REPO, "main", "/Dockstore.cwl/x").unwrap(), None);
    }

    #[test]
    fn test_symlink_cycle_is_absent() {
        let remote = remote();
        remote.add_symlink(REPO, "c1", "/loop", "loop");
        let ctx = context(&remote);
        assert_eq!(ctx.resolver().read(REPO, "main", "/loop/file.cwl").unwrap(), None);
    }

    #[test]
    fn test_submodule_redirect() {
        let remote = remote();
        remote.add_repository("octo/lib", "main", false);
        remote.commit("octo/lib", "0a1b2c", None, &[("/steps/sort.cwl", "class: Workflow")]);
        remote.add_submodule(
            REPO,
            "c1",
            "/lib",
            Some("https://api.github.com/repos/octo/lib/git/trees/0a1b2c"),
        );
        let ctx = context(&remote);
        let content = ctx.resolver().read(REPO, "main", "/lib/steps/sort.cwl").unwrap();
        assert_eq!(content.as_deref(), Some("class: Workflow"));
        // the submodule commit is not a branch of octo/lib, so no listing of its refs
        assert_eq!(remote.call_count("list_refs octo/lib"), 0);
    }

    #[test]
    fn test_submodule_without_github_url_is_absent() {
        let remote = remote();
        remote.add_submodule(REPO, "c1", "/vendor", None);
        let ctx = context(&remote);
        assert_eq!(ctx.resolver().read(REPO, "main", "/vendor/x.cwl").unwrap(), None);
    }

    #[test]
    fn test_oversized_file_uses_blob() {
        let remote = remote();
        remote.add_oversized_file(REPO, "c1", "/big.wdl", "version 1.0", 2_000_000);
        let ctx = context(&remote);
        let content = ctx.resolver().read(REPO, "main", "/big.wdl").unwrap();
        assert_eq!(content.as_deref(), Some("version 1.0"));
        assert_eq!(remote.call_count("blob"), 1);
    }

    #[test]
    fn test_file_over_maximum_is_placeholder() {
        let remote = remote();
        remote.add_oversized_file(REPO, "c1", "/huge.wdl", "version 1.0", 50 * 1024 * 1024);
        let ctx = context(&remote);
        let content = ctx.resolver().read(REPO, "main", "/huge.wdl").unwrap();
        assert_eq!(content.as_deref(), Some(LARGE_FILE_PLACEHOLDER));
        assert_eq!(remote.call_count("blob"), 0);
    }

    #[test]
    fn test_listings_are_cached() {
        let remote = remote();
        let ctx = context(&remote);
        ctx.resolver().read(REPO, "main", "/tools/echo.cwl").unwrap();
        let listings = remote.call_count("directory_listing");
        ctx.resolver().read(REPO, "main", "/tools/echo.cwl").unwrap();
        assert_eq!(remote.call_count("directory_listing"), listings);
    }

    #[test]
    fn test_transport_failure_propagates() {
        let remote = remote();
        let ctx = context(&remote);
        remote.inject_failure(Some(InjectedFailure::Offline));
        let error = ctx.resolver().read(REPO, "main", "/README.md").unwrap_err();
        assert!(error.is_fatal());
    }

    #[test]
    fn test_read_path_directory() {
        let remote = remote();
        let ctx = context(&remote);
        let found = ctx
            .resolver()
            .read_path(REPO, "main", "/x", &["/x/y/b/skip.cwl".to_string()])
            .unwrap();
        assert_eq!(found.keys().collect::<Vec<_>>(), vec!["/x/y/b/c.cwl"]);
    }

    #[test]
    fn test_read_path_honours_excludes() {
        let remote = remote();
        let ctx = context(&remote);
        let found = ctx
            .resolver()
            .read_path(REPO, "main", "/tools", &["tools/echo.cwl".to_string()])
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_list_files() {
        let remote = remote();
        let ctx = context(&remote);
        let names = ctx.resolver().list_files(REPO, "main", "/").unwrap();
        assert_eq!(names, vec!["README.md", "tools", "x"]);
    }

    #[test]
    fn test_walk_through_symlink_keeps_suffix() {
        let walk = Walk::new(REPO, "main", "/a/b/c").through_symlink(0, "x/y");
        assert_eq!(walk.segments, vec!["x", "y", "b", "c"]);
        assert_eq!(walk.hops, 1);
    }
}
