//! Branch and tag enumeration.
//!
//! Branches and tags are listed with two separate calls: a combined listing
//! also returns historical pull-request refs, and the two namespaces fail
//! differently when empty. Each raw ref is then normalized into a
//! [`GitReferenceInfo`] carrying the commit it points at and that commit's
//! date.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;

use super::{RawRef, RemoteApi};
use crate::error::{Error, Result};
use crate::model::ReferenceKind;

const HEADS: &str = "refs/heads/";
const TAGS: &str = "refs/tags/";
const PULLS: &str = "refs/pull/";

/// Sequences git forbids in reference names.
const FORBIDDEN_SEQUENCES: [&str; 9] = ["//", "^", ":", "\\", "@", "[", "?", "~", ".."];

/// A branch or tag resolved to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitReferenceInfo {
    /// Name without `refs/heads/` or `refs/tags/`
    pub name: String,
    /// Fully-qualified reference
    pub full_ref: String,
    pub kind: ReferenceKind,
    pub sha: Option<String>,
    /// Commit date, never earlier than the epoch
    pub date: DateTime<Utc>,
}

/// Lists and resolves the references of a repository.
pub struct ReferenceEnumerator<'a> {
    api: &'a dyn RemoteApi,
}

impl<'a> ReferenceEnumerator<'a> {
    pub fn new(api: &'a dyn RemoteApi) -> Self {
        Self { api }
    }

    /// Raw branch and tag refs.
    ///
    /// An empty repository gives an empty list. A missing branch namespace
    /// gives no branches; a missing tag namespace gives no tags unless the
    /// branch listing failed too, in which case the not-found propagates.
    pub fn list_raw_references(&self, repository: &str) -> Result<Vec<RawRef>> {
        let mut refs = Vec::new();
        let mut branches_missing = false;
        match self.api.list_refs(repository, HEADS) {
            Ok(branches) => refs.extend(branches),
            Err(Error::EmptyRepository { .. }) => {
                log::debug!("{} has no references", repository);
                return Ok(Vec::new());
            }
            Err(e) if e.is_not_found() => {
                log::debug!("{} has no branches", repository);
                branches_missing = true;
            }
            Err(e) => return Err(e),
        }

        if self.api.has_tags(repository)? {
            match self.api.list_refs(repository, TAGS) {
                Ok(tags) => refs.extend(tags),
                Err(e) if e.is_not_found() && !branches_missing => {
                    log::debug!("{} has no tags", repository);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(refs)
    }

    /// Normalized names of all branches and tags.
    pub fn list_reference_names(&self, repository: &str) -> Result<Vec<String>> {
        Ok(self
            .list_raw_references(repository)?
            .iter()
            .filter_map(|raw| normalize_name(&raw.name))
            .collect())
    }

    /// All branches and tags, resolved to commits.
    pub fn list_references(&self, repository: &str) -> Result<Vec<GitReferenceInfo>> {
        let raw = self.list_raw_references(repository)?;
        let resolved: Result<Vec<Option<GitReferenceInfo>>> = raw
            .par_iter()
            .map(|r| self.resolve(repository, r))
            .collect();
        Ok(resolved?.into_iter().flatten().collect())
    }

    /// Looks up one fully-qualified reference.
    pub fn lookup(&self, repository: &str, git_ref: &str) -> Result<GitReferenceInfo> {
        validate_git_reference(git_ref)?;
        let qualified = git_ref.trim_start_matches("refs/");
        let raw = self.api.get_ref(repository, qualified)?;
        self.resolve(repository, &raw)?
            .ok_or_else(|| Error::InvalidReference {
                reference: git_ref.to_string(),
            })
    }

    /// Resolves a raw ref; pull-request refs give `None`.
    pub fn resolve(&self, repository: &str, raw: &RawRef) -> Result<Option<GitReferenceInfo>> {
        let Some(name) = normalize_name(&raw.name) else {
            return Ok(None);
        };

        let sha = match raw.object_type.as_str() {
            "commit" => Some(raw.sha.clone()),
            "tag" => self.recover(
                self.api.tag_target(repository, &raw.sha),
                repository,
                &raw.name,
            )?,
            "branch" => self.recover(
                self.api.branch_head(repository, &name),
                repository,
                &raw.name,
            )?,
            other => {
                log::error!(
                    "{}: unexpected object type {} for {}",
                    repository,
                    other,
                    raw.name
                );
                Some(raw.sha.clone())
            }
        };

        let date = match &sha {
            Some(sha) => self
                .recover(self.api.commit_date(repository, sha), repository, &raw.name)?
                .map(|d| d.max(DateTime::<Utc>::UNIX_EPOCH))
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            None => DateTime::<Utc>::UNIX_EPOCH,
        };

        Ok(Some(GitReferenceInfo {
            name,
            full_ref: raw.name.clone(),
            kind: ReferenceKind::from_git_ref(&raw.name),
            sha,
            date,
        }))
    }

    /// Fatal errors propagate; anything else is logged and becomes `None`.
    fn recover<T>(&self, result: Result<T>, repository: &str, git_ref: &str) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                log::error!("{}: could not resolve {}: {}", repository, git_ref, e);
                Ok(None)
            }
        }
    }
}

/// Strips the namespace prefix; `None` for pull-request refs.
pub fn normalize_name(git_ref: &str) -> Option<String> {
    if git_ref.starts_with(PULLS) {
        return None;
    }
    let name = git_ref
        .strip_prefix(HEADS)
        .or_else(|| git_ref.strip_prefix(TAGS))
        .unwrap_or(git_ref);
    Some(name.to_string())
}

static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^refs/(tags|heads)/([[:punct:]\p{L}\d_/-]+)$").expect("valid reference pattern")
});

/// Checks `git_ref` is a well-formed `refs/heads/...` or `refs/tags/...`.
pub fn validate_git_reference(git_ref: &str) -> Result<()> {
    let invalid = || Error::InvalidReference {
        reference: git_ref.to_string(),
    };
    let captures = REFERENCE_PATTERN.captures(git_ref).ok_or_else(invalid)?;
    let name = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
    if FORBIDDEN_SEQUENCES.iter().any(|s| name.contains(s))
        || name.starts_with('/')
        || name.ends_with('/')
        || name.ends_with(".lock")
    {
        return Err(invalid());
    }
    Ok(())
}
