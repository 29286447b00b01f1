//! Path manipulation utilities for repository paths
//!
//! Repository paths are `/`-separated and may or may not carry a leading
//! slash. The remote API wants them without one; manifests usually write
//! them with one.

use glob::Pattern;
use url::Url;

use crate::error::{Error, Result};

/// Match a name against a glob pattern
pub fn glob_match(pattern: &str, name: &str) -> Result<bool> {
    let pattern = Pattern::new(pattern).map_err(Error::Glob)?;
    Ok(pattern.matches(name))
}

pub fn strip_leading_slash(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Directory part of `path`, without leading or trailing separator.
///
/// `"/a/b/c.cwl"` gives `"a/b"`; `"/c.cwl"` and `"c.cwl"` give `""`.
pub fn parent_dir(path: &str) -> String {
    match strip_leading_slash(path).rsplit_once('/') {
        Some((dir, _)) => dir.trim_end_matches('/').to_string(),
        None => String::new(),
    }
}

/// Non-empty components of `path`.
pub fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves `path` against a version's working directory.
///
/// Absolute paths are returned unchanged. Relative paths are prefixed with
/// the working directory unless it is empty or the root.
pub fn resolve_relative(working_directory: &str, path: &str) -> String {
    if path.starts_with('/') || working_directory.is_empty() || working_directory == "/" {
        path.to_string()
    } else {
        format!("{}/{}", working_directory.trim_end_matches('/'), path)
    }
}

/// Joins a directory and a child name with exactly one separator.
pub fn join_dir(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Resolves `reference` against `dir` into an absolute, normalized path.
///
/// `.` segments are dropped and `..` removes the previous segment; an
/// absolute `reference` ignores `dir`.
pub fn join_normalized(dir: &str, reference: &str) -> String {
    let mut parts: Vec<String> = if reference.starts_with('/') {
        Vec::new()
    } else {
        split_segments(dir)
    };
    for part in split_segments(reference) {
        match part.as_str() {
            "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Repository and commit a submodule points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleTarget {
    /// `owner/repo`
    pub repository: String,
    /// Commit SHA of the submodule
    pub reference: String,
}

/// Parses a submodule's API URL.
///
/// The provider reports submodules as
/// `https://api.github.com/repos/<owner>/<repo>/git/trees/<sha>`.
pub fn parse_submodule_url(git_url: &str) -> Result<SubmoduleTarget> {
    let url = Url::parse(git_url)?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    if segments.len() < 4 || segments[0] != "repos" {
        return Err(Error::Decode {
            message: format!("Unrecognized submodule URL {}", git_url),
        });
    }
    let reference = segments[segments.len() - 1];
    Ok(SubmoduleTarget {
        repository: format!("{}/{}", segments[1], segments[2]),
        reference: reference.to_string(),
    })
}
