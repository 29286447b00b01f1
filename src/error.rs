//! # Error Handling
//!
//! This module defines the centralized error type for `dockstore-sync`. It
//! uses `thiserror` to build a single `Error` enum covering every failure
//! the synchronization engine can report, plus a `Result<T>` alias used
//! throughout the crate.
//!
//! ## Fatal versus recoverable
//!
//! Only three variants abort a batch of remote calls:
//!
//! - **`Transport`**: the provider could not be reached. The underlying
//!   detail is kept for logging but never rendered in the user-facing message.
//! - **`RateLimitExceeded`**: the remote quota is exhausted.
//! - **`AbuseLimitReached`**: the provider throttled the request pattern.
//!
//! [`Error::is_fatal`] tells callers which is which. Every other variant is
//! scoped to a single path, reference or entry and is turned into an
//! "absent" value or a recorded validation by the caller.

use thiserror::Error;

use crate::defaults::{ABUSE_LIMIT_MESSAGE, RATE_LIMIT_MESSAGE, TRANSPORT_FAILURE_MESSAGE};
use crate::manifest::ManifestError;

/// Main error type for dockstore-sync operations
#[derive(Error, Debug)]
pub enum Error {
    /// The remote provider could not be reached.
    ///
    /// `detail` carries the low-level cause for logs only; it is not part of
    /// the displayed message so raw provider output never reaches a user.
    #[error("{}", TRANSPORT_FAILURE_MESSAGE)]
    Transport { detail: String },

    /// The remote API quota for the acting identity is exhausted.
    #[error("{}", RATE_LIMIT_MESSAGE)]
    RateLimitExceeded,

    /// The provider signalled throttling because of the request pattern.
    #[error("{}", ABUSE_LIMIT_MESSAGE)]
    AbuseLimitReached,

    /// A repository, reference or path does not exist remotely.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// The provider reports the repository has no references at all.
    #[error("Repository {repository} has no branches or tags")]
    EmptyRepository { repository: String },

    /// The provider answered with a status this crate does not interpret.
    #[error("Unexpected response status {status} for {resource}")]
    UnexpectedStatus { status: u16, resource: String },

    /// A provider payload could not be decoded.
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// The `.dockstore.yml` manifest could not be used.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A git reference string is not of the form `refs/heads/...` or
    /// `refs/tags/...`.
    #[error("Reference {reference} is not of the valid form")]
    InvalidReference { reference: String },

    /// A named refresh was requested for a version that does not exist.
    #[error("Cannot refresh version {version}. Only existing legacy versions can be refreshed.")]
    InvalidRefresh { version: String },

    /// The descriptor language does not support the requested entry kind or
    /// subclass.
    #[error("Unsupported descriptor: {message}")]
    UnsupportedDescriptor { message: String },

    /// Settings could not be loaded.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Whether this error must abort the enclosing batch of remote calls.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::RateLimitExceeded | Error::AbuseLimitReached
        )
    }

    /// Whether this error means "nothing there" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub(crate) fn lock_poisoned(context: &str) -> Self {
        Error::LockPoisoned {
            context: context.to_string(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_message_hides_detail() {
        let error = Error::Transport {
            detail: "dns error: token=ghp_secret".to_string(),
        };
        let display = format!("{}", error);
        assert_eq!(display, "Could not reach GitHub, please try again later");
        assert!(!display.contains("ghp_secret"));
    }

    #[test]
    fn test_quota_messages_are_distinct() {
        let rate = Error::RateLimitExceeded.to_string();
        let abuse = Error::AbuseLimitReached.to_string();
        assert_eq!(rate, "Out of GitHub rate limit");
        assert_eq!(abuse, "GitHub abuse limit reached");
        assert_ne!(rate, abuse);
    }

    #[test]
    fn test_is_fatal() {
        assert!(Error::RateLimitExceeded.is_fatal());
        assert!(Error::AbuseLimitReached.is_fatal());
        assert!(Error::Transport {
            detail: String::new()
        }
        .is_fatal());
        assert!(!Error::NotFound {
            resource: "a/b".to_string()
        }
        .is_fatal());
        assert!(!Error::EmptyRepository {
            repository: "a/b".to_string()
        }
        .is_fatal());
    }

    #[test]
    fn test_invalid_refresh_display() {
        let error = Error::InvalidRefresh {
            version: "develop".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Cannot refresh version develop. Only existing legacy versions can be refreshed."
        );
    }

    #[test]
    fn test_config_display_with_hint() {
        let error = Error::Config {
            message: "Unknown field".to_string(),
            hint: Some("Remove 'foo:'".to_string()),
        };
        let display = error.to_string();
        assert!(display.contains("Configuration error: Unknown field"));
        assert!(display.contains("hint: Remove 'foo:'"));
    }

    #[test]
    fn test_manifest_error_is_transparent() {
        let error: Error = ManifestError::Malformed {
            message: "bad indent".to_string(),
        }
        .into();
        assert!(error.to_string().contains("bad indent"));
        assert!(!error.is_fatal());
    }
}
