//! # Settings
//!
//! Runtime settings for the synchronization engine and the CLI.
//!
//! Settings are resolved in three layers, later layers winning:
//!
//! 1. Built-in defaults from [`crate::defaults`].
//! 2. A YAML settings file: the path given with `--config`, otherwise
//!    [`default_config_path`](crate::defaults::default_config_path) when it
//!    exists.
//! 3. Command-line flags and their environment variables, applied through
//!    [`SettingsOverrides`].
//!
//! ```yaml
//! api_url: https://api.github.com
//! username: octocat
//! max_file_download_size: 10485760
//! cache_max_age_secs: 30
//! latest_tag_as_default: true
//! max_references: 200
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    default_config_path, ANONYMOUS_IDENTITY, CACHE_MAX_AGE_SECONDS, DEFAULT_API_URL,
    MAXIMUM_FILE_DOWNLOAD_SIZE,
};
use crate::error::{Error, Result};

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Base URL of the GitHub REST API
    pub api_url: String,
    /// Identity used in logs and for basic authentication
    pub username: Option<String>,
    /// Personal access token
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Files above this size are replaced by a placeholder
    pub max_file_download_size: u64,
    /// Freshness window for cached directory and reference listings
    pub cache_max_age_secs: u64,
    /// Promote the newest tag to the default version
    pub latest_tag_as_default: bool,
    /// Process at most this many references per repository
    pub max_references: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            username: None,
            token: None,
            max_file_download_size: MAXIMUM_FILE_DOWNLOAD_SIZE,
            cache_max_age_secs: CACHE_MAX_AGE_SECONDS,
            latest_tag_as_default: false,
            max_references: None,
        }
    }
}

/// Values supplied on the command line, each replacing the file value when set.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub api_url: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
    pub latest_tag_as_default: Option<bool>,
    pub max_references: Option<usize>,
}

impl Settings {
    /// Parses settings from YAML. Missing keys take their defaults.
    pub fn parse(yaml_content: &str) -> Result<Self> {
        if yaml_content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml_content).map_err(|e| Error::Config {
            message: e.to_string(),
            hint: Some(
                "Valid keys are api_url, username, token, max_file_download_size, \
                 cache_max_age_secs, latest_tag_as_default and max_references"
                    .to_string(),
            ),
        })
    }

    /// Reads settings from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::parse(&content)
    }

    /// Loads settings from `explicit` or, failing that, the default location.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config {
                        message: format!("Settings file not found: {}", path.display()),
                        hint: Some("Check the --config path".to_string()),
                    });
                }
                log::debug!("Loading settings from {}", path.display());
                Self::from_file(path)
            }
            None => {
                let path = default_config_path();
                if path.exists() {
                    log::debug!("Loading settings from {}", path.display());
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Applies command-line overrides on top of these settings.
    pub fn with_overrides(mut self, overrides: SettingsOverrides) -> Self {
        if let Some(api_url) = overrides.api_url {
            self.api_url = api_url;
        }
        if overrides.username.is_some() {
            self.username = overrides.username;
        }
        if overrides.token.is_some() {
            self.token = overrides.token;
        }
        if let Some(latest) = overrides.latest_tag_as_default {
            self.latest_tag_as_default = latest;
        }
        if overrides.max_references.is_some() {
            self.max_references = overrides.max_references;
        }
        self
    }

    /// Name reported in logs for remote calls made with these settings.
    pub fn acting_identity(&self) -> &str {
        self.username.as_deref().unwrap_or(ANONYMOUS_IDENTITY)
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.api_url, "https://api.github.com");
        assert_eq!(settings.max_file_download_size, 10 * 1024 * 1024);
        assert_eq!(settings.cache_max_age(), Duration::from_secs(30));
        assert!(!settings.latest_tag_as_default);
        assert_eq!(settings.max_references, None);
        assert_eq!(settings.acting_identity(), "Unauthenticated");
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let settings = Settings::parse("username: octocat\nmax_references: 5\n").unwrap();
        assert_eq!(settings.acting_identity(), "octocat");
        assert_eq!(settings.max_references, Some(5));
        assert_eq!(settings.cache_max_age_secs, 30);
    }

    #[test]
    fn test_parse_empty_is_default() {
        assert_eq!(Settings::parse("  \n").unwrap(), Settings::default());
    }

    #[test]
    fn test_parse_unknown_key_has_hint() {
        let err = Settings::parse("api: http://localhost\n").unwrap_err();
        match err {
            Error::Config { hint, .. } => assert!(hint.unwrap().contains("api_url")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "latest_tag_as_default: true").unwrap();
        let settings = Settings::from_file(file.path()).unwrap();
        assert!(settings.latest_tag_as_default);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        let err = Settings::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Settings file not found"));
    }

    #[test]
    fn test_overrides_win() {
        let settings = Settings::parse("username: file-user\n")
            .unwrap()
            .with_overrides(SettingsOverrides {
                username: Some("cli-user".to_string()),
                latest_tag_as_default: Some(true),
                ..Default::default()
            });
        assert_eq!(settings.acting_identity(), "cli-user");
        assert!(settings.latest_tag_as_default);
        assert_eq!(settings.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_token_not_serialized() {
        let settings = Settings {
            token: Some("ghp_secret".to_string()),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&settings).unwrap();
        assert!(!yaml.contains("ghp_secret"));
    }
}
