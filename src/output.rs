//! # Terminal Output
//!
//! Color and emoji handling for the CLI, plus the one-line rendering of a
//! synchronized version used by `sync` and `refresh`.
//!
//! Colors follow the usual conventions:
//! - `NO_COLOR` (any value) disables them
//! - `CLICOLOR=0` disables them, `CLICOLOR_FORCE=1` forces them
//! - `TERM=dumb` disables them
//! - `--color=always|never` wins over the environment
//!
//! With colors off, emoji markers are replaced by bracketed words so the
//! output stays greppable.

use std::env;

use crate::model::{EntryVersion, FileType};

/// Whether colors and emojis are used.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolves the `--color` flag (`always`, `never`, `auto`) against the
    /// environment.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// `emoji_str` with colors on, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// First seven characters of a commit, `-` when there is none.
pub fn short_commit(commit: Option<&str>) -> String {
    commit
        .map(|c| c.chars().take(7).collect())
        .unwrap_or_else(|| "-".to_string())
}

/// Renders a version as a status line followed by one line per message of
/// each failing validation. Manifest messages are always shown.
pub fn version_lines(config: &OutputConfig, version: &EntryVersion, default: Option<&str>) -> Vec<String> {
    let marker = if version.is_valid() {
        emoji(config, "✅", "[OK]")
    } else {
        emoji(config, "❌", "[INVALID]")
    };
    let default_marker = if default == Some(version.name()) {
        " (default)"
    } else {
        ""
    };
    let mut lines = vec![format!(
        "{} {} [{:?}] {}{}",
        marker,
        version.name(),
        version.reference_kind(),
        short_commit(version.commit_id()),
        default_marker
    )];
    for validation in version.validations().iter() {
        if validation.valid && validation.file_type != FileType::DockstoreYml {
            continue;
        }
        for (path, message) in validation.messages() {
            lines.push(format!("   {} {}: {}", validation.file_type, path, message));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReferenceKind, Validation, VersionTypeValidation};
    use serial_test::serial;

    #[test]
    fn test_color_flag_wins() {
        assert!(OutputConfig::from_env_and_flag("always").use_color);
        assert!(!OutputConfig::from_env_and_flag("never").use_color);
    }

    #[test]
    #[serial]
    fn test_no_color_disables_auto() {
        env::set_var("NO_COLOR", "1");
        let config = OutputConfig::from_env_and_flag("auto");
        env::remove_var("NO_COLOR");
        assert!(!config.use_color);
    }

    #[test]
    #[serial]
    fn test_clicolor_force_enables_auto() {
        env::remove_var("NO_COLOR");
        env::remove_var("CLICOLOR");
        env::set_var("CLICOLOR_FORCE", "1");
        let config = OutputConfig::from_env_and_flag("auto");
        env::remove_var("CLICOLOR_FORCE");
        assert!(config.use_color);
    }

    #[test]
    fn test_emoji_helper() {
        assert_eq!(emoji(&OutputConfig::with_color(), "✅", "[OK]"), "✅");
        assert_eq!(emoji(&OutputConfig::without_color(), "✅", "[OK]"), "[OK]");
    }

    #[test]
    fn test_short_commit() {
        assert_eq!(short_commit(Some("0123456789abcdef")), "0123456");
        assert_eq!(short_commit(Some("c1")), "c1");
        assert_eq!(short_commit(None), "-");
    }

    #[test]
    fn test_version_lines() {
        let mut version = EntryVersion::new("main");
        version.set_reference_kind(ReferenceKind::Branch);
        version.set_commit_id(Some("0123456789".to_string()));
        version.add_or_update_validation(Validation::new(
            FileType::DockstoreCwl,
            VersionTypeValidation::invalid("/wf.cwl", "Primary descriptor file not found."),
        ));

        let lines = version_lines(&OutputConfig::without_color(), &version, Some("main"));
        assert_eq!(lines[0], "[INVALID] main [Branch] 0123456 (default)");
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with("/wf.cwl: Primary descriptor file not found."));
    }
}
