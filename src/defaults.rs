//! Default values for dockstore-sync.
//!
//! This module provides centralized default values and fixed messages used
//! across the library and the CLI, ensuring consistency and avoiding
//! duplication.

use std::path::PathBuf;

/// Base URL of the GitHub REST API.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Files larger than this are never downloaded through the blob API.
pub const MAXIMUM_FILE_DOWNLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// Freshness window for cached directory listings and reference lists.
pub const CACHE_MAX_AGE_SECONDS: u64 = 30;

/// Upper bound on symlink hops during one file read.
pub const MAX_SYMLINK_HOPS: usize = 32;

/// Returned in place of content for files above the download limit.
pub const LARGE_FILE_PLACEHOLDER: &str = "Dockstore does not process extremely large files";

pub const RATE_LIMIT_MESSAGE: &str = "Out of GitHub rate limit";
pub const ABUSE_LIMIT_MESSAGE: &str = "GitHub abuse limit reached";
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Could not reach GitHub, please try again later";

/// Manifest locations, in lookup order.
pub const MANIFEST_PATHS: [&str; 2] = ["/.dockstore.yml", "/.github/.dockstore.yml"];

/// Commit id recorded on placeholder versions that were not refreshed.
pub const SKIP_COMMIT_ID: &str = "skip";

/// Descriptor path used when an entry has none configured.
pub const DEFAULT_DESCRIPTOR_PATH: &str = "/Dockstore.cwl";

/// Identity reported in logs when no username is configured.
pub const ANONYMOUS_IDENTITY: &str = "Unauthenticated";

/// Name of the settings file looked up in the config directory.
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Returns the default settings file location.
///
/// Uses the platform-appropriate config directory:
/// - Linux: `~/.config/dockstore-sync/config.yaml` (XDG Base Directory)
/// - macOS: `~/Library/Application Support/dockstore-sync/config.yaml`
/// - Windows: `{FOLDERID_RoamingAppData}\dockstore-sync\config.yaml`
///
/// Falls back to `.dockstore-sync/config.yaml` in the current directory if
/// the platform config directory cannot be determined.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".dockstore-sync"))
        .join("dockstore-sync")
        .join(CONFIG_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path_file_name() {
        let path = default_config_path();
        assert!(path.ends_with("dockstore-sync/config.yaml"));
    }

    #[test]
    fn test_manifest_paths_order() {
        assert_eq!(MANIFEST_PATHS[0], "/.dockstore.yml");
        assert_eq!(MANIFEST_PATHS[1], "/.github/.dockstore.yml");
    }
}
