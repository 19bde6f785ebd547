//! Release check against GitHub
//!
//! Fetches the latest release of the manager and compares its tag with the
//! running build. Any difference counts as an update: tags are compared by
//! inequality after trimming a leading `v`, without semantic ordering.

use crate::download::{CancellationToken, Downloader};
use crate::error::Result;
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Default GitHub API root
pub const GITHUB_API: &str = "https://api.github.com";

/// GitHub API response for a release
#[derive(Debug, Deserialize)]
struct GitHubRelease {
    /// Release tag name (e.g., "v1.2.3" or "1.2.3")
    tag_name: String,
    /// Whether this is a prerelease
    #[serde(default)]
    prerelease: bool,
    /// Uploaded files
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

/// One uploaded release file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    /// File name
    pub name: String,
    /// Direct download URL
    pub browser_download_url: String,
}

/// Result of an update check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Version of the running build
    pub current_version: String,
    /// Latest published version (tag without leading `v`)
    pub latest_version: String,
    /// Tag exactly as published
    pub tag: String,
    /// Whether the latest version differs from the running one
    pub update_available: bool,
    /// URL to the releases page
    pub releases_url: String,
    /// Uploaded files of the release
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseInfo {
    /// Download URL of an asset by file name
    pub fn asset_url(&self, name: &str) -> Option<&str> {
        self.assets
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.browser_download_url.as_str())
    }
}

/// Strip whitespace and a leading `v` from a tag
pub fn normalize_tag(tag: &str) -> &str {
    let tag = tag.trim();
    tag.strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag)
}

/// Whether `latest` should replace `current`
pub fn is_update(current: &str, latest: &str) -> bool {
    let latest = normalize_tag(latest);
    !latest.is_empty() && normalize_tag(current) != latest
}

/// Version checker for the manager's GitHub releases
#[derive(Debug, Clone)]
pub struct VersionChecker {
    api_base: String,
    repo_owner: String,
    repo_name: String,
    current_version: String,
    min_check_interval_secs: u64,
}

impl VersionChecker {
    /// Create a checker
    ///
    /// # Arguments
    ///
    /// * `repo_owner` - GitHub repository owner (e.g., "lbormann")
    /// * `repo_name` - GitHub repository name (e.g., "darts-hub")
    /// * `current_version` - Version of the running build
    /// * `min_check_interval_secs` - Minimum time between automatic checks
    pub fn new(
        repo_owner: impl Into<String>,
        repo_name: impl Into<String>,
        current_version: impl Into<String>,
        min_check_interval_secs: u64,
    ) -> Self {
        Self {
            api_base: GITHUB_API.to_string(),
            repo_owner: repo_owner.into(),
            repo_name: repo_name.into(),
            current_version: current_version.into(),
            min_check_interval_secs,
        }
    }

    /// Use a different API root (mirrors, tests)
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Releases page of the repository
    pub fn releases_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/releases",
            self.repo_owner, self.repo_name
        )
    }

    /// URL of an asset attached to `tag`, for releases listing no assets
    pub fn asset_fallback_url(&self, tag: &str, asset: &str) -> String {
        format!("{}/download/{tag}/{asset}", self.releases_url())
    }

    /// Check if enough time has passed since the last check (rate limiting)
    ///
    /// `last_check_time` is a Unix timestamp; 0 means never checked.
    pub fn should_check(&self, last_check_time: u64) -> bool {
        if last_check_time == 0 {
            return true;
        }
        let elapsed = Self::current_timestamp().saturating_sub(last_check_time);
        elapsed >= self.min_check_interval_secs
    }

    /// Get the current Unix timestamp in seconds
    pub fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    /// Fetch the latest release and compare it with the running build
    ///
    /// Transient failures are retried by the downloader's policy.
    pub fn check(&self, downloader: &Downloader, cancel: &CancellationToken) -> Result<ReleaseInfo> {
        let api_url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base, self.repo_owner, self.repo_name
        );
        info!("Checking for updates from {api_url}");

        let release: GitHubRelease = downloader.get_json("update", &api_url, cancel)?;
        debug!("Fetched release: {:?}", release);
        Ok(self.evaluate(release))
    }

    fn evaluate(&self, release: GitHubRelease) -> ReleaseInfo {
        let latest_version = normalize_tag(&release.tag_name).to_string();
        let update_available =
            !release.prerelease && is_update(&self.current_version, &release.tag_name);

        if release.prerelease {
            info!("Latest release {latest_version} is a prerelease, skipping");
        } else if update_available {
            info!(
                "Update available: {} -> {latest_version}",
                self.current_version
            );
        } else {
            info!("darts-hub {} is up to date", self.current_version);
        }

        ReleaseInfo {
            current_version: self.current_version.clone(),
            latest_version,
            tag: release.tag_name,
            update_available,
            releases_url: self.releases_url(),
            assets: release.assets,
        }
    }
}
