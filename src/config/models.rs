//! Settings data model
//!
//! User settings live in `settings.json` next to the catalog files. They are
//! not catalog data: unknown or out-of-range values are clamped and a
//! malformed file falls back to defaults.

use crate::download::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Allowed range for the state refresh interval in milliseconds
pub const REFRESH_INTERVAL_RANGE_MS: (u64, u64) = (250, 10_000);
/// Allowed range for network timeouts in seconds
pub const TIMEOUT_RANGE_SECS: (u64, u64) = (5, 3600);
/// Allowed range for the per-app output buffer
pub const MONITOR_LINES_RANGE: (usize, usize) = (10, 10_000);
/// Upper bound for retry attempts
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// User settings of the manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Look for a new manager release on startup
    pub check_for_updates: bool,
    /// Apply updates without asking
    pub skip_update_confirmation: bool,
    /// Unix timestamp of the last update check (0 = never)
    pub last_update_check: u64,
    /// Minimum seconds between two automatic update checks
    pub update_check_interval_secs: u64,
    /// Whole-request timeout for artifact downloads
    pub download_timeout_secs: u64,
    /// Whole-request timeout for API queries
    pub api_timeout_secs: u64,
    /// Retry policy for transient network failures
    pub retry: RetryPolicy,
    /// Polling interval of the app state monitor
    pub refresh_interval_ms: u64,
    /// Output lines kept per app
    pub monitor_lines: usize,
    /// Profile started automatically after loading, if any
    pub startup_profile: Option<String>,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            check_for_updates: true,
            skip_update_confirmation: false,
            last_update_check: 0,
            update_check_interval_secs: 3600,
            download_timeout_secs: 600,
            api_timeout_secs: 15,
            retry: RetryPolicy::default(),
            refresh_interval_ms: 1000,
            monitor_lines: crate::process::running::DEFAULT_MONITOR_LINES,
            startup_profile: None,
        }
    }
}

impl HubSettings {
    /// Bring every value into its allowed range
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.download_timeout_secs = self
            .download_timeout_secs
            .clamp(TIMEOUT_RANGE_SECS.0, TIMEOUT_RANGE_SECS.1);
        self.api_timeout_secs = self
            .api_timeout_secs
            .clamp(TIMEOUT_RANGE_SECS.0, TIMEOUT_RANGE_SECS.1);
        self.refresh_interval_ms = self
            .refresh_interval_ms
            .clamp(REFRESH_INTERVAL_RANGE_MS.0, REFRESH_INTERVAL_RANGE_MS.1);
        self.monitor_lines = self
            .monitor_lines
            .clamp(MONITOR_LINES_RANGE.0, MONITOR_LINES_RANGE.1);

        self.retry.max_attempts = self.retry.max_attempts.clamp(1, MAX_RETRY_ATTEMPTS);
        self.retry.max_backoff_ms = self.retry.max_backoff_ms.min(60_000);
        self.retry.initial_backoff_ms = self.retry.initial_backoff_ms.min(self.retry.max_backoff_ms);

        if self
            .startup_profile
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            self.startup_profile = None;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = HubSettings::default();
        assert!(settings.check_for_updates);
        assert!(!settings.skip_update_confirmation);
        assert_eq!(settings.refresh_interval_ms, 1000);
        assert_eq!(settings.clone().clamped(), settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: HubSettings =
            serde_json::from_str(r#"{"skipUpdateConfirmation": true}"#).unwrap();
        assert!(settings.skip_update_confirmation);
        assert!(settings.check_for_updates);
        assert_eq!(settings.retry, RetryPolicy::default());
    }

    #[test]
    fn test_clamping() {
        let settings = HubSettings {
            download_timeout_secs: 0,
            refresh_interval_ms: 1,
            monitor_lines: 1_000_000,
            retry: RetryPolicy {
                max_attempts: 0,
                initial_backoff_ms: 90_000,
                max_backoff_ms: 120_000,
            },
            startup_profile: Some("  ".to_string()),
            ..HubSettings::default()
        }
        .clamped();

        assert_eq!(settings.download_timeout_secs, TIMEOUT_RANGE_SECS.0);
        assert_eq!(settings.refresh_interval_ms, REFRESH_INTERVAL_RANGE_MS.0);
        assert_eq!(settings.monitor_lines, MONITOR_LINES_RANGE.1);
        assert_eq!(settings.retry.max_attempts, 1);
        assert_eq!(settings.retry.max_backoff_ms, 60_000);
        assert_eq!(settings.retry.initial_backoff_ms, 60_000);
        assert_eq!(settings.startup_profile, None);
    }

    #[test]
    fn test_serialization_is_camel_case() {
        let json = serde_json::to_string(&HubSettings::default()).unwrap();
        assert!(json.contains("\"skipUpdateConfirmation\":false"));
        assert!(json.contains("\"refreshIntervalMs\":1000"));
    }
}
