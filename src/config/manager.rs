//! Settings manager and data directory resolution
//!
//! Everything darts-hub persists lives in one data directory:
//! `DARTS_HUB_HOME` if set, else `<platform data dir>/darts-hub`
//! (e.g. `%APPDATA%\darts-hub`, `~/.local/share/darts-hub`).

use crate::config::models::HubSettings;
use crate::error::{DartsHubError, Result, StringError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the data directory
pub const HOME_ENV: &str = "DARTS_HUB_HOME";
/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Settings manager
pub struct ConfigManager;

impl ConfigManager {
    /// Get the data directory
    pub fn data_dir() -> Result<PathBuf> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home));
        }
        dirs::data_dir()
            .map(|dir| dir.join("darts-hub"))
            .ok_or_else(|| {
                DartsHubError::ConfigError(StringError::new(format!(
                    "No data directory available; set {HOME_ENV}"
                )))
            })
    }

    /// Directory for log files
    pub fn logs_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("logs")
    }

    /// Directory for update packages and staging
    pub fn updates_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("updates")
    }

    /// Directory where downloadable apps are unpacked
    pub fn apps_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("apps")
    }

    /// Get the path to the settings file
    pub fn settings_path(data_dir: &Path) -> PathBuf {
        data_dir.join(SETTINGS_FILE)
    }

    /// Ensure the data directory exists
    pub fn ensure_data_dir(data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir)?;
        Ok(())
    }

    /// Load settings from disk
    ///
    /// A missing or corrupt file yields the defaults; values are clamped.
    pub fn load(data_dir: &Path) -> Result<HubSettings> {
        let path = Self::settings_path(data_dir);
        if !path.exists() {
            info!("Settings file not found, using defaults");
            return Ok(HubSettings::default());
        }

        let json = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<HubSettings>(&json) {
            Ok(settings) => {
                info!("Settings loaded from {}", path.display());
                Ok(settings.clamped())
            }
            Err(e) => {
                warn!("Failed to parse {}, using defaults: {e}", path.display());
                Ok(HubSettings::default())
            }
        }
    }

    /// Save settings with an atomic write
    ///
    /// The content goes to a temporary file in the same directory, which is
    /// then renamed over the settings file.
    pub fn save(data_dir: &Path, settings: &HubSettings) -> Result<()> {
        Self::ensure_data_dir(data_dir)?;
        let path = Self::settings_path(data_dir);

        let mut json = serde_json::to_string_pretty(settings)?;
        json.push('\n');
        let mut temp = tempfile::NamedTempFile::new_in(data_dir)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| DartsHubError::IoError(e.error))?;

        info!("Settings saved to {}", path.display());
        Ok(())
    }
}
