//! User settings
//!
//! `settings.json` in the data directory, written atomically. The data
//! directory also holds the catalog files, logs, apps and update staging.

pub mod manager;
pub mod models;

pub use manager::{ConfigManager, HOME_ENV, SETTINGS_FILE};
pub use models::HubSettings;
