//! `darts-hub` - launcher, configurator and updater for dartboard companion apps
//!
//! Keeps a catalog of companion apps (caller, board connectors, LED and
//! display integrations), renders their command lines from typed argument
//! definitions, downloads or installs them on demand, runs them grouped in
//! profiles and keeps the manager itself up to date.
//!
//! Work that may block (downloads, installers, update packages) runs on
//! background threads; state changes reach the UI layer through the
//! `events::EventBus`.

// Module declarations
pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod events;
pub mod model;
pub mod monitor;
pub mod process;
pub mod updater;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types
pub use error::{DartsHubError, Result};
