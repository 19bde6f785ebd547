//! App catalog and profiles
//!
//! Five JSON files under the data directory (`apps-downloadable.json`,
//! `apps-installable.json`, `apps-local.json`, `apps-open.json`,
//! `profiles.json`) hold the apps and the profiles linking them.
//!
//! # Architecture
//!
//! - `CatalogManager`: load/migrate/link/persist and profile execution
//! - `Catalog`: the in-memory collections with lookup helpers
//! - `migrations`: ordered, idempotent upgrade steps
//! - `defaults`: built-in apps and profiles
//! - `store`: file reading and atomic writing

pub mod collection;
pub mod defaults;
pub mod manager;
pub mod migrations;
pub mod store;

pub use collection::Catalog;
pub use manager::{CatalogManager, PROFILES_FILE, ProfileRunReport};
pub use migrations::{MIGRATIONS, Migration};
