//! Catalog data model
//!
//! Typed arguments and their rendering into command lines, the four app
//! descriptor variants with their lifecycle, and profiles linking apps by name.

pub mod app;
pub mod argument;
pub mod configuration;
pub mod lifecycle;
pub mod profile;

pub use app::{
    App, AppBase, AppContext, AppKind, DownloadableApp, InstallableApp, LocalApp, OpenApp,
    RunOutcome,
};
pub use argument::{Argument, ArgumentType, ValidationError};
pub use configuration::{Configuration, RuntimeArguments};
pub use profile::{Profile, ProfileState};
