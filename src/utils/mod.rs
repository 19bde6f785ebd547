//! Utility modules
//!
//! Logging initialisation and platform detection.

pub mod logging;
pub mod platform;

pub use logging::init_logging;
pub use platform::{Platform, expand_path};
