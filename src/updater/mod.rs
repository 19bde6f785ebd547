//! Manager self-update
//!
//! - `version_check`: latest GitHub release vs. running build
//! - `self_update`: check/download/stage/handoff state machine
//! - `handoff`: platform helper script that swaps the files after exit

pub mod handoff;
pub mod self_update;
pub mod version_check;

pub use handoff::HandoffPlan;
pub use self_update::{SelfUpdater, UpdateOutcome, UpdateState, UpdaterOptions};
pub use version_check::{ReleaseInfo, VersionChecker};
