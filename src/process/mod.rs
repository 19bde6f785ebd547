//! Process lifecycle helper
//!
//! Spawning app processes with output capture, tracking their running state,
//! and terminating them together with their descendants.
//!
//! # Architecture
//!
//! - `AppRunningState`: tracked child, coarse status and rolling output buffer
//! - `spawn_captured`: starts a process and pipes stdout/stderr into the buffer
//! - `ProcessTreeKiller`: platform-selected termination (`platform_killer`)
//! - `ProcessTable`: enumeration seam, backed by `sysinfo` in production

pub mod running;
pub mod spawn;
pub mod tree;

pub use running::{AppRunningState, MonitorBuffer, RunStatus};
pub use spawn::{run_to_completion, spawn_captured};
pub use tree::{
    DirectKiller, ProcessTable, ProcessTreeKiller, SystemProcessTable, TreeWalkingKiller,
    normalize_process_name, platform_killer,
};
