//! App state monitoring
//!
//! A background thread polls the running state of every catalog app and
//! turns changes into `AppStarted` / `AppStopped` notifications.
//!
//! # Change Detection Algorithm
//!
//! - **Started** = `current - previous`
//! - **Stopped** = `previous - current`
//!
//! Run and close only change the tracked process; the notifications come from
//! here, so an app that exits on its own is reported the same way.

pub mod app_monitor;

pub use app_monitor::{AppStateMonitor, WatchEntry};
