//! Per-app running state
//!
//! Holds the tracked child process and a rolling buffer of its recent output.
//! The state is shared between the catalog, the output reader threads and the
//! periodic state monitor, so every field sits behind a lock.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::process::Child;
use tracing::debug;

/// Default number of output lines kept per app
pub const DEFAULT_MONITOR_LINES: usize = 200;

/// Coarse lifecycle status of an app
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunStatus {
    /// Nothing tracked
    #[default]
    Stopped,
    /// Artifact download in progress
    Downloading,
    /// Installer running
    Installing,
    /// Tracked process alive
    Running,
    /// Tracked process exited on its own
    Exited(Option<i32>),
    /// Last lifecycle step failed
    Failed(String),
}

/// Rolling buffer of the most recent output lines
#[derive(Debug)]
pub struct MonitorBuffer {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl MonitorBuffer {
    /// Create a buffer keeping at most `capacity` lines
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Append a line, dropping the oldest one when full
    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// Current content joined by newlines
    pub fn snapshot(&self) -> String {
        let lines = self.lines.lock();
        let mut out = String::new();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(line);
        }
        out
    }

    /// Number of buffered lines
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Drop all buffered lines
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl Default for MonitorBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MONITOR_LINES)
    }
}

/// Tracked process, status and output of one app
#[derive(Debug, Default)]
pub struct AppRunningState {
    child: Mutex<Option<Child>>,
    status: Mutex<RunStatus>,
    monitor: MonitorBuffer,
}

impl AppRunningState {
    /// Create a state with a custom monitor capacity
    pub fn with_monitor_lines(lines: usize) -> Self {
        Self {
            child: Mutex::new(None),
            status: Mutex::new(RunStatus::Stopped),
            monitor: MonitorBuffer::new(lines),
        }
    }

    /// Track a freshly spawned child
    pub fn attach(&self, child: Child) {
        let pid = child.id();
        *self.child.lock() = Some(child);
        self.set_status(RunStatus::Running);
        debug!("Tracking process {pid}");
    }

    /// Take the tracked child out of the state
    ///
    /// Exactly one concurrent caller receives the child; the others get `None`.
    pub fn take_child(&self) -> Option<Child> {
        self.child.lock().take()
    }

    /// Pid of the tracked child, if any
    pub fn pid(&self) -> Option<u32> {
        self.child.lock().as_ref().map(Child::id)
    }

    /// Whether the tracked child is alive
    ///
    /// An exited child is reaped and the status updated to `Exited`.
    pub fn is_running(&self) -> bool {
        let mut guard = self.child.lock();
        let Some(child) = guard.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("Process {} exited with {status}", child.id());
                *guard = None;
                drop(guard);
                self.set_status(RunStatus::Exited(status.code()));
                false
            }
            Err(e) => {
                debug!("Could not query process state: {e}");
                false
            }
        }
    }

    /// Current status
    pub fn status(&self) -> RunStatus {
        self.status.lock().clone()
    }

    /// Replace the status
    pub fn set_status(&self, status: RunStatus) {
        *self.status.lock() = status;
    }

    /// Output buffer of the tracked process
    pub fn monitor(&self) -> &MonitorBuffer {
        &self.monitor
    }
}
