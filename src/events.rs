//! Notification bus
//!
//! Fire-and-forget, many-subscriber fan-out of state changes. The catalog, the
//! descriptor variants and the updater publish; UI-layer code subscribes and
//! receives every event published after its subscription on its own channel.

use parking_lot::Mutex;
use std::sync::{Arc, mpsc};
use tracing::trace;

/// A state change observed by the core
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    /// Download of an app artifact started
    DownloadStarted {
        /// App name
        app: String,
        /// Source URL
        url: String,
    },
    /// Bytes arrived for a running download
    DownloadProgressed {
        /// App name
        app: String,
        /// Bytes written so far
        downloaded: u64,
        /// Size announced by the server, if any
        total: Option<u64>,
    },
    /// Download and unpack finished
    DownloadFinished {
        /// App name
        app: String,
    },
    /// Download failed for good (retries exhausted or permanent error)
    DownloadFailed {
        /// App name
        app: String,
        /// Human readable reason
        reason: String,
    },
    /// Installer invocation started
    InstallStarted {
        /// App name
        app: String,
    },
    /// Installer finished and the app is present
    InstallFinished {
        /// App name
        app: String,
    },
    /// Installer failed or the app is still missing afterwards
    InstallFailed {
        /// App name
        app: String,
        /// Human readable reason
        reason: String,
    },
    /// An app needs user input before it can run
    ConfigurationRequired {
        /// App name
        app: String,
        /// Names of the required arguments without a valid value
        missing: Vec<String>,
    },
    /// A tracked app process is now running
    AppStarted {
        /// App name
        app: String,
    },
    /// A tracked app process is no longer running
    AppStopped {
        /// App name
        app: String,
    },
    /// A newer manager release was found
    UpdateFound {
        /// Published version tag
        version: String,
    },
    /// The running manager is current
    UpdateNotFound,
    /// Bytes arrived for the update package
    UpdateDownloadProgressed {
        /// Bytes written so far
        downloaded: u64,
        /// Size announced by the server, if any
        total: Option<u64>,
    },
    /// The update could not be checked or applied
    UpdateFailed {
        /// Version that was being applied, if known
        version: Option<String>,
        /// Human readable reason
        reason: String,
    },
    /// The installer helper has been started; the manager should exit now
    UpdateInstallInitiated {
        /// Version being installed
        version: String,
    },
    /// A transient failure is being retried
    RetryProgress {
        /// What is being retried (app name or "update")
        subject: String,
        /// Attempt that just failed (1-based)
        attempt: u32,
        /// Maximum number of attempts
        max_attempts: u32,
        /// Wait before the next attempt
        backoff_ms: u64,
    },
}

/// Many-subscriber notification bus
///
/// Cloning is cheap; all clones publish to the same subscribers.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<HubEvent>>>>,
}

impl EventBus {
    /// Create a bus without subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> mpsc::Receiver<HubEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber
    ///
    /// Subscribers whose receiver was dropped are removed.
    pub fn publish(&self, event: HubEvent) {
        trace!("Publishing {:?}", event);
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers (as of the last publish)
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
