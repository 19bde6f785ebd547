//! Periodic running-state refresh
//!
//! Polls every watched app's tracked process and publishes `AppStarted` /
//! `AppStopped` when the set of running apps changes between two polls.

use crate::download::CancellationToken;
use crate::events::{EventBus, HubEvent};
use crate::process::AppRunningState;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Watched app: name plus its shared running state
pub type WatchEntry = (String, Arc<AppRunningState>);

/// Background poller of app running states
pub struct AppStateMonitor {
    /// Apps to poll
    watch_list: Arc<Mutex<Vec<WatchEntry>>>,
    /// Where changes are published
    bus: EventBus,
    /// Polling interval
    interval: Duration,
    /// Apps running at the previous poll
    running: HashSet<String>,
}

impl AppStateMonitor {
    /// Create a monitor with the specified polling interval
    pub fn new(interval: Duration, bus: EventBus) -> Self {
        Self {
            watch_list: Arc::new(Mutex::new(Vec::new())),
            bus,
            interval,
            running: HashSet::new(),
        }
    }

    /// Replace the apps to poll
    pub fn update_watch_list(&self, apps: Vec<WatchEntry>) {
        *self.watch_list.lock() = apps;
    }

    /// Start the polling thread; it ends once `cancel` fires
    pub fn start(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        thread::spawn(move || {
            info!("App state monitor started ({:?} interval)", self.interval);
            while !cancel.is_cancelled() {
                self.poll();
                if !cancel.sleep(self.interval) {
                    break;
                }
            }
            info!("App state monitor stopped");
        })
    }

    /// Refresh every watched state once and publish the differences
    pub fn poll(&mut self) {
        // Clone the list to keep the lock out of the process queries
        let watch_list = self.watch_list.lock().clone();
        let current: HashSet<String> = watch_list
            .iter()
            .filter(|(_, state)| state.is_running())
            .map(|(name, _)| name.clone())
            .collect();
        debug!("{} of {} watched apps running", current.len(), watch_list.len());
        self.detect_changes(current);
    }

    fn detect_changes(&mut self, current: HashSet<String>) {
        for app in current.difference(&self.running) {
            info!("Detected app started: {app}");
            self.bus.publish(HubEvent::AppStarted { app: app.clone() });
        }
        for app in self.running.difference(&current) {
            info!("Detected app stopped: {app}");
            self.bus.publish(HubEvent::AppStopped { app: app.clone() });
        }
        self.running = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_creation() {
        let monitor = AppStateMonitor::new(Duration::from_millis(1000), EventBus::new());
        assert_eq!(monitor.interval, Duration::from_millis(1000));
        assert!(monitor.running.is_empty());
    }

    #[test]
    fn test_update_watch_list() {
        let monitor = AppStateMonitor::new(Duration::from_millis(1000), EventBus::new());
        monitor.update_watch_list(vec![
            ("darts-caller".to_string(), Arc::new(AppRunningState::default())),
            ("darts-wled".to_string(), Arc::new(AppRunningState::default())),
        ]);
        assert_eq!(monitor.watch_list.lock().len(), 2);
    }

    #[test]
    fn test_detect_changes_publishes_differences() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut monitor = AppStateMonitor::new(Duration::from_millis(10), bus);

        monitor.detect_changes(HashSet::from(["darts-caller".to_string()]));
        assert_eq!(
            rx.try_recv().unwrap(),
            HubEvent::AppStarted {
                app: "darts-caller".to_string()
            }
        );

        // unchanged set publishes nothing
        monitor.detect_changes(HashSet::from(["darts-caller".to_string()]));
        assert!(rx.try_recv().is_err());

        monitor.detect_changes(HashSet::new());
        assert_eq!(
            rx.try_recv().unwrap(),
            HubEvent::AppStopped {
                app: "darts-caller".to_string()
            }
        );
    }

    #[test]
    fn test_idle_states_publish_nothing() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut monitor = AppStateMonitor::new(Duration::from_millis(10), bus);
        monitor.update_watch_list(vec![(
            "darts-gif".to_string(),
            Arc::new(AppRunningState::default()),
        )]);
        monitor.poll();
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_poll_tracks_real_process() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let state = Arc::new(AppRunningState::default());
        let child = std::process::Command::new("/bin/sleep")
            .arg("30")
            .spawn()
            .unwrap();
        state.attach(child);

        let mut monitor = AppStateMonitor::new(Duration::from_millis(10), bus);
        monitor.update_watch_list(vec![("darts-voice".to_string(), Arc::clone(&state))]);
        monitor.poll();
        assert!(matches!(rx.try_recv().unwrap(), HubEvent::AppStarted { .. }));

        let mut child = state.take_child().unwrap();
        child.kill().unwrap();
        child.wait().unwrap();
        monitor.poll();
        assert!(matches!(rx.try_recv().unwrap(), HubEvent::AppStopped { .. }));
    }

    #[test]
    fn test_start_stops_on_cancel() {
        let monitor = AppStateMonitor::new(Duration::from_millis(10), EventBus::new());
        let cancel = CancellationToken::new();
        let handle = monitor.start(cancel.clone());
        cancel.cancel();
        handle.join().unwrap();
    }
}
