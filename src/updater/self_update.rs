//! Self-update state machine
//!
//! ```text
//! Idle -> CheckingVersion -> UpToDate
//!                         -> UpdateAvailable -> Downloading -> Extracting
//!                                            -> HandoffToInstaller -> Closing
//! any step -> Failed
//! ```
//!
//! `Closing` is terminal: the helper script is running and the caller must
//! exit so the files can be replaced.

use crate::download::extract::recreate_dir;
use crate::download::{CancellationSlot, Downloader, unpack};
use crate::error::{DartsHubError, Result};
use crate::events::{EventBus, HubEvent};
use crate::updater::handoff::{self, HandoffPlan};
use crate::updater::version_check::{ReleaseInfo, VersionChecker};
use crate::utils::platform::Platform;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Where the updater is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdateState {
    /// Nothing checked yet
    #[default]
    Idle,
    /// Release query in flight
    CheckingVersion,
    /// The running build matches the latest release
    UpToDate,
    /// A different release is published
    UpdateAvailable {
        /// Latest version (without leading `v`)
        version: String,
    },
    /// Update package is being downloaded
    Downloading,
    /// Update package is being unpacked into staging
    Extracting,
    /// Helper script is being written and started
    HandoffToInstaller,
    /// Helper is running; the manager should exit
    Closing,
    /// Last check or apply failed
    Failed {
        /// Human readable reason
        reason: String,
    },
}

impl UpdateState {
    /// Whether an apply is in progress or already handed off
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::CheckingVersion
                | Self::Downloading
                | Self::Extracting
                | Self::HandoffToInstaller
                | Self::Closing
        )
    }
}

/// Result of `SelfUpdater::apply`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing to apply
    UpToDate,
    /// The user declined the confirmation
    Declined,
    /// The helper runs; the caller must exit immediately
    HandoffStarted {
        /// Version being installed
        version: String,
    },
}

/// Updater settings
#[derive(Debug, Clone)]
pub struct UpdaterOptions {
    /// Apply without asking
    pub skip_confirmation: bool,
    /// Directory for the package, staging and helper script
    pub work_dir: PathBuf,
    /// Platform whose package is downloaded
    pub platform: Platform,
}

impl UpdaterOptions {
    /// Options with `work_dir` for the current platform
    pub fn new(work_dir: impl Into<PathBuf>, skip_confirmation: bool) -> Self {
        Self {
            skip_confirmation,
            work_dir: work_dir.into(),
            platform: Platform::current(),
        }
    }

    /// Release asset name for the configured platform
    pub fn asset_name(&self) -> String {
        format!("darts-hub-{}.zip", self.platform.key())
    }

    /// Directory the package is unpacked into
    pub fn staging_dir(&self) -> PathBuf {
        self.work_dir.join("staging")
    }
}

/// Checks for and applies manager updates
#[derive(Debug)]
pub struct SelfUpdater {
    checker: VersionChecker,
    api: Downloader,
    downloader: Downloader,
    bus: EventBus,
    options: UpdaterOptions,
    state: Mutex<UpdateState>,
    release: Mutex<Option<ReleaseInfo>>,
    cancel: CancellationSlot,
}

impl SelfUpdater {
    /// Create an updater
    ///
    /// `api` is used for the release query, `downloader` for the package; they
    /// usually differ only in timeouts.
    pub fn new(
        checker: VersionChecker,
        api: Downloader,
        downloader: Downloader,
        bus: EventBus,
        options: UpdaterOptions,
    ) -> Self {
        Self {
            checker,
            api,
            downloader,
            bus,
            options,
            state: Mutex::new(UpdateState::Idle),
            release: Mutex::new(None),
            cancel: CancellationSlot::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> UpdateState {
        self.state.lock().clone()
    }

    /// Release found by the last successful check
    pub fn release(&self) -> Option<ReleaseInfo> {
        self.release.lock().clone()
    }

    /// Abort a running check or download
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn set_state(&self, state: UpdateState) {
        info!("Updater state: {:?}", state);
        *self.state.lock() = state;
    }

    fn fail(&self, version: Option<String>, reason: String) {
        error!("Update failed: {reason}");
        self.set_state(UpdateState::Failed {
            reason: reason.clone(),
        });
        self.bus.publish(HubEvent::UpdateFailed { version, reason });
    }

    /// Query the latest release and publish the result
    pub fn check(&self) -> Result<UpdateState> {
        let current = self.state();
        if current.is_busy() {
            warn!("Update check skipped, updater is busy ({:?})", current);
            return Ok(current);
        }
        self.set_state(UpdateState::CheckingVersion);

        let token = self.cancel.issue();
        let release = match self.checker.check(&self.api, &token) {
            Ok(release) => release,
            Err(e) => {
                self.fail(None, e.to_string());
                return Err(e);
            }
        };

        let state = if release.update_available {
            self.bus.publish(HubEvent::UpdateFound {
                version: release.latest_version.clone(),
            });
            UpdateState::UpdateAvailable {
                version: release.latest_version.clone(),
            }
        } else {
            self.bus.publish(HubEvent::UpdateNotFound);
            UpdateState::UpToDate
        };
        *self.release.lock() = Some(release);
        self.set_state(state.clone());
        Ok(state)
    }

    /// Download, stage and hand off the update found by `check`
    ///
    /// `confirm` receives the new version and is not called when confirmation
    /// is skipped in the settings. On `HandoffStarted` the caller must exit.
    pub fn apply<F>(&self, confirm: F) -> Result<UpdateOutcome>
    where
        F: FnOnce(&str) -> bool,
    {
        let version = match self.state() {
            UpdateState::UpdateAvailable { version } => version,
            UpdateState::UpToDate => return Ok(UpdateOutcome::UpToDate),
            other => {
                return Err(DartsHubError::Update {
                    version: String::new(),
                    reason: format!("no update available (state {other:?})"),
                });
            }
        };
        let Some(release) = self.release() else {
            return Err(DartsHubError::Update {
                version,
                reason: "release information missing".to_string(),
            });
        };

        if !self.options.skip_confirmation && !confirm(&version) {
            info!("Update to {version} declined");
            return Ok(UpdateOutcome::Declined);
        }

        match self.install(&release) {
            Ok(()) => {
                self.bus.publish(HubEvent::UpdateInstallInitiated {
                    version: version.clone(),
                });
                self.set_state(UpdateState::Closing);
                Ok(UpdateOutcome::HandoffStarted { version })
            }
            Err(e) => {
                let reason = e.to_string();
                self.fail(Some(version.clone()), reason.clone());
                Err(DartsHubError::Update { version, reason })
            }
        }
    }

    fn install(&self, release: &ReleaseInfo) -> Result<()> {
        let work_dir = &self.options.work_dir;
        std::fs::create_dir_all(work_dir)?;

        self.set_state(UpdateState::Downloading);
        let asset = self.options.asset_name();
        let url = release
            .asset_url(&asset)
            .map(str::to_string)
            .unwrap_or_else(|| self.checker.asset_fallback_url(&release.tag, &asset));
        let package = work_dir.join(&asset);
        let token = self.cancel.issue();
        let bus = self.bus.clone();
        self.downloader
            .download("update", &url, &package, &token, |downloaded, total| {
                bus.publish(HubEvent::UpdateDownloadProgressed { downloaded, total });
            })?;

        self.set_state(UpdateState::Extracting);
        let staging = self.options.staging_dir();
        stage(&package, &staging)?;

        self.set_state(UpdateState::HandoffToInstaller);
        let plan = HandoffPlan::for_current_process(&staging)?;
        let script = handoff::write_script(&plan, work_dir)?;
        handoff::launch(&script)
    }
}

/// Unpack the update package into an emptied staging directory
fn stage(package: &Path, staging: &Path) -> Result<Vec<PathBuf>> {
    recreate_dir(staging)?;
    let files = unpack(package, staging)?;
    if files.is_empty() {
        return Err(DartsHubError::Extract {
            path: package.display().to_string(),
            reason: "update package is empty".to_string(),
        });
    }
    info!("Staged {} file(s) in {}", files.len(), staging.display());
    Ok(files)
}
