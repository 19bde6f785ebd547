//! Download, install and launch steps of one app
//!
//! These jobs carry plain data (URLs, paths, pre-rendered argv) plus the app's
//! shared running state, so a background continuation never touches the
//! catalog's collections. Each job publishes its own start/progress/finish or
//! failure notifications.

use crate::download::{self, CancellationToken};
use crate::error::{DartsHubError, Result};
use crate::events::HubEvent;
use crate::model::app::AppContext;
use crate::process::{AppRunningState, RunStatus, run_to_completion, spawn_captured};
use crate::utils::platform::url_file_name;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// Name of the marker holding the installed version of a downloadable app
pub const VERSION_MARKER: &str = ".version";

/// Spawn a prepared executable with its rendered arguments
#[derive(Debug, Clone)]
pub struct Launch {
    /// App name
    pub app: String,
    /// Resolved executable
    pub exe: PathBuf,
    /// Rendered argv
    pub args: Vec<String>,
    /// Running state receiving the child
    pub running: Arc<AppRunningState>,
}

impl Launch {
    /// Spawn the process and return its pid
    pub fn start(&self) -> Result<u32> {
        if !self.exe.exists() {
            return Err(DartsHubError::ExecutableMissing {
                app: self.app.clone(),
                path: self.exe.display().to_string(),
            });
        }
        spawn_captured(&self.exe, &self.args, None, &self.running).map_err(|source| {
            self.running.set_status(RunStatus::Failed(source.to_string()));
            DartsHubError::ProcessSpawn {
                app: self.app.clone(),
                source,
            }
        })
    }
}

/// Download and unpack a downloadable app into its directory
#[derive(Debug, Clone)]
pub struct FetchJob {
    /// App name
    pub app: String,
    /// Resolved artifact URL
    pub url: String,
    /// Directory the artifact is unpacked into
    pub app_dir: PathBuf,
    /// Executable expected after unpacking
    pub executable: PathBuf,
    /// Version written to the marker on success
    pub version: String,
}

impl FetchJob {
    /// Run the job, publishing download notifications
    pub fn execute(
        &self,
        ctx: &AppContext,
        running: &AppRunningState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        ctx.bus.publish(HubEvent::DownloadStarted {
            app: self.app.clone(),
            url: self.url.clone(),
        });
        running.set_status(RunStatus::Downloading);

        match self.fetch(ctx, cancel) {
            Ok(()) => {
                running.set_status(RunStatus::Stopped);
                ctx.bus.publish(HubEvent::DownloadFinished {
                    app: self.app.clone(),
                });
                Ok(())
            }
            Err(e) => {
                warn!("Download of {} failed: {e}", self.app);
                running.set_status(RunStatus::Failed(e.to_string()));
                ctx.bus.publish(HubEvent::DownloadFailed {
                    app: self.app.clone(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn fetch(&self, ctx: &AppContext, cancel: &CancellationToken) -> Result<()> {
        fs::create_dir_all(&self.app_dir)?;
        // a half-finished update must not look installed
        let marker = self.app_dir.join(VERSION_MARKER);
        if marker.exists() {
            fs::remove_file(&marker)?;
        }

        let artifact = self
            .app_dir
            .join(url_file_name(&self.url).unwrap_or(self.app.as_str()));
        let bus = ctx.bus.clone();
        let app = self.app.clone();
        ctx.downloader
            .download(&self.app, &self.url, &artifact, cancel, move |downloaded, total| {
                bus.publish(HubEvent::DownloadProgressed {
                    app: app.clone(),
                    downloaded,
                    total,
                });
            })?;

        download::unpack(&artifact, &self.app_dir)?;
        if !self.executable.exists() {
            return Err(DartsHubError::ExecutableMissing {
                app: self.app.clone(),
                path: self.executable.display().to_string(),
            });
        }
        download::extract::make_executable(&self.executable)?;
        fs::write(&marker, &self.version)?;
        info!("{} {} installed to {}", self.app, self.version, self.app_dir.display());
        Ok(())
    }
}

/// Download and run the installer of an installable app
#[derive(Debug, Clone)]
pub struct InstallJob {
    /// App name
    pub app: String,
    /// Installer URL
    pub url: String,
    /// Directory the installer is downloaded to
    pub download_dir: PathBuf,
    /// Arguments passed to the installer
    pub installer_arguments: Vec<String>,
    /// Run the installer elevated
    pub run_as_admin: bool,
    /// Path that exists once the app is installed
    pub expected: PathBuf,
}

impl InstallJob {
    /// Run the job, publishing download and install notifications
    pub fn execute(
        &self,
        ctx: &AppContext,
        running: &AppRunningState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let installer = self.download_installer(ctx, running, cancel)?;

        ctx.bus.publish(HubEvent::InstallStarted {
            app: self.app.clone(),
        });
        running.set_status(RunStatus::Installing);

        match self.install(&installer) {
            Ok(()) => {
                running.set_status(RunStatus::Stopped);
                ctx.bus.publish(HubEvent::InstallFinished {
                    app: self.app.clone(),
                });
                Ok(())
            }
            Err(e) => {
                warn!("Installation of {} failed: {e}", self.app);
                running.set_status(RunStatus::Failed(e.to_string()));
                ctx.bus.publish(HubEvent::InstallFailed {
                    app: self.app.clone(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn download_installer(
        &self,
        ctx: &AppContext,
        running: &AppRunningState,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        ctx.bus.publish(HubEvent::DownloadStarted {
            app: self.app.clone(),
            url: self.url.clone(),
        });
        running.set_status(RunStatus::Downloading);

        let installer = self
            .download_dir
            .join(url_file_name(&self.url).unwrap_or(self.app.as_str()));
        let bus = ctx.bus.clone();
        let app = self.app.clone();
        let result = ctx
            .downloader
            .download(&self.app, &self.url, &installer, cancel, move |downloaded, total| {
                bus.publish(HubEvent::DownloadProgressed {
                    app: app.clone(),
                    downloaded,
                    total,
                });
            })
            .and_then(|_| download::extract::make_executable(&installer));

        match result {
            Ok(()) => {
                ctx.bus.publish(HubEvent::DownloadFinished {
                    app: self.app.clone(),
                });
                Ok(installer)
            }
            Err(e) => {
                running.set_status(RunStatus::Failed(e.to_string()));
                ctx.bus.publish(HubEvent::DownloadFailed {
                    app: self.app.clone(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn install(&self, installer: &Path) -> Result<()> {
        let (program, args) =
            installer_command(installer, &self.installer_arguments, self.run_as_admin);
        info!("Running installer for {}: {} {:?}", self.app, program.display(), args);

        let code = run_to_completion(&program, &args).map_err(|source| {
            DartsHubError::ProcessSpawn {
                app: self.app.clone(),
                source,
            }
        })?;
        if code != Some(0) {
            return Err(DartsHubError::ProcessSpawn {
                app: self.app.clone(),
                source: std::io::Error::other(format!("installer exited with {code:?}")),
            });
        }
        if !self.expected.exists() {
            return Err(DartsHubError::ExecutableMissing {
                app: self.app.clone(),
                path: self.expected.display().to_string(),
            });
        }
        Ok(())
    }
}

/// Program and argv that run an installer, elevated if requested
///
/// Windows elevates through `Start-Process -Verb RunAs -Wait` so the call
/// blocks until the installer exits; unix systems go through `pkexec`.
pub fn installer_command(
    installer: &Path,
    args: &[String],
    elevated: bool,
) -> (PathBuf, Vec<String>) {
    if !elevated {
        return (installer.to_path_buf(), args.to_vec());
    }

    if cfg!(windows) {
        let mut script = format!(
            "Start-Process -FilePath {} -Verb RunAs -Wait",
            powershell_quote(&installer.to_string_lossy())
        );
        if !args.is_empty() {
            let list: Vec<String> = args.iter().map(|a| powershell_quote(a)).collect();
            script.push_str(" -ArgumentList ");
            script.push_str(&list.join(","));
        }
        (
            PathBuf::from("powershell"),
            vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                script,
            ],
        )
    } else {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(installer.to_string_lossy().into_owned());
        argv.extend(args.iter().cloned());
        (PathBuf::from("pkexec"), argv)
    }
}

fn powershell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Run the ordered steps of one app on a background thread
///
/// The steps of one app run strictly in sequence; different apps get
/// independent threads.
pub fn spawn_continuation<F>(app: &str, steps: F) -> Result<JoinHandle<Result<()>>>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let name = app.to_string();
    thread::Builder::new()
        .name(format!("lifecycle-{app}"))
        .spawn(move || {
            let result = steps();
            if let Err(e) = &result {
                error!("Lifecycle of {name} stopped: {e}");
            }
            result
        })
        .map_err(|source| DartsHubError::ProcessSpawn {
            app: app.to_string(),
            source,
        })
}
