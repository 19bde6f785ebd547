//! App descriptors
//!
//! An app is one of four closed variants sharing `AppBase`:
//!
//! - **Downloadable**: a per-platform artifact fetched into the apps directory,
//!   unpacked if needed and spawned from there
//! - **Installable**: an installer (optionally elevated) producing a program at
//!   a known absolute path; may be a background service
//! - **Local**: a user-chosen executable (the first configuration argument)
//! - **Open**: a URL or document handed to the OS shell, never tracked
//!
//! Every variant answers the same capability set (`run`, `close`,
//! `is_configurable`, `is_installed`, `is_running`, `executable_path`,
//! `display_name`). Download and install steps run on a background
//! continuation that owns only plain data and the app's shared running state.

use crate::download::{CancellationSlot, Downloader};
use crate::error::{DartsHubError, Result};
use crate::events::{EventBus, HubEvent};
use crate::model::argument::is_false;
use crate::model::configuration::{Configuration, RuntimeArguments};
use crate::model::lifecycle::{FetchJob, InstallJob, Launch, VERSION_MARKER, spawn_continuation};
use crate::process::{
    AppRunningState, ProcessTable, ProcessTreeKiller, SystemProcessTable, normalize_process_name,
    platform_killer,
};
use crate::utils::platform::{Platform, expand_path, url_file_name};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Collaborators needed to run and close apps
#[derive(Clone)]
pub struct AppContext {
    /// Root directory of downloaded apps (one subdirectory per app)
    pub apps_dir: PathBuf,
    /// Platform used to pick download URLs and executables
    pub platform: Platform,
    /// Notification bus
    pub bus: EventBus,
    /// HTTP client with retry
    pub downloader: Downloader,
    /// Tree-aware process termination
    pub killer: Arc<dyn ProcessTreeKiller>,
    /// Process table, used to look up services by name
    pub table: Arc<dyn ProcessTable>,
}

impl AppContext {
    /// Context for the running platform with the system process table
    pub fn new(apps_dir: PathBuf, bus: EventBus, downloader: Downloader) -> Self {
        Self {
            apps_dir,
            platform: Platform::current(),
            bus,
            downloader,
            killer: platform_killer(),
            table: Arc::new(SystemProcessTable),
        }
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("apps_dir", &self.apps_dir)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

/// Result of asking an app to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A tracked process is running
    Started {
        /// Process id
        pid: u32,
    },
    /// Handed to the OS shell
    Opened,
    /// Download or install scheduled; the run follows on the same continuation
    Deferred,
    /// Required arguments have no valid value
    ConfigurationRequired {
        /// Names of the missing arguments
        missing: Vec<String>,
    },
}

/// Which catalog file an app lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppKind {
    /// `apps-downloadable.json`
    Downloadable,
    /// `apps-installable.json`
    Installable,
    /// `apps-local.json`
    Local,
    /// `apps-open.json`
    Open,
}

impl AppKind {
    /// All kinds in load order
    pub const ALL: [AppKind; 4] = [
        AppKind::Downloadable,
        AppKind::Installable,
        AppKind::Local,
        AppKind::Open,
    ];

    /// Catalog file name for this kind
    pub fn file_name(self) -> &'static str {
        match self {
            AppKind::Downloadable => "apps-downloadable.json",
            AppKind::Installable => "apps-installable.json",
            AppKind::Local => "apps-local.json",
            AppKind::Open => "apps-open.json",
        }
    }
}

/// Fields shared by every variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppBase {
    /// Stable catalog key; profiles link to apps through it
    pub name: String,
    /// User-facing name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    /// Short description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Documentation link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,
    /// Release notes link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog_url: Option<String>,
    /// Command-line arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Configuration>,
    #[serde(skip)]
    running: Arc<AppRunningState>,
    #[serde(skip)]
    downloads: Arc<CancellationSlot>,
}

impl AppBase {
    /// Create a base with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            custom_name: None,
            description: None,
            help_url: None,
            changelog_url: None,
            configuration: None,
            running: Arc::default(),
            downloads: Arc::default(),
        }
    }

    /// Set the display name
    #[must_use]
    pub fn custom_name(mut self, name: impl Into<String>) -> Self {
        self.custom_name = Some(name.into());
        self
    }

    /// Set the description
    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Set help and changelog links
    #[must_use]
    pub fn links(mut self, help: impl Into<String>, changelog: Option<&str>) -> Self {
        self.help_url = Some(help.into());
        self.changelog_url = changelog.map(ToString::to_string);
        self
    }

    /// Set the configuration
    #[must_use]
    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// Shared running state (child, status, output)
    pub fn running(&self) -> &Arc<AppRunningState> {
        &self.running
    }

    /// Replace the running state with one keeping `lines` output lines
    ///
    /// Only meaningful before the app is started.
    pub fn set_monitor_lines(&mut self, lines: usize) {
        self.running = Arc::new(AppRunningState::with_monitor_lines(lines));
    }

    /// Argv for the spawned process
    pub fn tokens(&self, runtime: Option<&RuntimeArguments>) -> Vec<String> {
        self.configuration
            .as_ref()
            .map(|c| c.tokens(runtime))
            .unwrap_or_default()
    }

    /// Display string of the command line
    pub fn argument_string(&self, runtime: Option<&RuntimeArguments>, masked: bool) -> String {
        self.configuration
            .as_ref()
            .map(|c| c.render(runtime, masked))
            .unwrap_or_default()
    }

    /// Required arguments without a valid value
    pub fn missing_required(&self, runtime: Option<&RuntimeArguments>) -> Vec<String> {
        self.configuration
            .as_ref()
            .map(|c| c.missing_required(runtime))
            .unwrap_or_default()
    }

    /// Value of the first configuration argument, validated and expanded
    fn first_argument_value(&self, runtime: Option<&RuntimeArguments>) -> Option<String> {
        let configuration = self.configuration.as_ref()?;
        let first = configuration.arguments.first()?;
        configuration.effective_value(first, runtime)
    }

    fn launch(&self, exe: PathBuf, args: Vec<String>) -> Launch {
        Launch {
            app: self.name.clone(),
            exe,
            args,
            running: Arc::clone(&self.running),
        }
    }

    /// Pid of the tracked process if it is still alive
    fn live_pid(&self) -> Option<u32> {
        if self.running.is_running() {
            self.running.pid()
        } else {
            None
        }
    }

    /// Terminate the tracked process tree
    ///
    /// The child is taken out under the state lock, so of two concurrent
    /// callers only one kills; the other finds nothing and returns `Ok`.
    fn close_tracked(&self, ctx: &AppContext) -> Result<()> {
        self.downloads.cancel();
        let Some(mut child) = self.running.take_child() else {
            debug!("{}: nothing to close", self.name);
            return Ok(());
        };

        let pid = child.id();
        info!("Closing {} (pid {pid})", self.name);
        let tree = ctx.killer.terminate_tree(pid);
        if child.kill().is_ok() {
            let _ = child.wait();
        } else {
            let _ = child.try_wait();
        }
        self.running.set_status(crate::process::RunStatus::Stopped);

        tree.map_err(|e| DartsHubError::ProcessKill {
            subject: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

/// App fetched as a per-platform artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadableApp {
    /// Shared fields
    #[serde(flatten)]
    pub base: AppBase,
    /// Release version substituted for `{version}` in download URLs
    pub version: String,
    /// Platform key -> URL template
    #[serde(default)]
    pub download_urls: BTreeMap<String, String>,
    /// Platform key -> executable path relative to the app directory
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub executables: BTreeMap<String, String>,
}

impl DownloadableApp {
    /// Resolved download URL for `platform`
    pub fn download_url(&self, platform: &Platform) -> Option<String> {
        self.download_urls
            .get(&platform.key())
            .map(|template| template.replace("{version}", &self.version))
    }

    /// Directory the app is unpacked into
    pub fn app_dir(&self, ctx: &AppContext) -> PathBuf {
        ctx.apps_dir.join(&self.base.name)
    }

    /// Executable inside the app directory
    ///
    /// Defaults to the file name of the download URL.
    pub fn executable_path(&self, ctx: &AppContext) -> Option<PathBuf> {
        let key = ctx.platform.key();
        let relative = match self.executables.get(&key) {
            Some(exe) => exe.clone(),
            None => url_file_name(&self.download_url(&ctx.platform)?)?.to_string(),
        };
        Some(self.app_dir(ctx).join(relative))
    }

    /// Executable present and marker matches `version`
    pub fn is_installed(&self, ctx: &AppContext) -> bool {
        let Some(exe) = self.executable_path(ctx) else {
            return false;
        };
        if !exe.exists() {
            return false;
        }
        std::fs::read_to_string(self.app_dir(ctx).join(VERSION_MARKER))
            .is_ok_and(|marker| marker.trim() == self.version)
    }

    /// Prepare the download of the current platform's artifact
    pub fn fetch_job(&self, ctx: &AppContext) -> Result<FetchJob> {
        let unsupported = || DartsHubError::UnsupportedPlatform {
            app: self.base.name.clone(),
            platform: ctx.platform.key(),
        };
        let url = self.download_url(&ctx.platform).ok_or_else(unsupported)?;
        let executable = self.executable_path(ctx).ok_or_else(unsupported)?;
        Ok(FetchJob {
            app: self.base.name.clone(),
            url,
            app_dir: self.app_dir(ctx),
            executable,
            version: self.version.clone(),
        })
    }

    fn run(&self, runtime: Option<&RuntimeArguments>, ctx: &AppContext) -> Result<RunOutcome> {
        let args = self.base.tokens(runtime);
        if self.is_installed(ctx) {
            let exe = self.executable_path(ctx).ok_or_else(|| DartsHubError::UnsupportedPlatform {
                app: self.base.name.clone(),
                platform: ctx.platform.key(),
            })?;
            let pid = self.base.launch(exe, args).start()?;
            return Ok(RunOutcome::Started { pid });
        }

        let job = self.fetch_job(ctx)?;
        let launch = self.base.launch(job.executable.clone(), args);
        let token = self.base.downloads.issue();
        let ctx = ctx.clone();
        info!("{} is not installed, downloading {}", self.base.name, job.version);
        spawn_continuation(&self.base.name, move || {
            job.execute(&ctx, &launch.running, &token)?;
            launch.start().map(|_| ())
        })?;
        Ok(RunOutcome::Deferred)
    }
}

/// App installed through a platform installer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallableApp {
    /// Shared fields
    #[serde(flatten)]
    pub base: AppBase,
    /// Platform key -> installer URL
    #[serde(default)]
    pub download_urls: BTreeMap<String, String>,
    /// Arguments passed to the installer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub installer_arguments: Vec<String>,
    /// Run the installer elevated
    #[serde(default, skip_serializing_if = "is_false")]
    pub run_as_admin: bool,
    /// Platform key -> absolute program path (`{home}`, `{localdata}` expanded)
    #[serde(default)]
    pub executables: BTreeMap<String, String>,
    /// Runs as a background service; running state is looked up by process name
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_service: bool,
    /// The installer starts the program itself
    #[serde(default, skip_serializing_if = "is_false")]
    pub starts_after_install: bool,
}

impl InstallableApp {
    /// Expected program path on this platform
    pub fn executable_path(&self, ctx: &AppContext) -> Option<PathBuf> {
        self.executables
            .get(&ctx.platform.key())
            .map(|template| expand_path(template))
    }

    /// Program present at its expected path
    pub fn is_installed(&self, ctx: &AppContext) -> bool {
        self.executable_path(ctx).is_some_and(|p| p.exists())
    }

    /// Pids of running processes named like the program
    pub fn service_pids(&self, ctx: &AppContext) -> Vec<u32> {
        self.executable_path(ctx)
            .map(|exe| ctx.table.find_by_name(&normalize_process_name(&exe.to_string_lossy())))
            .unwrap_or_default()
    }

    /// Prepare download and execution of the current platform's installer
    pub fn install_job(&self, ctx: &AppContext) -> Result<InstallJob> {
        let unsupported = || DartsHubError::UnsupportedPlatform {
            app: self.base.name.clone(),
            platform: ctx.platform.key(),
        };
        let url = self
            .download_urls
            .get(&ctx.platform.key())
            .cloned()
            .ok_or_else(unsupported)?;
        let expected = self.executable_path(ctx).ok_or_else(unsupported)?;
        Ok(InstallJob {
            app: self.base.name.clone(),
            url,
            download_dir: ctx.apps_dir.join(&self.base.name),
            installer_arguments: self.installer_arguments.clone(),
            run_as_admin: self.run_as_admin,
            expected,
        })
    }

    fn run(&self, runtime: Option<&RuntimeArguments>, ctx: &AppContext) -> Result<RunOutcome> {
        let args = self.base.tokens(runtime);
        if self.is_installed(ctx) {
            if self.is_service
                && let Some(pid) = self.service_pids(ctx).first()
            {
                debug!("{} service already running (pid {pid})", self.base.name);
                return Ok(RunOutcome::Started { pid: *pid });
            }
            let exe = self.executable_path(ctx).ok_or_else(|| DartsHubError::UnsupportedPlatform {
                app: self.base.name.clone(),
                platform: ctx.platform.key(),
            })?;
            let pid = self.base.launch(exe, args).start()?;
            return Ok(RunOutcome::Started { pid });
        }

        let job = self.install_job(ctx)?;
        let launch = self.base.launch(job.expected.clone(), args);
        let starts_itself = self.starts_after_install;
        let running = Arc::clone(&self.base.running);
        let token = self.base.downloads.issue();
        let ctx = ctx.clone();
        info!("{} is not installed, running its installer", self.base.name);
        spawn_continuation(&self.base.name, move || {
            job.execute(&ctx, &running, &token)?;
            if starts_itself {
                return Ok(());
            }
            launch.start().map(|_| ())
        })?;
        Ok(RunOutcome::Deferred)
    }

    fn close(&self, ctx: &AppContext) -> Result<()> {
        let tracked = self.base.close_tracked(ctx);
        if !self.is_service {
            return tracked;
        }
        // every matching process gets its termination attempt; the first failure is reported
        let mut first_error = None;
        for pid in self.service_pids(ctx) {
            if let Err(e) = ctx.killer.terminate_tree(pid) {
                warn!("{}: could not stop service process {pid}: {e}", self.base.name);
                first_error.get_or_insert(DartsHubError::ProcessKill {
                    subject: self.base.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => tracked,
        }
    }
}

/// App wrapping a user-chosen executable
///
/// The first configuration argument is the executable path; the remaining
/// arguments are passed as raw, whitespace-split argv.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalApp {
    /// Shared fields
    #[serde(flatten)]
    pub base: AppBase,
}

impl LocalApp {
    /// Configured executable path
    pub fn executable_path(&self) -> Option<PathBuf> {
        self.base
            .first_argument_value(None)
            .map(|path| expand_path(&path))
    }

    fn raw_arguments(&self, runtime: Option<&RuntimeArguments>) -> Vec<String> {
        let Some(configuration) = &self.base.configuration else {
            return Vec::new();
        };
        configuration
            .arguments
            .iter()
            .skip(1)
            .filter_map(|a| configuration.effective_value(a, runtime))
            .flat_map(|v| v.split_whitespace().map(ToString::to_string).collect::<Vec<_>>())
            .collect()
    }

    fn run(&self, runtime: Option<&RuntimeArguments>) -> Result<RunOutcome> {
        let exe = self
            .executable_path()
            .ok_or_else(|| DartsHubError::ExecutableMissing {
                app: self.base.name.clone(),
                path: String::new(),
            })?;
        let pid = self.base.launch(exe, self.raw_arguments(runtime)).start()?;
        Ok(RunOutcome::Started { pid })
    }
}

/// URL or document opened through the OS shell
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenApp {
    /// Shared fields
    #[serde(flatten)]
    pub base: AppBase,
    /// Target used when no configuration argument overrides it
    pub default_value: String,
}

impl OpenApp {
    /// What would be opened right now
    pub fn target(&self, runtime: Option<&RuntimeArguments>) -> String {
        self.base
            .first_argument_value(runtime)
            .unwrap_or_else(|| self.default_value.clone())
    }

    fn run(&self, runtime: Option<&RuntimeArguments>) -> Result<RunOutcome> {
        let target = self.target(runtime);
        info!("Opening {target} for {}", self.base.name);
        open::that(&target).map_err(|source| DartsHubError::ProcessSpawn {
            app: self.base.name.clone(),
            source,
        })?;
        Ok(RunOutcome::Opened)
    }
}

/// One catalog entry
#[derive(Debug, Clone)]
pub enum App {
    /// Fetched artifact
    Downloadable(DownloadableApp),
    /// Installer-provided program
    Installable(InstallableApp),
    /// User-chosen executable
    Local(LocalApp),
    /// Shell-opened URL or document
    Open(OpenApp),
}

impl App {
    /// Shared fields
    pub fn base(&self) -> &AppBase {
        match self {
            App::Downloadable(app) => &app.base,
            App::Installable(app) => &app.base,
            App::Local(app) => &app.base,
            App::Open(app) => &app.base,
        }
    }

    /// Shared fields for modification
    pub fn base_mut(&mut self) -> &mut AppBase {
        match self {
            App::Downloadable(app) => &mut app.base,
            App::Installable(app) => &mut app.base,
            App::Local(app) => &mut app.base,
            App::Open(app) => &mut app.base,
        }
    }

    /// Catalog key
    pub fn name(&self) -> &str {
        &self.base().name
    }

    /// Catalog file this app belongs to
    pub fn kind(&self) -> AppKind {
        match self {
            App::Downloadable(_) => AppKind::Downloadable,
            App::Installable(_) => AppKind::Installable,
            App::Local(_) => AppKind::Local,
            App::Open(_) => AppKind::Open,
        }
    }

    /// Custom name if set, else the catalog key
    pub fn display_name(&self) -> &str {
        let base = self.base();
        base.custom_name.as_deref().unwrap_or(&base.name)
    }

    /// Whether the user has anything to configure
    pub fn is_configurable(&self) -> bool {
        self.base()
            .configuration
            .as_ref()
            .is_some_and(Configuration::has_user_arguments)
    }

    /// Whether the app can run without a download or install first
    pub fn is_installed(&self, ctx: &AppContext) -> bool {
        match self {
            App::Downloadable(app) => app.is_installed(ctx),
            App::Installable(app) => app.is_installed(ctx),
            App::Local(app) => app.executable_path().is_some_and(|p| p.exists()),
            App::Open(_) => true,
        }
    }

    /// Whether a tracked process of this app is alive
    pub fn is_running(&self) -> bool {
        self.base().running.is_running()
    }

    /// Path of the program that `run` spawns, if the variant has one
    pub fn executable_path(&self, ctx: &AppContext) -> Option<PathBuf> {
        match self {
            App::Downloadable(app) => app.executable_path(ctx),
            App::Installable(app) => app.executable_path(ctx),
            App::Local(app) => app.executable_path(),
            App::Open(_) => None,
        }
    }

    /// Run the app with optional runtime overrides
    ///
    /// Missing required configuration is reported through
    /// `ConfigurationRequired` before anything is spawned. An app whose process
    /// is already alive is not started twice.
    pub fn run(&self, runtime: Option<&RuntimeArguments>, ctx: &AppContext) -> Result<RunOutcome> {
        let base = self.base();
        let missing = base.missing_required(runtime);
        if !missing.is_empty() {
            info!("{} needs configuration: {}", base.name, missing.join(", "));
            ctx.bus.publish(HubEvent::ConfigurationRequired {
                app: base.name.clone(),
                missing: missing.clone(),
            });
            return Ok(RunOutcome::ConfigurationRequired { missing });
        }

        if let Some(pid) = base.live_pid() {
            debug!("{} already running (pid {pid})", base.name);
            return Ok(RunOutcome::Started { pid });
        }

        debug!(
            "Running {} with {}",
            base.name,
            base.argument_string(runtime, true)
        );
        match self {
            App::Downloadable(app) => app.run(runtime, ctx),
            App::Installable(app) => app.run(runtime, ctx),
            App::Local(app) => app.run(runtime),
            App::Open(app) => app.run(runtime),
        }
    }

    /// Stop the app and everything it spawned
    ///
    /// Closing an app that is not running is a no-op.
    pub fn close(&self, ctx: &AppContext) -> Result<()> {
        match self {
            App::Installable(app) => app.close(ctx),
            App::Open(_) => Ok(()),
            App::Downloadable(_) | App::Local(_) => self.base().close_tracked(ctx),
        }
    }

    /// Schedule a download (downloadable) or install (installable) without running
    ///
    /// Returns `None` for variants with nothing to fetch.
    pub fn fetch(&self, ctx: &AppContext) -> Result<Option<JoinHandle<Result<()>>>> {
        let base = self.base();
        let running = Arc::clone(&base.running);
        let token = base.downloads.issue();
        let ctx = ctx.clone();
        let handle = match self {
            App::Downloadable(app) => {
                let job = app.fetch_job(&ctx)?;
                spawn_continuation(&base.name, move || job.execute(&ctx, &running, &token))?
            }
            App::Installable(app) => {
                let job = app.install_job(&ctx)?;
                spawn_continuation(&base.name, move || job.execute(&ctx, &running, &token))?
            }
            App::Local(_) | App::Open(_) => return Ok(None),
        };
        Ok(Some(handle))
    }
}

/// Serializes as the inner variant; the catalog file determines the kind
impl Serialize for App {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            App::Downloadable(app) => app.serialize(serializer),
            App::Installable(app) => app.serialize(serializer),
            App::Local(app) => app.serialize(serializer),
            App::Open(app) => app.serialize(serializer),
        }
    }
}

impl From<DownloadableApp> for App {
    fn from(app: DownloadableApp) -> Self {
        App::Downloadable(app)
    }
}

impl From<InstallableApp> for App {
    fn from(app: InstallableApp) -> Self {
        App::Installable(app)
    }
}

impl From<LocalApp> for App {
    fn from(app: LocalApp) -> Self {
        App::Local(app)
    }
}

impl From<OpenApp> for App {
    fn from(app: OpenApp) -> Self {
        App::Open(app)
    }
}
