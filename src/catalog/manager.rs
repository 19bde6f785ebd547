//! Catalog manager
//!
//! Owns the loaded apps and profiles. Loading follows a fixed sequence:
//!
//! 1. read the four app files and the profile file; a missing file is
//!    replaced by the built-in defaults and persisted, a file that does not
//!    parse aborts the load with an error naming it
//! 2. reject configurations with duplicate argument names
//! 3. run the migration table
//! 4. link every profile entry to a loaded app (a dangling entry aborts)
//! 5. persist, so the next load sees the upgraded shape
//!
//! Nothing is handed to a caller before step 5 has finished.

use crate::catalog::collection::Catalog;
use crate::catalog::{defaults, migrations, store};
use crate::error::{DartsHubError, Result};
use crate::model::{
    App, AppContext, AppKind, DownloadableApp, InstallableApp, LocalApp, OpenApp, Profile,
    RunOutcome, RuntimeArguments,
};
use crate::process::AppRunningState;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, warn};

/// Profile file name
pub const PROFILES_FILE: &str = "profiles.json";

/// Result of running every startable entry of a profile
#[derive(Debug, Default)]
pub struct ProfileRunReport {
    /// Profile that was run
    pub profile: String,
    /// Outcome per started entry, in profile order
    pub outcomes: Vec<(String, RunOutcome)>,
    /// Entries that failed; the remaining entries still ran
    pub failures: Vec<(String, DartsHubError)>,
}

impl ProfileRunReport {
    /// Whether every entry ran without error
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Entries waiting for user configuration
    pub fn configuration_required(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|(app, outcome)| {
            matches!(outcome, RunOutcome::ConfigurationRequired { .. }).then_some(app.as_str())
        })
    }
}

/// Loaded catalog plus the collaborators needed to run it
#[derive(Debug)]
pub struct CatalogManager {
    data_dir: PathBuf,
    catalog: Catalog,
    ctx: AppContext,
}

impl CatalogManager {
    /// Load, migrate, link and persist the catalog in `data_dir`
    pub fn load(data_dir: impl Into<PathBuf>, ctx: AppContext) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        info!("Loading catalog from {}", data_dir.display());

        let mut catalog = Catalog::default();
        for kind in AppKind::ALL {
            for app in load_apps(&data_dir, kind)? {
                // names key profile links, so they must be unique across all files
                if catalog.has_app(app.name()) {
                    return Err(DartsHubError::DuplicateApp {
                        file: kind.file_name().to_string(),
                        app: app.name().to_string(),
                    });
                }
                catalog.apps.push(app);
            }
        }
        catalog.profiles = load_profiles(&data_dir)?;

        let applied = migrations::run_all(&mut catalog);
        if !applied.is_empty() {
            info!("Applied {} migration(s)", applied.len());
        }
        catalog.validate_links()?;

        let manager = Self {
            data_dir,
            catalog,
            ctx,
        };
        manager.save()?;
        info!(
            "Catalog ready: {} apps, {} profiles",
            manager.catalog.apps.len(),
            manager.catalog.profiles.len()
        );
        Ok(manager)
    }

    /// Directory holding the catalog files
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Collaborators used to run apps
    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Write every catalog file whose content changed
    pub fn save(&self) -> Result<()> {
        for kind in AppKind::ALL {
            let apps: Vec<&App> = self.catalog.apps_of(kind).collect();
            store::write_file(&self.data_dir, kind.file_name(), &apps)?;
        }
        store::write_file(&self.data_dir, PROFILES_FILE, &self.catalog.profiles)?;
        Ok(())
    }

    /// Use `lines` as the output buffer size of every app
    pub fn set_monitor_lines(&mut self, lines: usize) {
        for app in &mut self.catalog.apps {
            if !app.is_running() {
                app.base_mut().set_monitor_lines(lines);
            }
        }
    }

    /// All profiles in user order
    pub fn profiles(&self) -> &[Profile] {
        &self.catalog.profiles
    }

    /// Profile by name
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.catalog.profile(name)
    }

    /// All apps in catalog order
    pub fn apps(&self) -> &[App] {
        &self.catalog.apps
    }

    /// App by name
    pub fn app(&self, name: &str) -> Option<&App> {
        self.catalog.app(name)
    }

    /// App by name, mutable (e.g. to change argument values before `save`)
    pub fn app_mut(&mut self, name: &str) -> Option<&mut App> {
        self.catalog.app_mut(name)
    }

    fn require_app(&self, name: &str) -> Result<&App> {
        self.catalog
            .app(name)
            .ok_or_else(|| DartsHubError::UnknownApp(name.to_string()))
    }

    fn require_profile(&self, name: &str) -> Result<&Profile> {
        self.catalog
            .profile(name)
            .ok_or_else(|| DartsHubError::UnknownProfile(name.to_string()))
    }

    /// Program an app would spawn
    pub fn executable_path(&self, app: &str) -> Result<Option<PathBuf>> {
        Ok(self.require_app(app)?.executable_path(&self.ctx))
    }

    /// Rendered command line of an app, optionally masked for display
    pub fn argument_string(
        &self,
        app: &str,
        runtime: Option<&RuntimeArguments>,
        masked: bool,
    ) -> Result<String> {
        Ok(self.require_app(app)?.base().argument_string(runtime, masked))
    }

    /// Whether `app` starts with `profile`
    pub fn tagged_for_start(&self, profile: &str, app: &str) -> Result<bool> {
        let profile = self.require_profile(profile)?;
        profile
            .state(app)
            .map(|s| s.tagged_for_start)
            .ok_or_else(|| DartsHubError::UnknownProfileApp {
                profile: profile.name.clone(),
                app: app.to_string(),
            })
    }

    /// Change whether `app` starts with `profile` (call `save` to persist)
    pub fn set_tagged_for_start(&mut self, profile: &str, app: &str, tagged: bool) -> Result<()> {
        self.catalog
            .profile_mut(profile)
            .ok_or_else(|| DartsHubError::UnknownProfile(profile.to_string()))?
            .set_tagged_for_start(app, tagged)
    }

    /// Run every required or tagged entry of a profile in order
    ///
    /// A failing entry is recorded and the remaining entries still run.
    pub fn run_profile(&self, name: &str) -> Result<ProfileRunReport> {
        let profile = self.require_profile(name)?;
        info!("Running profile {name}");

        let mut report = ProfileRunReport {
            profile: name.to_string(),
            ..ProfileRunReport::default()
        };
        for state in profile.startable() {
            let result = self.require_app(&state.app).and_then(|app| {
                let runtime = (!state.runtime_arguments.is_empty()).then_some(&state.runtime_arguments);
                app.run(runtime, &self.ctx)
            });
            match result {
                Ok(outcome) => report.outcomes.push((state.app.clone(), outcome)),
                Err(e) => {
                    warn!("Profile {name}: {} failed: {e}", state.app);
                    report.failures.push((state.app.clone(), e));
                }
            }
        }
        Ok(report)
    }

    /// Run one app outside of a profile
    pub fn run_app(&self, name: &str, runtime: Option<&RuntimeArguments>) -> Result<RunOutcome> {
        self.require_app(name)?.run(runtime, &self.ctx)
    }

    /// Close one app and its descendants
    pub fn close_app(&self, name: &str) -> Result<()> {
        self.require_app(name)?.close(&self.ctx)
    }

    /// Close every app; failures are collected and the rest still close
    pub fn close_all(&self) -> Vec<(String, DartsHubError)> {
        let mut failures = Vec::new();
        for app in &self.catalog.apps {
            if let Err(e) = app.close(&self.ctx) {
                warn!("Closing {} failed: {e}", app.name());
                failures.push((app.name().to_string(), e));
            }
        }
        failures
    }

    /// Start downloading a downloadable app in the background
    ///
    /// Returns `None` for apps that are not downloadable.
    pub fn download_app(&self, name: &str) -> Result<Option<JoinHandle<Result<()>>>> {
        let app = self.require_app(name)?;
        if app.kind() != AppKind::Downloadable {
            return Ok(None);
        }
        app.fetch(&self.ctx)
    }

    /// Start installing an installable app in the background
    ///
    /// Returns `None` for apps that are not installable.
    pub fn install_app(&self, name: &str) -> Result<Option<JoinHandle<Result<()>>>> {
        let app = self.require_app(name)?;
        if app.kind() != AppKind::Installable {
            return Ok(None);
        }
        app.fetch(&self.ctx)
    }

    /// Running states for the state monitor
    pub fn watch_list(&self) -> Vec<(String, Arc<AppRunningState>)> {
        self.catalog
            .apps
            .iter()
            .map(|a| (a.name().to_string(), Arc::clone(a.base().running())))
            .collect()
    }
}

fn parse_apps<T>(dir: &Path, file: &str) -> Result<Option<Vec<App>>>
where
    T: DeserializeOwned + Into<App>,
{
    Ok(store::read_file::<T>(dir, file)?.map(|items| items.into_iter().map(Into::into).collect()))
}

fn load_apps(dir: &Path, kind: AppKind) -> Result<Vec<App>> {
    let file = kind.file_name();
    let parsed = match kind {
        AppKind::Downloadable => parse_apps::<DownloadableApp>(dir, file)?,
        AppKind::Installable => parse_apps::<InstallableApp>(dir, file)?,
        AppKind::Local => parse_apps::<LocalApp>(dir, file)?,
        AppKind::Open => parse_apps::<OpenApp>(dir, file)?,
    };
    let apps = match parsed {
        Some(apps) => apps,
        None => create_defaults(dir, kind)?,
    };

    for app in &apps {
        if let Some(argument) = app
            .base()
            .configuration
            .as_ref()
            .and_then(|c| c.duplicate_name())
        {
            return Err(DartsHubError::DuplicateArgument {
                file: file.to_string(),
                app: app.name().to_string(),
                argument: argument.to_string(),
            });
        }
    }
    Ok(apps)
}

fn create_defaults(dir: &Path, kind: AppKind) -> Result<Vec<App>> {
    info!("{} not found, creating defaults", kind.file_name());
    let apps = defaults::default_apps(kind);
    store::write_file(dir, kind.file_name(), &apps)?;
    Ok(apps)
}

fn load_profiles(dir: &Path) -> Result<Vec<Profile>> {
    if let Some(profiles) = store::read_file(dir, PROFILES_FILE)? {
        return Ok(profiles);
    }
    info!("{PROFILES_FILE} not found, creating defaults");
    let profiles = defaults::default_profiles();
    store::write_file(dir, PROFILES_FILE, &profiles)?;
    Ok(profiles)
}
