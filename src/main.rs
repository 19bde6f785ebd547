//! `darts-hub` - launcher for dartboard companion apps
//!
//! Loads the catalog, optionally updates itself, starts a profile and keeps
//! the apps running until Enter is pressed.
//!
//! Usage: `darts-hub [profile]`

use anyhow::{Context, Result};
use darts_hub::{
    catalog::{CatalogManager, ProfileRunReport},
    config::{ConfigManager, HubSettings},
    download::{CancellationToken, Downloader, Timeouts},
    error::get_user_friendly_error,
    events::{EventBus, HubEvent},
    model::{AppContext, RunOutcome},
    monitor::AppStateMonitor,
    updater::{SelfUpdater, UpdateOutcome, UpdateState, UpdaterOptions, VersionChecker},
    utils,
};
use std::io::BufRead;
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{error, info, warn};

const REPO_OWNER: &str = "lbormann";
const REPO_NAME: &str = "darts-hub";

fn main() -> Result<()> {
    let data_dir = ConfigManager::data_dir().context("Failed to resolve the data directory")?;
    utils::init_logging(&ConfigManager::logs_dir(&data_dir))
        .context("Failed to initialize logging system")?;
    info!("Data directory: {}", data_dir.display());

    let mut settings = ConfigManager::load(&data_dir).context("Failed to load settings")?;

    let bus = EventBus::new();
    log_events(bus.subscribe());

    let downloader = Downloader::new(
        Timeouts::download(settings.download_timeout_secs),
        settings.retry,
        bus.clone(),
    )
    .context("Failed to create HTTP client")?;
    let api = Downloader::new(
        Timeouts::api(settings.api_timeout_secs),
        settings.retry,
        bus.clone(),
    )
    .context("Failed to create HTTP client")?;

    if settings.check_for_updates && check_and_apply_update(&data_dir, &mut settings, &api, &downloader, &bus)? {
        info!("Exiting for update");
        return Ok(());
    }

    let ctx = AppContext::new(ConfigManager::apps_dir(&data_dir), bus.clone(), downloader);
    let mut catalog = match CatalogManager::load(&data_dir, ctx) {
        Ok(catalog) => catalog,
        Err(e) if e.is_fatal_configuration() => {
            error!("Catalog is invalid, refusing to start: {e}");
            eprintln!("{}", get_user_friendly_error(&e));
            return Err(e).context("Catalog files need to be fixed before darts-hub can start");
        }
        Err(e) => {
            error!("Catalog could not be loaded: {e}");
            eprintln!("{}", get_user_friendly_error(&e));
            return Err(e).context("Failed to load catalog");
        }
    };
    catalog.set_monitor_lines(settings.monitor_lines);

    let monitor_cancel = CancellationToken::new();
    let monitor = AppStateMonitor::new(Duration::from_millis(settings.refresh_interval_ms), bus);
    monitor.update_watch_list(catalog.watch_list());
    let monitor_thread = monitor.start(monitor_cancel.clone());

    let profile = std::env::args().nth(1).or_else(|| settings.startup_profile.clone());
    match profile {
        Some(profile) => {
            let report = catalog
                .run_profile(&profile)
                .with_context(|| format!("Failed to run profile '{profile}'"))?;
            print_report(&report);
        }
        None => {
            println!("Profiles:");
            for profile in catalog.profiles() {
                println!("  {}", profile.name);
            }
            println!("Run `darts-hub <profile>` to start one.");
        }
    }

    println!("Press Enter to close all apps and exit.");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).ok();

    for (app, e) in catalog.close_all() {
        warn!("{app} could not be closed: {e}");
        eprintln!("{}", get_user_friendly_error(&e));
    }
    monitor_cancel.cancel();
    if monitor_thread.join().is_err() {
        warn!("App state monitor panicked");
    }
    info!("darts-hub exiting");
    Ok(())
}

/// Returns `true` when the update helper runs and the process must exit
fn check_and_apply_update(
    data_dir: &Path,
    settings: &mut HubSettings,
    api: &Downloader,
    downloader: &Downloader,
    bus: &EventBus,
) -> Result<bool> {
    let checker = VersionChecker::new(
        REPO_OWNER,
        REPO_NAME,
        env!("CARGO_PKG_VERSION"),
        settings.update_check_interval_secs,
    );
    if !checker.should_check(settings.last_update_check) {
        return Ok(false);
    }

    let updater = SelfUpdater::new(
        checker,
        api.clone(),
        downloader.clone(),
        bus.clone(),
        UpdaterOptions::new(
            ConfigManager::updates_dir(data_dir),
            settings.skip_update_confirmation,
        ),
    );

    let state = match updater.check() {
        Ok(state) => state,
        Err(e) => {
            // an unreachable update server must not block the launcher
            warn!("Update check failed: {e}");
            return Ok(false);
        }
    };
    settings.last_update_check = VersionChecker::current_timestamp();
    ConfigManager::save(data_dir, settings).context("Failed to save settings")?;

    if !matches!(state, UpdateState::UpdateAvailable { .. }) {
        return Ok(false);
    }
    match updater.apply(confirm_update) {
        Ok(UpdateOutcome::HandoffStarted { version }) => {
            println!("Installing darts-hub {version}, restarting...");
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) => {
            eprintln!("{}", get_user_friendly_error(&e));
            Ok(false)
        }
    }
}

fn confirm_update(version: &str) -> bool {
    println!("darts-hub {version} is available. Install now? [y/N]");
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

fn print_report(report: &ProfileRunReport) {
    println!("Profile {}:", report.profile);
    for (app, outcome) in &report.outcomes {
        match outcome {
            RunOutcome::Started { pid } => println!("  {app}: running (pid {pid})"),
            RunOutcome::Opened => println!("  {app}: opened"),
            RunOutcome::Deferred => println!("  {app}: downloading/installing, starts when ready"),
            RunOutcome::ConfigurationRequired { missing } => {
                println!("  {app}: needs configuration ({})", missing.join(", "));
            }
        }
    }
    for (app, e) in &report.failures {
        println!("  {app}: failed");
        eprintln!("{}", get_user_friendly_error(e));
    }
}

/// Mirror bus events into the log
fn log_events(events: mpsc::Receiver<HubEvent>) {
    std::thread::spawn(move || {
        for event in events {
            match &event {
                HubEvent::DownloadProgressed { .. } | HubEvent::UpdateDownloadProgressed { .. } => {
                    tracing::debug!("{event:?}");
                }
                HubEvent::DownloadFailed { .. }
                | HubEvent::InstallFailed { .. }
                | HubEvent::UpdateFailed { .. } => warn!("{event:?}"),
                _ => info!("{event:?}"),
            }
        }
    });
}
