//! Catalog migrations
//!
//! An ordered table of small, idempotent steps run on every load. Each step
//! inspects the current shape of the data and only acts if it is not already
//! upgraded; there is no stored version counter that could drift from the data.

use crate::catalog::Catalog;
use crate::catalog::defaults;
use crate::model::{App, AppKind, ProfileState};
use tracing::info;

/// One upgrade step
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Catalog file the step upgrades
    pub file: &'static str,
    /// Short description for the log
    pub name: &'static str,
    /// Apply the step; returns whether anything changed
    pub apply: fn(&mut Catalog) -> bool,
}

const DOWNLOADABLE: &str = "apps-downloadable.json";
const PROFILES: &str = "profiles.json";

/// All steps in execution order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        file: DOWNLOADABLE,
        name: "rename autodarts-gif to darts-gif",
        apply: rename_gif,
    },
    Migration {
        file: DOWNLOADABLE,
        name: "add missing built-in apps",
        apply: add_missing_apps,
    },
    Migration {
        file: DOWNLOADABLE,
        name: "caller: add download limit",
        apply: caller_add_download_limit,
    },
    Migration {
        file: DOWNLOADABLE,
        name: "caller: remove host port",
        apply: caller_remove_host_port,
    },
    Migration {
        file: DOWNLOADABLE,
        name: "caller: volume as fraction",
        apply: caller_volume_fraction,
    },
    Migration {
        file: DOWNLOADABLE,
        name: "extern: platform is a runtime argument",
        apply: extern_platform_runtime,
    },
    Migration {
        file: DOWNLOADABLE,
        name: "wled: multiple endpoints",
        apply: wled_multi_endpoints,
    },
    Migration {
        file: DOWNLOADABLE,
        name: "bump built-in versions",
        apply: bump_versions,
    },
    Migration {
        file: PROFILES,
        name: "add missing built-in profiles",
        apply: add_missing_profiles,
    },
    Migration {
        file: PROFILES,
        name: "add darts-voice next to darts-caller",
        apply: add_voice_entries,
    },
];

/// Run every step in order; returns the names of the steps that changed data
pub fn run_all(catalog: &mut Catalog) -> Vec<&'static str> {
    let mut applied = Vec::new();
    for migration in MIGRATIONS {
        if (migration.apply)(catalog) {
            info!("Migrated {}: {}", migration.file, migration.name);
            applied.push(migration.name);
        }
    }
    applied
}

fn rename_gif(catalog: &mut Catalog) -> bool {
    const OLD: &str = "autodarts-gif";
    const NEW: &str = "darts-gif";
    if !catalog.has_app(OLD) {
        return false;
    }
    if catalog.rename_app(OLD, NEW) {
        return true;
    }

    // both exist: keep the new descriptor and fold profile entries into it
    catalog.apps.retain(|a| a.name() != OLD);
    for profile in &mut catalog.profiles {
        let Some(old) = profile.state(OLD).cloned() else {
            continue;
        };
        profile.remove_app(OLD);
        if !profile.contains(NEW) {
            profile.add_app(ProfileState { app: NEW.to_string(), ..old });
        }
    }
    true
}

fn add_missing_apps(catalog: &mut Catalog) -> bool {
    let mut changed = false;
    for kind in AppKind::ALL {
        for app in defaults::default_apps(kind) {
            if !catalog.has_app(app.name()) {
                info!("Adding built-in app {}", app.name());
                catalog.apps.push(app);
                changed = true;
            }
        }
    }
    changed
}

fn caller_add_download_limit(catalog: &mut Catalog) -> bool {
    catalog
        .configuration_mut("darts-caller")
        .is_some_and(|c| c.add_argument(defaults::download_limit()))
}

fn caller_remove_host_port(catalog: &mut Catalog) -> bool {
    catalog
        .configuration_mut("darts-caller")
        .is_some_and(|c| c.remove_argument("HP"))
}

fn caller_volume_fraction(catalog: &mut Catalog) -> bool {
    let target = defaults::volume().kind;
    let Some(volume) = catalog
        .configuration_mut("darts-caller")
        .and_then(|c| c.argument_mut("V"))
    else {
        return false;
    };
    if volume.kind == target {
        return false;
    }

    // percentages become fractions
    if let Some(value) = volume.value.as_deref().and_then(|v| v.trim().parse::<f64>().ok())
        && value > 1.0
    {
        volume.value = Some(format!("{}", (value / 100.0).clamp(0.0, 1.0)));
    }
    volume.kind = target;
    true
}

fn extern_platform_runtime(catalog: &mut Catalog) -> bool {
    let Some(platform) = catalog
        .configuration_mut("darts-extern")
        .and_then(|c| c.argument_mut("extern_platform"))
    else {
        return false;
    };
    if platform.is_runtime_argument {
        return false;
    }
    platform.is_runtime_argument = true;
    platform.required = false;
    true
}

fn wled_multi_endpoints(catalog: &mut Catalog) -> bool {
    let Some(endpoints) = catalog
        .configuration_mut("darts-wled")
        .and_then(|c| c.argument_mut("WEPS"))
    else {
        return false;
    };
    if endpoints.is_multi {
        return false;
    }
    endpoints.is_multi = true;
    true
}

fn bump_versions(catalog: &mut Catalog) -> bool {
    let mut changed = false;
    for builtin in defaults::default_apps(AppKind::Downloadable) {
        let App::Downloadable(builtin) = builtin else {
            continue;
        };
        let Some(app) = catalog.downloadable_mut(&builtin.base.name) else {
            continue;
        };
        if app.version != builtin.version || app.download_urls != builtin.download_urls {
            info!(
                "Bumping {} from {} to {}",
                builtin.base.name, app.version, builtin.version
            );
            app.version = builtin.version;
            app.download_urls = builtin.download_urls;
            changed = true;
        }
    }
    changed
}

fn add_missing_profiles(catalog: &mut Catalog) -> bool {
    let mut changed = false;
    for profile in defaults::default_profiles() {
        if catalog.profile(&profile.name).is_none() {
            info!("Adding built-in profile {}", profile.name);
            catalog.profiles.push(profile);
            changed = true;
        }
    }
    changed
}

fn add_voice_entries(catalog: &mut Catalog) -> bool {
    if !catalog.has_app("darts-voice") {
        return false;
    }
    let mut changed = false;
    for profile in &mut catalog.profiles {
        if profile.contains("darts-caller") && !profile.contains("darts-voice") {
            changed |= profile.insert_after("darts-caller", ProfileState::new("darts-voice"));
        }
    }
    changed
}
