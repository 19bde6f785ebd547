//! Built-in apps and profiles
//!
//! Written to disk on first start and used by migrations as the canonical
//! shape of each built-in entry.

use crate::model::{
    App, AppBase, AppKind, Argument, ArgumentType, Configuration, DownloadableApp, InstallableApp,
    LocalApp, OpenApp, Profile, ProfileState,
};
use std::collections::BTreeMap;

/// Latest known release of each built-in downloadable app
pub const BUILTIN_VERSIONS: [(&str, &str); 7] = [
    ("autodarts-client", "0.26.12"),
    ("darts-caller", "2.17.8"),
    ("darts-extern", "1.6.3"),
    ("darts-wled", "1.9.2"),
    ("darts-pixelit", "1.3.1"),
    ("darts-gif", "1.1.0"),
    ("darts-voice", "1.0.6"),
];

/// Platforms for which the bridge apps ship binaries
const GITHUB_PLATFORMS: [(&str, &str); 4] = [
    ("windows-x64", ".exe"),
    ("linux-x64", ""),
    ("linux-arm64", "-arm64"),
    ("macos-x64", "-mac"),
];

/// External platforms the extern bridge can drive
const EXTERN_PLATFORMS: [&str; 3] = ["lidarts", "nakka", "dartboards"];

fn version_of(name: &str) -> String {
    BUILTIN_VERSIONS
        .iter()
        .find(|(app, _)| *app == name)
        .map(|(_, version)| (*version).to_string())
        .unwrap_or_default()
}

fn github_urls(repo: &str) -> BTreeMap<String, String> {
    GITHUB_PLATFORMS
        .iter()
        .map(|(platform, suffix)| {
            (
                (*platform).to_string(),
                format!(
                    "https://github.com/lbormann/{repo}/releases/download/v{{version}}/{repo}{suffix}"
                ),
            )
        })
        .collect()
}

fn bridge(name: &str, description: &str, configuration: Configuration) -> App {
    App::from(DownloadableApp {
        base: AppBase::new(name)
            .description(description)
            .links(
                format!("https://github.com/lbormann/{name}"),
                Some(format!("https://github.com/lbormann/{name}/blob/main/CHANGELOG.md").as_str()),
            )
            .configuration(configuration),
        version: version_of(name),
        download_urls: github_urls(name),
        executables: BTreeMap::new(),
    })
}

fn connection() -> Argument {
    Argument::new("CON", ArgumentType::String)
        .human("Connection")
        .in_section("Service")
        .with_value("127.0.0.1:8079")
}

fn flag(name: &str, label: &str, section: &str) -> Argument {
    Argument::new(name, ArgumentType::Bool)
        .human(label)
        .in_section(section)
        .mapping(&[("True", "1"), ("False", "0")])
}

fn int(min: i64, max: i64) -> ArgumentType {
    ArgumentType::Int {
        min: Some(min),
        max: Some(max),
    }
}

/// Voice caller
pub fn darts_caller() -> App {
    let configuration = Configuration::new("-", " ")
        .with(Argument::new("U", ArgumentType::String).required().human("Autodarts email").in_section("Autodarts"))
        .with(Argument::new("P", ArgumentType::Password).required().human("Autodarts password").in_section("Autodarts"))
        .with(Argument::new("B", ArgumentType::String).required().human("Autodarts board-id").in_section("Autodarts"))
        .with(Argument::new("M", ArgumentType::Path).required().human("Path to sound-files").in_section("Media"))
        .with(Argument::new("MS", ArgumentType::Path).human("Path to shared sound-files").in_section("Media"))
        .with(volume())
        .with(Argument::new("C", ArgumentType::String).human("Specific caller").in_section("Calls"))
        .with(flag("R", "Random caller", "Random"))
        .with(Argument::new("L", int(0, 2)).human("Random caller language").in_section("Random"))
        .with(Argument::new("RL", int(0, 6)).human("Random caller gender").in_section("Random"))
        .with(flag("E", "Call every dart", "Calls"))
        .with(flag("PCC", "Possible checkout call", "Calls"))
        .with(Argument::new("A", ArgumentType::Float { min: Some(0.0), max: Some(1.0) }).human("Ambient sounds").in_section("Calls"))
        .with(download_limit())
        .with(Argument::new("WEB", int(0, 2)).human("Web caller").in_section("Service"))
        .with(Argument::new("WEBP", int(1, 65535)).human("Web caller port").in_section("Service"));
    bridge("darts-caller", "Calls scores, checkouts and events", configuration)
}

/// `V`: caller volume
pub fn volume() -> Argument {
    Argument::new(
        "V",
        ArgumentType::Float {
            min: Some(0.0),
            max: Some(1.0),
        },
    )
    .human("Caller volume")
    .in_section("Media")
}

/// `DLL`: number of caller voices downloaded in advance
pub fn download_limit() -> Argument {
    Argument::new("DLL", int(0, 1000))
        .human("Downloads limit")
        .in_section("Downloads")
}

/// Bridge to external dart platforms
pub fn darts_extern() -> App {
    let choices = EXTERN_PLATFORMS.iter().map(ToString::to_string).collect();
    let configuration = Configuration::new("--", " ")
        .with(Argument::new("connection", ArgumentType::String).human("Connection").in_section("Service").with_value("127.0.0.1:8079"))
        .with(extern_platform(choices))
        .with(Argument::new("time_before_exit", int(0, 60_000)).human("Time before exit (ms)").in_section("Service"))
        .with(Argument::new("lidarts_user", ArgumentType::String).required_on("extern_platform=lidarts").human("Lidarts user").in_section("Lidarts"))
        .with(Argument::new("lidarts_password", ArgumentType::Password).required_on("extern_platform=lidarts").human("Lidarts password").in_section("Lidarts"))
        .with(flag("lidarts_skip_dart_modals", "Skip dart modals", "Lidarts"))
        .with(flag("nakka_skip_dart_modals", "Skip dart modals", "Nakka"))
        .with(Argument::new("dartboards_user", ArgumentType::String).required_on("extern_platform=dartboards").human("Dartboards user").in_section("Dartboards"))
        .with(Argument::new("dartboards_password", ArgumentType::Password).required_on("extern_platform=dartboards").human("Dartboards password").in_section("Dartboards"));
    bridge("darts-extern", "Mirrors autodarts games on external platforms", configuration)
}

/// `extern_platform`: which external platform a profile drives
pub fn extern_platform(choices: Vec<String>) -> Argument {
    Argument::new("extern_platform", ArgumentType::Selection(choices))
        .human("External platform")
        .runtime()
}

/// LED strip effects
pub fn darts_wled() -> App {
    let configuration = Configuration::new("-", " ")
        .with(connection())
        .with(wled_endpoints())
        .with(Argument::new("BRI", int(1, 255)).human("Brightness").in_section("Effects"))
        .with(Argument::new("DU", int(0, 10)).human("Effect duration").in_section("Effects"))
        .with(flag("BSS", "Board stop start", "Effects"))
        .with(Argument::new("IDE", ArgumentType::String).human("Idle effect").in_section("Effects"))
        .with(Argument::new("G", ArgumentType::String).multi().human("Game won effects").in_section("Effects"))
        .with(Argument::new("M", ArgumentType::String).multi().human("Match won effects").in_section("Effects"))
        .with(Argument::new("B", ArgumentType::String).multi().human("Busted effects").in_section("Effects"));
    bridge("darts-wled", "Drives WLED installations", configuration)
}

/// `WEPS`: one or more WLED endpoints
pub fn wled_endpoints() -> Argument {
    Argument::new("WEPS", ArgumentType::String)
        .required()
        .multi()
        .human("WLED endpoints")
        .in_section("Service")
}

/// Pixel matrix displays
pub fn darts_pixelit() -> App {
    let configuration = Configuration::new("-", " ")
        .with(connection())
        .with(Argument::new("PEPS", ArgumentType::String).required().multi().human("Pixelit endpoints").in_section("Service"))
        .with(Argument::new("TP", ArgumentType::Path).required().human("Templates path").in_section("Media"))
        .with(Argument::new("BRI", int(1, 255)).human("Brightness").in_section("Effects"))
        .with(Argument::new("IDE", ArgumentType::String).human("Idle effect").in_section("Effects"));
    bridge("darts-pixelit", "Drives Pixelit displays", configuration)
}

/// Animated images on events
pub fn darts_gif() -> App {
    let configuration = Configuration::new("-", " ")
        .with(connection())
        .with(Argument::new("MP", ArgumentType::Path).human("Media path").in_section("Media"))
        .with(Argument::new("WEB", int(0, 2)).human("Web gif").in_section("Service"))
        .with(Argument::new("WEBP", int(1, 65535)).human("Web gif port").in_section("Service"))
        .with(Argument::new("DU", int(0, 60)).human("Display duration").in_section("Effects"));
    bridge("darts-gif", "Shows animations for game events", configuration)
}

/// Voice recognition for score corrections
pub fn darts_voice() -> App {
    let configuration = Configuration::new("-", " ")
        .with(connection())
        .with(Argument::new("MP", ArgumentType::Path).required().human("Path to speech model").in_section("Voice"))
        .with(Argument::new("L", int(0, 2)).human("Language").in_section("Voice"))
        .with(Argument::new("KNG", ArgumentType::String).human("Keywords next game").in_section("Voice"));
    bridge("darts-voice", "Controls games by voice", configuration)
}

/// Board detection client
pub fn autodarts_client() -> App {
    let archive = |target: &str| {
        format!(
            "https://github.com/autodarts/releases/releases/download/v{{version}}/autodarts{{version}}.{target}.zip"
        )
    };
    let download_urls = BTreeMap::from([
        ("windows-x64".to_string(), archive("windows-amd64")),
        ("linux-x64".to_string(), archive("linux-amd64")),
        ("linux-arm64".to_string(), archive("linux-arm64")),
        ("linux-arm".to_string(), archive("linux-armv7l")),
        ("macos-x64".to_string(), archive("darwin-amd64")),
        ("macos-arm64".to_string(), archive("darwin-arm64")),
    ]);
    let executables = download_urls
        .keys()
        .map(|platform| {
            let exe = if platform.starts_with("windows") {
                "autodarts.exe"
            } else {
                "autodarts"
            };
            (platform.clone(), exe.to_string())
        })
        .collect();

    App::from(DownloadableApp {
        base: AppBase::new("autodarts-client")
            .custom_name("Autodarts client")
            .description("Board detection for autodarts")
            .links("https://docs.autodarts.io", None),
        version: version_of("autodarts-client"),
        download_urls,
        executables,
    })
}

fn downloadables() -> Vec<App> {
    vec![
        autodarts_client(),
        darts_caller(),
        darts_extern(),
        darts_wled(),
        darts_pixelit(),
        darts_gif(),
        darts_voice(),
    ]
}

fn installables() -> Vec<App> {
    let droid_cam = InstallableApp {
        base: AppBase::new("droid-cam")
            .custom_name("DroidCam")
            .description("Use a phone as board camera")
            .links("https://www.dev47apps.com", None),
        download_urls: BTreeMap::from([(
            "windows-x64".to_string(),
            "https://github.com/dev47apps/windows-releases/releases/download/win-6.5.2/DroidCam.Setup.6.5.2.exe".to_string(),
        )]),
        installer_arguments: vec!["/S".to_string()],
        run_as_admin: true,
        executables: BTreeMap::from([(
            "windows-x64".to_string(),
            "C:\\Program Files (x86)\\DroidCam\\DroidCamApp.exe".to_string(),
        )]),
        is_service: false,
        starts_after_install: false,
    };
    let virtual_darts_zoom = InstallableApp {
        base: AppBase::new("virtual-darts-zoom")
            .custom_name("Virtual Darts Zoom")
            .description("Zooms the camera image onto the last dart")
            .links("https://lehmann-bo.de/?p=28", None),
        download_urls: BTreeMap::from([(
            "windows-x64".to_string(),
            "https://lehmann-bo.de/Downloads/VDZ/Virtual Darts Zoom.zip".to_string(),
        )]),
        installer_arguments: Vec::new(),
        run_as_admin: false,
        executables: BTreeMap::from([(
            "windows-x64".to_string(),
            "{localdata}\\Apps\\2.0\\Virtual Darts Zoom\\Virtual Darts Zoom.exe".to_string(),
        )]),
        is_service: false,
        starts_after_install: true,
    };
    vec![App::from(droid_cam), App::from(virtual_darts_zoom)]
}

fn local(name: &str) -> App {
    App::from(LocalApp {
        base: AppBase::new(name).configuration(
            Configuration::new("", " ")
                .with(Argument::new("file", ArgumentType::File).required().human("Executable"))
                .with(Argument::new("arguments", ArgumentType::String).human("Arguments")),
        ),
    })
}

fn open(name: &str, custom_name: &str, url: &str) -> App {
    App::from(OpenApp {
        base: AppBase::new(name).custom_name(custom_name),
        default_value: url.to_string(),
    })
}

fn opens() -> Vec<App> {
    let custom_url = OpenApp {
        base: AppBase::new("custom-url-1").configuration(
            Configuration::new("", " ")
                .with(Argument::new("file", ArgumentType::String).required().human("URL or file")),
        ),
        default_value: String::new(),
    };
    vec![
        open("autodarts.io", "Autodarts.io", "https://play.autodarts.io"),
        open(
            "autodarts-boardmanager",
            "Autodarts board manager",
            "http://127.0.0.1:3180",
        ),
        App::from(custom_url),
    ]
}

/// Built-in apps of one catalog file
pub fn default_apps(kind: AppKind) -> Vec<App> {
    match kind {
        AppKind::Downloadable => downloadables(),
        AppKind::Installable => installables(),
        AppKind::Local => vec![local("custom-1"), local("custom-2")],
        AppKind::Open => opens(),
    }
}

/// Entries shared by all platform profiles after the caller
fn effect_entries(profile: Profile) -> Profile {
    profile
        .with(ProfileState::new("darts-voice"))
        .with(ProfileState::new("darts-wled"))
        .with(ProfileState::new("darts-pixelit"))
        .with(ProfileState::new("darts-gif"))
}

/// Built-in profiles
pub fn default_profiles() -> Vec<Profile> {
    let mut profiles = vec![effect_entries(
        Profile::new("autodarts-caller")
            .with(ProfileState::new("autodarts-client"))
            .with(ProfileState::new("autodarts.io").tagged())
            .with(ProfileState::new("autodarts-boardmanager"))
            .with(ProfileState::new("darts-caller").required()),
    )];

    for platform in EXTERN_PLATFORMS {
        profiles.push(effect_entries(
            Profile::new(platform)
                .with(ProfileState::new("darts-caller").required())
                .with(
                    ProfileState::new("darts-extern")
                        .required()
                        .with_runtime("extern_platform", platform),
                ),
        ));
    }

    profiles.push(
        Profile::new("custom")
            .with(ProfileState::new("custom-1"))
            .with(ProfileState::new("custom-2"))
            .with(ProfileState::new("custom-url-1")),
    );
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn catalog() -> Catalog {
        Catalog {
            apps: AppKind::ALL.into_iter().flat_map(default_apps).collect(),
            profiles: default_profiles(),
        }
    }

    #[test]
    fn test_default_profiles_link() {
        assert!(catalog().validate_links().is_ok());
    }

    #[test]
    fn test_names_are_unique() {
        let catalog = catalog();
        let mut names: Vec<&str> = catalog.apps.iter().map(App::name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }

    #[test]
    fn test_configurations_have_unique_arguments() {
        for app in catalog().apps {
            if let Some(configuration) = &app.base().configuration {
                assert_eq!(configuration.duplicate_name(), None, "{}", app.name());
            }
        }
    }

    #[test]
    fn test_versions_match_builtin_table() {
        for app in default_apps(AppKind::Downloadable) {
            let App::Downloadable(app) = app else {
                panic!("not downloadable");
            };
            assert_eq!(app.version, version_of(&app.base.name));
            assert!(!app.version.is_empty());
        }
    }

    #[test]
    fn test_extern_profiles_pass_platform() {
        let catalog = catalog();
        let nakka = catalog.profile("nakka").unwrap();
        let state = nakka.state("darts-extern").unwrap();
        assert_eq!(state.runtime_arguments["extern_platform"], "nakka");

        let config = catalog.app("darts-extern").unwrap().base().configuration.clone().unwrap();
        assert!(config.missing_required(Some(&state.runtime_arguments)).is_empty());

        let lidarts = catalog.profile("lidarts").unwrap().state("darts-extern").unwrap();
        assert_eq!(
            config.missing_required(Some(&lidarts.runtime_arguments)),
            vec!["lidarts_user".to_string(), "lidarts_password".to_string()]
        );
    }
}
