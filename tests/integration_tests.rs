//! Integration tests for `darts-hub`
//!
//! Exercise the catalog lifecycle end to end against a temporary data
//! directory: defaults, migrations, link validation, persistence, command
//! line rendering and process control.

#![allow(clippy::unwrap_used)]

use darts_hub::{
    catalog::{CatalogManager, PROFILES_FILE},
    download::{Downloader, RetryPolicy, Timeouts},
    error::{DartsHubError, get_user_friendly_error},
    events::{EventBus, HubEvent},
    model::{AppContext, AppKind, RunOutcome},
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn context(dir: &Path, bus: &EventBus) -> AppContext {
    let downloader = Downloader::new(Timeouts::api(5), RetryPolicy::default(), bus.clone()).unwrap();
    AppContext::new(dir.join("apps"), bus.clone(), downloader)
}

fn load(dir: &TempDir) -> darts_hub::Result<CatalogManager> {
    let bus = EventBus::new();
    CatalogManager::load(dir.path(), context(dir.path(), &bus))
}

fn catalog_files(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    AppKind::ALL
        .iter()
        .map(|k| k.file_name())
        .chain(std::iter::once(PROFILES_FILE))
        .map(|f| (f.to_string(), fs::read(dir.join(f)).unwrap()))
        .collect()
}

#[test]
fn test_fresh_directory_gets_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let manager = load(&dir).unwrap();

    assert!(manager.app("autodarts-client").is_some());
    assert!(manager.app("darts-caller").is_some());
    assert!(manager.app("custom-1").is_some());
    assert!(manager.profile("autodarts-caller").is_some());

    for file in catalog_files(dir.path()).keys() {
        assert!(dir.path().join(file).exists(), "{file} should be persisted");
    }
    let downloadable = fs::read_to_string(dir.path().join("apps-downloadable.json")).unwrap();
    assert!(downloadable.contains("\"name\": \"autodarts-client\""));
    assert!(downloadable.ends_with('\n'));
}

#[test]
fn test_second_load_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    drop(load(&dir).unwrap());
    let first = catalog_files(dir.path());

    drop(load(&dir).unwrap());
    assert_eq!(catalog_files(dir.path()), first);
}

#[test]
fn test_missing_single_file_is_restored() {
    let dir = tempfile::tempdir().unwrap();
    drop(load(&dir).unwrap());
    fs::remove_file(dir.path().join("apps-open.json")).unwrap();

    let manager = load(&dir).unwrap();
    assert!(manager.app("autodarts.io").is_some());
    assert!(dir.path().join("apps-open.json").exists());
}

#[test]
fn test_profile_with_unknown_app_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(PROFILES_FILE),
        r#"[{"name": "evening", "apps": [{"app": "darts-caller"}, {"app": "ghost-app"}]}]"#,
    )
    .unwrap();

    let err = load(&dir).unwrap_err();
    match &err {
        DartsHubError::UnknownProfileApp { profile, app } => {
            assert_eq!(profile, "evening");
            assert_eq!(app, "ghost-app");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_fatal_configuration());
    let message = get_user_friendly_error(&err);
    assert!(message.contains("evening") && message.contains("ghost-app"));
}

#[test]
fn test_parse_error_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("apps-local.json"), "[{ broken").unwrap();

    let err = load(&dir).unwrap_err();
    assert!(matches!(&err, DartsHubError::CatalogParse { file, .. } if file == "apps-local.json"));
    assert!(err.to_string().contains("apps-local.json"));
    // the broken file is left alone for the user to fix
    assert_eq!(
        fs::read_to_string(dir.path().join("apps-local.json")).unwrap(),
        "[{ broken"
    );
}

#[test]
fn test_duplicate_argument_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("apps-local.json"),
        r#"[{"name": "custom-1", "configuration": {"prefix": "", "delimiter": " ",
            "arguments": [{"name": "file", "type": "file"}, {"name": "file", "type": "string"}]}}]"#,
    )
    .unwrap();

    let err = load(&dir).unwrap_err();
    assert!(matches!(
        &err,
        DartsHubError::DuplicateArgument { file, app, argument }
            if file == "apps-local.json" && app == "custom-1" && argument == "file"
    ));
}

#[test]
fn test_app_name_defined_in_two_files_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    drop(load(&dir).unwrap());
    fs::write(
        dir.path().join("apps-local.json"),
        r#"[{"name": "darts-caller", "configuration": {"prefix": "", "delimiter": " ",
            "arguments": [{"name": "file", "type": "file"}]}}]"#,
    )
    .unwrap();

    let err = load(&dir).unwrap_err();
    assert!(matches!(
        &err,
        DartsHubError::DuplicateApp { file, app }
            if file == "apps-local.json" && app == "darts-caller"
    ));
    assert!(err.is_fatal_configuration());
    assert!(get_user_friendly_error(&err).contains("darts-caller"));
}

#[test]
fn test_old_caller_is_migrated() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("apps-downloadable.json"),
        r#"[{"name": "darts-caller", "version": "2.0.0",
            "downloadUrls": {"linux-x64": "https://example.invalid/darts-caller"},
            "configuration": {"prefix": "-", "delimiter": " ", "arguments": [
                {"name": "U", "type": "string", "required": true},
                {"name": "HP", "type": "int", "value": "8079"},
                {"name": "V", "type": "float", "value": "50"}
            ]}}]"#,
    )
    .unwrap();

    let manager = load(&dir).unwrap();
    let caller = manager.app("darts-caller").unwrap();
    let configuration = caller.base().configuration.as_ref().unwrap();
    assert!(!configuration.contains("HP"));
    assert!(configuration.contains("DLL"));
    assert_eq!(configuration.argument("V").unwrap().value.as_deref(), Some("0.5"));

    // the migrated shape is persisted and stable
    let first = catalog_files(dir.path());
    drop(manager);
    drop(load(&dir).unwrap());
    assert_eq!(catalog_files(dir.path()), first);
}

#[test]
fn test_renamed_app_keeps_profile_links() {
    let dir = tempfile::tempdir().unwrap();
    drop(load(&dir).unwrap());

    let downloadable = dir.path().join("apps-downloadable.json");
    let content = fs::read_to_string(&downloadable)
        .unwrap()
        .replace("\"name\": \"darts-gif\"", "\"name\": \"autodarts-gif\"");
    fs::write(&downloadable, content).unwrap();
    let profiles = dir.path().join(PROFILES_FILE);
    let content = fs::read_to_string(&profiles)
        .unwrap()
        .replace("\"app\": \"darts-gif\"", "\"app\": \"autodarts-gif\"");
    fs::write(&profiles, content).unwrap();

    let manager = load(&dir).unwrap();
    assert!(manager.app("autodarts-gif").is_none());
    assert!(manager.app("darts-gif").is_some());
    assert!(manager.profile("autodarts-caller").unwrap().contains("darts-gif"));
}

#[test]
fn test_caller_rendering_through_manager() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = load(&dir).unwrap();

    let configuration = manager
        .app_mut("darts-caller")
        .unwrap()
        .base_mut()
        .configuration
        .as_mut()
        .unwrap();
    configuration.argument_mut("R").unwrap().set_value(Some("True".to_string()));
    configuration.argument_mut("DLL").unwrap().set_value(Some("5000".to_string()));
    configuration.argument_mut("P").unwrap().set_value(Some("hunter22".to_string()));

    let rendered = manager.argument_string("darts-caller", None, false).unwrap();
    assert!(rendered.contains("-R 1"), "{rendered}");
    assert!(!rendered.contains("DLL"), "{rendered}");
    assert!(rendered.contains("hunter22"));

    let masked = manager.argument_string("darts-caller", None, true).unwrap();
    assert!(!masked.contains("hunter22"), "{masked}");

    // changed values survive a save and reload
    manager.save().unwrap();
    drop(manager);
    let manager = load(&dir).unwrap();
    let rendered = manager.argument_string("darts-caller", None, false).unwrap();
    assert!(rendered.contains("-R 1"));
}

#[test]
fn test_unconfigured_app_requires_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new();
    let rx = bus.subscribe();
    let manager = CatalogManager::load(dir.path(), context(dir.path(), &bus)).unwrap();

    let outcome = manager.run_app("darts-caller", None).unwrap();
    let RunOutcome::ConfigurationRequired { missing } = outcome else {
        panic!("expected ConfigurationRequired, got {outcome:?}");
    };
    assert!(missing.contains(&"U".to_string()));
    assert!(missing.contains(&"P".to_string()));

    let event = rx
        .try_iter()
        .find(|e| matches!(e, HubEvent::ConfigurationRequired { .. }));
    assert!(matches!(
        event,
        Some(HubEvent::ConfigurationRequired { app, .. }) if app == "darts-caller"
    ));
}

#[test]
fn test_tagging_required_entry_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = load(&dir).unwrap();

    let err = manager
        .set_tagged_for_start("autodarts-caller", "darts-caller", false)
        .unwrap_err();
    assert!(matches!(err, DartsHubError::RequiredApp { .. }));

    manager
        .set_tagged_for_start("autodarts-caller", "darts-wled", true)
        .unwrap();
    assert!(manager.tagged_for_start("autodarts-caller", "darts-wled").unwrap());
}

#[test]
fn test_unknown_names() {
    let dir = tempfile::tempdir().unwrap();
    let manager = load(&dir).unwrap();
    assert!(matches!(
        manager.run_app("nope", None),
        Err(DartsHubError::UnknownApp(_))
    ));
    assert!(matches!(
        manager.run_profile("nope"),
        Err(DartsHubError::UnknownProfile(_))
    ));
    assert!(manager.download_app("custom-1").unwrap().is_none());
}

#[cfg(unix)]
#[test]
fn test_concurrent_close_of_local_app() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = load(&dir).unwrap();

    let configuration = manager
        .app_mut("custom-1")
        .unwrap()
        .base_mut()
        .configuration
        .as_mut()
        .unwrap();
    configuration.argument_mut("file").unwrap().set_value(Some("/bin/sleep".to_string()));
    configuration.argument_mut("arguments").unwrap().set_value(Some("30".to_string()));

    let outcome = manager.run_app("custom-1", None).unwrap();
    assert!(matches!(outcome, RunOutcome::Started { .. }));
    assert!(manager.app("custom-1").unwrap().is_running());

    let manager = &manager;
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| s.spawn(move || manager.close_app("custom-1")))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(results.iter().all(Result::is_ok), "{results:?}");
    assert!(!manager.app("custom-1").unwrap().is_running());
    assert!(manager.close_all().is_empty());
}
