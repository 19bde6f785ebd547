#![no_main]

use darts_hub::model::{DownloadableApp, InstallableApp, LocalApp, OpenApp, Profile};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Catalog files are user-editable; parsing must fail cleanly, never panic
    if let Ok(s) = std::str::from_utf8(data) {
        let _: Result<Vec<DownloadableApp>, _> = serde_json::from_str(s);
        let _: Result<Vec<InstallableApp>, _> = serde_json::from_str(s);
        let _: Result<Vec<LocalApp>, _> = serde_json::from_str(s);
        let _: Result<Vec<OpenApp>, _> = serde_json::from_str(s);
        let _: Result<Vec<Profile>, _> = serde_json::from_str(s);

        // Whatever parses must render without panicking
        if let Ok(apps) = serde_json::from_str::<Vec<LocalApp>>(s) {
            for app in &apps {
                if let Some(configuration) = &app.base.configuration {
                    let _ = configuration.tokens(None);
                    let _ = configuration.render(None, true);
                }
            }
        }
    }
});
