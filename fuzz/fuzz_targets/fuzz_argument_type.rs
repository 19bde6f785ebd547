#![no_main]

use darts_hub::model::ArgumentType;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Split into a type string and a value to validate against it
        let (kind, value) = s.split_once('\n').unwrap_or((s, ""));
        if let Ok(parsed) = kind.parse::<ArgumentType>() {
            // Display must produce a string that parses back to the same type
            let reparsed: ArgumentType = parsed.to_string().parse().unwrap();
            assert_eq!(parsed, reparsed);
            let _ = parsed.validate(value);
        }
    }
});
