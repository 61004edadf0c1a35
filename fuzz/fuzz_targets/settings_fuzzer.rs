#![no_main]
//! Settings document fuzzing
//!
//! Arbitrary bytes are parsed as a settings document. Anything that parses and
//! validates must build into policies without error.

use libfuzzer_sys::fuzz_target;

use palisade_config::{is_valid_host, CspSettings, PolicyBuilder};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = is_valid_host(text);

        let settings = match CspSettings::from_json_str(text) {
            Ok(settings) => settings,
            Err(_) => return,
        };
        if settings.validate().is_err() {
            return;
        }

        let builder = PolicyBuilder::new(settings);
        let pairs = builder.header_pairs().expect("validated settings must build");
        for (name, value) in pairs {
            assert!(name.starts_with("Content-Security-Policy"));
            assert!(!value.is_empty());
        }
    }
});
