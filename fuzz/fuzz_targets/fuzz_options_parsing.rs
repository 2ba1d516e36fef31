//! Fuzz target for `StoreOptions::from_toml`.
//!
//! Arbitrary TOML must either parse into valid options or return
//! `Error::Config`; it must never panic.
//!
//! Run with: `cargo +nightly fuzz run fuzz_options_parsing`

#![no_main]

use kvlite::{Error, StoreOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    match StoreOptions::from_toml(text) {
        Ok(options) => {
            assert!(options.validate().is_ok());
            // Valid options survive a round trip
            if let Ok(rendered) = toml::to_string(&options) {
                assert!(StoreOptions::from_toml(&rendered).is_ok());
            }
        },
        Err(Error::Config(_)) => {},
        Err(e) => panic!("unexpected error kind: {e}"),
    }
});
