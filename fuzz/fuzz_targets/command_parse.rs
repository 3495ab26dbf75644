//! Arbitrary frame bodies through the config-command decoder.
//!
//! Decoding must never panic, and any accepted command must survive its own
//! JSON encoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use shieldnet_core::ConfigCommand;

fuzz_target!(|data: &[u8]| {
    if let Ok(command) = ConfigCommand::parse(data) {
        let encoded = command.to_json();
        let decoded = ConfigCommand::parse(encoded.as_bytes()).expect("encoded command decodes");
        assert_eq!(decoded, command);
    }
});
