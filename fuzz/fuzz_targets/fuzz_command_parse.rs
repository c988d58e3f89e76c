//! Fuzz target: `Command::parse`
//!
//! Any inbound payload maps to exactly one command.  Recognized commands
//! must round-trip through their state label.
//!
//! cargo fuzz run fuzz_command_parse

#![no_main]

use fragrancer::app::commands::Command;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let cmd = Command::parse(data);
    if cmd != Command::Unrecognized {
        assert_eq!(Command::parse(cmd.label().as_bytes()), cmd);
    }
});
