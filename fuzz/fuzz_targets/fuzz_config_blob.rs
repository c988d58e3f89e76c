//! Fuzz target: `ConfigPort::load` over an arbitrary persisted blob.
//!
//! Whatever sits in flash, loading either fails cleanly or yields a
//! configuration that passes validation.
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use fragrancer::adapters::nvs::NvsAdapter;
use fragrancer::app::ports::{ConfigPort, StoragePort};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut nvs = NvsAdapter::new();
    if nvs.write("fragrancer", "devcfg", data).is_err() {
        return;
    }
    if let Ok(config) = nvs.load() {
        assert!(config.validate().is_ok());
    }
});
