//! Fuzz target: `CounterStore::load`
//!
//! Splits the input into two raw slot images, boots a store over them and
//! checks that loading never panics and that the next activation is
//! persisted and readable after a reboot.
//!
//! cargo fuzz run fuzz_counter_slots

#![no_main]

use fragrancer::adapters::nvs::NvsAdapter;
use fragrancer::app::counter::CounterStore;
use fragrancer::app::ports::StoragePort;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let split = data.first().map_or(0, |b| *b as usize % (data.len().max(1)));
    let (a, b) = data.split_at(split);

    let mut nvs = NvsAdapter::new();
    let _ = nvs.write("counter", "ctr.a", a);
    let _ = nvs.write("counter", "ctr.b", b);

    let mut store = CounterStore::new(nvs.clone());
    store.load();
    if store.record_activation().is_ok() {
        let expected = store.counters();
        let mut rebooted = CounterStore::new(nvs);
        assert_eq!(rebooted.load().counters, expected);
    }
});
