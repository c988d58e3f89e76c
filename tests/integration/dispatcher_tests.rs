//! Integration tests for the command → dispatcher → actuator/broker chain.
//!
//! Each test boots a [`Device`](fragrancer::app::runtime::Device) against
//! the mocks, queues broker traffic, runs cycles and asserts on what reached
//! the output line, the broker and storage.

use fragrancer::app::commands::PulseSource;
use fragrancer::app::counter::{ActivationCounters, CounterStore};
use fragrancer::app::dispatcher::{DispatchState, FAREWELL_STEPS, Outcome};
use fragrancer::app::events::AppEvent;
use fragrancer::app::ports::StorageError;
use fragrancer::error::Fault;

use crate::mock_hw::{broker, broker_mut, make_device, network_mut, seed_counters, topic, MockKv};

fn reload(kv: &MockKv) -> ActivationCounters {
    let mut store = CounterStore::new(kv.clone());
    store.load().counters
}

/// Run the first cycle (telemetry priming) and forget what it published.
fn settle(dev: &mut crate::mock_hw::TestDevice) {
    assert_eq!(dev.cycle(), Outcome::Continue);
    broker_mut(dev).clear();
}

// ── Pulse ─────────────────────────────────────────────────────

#[test]
fn on_runs_one_pulse_and_counts_it() {
    let kv = MockKv::new();
    seed_counters(&kv, 4, 19);
    let mut dev = make_device(&kv);
    settle(&mut dev);

    broker_mut(&mut dev).deliver(&topic("command"), b"on");
    assert_eq!(dev.cycle(), Outcome::Continue);

    assert_eq!(dev.actuator.pulses(), 1);
    assert!(!dev.actuator.output_on(), "output must be released after the pulse");
    assert!(dev.clock.delays.contains(&7_000));

    let b = broker(&dev);
    assert_eq!(b.texts(&topic("device-state")), ["on", "off"]);
    let counter = b.on_topic(&topic("burst-counter"));
    assert_eq!(counter.len(), 1);
    assert_eq!(counter[0].payload, br#"{"instance":5,"overall":20}"#);
    assert!(counter[0].retained);
    assert!(b.on_topic(&topic("device-state")).iter().all(|p| !p.retained));

    assert_eq!(reload(&kv), ActivationCounters { instance: 5, overall: 20 });
    assert_eq!(dev.dispatcher.state(), DispatchState::Idle);
}

#[test]
fn pulse_refreshes_the_snapshot_before_off() {
    let kv = MockKv::new();
    let mut dev = make_device(&kv);
    settle(&mut dev);

    broker_mut(&mut dev).deliver(&topic("command"), b"on");
    dev.cycle();

    let topics: Vec<String> = broker(&dev).published.iter().map(|p| p.topic.clone()).collect();
    assert_eq!(
        topics,
        [topic("device-state"), topic("network"), topic("burst-counter"), topic("device-state")]
    );
}

#[test]
fn numeric_one_is_an_alias_for_on() {
    let kv = MockKv::new();
    let mut dev = make_device(&kv);
    settle(&mut dev);

    broker_mut(&mut dev).deliver(&topic("command"), b"1");
    dev.cycle();

    assert_eq!(dev.actuator.pulses(), 1);
    assert_eq!(dev.dispatcher.store().counters(), ActivationCounters { instance: 1, overall: 1 });
}

#[test]
fn button_press_runs_a_manual_pulse() {
    let kv = MockKv::new();
    let mut dev = make_device(&kv);
    settle(&mut dev);

    dev.button.press();
    dev.cycle();

    assert_eq!(dev.actuator.pulses(), 1);
    assert!(dev
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::PulseCompleted { source: PulseSource::Manual, duration_ms: 7_000 })));
    assert_eq!(broker(&dev).texts(&topic("device-state")), ["on", "off"]);
}

#[test]
fn button_pulse_works_offline() {
    let kv = MockKv::new();
    let mut dev = crate::mock_hw::build_device(&kv);
    network_mut(&mut dev).fail_connects = 10;
    dev.start();

    dev.button.press();
    dev.cycle();

    assert_eq!(dev.actuator.pulses(), 1);
    assert_eq!(dev.dispatcher.store().counters(), ActivationCounters { instance: 1, overall: 1 });
    assert_eq!(reload(&kv), ActivationCounters { instance: 1, overall: 1 });
    assert!(dev.sink.faults().contains(&Fault::PublishFailed));
}

#[test]
fn publish_failure_never_cuts_a_pulse_short() {
    let kv = MockKv::new();
    let mut dev = make_device(&kv);
    settle(&mut dev);

    broker_mut(&mut dev).deliver(&topic("command"), b"on");
    broker_mut(&mut dev).fail_publishes = true;
    dev.cycle();

    assert_eq!(dev.actuator.pulses(), 1);
    assert!(!dev.actuator.output_on());
    assert_eq!(dev.dispatcher.store().counters(), ActivationCounters { instance: 1, overall: 1 });
    assert!(dev.sink.faults().contains(&Fault::PublishFailed));
}

#[test]
fn storage_failure_keeps_counting_in_memory() {
    let kv = MockKv::new();
    seed_counters(&kv, 4, 19);
    let mut dev = make_device(&kv);
    settle(&mut dev);

    kv.fail_writes(Some(StorageError::IoError));
    broker_mut(&mut dev).deliver(&topic("command"), b"on");
    dev.cycle();

    assert_eq!(dev.dispatcher.store().counters(), ActivationCounters { instance: 5, overall: 20 });
    assert_eq!(broker(&dev).texts(&topic("burst-counter")), [r#"{"instance":5,"overall":20}"#]);
    assert!(dev.sink.faults().contains(&Fault::StorageWriteFailed));

    // Flash still holds the last committed record.
    kv.fail_writes(None);
    assert_eq!(reload(&kv), ActivationCounters { instance: 4, overall: 19 });
}

// ── Counter resets ────────────────────────────────────────────

#[test]
fn reset_instance_counter_keeps_overall() {
    let kv = MockKv::new();
    seed_counters(&kv, 4, 19);
    let mut dev = make_device(&kv);
    settle(&mut dev);

    broker_mut(&mut dev).deliver(&topic("command"), b"reset-instance-counter");
    assert_eq!(dev.cycle(), Outcome::Continue);

    let b = broker(&dev);
    assert_eq!(b.texts(&topic("device-state")), ["reset-instance-counter", "off"]);
    assert_eq!(b.texts(&topic("burst-counter")), [r#"{"instance":0,"overall":19}"#]);
    assert_eq!(reload(&kv), ActivationCounters { instance: 0, overall: 19 });
    assert_eq!(dev.actuator.pulses(), 0);
}

#[test]
fn reset_counter_cycles_the_broker_session() {
    let kv = MockKv::new();
    let mut dev = make_device(&kv);
    settle(&mut dev);

    broker_mut(&mut dev).deliver(&topic("command"), b"reset-all-counter");
    dev.cycle();

    let b = broker(&dev);
    assert_eq!(b.sessions.len(), 2);
    assert_eq!(b.closes, 1);
    assert!(b.connected);
    // Availability is re-announced by the new session.
    assert_eq!(b.texts(&topic("connection")), ["online"]);
    assert!(dev.dispatcher.link().is_connected());
    assert_eq!(dev.dispatcher.state(), DispatchState::Idle);
}

#[test]
fn reset_all_counter_zeroes_both() {
    let kv = MockKv::new();
    seed_counters(&kv, 4, 19);
    let mut dev = make_device(&kv);
    settle(&mut dev);

    broker_mut(&mut dev).deliver(&topic("command"), b"reset-all-counter");
    dev.cycle();

    assert_eq!(broker(&dev).texts(&topic("device-state")), ["reset-all-counter", "off"]);
    assert_eq!(reload(&kv), ActivationCounters::ZERO);
}

// ── Config resets ─────────────────────────────────────────────

#[test]
fn reset_config_erases_credentials_and_restarts() {
    let kv = MockKv::new();
    seed_counters(&kv, 4, 19);
    let mut dev = make_device(&kv);
    settle(&mut dev);
    assert!(kv.get("auth", "broker").is_some());

    broker_mut(&mut dev).deliver(&topic("command"), b"reset-config");
    assert_eq!(dev.cycle(), Outcome::Restart);

    assert_eq!(broker(&dev).texts(&topic("device-state")), ["reset-config", "gone"]);
    assert!(kv.get("auth", "broker").is_none());
    assert!(dev.dispatcher.link().network().forgotten);
    // Counters survive a config reset.
    assert_eq!(reload(&kv), ActivationCounters { instance: 4, overall: 19 });
    assert!(dev.clock.delays.ends_with(&[1_000, 3_000]));
    assert!(matches!(dev.sink.events.last(), Some(AppEvent::Restarting)));
}

#[test]
fn reset_all_says_farewell_and_wipes_everything() {
    let kv = MockKv::new();
    seed_counters(&kv, 4, 19);
    let mut dev = make_device(&kv);
    settle(&mut dev);

    broker_mut(&mut dev).deliver(&topic("command"), b"reset-all");
    assert_eq!(dev.cycle(), Outcome::Restart);

    assert_eq!(broker(&dev).texts(&topic("device-state")), FAREWELL_STEPS);
    assert_eq!(reload(&kv), ActivationCounters::ZERO);
    assert!(kv.get("auth", "broker").is_none());
    assert!(dev.clock.delays.ends_with(&[1_000, 1_000, 1_000, 1_000, 3_000]));
}

// ── Commands that do nothing ──────────────────────────────────

#[test]
fn unrecognized_command_has_no_effect() {
    let kv = MockKv::new();
    seed_counters(&kv, 4, 19);
    let mut dev = make_device(&kv);
    settle(&mut dev);
    let writes = kv.writes();
    let events = dev.sink.events.len();

    broker_mut(&mut dev).deliver(&topic("command"), b"dance");
    assert_eq!(dev.cycle(), Outcome::Continue);

    assert!(broker(&dev).published.is_empty());
    assert_eq!(dev.actuator.pulses(), 0);
    assert_eq!(kv.writes(), writes);
    let new_events = &dev.sink.events[events..];
    assert!(!new_events.iter().any(|e| matches!(e, AppEvent::StateChanged { .. })));
    assert!(new_events.iter().any(|e| matches!(e, AppEvent::CommandIgnored(_))));
}

#[test]
fn undecodable_payload_is_reported_and_dropped() {
    let kv = MockKv::new();
    let mut dev = make_device(&kv);
    settle(&mut dev);

    broker_mut(&mut dev).deliver(&topic("command"), &[0x6F, 0xFF, 0x6E]);
    assert_eq!(dev.cycle(), Outcome::Continue);

    assert_eq!(dev.actuator.pulses(), 0);
    assert!(broker(&dev).published.is_empty());
    assert!(dev.sink.faults().contains(&Fault::MalformedCommand));
}

#[test]
fn commands_are_case_sensitive() {
    let kv = MockKv::new();
    let mut dev = make_device(&kv);
    settle(&mut dev);

    broker_mut(&mut dev).deliver(&topic("command"), b"ON");
    dev.cycle();

    assert_eq!(dev.actuator.pulses(), 0);
    assert!(broker(&dev).published.is_empty());
}

#[test]
fn one_command_per_cycle() {
    let kv = MockKv::new();
    let mut dev = make_device(&kv);
    settle(&mut dev);

    broker_mut(&mut dev).deliver(&topic("command"), b"on");
    broker_mut(&mut dev).deliver(&topic("command"), b"on");
    dev.cycle();
    assert_eq!(dev.actuator.pulses(), 1);
    dev.cycle();
    assert_eq!(dev.actuator.pulses(), 2);
    assert_eq!(dev.dispatcher.store().counters(), ActivationCounters { instance: 2, overall: 2 });
}

// ── Update ────────────────────────────────────────────────────

#[test]
fn update_queued_during_a_pulse_reports_the_new_count() {
    let kv = MockKv::new();
    seed_counters(&kv, 4, 19);
    let mut dev = make_device(&kv);
    settle(&mut dev);

    broker_mut(&mut dev).deliver(&topic("command"), b"on");
    broker_mut(&mut dev).deliver(&topic("command"), b"update");
    dev.cycle();
    dev.cycle();

    let b = broker(&dev);
    // Pulse counter first, then the update's republish.
    assert_eq!(
        b.texts(&topic("burst-counter")),
        [r#"{"instance":5,"overall":20}"#, r#"{"instance":5,"overall":20}"#]
    );
    // Pulse and update each refresh the snapshot.
    assert_eq!(b.on_topic(&topic("network")).len(), 2);
    // Update does not touch the output or the state topic.
    assert_eq!(dev.actuator.pulses(), 1);
    assert_eq!(b.texts(&topic("device-state")), ["on", "off"]);
}
