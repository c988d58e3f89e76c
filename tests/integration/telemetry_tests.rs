//! Integration tests for the keep-alive and network snapshot cadences.

use crate::mock_hw::{broker, broker_mut, build_device, make_device, network_mut, topic, MockKv};

const NETWORK_JSON: &str = r#"{"wifi":{"ssid":"HomeNet","ip":"192.168.1.42","rssi":-61}}"#;

#[test]
fn first_connected_cycle_publishes_network_then_keep_alive() {
    let kv = MockKv::new();
    let mut dev = make_device(&kv);
    broker_mut(&mut dev).clear();

    dev.cycle();

    let b = broker(&dev);
    let topics: Vec<&str> = b.published.iter().map(|p| p.topic.as_str()).collect();
    assert_eq!(topics, [topic("network"), topic("keep-alive")]);
    assert_eq!(b.texts(&topic("network")), [NETWORK_JSON]);
    assert_eq!(b.texts(&topic("keep-alive")), ["ping"]);
    assert!(b.published.iter().all(|p| p.retained));
}

#[test]
fn keep_alive_fires_once_per_interval() {
    let kv = MockKv::new();
    let mut dev = make_device(&kv);
    dev.cycle();
    broker_mut(&mut dev).clear();

    dev.clock.advance(59_999);
    dev.cycle();
    assert!(broker(&dev).on_topic(&topic("keep-alive")).is_empty());

    dev.clock.advance(1);
    dev.cycle();
    dev.cycle();
    assert_eq!(broker(&dev).on_topic(&topic("keep-alive")).len(), 1);
}

#[test]
fn network_snapshot_follows_its_own_cadence() {
    let kv = MockKv::new();
    let mut dev = make_device(&kv);
    dev.cycle();
    broker_mut(&mut dev).clear();

    for _ in 0..29 {
        dev.clock.advance(60_000);
        dev.cycle();
    }
    assert!(broker(&dev).on_topic(&topic("network")).is_empty());
    assert_eq!(broker(&dev).on_topic(&topic("keep-alive")).len(), 29);

    dev.clock.advance(60_000);
    dev.cycle();
    assert_eq!(broker(&dev).texts(&topic("network")), [NETWORK_JSON]);
}

#[test]
fn nothing_fires_before_the_first_connection() {
    let kv = MockKv::new();
    let mut dev = build_device(&kv);
    network_mut(&mut dev).fail_connects = 3;
    dev.start();

    dev.cycle();
    assert!(broker(&dev).published.is_empty());

    // The reconnect lands after telemetry in the cycle; priming happens on
    // the next one.
    dev.clock.advance(60_000);
    dev.cycle();
    assert!(broker(&dev).on_topic(&topic("keep-alive")).is_empty());
    dev.cycle();
    assert_eq!(broker(&dev).texts(&topic("keep-alive")), ["ping"]);
    assert_eq!(broker(&dev).texts(&topic("network")), [NETWORK_JSON]);
}

#[test]
fn cadence_due_during_an_outage_fires_after_reconnect() {
    let kv = MockKv::new();
    let mut dev = make_device(&kv);
    dev.cycle();
    broker_mut(&mut dev).lose_session();
    broker_mut(&mut dev).clear();

    dev.clock.advance(90_000);
    dev.cycle(); // detects loss, reconnects
    dev.cycle();
    assert_eq!(broker(&dev).texts(&topic("keep-alive")), ["ping"]);
    // Priming only happens once per boot.
    assert!(broker(&dev).on_topic(&topic("network")).is_empty());
}

#[test]
fn update_publishes_snapshot_and_counter_immediately() {
    let kv = MockKv::new();
    let mut dev = make_device(&kv);
    dev.cycle();
    broker_mut(&mut dev).clear();

    broker_mut(&mut dev).deliver(&topic("command"), b"update");
    dev.cycle();

    let b = broker(&dev);
    let topics: Vec<&str> = b.published.iter().map(|p| p.topic.as_str()).collect();
    assert_eq!(topics, [topic("network"), topic("burst-counter")]);
    assert_eq!(b.texts(&topic("burst-counter")), [r#"{"instance":0,"overall":0}"#]);
}

#[test]
fn staleness_threshold_is_twice_the_keep_alive() {
    let kv = MockKv::new();
    let dev = make_device(&kv);
    assert_eq!(dev.dispatcher.telemetry().staleness_threshold_ms(), 120_000);
}
