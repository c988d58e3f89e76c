//! Mock adapters for integration tests.
//!
//! Every mock records what the core asked of it so tests can assert on the
//! full history (GPIO writes, broker traffic, storage writes) without real
//! hardware.  Time is virtual: [`ManualClock::delay_ms`] advances it.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use fragrancer::app::connectivity::ConnectivityManager;
use fragrancer::app::counter::CounterStore;
use fragrancer::app::credentials::CredentialStore;
use fragrancer::app::dispatcher::Dispatcher;
use fragrancer::app::events::AppEvent;
use fragrancer::app::ports::{
    ActuatorPort, ClockPort, EventSink, InboundMessage, InputPort, LinkError, LinkInfo,
    MessagingError, MessagingPort, NetworkPort, SessionOptions, StorageError, StoragePort,
};
use fragrancer::app::runtime::Device;
use fragrancer::app::topics::DeviceTopics;
use fragrancer::config::{BrokerCredentials, DeviceConfig};
use fragrancer::telemetry::TelemetryScheduler;

pub const PREFIX: &str = "hab/devices/luxuries/automatic-air-fragrancer";
pub const TOPIC_ID: &str = "EFCAFE";
pub const CLIENT_ID: &str = "esp32-air-fragrancer-EFCAFE";

pub fn topic(channel: &str) -> String {
    format!("{}/{}/{}", PREFIX, TOPIC_ID, channel)
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Default)]
struct KvState {
    map: HashMap<(String, String), Vec<u8>>,
    fail_writes: Option<StorageError>,
    fail_all: Option<StorageError>,
    writes: usize,
}

/// Shared in-memory key-value store with fault injection.  Clones see the
/// same data, like two handles on one flash partition.
#[derive(Clone, Default)]
pub struct MockKv {
    inner: Rc<RefCell<KvState>>,
}

impl MockKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write (and delete) with `err` until cleared.
    pub fn fail_writes(&self, err: Option<StorageError>) {
        self.inner.borrow_mut().fail_writes = err;
    }

    /// Fail every operation with `err` until cleared.
    pub fn fail_all(&self, err: Option<StorageError>) {
        self.inner.borrow_mut().fail_all = err;
    }

    pub fn get(&self, ns: &str, key: &str) -> Option<Vec<u8>> {
        self.inner.borrow().map.get(&(ns.into(), key.into())).cloned()
    }

    pub fn put(&self, ns: &str, key: &str, data: &[u8]) {
        self.inner.borrow_mut().map.insert((ns.into(), key.into()), data.to_vec());
    }

    pub fn writes(&self) -> usize {
        self.inner.borrow().writes
    }
}

impl StoragePort for MockKv {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let s = self.inner.borrow();
        if let Some(e) = s.fail_all {
            return Err(e);
        }
        let v = s.map.get(&(ns.into(), key.into())).ok_or(StorageError::NotFound)?;
        if v.len() > buf.len() {
            return Err(StorageError::Corrupted);
        }
        buf[..v.len()].copy_from_slice(v);
        Ok(v.len())
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut s = self.inner.borrow_mut();
        if let Some(e) = s.fail_all.or(s.fail_writes) {
            return Err(e);
        }
        s.writes += 1;
        s.map.insert((ns.into(), key.into()), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        let mut s = self.inner.borrow_mut();
        if let Some(e) = s.fail_all.or(s.fail_writes) {
            return Err(e);
        }
        s.map.remove(&(ns.into(), key.into()));
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        let s = self.inner.borrow();
        s.fail_all.is_none() && s.map.contains_key(&(ns.into(), key.into()))
    }
}

// ── Network link ──────────────────────────────────────────────

pub struct MockNetwork {
    pub connected: bool,
    pub fail_connects: u32,
    pub connects: u32,
    pub forgotten: bool,
    pub info: LinkInfo,
}

impl MockNetwork {
    pub fn new() -> Self {
        let mut info = LinkInfo::default();
        info.ssid.push_str("HomeNet").unwrap();
        info.ip.push_str("192.168.1.42").unwrap();
        info.rssi = -61;
        Self { connected: false, fail_connects: 0, connects: 0, forgotten: false, info }
    }
}

impl NetworkPort for MockNetwork {
    fn connect(&mut self) -> Result<(), LinkError> {
        self.connects += 1;
        if self.fail_connects > 0 {
            self.fail_connects -= 1;
            return Err(LinkError::ConnectionFailed);
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn link_info(&self) -> Option<LinkInfo> {
        self.connected.then(|| self.info.clone())
    }

    fn forget_credentials(&mut self) -> Result<(), LinkError> {
        self.forgotten = true;
        Ok(())
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retained: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub client_id: String,
    pub username: Option<String>,
    pub will: Publication,
}

/// Records sessions and publishes; inbound traffic is queued by tests.
#[derive(Default)]
pub struct MockBroker {
    pub connected: bool,
    pub fail_opens: u32,
    pub fail_publishes: bool,
    pub sessions: Vec<SessionRecord>,
    pub published: Vec<Publication>,
    pub subscriptions: Vec<String>,
    pub inbox: VecDeque<InboundMessage>,
    pub closes: usize,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message as if the broker had routed it to us.
    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        let mut msg = InboundMessage { topic: heapless::String::new(), payload: heapless::Vec::new() };
        msg.topic.push_str(topic).unwrap();
        msg.payload.extend_from_slice(payload).unwrap();
        self.inbox.push_back(msg);
    }

    /// The broker drops the client; it publishes the registered will.
    pub fn lose_session(&mut self) {
        self.connected = false;
        if let Some(s) = self.sessions.last() {
            self.published.push(s.will.clone());
        }
    }

    pub fn on_topic(&self, topic: &str) -> Vec<&Publication> {
        self.published.iter().filter(|p| p.topic == topic).collect()
    }

    /// Payloads on `topic` as strings, in order.
    pub fn texts(&self, topic: &str) -> Vec<String> {
        self.on_topic(topic)
            .into_iter()
            .map(|p| String::from_utf8_lossy(&p.payload).into_owned())
            .collect()
    }

    pub fn clear(&mut self) {
        self.published.clear();
    }
}

impl MessagingPort for MockBroker {
    fn open_session(&mut self, opts: &SessionOptions<'_>) -> Result<(), MessagingError> {
        if self.fail_opens > 0 {
            self.fail_opens -= 1;
            return Err(MessagingError::ConnectFailed);
        }
        self.connected = true;
        self.sessions.push(SessionRecord {
            client_id: opts.client_id.into(),
            username: opts.username.map(Into::into),
            will: Publication {
                topic: opts.will.topic.into(),
                payload: opts.will.payload.to_vec(),
                retained: opts.will.retained,
            },
        });
        Ok(())
    }

    fn close_session(&mut self) {
        self.connected = false;
        self.closes += 1;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> Result<(), MessagingError> {
        if !self.connected {
            return Err(MessagingError::NotConnected);
        }
        if self.fail_publishes {
            return Err(MessagingError::PublishFailed);
        }
        self.published.push(Publication { topic: topic.into(), payload: payload.to_vec(), retained });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), MessagingError> {
        if !self.connected {
            return Err(MessagingError::NotConnected);
        }
        self.subscriptions.push(topic.into());
        Ok(())
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        if !self.connected {
            return None;
        }
        self.inbox.pop_front()
    }
}

// ── Actuator ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Output(bool),
    Indicator(bool),
}

#[derive(Default)]
pub struct RecordingActuator {
    pub calls: Vec<ActuatorCall>,
}

impl RecordingActuator {
    pub fn output_on(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::Output(on) => Some(*on),
                ActuatorCall::Indicator(_) => None,
            })
            .unwrap_or(false)
    }

    /// Number of off→on edges on the output line.
    pub fn pulses(&self) -> usize {
        let mut on = false;
        let mut n = 0;
        for c in &self.calls {
            if let ActuatorCall::Output(next) = *c {
                if next && !on {
                    n += 1;
                }
                on = next;
            }
        }
        n
    }
}

impl ActuatorPort for RecordingActuator {
    fn set_output(&mut self, active: bool) {
        self.calls.push(ActuatorCall::Output(active));
    }

    fn set_indicator(&mut self, on: bool) {
        self.calls.push(ActuatorCall::Indicator(on));
    }
}

// ── Clock ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct ManualClock {
    pub now: u64,
    pub delays: Vec<u32>,
}

impl ManualClock {
    pub fn advance(&mut self, ms: u64) {
        self.now += ms;
    }
}

impl ClockPort for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
        self.now += u64::from(ms);
    }
}

// ── Button ────────────────────────────────────────────────────

/// Reports one press per queued entry, one per `update`.
#[derive(Default)]
pub struct ScriptedButton {
    pub queued: u32,
    pressed: bool,
}

impl ScriptedButton {
    pub fn press(&mut self) {
        self.queued += 1;
    }
}

impl InputPort for ScriptedButton {
    fn update(&mut self, _now_ms: u64) {
        self.pressed = self.queued > 0;
        if self.pressed {
            self.queued -= 1;
        }
    }

    fn pressed(&self) -> bool {
        self.pressed
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn faults(&self) -> Vec<fragrancer::error::Fault> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Fault(f) => Some(*f),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Assembly ──────────────────────────────────────────────────

pub type TestDispatcher = Dispatcher<MockKv, MockNetwork, MockBroker, MockKv>;
pub type TestDevice =
    Device<MockKv, MockNetwork, MockBroker, MockKv, ScriptedButton, RecordingActuator, ManualClock, RecordingSink>;

pub fn credentials() -> BrokerCredentials {
    let mut c = BrokerCredentials { broker_port: 1883, ..Default::default() };
    c.wifi_ssid.push_str("HomeNet").unwrap();
    c.wifi_password.push_str("password1").unwrap();
    c.broker_host.push_str("192.168.1.10").unwrap();
    c.username.push_str("fragrancer").unwrap();
    c.password.push_str("s3cret").unwrap();
    c
}

/// Short sequence timings so tests read clearly.
pub fn test_config() -> DeviceConfig {
    DeviceConfig {
        pulse_duration_ms: 7_000,
        settle_delay_ms: 1_000,
        farewell_step_ms: 1_000,
        restart_delay_ms: 3_000,
        connect_retry_delay_ms: 5_000,
        ..Default::default()
    }
}

pub fn make_link(kv: &MockKv, config: &DeviceConfig) -> ConnectivityManager<MockNetwork, MockBroker, MockKv> {
    let mut creds = CredentialStore::new(kv.clone());
    creds.commit(&credentials()).unwrap();
    let topics = DeviceTopics::new(PREFIX, TOPIC_ID).unwrap();
    ConnectivityManager::new(MockNetwork::new(), MockBroker::new(), creds, topics, CLIENT_ID, config)
}

pub fn make_dispatcher(kv: &MockKv, config: &DeviceConfig) -> TestDispatcher {
    Dispatcher::new(
        CounterStore::new(kv.clone()),
        make_link(kv, config),
        TelemetryScheduler::new(config),
        config,
    )
}

/// A device that has not booted yet, so tests can script faults first.
pub fn build_device(kv: &MockKv) -> TestDevice {
    let config = test_config();
    Device::new(
        make_dispatcher(kv, &config),
        ScriptedButton::default(),
        RecordingActuator::default(),
        ManualClock::default(),
        RecordingSink::default(),
        &config,
    )
}

/// A booted device: counters loaded, boot connect done.
pub fn make_device(kv: &MockKv) -> TestDevice {
    let mut dev = build_device(kv);
    dev.start();
    dev
}

pub fn network_mut(dev: &mut TestDevice) -> &mut MockNetwork {
    dev.dispatcher.link_mut().network_mut()
}

/// Seed a counter record in slot A.
pub fn seed_counters(kv: &MockKv, instance: u64, overall: u64) {
    let mut blob = 1u32.to_le_bytes().to_vec();
    blob.extend_from_slice(format!("{{\"instance\":{},\"overall\":{}}}", instance, overall).as_bytes());
    kv.put("counter", "ctr.a", &blob);
}

pub fn broker(dev: &TestDevice) -> &MockBroker {
    dev.dispatcher.link().messaging()
}

pub fn broker_mut(dev: &mut TestDevice) -> &mut MockBroker {
    dev.dispatcher.link_mut().messaging_mut()
}
