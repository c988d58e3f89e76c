//! MQTT client adapter.
//!
//! Implements [`MessagingPort`].  Inbound messages are queued on a bounded
//! [`embassy_sync`] channel and drained one per cycle by the core; when the
//! queue is full new messages are dropped and logged.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` with a dedicated event
//!   thread (`mqtt-poll`) that tracks the session and fills the inbox.
//! - **all other targets**: in-process broker simulation.  Publishes are
//!   recorded, the last-will is "published" when the session is dropped,
//!   and tests push inbound messages with [`MqttAdapter::inject`].

#[cfg(target_os = "espidf")]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex as InboxMutex;
#[cfg(not(target_os = "espidf"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex as InboxMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use crate::app::ports::{InboundMessage, MessagingError, MessagingPort, SessionOptions};

/// Inbound queue depth.
pub const INBOX_DEPTH: usize = 8;

// The event thread fills the inbox on target; the simulation is single-threaded.
type Inbox = Channel<InboxMutex, InboundMessage, INBOX_DEPTH>;

/// Convert a raw (topic, payload) pair; oversized messages are rejected.
fn inbound(topic: &str, payload: &[u8]) -> Option<InboundMessage> {
    let mut msg = InboundMessage {
        topic: heapless::String::new(),
        payload: heapless::Vec::new(),
    };
    msg.topic.push_str(topic).ok()?;
    msg.payload.extend_from_slice(payload).ok()?;
    Some(msg)
}

fn enqueue(inbox: &Inbox, topic: &str, payload: &[u8]) {
    match inbound(topic, payload) {
        Some(msg) => {
            if inbox.try_send(msg).is_err() {
                warn!("MQTT: inbox full, dropping message on '{}'", topic);
            }
        }
        None => warn!("MQTT: oversized message on '{}' dropped", topic),
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF client
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod platform {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use esp_idf_svc::mqtt::client::{
        EspMqttClient, EventPayload, LwtConfiguration, MqttClientConfiguration, QoS,
    };
    use log::{info, warn};

    use super::{Inbox, enqueue};
    use crate::app::ports::{MessagingError, SessionOptions};

    /// Filled by the event thread, drained by the main loop.
    pub(super) static INBOX: Inbox = Inbox::new();

    const SESSION_WAIT_MS: u64 = 10_000;
    const SESSION_POLL_MS: u64 = 50;

    pub(super) struct Client {
        client: Option<EspMqttClient<'static>>,
        connected: Arc<AtomicBool>,
    }

    impl Client {
        pub(super) fn new() -> Self {
            Self {
                client: None,
                connected: Arc::new(AtomicBool::new(false)),
            }
        }

        pub(super) fn open(&mut self, url: &str, opts: &SessionOptions<'_>) -> Result<(), MessagingError> {
            self.close();

            let conf = MqttClientConfiguration {
                client_id: Some(opts.client_id),
                username: opts.username,
                password: opts.password,
                keep_alive_interval: Some(Duration::from_secs(u64::from(opts.keep_alive_secs))),
                lwt: Some(LwtConfiguration {
                    topic: opts.will.topic,
                    payload: opts.will.payload,
                    qos: QoS::AtLeastOnce,
                    retain: opts.will.retained,
                }),
                ..Default::default()
            };
            let (client, mut conn) = EspMqttClient::new(url, &conf).map_err(|e| {
                warn!("MQTT: client init failed: {}", e);
                MessagingError::ConnectFailed
            })?;

            let connected = Arc::new(AtomicBool::new(false));
            let flag = connected.clone();
            std::thread::Builder::new()
                .name("mqtt-poll".into())
                .stack_size(6144)
                .spawn(move || {
                    while let Ok(event) = conn.next() {
                        match event.payload() {
                            EventPayload::Connected(_) => flag.store(true, Ordering::SeqCst),
                            EventPayload::Disconnected => flag.store(false, Ordering::SeqCst),
                            EventPayload::Received { topic: Some(topic), data, .. } => {
                                enqueue(&INBOX, topic, data);
                            }
                            EventPayload::Error(e) => warn!("MQTT: {:?}", e),
                            _ => {}
                        }
                    }
                    flag.store(false, Ordering::SeqCst);
                    info!("MQTT: event loop ended");
                })
                .map_err(|_| MessagingError::ConnectFailed)?;

            self.client = Some(client);
            self.connected = connected;

            let mut waited = 0;
            while !self.connected.load(Ordering::SeqCst) {
                if waited >= SESSION_WAIT_MS {
                    warn!("MQTT: broker did not acknowledge within {} ms", SESSION_WAIT_MS);
                    self.close();
                    return Err(MessagingError::ConnectFailed);
                }
                std::thread::sleep(Duration::from_millis(SESSION_POLL_MS));
                waited += SESSION_POLL_MS;
            }
            Ok(())
        }

        pub(super) fn close(&mut self) {
            // Dropping the client ends the event thread.
            self.client = None;
            self.connected.store(false, Ordering::SeqCst);
        }

        pub(super) fn is_connected(&self) -> bool {
            self.client.is_some() && self.connected.load(Ordering::SeqCst)
        }

        pub(super) fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> Result<(), MessagingError> {
            let client = self.client.as_mut().ok_or(MessagingError::NotConnected)?;
            client
                .publish(topic, QoS::AtLeastOnce, retained, payload)
                .map(|_| ())
                .map_err(|e| {
                    warn!("MQTT: publish to '{}' failed: {}", topic, e);
                    MessagingError::PublishFailed
                })
        }

        pub(super) fn subscribe(&mut self, topic: &str) -> Result<(), MessagingError> {
            let client = self.client.as_mut().ok_or(MessagingError::NotConnected)?;
            client.subscribe(topic, QoS::AtLeastOnce).map(|_| ()).map_err(|e| {
                warn!("MQTT: subscribe to '{}' failed: {}", topic, e);
                MessagingError::SubscribeFailed
            })
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

/// A message the simulated broker has seen.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retained: bool,
}

pub struct MqttAdapter {
    url: heapless::String<96>,
    #[cfg(target_os = "espidf")]
    client: platform::Client,
    #[cfg(not(target_os = "espidf"))]
    inbox: Inbox,
    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
struct SimBroker {
    connected: bool,
    fail_opens: u32,
    will: Option<Published>,
    subscriptions: Vec<String>,
    published: Vec<Published>,
}

impl MqttAdapter {
    /// `url` is `mqtt://host:port`.
    pub fn new(url: &str) -> Self {
        let mut u = heapless::String::new();
        if u.push_str(url).is_err() {
            warn!("MQTT: broker URL too long, ignoring");
        }
        Self {
            url: u,
            #[cfg(target_os = "espidf")]
            client: platform::Client::new(),
            #[cfg(not(target_os = "espidf"))]
            inbox: Inbox::new(),
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn inbox(&self) -> &Inbox {
        #[cfg(target_os = "espidf")]
        {
            &platform::INBOX
        }
        #[cfg(not(target_os = "espidf"))]
        {
            &self.inbox
        }
    }

    /// Simulation: deliver a message as if the broker had routed it here.
    /// Dropped unless a matching subscription exists.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject(&mut self, topic: &str, payload: &[u8]) {
        if self.sim.connected && self.sim.subscriptions.iter().any(|s| s == topic) {
            enqueue(&self.inbox, topic, payload);
        }
    }

    /// Simulation: make the next `n` session opens fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn fail_next_opens(&mut self, n: u32) {
        self.sim.fail_opens = n;
    }

    /// Simulation: the broker loses the client; the last-will is published.
    #[cfg(not(target_os = "espidf"))]
    pub fn drop_session(&mut self) {
        if self.sim.connected {
            self.sim.connected = false;
            if let Some(will) = self.sim.will.take() {
                self.sim.published.push(will);
            }
        }
    }

    /// Simulation: everything published so far, in order.
    #[cfg(not(target_os = "espidf"))]
    pub fn published(&self) -> &[Published] {
        &self.sim.published
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn subscriptions(&self) -> &[String] {
        &self.sim.subscriptions
    }
}

impl MessagingPort for MqttAdapter {
    #[cfg(target_os = "espidf")]
    fn open_session(&mut self, opts: &SessionOptions<'_>) -> Result<(), MessagingError> {
        if self.url.is_empty() {
            return Err(MessagingError::ConnectFailed);
        }
        info!("MQTT: connecting to {} as '{}'", self.url, opts.client_id);
        self.client.open(&self.url, opts)
    }

    #[cfg(not(target_os = "espidf"))]
    fn open_session(&mut self, opts: &SessionOptions<'_>) -> Result<(), MessagingError> {
        if self.url.is_empty() {
            return Err(MessagingError::ConnectFailed);
        }
        if self.sim.fail_opens > 0 {
            self.sim.fail_opens -= 1;
            return Err(MessagingError::ConnectFailed);
        }
        info!("MQTT(sim): session open as '{}'", opts.client_id);
        self.sim.connected = true;
        self.sim.subscriptions.clear();
        self.sim.will = Some(Published {
            topic: opts.will.topic.into(),
            payload: opts.will.payload.to_vec(),
            retained: opts.will.retained,
        });
        Ok(())
    }

    fn close_session(&mut self) {
        #[cfg(target_os = "espidf")]
        self.client.close();
        #[cfg(not(target_os = "espidf"))]
        {
            self.sim.connected = false;
            self.sim.will = None;
            self.sim.subscriptions.clear();
        }
        self.inbox().clear();
        info!("MQTT: session closed");
    }

    fn is_connected(&self) -> bool {
        #[cfg(target_os = "espidf")]
        {
            self.client.is_connected()
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.sim.connected
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> Result<(), MessagingError> {
        #[cfg(target_os = "espidf")]
        {
            self.client.publish(topic, payload, retained)
        }
        #[cfg(not(target_os = "espidf"))]
        {
            if !self.sim.connected {
                return Err(MessagingError::NotConnected);
            }
            self.sim.published.push(Published {
                topic: topic.into(),
                payload: payload.to_vec(),
                retained,
            });
            Ok(())
        }
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), MessagingError> {
        #[cfg(target_os = "espidf")]
        {
            self.client.subscribe(topic)
        }
        #[cfg(not(target_os = "espidf"))]
        {
            if !self.sim.connected {
                return Err(MessagingError::NotConnected);
            }
            self.sim.subscriptions.push(topic.into());
            Ok(())
        }
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        self.inbox().try_receive().ok()
    }
}
