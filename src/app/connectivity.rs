//! Connectivity lifecycle: network link + broker session.
//!
//! ```text
//!            connect()                    session lost (poll)
//!  Disconnected ──▶ Connecting ──▶ Connected ──────────────▶ Disconnected
//!                      │                                          ▲
//!                      └──── all attempts failed ─────────────────┘
//! ```
//!
//! A session is only reported `Connected` once the retained `online` has
//! been handed to the client *and* the command subscription is in place,
//! so no command is ever executed before availability is announced.

use log::{debug, info, warn};

use super::commands::Command;
use super::credentials::CredentialStore;
use super::events::AppEvent;
use super::ports::{
    ClockPort, EventSink, LastWill, LinkInfo, MessagingPort, NetworkPort, SessionOptions,
    StoragePort,
};
use super::topics::{AVAILABILITY_OFFLINE, AVAILABILITY_ONLINE, DeviceTopics};
use crate::config::DeviceConfig;
use crate::error::Fault;

/// Broker session state as seen by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

pub struct ConnectivityManager<N: NetworkPort, M: MessagingPort, K: StoragePort> {
    net: N,
    mqtt: M,
    credentials: CredentialStore<K>,
    topics: DeviceTopics,
    client_id: heapless::String<64>,
    attempts: u8,
    retry_delay_ms: u32,
    keep_alive_secs: u16,
    state: ConnectionState,
}

impl<N: NetworkPort, M: MessagingPort, K: StoragePort> ConnectivityManager<N, M, K> {
    pub fn new(
        net: N,
        mqtt: M,
        credentials: CredentialStore<K>,
        topics: DeviceTopics,
        client_id: &str,
        config: &DeviceConfig,
    ) -> Self {
        let mut id = heapless::String::new();
        for ch in client_id.chars() {
            if id.push(ch).is_err() {
                warn!("Connectivity: client id '{}' truncated to {} bytes", client_id, id.len());
                break;
            }
        }
        Self {
            net,
            mqtt,
            credentials,
            topics,
            client_id: id,
            attempts: config.connect_attempts.max(1),
            retry_delay_ms: config.connect_retry_delay_ms,
            keep_alive_secs: config.broker_keep_alive_secs,
            state: ConnectionState::Disconnected,
        }
    }

    /// Bring up link and session, with a bounded number of attempts.
    pub fn connect(
        &mut self,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) -> ConnectionState {
        self.set_state(ConnectionState::Connecting, sink);

        for attempt in 1..=self.attempts {
            match self.try_connect() {
                Ok(()) => {
                    info!("Connectivity: session up as '{}' (attempt {})", self.client_id, attempt);
                    self.set_state(ConnectionState::Connected, sink);
                    return self.state;
                }
                Err(fault) => {
                    warn!("Connectivity: attempt {}/{} failed: {}", attempt, self.attempts, fault);
                    sink.emit(&AppEvent::Fault(fault));
                    if attempt < self.attempts {
                        clock.delay_ms(self.retry_delay_ms);
                    }
                }
            }
        }

        warn!("Connectivity: giving up until the next scheduled attempt");
        self.set_state(ConnectionState::Disconnected, sink);
        self.state
    }

    fn try_connect(&mut self) -> Result<(), Fault> {
        if !self.net.is_connected() {
            self.net.connect()?;
        }

        let creds = self.credentials.get();
        let opts = SessionOptions {
            client_id: &self.client_id,
            username: creds.map(|c| c.username.as_str()).filter(|s| !s.is_empty()),
            password: creds.map(|c| c.password.as_str()).filter(|s| !s.is_empty()),
            keep_alive_secs: self.keep_alive_secs,
            will: LastWill {
                topic: &self.topics.availability,
                payload: AVAILABILITY_OFFLINE.as_bytes(),
                retained: true,
            },
        };
        self.mqtt.open_session(&opts).map_err(|_| Fault::ConnectFailed)?;

        // Announce first, subscribe second.
        let announced = self
            .mqtt
            .publish(&self.topics.availability, AVAILABILITY_ONLINE.as_bytes(), true)
            .and_then(|()| self.mqtt.subscribe(&self.topics.command));
        if announced.is_err() {
            self.mqtt.close_session();
            return Err(Fault::ConnectFailed);
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.mqtt.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Messaging housekeeping for one cycle.
    ///
    /// Detects session loss and takes at most one inbound message.  Only
    /// messages on the command topic yield a [`Command`].
    pub fn poll(&mut self, sink: &mut impl EventSink) -> Option<Command> {
        if self.state == ConnectionState::Connected && !self.mqtt.is_connected() {
            warn!("Connectivity: broker session lost");
            self.set_state(ConnectionState::Disconnected, sink);
        }

        let msg = self.mqtt.poll()?;
        if msg.topic.as_str() != self.topics.command.as_str() {
            debug!("Connectivity: dropping message on '{}'", msg.topic);
            return None;
        }
        if core::str::from_utf8(&msg.payload).is_err() {
            warn!("Connectivity: undecodable command payload ({} bytes)", msg.payload.len());
            sink.emit(&AppEvent::Fault(Fault::MalformedCommand));
            return None;
        }
        Some(Command::parse(&msg.payload))
    }

    /// Close the broker session.  The link stays up.
    pub fn disconnect(&mut self, sink: &mut impl EventSink) {
        self.mqtt.close_session();
        self.set_state(ConnectionState::Disconnected, sink);
    }

    /// Best-effort publish.  Never retried.
    pub fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> Result<(), Fault> {
        Self::send(&mut self.mqtt, self.state, topic, payload, retained)
    }

    /// Transition label on the `device-state` topic (not retained).
    pub fn publish_state(&mut self, label: &str) -> Result<(), Fault> {
        Self::send(&mut self.mqtt, self.state, &self.topics.command_state, label.as_bytes(), false)
    }

    /// Raw counter record on the `burst-counter` topic (retained).
    pub fn publish_counter(&mut self, raw: &[u8]) -> Result<(), Fault> {
        Self::send(&mut self.mqtt, self.state, &self.topics.counter, raw, true)
    }

    /// Network snapshot on the `network` topic (retained).
    pub fn publish_network(&mut self, json: &[u8]) -> Result<(), Fault> {
        Self::send(&mut self.mqtt, self.state, &self.topics.network, json, true)
    }

    /// Keep-alive sentinel (retained).
    pub fn publish_keep_alive(&mut self, sentinel: &[u8]) -> Result<(), Fault> {
        Self::send(&mut self.mqtt, self.state, &self.topics.keep_alive, sentinel, true)
    }

    fn send(
        mqtt: &mut M,
        state: ConnectionState,
        topic: &str,
        payload: &[u8],
        retained: bool,
    ) -> Result<(), Fault> {
        if state != ConnectionState::Connected {
            debug!("Connectivity: not connected, dropping publish to '{}'", topic);
            return Err(Fault::PublishFailed);
        }
        mqtt.publish(topic, payload, retained).map_err(|e| {
            warn!("Connectivity: publish to '{}' failed: {}", topic, e);
            Fault::PublishFailed
        })
    }

    /// Erase the credential record and the link's stored configuration.
    pub fn forget_credentials(&mut self) -> Result<(), Fault> {
        let record = self.credentials.erase().map_err(Fault::from);
        let link = self.net.forget_credentials().map_err(|e| {
            warn!("Connectivity: link credential erase failed: {}", e);
            Fault::StorageWriteFailed
        });
        record.and(link)
    }

    pub fn link_info(&self) -> Option<LinkInfo> {
        self.net.link_info()
    }

    pub fn topics(&self) -> &DeviceTopics {
        &self.topics
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn credentials(&self) -> &CredentialStore<K> {
        &self.credentials
    }

    pub fn network(&self) -> &N {
        &self.net
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.net
    }

    pub fn messaging(&self) -> &M {
        &self.mqtt
    }

    pub fn messaging_mut(&mut self) -> &mut M {
        &mut self.mqtt
    }

    fn set_state(&mut self, next: ConnectionState, sink: &mut impl EventSink) {
        if self.state != next {
            debug!("Connectivity: {:?} -> {:?}", self.state, next);
            self.state = next;
            sink.emit(&AppEvent::Connection(next));
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Reconnect policy
// ───────────────────────────────────────────────────────────────

/// Spaces out reconnect cycles from the main loop.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    interval_ms: u32,
    last_attempt_ms: Option<u64>,
}

impl ReconnectPolicy {
    pub fn new(interval_ms: u32) -> Self {
        Self { interval_ms, last_attempt_ms: None }
    }

    /// Record an attempt made outside the policy (the boot-time connect).
    pub fn note_attempt(&mut self, now_ms: u64) {
        self.last_attempt_ms = Some(now_ms);
    }

    /// `true` when disconnected and the interval has elapsed.  A `true`
    /// result counts as an attempt.
    pub fn due(&mut self, now_ms: u64, connected: bool) -> bool {
        if connected {
            return false;
        }
        let elapsed_ok = match self.last_attempt_ms {
            Some(last) => now_ms.wrapping_sub(last) >= u64::from(self.interval_ms),
            None => true,
        };
        if elapsed_ok {
            self.last_attempt_ms = Some(now_ms);
        }
        elapsed_ok
    }
}
