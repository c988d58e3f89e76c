//! Periodic status publisher.
//!
//! Two independent cadences share the broker session owned by the
//! [`ConnectivityManager`]:
//!
//! ```text
//!  ┌───────────────┐  every keep_alive_interval   ┌──────────────┐
//!  │  keep-alive   │ ───────────────────────────▶ │              │
//!  └───────────────┘        "ping" (retained)     │              │
//!                                                 │ Connectivity │
//!  ┌───────────────┐  every network_interval      │   Manager    │
//!  │ network snap  │ ───────────────────────────▶ │              │
//!  └───────────────┘  {"wifi":{..}} (retained)    └──────────────┘
//! ```
//!
//! Cadences are "elapsed since last fire ≥ interval" on the millisecond
//! clock.  While disconnected nothing fires and nothing is consumed, so a
//! cadence that came due during an outage fires on the first connected
//! cycle.  The very first connected cycle fires both once.

use log::{debug, info};
use serde::Serialize;

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, LinkInfo, MessagingPort, NetworkPort, StoragePort};
use crate::app::connectivity::ConnectivityManager;
use crate::config::DeviceConfig;

/// Payload of the keep-alive topic.
pub const KEEP_ALIVE_SENTINEL: &[u8] = b"ping";

// ═══════════════════════════════════════════════════════════════
//  Network snapshot
// ═══════════════════════════════════════════════════════════════

/// `{"wifi":{"ssid":..,"ip":..,"rssi":..}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSnapshot {
    pub wifi: WifiSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WifiSnapshot {
    pub ssid: heapless::String<32>,
    pub ip: heapless::String<16>,
    pub rssi: i8,
}

impl NetworkSnapshot {
    pub fn from_link(info: Option<LinkInfo>) -> Self {
        let info = info.unwrap_or_default();
        Self {
            wifi: WifiSnapshot { ssid: info.ssid, ip: info.ip, rssi: info.rssi },
        }
    }

    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Cadence
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct Cadence {
    interval_ms: u32,
    last_fire_ms: u64,
}

impl Cadence {
    fn new(interval_ms: u32) -> Self {
        Self { interval_ms, last_fire_ms: 0 }
    }

    fn due(&self, now_ms: u64) -> bool {
        now_ms.wrapping_sub(self.last_fire_ms) >= u64::from(self.interval_ms)
    }

    fn mark(&mut self, now_ms: u64) {
        self.last_fire_ms = now_ms;
    }
}

/// Which publications one [`TelemetryScheduler::tick`] produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fired {
    pub keep_alive: bool,
    pub network: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

pub struct TelemetryScheduler {
    keep_alive: Cadence,
    network: Cadence,
    primed: bool,
}

impl TelemetryScheduler {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            keep_alive: Cadence::new(config.keep_alive_interval_ms),
            network: Cadence::new(config.network_interval_ms),
            primed: false,
        }
    }

    /// How long observers should wait for a keep-alive before treating the
    /// device as stale.
    pub fn staleness_threshold_ms(&self) -> u64 {
        2 * u64::from(self.keep_alive.interval_ms)
    }

    /// Advance both cadences.  Call once per cycle.
    pub fn tick<N, M, K>(
        &mut self,
        now_ms: u64,
        link: &mut ConnectivityManager<N, M, K>,
        sink: &mut impl EventSink,
    ) -> Fired
    where
        N: NetworkPort,
        M: MessagingPort,
        K: StoragePort,
    {
        if !link.is_connected() {
            return Fired::default();
        }

        let first = !self.primed;
        if first {
            info!("Telemetry: first connected cycle, publishing initial state");
            self.primed = true;
        }

        let mut fired = Fired::default();

        if first || self.network.due(now_ms) {
            self.network.mark(now_ms);
            Self::publish_network(link, sink);
            fired.network = true;
        }

        if first || self.keep_alive.due(now_ms) {
            self.keep_alive.mark(now_ms);
            debug!("Telemetry: keep-alive");
            if let Err(f) = link.publish_keep_alive(KEEP_ALIVE_SENTINEL) {
                sink.emit(&AppEvent::Fault(f));
            }
            fired.keep_alive = true;
        }

        fired
    }

    /// Network snapshot plus counter record, outside the cadences.
    pub fn publish_now<N, M, K>(
        &mut self,
        link: &mut ConnectivityManager<N, M, K>,
        counter_raw: &[u8],
        sink: &mut impl EventSink,
    ) where
        N: NetworkPort,
        M: MessagingPort,
        K: StoragePort,
    {
        Self::publish_network(link, sink);
        if let Err(f) = link.publish_counter(counter_raw) {
            sink.emit(&AppEvent::Fault(f));
        }
    }

    fn publish_network<N, M, K>(link: &mut ConnectivityManager<N, M, K>, sink: &mut impl EventSink)
    where
        N: NetworkPort,
        M: MessagingPort,
        K: StoragePort,
    {
        let snapshot = NetworkSnapshot::from_link(link.link_info());
        debug!("Telemetry: network ssid='{}' ip={} rssi={}", snapshot.wifi.ssid, snapshot.wifi.ip, snapshot.wifi.rssi);
        if let Err(f) = link.publish_network(&snapshot.to_json()) {
            sink.emit(&AppEvent::Fault(f));
        }
    }
}
