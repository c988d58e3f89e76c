//! Device configuration parameters
//!
//! All tunable timings and naming for the fragrancer.  [`DeviceConfig`] is
//! persisted in NVS (postcard) and falls back to defaults on first boot.
//! [`BrokerCredentials`] is the provisioning-owned record holding the Wi-Fi
//! and broker login; the core only reads it and erases it on reset.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::adapters::utils::{is_printable_ascii, is_valid_ssid, is_valid_wpa_password};

/// Topic prefix used when nothing else is configured.
pub const DEFAULT_TOPIC_PREFIX: &str = "hab/devices/luxuries/automatic-air-fragrancer";
/// Firmware prefix; the device identifier is `<prefix>-<CHIPID>`.
pub const DEFAULT_FIRMWARE_PREFIX: &str = "esp32-air-fragrancer";
/// Plain MQTT port.
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Core device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Naming ---
    /// Topic prefix; topics are `<topic_prefix>/<id>/<channel>`.
    pub topic_prefix: heapless::String<64>,
    /// Prefix of the MQTT client id / hostname.
    pub firmware_prefix: heapless::String<32>,

    // --- Actuation ---
    /// How long the spray output stays energised per activation (ms).
    pub pulse_duration_ms: u32,
    /// Delay between announcing a counter reset and announcing `off` (ms).
    pub settle_delay_ms: u32,
    /// Delay between the steps of the `reset-all` farewell (ms).
    pub farewell_step_ms: u32,
    /// Delay between erasing credentials and restarting (ms).
    pub restart_delay_ms: u32,
    /// Button debounce interval (ms).
    pub debounce_ms: u32,

    // --- Connectivity ---
    /// Connect attempts per `connect()` call.
    pub connect_attempts: u8,
    /// Fixed delay between connect attempts (ms).
    pub connect_retry_delay_ms: u32,
    /// Minimum spacing between reconnect cycles from the main loop (ms).
    pub reconnect_interval_ms: u32,
    /// Broker keep-alive (seconds).
    pub broker_keep_alive_secs: u16,

    // --- Telemetry ---
    /// Keep-alive sentinel cadence (ms).
    pub keep_alive_interval_ms: u32,
    /// Network snapshot cadence (ms).
    pub network_interval_ms: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let mut topic_prefix = heapless::String::new();
        let _ = topic_prefix.push_str(DEFAULT_TOPIC_PREFIX);
        let mut firmware_prefix = heapless::String::new();
        let _ = firmware_prefix.push_str(DEFAULT_FIRMWARE_PREFIX);

        Self {
            topic_prefix,
            firmware_prefix,

            // Actuation
            pulse_duration_ms: 7_000,
            settle_delay_ms: 1_000,
            farewell_step_ms: 1_000,
            restart_delay_ms: 3_000,
            debounce_ms: 5,

            // Connectivity
            connect_attempts: 3,
            connect_retry_delay_ms: 5_000,
            reconnect_interval_ms: 60_000,
            broker_keep_alive_secs: 10,

            // Telemetry
            keep_alive_interval_ms: 60_000,
            network_interval_ms: 30 * 60_000,
        }
    }
}

impl DeviceConfig {
    /// Range-check every field.  Rejects rather than clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic_prefix.is_empty() || !is_printable_ascii(&self.topic_prefix) {
            return Err(ConfigError::ValidationFailed("topic_prefix must be printable ASCII"));
        }
        if self.topic_prefix.contains(['+', '#']) {
            return Err(ConfigError::ValidationFailed("topic_prefix must not contain wildcards"));
        }
        if self.firmware_prefix.is_empty() || !is_printable_ascii(&self.firmware_prefix) {
            return Err(ConfigError::ValidationFailed("firmware_prefix must be printable ASCII"));
        }
        if !(100..=9_000).contains(&self.pulse_duration_ms) {
            return Err(ConfigError::ValidationFailed("pulse_duration_ms must be 100–9000"));
        }
        if self.settle_delay_ms > 10_000 || self.farewell_step_ms > 10_000 {
            return Err(ConfigError::ValidationFailed("sequence delays must be ≤ 10000 ms"));
        }
        if self.restart_delay_ms > 10_000 {
            return Err(ConfigError::ValidationFailed("restart_delay_ms must be ≤ 10000"));
        }
        if !(1..=100).contains(&self.debounce_ms) {
            return Err(ConfigError::ValidationFailed("debounce_ms must be 1–100"));
        }
        if !(1..=10).contains(&self.connect_attempts) {
            return Err(ConfigError::ValidationFailed("connect_attempts must be 1–10"));
        }
        if self.connect_retry_delay_ms > 30_000 {
            return Err(ConfigError::ValidationFailed("connect_retry_delay_ms must be ≤ 30000"));
        }
        if self.reconnect_interval_ms < 5_000 {
            return Err(ConfigError::ValidationFailed("reconnect_interval_ms must be ≥ 5000"));
        }
        if self.broker_keep_alive_secs == 0 {
            return Err(ConfigError::ValidationFailed("broker_keep_alive_secs must be > 0"));
        }
        if self.keep_alive_interval_ms < 1_000 {
            return Err(ConfigError::ValidationFailed("keep_alive_interval_ms must be ≥ 1000"));
        }
        if !(60_000..=24 * 3_600_000).contains(&self.network_interval_ms) {
            return Err(ConfigError::ValidationFailed("network_interval_ms must be 1 min–24 h"));
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Broker / network credentials
// ───────────────────────────────────────────────────────────────

/// Wi-Fi and broker login, written by the provisioning collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BrokerCredentials {
    pub wifi_ssid: heapless::String<32>,
    pub wifi_password: heapless::String<64>,
    pub broker_host: heapless::String<64>,
    pub broker_port: u16,
    pub username: heapless::String<32>,
    pub password: heapless::String<64>,
}

impl BrokerCredentials {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_ssid(&self.wifi_ssid) {
            return Err(ConfigError::ValidationFailed("wifi_ssid must be 1–32 printable ASCII bytes"));
        }
        if !is_valid_wpa_password(&self.wifi_password) {
            return Err(ConfigError::ValidationFailed("wifi_password must be 8–64 bytes or empty"));
        }
        if self.broker_host.is_empty() || !is_printable_ascii(&self.broker_host) {
            return Err(ConfigError::ValidationFailed("broker_host must be printable ASCII"));
        }
        if self.broker_port == 0 {
            return Err(ConfigError::ValidationFailed("broker_port must be non-zero"));
        }
        Ok(())
    }

    /// `mqtt://host:port` URL for the broker.
    pub fn broker_url(&self) -> heapless::String<96> {
        use core::fmt::Write;
        let mut url = heapless::String::new();
        let _ = write!(url, "mqtt://{}:{}", self.broker_host, self.broker_port);
        url
    }
}
