//! Per-device topic table.
//!
//! Built once at startup from the configured prefix and the device's topic
//! id, then shared by reference.  Capacities match the 128-byte topic
//! buffers the broker client is configured for.

use core::fmt::Write;

use crate::app::ports::ConfigError;

pub type Topic = heapless::String<128>;

/// Payloads of the availability topic.
pub const AVAILABILITY_ONLINE: &str = "online";
pub const AVAILABILITY_OFFLINE: &str = "offline";

/// Every channel the device publishes to or subscribes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    /// Retained `online` / `offline` (last-will).
    pub availability: Topic,
    /// Retained network snapshot.
    pub network: Topic,
    /// Retained keep-alive sentinel.
    pub keep_alive: Topic,
    /// Retained raw counter record.
    pub counter: Topic,
    /// Inbound commands.
    pub command: Topic,
    /// Outbound transition labels.
    pub command_state: Topic,
}

impl DeviceTopics {
    /// Derive the table as `<prefix>/<id>/<channel>`.
    pub fn new(prefix: &str, id: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.trim_end_matches('/');
        Ok(Self {
            availability: build(prefix, id, "connection")?,
            network: build(prefix, id, "network")?,
            keep_alive: build(prefix, id, "keep-alive")?,
            counter: build(prefix, id, "burst-counter")?,
            command: build(prefix, id, "command")?,
            command_state: build(prefix, id, "device-state")?,
        })
    }
}

fn build(prefix: &str, id: &str, channel: &str) -> Result<Topic, ConfigError> {
    let mut t = Topic::new();
    write!(t, "{}/{}/{}", prefix, id, channel)
        .map_err(|_| ConfigError::ValidationFailed("topic exceeds 128 bytes"))?;
    Ok(t)
}
