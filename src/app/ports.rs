//! Port traits: the boundary between the device logic and its hardware, flash and network.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Dispatcher / ConnectivityManager (domain)
//! ```
//!
//! Driven adapters (Wi-Fi link, MQTT client, GPIO, NVS, clock) implement
//! these traits.  The domain consumes them via generics, so the control core
//! never touches hardware directly and runs unchanged against the mocks in
//! `tests/integration/mock_hw.rs`.

use crate::config::DeviceConfig;

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the spray output and its paired indicator.
pub trait ActuatorPort {
    /// Drive the spray power line.
    fn set_output(&mut self, active: bool);

    /// Drive the indicator LED.
    fn set_indicator(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Input port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Debounced digital input (the manual spray button).
pub trait InputPort {
    /// Sample the pin and advance the debouncer.  Call once per cycle.
    fn update(&mut self, now_ms: u64);

    /// `true` exactly once per debounced press edge, on the cycle it is detected.
    fn pressed(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time and bounded blocking waits.
///
/// Blocking waits are how the pulse and reset sequences hold the output
/// line; implementations must actually block (on target) or advance virtual
/// time (in tests).
pub trait ClockPort {
    /// Milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Block the caller for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Network link port (Wi-Fi station)
// ───────────────────────────────────────────────────────────────

/// Identity of the current network link, reported in the network snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkInfo {
    pub ssid: heapless::String<32>,
    pub ip: heapless::String<16>,
    pub rssi: i8,
}

pub trait NetworkPort {
    /// Bring the link up (blocking, bounded by the driver's own timeout).
    fn connect(&mut self) -> Result<(), LinkError>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Current link identity, `None` while down.
    fn link_info(&self) -> Option<LinkInfo>;

    /// Erase the stored station credentials so the next boot re-provisions.
    fn forget_credentials(&mut self) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Messaging port (publish/subscribe client)
// ───────────────────────────────────────────────────────────────

/// Last-will registered with the broker at session-open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastWill<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub retained: bool,
}

/// Session parameters for [`MessagingPort::open_session`].
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions<'a> {
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub keep_alive_secs: u16,
    pub will: LastWill<'a>,
}

/// One message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: heapless::String<128>,
    pub payload: heapless::Vec<u8, 64>,
}

pub trait MessagingPort {
    /// Open a broker session, registering the last-will.
    fn open_session(&mut self, opts: &SessionOptions<'_>) -> Result<(), MessagingError>;

    /// Close the session cleanly (no last-will is published).
    fn close_session(&mut self);

    fn is_connected(&self) -> bool;

    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> Result<(), MessagingError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), MessagingError>;

    /// Take at most one pending inbound message.  Never blocks.
    fn poll(&mut self) -> Option<InboundMessage>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the device configuration.
///
/// Implementations MUST validate before persisting and reject invalid
/// ranges with [`ConfigError::ValidationFailed`], not clamp them.
pub trait ConfigPort {
    /// Returns [`DeviceConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for the counter record and credentials.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - A single `write` need not be atomic; the counter store layers its own
///   A/B commit protocol on top.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A field failed range validation; the `&'static str` names it.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The storage medium could not be opened at all.
    Unavailable,
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// Stored bytes failed to decode.
    Corrupted,
}

/// Errors from [`NetworkPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    NoCredentials,
    InvalidCredentials,
    ConnectionFailed,
    Timeout,
    Driver,
}

/// Errors from [`MessagingPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagingError {
    ConnectFailed,
    NotConnected,
    PublishFailed,
    SubscribeFailed,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "storage unavailable"),
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "record corrupted"),
        }
    }
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no network credentials"),
            Self::InvalidCredentials => write!(f, "network credentials invalid"),
            Self::ConnectionFailed => write!(f, "link connection failed"),
            Self::Timeout => write!(f, "link timed out"),
            Self::Driver => write!(f, "network driver error"),
        }
    }
}

impl core::fmt::Display for MessagingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "broker connect failed"),
            Self::NotConnected => write!(f, "no broker session"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
        }
    }
}
