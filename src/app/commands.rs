//! Inbound commands to the dispatcher.
//!
//! The command vocabulary is a closed set parsed once from the payload of
//! the `command` topic.  Anything else maps to [`Command::Unrecognized`],
//! which the dispatcher treats as a no-op so that newer controllers can
//! send verbs this firmware does not know yet.

/// Commands that the broker (or the button) can send into the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `on` / `1`: run one spray pulse.
    On,
    /// Zero the instance counter.
    ResetInstanceCounter,
    /// Zero both counters.
    ResetAllCounter,
    /// Erase network credentials and restart.
    ResetConfig,
    /// Farewell, zero both counters, erase credentials and restart.
    ResetAll,
    /// Re-publish counter and network snapshot.
    Update,
    /// Anything else.  Ignored.
    Unrecognized,
}

impl Command {
    /// Decode a raw payload.  Surrounding whitespace is tolerated; case is not.
    pub fn parse(payload: &[u8]) -> Self {
        let Ok(text) = core::str::from_utf8(payload) else {
            return Self::Unrecognized;
        };
        match text.trim() {
            "on" | "1" => Self::On,
            "reset-instance-counter" => Self::ResetInstanceCounter,
            "reset-all-counter" => Self::ResetAllCounter,
            "reset-config" => Self::ResetConfig,
            "reset-all" => Self::ResetAll,
            "update" => Self::Update,
            _ => Self::Unrecognized,
        }
    }

    /// Label announced on the `device-state` topic when the command starts.
    pub fn label(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::ResetInstanceCounter => "reset-instance-counter",
            Self::ResetAllCounter => "reset-all-counter",
            Self::ResetConfig => "reset-config",
            Self::ResetAll => "reset-all",
            Self::Update => "update",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Who asked for a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseSource {
    /// Physical button.
    Manual,
    /// `on` / `1` over the broker.
    Remote,
}

/// One spray activation.  Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseRequest {
    pub source: PulseSource,
    pub duration_ms: u32,
}
