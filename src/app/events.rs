//! Outbound application events.
//!
//! The dispatcher and connectivity manager emit these through the
//! [`EventSink`](super::ports::EventSink) port.  They are diagnostics for
//! the serial log, not the broker protocol; broker messages go through
//! [`ConnectivityManager::publish`](super::connectivity::ConnectivityManager::publish).

use super::commands::{Command, PulseSource};
use super::connectivity::ConnectionState;
use super::counter::ActivationCounters;
use super::dispatcher::DispatchState;
use crate::error::Fault;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The dispatcher moved between states.
    StateChanged { from: DispatchState, to: DispatchState },

    /// A command was accepted for processing.
    CommandAccepted(Command),

    /// A command was dropped (unknown verb, or not allowed in the current state).
    CommandIgnored(Command),

    /// A spray pulse finished.
    PulseCompleted { source: PulseSource, duration_ms: u32 },

    /// The counters changed and were handed to the store.
    CountersChanged(ActivationCounters),

    /// The broker session changed state.
    Connection(ConnectionState),

    /// A non-fatal fault was handled.
    Fault(Fault),

    /// The device is about to restart.
    Restarting,
}
