//! Device logic.  No I/O of its own.
//!
//! Counter store, connectivity lifecycle and the command dispatcher.  All
//! interaction with hardware and the network happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod connectivity;
pub mod counter;
pub mod credentials;
pub mod dispatcher;
pub mod events;
pub mod ports;
pub mod runtime;
pub mod topics;
