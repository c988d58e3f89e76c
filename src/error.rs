//! Fault taxonomy for the fragrancer firmware.
//!
//! Nothing in the control core is fatal.  Every failure is handled where it
//! occurs, logged, and surfaced to the [`EventSink`](crate::app::ports::EventSink)
//! as one of these `Copy` variants so that a transition can always run to
//! completion.  The only deliberate "fatal" path is a user-issued
//! `reset-config` / `reset-all`, which ends in a restart and is not an error.

use core::fmt;

use crate::app::ports::{LinkError, MessagingError, StorageError};

// ---------------------------------------------------------------------------
// Fault
// ---------------------------------------------------------------------------

/// Every degraded condition the core can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The storage medium could not be opened; counting continues in RAM.
    StorageUnavailable,
    /// A counter write failed; the previously committed record is kept.
    StorageWriteFailed,
    /// Link or broker session could not be established within the attempt budget.
    ConnectFailed,
    /// An outbound message could not be handed to the transport.
    PublishFailed,
    /// An inbound payload did not decode to a known command.
    MalformedCommand,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageUnavailable => write!(f, "storage unavailable"),
            Self::StorageWriteFailed => write!(f, "storage write failed"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::MalformedCommand => write!(f, "malformed command"),
        }
    }
}

// ---------------------------------------------------------------------------
// Port error conversions
// ---------------------------------------------------------------------------

impl From<StorageError> for Fault {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Unavailable => Self::StorageUnavailable,
            StorageError::NotFound
            | StorageError::Full
            | StorageError::IoError
            | StorageError::Corrupted => Self::StorageWriteFailed,
        }
    }
}

impl From<LinkError> for Fault {
    fn from(_: LinkError) -> Self {
        Self::ConnectFailed
    }
}

impl From<MessagingError> for Fault {
    fn from(e: MessagingError) -> Self {
        match e {
            MessagingError::PublishFailed | MessagingError::NotConnected => Self::PublishFailed,
            MessagingError::ConnectFailed | MessagingError::SubscribeFailed => Self::ConnectFailed,
        }
    }
}
