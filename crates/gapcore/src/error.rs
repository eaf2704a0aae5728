//! Error types for the gapcore library
//!
//! `HciError` covers failures of the command transport itself. `Error` is the
//! taxonomy every host operation reports: local registry violations are raised
//! before anything reaches the transport, controller failures are decoded from
//! the status carried by a confirmation or indication.

use crate::hci::Status;
use crate::smp::{SecurityFailure, StoreError};
use thiserror::Error;

/// Errors raised by a command transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HciError {
    #[error("Failed to send HCI command: {0}")]
    SendFailed(String),

    #[error("Transport closed")]
    Closed,
}

/// Errors surfaced by the host core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The controller refused the command outright
    #[error("Controller rejected command: {0}")]
    TransportRejected(Status),

    /// No indication arrived within the allowed window
    #[error("Operation timed out")]
    Timeout,

    /// No connection, CIG, CIS or BIG with this handle is known
    #[error("Unknown handle 0x{0:04X}")]
    UnknownHandle(u16),

    /// The ACL handle paired with a CIS is not a live connection
    #[error("Unknown ACL handle 0x{0:04X}")]
    UnknownAclHandle(u16),

    /// A connection was reported on a handle that is still registered
    #[error("Connection handle 0x{0:04X} already registered")]
    DuplicateHandle(u16),

    /// Pairing or encryption failed
    #[error("Security failed: {0}")]
    SecurityFailed(#[from] SecurityFailure),

    /// Only one instance of this operation may be outstanding
    #[error("Operation already in progress")]
    Busy,

    /// The operation violates a lifecycle ordering rule
    #[error("Command disallowed: {0}")]
    CommandDisallowed(&'static str),

    /// The link went away while the operation was running
    #[error("Link disconnected: {0}")]
    Disconnected(Status),

    #[error("Bonding store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] HciError),
}

/// Result type for host operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build the error for a failed confirmation or indication status
    pub fn from_status(status: Status) -> Self {
        match status {
            Status::ConnectionTimeout | Status::LmpResponseTimeout => Error::Timeout,
            Status::AuthenticationFailure => {
                Error::SecurityFailed(SecurityFailure::AuthenticationFailed)
            }
            Status::PinOrKeyMissing => Error::SecurityFailed(SecurityFailure::KeyMissing),
            Status::RepeatedAttempts => Error::SecurityFailed(SecurityFailure::RepeatedAttempts),
            Status::CommandDisallowed => Error::CommandDisallowed("rejected by controller"),
            other => Error::TransportRejected(other),
        }
    }
}
