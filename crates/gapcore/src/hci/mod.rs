//! Host/controller boundary
//!
//! Commands go out through a `Transport`; confirmations and indications come
//! back as `Event`s. Encoding either side onto the wire is the transport's
//! business.

pub mod command;
pub mod constants;
pub mod event;
pub mod status;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use command::Command;
pub use event::{AdvertisingReport, ConnectionComplete, Event};
pub use status::Status;
pub use transport::{Outbox, Transport};
