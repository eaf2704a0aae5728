//! Generic Access Profile: connection registry and GAP state machine

pub mod connection;
pub mod constants;
pub mod manager;
pub mod types;

#[cfg(test)]
mod tests;

pub use connection::{Connection, ConnectionRegistry, LinkState};
pub use manager::{AcceptAll, Activity, GapManager, GapPolicy, Initiation, Outcome};
pub use types::*;
