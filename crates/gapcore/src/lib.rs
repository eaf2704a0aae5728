//! gapcore - A Bluetooth Low Energy host core
//!
//! This library implements the stateful middle of a BLE host: the connection
//! registry, the GAP state machine, the Security Manager's pairing and bonding
//! state machine with its bonding store, and the coordinator for connected and
//! broadcast isochronous streams.
//!
//! It does not talk to hardware. Commands leave through a [`Transport`]
//! implementation supplied by the application, and the controller's
//! confirmations and indications are fed back in as [`Event`]s through
//! [`Host::handle_event`]. Results reach the application as [`HostEvent`]s.

pub mod error;
pub mod gap;
pub mod hci;
pub mod host;
pub mod iso;
pub mod smp;

// Re-export common types for convenience
pub use error::{Error, HciError, Result};
pub use gap::{
    AcceptAll, AddressType, BdAddr, Connection, ConnectionParams, ConnectionRegistry, GapPolicy,
    PeerAddress, Role,
};
pub use hci::{Command, ConnectionComplete, Event, Status, Transport};
pub use host::{Host, HostConfig, HostEvent, Operation};
pub use iso::{BigParams, CigParams, CisConfig, CisPair, DataPathDirection, IsoCoordinator};
pub use smp::{
    AuthReq, BondRecord, BondingDecision, BondingState, BondingStore, FixedSecurity, IoCapability,
    KeyDistribution, PairingFeatures, PairingMethod, SecurityLevel, SecurityProvider,
};
