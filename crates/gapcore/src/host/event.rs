//! Events the host hands to the application
//!
//! Every operation the application starts ends in exactly one terminal event:
//! a success, a typed failure, a confirmed cancellation or `OperationAborted`.

use crate::error::Error;
use crate::gap::{BdAddr, LinkParameters, PeerAddress, PhyPair, Role};
use crate::hci::{AdvertisingReport, Status};
use crate::iso::DataPathDirection;
use crate::smp::SecurityLevel;

/// An in-flight operation cut short by power-off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Advertising,
    Scanning,
    Connect,
    Disconnect(u16),
    ConnectionUpdate(u16),
    PhyUpdate(u16),
    Bonding(u16),
    CigConfiguration(u8),
    CigRemoval(u8),
    Cis(u16),
    DataPath(u16),
    Big(u8),
    BigSync(u8),
}

/// Per-stream result of a CIG configuration: the assigned handle or the
/// status the controller rejected that entry with
pub type CisResult = std::result::Result<u16, Status>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    AdvertisingChanged {
        enabled: bool,
        result: Result<(), Error>,
    },
    ScanningChanged {
        enabled: bool,
        result: Result<(), Error>,
    },
    AdvertisingReport(AdvertisingReport),

    Connected {
        handle: u16,
        role: Role,
        peer: PeerAddress,
    },
    ConnectionFailed {
        peer: PeerAddress,
        error: Error,
    },
    ConnectionCancelled {
        peer: PeerAddress,
    },
    Disconnected {
        handle: u16,
        peer: PeerAddress,
        reason: Status,
    },
    DisconnectFailed {
        handle: u16,
        error: Error,
    },
    ConnectionUpdated {
        handle: u16,
        result: Result<LinkParameters, Error>,
    },
    PhyUpdated {
        handle: u16,
        result: Result<PhyPair, Error>,
    },

    BondingStarted {
        handle: u16,
        peer: PeerAddress,
        previously_bonded: bool,
    },
    /// The user must type the passkey shown on the peer
    PasskeyRequest {
        handle: u16,
    },
    PasskeyDisplay {
        handle: u16,
        passkey: u32,
    },
    PasskeyDisplayStop {
        handle: u16,
    },
    /// The user must confirm both devices show `value`
    ConfirmRequest {
        handle: u16,
        value: u32,
    },
    BondingComplete {
        handle: u16,
        /// Identity the bond was filed under
        peer: PeerAddress,
        level: SecurityLevel,
        key_size: u8,
    },
    BondingFailed {
        handle: u16,
        peer: PeerAddress,
        error: Error,
    },
    KeysPhasedOut {
        peer: BdAddr,
    },

    CigConfigured {
        cig_id: u8,
        result: Result<Vec<(u8, CisResult)>, Error>,
    },
    CisEstablished {
        cis_handle: u16,
        result: Result<(), Error>,
    },
    CisRequest {
        acl_handle: u16,
        cis_handle: u16,
        cig_id: u8,
        cis_id: u8,
    },
    CisDisconnected {
        cis_handle: u16,
        reason: Status,
    },
    CigRemoved {
        cig_id: u8,
        result: Result<(), Error>,
    },
    IsoDataPathChanged {
        handle: u16,
        direction: DataPathDirection,
        /// Whether the data path is set up after this event
        active: bool,
        result: Result<(), Error>,
    },

    BigCreated {
        big_handle: u8,
        result: Result<Vec<u16>, Error>,
    },
    BigTerminated {
        big_handle: u8,
        result: Result<Status, Error>,
    },
    BigSyncEstablished {
        big_handle: u8,
        result: Result<Vec<u16>, Error>,
    },
    BigSyncLost {
        big_handle: u8,
        reason: Status,
    },
    BigSyncTerminated {
        big_handle: u8,
        result: Result<(), Error>,
    },

    OperationAborted {
        operation: Operation,
    },
}
