//! Confirmations and indications the controller reports to the host
//!
//! A confirmation only says whether the controller accepted a command. The
//! indication that follows carries the real outcome of the operation.

use super::Status;
use crate::gap::{BdAddr, ConnectionParams, LinkParameters, PeerAddress, PhyPair, Role};
use crate::iso::{CisAssignment, DataPathDirection};
use crate::smp::{AuthReq, KeyType, PairingFeatures, PeerKeys};

/// A received advertising report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingReport {
    pub peer: PeerAddress,
    pub rssi: i8,
    pub connectable: bool,
    pub data: Vec<u8>,
}

/// Payload of a connection-complete indication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionComplete {
    pub status: Status,
    pub handle: u16,
    pub role: Role,
    pub peer: PeerAddress,
    pub params: LinkParameters,
    /// Local resolvable private address, when privacy is in use
    pub local_rpa: Option<BdAddr>,
    /// Peer resolvable private address, when privacy is in use
    pub peer_rpa: Option<BdAddr>,
}

/// Controller to host events
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Event {
    // Advertising and scanning confirmations
    AdvertisingEnableComplete {
        status: Status,
    },
    ScanEnableComplete {
        status: Status,
    },
    AdvertisingReport(AdvertisingReport),

    // Connections
    CreateConnectionStatus {
        status: Status,
    },
    CreateConnectionCancelComplete {
        status: Status,
    },
    ConnectionComplete(ConnectionComplete),
    DisconnectStatus {
        handle: u16,
        status: Status,
    },
    DisconnectionComplete {
        handle: u16,
        reason: Status,
    },
    ConnectionUpdateStatus {
        handle: u16,
        status: Status,
    },
    ConnectionUpdateComplete {
        status: Status,
        handle: u16,
        params: LinkParameters,
    },
    RemoteConnectionParameterRequest {
        handle: u16,
        params: ConnectionParams,
    },
    PhyUpdateStatus {
        handle: u16,
        status: Status,
    },
    PhyUpdateComplete {
        status: Status,
        handle: u16,
        phy: PhyPair,
    },

    // Security
    /// Confirmation for any security command on `handle`
    SecurityCommandStatus {
        handle: u16,
        status: Status,
    },
    SecurityRequest {
        handle: u16,
        auth_req: AuthReq,
    },
    PairingRequest {
        handle: u16,
        features: PairingFeatures,
    },
    PairingResponse {
        handle: u16,
        features: PairingFeatures,
    },
    /// Six-digit value to compare during numeric comparison
    NumericComparison {
        handle: u16,
        value: u32,
    },
    EncryptionChange {
        handle: u16,
        status: Status,
        enabled: bool,
    },
    KeysReceived {
        handle: u16,
        keys: PeerKeys,
    },
    PairingComplete {
        handle: u16,
        status: Status,
    },
    /// The peer aborted pairing with an SMP reason code
    PairingFailed {
        handle: u16,
        reason: u8,
    },
    KeyTypeChanged {
        peer: BdAddr,
        key_type: KeyType,
    },

    // Connected isochronous streams
    CigParametersSet {
        cig_id: u8,
        status: Status,
        assignments: Vec<CisAssignment>,
    },
    CreateCisStatus {
        status: Status,
        cis_handles: Vec<u16>,
    },
    CisEstablished {
        cis_handle: u16,
        status: Status,
    },
    CisRequest {
        acl_handle: u16,
        cis_handle: u16,
        cig_id: u8,
        cis_id: u8,
    },
    CisReplyStatus {
        cis_handle: u16,
        status: Status,
    },
    CigRemoved {
        cig_id: u8,
        status: Status,
    },
    IsoDataPathComplete {
        handle: u16,
        direction: DataPathDirection,
        /// Setup when true, removal otherwise
        setup: bool,
        status: Status,
    },

    // Broadcast isochronous groups
    CreateBigStatus {
        big_handle: u8,
        status: Status,
    },
    BigCreated {
        big_handle: u8,
        status: Status,
        bis_handles: Vec<u16>,
    },
    TerminateBigStatus {
        big_handle: u8,
        status: Status,
    },
    BigTerminated {
        big_handle: u8,
        reason: Status,
    },
    BigCreateSyncStatus {
        big_handle: u8,
        status: Status,
    },
    BigSyncEstablished {
        big_handle: u8,
        status: Status,
        bis_handles: Vec<u16>,
    },
    BigSyncLost {
        big_handle: u8,
        reason: Status,
    },
    BigTerminateSyncComplete {
        big_handle: u8,
        status: Status,
    },
}

impl Event {
    /// Whether this event only confirms that a command was accepted
    pub fn is_confirmation(&self) -> bool {
        matches!(
            self,
            Event::AdvertisingEnableComplete { .. }
                | Event::ScanEnableComplete { .. }
                | Event::CreateConnectionStatus { .. }
                | Event::CreateConnectionCancelComplete { .. }
                | Event::DisconnectStatus { .. }
                | Event::ConnectionUpdateStatus { .. }
                | Event::PhyUpdateStatus { .. }
                | Event::SecurityCommandStatus { .. }
                | Event::CigParametersSet { .. }
                | Event::CreateCisStatus { .. }
                | Event::CisReplyStatus { .. }
                | Event::CigRemoved { .. }
                | Event::IsoDataPathComplete { .. }
                | Event::CreateBigStatus { .. }
                | Event::TerminateBigStatus { .. }
                | Event::BigCreateSyncStatus { .. }
                | Event::BigTerminateSyncComplete { .. }
        )
    }
}
