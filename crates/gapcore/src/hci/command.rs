//! Requests the host issues to the controller
//!
//! Opcodes and parameter encoding belong to the codec behind the
//! `Transport`; the host core only deals in this closed set of requests.

use super::Status;
use crate::gap::{AdvertisingParams, ConnectionParams, PeerAddress, PhyPair, ScanParams};
use crate::iso::{BigParams, CigParams, CisPair, DataPathDirection};
use crate::smp::{
    AuthReq, Key128, LocalKeys, LongTermKey, OobData, PairingFeatures, PairingMethod,
    SecurityFailure,
};

/// Host to controller requests
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
    // Advertising and scanning
    SetAdvertisingEnable {
        enable: bool,
        params: AdvertisingParams,
    },
    SetScanEnable {
        enable: bool,
        params: ScanParams,
    },

    // Connections
    CreateConnection {
        peer: PeerAddress,
        params: ConnectionParams,
    },
    CreateConnectionCancel,
    Disconnect {
        handle: u16,
        reason: Status,
    },
    ConnectionUpdate {
        handle: u16,
        params: ConnectionParams,
    },
    RemoteParamRequestReply {
        handle: u16,
        params: ConnectionParams,
    },
    RemoteParamRequestNegativeReply {
        handle: u16,
        reason: Status,
    },
    SetPhy {
        handle: u16,
        phy: PhyPair,
    },

    // Security
    PairingRequest {
        handle: u16,
        features: PairingFeatures,
    },
    PairingResponse {
        handle: u16,
        features: PairingFeatures,
    },
    SecurityRequest {
        handle: u16,
        auth_req: AuthReq,
    },
    PairingFailed {
        handle: u16,
        reason: SecurityFailure,
    },
    /// Run the cryptographic exchange for the selected method
    StartKeyExchange {
        handle: u16,
        method: PairingMethod,
        passkey: Option<u32>,
        oob: Option<OobData>,
    },
    UserConfirmReply {
        handle: u16,
        accept: bool,
    },
    DistributeKeys {
        handle: u16,
        keys: LocalKeys,
    },
    StartEncryption {
        handle: u16,
        ltk: LongTermKey,
    },

    // Connected isochronous streams
    SetCigParameters {
        cig_id: u8,
        params: CigParams,
    },
    CreateCis {
        pairs: Vec<CisPair>,
    },
    RemoveCig {
        cig_id: u8,
    },
    AcceptCisRequest {
        cis_handle: u16,
    },
    RejectCisRequest {
        cis_handle: u16,
        reason: Status,
    },
    SetupIsoDataPath {
        handle: u16,
        direction: DataPathDirection,
    },
    RemoveIsoDataPath {
        handle: u16,
        direction: DataPathDirection,
    },

    // Broadcast isochronous groups
    CreateBig {
        big_handle: u8,
        adv_handle: u8,
        params: BigParams,
    },
    TerminateBig {
        big_handle: u8,
        reason: Status,
    },
    BigCreateSync {
        big_handle: u8,
        sync_handle: u16,
        bis: Vec<u8>,
        broadcast_code: Option<Key128>,
    },
    BigTerminateSync {
        big_handle: u8,
    },
}

impl Command {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetAdvertisingEnable { .. } => "LE Set Advertising Enable",
            Self::SetScanEnable { .. } => "LE Set Scan Enable",
            Self::CreateConnection { .. } => "LE Create Connection",
            Self::CreateConnectionCancel => "LE Create Connection Cancel",
            Self::Disconnect { .. } => "Disconnect",
            Self::ConnectionUpdate { .. } => "LE Connection Update",
            Self::RemoteParamRequestReply { .. } => "LE Remote Connection Parameter Request Reply",
            Self::RemoteParamRequestNegativeReply { .. } => {
                "LE Remote Connection Parameter Request Negative Reply"
            }
            Self::SetPhy { .. } => "LE Set PHY",
            Self::PairingRequest { .. } => "Pairing Request",
            Self::PairingResponse { .. } => "Pairing Response",
            Self::SecurityRequest { .. } => "Security Request",
            Self::PairingFailed { .. } => "Pairing Failed",
            Self::StartKeyExchange { .. } => "Start Key Exchange",
            Self::UserConfirmReply { .. } => "User Confirm Reply",
            Self::DistributeKeys { .. } => "Distribute Keys",
            Self::StartEncryption { .. } => "LE Enable Encryption",
            Self::SetCigParameters { .. } => "LE Set CIG Parameters",
            Self::CreateCis { .. } => "LE Create CIS",
            Self::RemoveCig { .. } => "LE Remove CIG",
            Self::AcceptCisRequest { .. } => "LE Accept CIS Request",
            Self::RejectCisRequest { .. } => "LE Reject CIS Request",
            Self::SetupIsoDataPath { .. } => "LE Setup ISO Data Path",
            Self::RemoveIsoDataPath { .. } => "LE Remove ISO Data Path",
            Self::CreateBig { .. } => "LE Create BIG",
            Self::TerminateBig { .. } => "LE Terminate BIG",
            Self::BigCreateSync { .. } => "LE BIG Create Sync",
            Self::BigTerminateSync { .. } => "LE BIG Terminate Sync",
        }
    }

    /// Connection, CIS or BIS handle the command addresses, if any
    pub fn handle(&self) -> Option<u16> {
        match self {
            Self::Disconnect { handle, .. }
            | Self::ConnectionUpdate { handle, .. }
            | Self::RemoteParamRequestReply { handle, .. }
            | Self::RemoteParamRequestNegativeReply { handle, .. }
            | Self::SetPhy { handle, .. }
            | Self::PairingRequest { handle, .. }
            | Self::PairingResponse { handle, .. }
            | Self::SecurityRequest { handle, .. }
            | Self::PairingFailed { handle, .. }
            | Self::StartKeyExchange { handle, .. }
            | Self::UserConfirmReply { handle, .. }
            | Self::DistributeKeys { handle, .. }
            | Self::StartEncryption { handle, .. }
            | Self::SetupIsoDataPath { handle, .. }
            | Self::RemoveIsoDataPath { handle, .. } => Some(*handle),
            Self::AcceptCisRequest { cis_handle } | Self::RejectCisRequest { cis_handle, .. } => {
                Some(*cis_handle)
            }
            _ => None,
        }
    }
}
