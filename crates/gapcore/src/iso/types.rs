//! Types for connected and broadcast isochronous streams
use crate::gap::Phy;
use crate::hci::Status;
use crate::smp::Key128;

/// Framing of isochronous SDUs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    #[default]
    Unframed,
    Framed,
}

/// How the controller should schedule the streams of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Packing {
    #[default]
    Sequential,
    Interleaved,
}

/// Per-stream entry of a CIG configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CisConfig {
    pub cis_id: u8,
    /// Maximum SDU size, central to peripheral
    pub max_sdu_c_to_p: u16,
    /// Maximum SDU size, peripheral to central
    pub max_sdu_p_to_c: u16,
    pub phy_c_to_p: Phy,
    pub phy_p_to_c: Phy,
    /// Retransmission number, central to peripheral
    pub rtn_c_to_p: u8,
    /// Retransmission number, peripheral to central
    pub rtn_p_to_c: u8,
}

impl CisConfig {
    pub fn new(cis_id: u8, max_sdu: u16) -> Self {
        Self {
            cis_id,
            max_sdu_c_to_p: max_sdu,
            max_sdu_p_to_c: max_sdu,
            phy_c_to_p: Phy::Le2M,
            phy_p_to_c: Phy::Le2M,
            rtn_c_to_p: 2,
            rtn_p_to_c: 2,
        }
    }
}

/// Group-wide CIG parameters plus the streams it holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CigParams {
    /// SDU interval in microseconds, central to peripheral
    pub sdu_interval_c_to_p: u32,
    /// SDU interval in microseconds, peripheral to central
    pub sdu_interval_p_to_c: u32,
    pub worst_case_sca: u8,
    pub packing: Packing,
    pub framing: Framing,
    /// Maximum transport latency in milliseconds
    pub max_latency_c_to_p: u16,
    pub max_latency_p_to_c: u16,
    pub cis: Vec<CisConfig>,
}

impl CigParams {
    /// 10 ms unframed streams, the usual LE Audio setup
    pub fn new(cis: Vec<CisConfig>) -> Self {
        Self {
            sdu_interval_c_to_p: 10_000,
            sdu_interval_p_to_c: 10_000,
            worst_case_sca: 0,
            packing: Packing::Sequential,
            framing: Framing::Unframed,
            max_latency_c_to_p: 20,
            max_latency_p_to_c: 20,
            cis,
        }
    }
}

/// Controller result for one requested CIS of a CIG configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CisAssignment {
    pub cis_id: u8,
    pub status: Status,
    /// CIS connection handle, meaningful only when `status` is success
    pub handle: u16,
}

/// Pairing of a CIS with the ACL it rides on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CisPair {
    pub cis_handle: u16,
    pub acl_handle: u16,
}

/// Lifecycle of one CIS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CisState {
    Unconfigured,
    /// The CIG configuration assigned a handle
    ParamsSet,
    /// Create CIS was issued
    Created,
    Established,
    Disconnecting,
}

/// A CIS the coordinator tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cis {
    pub cis_id: u8,
    pub cig_id: u8,
    pub handle: u16,
    pub acl_handle: Option<u16>,
    pub state: CisState,
    /// Accepted from a peer request rather than created from a local CIG
    pub peer_initiated: bool,
}

/// A locally configured CIG
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cig {
    pub id: u8,
    pub params: CigParams,
    /// Streams whose configuration succeeded, by CIS handle
    pub cis: Vec<u16>,
}

/// Peer CIS request awaiting the application's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CisRequest {
    pub acl_handle: u16,
    pub cis_handle: u16,
    pub cig_id: u8,
    pub cis_id: u8,
}

/// Direction of an ISO data path, seen from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataPathDirection {
    /// Host to controller
    Input,
    /// Controller to host
    Output,
}

/// Parameters of a broadcast isochronous group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigParams {
    pub num_bis: u8,
    /// SDU interval in microseconds
    pub sdu_interval: u32,
    pub max_sdu: u16,
    /// Maximum transport latency in milliseconds
    pub max_latency: u16,
    pub rtn: u8,
    pub phy: Phy,
    pub packing: Packing,
    pub framing: Framing,
    /// Broadcast code when the BIG is encrypted
    pub broadcast_code: Option<Key128>,
}

impl BigParams {
    pub fn new(num_bis: u8, max_sdu: u16) -> Self {
        Self {
            num_bis,
            sdu_interval: 10_000,
            max_sdu,
            max_latency: 20,
            rtn: 2,
            phy: Phy::Le2M,
            packing: Packing::Sequential,
            framing: Framing::Unframed,
            broadcast_code: None,
        }
    }
}

/// Whether the local device sends or receives a BIG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigRole {
    Broadcaster,
    Receiver,
}

/// Lifecycle of one BIG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigState {
    Unconfigured,
    /// Creation or synchronization was requested
    Created,
    Established,
    SyncEstablished,
    Terminating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Big {
    pub handle: u8,
    pub role: BigRole,
    pub state: BigState,
    pub bis_handles: Vec<u16>,
}
