use crate::gap::constants::*;
use std::fmt;
use std::str::FromStr;

/// Link-layer role of the local device on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Central,
    Peripheral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    Public,
    Random,
    PublicIdentity,
    RandomIdentity,
}

impl TryFrom<u8> for AddressType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            PUBLIC_DEVICE_ADDRESS => Ok(AddressType::Public),
            RANDOM_DEVICE_ADDRESS => Ok(AddressType::Random),
            PUBLIC_IDENTITY_ADDRESS => Ok(AddressType::PublicIdentity),
            RANDOM_IDENTITY_ADDRESS => Ok(AddressType::RandomIdentity),
            other => Err(other),
        }
    }
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> Self {
        match value {
            AddressType::Public => PUBLIC_DEVICE_ADDRESS,
            AddressType::Random => RANDOM_DEVICE_ADDRESS,
            AddressType::PublicIdentity => PUBLIC_IDENTITY_ADDRESS,
            AddressType::RandomIdentity => RANDOM_IDENTITY_ADDRESS,
        }
    }
}

/// Bluetooth device address, stored little-endian as on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

/// Error returned when parsing a textual address fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid Bluetooth address: {0}")]
pub struct ParseAddrError(pub String);

impl FromStr for BdAddr {
    type Err = ParseAddrError;

    /// Parses the `AA:BB:CC:DD:EE:FF` form produced by `Display`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.split(':').collect();
        if s.split(':').count() != 6 || digits.len() != 12 {
            return Err(ParseAddrError(s.to_string()));
        }
        let mut bytes = [0u8; 6];
        hex::decode_to_slice(&digits, &mut bytes).map_err(|_| ParseAddrError(s.to_string()))?;
        bytes.reverse();
        Ok(Self { bytes })
    }
}

/// Address plus its type, as reported for a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    pub addr_type: AddressType,
    pub address: BdAddr,
}

impl PeerAddress {
    pub fn new(addr_type: AddressType, address: BdAddr) -> Self {
        Self { addr_type, address }
    }

    pub fn public(address: BdAddr) -> Self {
        Self::new(AddressType::Public, address)
    }

    pub fn random(address: BdAddr) -> Self {
        Self::new(AddressType::Random, address)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.address, self.addr_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phy {
    #[default]
    Le1M,
    Le2M,
    LeCoded,
}

impl From<Phy> for u8 {
    fn from(value: Phy) -> Self {
        match value {
            Phy::Le1M => LE_PHY_1M,
            Phy::Le2M => LE_PHY_2M,
            Phy::LeCoded => LE_PHY_CODED,
        }
    }
}

impl TryFrom<u8> for Phy {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            LE_PHY_1M => Ok(Phy::Le1M),
            LE_PHY_2M => Ok(Phy::Le2M),
            LE_PHY_CODED => Ok(Phy::LeCoded),
            other => Err(other),
        }
    }
}

/// Transmit and receive PHY of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhyPair {
    pub tx: Phy,
    pub rx: Phy,
}

/// Requested connection parameter range (interval in 1.25 ms units,
/// supervision timeout in 10 ms units)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParams {
    pub interval_min: u16,
    pub interval_max: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

impl ConnectionParams {
    /// Check the ranges the controller would otherwise reject
    pub fn is_valid(&self) -> bool {
        (LE_CONN_INTERVAL_LOWEST..=LE_CONN_INTERVAL_HIGHEST).contains(&self.interval_min)
            && (LE_CONN_INTERVAL_LOWEST..=LE_CONN_INTERVAL_HIGHEST).contains(&self.interval_max)
            && self.interval_min <= self.interval_max
            && self.latency <= LE_CONN_LATENCY_HIGHEST
            && (LE_SUPERVISION_TIMEOUT_LOWEST..=LE_SUPERVISION_TIMEOUT_HIGHEST)
                .contains(&self.supervision_timeout)
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            interval_min: LE_CONN_INTERVAL_MIN,
            interval_max: LE_CONN_INTERVAL_MAX,
            latency: LE_CONN_LATENCY,
            supervision_timeout: LE_SUPERVISION_TIMEOUT,
        }
    }
}

/// Parameters actually in force on a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkParameters {
    pub interval: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingParams {
    pub interval_min: u16,
    pub interval_max: u16,
    pub connectable: bool,
}

impl Default for AdvertisingParams {
    fn default() -> Self {
        Self {
            interval_min: LE_ADV_INTERVAL_MIN,
            interval_max: LE_ADV_INTERVAL_MAX,
            connectable: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    pub active: bool,
    pub interval: u16,
    pub window: u16,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            active: true,
            interval: LE_SCAN_INTERVAL,
            window: LE_SCAN_WINDOW,
        }
    }
}
