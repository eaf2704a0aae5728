//! Bonding store
//!
//! Maps a peer identity address to the long-term security material agreed
//! with that peer. Records outlive individual connections. Durability is
//! delegated to an optional `BondPersistence` hook: a record is written there
//! in full before the in-memory copy changes, so a failed write leaves the
//! previous record untouched.

use super::constants::*;
use super::keys::*;
use super::types::*;
use crate::gap::{AddressType, BdAddr, PeerAddress};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use thiserror::Error;

/// Bonding store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Keys for {0} are phased out and not yet deleted")]
    PendingDeletion(BdAddr),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Corrupt bond record: {0}")]
    Corrupt(&'static str),
}

/// Key type reported for a peer's link key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Unauthenticated,
    Authenticated,
    AuthenticatedSecureConnections,
    /// The key was phased out and must be deleted
    Invalid,
}

/// Durable storage for bond records, supplied by the application
pub trait BondPersistence {
    /// Write the serialized record for `identity`, replacing any previous one
    fn store(&mut self, identity: &BdAddr, record: &[u8]) -> Result<(), StoreError>;

    /// Delete the record for `identity`; deleting a missing record succeeds
    fn remove(&mut self, identity: &BdAddr) -> Result<(), StoreError>;

    /// Delete every record
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// In-memory persistence, useful for tests and for hosts without flash
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    records: HashMap<BdAddr, Vec<u8>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every stored record
    pub fn load(&self) -> Result<Vec<BondRecord>, StoreError> {
        self.records
            .values()
            .map(|bytes| BondRecord::from_bytes(bytes))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl BondPersistence for MemoryPersistence {
    fn store(&mut self, identity: &BdAddr, record: &[u8]) -> Result<(), StoreError> {
        self.records.insert(*identity, record.to_vec());
        Ok(())
    }

    fn remove(&mut self, identity: &BdAddr) -> Result<(), StoreError> {
        self.records.remove(identity);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.records.clear();
        Ok(())
    }
}

/// Long-term trust established with one peer identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondRecord {
    id: u64,
    identity: PeerAddress,
    keys: BondKeys,
    security_level: SecurityLevel,
    key_size: u8,
    bonded: bool,
}

impl BondRecord {
    fn empty(id: u64, identity: PeerAddress) -> Self {
        Self {
            id,
            identity,
            keys: BondKeys::default(),
            security_level: SecurityLevel::None,
            key_size: 0,
            bonded: false,
        }
    }

    /// Stable identifier of this record within the store
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn identity(&self) -> &PeerAddress {
        &self.identity
    }

    pub fn keys(&self) -> &BondKeys {
        &self.keys
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    pub fn key_size(&self) -> u8 {
        self.key_size
    }

    /// Whether a bonding with this peer has completed before
    pub fn is_bonded(&self) -> bool {
        self.bonded
    }

    /// Serialize for a `BondPersistence` backend
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.push(BOND_RECORD_VERSION);
        out.push(u8::from(self.identity.addr_type));
        out.extend_from_slice(&self.identity.address.bytes);
        out.push(self.security_level.to_u8());
        out.push(self.key_size);
        out.push(self.bonded as u8);

        let keys = &self.keys;
        let present = [
            keys.local_ltk.is_some(),
            keys.peer_ltk.is_some(),
            keys.local_irk.is_some(),
            keys.peer_irk.is_some(),
            keys.local_csrk.is_some(),
            keys.peer_csrk.is_some(),
        ]
        .iter()
        .enumerate()
        .fold(0u8, |acc, (bit, set)| acc | ((*set as u8) << bit));
        out.push(present);

        for ltk in [&keys.local_ltk, &keys.peer_ltk].into_iter().flatten() {
            write_ltk(&mut out, ltk);
        }
        for irk in [&keys.local_irk, &keys.peer_irk].into_iter().flatten() {
            out.extend_from_slice(irk.as_bytes());
        }
        for csrk in [&keys.local_csrk, &keys.peer_csrk].into_iter().flatten() {
            out.extend_from_slice(csrk.key.as_bytes());
            // Writing into a Vec cannot fail.
            let _ = out.write_u32::<LittleEndian>(csrk.sign_counter);
            out.push(csrk.authenticated as u8);
        }
        out
    }

    /// Decode a record produced by `to_bytes`
    ///
    /// The returned record has id 0; the store assigns one on `restore`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, StoreError> {
        let mut cursor = Cursor::new(data);
        let version = read_u8(&mut cursor)?;
        if version != BOND_RECORD_VERSION {
            return Err(StoreError::Corrupt("unknown record version"));
        }
        let addr_type = AddressType::try_from(read_u8(&mut cursor)?)
            .map_err(|_| StoreError::Corrupt("invalid address type"))?;
        let mut addr = [0u8; 6];
        cursor
            .read_exact(&mut addr)
            .map_err(|_| StoreError::Corrupt("truncated address"))?;
        let security_level = SecurityLevel::from_u8(read_u8(&mut cursor)?)
            .ok_or(StoreError::Corrupt("invalid security level"))?;
        let key_size = read_u8(&mut cursor)?;
        let bonded = read_u8(&mut cursor)? != 0;
        let present = read_u8(&mut cursor)?;
        let has = |bit: u8| present & (1 << bit) != 0;

        let mut keys = BondKeys::default();
        if has(0) {
            keys.local_ltk = Some(read_ltk(&mut cursor)?);
        }
        if has(1) {
            keys.peer_ltk = Some(read_ltk(&mut cursor)?);
        }
        if has(2) {
            keys.local_irk = Some(read_key(&mut cursor)?);
        }
        if has(3) {
            keys.peer_irk = Some(read_key(&mut cursor)?);
        }
        if has(4) {
            keys.local_csrk = Some(read_csrk(&mut cursor)?);
        }
        if has(5) {
            keys.peer_csrk = Some(read_csrk(&mut cursor)?);
        }
        if (cursor.position() as usize) != data.len() {
            return Err(StoreError::Corrupt("trailing bytes"));
        }

        Ok(Self {
            id: 0,
            identity: PeerAddress::new(addr_type, BdAddr::new(addr)),
            keys,
            security_level,
            key_size,
            bonded,
        })
    }
}

fn write_ltk(out: &mut Vec<u8>, ltk: &LongTermKey) {
    out.extend_from_slice(ltk.key.as_bytes());
    let _ = out.write_u16::<LittleEndian>(ltk.ediv);
    out.extend_from_slice(&ltk.rand);
    out.push(ltk.key_size);
    out.push((ltk.secure_connections as u8) | ((ltk.authenticated as u8) << 1));
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, StoreError> {
    cursor
        .read_u8()
        .map_err(|_| StoreError::Corrupt("truncated record"))
}

fn read_key(cursor: &mut Cursor<&[u8]>) -> Result<Key128, StoreError> {
    let mut key = [0u8; 16];
    cursor
        .read_exact(&mut key)
        .map_err(|_| StoreError::Corrupt("truncated key"))?;
    Ok(Key128(key))
}

fn read_ltk(cursor: &mut Cursor<&[u8]>) -> Result<LongTermKey, StoreError> {
    let key = read_key(cursor)?;
    let ediv = cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| StoreError::Corrupt("failed to read EDIV"))?;
    let mut rand = [0u8; 8];
    cursor
        .read_exact(&mut rand)
        .map_err(|_| StoreError::Corrupt("failed to read RAND"))?;
    let key_size = read_u8(cursor)?;
    let flags = read_u8(cursor)?;
    Ok(LongTermKey {
        key,
        ediv,
        rand,
        key_size,
        secure_connections: flags & 0x01 != 0,
        authenticated: flags & 0x02 != 0,
    })
}

fn read_csrk(cursor: &mut Cursor<&[u8]>) -> Result<SigningKey, StoreError> {
    let key = read_key(cursor)?;
    let sign_counter = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| StoreError::Corrupt("failed to read sign counter"))?;
    let authenticated = read_u8(cursor)? != 0;
    Ok(SigningKey {
        key,
        sign_counter,
        authenticated,
    })
}

#[derive(Debug)]
enum Slot {
    Live(BondRecord),
    /// Keys were phased out; the record may not be used or rebuilt until the
    /// deletion has reached persistence.
    PendingDeletion,
}

/// Bond records keyed by peer identity address
pub struct BondingStore {
    records: HashMap<BdAddr, Slot>,
    next_id: u64,
    persistence: Option<Box<dyn BondPersistence + Send>>,
}

impl Default for BondingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BondingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BondingStore")
            .field("records", &self.records)
            .field("persistent", &self.persistence.is_some())
            .finish()
    }
}

impl BondingStore {
    /// Create a store without durable backing
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            next_id: 1,
            persistence: None,
        }
    }

    /// Create a store that writes through to `persistence`
    pub fn with_persistence(persistence: Box<dyn BondPersistence + Send>) -> Self {
        Self {
            persistence: Some(persistence),
            ..Self::new()
        }
    }

    /// Load records read back from persistence at power-on
    pub fn restore(&mut self, records: impl IntoIterator<Item = BondRecord>) {
        for mut record in records {
            record.id = self.allocate_id();
            debug!("Restored bond for {}", record.identity);
            self.records
                .insert(record.identity.address, Slot::Live(record));
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Return the record for `identity`, allocating an empty one on a miss
    pub fn get_or_create(&mut self, identity: PeerAddress) -> Result<&BondRecord, StoreError> {
        self.apply_deletion(&identity.address)?;
        if !self.records.contains_key(&identity.address) {
            let record = BondRecord::empty(self.allocate_id(), identity);
            debug!("Allocated empty bond record {} for {}", record.id, identity);
            self.records
                .insert(identity.address, Slot::Live(record));
        }
        match self.records.get(&identity.address) {
            Some(Slot::Live(record)) => Ok(record),
            _ => Err(StoreError::PendingDeletion(identity.address)),
        }
    }

    /// Look up a live record without allocating
    pub fn lookup(&self, identity: &BdAddr) -> Option<&BondRecord> {
        match self.records.get(identity) {
            Some(Slot::Live(record)) => Some(record),
            _ => None,
        }
    }

    /// Whether a completed bond exists for `identity`
    pub fn is_bonded(&self, identity: &BdAddr) -> bool {
        self.lookup(identity).map_or(false, BondRecord::is_bonded)
    }

    /// Identities with a completed bond
    pub fn bonded_peers(&self) -> Vec<PeerAddress> {
        self.records
            .values()
            .filter_map(|slot| match slot {
                Slot::Live(record) if record.bonded => Some(record.identity),
                _ => None,
            })
            .collect()
    }

    /// Replace the key material for `identity` with the result of a bonding
    ///
    /// The new record is built from scratch. It reaches persistence before it
    /// replaces the in-memory copy, so on error the old record is unchanged.
    pub fn commit(
        &mut self,
        identity: PeerAddress,
        keys: BondKeys,
        security_level: SecurityLevel,
        key_size: u8,
    ) -> Result<&BondRecord, StoreError> {
        self.apply_deletion(&identity.address)?;

        let id = match self.records.get(&identity.address) {
            Some(Slot::Live(record)) => record.id,
            _ => self.allocate_id(),
        };
        let record = BondRecord {
            id,
            identity,
            keys,
            security_level,
            key_size,
            bonded: true,
        };

        if let Some(persistence) = self.persistence.as_mut() {
            persistence.store(&identity.address, &record.to_bytes())?;
        }

        info!(
            "Committed bond for {} (level {:?}, key size {})",
            identity, security_level, key_size
        );
        self.records.insert(identity.address, Slot::Live(record));
        match self.records.get(&identity.address) {
            Some(Slot::Live(record)) => Ok(record),
            _ => Err(StoreError::Corrupt("record vanished after commit")),
        }
    }

    /// Drop the empty record allocated for `address` if no bond completed
    /// under it
    pub fn discard_unbonded(&mut self, address: &BdAddr) {
        if matches!(self.records.get(address), Some(Slot::Live(record)) if !record.bonded) {
            self.records.remove(address);
            debug!("Dropped empty bond record for {}", address);
        }
    }

    /// Phase out the keys held for `identity`
    ///
    /// The record stops being visible immediately. Its deletion is retried
    /// before any later `get_or_create` or `commit` for the same address.
    pub fn invalidate(&mut self, identity: &BdAddr) -> Result<(), StoreError> {
        if !self.records.contains_key(identity) {
            debug!("Invalidate for unknown identity {}", identity);
            return Ok(());
        }
        info!("Keys for {} phased out", identity);
        self.records.insert(*identity, Slot::PendingDeletion);
        self.apply_deletion(identity)
    }

    /// Whether a phased-out record still awaits deletion
    pub fn is_pending_deletion(&self, identity: &BdAddr) -> bool {
        matches!(self.records.get(identity), Some(Slot::PendingDeletion))
    }

    fn apply_deletion(&mut self, identity: &BdAddr) -> Result<(), StoreError> {
        if !self.is_pending_deletion(identity) {
            return Ok(());
        }
        if let Some(persistence) = self.persistence.as_mut() {
            if let Err(err) = persistence.remove(identity) {
                warn!("Deleting phased-out keys for {} failed: {}", identity, err);
                return Err(StoreError::PendingDeletion(*identity));
            }
        }
        self.records.remove(identity);
        debug!("Phased-out keys for {} deleted", identity);
        Ok(())
    }

    /// Remove the bond with `identity`
    pub fn delete(&mut self, identity: &BdAddr) -> Result<Option<BondRecord>, StoreError> {
        if let Some(persistence) = self.persistence.as_mut() {
            persistence.remove(identity)?;
        }
        info!("Deleted bond for {}", identity);
        Ok(match self.records.remove(identity) {
            Some(Slot::Live(record)) => Some(record),
            _ => None,
        })
    }

    /// Remove every bond
    pub fn delete_all(&mut self) -> Result<(), StoreError> {
        if let Some(persistence) = self.persistence.as_mut() {
            persistence.clear()?;
        }
        info!("Deleted all {} bonds", self.records.len());
        self.records.clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
