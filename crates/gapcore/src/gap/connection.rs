//! Connection registry
//!
//! One entry per live connection handle. Entries appear on a successful
//! connection-complete indication and vanish on the disconnection-complete
//! indication, never earlier. Handles are chosen by the controller and may be
//! reused as soon as the old entry is gone.

use super::types::*;
use crate::error::{Error, Result};
use crate::hci::Status;
use crate::smp::SecurityLevel;
use log::{debug, warn};
use std::collections::HashMap;

/// Whether the link is up or a disconnect was accepted by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    /// The link stays usable until the disconnection-complete indication
    Disconnecting,
}

/// One active link-layer connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub handle: u16,
    pub role: Role,
    /// Address the connection was established with
    pub peer: PeerAddress,
    /// Identity address learned during bonding, if it differs from `peer`
    pub identity: Option<PeerAddress>,
    pub local_rpa: Option<BdAddr>,
    pub peer_rpa: Option<BdAddr>,
    pub params: LinkParameters,
    pub security: SecurityLevel,
    /// Encryption key size, 0 while unencrypted
    pub key_size: u8,
    pub phy: PhyPair,
    pub state: LinkState,
}

impl Connection {
    pub fn new(handle: u16, role: Role, peer: PeerAddress, params: LinkParameters) -> Self {
        Self {
            handle,
            role,
            peer,
            identity: None,
            local_rpa: None,
            peer_rpa: None,
            params,
            security: SecurityLevel::None,
            key_size: 0,
            phy: PhyPair::default(),
            state: LinkState::Connected,
        }
    }

    /// Address the peer's bond is filed under
    pub fn identity_address(&self) -> PeerAddress {
        self.identity.unwrap_or(self.peer)
    }

    /// Whether `addr` names this peer by either of its addresses
    pub fn matches(&self, addr: &BdAddr) -> bool {
        self.peer.address == *addr
            || self.identity.map_or(false, |id| id.address == *addr)
            || self.peer_rpa.map_or(false, |rpa| rpa == *addr)
    }
}

/// Registry of live connections keyed by handle
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<u16, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a link reported by a connection-complete indication
    pub fn on_connection_established(&mut self, connection: Connection) -> Result<()> {
        let handle = connection.handle;
        if self.connections.contains_key(&handle) {
            warn!("Connection complete for handle 0x{:04X} which is still registered", handle);
            return Err(Error::DuplicateHandle(handle));
        }
        debug!(
            "Registered handle 0x{:04X}: {:?} with {}",
            handle, connection.role, connection.peer
        );
        self.connections.insert(handle, connection);
        Ok(())
    }

    /// Apply parameters reported by an update-complete indication
    pub fn on_connection_updated(&mut self, handle: u16, params: LinkParameters) -> Result<()> {
        let connection = self.get_mut(handle)?;
        debug!(
            "Handle 0x{:04X} parameters {:?} -> {:?}",
            handle, connection.params, params
        );
        connection.params = params;
        Ok(())
    }

    /// Remove the link; a missing entry is not an error
    pub fn on_disconnected(&mut self, handle: u16, reason: Status) -> Option<Connection> {
        let removed = self.connections.remove(&handle);
        match &removed {
            Some(connection) => debug!(
                "Removed handle 0x{:04X} ({}): {}",
                handle, connection.peer, reason
            ),
            None => debug!("Disconnect for unregistered handle 0x{:04X}", handle),
        }
        removed
    }

    pub fn lookup(&self, handle: u16) -> Option<&Connection> {
        self.connections.get(&handle)
    }

    pub fn lookup_by_address(&self, addr: &BdAddr) -> Option<&Connection> {
        self.connections.values().find(|c| c.matches(addr))
    }

    pub fn contains(&self, handle: u16) -> bool {
        self.connections.contains_key(&handle)
    }

    pub fn set_security(&mut self, handle: u16, level: SecurityLevel, key_size: u8) -> Result<()> {
        let connection = self.get_mut(handle)?;
        if connection.security != level {
            debug!(
                "Handle 0x{:04X} security {:?} -> {:?}",
                handle, connection.security, level
            );
        }
        connection.security = level;
        connection.key_size = key_size;
        Ok(())
    }

    pub fn set_identity(&mut self, handle: u16, identity: PeerAddress) -> Result<()> {
        let connection = self.get_mut(handle)?;
        if identity != connection.peer {
            connection.identity = Some(identity);
        }
        Ok(())
    }

    pub fn set_phy(&mut self, handle: u16, phy: PhyPair) -> Result<()> {
        self.get_mut(handle)?.phy = phy;
        Ok(())
    }

    pub fn set_state(&mut self, handle: u16, state: LinkState) -> Result<()> {
        self.get_mut(handle)?.state = state;
        Ok(())
    }

    pub fn handles(&self) -> Vec<u16> {
        let mut handles: Vec<u16> = self.connections.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn clear(&mut self) {
        self.connections.clear();
    }

    fn get_mut(&mut self, handle: u16) -> Result<&mut Connection> {
        self.connections
            .get_mut(&handle)
            .ok_or(Error::UnknownHandle(handle))
    }
}
