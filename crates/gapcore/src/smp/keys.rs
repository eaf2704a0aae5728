//! Key material exchanged and stored by the Security Manager
//!
//! Long Term Keys (LTK), Identity Resolving Keys (IRK) and Connection
//! Signature Resolving Keys (CSRK), plus the bundles that move them between
//! the pairing state machine and the bonding store.

use super::types::*;
use crate::gap::PeerAddress;
use rand::RngCore;
use std::fmt;
use std::str::FromStr;

/// A 128-bit key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Key128(pub [u8; 16]);

impl Key128 {
    /// Generate a random key
    pub fn random() -> Self {
        let mut key = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Key128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

// Keys never show up in logs in full.
impl fmt::Debug for Key128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key128({}..)", hex::encode(&self.0[..2]))
    }
}

impl FromStr for Key128 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut key = [0u8; 16];
        hex::decode_to_slice(s, &mut key)?;
        Ok(Self(key))
    }
}

/// Long Term Key (LTK) information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongTermKey {
    pub key: Key128,
    /// EDIV (Encrypted Diversifier), zero for Secure Connections
    pub ediv: u16,
    /// RAND (Random number), zero for Secure Connections
    pub rand: [u8; 8],
    /// Negotiated encryption key size
    pub key_size: u8,
    /// Whether this key was generated with Secure Connections pairing
    pub secure_connections: bool,
    /// Whether the pairing method gave MITM protection
    pub authenticated: bool,
}

impl LongTermKey {
    /// Generate a legacy-pairing LTK with fresh EDIV/Rand
    pub fn generate_legacy(key_size: u8, authenticated: bool) -> Self {
        let mut rng = rand::thread_rng();
        let mut rand = [0u8; 8];
        rng.fill_bytes(&mut rand);
        Self {
            key: Key128::random(),
            ediv: (rng.next_u32() & 0xFFFF) as u16,
            rand,
            key_size,
            secure_connections: false,
            authenticated,
        }
    }

    /// Wrap the LTK derived during Secure Connections pairing
    pub fn secure_connections(key: Key128, key_size: u8, authenticated: bool) -> Self {
        Self {
            key,
            ediv: 0,
            rand: [0; 8],
            key_size,
            secure_connections: true,
            authenticated,
        }
    }

    /// Get the security level provided by this key
    pub fn security_level(&self) -> SecurityLevel {
        match (self.secure_connections, self.authenticated) {
            (true, true) => SecurityLevel::AuthenticatedSecureConnections,
            (_, true) => SecurityLevel::Authenticated,
            (_, false) => SecurityLevel::Unauthenticated,
        }
    }
}

/// Connection Signature Resolving Key (CSRK) with its sign counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningKey {
    pub key: Key128,
    pub sign_counter: u32,
    pub authenticated: bool,
}

impl SigningKey {
    pub fn new(key: Key128, authenticated: bool) -> Self {
        Self {
            key,
            sign_counter: 0,
            authenticated,
        }
    }
}

/// Keys the local device hands to the peer during key distribution
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalKeys {
    pub ltk: Option<LongTermKey>,
    pub irk: Option<Key128>,
    pub csrk: Option<SigningKey>,
}

impl LocalKeys {
    /// Generate the keys selected by `dist`
    ///
    /// With Secure Connections both sides derive the same LTK, so no local
    /// LTK is generated even if the encryption-key bit is set.
    pub fn generate(
        dist: KeyDistribution,
        identity_key: Key128,
        secure_connections: bool,
        key_size: u8,
        authenticated: bool,
    ) -> Self {
        let ltk = (dist.contains(KeyDistribution::ENC_KEY) && !secure_connections)
            .then(|| LongTermKey::generate_legacy(key_size, authenticated));
        let irk = dist.contains(KeyDistribution::ID_KEY).then_some(identity_key);
        let csrk = dist
            .contains(KeyDistribution::SIGN_KEY)
            .then(|| SigningKey::new(Key128::random(), authenticated));
        Self { ltk, irk, csrk }
    }
}

/// Keys received from the peer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeerKeys {
    pub ltk: Option<LongTermKey>,
    pub irk: Option<Key128>,
    /// Identity address sent alongside the IRK
    pub identity: Option<PeerAddress>,
    pub csrk: Option<Key128>,
}

/// Everything a successful bonding commits for one peer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BondKeys {
    pub local_ltk: Option<LongTermKey>,
    pub peer_ltk: Option<LongTermKey>,
    pub local_irk: Option<Key128>,
    pub peer_irk: Option<Key128>,
    pub local_csrk: Option<SigningKey>,
    pub peer_csrk: Option<SigningKey>,
}

impl BondKeys {
    pub fn is_empty(&self) -> bool {
        self.local_ltk.is_none()
            && self.peer_ltk.is_none()
            && self.local_irk.is_none()
            && self.peer_irk.is_none()
            && self.local_csrk.is_none()
            && self.peer_csrk.is_none()
    }

    /// LTK to use when re-encrypting a link to this peer
    pub fn encryption_key(&self, local_role: PairingRole) -> Option<&LongTermKey> {
        // Secure Connections LTKs are shared; legacy keys are used by the
        // central with the key the peripheral distributed.
        match local_role {
            PairingRole::Initiator => self.peer_ltk.as_ref().or(self.local_ltk.as_ref()),
            PairingRole::Responder => self.local_ltk.as_ref().or(self.peer_ltk.as_ref()),
        }
    }
}
