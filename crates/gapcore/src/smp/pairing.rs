//! Pairing method selection and per-link pairing state
//!
//! The method is a pure function of the two capability exchanges. Each
//! bonding attempt on a link is tracked by one `PairingProcess` that walks
//! `BondingStarted -> IoCapabilityExchanged -> MethodSelected ->
//! KeyExchange|Encrypting -> BondingComplete`, or drops to `BondingFailed`
//! from any of them.

use super::keys::*;
use super::types::*;
use crate::gap::PeerAddress;
use log::debug;
use std::fmt;
use std::time::Instant;

/// Pairing method, with the LE Secure Connections variant of each family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingMethod {
    JustWorks,
    /// The local user types the passkey shown by the peer
    PasskeyInput,
    /// The local device shows a passkey the peer types
    PasskeyDisplay,
    OutOfBand,
    LescJustWorks,
    /// Just Works with a displayed value both users confirm
    LescNumericComparison,
    LescPasskeyInput,
    LescPasskeyDisplay,
    LescOutOfBand,
}

/// Method family shared by a legacy method and its LESC variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodFamily {
    JustWorks,
    PasskeyInput,
    PasskeyDisplay,
    OutOfBand,
}

impl PairingMethod {
    pub fn family(&self) -> MethodFamily {
        match self {
            PairingMethod::JustWorks
            | PairingMethod::LescJustWorks
            | PairingMethod::LescNumericComparison => MethodFamily::JustWorks,
            PairingMethod::PasskeyInput | PairingMethod::LescPasskeyInput => {
                MethodFamily::PasskeyInput
            }
            PairingMethod::PasskeyDisplay | PairingMethod::LescPasskeyDisplay => {
                MethodFamily::PasskeyDisplay
            }
            PairingMethod::OutOfBand | PairingMethod::LescOutOfBand => MethodFamily::OutOfBand,
        }
    }

    pub fn is_secure_connections(&self) -> bool {
        matches!(
            self,
            PairingMethod::LescJustWorks
                | PairingMethod::LescNumericComparison
                | PairingMethod::LescPasskeyInput
                | PairingMethod::LescPasskeyDisplay
                | PairingMethod::LescOutOfBand
        )
    }

    /// Whether the method protects against a man in the middle
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, PairingMethod::JustWorks | PairingMethod::LescJustWorks)
    }

    /// Security level a link reaches once paired with this method
    pub fn security_level(&self) -> SecurityLevel {
        match (self.is_secure_connections(), self.is_authenticated()) {
            (true, true) => SecurityLevel::AuthenticatedSecureConnections,
            (false, true) => SecurityLevel::Authenticated,
            (_, false) => SecurityLevel::Unauthenticated,
        }
    }

    fn from_family(family: MethodFamily, secure_connections: bool) -> Self {
        match (family, secure_connections) {
            (MethodFamily::JustWorks, false) => PairingMethod::JustWorks,
            (MethodFamily::JustWorks, true) => PairingMethod::LescJustWorks,
            (MethodFamily::PasskeyInput, false) => PairingMethod::PasskeyInput,
            (MethodFamily::PasskeyInput, true) => PairingMethod::LescPasskeyInput,
            (MethodFamily::PasskeyDisplay, false) => PairingMethod::PasskeyDisplay,
            (MethodFamily::PasskeyDisplay, true) => PairingMethod::LescPasskeyDisplay,
            (MethodFamily::OutOfBand, false) => PairingMethod::OutOfBand,
            (MethodFamily::OutOfBand, true) => PairingMethod::LescOutOfBand,
        }
    }
}

impl fmt::Display for PairingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.family() {
            MethodFamily::JustWorks if *self == PairingMethod::LescNumericComparison => {
                "Numeric Comparison"
            }
            MethodFamily::JustWorks => "Just Works",
            MethodFamily::PasskeyInput => "Passkey Input",
            MethodFamily::PasskeyDisplay => "Passkey Display",
            MethodFamily::OutOfBand => "Out of Band",
        };
        if self.is_secure_connections() {
            write!(f, "{} (LE Secure Connections)", name)
        } else {
            f.write_str(name)
        }
    }
}

/// Who enters or shows the passkey, from the capability table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assignment {
    JustWorks,
    InitiatorDisplays,
    ResponderDisplays,
    BothInput,
    NumericComparison,
}

/// Core Vol 3, Part H, Table 2.8 (rows: initiator, columns: responder)
fn capability_table(
    initiator: IoCapability,
    responder: IoCapability,
    secure_connections: bool,
) -> Assignment {
    use IoCapability::*;

    let comparison_or = |legacy| {
        if secure_connections {
            Assignment::NumericComparison
        } else {
            legacy
        }
    };

    match (initiator, responder) {
        (NoInputNoOutput, _) | (_, NoInputNoOutput) => Assignment::JustWorks,
        (DisplayOnly, DisplayOnly) | (DisplayOnly, DisplayYesNo) | (DisplayYesNo, DisplayOnly) => {
            Assignment::JustWorks
        }
        (DisplayYesNo, DisplayYesNo) => comparison_or(Assignment::JustWorks),
        (KeyboardOnly, KeyboardOnly) => Assignment::BothInput,
        (KeyboardOnly, _) => Assignment::ResponderDisplays,
        (_, KeyboardOnly) => Assignment::InitiatorDisplays,
        (DisplayOnly, KeyboardDisplay) => Assignment::InitiatorDisplays,
        (KeyboardDisplay, DisplayOnly) => Assignment::ResponderDisplays,
        (DisplayYesNo, KeyboardDisplay) => comparison_or(Assignment::InitiatorDisplays),
        (KeyboardDisplay, DisplayYesNo) => comparison_or(Assignment::ResponderDisplays),
        (KeyboardDisplay, KeyboardDisplay) => comparison_or(Assignment::InitiatorDisplays),
    }
}

/// Select the pairing method from both capability exchanges
///
/// The result is expressed from the point of view of `local_role`: a passkey
/// the local side must type is `PasskeyInput`, one it must show is
/// `PasskeyDisplay`.
pub fn select_pairing_method(
    initiator: &PairingFeatures,
    responder: &PairingFeatures,
    local_role: PairingRole,
) -> PairingMethod {
    let secure_connections = initiator.auth_req.contains(AuthReq::SECURE_CONNECTIONS)
        && responder.auth_req.contains(AuthReq::SECURE_CONNECTIONS);

    let oob = if secure_connections {
        initiator.oob_data_present || responder.oob_data_present
    } else {
        initiator.oob_data_present && responder.oob_data_present
    };
    if oob {
        return PairingMethod::from_family(MethodFamily::OutOfBand, secure_connections);
    }

    let mitm =
        initiator.auth_req.contains(AuthReq::MITM) || responder.auth_req.contains(AuthReq::MITM);
    if !mitm {
        return PairingMethod::from_family(MethodFamily::JustWorks, secure_connections);
    }

    let family = match capability_table(
        initiator.io_capability,
        responder.io_capability,
        secure_connections,
    ) {
        Assignment::NumericComparison => return PairingMethod::LescNumericComparison,
        Assignment::JustWorks => MethodFamily::JustWorks,
        Assignment::BothInput => MethodFamily::PasskeyInput,
        Assignment::InitiatorDisplays => match local_role {
            PairingRole::Initiator => MethodFamily::PasskeyDisplay,
            PairingRole::Responder => MethodFamily::PasskeyInput,
        },
        Assignment::ResponderDisplays => match local_role {
            PairingRole::Initiator => MethodFamily::PasskeyInput,
            PairingRole::Responder => MethodFamily::PasskeyDisplay,
        },
    };
    PairingMethod::from_family(family, secure_connections)
}

/// Bonding state of one link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondingState {
    NoSecurity,
    BondingStarted,
    IoCapabilityExchanged,
    MethodSelected,
    KeyExchange,
    Encrypting,
    BondingComplete,
    BondingFailed,
}

impl BondingState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BondingState::NoSecurity | BondingState::BondingComplete | BondingState::BondingFailed
        )
    }
}

/// Input the state machine is suspended on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserWait {
    Passkey,
    Confirm(u32),
}

/// One bonding attempt on one link
#[derive(Debug, Clone)]
pub struct PairingProcess {
    pub handle: u16,
    /// Peer address the link was established with
    pub peer: PeerAddress,
    pub role: PairingRole,
    pub state: BondingState,
    pub previously_bonded: bool,
    /// Local half of the exchange, fixed for the whole attempt
    pub local_features: PairingFeatures,
    pub remote_features: Option<PairingFeatures>,
    pub method: Option<PairingMethod>,
    pub key_size: u8,
    /// Passkey currently shown to the user
    pub displayed_passkey: Option<u32>,
    pub waiting: Option<(UserWait, Instant)>,
    pub local_keys: Option<LocalKeys>,
    pub peer_keys: PeerKeys,
    pub encrypted: bool,
    pub started: Instant,
}

impl PairingProcess {
    pub fn new(
        handle: u16,
        peer: PeerAddress,
        role: PairingRole,
        previously_bonded: bool,
        local_features: PairingFeatures,
        now: Instant,
    ) -> Self {
        Self {
            handle,
            peer,
            role,
            state: BondingState::BondingStarted,
            previously_bonded,
            local_features,
            remote_features: None,
            method: None,
            key_size: 0,
            displayed_passkey: None,
            waiting: None,
            local_keys: None,
            peer_keys: PeerKeys::default(),
            encrypted: false,
            started: now,
        }
    }

    pub fn transition(&mut self, next: BondingState) {
        debug!(
            "[smp][handle 0x{:04X}] {:?} -> {:?}",
            self.handle, self.state, next
        );
        self.state = next;
    }

    /// Record the peer's features and select the method
    pub fn exchange(
        &mut self,
        remote: PairingFeatures,
        min_key_size: u8,
    ) -> Result<PairingMethod, SecurityFailure> {
        self.remote_features = Some(remote);
        self.transition(BondingState::IoCapabilityExchanged);

        let key_size = self.local_features.max_key_size.min(remote.max_key_size);
        if key_size < min_key_size {
            return Err(SecurityFailure::EncryptionKeySize);
        }
        self.key_size = key_size;

        let method = match self.role {
            PairingRole::Initiator => {
                select_pairing_method(&self.local_features, &remote, self.role)
            }
            PairingRole::Responder => {
                select_pairing_method(&remote, &self.local_features, self.role)
            }
        };
        if self.local_features.auth_req.contains(AuthReq::MITM) && !method.is_authenticated() {
            return Err(SecurityFailure::AuthenticationRequirements);
        }
        self.method = Some(method);
        self.transition(BondingState::MethodSelected);
        Ok(method)
    }

    /// Keys the local side distributes, agreed by both sides
    pub fn local_distribution(&self) -> KeyDistribution {
        let remote = match &self.remote_features {
            Some(remote) => remote,
            None => return KeyDistribution::empty(),
        };
        match self.role {
            PairingRole::Initiator => {
                self.local_features.initiator_key_dist & remote.initiator_key_dist
            }
            PairingRole::Responder => {
                self.local_features.responder_key_dist & remote.responder_key_dist
            }
        }
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.method
            .map_or(SecurityLevel::None, |method| method.security_level())
    }

    /// Identity the bond is filed under
    pub fn identity(&self) -> PeerAddress {
        self.peer_keys.identity.unwrap_or(self.peer)
    }

    /// Merge a batch of keys received from the peer
    pub fn absorb_peer_keys(&mut self, keys: PeerKeys) {
        if keys.ltk.is_some() {
            self.peer_keys.ltk = keys.ltk;
        }
        if keys.irk.is_some() {
            self.peer_keys.irk = keys.irk;
        }
        if keys.identity.is_some() {
            self.peer_keys.identity = keys.identity;
        }
        if keys.csrk.is_some() {
            self.peer_keys.csrk = keys.csrk;
        }
    }

    /// Everything this attempt has to commit
    pub fn bond_keys(&self) -> BondKeys {
        let authenticated = self.method.map_or(false, |m| m.is_authenticated());
        let local = self.local_keys.clone().unwrap_or_default();
        BondKeys {
            local_ltk: local.ltk,
            peer_ltk: self.peer_keys.ltk,
            local_irk: local.irk,
            peer_irk: self.peer_keys.irk,
            local_csrk: local.csrk,
            peer_csrk: self
                .peer_keys
                .csrk
                .map(|key| SigningKey::new(key, authenticated)),
        }
    }
}
