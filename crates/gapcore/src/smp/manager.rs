//! Security state machine
//!
//! Runs one `PairingProcess` per link: capability exchange, method
//! selection, user interaction, key exchange and the final commit into the
//! bonding store. The cryptography itself happens below the `Transport`; this
//! layer decides what happens next and when the result may be trusted.

use super::bonding::*;
use super::constants::*;
use super::keys::*;
use super::pairing::*;
use super::types::*;
use crate::error::{Error, Result};
use crate::gap::{BdAddr, ConnectionRegistry, LinkState, PeerAddress, Role};
use crate::hci::{Command, Outbox, Status};
use crate::host::{HostConfig, HostEvent, Operation};
use log::{debug, info, warn};
use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// What to do when bonding starts with a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BondingDecision {
    /// Run a full pairing
    #[default]
    Pair,
    /// Skip pairing and encrypt with the stored LTK, if there is one
    EncryptWithStoredKey,
}

/// Application-supplied security configuration
///
/// The features returned by `local_features` are copied into the pairing
/// attempt when it starts and read from that copy for the rest of the
/// exchange.
pub trait SecurityProvider {
    /// Local IO capability, OOB flag, auth bits and key distribution
    fn local_features(&self, handle: u16) -> PairingFeatures;

    /// Called when bonding starts, with whether the peer was bonded before
    fn bonding_decision(&self, _handle: u16, _previously_bonded: bool) -> BondingDecision {
        BondingDecision::Pair
    }

    /// OOB data for the link, if the application has any
    fn oob_data(&self, _handle: u16) -> Option<OobData> {
        None
    }
}

/// Provider answering every link with the same configuration
#[derive(Debug, Clone, Default)]
pub struct FixedSecurity {
    pub features: PairingFeatures,
    /// Decision used when the peer was bonded before
    pub when_bonded: BondingDecision,
    pub oob: Option<OobData>,
}

impl SecurityProvider for FixedSecurity {
    fn local_features(&self, _handle: u16) -> PairingFeatures {
        self.features
    }

    fn bonding_decision(&self, _handle: u16, previously_bonded: bool) -> BondingDecision {
        if previously_bonded {
            self.when_bonded
        } else {
            BondingDecision::Pair
        }
    }

    fn oob_data(&self, _handle: u16) -> Option<OobData> {
        self.oob.clone()
    }
}

/// Shared state the security machine reads and mutates
pub struct SecurityContext<'a> {
    pub outbox: &'a mut Outbox,
    pub registry: &'a mut ConnectionRegistry,
    pub store: &'a mut BondingStore,
    pub provider: &'a dyn SecurityProvider,
}

#[derive(Debug)]
pub struct SmpManager {
    secure_connections: bool,
    min_key_size: u8,
    max_key_size: u8,
    user_response_timeout: Duration,
    cooldown: Duration,
    identity_key: Key128,
    processes: HashMap<u16, PairingProcess>,
    /// Peers refused until the given instant after a repeated-attempts failure
    cooldowns: HashMap<BdAddr, Instant>,
}

impl SmpManager {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            secure_connections: config.secure_connections,
            min_key_size: config.min_key_size,
            max_key_size: config.max_key_size,
            user_response_timeout: config.user_response_timeout,
            cooldown: config.repeated_attempts_cooldown,
            identity_key: config.identity_key.unwrap_or_else(Key128::random),
            processes: HashMap::new(),
            cooldowns: HashMap::new(),
        }
    }

    pub fn bonding_state(&self, handle: u16) -> BondingState {
        self.processes
            .get(&handle)
            .map_or(BondingState::NoSecurity, |p| p.state)
    }

    pub fn process(&self, handle: u16) -> Option<&PairingProcess> {
        self.processes.get(&handle)
    }

    fn is_active(&self, handle: u16) -> bool {
        !self.bonding_state(handle).is_terminal()
    }

    /// Start bonding on a live link
    ///
    /// As central this sends a pairing request (or starts encryption with a
    /// stored key); as peripheral it sends a security request.
    pub fn bond(&mut self, ctx: &mut SecurityContext<'_>, handle: u16) -> Result<()> {
        let connection = ctx
            .registry
            .lookup(handle)
            .ok_or(Error::UnknownHandle(handle))?;
        if connection.state == LinkState::Disconnecting {
            return Err(Error::CommandDisallowed("link is disconnecting"));
        }
        if self.is_active(handle) {
            return Err(Error::Busy);
        }
        let peer = connection.identity_address();
        let role = match connection.role {
            Role::Central => PairingRole::Initiator,
            Role::Peripheral => PairingRole::Responder,
        };
        let now = Instant::now();
        self.check_cooldown(&peer.address, now)?;
        self.start(ctx, handle, peer, role, now)
    }

    fn start(
        &mut self,
        ctx: &mut SecurityContext<'_>,
        handle: u16,
        peer: PeerAddress,
        role: PairingRole,
        now: Instant,
    ) -> Result<()> {
        let previously_bonded = ctx.store.get_or_create(peer)?.is_bonded();
        let features = self.adjust_features(ctx.provider.local_features(handle));
        let mut process =
            PairingProcess::new(handle, peer, role, previously_bonded, features, now);

        let stored_key = match ctx.provider.bonding_decision(handle, previously_bonded) {
            BondingDecision::EncryptWithStoredKey if role == PairingRole::Initiator => ctx
                .store
                .lookup(&peer.address)
                .and_then(|record| record.keys().encryption_key(role).copied()),
            _ => None,
        };

        match stored_key {
            Some(ltk) => {
                ctx.outbox.send(Command::StartEncryption { handle, ltk })?;
                process.key_size = ltk.key_size;
                process.transition(BondingState::Encrypting);
            }
            None if role == PairingRole::Initiator => {
                ctx.outbox.send(Command::PairingRequest { handle, features })?;
            }
            None => {
                ctx.outbox.send(Command::SecurityRequest {
                    handle,
                    auth_req: features.auth_req,
                })?;
            }
        }
        self.register(ctx.outbox, process);
        Ok(())
    }

    fn register(&mut self, out: &mut Outbox, process: PairingProcess) {
        info!(
            "Bonding started with {} on handle 0x{:04X} (previously bonded: {})",
            process.peer, process.handle, process.previously_bonded
        );
        out.notify(HostEvent::BondingStarted {
            handle: process.handle,
            peer: process.peer,
            previously_bonded: process.previously_bonded,
        });
        self.processes.insert(process.handle, process);
    }

    fn adjust_features(&self, mut features: PairingFeatures) -> PairingFeatures {
        if !self.secure_connections {
            features.auth_req.remove(AuthReq::SECURE_CONNECTIONS);
        }
        features.max_key_size = features
            .max_key_size
            .clamp(self.min_key_size, self.max_key_size);
        features
    }

    #[cfg(test)]
    pub(crate) fn cooldown_entries(&self) -> usize {
        self.cooldowns.len()
    }

    fn check_cooldown(&mut self, peer: &BdAddr, now: Instant) -> Result<()> {
        match self.cooldowns.get(peer) {
            Some(until) if now < *until => {
                debug!("Bonding with {} refused during cool-down", peer);
                Err(SecurityFailure::RepeatedAttempts.into())
            }
            Some(_) => {
                self.cooldowns.remove(peer);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// A peer peripheral asks us to secure the link
    pub fn on_security_request(
        &mut self,
        ctx: &mut SecurityContext<'_>,
        handle: u16,
        auth_req: AuthReq,
    ) -> Result<()> {
        let connection = match ctx.registry.lookup(handle) {
            Some(connection) => connection,
            None => {
                warn!("Security request on unknown handle 0x{:04X}", handle);
                return Ok(());
            }
        };
        if connection.role != Role::Central {
            warn!("Security request on 0x{:04X} where we are peripheral", handle);
            return Ok(());
        }
        if self.is_active(handle) {
            debug!("Security request on 0x{:04X} while bonding; ignored", handle);
            return Ok(());
        }
        debug!("Security request on 0x{:04X}: {:?}", handle, auth_req);

        let peer = connection.identity_address();
        let now = Instant::now();
        if self.check_cooldown(&peer.address, now).is_err() {
            return ctx.outbox.send(Command::PairingFailed {
                handle,
                reason: SecurityFailure::RepeatedAttempts,
            });
        }
        self.start(ctx, handle, peer, PairingRole::Initiator, now)
    }

    /// A central sent us its pairing request
    pub fn on_pairing_request(
        &mut self,
        ctx: &mut SecurityContext<'_>,
        handle: u16,
        remote: PairingFeatures,
    ) -> Result<()> {
        let connection = match ctx.registry.lookup(handle) {
            Some(connection) => connection,
            None => {
                warn!("Pairing request on unknown handle 0x{:04X}", handle);
                return Ok(());
            }
        };
        if connection.role != Role::Peripheral {
            warn!("Pairing request on 0x{:04X} where we are central", handle);
            return ctx.outbox.send(Command::PairingFailed {
                handle,
                reason: SecurityFailure::PairingNotSupported,
            });
        }
        let peer = connection.identity_address();

        match self.processes.get(&handle).map(|p| (p.state, p.role)) {
            // Answer to our own security request
            Some((BondingState::BondingStarted, PairingRole::Responder)) => {}
            Some((state, _)) if !state.is_terminal() => {
                warn!("Pairing request on 0x{:04X} during {:?}; ignored", handle, state);
                return Ok(());
            }
            _ => {
                let now = Instant::now();
                if self.check_cooldown(&peer.address, now).is_err() {
                    return ctx.outbox.send(Command::PairingFailed {
                        handle,
                        reason: SecurityFailure::RepeatedAttempts,
                    });
                }
                let previously_bonded = ctx.store.get_or_create(peer)?.is_bonded();
                let features = self.adjust_features(ctx.provider.local_features(handle));
                let process = PairingProcess::new(
                    handle,
                    peer,
                    PairingRole::Responder,
                    previously_bonded,
                    features,
                    now,
                );
                self.register(ctx.outbox, process);
            }
        }
        self.exchange(ctx, handle, remote)
    }

    /// The peer answered our pairing request
    pub fn on_pairing_response(
        &mut self,
        ctx: &mut SecurityContext<'_>,
        handle: u16,
        remote: PairingFeatures,
    ) -> Result<()> {
        match self.processes.get(&handle).map(|p| (p.state, p.role)) {
            Some((BondingState::BondingStarted, PairingRole::Initiator)) => {
                self.exchange(ctx, handle, remote)
            }
            other => {
                warn!(
                    "Unexpected pairing response on 0x{:04X} ({:?})",
                    handle, other
                );
                Ok(())
            }
        }
    }

    fn exchange(
        &mut self,
        ctx: &mut SecurityContext<'_>,
        handle: u16,
        remote: PairingFeatures,
    ) -> Result<()> {
        let min_key_size = self.min_key_size;
        let (selected, role, features) = match self.processes.get_mut(&handle) {
            Some(process) => (
                process.exchange(remote, min_key_size),
                process.role,
                process.local_features,
            ),
            None => return Ok(()),
        };
        let method = match selected {
            Ok(method) => method,
            Err(failure) => {
                self.fail(ctx.outbox, handle, failure.into(), Some(failure));
                return Ok(());
            }
        };
        debug!("Handle 0x{:04X} selected {}", handle, method);

        if role == PairingRole::Responder {
            if let Err(err) = ctx.outbox.send(Command::PairingResponse { handle, features }) {
                self.fail(ctx.outbox, handle, err, None);
                return Ok(());
            }
        }
        self.run_method(ctx, handle, method);
        Ok(())
    }

    fn run_method(&mut self, ctx: &mut SecurityContext<'_>, handle: u16, method: PairingMethod) {
        let sent = match method.family() {
            MethodFamily::JustWorks => self.send_key_exchange(ctx.outbox, handle, None, None),
            MethodFamily::OutOfBand => match ctx.provider.oob_data(handle) {
                Some(oob) => self.send_key_exchange(ctx.outbox, handle, None, Some(oob)),
                None => {
                    let failure = SecurityFailure::OobNotAvailable;
                    self.fail(ctx.outbox, handle, failure.into(), Some(failure));
                    return;
                }
            },
            MethodFamily::PasskeyDisplay => {
                let passkey = rand::thread_rng().gen_range(0..=SMP_PASSKEY_MAX);
                if let Some(process) = self.processes.get_mut(&handle) {
                    process.displayed_passkey = Some(passkey);
                }
                ctx.outbox.notify(HostEvent::PasskeyDisplay { handle, passkey });
                self.send_key_exchange(ctx.outbox, handle, Some(passkey), None)
            }
            MethodFamily::PasskeyInput => {
                let deadline = Instant::now() + self.user_response_timeout;
                if let Some(process) = self.processes.get_mut(&handle) {
                    process.waiting = Some((UserWait::Passkey, deadline));
                }
                ctx.outbox.notify(HostEvent::PasskeyRequest { handle });
                return;
            }
        };
        if let Err(err) = sent {
            self.fail(ctx.outbox, handle, err, None);
        }
    }

    fn send_key_exchange(
        &mut self,
        out: &mut Outbox,
        handle: u16,
        passkey: Option<u32>,
        oob: Option<OobData>,
    ) -> Result<()> {
        let process = match self.processes.get_mut(&handle) {
            Some(process) => process,
            None => return Err(Error::UnknownHandle(handle)),
        };
        let method = process
            .method
            .ok_or(Error::CommandDisallowed("no pairing method selected"))?;
        out.send(Command::StartKeyExchange {
            handle,
            method,
            passkey,
            oob,
        })?;
        process.waiting = None;
        process.transition(BondingState::KeyExchange);
        Ok(())
    }

    /// Take the user's answer to a passkey request; `None` rejects
    pub fn reply_passkey(
        &mut self,
        ctx: &mut SecurityContext<'_>,
        handle: u16,
        passkey: Option<u32>,
    ) -> Result<()> {
        if !ctx.registry.contains(handle) {
            return Err(Error::UnknownHandle(handle));
        }
        let deadline = match self.processes.get(&handle).and_then(|p| p.waiting) {
            Some((UserWait::Passkey, deadline)) => deadline,
            _ => {
                warn!("Passkey reply on 0x{:04X} with no request pending; ignored", handle);
                return Ok(());
            }
        };
        if Instant::now() >= deadline {
            warn!("Passkey reply on 0x{:04X} arrived after the timeout; ignored", handle);
            self.expire(ctx.outbox, handle);
            return Ok(());
        }
        match passkey {
            None => {
                let failure = SecurityFailure::UserRejected;
                self.fail(ctx.outbox, handle, failure.into(), Some(failure));
                Ok(())
            }
            Some(passkey) if passkey > SMP_PASSKEY_MAX => {
                Err(Error::CommandDisallowed("passkey out of range"))
            }
            Some(passkey) => self.send_key_exchange(ctx.outbox, handle, Some(passkey), None),
        }
    }

    /// The exchange produced a value both users must compare
    pub fn on_numeric_comparison(
        &mut self,
        ctx: &mut SecurityContext<'_>,
        handle: u16,
        value: u32,
    ) -> Result<()> {
        let deadline = Instant::now() + self.user_response_timeout;
        match self.processes.get_mut(&handle) {
            Some(process)
                if process.state == BondingState::KeyExchange
                    && process.method == Some(PairingMethod::LescNumericComparison) =>
            {
                process.waiting = Some((UserWait::Confirm(value), deadline));
                ctx.outbox.notify(HostEvent::ConfirmRequest { handle, value });
            }
            _ => warn!("Numeric comparison on 0x{:04X} outside of pairing", handle),
        }
        Ok(())
    }

    /// Take the user's yes/no for a numeric comparison
    pub fn reply_user_confirm(
        &mut self,
        ctx: &mut SecurityContext<'_>,
        handle: u16,
        accept: bool,
    ) -> Result<()> {
        if !ctx.registry.contains(handle) {
            return Err(Error::UnknownHandle(handle));
        }
        let deadline = match self.processes.get(&handle).and_then(|p| p.waiting) {
            Some((UserWait::Confirm(_), deadline)) => deadline,
            _ => {
                warn!("Confirm reply on 0x{:04X} with no request pending; ignored", handle);
                return Ok(());
            }
        };
        if Instant::now() >= deadline {
            warn!("Confirm reply on 0x{:04X} arrived after the timeout; ignored", handle);
            self.expire(ctx.outbox, handle);
            return Ok(());
        }
        ctx.outbox.send(Command::UserConfirmReply { handle, accept })?;
        if accept {
            if let Some(process) = self.processes.get_mut(&handle) {
                process.waiting = None;
            }
        } else {
            self.fail(ctx.outbox, handle, SecurityFailure::UserRejected.into(), None);
        }
        Ok(())
    }

    pub fn on_encryption_change(
        &mut self,
        ctx: &mut SecurityContext<'_>,
        handle: u16,
        status: Status,
        enabled: bool,
    ) -> Result<()> {
        let state = self.processes.get(&handle).map(|p| p.state);
        if !status.is_success() {
            match state {
                Some(state) if !state.is_terminal() => {
                    self.fail(ctx.outbox, handle, Error::from_status(status), None)
                }
                _ => warn!("Encryption on 0x{:04X} failed: {}", handle, status),
            }
            return Ok(());
        }
        if !enabled {
            return ctx.registry.set_security(handle, SecurityLevel::None, 0);
        }

        match self.processes.get_mut(&handle) {
            Some(process) if process.state == BondingState::KeyExchange => {
                ctx.registry
                    .set_security(handle, process.security_level(), process.key_size)?;
                process.encrypted = true;
                self.distribute_keys(ctx.outbox, handle);
                Ok(())
            }
            Some(process)
                if process.state == BondingState::Encrypting
                    || (process.state == BondingState::BondingStarted
                        && process.previously_bonded) =>
            {
                let (level, key_size) = stored_security(ctx.store, &process.peer.address)
                    .unwrap_or((SecurityLevel::Unauthenticated, process.key_size));
                ctx.registry.set_security(handle, level, key_size)?;
                process.transition(BondingState::BondingComplete);
                info!("Link 0x{:04X} encrypted with stored key", handle);
                ctx.outbox.notify(HostEvent::BondingComplete {
                    handle,
                    peer: process.peer,
                    level,
                    key_size,
                });
                Ok(())
            }
            _ => {
                let identity = ctx
                    .registry
                    .lookup(handle)
                    .ok_or(Error::UnknownHandle(handle))?
                    .identity_address();
                let (level, key_size) = stored_security(ctx.store, &identity.address)
                    .unwrap_or((SecurityLevel::Unauthenticated, self.max_key_size));
                debug!("Peer encrypted 0x{:04X} outside of bonding", handle);
                ctx.registry.set_security(handle, level, key_size)
            }
        }
    }

    fn distribute_keys(&mut self, out: &mut Outbox, handle: u16) {
        let identity_key = self.identity_key;
        let process = match self.processes.get_mut(&handle) {
            Some(process) => process,
            None => return,
        };
        let dist = process.local_distribution();
        let (secure_connections, authenticated) = process.method.map_or((false, false), |m| {
            (m.is_secure_connections(), m.is_authenticated())
        });
        let keys = LocalKeys::generate(
            dist,
            identity_key,
            secure_connections,
            process.key_size,
            authenticated,
        );
        process.local_keys = Some(keys.clone());
        if dist.is_empty() {
            return;
        }
        if let Err(err) = out.send(Command::DistributeKeys { handle, keys }) {
            self.fail(out, handle, err, None);
        }
    }

    pub fn on_keys_received(
        &mut self,
        _ctx: &mut SecurityContext<'_>,
        handle: u16,
        keys: PeerKeys,
    ) -> Result<()> {
        match self.processes.get_mut(&handle) {
            Some(process) if process.state == BondingState::KeyExchange => {
                debug!("Keys received on 0x{:04X}", handle);
                process.absorb_peer_keys(keys);
            }
            _ => warn!("Keys on 0x{:04X} outside of key exchange; dropped", handle),
        }
        Ok(())
    }

    /// Final indication of the key exchange; commits the bond on success
    pub fn on_pairing_complete(
        &mut self,
        ctx: &mut SecurityContext<'_>,
        handle: u16,
        status: Status,
    ) -> Result<()> {
        let process = match self.processes.get(&handle) {
            Some(process) if process.state == BondingState::KeyExchange => process,
            _ => {
                warn!("Pairing complete on 0x{:04X} with no key exchange", handle);
                return Ok(());
            }
        };
        if !status.is_success() {
            self.fail(ctx.outbox, handle, Error::from_status(status), None);
            return Ok(());
        }
        if !process.encrypted {
            warn!("Pairing complete on 0x{:04X} before encryption", handle);
            let failure = SecurityFailure::AuthenticationFailed;
            self.fail(ctx.outbox, handle, failure.into(), Some(failure));
            return Ok(());
        }

        let identity = process.identity();
        let address = process.peer.address;
        let level = process.security_level();
        let key_size = process.key_size;
        let bonding = process.local_features.auth_req.contains(AuthReq::BONDING)
            && process
                .remote_features
                .map_or(false, |r| r.auth_req.contains(AuthReq::BONDING));

        if bonding {
            if let Err(err) = ctx.store.commit(identity, process.bond_keys(), level, key_size) {
                self.fail(ctx.outbox, handle, err.into(), None);
                return Ok(());
            }
            if identity.address != address {
                ctx.store.discard_unbonded(&address);
            }
        } else {
            debug!("Pairing on 0x{:04X} without bonding; nothing stored", handle);
        }
        ctx.registry.set_identity(handle, identity)?;

        if let Some(process) = self.processes.get_mut(&handle) {
            if process.displayed_passkey.take().is_some() {
                ctx.outbox.notify(HostEvent::PasskeyDisplayStop { handle });
            }
            process.transition(BondingState::BondingComplete);
        }
        info!("Bonding with {} complete at {:?}", identity, level);
        ctx.outbox.notify(HostEvent::BondingComplete {
            handle,
            peer: identity,
            level,
            key_size,
        });
        Ok(())
    }

    /// The peer aborted pairing
    pub fn on_pairing_failed(
        &mut self,
        ctx: &mut SecurityContext<'_>,
        handle: u16,
        reason: u8,
    ) -> Result<()> {
        if !self.is_active(handle) {
            warn!("Pairing failed on 0x{:04X} with no pairing running", handle);
            return Ok(());
        }
        let failure = SecurityFailure::from_reason(reason);
        self.fail(ctx.outbox, handle, failure.into(), None);
        Ok(())
    }

    /// Confirmation of a security command
    pub fn on_command_status(
        &mut self,
        ctx: &mut SecurityContext<'_>,
        handle: u16,
        status: Status,
    ) -> Result<()> {
        if !status.is_success() && self.is_active(handle) {
            self.fail(ctx.outbox, handle, Error::from_status(status), None);
        }
        Ok(())
    }

    /// Phase out keys the controller reports as invalid
    pub fn on_key_type_changed(
        &mut self,
        ctx: &mut SecurityContext<'_>,
        peer: BdAddr,
        key_type: KeyType,
    ) -> Result<()> {
        if key_type != KeyType::Invalid {
            debug!("Key type for {} is now {:?}", peer, key_type);
            return Ok(());
        }
        ctx.store.invalidate(&peer)?;
        ctx.outbox.notify(HostEvent::KeysPhasedOut { peer });
        Ok(())
    }

    /// The link is gone; any running attempt fails and nothing is stored
    pub fn link_lost(&mut self, out: &mut Outbox, handle: u16, reason: Status) {
        if self.is_active(handle) {
            self.fail(out, handle, Error::Disconnected(reason), None);
        }
        self.processes.remove(&handle);
    }

    /// Fail every attempt whose user-response window closed before `now`
    ///
    /// Cool-downs that ran out are forgotten as well.
    pub fn check_timeouts(&mut self, out: &mut Outbox, now: Instant) {
        self.cooldowns.retain(|_, until| now < *until);
        let mut expired: Vec<u16> = self
            .processes
            .values()
            .filter(|p| matches!(p.waiting, Some((_, deadline)) if deadline <= now))
            .map(|p| p.handle)
            .collect();
        expired.sort_unstable();
        for handle in expired {
            self.expire(out, handle);
        }
    }

    fn expire(&mut self, out: &mut Outbox, handle: u16) {
        let reason = match self.processes.get(&handle).and_then(|p| p.waiting) {
            Some((UserWait::Passkey, _)) => SecurityFailure::PasskeyEntryFailed,
            Some((UserWait::Confirm(_), _)) => SecurityFailure::NumericComparisonFailed,
            None => return,
        };
        warn!("User response on 0x{:04X} timed out", handle);
        self.fail(out, handle, Error::Timeout, Some(reason));
    }

    fn fail(
        &mut self,
        out: &mut Outbox,
        handle: u16,
        error: Error,
        peer_reason: Option<SecurityFailure>,
    ) {
        let process = match self.processes.get_mut(&handle) {
            Some(process) if !process.state.is_terminal() => process,
            _ => return,
        };
        process.waiting = None;
        let displayed = process.displayed_passkey.take().is_some();
        process.transition(BondingState::BondingFailed);
        let peer = process.peer;

        if displayed {
            out.notify(HostEvent::PasskeyDisplayStop { handle });
        }
        if let Some(reason) = peer_reason {
            if let Err(err) = out.send(Command::PairingFailed { handle, reason }) {
                warn!("Could not tell the peer on 0x{:04X}: {}", handle, err);
            }
        }
        if error == Error::SecurityFailed(SecurityFailure::RepeatedAttempts) {
            self.cooldowns
                .insert(peer.address, Instant::now() + self.cooldown);
        }
        warn!("Bonding with {} on 0x{:04X} failed: {}", peer, handle, error);
        out.notify(HostEvent::BondingFailed {
            handle,
            peer,
            error,
        });
    }

    /// Report every running attempt as aborted and forget all state
    pub fn abort_all(&mut self, out: &mut Outbox) {
        let mut active: Vec<u16> = self
            .processes
            .values()
            .filter(|p| !p.state.is_terminal())
            .map(|p| p.handle)
            .collect();
        active.sort_unstable();
        for handle in active {
            out.notify(HostEvent::OperationAborted {
                operation: Operation::Bonding(handle),
            });
        }
        self.processes.clear();
    }
}

fn stored_security(store: &BondingStore, identity: &BdAddr) -> Option<(SecurityLevel, u8)> {
    store
        .lookup(identity)
        .filter(|record| record.is_bonded())
        .map(|record| (record.security_level(), record.key_size()))
}
