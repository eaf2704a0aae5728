//! Process-wide host context
//!
//! `Host` owns the connection registry, the bonding store and the GAP,
//! security and isochronous state machines for one controller. It exists
//! between `power_on` and `power_off`; nothing in the crate is global.
//!
//! The application drives it from two sides: calls such as
//! [`Host::connect`] or [`Host::bond`] send commands through the
//! [`Transport`], and every controller event goes through
//! [`Host::handle_event`]. Outcomes come back as [`HostEvent`]s from
//! [`Host::poll_event`].

pub mod config;
pub mod event;

#[cfg(test)]
mod tests;

pub use config::HostConfig;
pub use event::{CisResult, HostEvent, Operation};

use crate::error::Result;
use crate::gap::{
    AdvertisingParams, BdAddr, Connection, ConnectionParams, ConnectionRegistry, GapManager,
    GapPolicy, PeerAddress, PhyPair, ScanParams,
};
use crate::hci::{Event, Outbox, Status, Transport};
use crate::iso::{BigParams, CigParams, CisPair, CisRequest, DataPathDirection, IsoCoordinator};
use crate::smp::{BondingState, BondingStore, Key128, SecurityContext, SecurityProvider, SmpManager};
use log::{debug, info};
use std::time::Instant;

pub struct Host {
    config: HostConfig,
    outbox: Outbox,
    registry: ConnectionRegistry,
    store: BondingStore,
    gap: GapManager,
    smp: SmpManager,
    iso: IsoCoordinator,
    gap_policy: Box<dyn GapPolicy + Send>,
    security: Box<dyn SecurityProvider + Send>,
}

impl Host {
    /// Bring the host up on a freshly reset controller
    ///
    /// `store` carries the bonds restored from persistent storage, if any.
    pub fn power_on(
        config: HostConfig,
        transport: Box<dyn Transport + Send>,
        gap_policy: Box<dyn GapPolicy + Send>,
        security: Box<dyn SecurityProvider + Send>,
        store: BondingStore,
    ) -> Self {
        info!("Host powered on with {} stored bond(s)", store.len());
        Self {
            gap: GapManager::new(config.default_connection_params),
            smp: SmpManager::new(&config),
            iso: IsoCoordinator::new(),
            outbox: Outbox::new(transport),
            registry: ConnectionRegistry::new(),
            store,
            gap_policy,
            security,
            config,
        }
    }

    /// Shut the host down
    ///
    /// Every operation still in flight ends with `OperationAborted`. The
    /// bonding store is handed back along with the final events.
    pub fn power_off(mut self) -> (BondingStore, Vec<HostEvent>) {
        self.smp.abort_all(&mut self.outbox);
        self.iso.abort_all(&mut self.outbox);
        self.gap.abort_all(&mut self.outbox);
        self.registry.clear();
        info!("Host powered off");
        let events = self.outbox.drain();
        (self.store, events)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Feed one controller event through the state machines
    pub fn handle_event(&mut self, event: Event) -> Result<()> {
        debug!("Controller event: {:?}", event);
        let out = &mut self.outbox;
        match event {
            Event::AdvertisingEnableComplete { status } => {
                self.gap.on_advertising_enable_complete(out, status)
            }
            Event::ScanEnableComplete { status } => self.gap.on_scan_enable_complete(out, status),
            Event::AdvertisingReport(report) => self.gap.on_advertising_report(out, report),

            Event::CreateConnectionStatus { status } => {
                self.gap.on_create_connection_status(out, status)
            }
            Event::CreateConnectionCancelComplete { status } => {
                self.gap.on_create_connection_cancel_complete(out, status)
            }
            Event::ConnectionComplete(complete) => {
                return self.gap.on_connection_complete(
                    out,
                    &mut self.registry,
                    self.gap_policy.as_ref(),
                    complete,
                );
            }
            Event::DisconnectStatus { handle, status } => {
                if self.iso.owns(handle) {
                    self.iso.on_disconnect_status(out, handle, status);
                } else {
                    self.gap.on_disconnect_status(out, &mut self.registry, handle, status);
                }
            }
            Event::DisconnectionComplete { handle, reason } => {
                self.on_disconnection_complete(handle, reason)
            }
            Event::ConnectionUpdateStatus { handle, status } => {
                self.gap.on_connection_update_status(out, handle, status)
            }
            Event::ConnectionUpdateComplete {
                status,
                handle,
                params,
            } => {
                return self.gap.on_connection_update_complete(
                    out,
                    &mut self.registry,
                    handle,
                    status,
                    params,
                );
            }
            Event::RemoteConnectionParameterRequest { handle, params } => {
                return self.gap.on_remote_parameter_request(
                    out,
                    &self.registry,
                    self.gap_policy.as_ref(),
                    handle,
                    params,
                );
            }
            Event::PhyUpdateStatus { handle, status } => {
                self.gap.on_phy_update_status(out, handle, status)
            }
            Event::PhyUpdateComplete {
                status,
                handle,
                phy,
            } => {
                return self
                    .gap
                    .on_phy_update_complete(out, &mut self.registry, handle, status, phy);
            }

            Event::SecurityCommandStatus { handle, status } => {
                return self.with_security(|smp, ctx| smp.on_command_status(ctx, handle, status));
            }
            Event::SecurityRequest { handle, auth_req } => {
                return self
                    .with_security(|smp, ctx| smp.on_security_request(ctx, handle, auth_req));
            }
            Event::PairingRequest { handle, features } => {
                return self
                    .with_security(|smp, ctx| smp.on_pairing_request(ctx, handle, features));
            }
            Event::PairingResponse { handle, features } => {
                return self
                    .with_security(|smp, ctx| smp.on_pairing_response(ctx, handle, features));
            }
            Event::NumericComparison { handle, value } => {
                return self
                    .with_security(|smp, ctx| smp.on_numeric_comparison(ctx, handle, value));
            }
            Event::EncryptionChange {
                handle,
                status,
                enabled,
            } => {
                return self.with_security(|smp, ctx| {
                    smp.on_encryption_change(ctx, handle, status, enabled)
                });
            }
            Event::KeysReceived { handle, keys } => {
                return self.with_security(|smp, ctx| smp.on_keys_received(ctx, handle, keys));
            }
            Event::PairingComplete { handle, status } => {
                return self.with_security(|smp, ctx| smp.on_pairing_complete(ctx, handle, status));
            }
            Event::PairingFailed { handle, reason } => {
                return self.with_security(|smp, ctx| smp.on_pairing_failed(ctx, handle, reason));
            }
            Event::KeyTypeChanged { peer, key_type } => {
                return self
                    .with_security(|smp, ctx| smp.on_key_type_changed(ctx, peer, key_type));
            }

            Event::CigParametersSet {
                cig_id,
                status,
                assignments,
            } => self.iso.on_cig_parameters_set(out, cig_id, status, assignments),
            Event::CreateCisStatus {
                status,
                cis_handles,
            } => self.iso.on_create_cis_status(out, status, &cis_handles),
            Event::CisEstablished { cis_handle, status } => {
                self.iso.on_cis_established(out, cis_handle, status)
            }
            Event::CisRequest {
                acl_handle,
                cis_handle,
                cig_id,
                cis_id,
            } => {
                let request = CisRequest {
                    acl_handle,
                    cis_handle,
                    cig_id,
                    cis_id,
                };
                return self.iso.on_cis_request(out, &self.registry, request);
            }
            Event::CisReplyStatus { cis_handle, status } => {
                self.iso.on_cis_reply_status(out, cis_handle, status)
            }
            Event::CigRemoved { cig_id, status } => self.iso.on_cig_removed(out, cig_id, status),
            Event::IsoDataPathComplete {
                handle,
                direction,
                setup,
                status,
            } => self
                .iso
                .on_data_path_complete(out, handle, direction, setup, status),

            Event::CreateBigStatus { big_handle, status } => {
                self.iso.on_create_big_status(out, big_handle, status)
            }
            Event::BigCreated {
                big_handle,
                status,
                bis_handles,
            } => self.iso.on_big_created(out, big_handle, status, bis_handles),
            Event::TerminateBigStatus { big_handle, status } => {
                self.iso.on_terminate_big_status(out, big_handle, status)
            }
            Event::BigTerminated { big_handle, reason } => {
                self.iso.on_big_terminated(out, big_handle, reason)
            }
            Event::BigCreateSyncStatus { big_handle, status } => {
                self.iso.on_big_create_sync_status(out, big_handle, status)
            }
            Event::BigSyncEstablished {
                big_handle,
                status,
                bis_handles,
            } => self
                .iso
                .on_big_sync_established(out, big_handle, status, bis_handles),
            Event::BigSyncLost { big_handle, reason } => {
                self.iso.on_big_sync_lost(out, big_handle, reason)
            }
            Event::BigTerminateSyncComplete { big_handle, status } => {
                self.iso
                    .on_big_terminate_sync_complete(out, big_handle, status)
            }
        }
        Ok(())
    }

    /// Tear down everything layered on a link before the link itself
    fn on_disconnection_complete(&mut self, handle: u16, reason: Status) {
        if self.iso.owns(handle) && !self.registry.contains(handle) {
            self.iso.on_cis_disconnected(&mut self.outbox, handle, reason);
            return;
        }
        self.smp.link_lost(&mut self.outbox, handle, reason);
        self.iso.acl_terminated(&mut self.outbox, handle, reason);
        self.gap
            .on_disconnection_complete(&mut self.outbox, &mut self.registry, handle, reason);
    }

    fn with_security<T>(
        &mut self,
        f: impl FnOnce(&mut SmpManager, &mut SecurityContext<'_>) -> T,
    ) -> T {
        let mut ctx = SecurityContext {
            outbox: &mut self.outbox,
            registry: &mut self.registry,
            store: &mut self.store,
            provider: self.security.as_ref(),
        };
        f(&mut self.smp, &mut ctx)
    }

    // Application events

    pub fn poll_event(&mut self) -> Option<HostEvent> {
        self.outbox.poll()
    }

    pub fn drain_events(&mut self) -> Vec<HostEvent> {
        self.outbox.drain()
    }

    /// Expire user-input waits whose deadline passed before `now`
    pub fn check_timeouts(&mut self, now: Instant) {
        self.smp.check_timeouts(&mut self.outbox, now);
    }

    // GAP

    pub fn start_advertising(&mut self, params: AdvertisingParams) -> Result<()> {
        self.gap.start_advertising(&mut self.outbox, params)
    }

    pub fn stop_advertising(&mut self) -> Result<()> {
        self.gap.stop_advertising(&mut self.outbox)
    }

    pub fn start_scanning(&mut self, params: ScanParams) -> Result<()> {
        self.gap.start_scanning(&mut self.outbox, params)
    }

    pub fn stop_scanning(&mut self) -> Result<()> {
        self.gap.stop_scanning(&mut self.outbox)
    }

    /// Connect to `peer` as central, with the configured parameters unless
    /// `params` is given
    pub fn connect(&mut self, peer: PeerAddress, params: Option<ConnectionParams>) -> Result<()> {
        self.gap
            .create_connection(&mut self.outbox, &self.registry, peer, params)
    }

    pub fn cancel_connect(&mut self) -> Result<()> {
        self.gap.cancel_connection(&mut self.outbox)
    }

    pub fn disconnect(&mut self, handle: u16, reason: Status) -> Result<()> {
        self.gap
            .disconnect(&mut self.outbox, &mut self.registry, handle, reason)
    }

    pub fn update_connection(&mut self, handle: u16, params: ConnectionParams) -> Result<()> {
        self.gap
            .update_connection(&mut self.outbox, &self.registry, handle, params)
    }

    pub fn set_phy(&mut self, handle: u16, phy: PhyPair) -> Result<()> {
        self.gap.set_phy(&mut self.outbox, &self.registry, handle, phy)
    }

    pub fn gap(&self) -> &GapManager {
        &self.gap
    }

    pub fn connection(&self, handle: u16) -> Option<&Connection> {
        self.registry.lookup(handle)
    }

    pub fn connection_by_address(&self, addr: &BdAddr) -> Option<&Connection> {
        self.registry.lookup_by_address(addr)
    }

    pub fn connections(&self) -> Vec<u16> {
        self.registry.handles()
    }

    // Security

    pub fn bond(&mut self, handle: u16) -> Result<()> {
        self.with_security(|smp, ctx| smp.bond(ctx, handle))
    }

    /// Answer a passkey request; `None` rejects it
    pub fn reply_passkey(&mut self, handle: u16, passkey: Option<u32>) -> Result<()> {
        self.with_security(|smp, ctx| smp.reply_passkey(ctx, handle, passkey))
    }

    pub fn reply_user_confirm(&mut self, handle: u16, accept: bool) -> Result<()> {
        self.with_security(|smp, ctx| smp.reply_user_confirm(ctx, handle, accept))
    }

    pub fn bonding_state(&self, handle: u16) -> BondingState {
        self.smp.bonding_state(handle)
    }

    /// Forget the bond with `addr`; returns whether one existed
    pub fn unbond(&mut self, addr: &BdAddr) -> Result<bool> {
        let removed = self.store.delete(addr)?;
        if removed.is_some() {
            info!("Unbonded {}", addr);
        }
        Ok(removed.is_some())
    }

    pub fn unbond_all(&mut self) -> Result<()> {
        self.store.delete_all()?;
        Ok(())
    }

    pub fn store(&self) -> &BondingStore {
        &self.store
    }

    // Isochronous channels

    pub fn set_cig_parameters(&mut self, cig_id: u8, params: CigParams) -> Result<()> {
        self.iso.set_cig_parameters(&mut self.outbox, cig_id, params)
    }

    pub fn create_cis(&mut self, pairs: &[CisPair]) -> Result<()> {
        self.iso.create_cis(&mut self.outbox, &self.registry, pairs)
    }

    pub fn remove_cig(&mut self, cig_id: u8) -> Result<()> {
        self.iso.remove_cig(&mut self.outbox, cig_id)
    }

    /// Answer a peer CIS request; `reason` only applies to a rejection
    pub fn reply_cis_request(
        &mut self,
        cis_handle: u16,
        accept: bool,
        reason: Option<Status>,
    ) -> Result<()> {
        self.iso
            .reply_cis_request(&mut self.outbox, cis_handle, accept, reason)
    }

    pub fn terminate_cis(&mut self, cis_handle: u16, reason: Status) -> Result<()> {
        self.iso.terminate_cis(&mut self.outbox, cis_handle, reason)
    }

    pub fn setup_iso_data_path(&mut self, handle: u16, direction: DataPathDirection) -> Result<()> {
        self.iso
            .setup_iso_data_path(&mut self.outbox, handle, direction)
    }

    pub fn remove_iso_data_path(
        &mut self,
        handle: u16,
        direction: DataPathDirection,
    ) -> Result<()> {
        self.iso
            .remove_iso_data_path(&mut self.outbox, handle, direction)
    }

    pub fn create_big(&mut self, big_handle: u8, adv_handle: u8, params: BigParams) -> Result<()> {
        self.iso
            .create_big(&mut self.outbox, big_handle, adv_handle, params)
    }

    pub fn terminate_big(&mut self, big_handle: u8, reason: Status) -> Result<()> {
        self.iso.terminate_big(&mut self.outbox, big_handle, reason)
    }

    pub fn big_create_sync(
        &mut self,
        big_handle: u8,
        sync_handle: u16,
        bis: Vec<u8>,
        broadcast_code: Option<Key128>,
    ) -> Result<()> {
        self.iso
            .big_create_sync(&mut self.outbox, big_handle, sync_handle, bis, broadcast_code)
    }

    pub fn big_terminate_sync(&mut self, big_handle: u8) -> Result<()> {
        self.iso.big_terminate_sync(&mut self.outbox, big_handle)
    }

    pub fn iso(&self) -> &IsoCoordinator {
        &self.iso
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("connections", &self.registry.len())
            .field("bonds", &self.store.len())
            .field("outbox", &self.outbox)
            .finish()
    }
}
