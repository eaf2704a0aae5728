//! Isochronous stream coordinator
//!
//! Tracks CIG configurations, their CIS streams, peer CIS requests, ISO data
//! paths and BIGs. Ordering rules are enforced here, before anything is sent:
//! a CIG with live streams cannot be removed, and a BIG cannot be torn down
//! while one of its BIS still has a data path.

use super::types::*;
use crate::error::{Error, Result};
use crate::gap::ConnectionRegistry;
use crate::hci::{Command, Outbox, Status};
use crate::host::{HostEvent, Operation};
use crate::smp::Key128;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct IsoCoordinator {
    cigs: HashMap<u8, Cig>,
    /// Configurations sent and not yet confirmed
    pending_cigs: HashMap<u8, CigParams>,
    removing: HashSet<u8>,
    cis: HashMap<u16, Cis>,
    requests: HashMap<u16, CisRequest>,
    data_paths: HashSet<(u16, DataPathDirection)>,
    /// Data path commands in flight; true for setup
    pending_paths: HashMap<(u16, DataPathDirection), bool>,
    bigs: HashMap<u8, Big>,
}

impl IsoCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cig(&self, cig_id: u8) -> Option<&Cig> {
        self.cigs.get(&cig_id)
    }

    pub fn cis(&self, cis_handle: u16) -> Option<&Cis> {
        self.cis.get(&cis_handle)
    }

    pub fn cis_state(&self, cis_handle: u16) -> CisState {
        self.cis
            .get(&cis_handle)
            .map_or(CisState::Unconfigured, |cis| cis.state)
    }

    pub fn big(&self, big_handle: u8) -> Option<&Big> {
        self.bigs.get(&big_handle)
    }

    pub fn has_data_path(&self, handle: u16, direction: DataPathDirection) -> bool {
        self.data_paths.contains(&(handle, direction))
    }

    /// Whether `handle` is a CIS this coordinator tracks
    pub fn owns(&self, handle: u16) -> bool {
        self.cis.contains_key(&handle)
    }

    // CIG configuration

    /// Configure (or reconfigure) a CIG
    ///
    /// Handles become usable once the confirmation reports success for the
    /// individual entry.
    pub fn set_cig_parameters(
        &mut self,
        out: &mut Outbox,
        cig_id: u8,
        params: CigParams,
    ) -> Result<()> {
        if self.pending_cigs.contains_key(&cig_id) || self.removing.contains(&cig_id) {
            return Err(Error::Busy);
        }
        if params.cis.is_empty() {
            return Err(Error::CommandDisallowed("CIG needs at least one CIS"));
        }
        if let Some(cig) = self.cigs.get(&cig_id) {
            if cig.cis.iter().any(|h| self.cis_state(*h) != CisState::ParamsSet) {
                return Err(Error::CommandDisallowed("CIG has active streams"));
            }
        }
        out.send(Command::SetCigParameters {
            cig_id,
            params: params.clone(),
        })?;
        self.pending_cigs.insert(cig_id, params);
        Ok(())
    }

    pub fn on_cig_parameters_set(
        &mut self,
        out: &mut Outbox,
        cig_id: u8,
        status: Status,
        assignments: Vec<CisAssignment>,
    ) {
        let params = match self.pending_cigs.remove(&cig_id) {
            Some(params) => params,
            None => {
                warn!("CIG 0x{:02X} parameters confirmed with no request", cig_id);
                return;
            }
        };
        if !status.is_success() {
            out.notify(HostEvent::CigConfigured {
                cig_id,
                result: Err(Error::from_status(status)),
            });
            return;
        }

        // Reconfiguring replaces the previous streams of this CIG. Streams
        // that left the configured state stay tracked under the group.
        let mut handles = Vec::new();
        if let Some(old) = self.cigs.remove(&cig_id) {
            for handle in old.cis {
                if self.cis_state(handle) == CisState::ParamsSet {
                    self.cis.remove(&handle);
                } else {
                    warn!(
                        "CIS 0x{:04X} of CIG 0x{:02X} still active across reconfiguration",
                        handle, cig_id
                    );
                    handles.push(handle);
                }
            }
        }

        let mut results = Vec::with_capacity(assignments.len());
        for entry in assignments {
            if entry.status.is_success() {
                self.cis.insert(
                    entry.handle,
                    Cis {
                        cis_id: entry.cis_id,
                        cig_id,
                        handle: entry.handle,
                        acl_handle: None,
                        state: CisState::ParamsSet,
                        peer_initiated: false,
                    },
                );
                handles.push(entry.handle);
                results.push((entry.cis_id, Ok(entry.handle)));
            } else {
                debug!(
                    "CIS 0x{:02X} of CIG 0x{:02X} rejected: {}",
                    entry.cis_id, cig_id, entry.status
                );
                results.push((entry.cis_id, Err(entry.status)));
            }
        }
        info!("CIG 0x{:02X} configured with {} CIS", cig_id, handles.len());
        self.cigs.insert(
            cig_id,
            Cig {
                id: cig_id,
                params,
                cis: handles,
            },
        );
        out.notify(HostEvent::CigConfigured {
            cig_id,
            result: Ok(results),
        });
    }

    /// Remove a CIG whose streams are all back to configured
    pub fn remove_cig(&mut self, out: &mut Outbox, cig_id: u8) -> Result<()> {
        let cig = self
            .cigs
            .get(&cig_id)
            .ok_or(Error::UnknownHandle(cig_id as u16))?;
        if self.pending_cigs.contains_key(&cig_id) || self.removing.contains(&cig_id) {
            return Err(Error::Busy);
        }
        if cig.cis.iter().any(|h| self.cis_state(*h) != CisState::ParamsSet) {
            return Err(Error::CommandDisallowed("CIG has established streams"));
        }
        out.send(Command::RemoveCig { cig_id })?;
        self.removing.insert(cig_id);
        Ok(())
    }

    pub fn on_cig_removed(&mut self, out: &mut Outbox, cig_id: u8, status: Status) {
        if !self.removing.remove(&cig_id) {
            warn!("CIG 0x{:02X} removal confirmed with no request", cig_id);
            return;
        }
        if !status.is_success() {
            out.notify(HostEvent::CigRemoved {
                cig_id,
                result: Err(Error::from_status(status)),
            });
            return;
        }
        if let Some(cig) = self.cigs.remove(&cig_id) {
            for handle in cig.cis {
                self.cis.remove(&handle);
            }
        }
        info!("CIG 0x{:02X} removed", cig_id);
        out.notify(HostEvent::CigRemoved {
            cig_id,
            result: Ok(()),
        });
    }

    // CIS lifecycle

    /// Create the given CIS over their ACL links
    pub fn create_cis(
        &mut self,
        out: &mut Outbox,
        registry: &ConnectionRegistry,
        pairs: &[CisPair],
    ) -> Result<()> {
        if pairs.is_empty() {
            return Err(Error::CommandDisallowed("no CIS to create"));
        }
        for pair in pairs {
            if !registry.contains(pair.acl_handle) {
                return Err(Error::UnknownAclHandle(pair.acl_handle));
            }
            let cis = match self.cis.get(&pair.cis_handle) {
                Some(cis) if !cis.peer_initiated => cis,
                _ => return Err(Error::UnknownHandle(pair.cis_handle)),
            };
            if self.removing.contains(&cis.cig_id) {
                return Err(Error::CommandDisallowed("CIG is being removed"));
            }
            if self.pending_cigs.contains_key(&cis.cig_id) {
                return Err(Error::Busy);
            }
            if cis.state != CisState::ParamsSet {
                return Err(Error::CommandDisallowed("CIS already created"));
            }
        }
        out.send(Command::CreateCis {
            pairs: pairs.to_vec(),
        })?;
        for pair in pairs {
            if let Some(cis) = self.cis.get_mut(&pair.cis_handle) {
                cis.acl_handle = Some(pair.acl_handle);
                set_cis_state(cis, CisState::Created);
            }
        }
        Ok(())
    }

    pub fn on_create_cis_status(
        &mut self,
        out: &mut Outbox,
        status: Status,
        cis_handles: &[u16],
    ) {
        if status.is_success() {
            return;
        }
        for handle in cis_handles {
            if self.cis_state(*handle) == CisState::Created {
                self.reset_cis(*handle);
                out.notify(HostEvent::CisEstablished {
                    cis_handle: *handle,
                    result: Err(Error::from_status(status)),
                });
            }
        }
    }

    pub fn on_cis_established(&mut self, out: &mut Outbox, cis_handle: u16, status: Status) {
        match self.cis.get_mut(&cis_handle) {
            Some(cis) if cis.state == CisState::Created => {
                if status.is_success() {
                    set_cis_state(cis, CisState::Established);
                    out.notify(HostEvent::CisEstablished {
                        cis_handle,
                        result: Ok(()),
                    });
                } else {
                    self.reset_cis(cis_handle);
                    out.notify(HostEvent::CisEstablished {
                        cis_handle,
                        result: Err(Error::from_status(status)),
                    });
                }
            }
            _ => warn!("CIS established for unexpected handle 0x{:04X}", cis_handle),
        }
    }

    /// A peer central wants to open a CIS; the application must answer
    pub fn on_cis_request(
        &mut self,
        out: &mut Outbox,
        registry: &ConnectionRegistry,
        request: CisRequest,
    ) -> Result<()> {
        if !registry.contains(request.acl_handle) {
            warn!(
                "CIS request on unknown ACL 0x{:04X}; rejecting",
                request.acl_handle
            );
            return out.send(Command::RejectCisRequest {
                cis_handle: request.cis_handle,
                reason: Status::UnknownConnectionId,
            });
        }
        self.requests.insert(request.cis_handle, request);
        out.notify(HostEvent::CisRequest {
            acl_handle: request.acl_handle,
            cis_handle: request.cis_handle,
            cig_id: request.cig_id,
            cis_id: request.cis_id,
        });
        Ok(())
    }

    /// Accept or reject a pending peer CIS request
    pub fn reply_cis_request(
        &mut self,
        out: &mut Outbox,
        cis_handle: u16,
        accept: bool,
        reason: Option<Status>,
    ) -> Result<()> {
        let request = *self
            .requests
            .get(&cis_handle)
            .ok_or(Error::UnknownHandle(cis_handle))?;
        if accept {
            out.send(Command::AcceptCisRequest { cis_handle })?;
            self.cis.insert(
                cis_handle,
                Cis {
                    cis_id: request.cis_id,
                    cig_id: request.cig_id,
                    handle: cis_handle,
                    acl_handle: Some(request.acl_handle),
                    state: CisState::Created,
                    peer_initiated: true,
                },
            );
        } else {
            out.send(Command::RejectCisRequest {
                cis_handle,
                reason: reason.unwrap_or(Status::RejectedLimitedResources),
            })?;
        }
        self.requests.remove(&cis_handle);
        Ok(())
    }

    pub fn on_cis_reply_status(&mut self, out: &mut Outbox, cis_handle: u16, status: Status) {
        if status.is_success() || self.cis_state(cis_handle) != CisState::Created {
            return;
        }
        self.reset_cis(cis_handle);
        out.notify(HostEvent::CisEstablished {
            cis_handle,
            result: Err(Error::from_status(status)),
        });
    }

    /// Disconnect an established CIS; its ACL stays up
    pub fn terminate_cis(
        &mut self,
        out: &mut Outbox,
        cis_handle: u16,
        reason: Status,
    ) -> Result<()> {
        let cis = self
            .cis
            .get_mut(&cis_handle)
            .ok_or(Error::UnknownHandle(cis_handle))?;
        if cis.state != CisState::Established {
            return Err(Error::CommandDisallowed("CIS not established"));
        }
        out.send(Command::Disconnect {
            handle: cis_handle,
            reason,
        })?;
        set_cis_state(cis, CisState::Disconnecting);
        Ok(())
    }

    pub fn on_disconnect_status(&mut self, out: &mut Outbox, cis_handle: u16, status: Status) {
        if status.is_success() {
            return;
        }
        if let Some(cis) = self.cis.get_mut(&cis_handle) {
            if cis.state == CisState::Disconnecting {
                set_cis_state(cis, CisState::Established);
                out.notify(HostEvent::DisconnectFailed {
                    handle: cis_handle,
                    error: Error::from_status(status),
                });
            }
        }
    }

    pub fn on_cis_disconnected(&mut self, out: &mut Outbox, cis_handle: u16, reason: Status) {
        if !self.owns(cis_handle) {
            return;
        }
        self.drop_data_paths(cis_handle);
        self.reset_cis(cis_handle);
        info!("CIS 0x{:04X} disconnected: {}", cis_handle, reason);
        out.notify(HostEvent::CisDisconnected { cis_handle, reason });
    }

    /// The ACL under some CIS went away
    pub fn acl_terminated(&mut self, out: &mut Outbox, acl_handle: u16, reason: Status) {
        self.requests.retain(|cis_handle, request| {
            let keep = request.acl_handle != acl_handle;
            if !keep {
                debug!("Dropping CIS request 0x{:04X} with its ACL", cis_handle);
            }
            keep
        });

        let mut riding: Vec<(u16, CisState)> = self
            .cis
            .values()
            .filter(|cis| cis.acl_handle == Some(acl_handle))
            .map(|cis| (cis.handle, cis.state))
            .collect();
        riding.sort_unstable_by_key(|(handle, _)| *handle);

        for (cis_handle, state) in riding {
            self.drop_data_paths(cis_handle);
            self.reset_cis(cis_handle);
            match state {
                CisState::Created => out.notify(HostEvent::CisEstablished {
                    cis_handle,
                    result: Err(Error::Disconnected(reason)),
                }),
                CisState::Established | CisState::Disconnecting => {
                    out.notify(HostEvent::CisDisconnected { cis_handle, reason })
                }
                CisState::Unconfigured | CisState::ParamsSet => {}
            }
        }
    }

    /// Back to configured for a local CIS, gone for a peer one
    fn reset_cis(&mut self, cis_handle: u16) {
        let peer_initiated = match self.cis.get_mut(&cis_handle) {
            Some(cis) if cis.peer_initiated => true,
            Some(cis) => {
                cis.acl_handle = None;
                set_cis_state(cis, CisState::ParamsSet);
                false
            }
            None => false,
        };
        if peer_initiated {
            debug!("CIS 0x{:04X} Created/Established -> Unconfigured", cis_handle);
            self.cis.remove(&cis_handle);
        }
    }

    // ISO data paths

    pub fn setup_iso_data_path(
        &mut self,
        out: &mut Outbox,
        handle: u16,
        direction: DataPathDirection,
    ) -> Result<()> {
        self.check_stream(handle)?;
        let key = (handle, direction);
        if self.pending_paths.contains_key(&key) {
            return Err(Error::Busy);
        }
        if self.data_paths.contains(&key) {
            return Err(Error::CommandDisallowed("data path already set up"));
        }
        out.send(Command::SetupIsoDataPath { handle, direction })?;
        self.pending_paths.insert(key, true);
        Ok(())
    }

    pub fn remove_iso_data_path(
        &mut self,
        out: &mut Outbox,
        handle: u16,
        direction: DataPathDirection,
    ) -> Result<()> {
        let key = (handle, direction);
        if self.pending_paths.contains_key(&key) {
            return Err(Error::Busy);
        }
        if !self.data_paths.contains(&key) {
            return Err(Error::CommandDisallowed("no data path set up"));
        }
        out.send(Command::RemoveIsoDataPath { handle, direction })?;
        self.pending_paths.insert(key, false);
        Ok(())
    }

    pub fn on_data_path_complete(
        &mut self,
        out: &mut Outbox,
        handle: u16,
        direction: DataPathDirection,
        setup: bool,
        status: Status,
    ) {
        let key = (handle, direction);
        match self.pending_paths.remove(&key) {
            Some(requested) if requested == setup => {}
            _ => {
                warn!("Unexpected data path completion for 0x{:04X}", handle);
                return;
            }
        }
        let result = if status.is_success() {
            if setup {
                self.data_paths.insert(key);
            } else {
                self.data_paths.remove(&key);
            }
            Ok(())
        } else {
            Err(Error::from_status(status))
        };
        out.notify(HostEvent::IsoDataPathChanged {
            handle,
            direction,
            active: self.data_paths.contains(&key),
            result,
        });
    }

    /// A data path needs an established CIS or a BIS of a live BIG
    fn check_stream(&self, handle: u16) -> Result<()> {
        if let Some(cis) = self.cis.get(&handle) {
            return match cis.state {
                CisState::Established => Ok(()),
                _ => Err(Error::CommandDisallowed("CIS not established")),
            };
        }
        match self.bigs.values().find(|big| big.bis_handles.contains(&handle)) {
            Some(big) if matches!(big.state, BigState::Established | BigState::SyncEstablished) => {
                Ok(())
            }
            Some(_) => Err(Error::CommandDisallowed("BIG not established")),
            None => Err(Error::UnknownHandle(handle)),
        }
    }

    fn has_any_data_path(&self, handle: u16) -> bool {
        self.data_paths.iter().any(|(h, _)| *h == handle)
            || self.pending_paths.keys().any(|(h, _)| *h == handle)
    }

    fn drop_data_paths(&mut self, handle: u16) {
        self.data_paths.retain(|(h, _)| *h != handle);
        self.pending_paths.retain(|(h, _), _| *h != handle);
    }

    // Broadcast isochronous groups

    pub fn create_big(
        &mut self,
        out: &mut Outbox,
        big_handle: u8,
        adv_handle: u8,
        params: BigParams,
    ) -> Result<()> {
        if self.bigs.contains_key(&big_handle) {
            return Err(Error::CommandDisallowed("BIG handle in use"));
        }
        if params.num_bis == 0 {
            return Err(Error::CommandDisallowed("BIG needs at least one BIS"));
        }
        out.send(Command::CreateBig {
            big_handle,
            adv_handle,
            params,
        })?;
        self.bigs.insert(
            big_handle,
            Big {
                handle: big_handle,
                role: BigRole::Broadcaster,
                state: BigState::Created,
                bis_handles: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn on_create_big_status(&mut self, out: &mut Outbox, big_handle: u8, status: Status) {
        if status.is_success() {
            return;
        }
        if self.bigs.remove(&big_handle).is_some() {
            out.notify(HostEvent::BigCreated {
                big_handle,
                result: Err(Error::from_status(status)),
            });
        }
    }

    pub fn on_big_created(
        &mut self,
        out: &mut Outbox,
        big_handle: u8,
        status: Status,
        bis_handles: Vec<u16>,
    ) {
        match self.bigs.get_mut(&big_handle) {
            Some(big) if big.role == BigRole::Broadcaster && big.state == BigState::Created => {
                if status.is_success() {
                    set_big_state(big, BigState::Established);
                    big.bis_handles = bis_handles.clone();
                    out.notify(HostEvent::BigCreated {
                        big_handle,
                        result: Ok(bis_handles),
                    });
                } else {
                    self.bigs.remove(&big_handle);
                    out.notify(HostEvent::BigCreated {
                        big_handle,
                        result: Err(Error::from_status(status)),
                    });
                }
            }
            _ => warn!("BIG created for unexpected handle 0x{:02X}", big_handle),
        }
    }

    /// Tear down a BIG we broadcast
    pub fn terminate_big(
        &mut self,
        out: &mut Outbox,
        big_handle: u8,
        reason: Status,
    ) -> Result<()> {
        let big = match self.bigs.get(&big_handle) {
            Some(big) if big.role == BigRole::Broadcaster => big,
            _ => return Err(Error::UnknownHandle(big_handle as u16)),
        };
        if big.state != BigState::Established {
            return Err(Error::CommandDisallowed("BIG not established"));
        }
        if big.bis_handles.iter().any(|h| self.has_any_data_path(*h)) {
            return Err(Error::CommandDisallowed("BIS data path active"));
        }
        out.send(Command::TerminateBig { big_handle, reason })?;
        if let Some(big) = self.bigs.get_mut(&big_handle) {
            set_big_state(big, BigState::Terminating);
        }
        Ok(())
    }

    pub fn on_terminate_big_status(&mut self, out: &mut Outbox, big_handle: u8, status: Status) {
        if status.is_success() {
            return;
        }
        if let Some(big) = self.bigs.get_mut(&big_handle) {
            if big.state == BigState::Terminating {
                set_big_state(big, BigState::Established);
                out.notify(HostEvent::BigTerminated {
                    big_handle,
                    result: Err(Error::from_status(status)),
                });
            }
        }
    }

    pub fn on_big_terminated(&mut self, out: &mut Outbox, big_handle: u8, reason: Status) {
        match self.bigs.remove(&big_handle) {
            Some(big) => {
                for handle in &big.bis_handles {
                    self.drop_data_paths(*handle);
                }
                info!("BIG 0x{:02X} terminated: {}", big_handle, reason);
                out.notify(HostEvent::BigTerminated {
                    big_handle,
                    result: Ok(reason),
                });
            }
            None => warn!("BIG terminated for unknown handle 0x{:02X}", big_handle),
        }
    }

    /// Synchronize to a broadcast BIG as a receiver
    pub fn big_create_sync(
        &mut self,
        out: &mut Outbox,
        big_handle: u8,
        sync_handle: u16,
        bis: Vec<u8>,
        broadcast_code: Option<Key128>,
    ) -> Result<()> {
        if self.bigs.contains_key(&big_handle) {
            return Err(Error::CommandDisallowed("BIG handle in use"));
        }
        if bis.is_empty() {
            return Err(Error::CommandDisallowed("no BIS selected"));
        }
        out.send(Command::BigCreateSync {
            big_handle,
            sync_handle,
            bis,
            broadcast_code,
        })?;
        self.bigs.insert(
            big_handle,
            Big {
                handle: big_handle,
                role: BigRole::Receiver,
                state: BigState::Created,
                bis_handles: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn on_big_create_sync_status(&mut self, out: &mut Outbox, big_handle: u8, status: Status) {
        if status.is_success() {
            return;
        }
        if self.bigs.remove(&big_handle).is_some() {
            out.notify(HostEvent::BigSyncEstablished {
                big_handle,
                result: Err(Error::from_status(status)),
            });
        }
    }

    pub fn on_big_sync_established(
        &mut self,
        out: &mut Outbox,
        big_handle: u8,
        status: Status,
        bis_handles: Vec<u16>,
    ) {
        match self.bigs.get_mut(&big_handle) {
            Some(big) if big.role == BigRole::Receiver && big.state == BigState::Created => {
                if status.is_success() {
                    set_big_state(big, BigState::SyncEstablished);
                    big.bis_handles = bis_handles.clone();
                    out.notify(HostEvent::BigSyncEstablished {
                        big_handle,
                        result: Ok(bis_handles),
                    });
                } else {
                    self.bigs.remove(&big_handle);
                    out.notify(HostEvent::BigSyncEstablished {
                        big_handle,
                        result: Err(Error::from_status(status)),
                    });
                }
            }
            _ => warn!("BIG sync established for unexpected handle 0x{:02X}", big_handle),
        }
    }

    pub fn big_terminate_sync(&mut self, out: &mut Outbox, big_handle: u8) -> Result<()> {
        let big = match self.bigs.get(&big_handle) {
            Some(big) if big.role == BigRole::Receiver => big,
            _ => return Err(Error::UnknownHandle(big_handle as u16)),
        };
        match big.state {
            BigState::Terminating => return Err(Error::Busy),
            BigState::SyncEstablished => {}
            _ => return Err(Error::CommandDisallowed("BIG sync not established")),
        }
        if big.bis_handles.iter().any(|h| self.has_any_data_path(*h)) {
            return Err(Error::CommandDisallowed("BIS data path active"));
        }
        out.send(Command::BigTerminateSync { big_handle })?;
        if let Some(big) = self.bigs.get_mut(&big_handle) {
            set_big_state(big, BigState::Terminating);
        }
        Ok(())
    }

    pub fn on_big_terminate_sync_complete(
        &mut self,
        out: &mut Outbox,
        big_handle: u8,
        status: Status,
    ) {
        let terminating = matches!(
            self.bigs.get(&big_handle),
            Some(big) if big.role == BigRole::Receiver && big.state == BigState::Terminating
        );
        if !terminating {
            warn!("BIG terminate sync complete for 0x{:02X} with no request", big_handle);
            return;
        }
        if status.is_success() {
            self.bigs.remove(&big_handle);
            out.notify(HostEvent::BigSyncTerminated {
                big_handle,
                result: Ok(()),
            });
        } else {
            if let Some(big) = self.bigs.get_mut(&big_handle) {
                set_big_state(big, BigState::SyncEstablished);
            }
            out.notify(HostEvent::BigSyncTerminated {
                big_handle,
                result: Err(Error::from_status(status)),
            });
        }
    }

    pub fn on_big_sync_lost(&mut self, out: &mut Outbox, big_handle: u8, reason: Status) {
        match self.bigs.remove(&big_handle) {
            Some(big) => {
                for handle in &big.bis_handles {
                    self.drop_data_paths(*handle);
                }
                warn!("Lost sync to BIG 0x{:02X}: {}", big_handle, reason);
                out.notify(HostEvent::BigSyncLost { big_handle, reason });
            }
            None => debug!("Sync lost for unknown BIG 0x{:02X}", big_handle),
        }
    }

    /// Report every in-flight operation as aborted and forget all state
    pub fn abort_all(&mut self, out: &mut Outbox) {
        let mut aborted: Vec<Operation> = Vec::new();
        let mut cig_ids: Vec<u8> = self.pending_cigs.keys().copied().collect();
        cig_ids.sort_unstable();
        aborted.extend(cig_ids.into_iter().map(Operation::CigConfiguration));
        let mut removing: Vec<u8> = self.removing.iter().copied().collect();
        removing.sort_unstable();
        aborted.extend(removing.into_iter().map(Operation::CigRemoval));

        let mut cis: Vec<u16> = self
            .cis
            .values()
            .filter(|c| matches!(c.state, CisState::Created | CisState::Disconnecting))
            .map(|c| c.handle)
            .collect();
        cis.sort_unstable();
        aborted.extend(cis.into_iter().map(Operation::Cis));

        let mut paths: Vec<u16> = self.pending_paths.keys().map(|(h, _)| *h).collect();
        paths.sort_unstable();
        paths.dedup();
        aborted.extend(paths.into_iter().map(Operation::DataPath));

        let mut bigs: Vec<&Big> = self
            .bigs
            .values()
            .filter(|b| matches!(b.state, BigState::Created | BigState::Terminating))
            .collect();
        bigs.sort_unstable_by_key(|b| b.handle);
        aborted.extend(bigs.into_iter().map(|b| match b.role {
            BigRole::Broadcaster => Operation::Big(b.handle),
            BigRole::Receiver => Operation::BigSync(b.handle),
        }));

        for operation in aborted {
            out.notify(HostEvent::OperationAborted { operation });
        }
        *self = Self::new();
    }
}

fn set_cis_state(cis: &mut Cis, next: CisState) {
    debug!("CIS 0x{:04X} {:?} -> {:?}", cis.handle, cis.state, next);
    cis.state = next;
}

fn set_big_state(big: &mut Big, next: BigState) {
    debug!("BIG 0x{:02X} {:?} -> {:?}", big.handle, big.state, next);
    big.state = next;
}
