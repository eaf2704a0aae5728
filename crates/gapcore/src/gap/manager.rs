//! GAP state machine
//!
//! Drives advertising, scanning, connection initiation, disconnection and
//! parameter updates. Every operation is a request, then a confirmation that
//! only says the controller took the command, then an indication with the
//! real outcome. Only indications move registry state.

use super::connection::*;
use super::types::*;
use crate::error::{Error, Result};
use crate::hci::{AdvertisingReport, Command, ConnectionComplete, Outbox, Status};
use crate::host::{HostEvent, Operation};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};

/// Application decisions the GAP layer asks for synchronously
pub trait GapPolicy {
    /// Keep a connection a peer made to us while advertising
    fn accept_connection(&self, _handle: u16, _peer: &PeerAddress) -> bool {
        true
    }

    /// Accept a peer's connection parameter request
    fn accept_parameter_update(&self, _handle: u16, _params: &ConnectionParams) -> bool {
        true
    }
}

/// Policy that accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl GapPolicy for AcceptAll {}

/// Progress of a command awaiting its indication
///
/// A failed confirmation ends the operation at once with its terminal
/// event, so it is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Sent, no confirmation yet
    Pending,
    /// The controller accepted the command
    Accepted,
}

/// Connection initiation sub-state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initiation {
    Idle,
    Initiating { peer: PeerAddress, outcome: Outcome },
    Cancelling { peer: PeerAddress },
}

/// State of advertising or scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Stopped,
    Starting,
    Active,
    Stopping,
}

impl Activity {
    fn in_flight(&self) -> bool {
        matches!(self, Activity::Starting | Activity::Stopping)
    }
}

#[derive(Debug)]
pub struct GapManager {
    default_params: ConnectionParams,
    advertising: Activity,
    adv_params: AdvertisingParams,
    scanning: Activity,
    scan_params: ScanParams,
    initiation: Initiation,
    disconnects: HashMap<u16, Outcome>,
    updates: HashMap<u16, Outcome>,
    phy_updates: HashMap<u16, Outcome>,
    /// Peripheral links the policy refused; no application events for them
    rejected: HashSet<u16>,
}

impl GapManager {
    pub fn new(default_params: ConnectionParams) -> Self {
        Self {
            default_params,
            advertising: Activity::Stopped,
            adv_params: AdvertisingParams::default(),
            scanning: Activity::Stopped,
            scan_params: ScanParams::default(),
            initiation: Initiation::Idle,
            disconnects: HashMap::new(),
            updates: HashMap::new(),
            phy_updates: HashMap::new(),
            rejected: HashSet::new(),
        }
    }

    pub fn advertising(&self) -> Activity {
        self.advertising
    }

    pub fn scanning(&self) -> Activity {
        self.scanning
    }

    pub fn initiation(&self) -> &Initiation {
        &self.initiation
    }

    pub fn disconnect_outcome(&self, handle: u16) -> Option<&Outcome> {
        self.disconnects.get(&handle)
    }

    // Advertising and scanning

    pub fn start_advertising(&mut self, out: &mut Outbox, params: AdvertisingParams) -> Result<()> {
        match self.advertising {
            a if a.in_flight() => return Err(Error::Busy),
            Activity::Active => return Err(Error::CommandDisallowed("already advertising")),
            _ => {}
        }
        out.send(Command::SetAdvertisingEnable {
            enable: true,
            params,
        })?;
        self.adv_params = params;
        self.set_advertising(Activity::Starting);
        Ok(())
    }

    pub fn stop_advertising(&mut self, out: &mut Outbox) -> Result<()> {
        match self.advertising {
            a if a.in_flight() => return Err(Error::Busy),
            Activity::Stopped => return Err(Error::CommandDisallowed("not advertising")),
            _ => {}
        }
        out.send(Command::SetAdvertisingEnable {
            enable: false,
            params: self.adv_params,
        })?;
        self.set_advertising(Activity::Stopping);
        Ok(())
    }

    pub fn start_scanning(&mut self, out: &mut Outbox, params: ScanParams) -> Result<()> {
        match self.scanning {
            s if s.in_flight() => return Err(Error::Busy),
            Activity::Active => return Err(Error::CommandDisallowed("already scanning")),
            _ => {}
        }
        out.send(Command::SetScanEnable {
            enable: true,
            params,
        })?;
        self.scan_params = params;
        self.set_scanning(Activity::Starting);
        Ok(())
    }

    pub fn stop_scanning(&mut self, out: &mut Outbox) -> Result<()> {
        match self.scanning {
            s if s.in_flight() => return Err(Error::Busy),
            Activity::Stopped => return Err(Error::CommandDisallowed("not scanning")),
            _ => {}
        }
        out.send(Command::SetScanEnable {
            enable: false,
            params: self.scan_params,
        })?;
        self.set_scanning(Activity::Stopping);
        Ok(())
    }

    pub fn on_advertising_enable_complete(&mut self, out: &mut Outbox, status: Status) {
        let (next, enabled) = match (self.advertising, status.is_success()) {
            (Activity::Starting, true) => (Activity::Active, true),
            (Activity::Starting, false) => (Activity::Stopped, true),
            (Activity::Stopping, true) => (Activity::Stopped, false),
            (Activity::Stopping, false) => (Activity::Active, false),
            (state, _) => {
                warn!("Advertising enable complete while {:?}", state);
                return;
            }
        };
        self.set_advertising(next);
        out.notify(HostEvent::AdvertisingChanged {
            enabled,
            result: status_result(status),
        });
    }

    pub fn on_scan_enable_complete(&mut self, out: &mut Outbox, status: Status) {
        let (next, enabled) = match (self.scanning, status.is_success()) {
            (Activity::Starting, true) => (Activity::Active, true),
            (Activity::Starting, false) => (Activity::Stopped, true),
            (Activity::Stopping, true) => (Activity::Stopped, false),
            (Activity::Stopping, false) => (Activity::Active, false),
            (state, _) => {
                warn!("Scan enable complete while {:?}", state);
                return;
            }
        };
        self.set_scanning(next);
        out.notify(HostEvent::ScanningChanged {
            enabled,
            result: status_result(status),
        });
    }

    pub fn on_advertising_report(&mut self, out: &mut Outbox, report: AdvertisingReport) {
        if self.scanning != Activity::Active {
            debug!("Advertising report from {} while not scanning", report.peer);
        }
        out.notify(HostEvent::AdvertisingReport(report));
    }

    // Connection establishment

    /// Start connecting to `peer` as central
    pub fn create_connection(
        &mut self,
        out: &mut Outbox,
        registry: &ConnectionRegistry,
        peer: PeerAddress,
        params: Option<ConnectionParams>,
    ) -> Result<()> {
        if self.initiation != Initiation::Idle {
            return Err(Error::Busy);
        }
        let params = params.unwrap_or(self.default_params);
        if !params.is_valid() {
            return Err(Error::CommandDisallowed("invalid connection parameters"));
        }
        if registry.lookup_by_address(&peer.address).is_some() {
            return Err(Error::CommandDisallowed("peer already connected"));
        }
        out.send(Command::CreateConnection { peer, params })?;
        self.set_initiation(Initiation::Initiating {
            peer,
            outcome: Outcome::Pending,
        });
        Ok(())
    }

    /// Cancel the outstanding connection attempt
    pub fn cancel_connection(&mut self, out: &mut Outbox) -> Result<()> {
        let peer = match &self.initiation {
            Initiation::Initiating { peer, .. } => *peer,
            Initiation::Cancelling { .. } => return Err(Error::Busy),
            Initiation::Idle => {
                return Err(Error::CommandDisallowed("no connection being initiated"))
            }
        };
        out.send(Command::CreateConnectionCancel)?;
        self.set_initiation(Initiation::Cancelling { peer });
        Ok(())
    }

    pub fn on_create_connection_status(&mut self, out: &mut Outbox, status: Status) {
        let peer = match &self.initiation {
            Initiation::Initiating {
                peer,
                outcome: Outcome::Pending,
            } => *peer,
            other => {
                warn!("Create connection status while {:?}", other);
                return;
            }
        };
        if status.is_success() {
            self.initiation = Initiation::Initiating {
                peer,
                outcome: Outcome::Accepted,
            };
            return;
        }
        self.set_initiation(Initiation::Idle);
        out.notify(HostEvent::ConnectionFailed {
            peer,
            error: Error::from_status(status),
        });
    }

    pub fn on_create_connection_cancel_complete(&mut self, out: &mut Outbox, status: Status) {
        let peer = match &self.initiation {
            Initiation::Cancelling { peer } => *peer,
            other => {
                warn!("Cancel complete while {:?}", other);
                return;
            }
        };
        if status.is_success() {
            self.set_initiation(Initiation::Idle);
            out.notify(HostEvent::ConnectionCancelled { peer });
        } else {
            // Too late to cancel; the connection-complete indication decides.
            warn!("Cancel of connection to {} rejected: {}", peer, status);
            self.set_initiation(Initiation::Initiating {
                peer,
                outcome: Outcome::Accepted,
            });
        }
    }

    pub fn on_connection_complete(
        &mut self,
        out: &mut Outbox,
        registry: &mut ConnectionRegistry,
        policy: &dyn GapPolicy,
        event: ConnectionComplete,
    ) -> Result<()> {
        if !event.status.is_success() {
            self.connection_failed(out, event);
            return Ok(());
        }

        let mut connection = Connection::new(event.handle, event.role, event.peer, event.params);
        connection.local_rpa = event.local_rpa;
        connection.peer_rpa = event.peer_rpa;
        if let Err(error) = registry.on_connection_established(connection) {
            if event.role == Role::Central {
                self.attempt_failed(out, error.clone());
            }
            return Err(error);
        }

        match event.role {
            Role::Central => {
                if self.initiation == Initiation::Idle {
                    debug!("Connection to {} completed after cancel", event.peer);
                }
                self.set_initiation(Initiation::Idle);
            }
            Role::Peripheral => {
                if self.advertising == Activity::Active {
                    self.set_advertising(Activity::Stopped);
                    out.notify(HostEvent::AdvertisingChanged {
                        enabled: false,
                        result: Ok(()),
                    });
                }
                if !policy.accept_connection(event.handle, &event.peer) {
                    info!("Rejecting connection from {}", event.peer);
                    self.rejected.insert(event.handle);
                    if let Err(error) =
                        self.disconnect(out, registry, event.handle, Status::RemoteUserTerminated)
                    {
                        self.rejected.remove(&event.handle);
                        out.notify(HostEvent::DisconnectFailed {
                            handle: event.handle,
                            error: error.clone(),
                        });
                        return Err(error);
                    }
                    return Ok(());
                }
            }
        }

        info!(
            "Connected to {} on handle 0x{:04X} as {:?}",
            event.peer, event.handle, event.role
        );
        out.notify(HostEvent::Connected {
            handle: event.handle,
            role: event.role,
            peer: event.peer,
        });
        Ok(())
    }

    /// End the outstanding central attempt with the given error
    fn attempt_failed(&mut self, out: &mut Outbox, error: Error) {
        let peer = match &self.initiation {
            Initiation::Initiating { peer, .. } | Initiation::Cancelling { peer } => *peer,
            Initiation::Idle => return,
        };
        self.set_initiation(Initiation::Idle);
        out.notify(HostEvent::ConnectionFailed { peer, error });
    }

    fn connection_failed(&mut self, out: &mut Outbox, event: ConnectionComplete) {
        match (&self.initiation, event.role) {
            (Initiation::Initiating { peer, .. }, Role::Central) => {
                let peer = *peer;
                self.set_initiation(Initiation::Idle);
                out.notify(HostEvent::ConnectionFailed {
                    peer,
                    error: Error::from_status(event.status),
                });
            }
            (Initiation::Cancelling { peer }, Role::Central) => {
                let peer = *peer;
                self.set_initiation(Initiation::Idle);
                out.notify(HostEvent::ConnectionCancelled { peer });
            }
            (_, Role::Peripheral) if self.advertising == Activity::Active => {
                self.set_advertising(Activity::Stopped);
                out.notify(HostEvent::AdvertisingChanged {
                    enabled: false,
                    result: Err(Error::from_status(event.status)),
                });
            }
            _ => debug!(
                "Ignoring failed connection complete ({}) with no attempt outstanding",
                event.status
            ),
        }
    }

    // Disconnection

    /// Ask the controller to drop the link
    ///
    /// The registry entry stays until the disconnection-complete indication.
    pub fn disconnect(
        &mut self,
        out: &mut Outbox,
        registry: &mut ConnectionRegistry,
        handle: u16,
        reason: Status,
    ) -> Result<()> {
        let connection = registry.lookup(handle).ok_or(Error::UnknownHandle(handle))?;
        if connection.state == LinkState::Disconnecting {
            return Err(Error::Busy);
        }
        out.send(Command::Disconnect { handle, reason })?;
        registry.set_state(handle, LinkState::Disconnecting)?;
        self.disconnects.insert(handle, Outcome::Pending);
        debug!("Handle 0x{:04X} Connected -> Disconnecting", handle);
        Ok(())
    }

    pub fn on_disconnect_status(
        &mut self,
        out: &mut Outbox,
        registry: &mut ConnectionRegistry,
        handle: u16,
        status: Status,
    ) {
        if !self.disconnects.contains_key(&handle) {
            warn!("Disconnect status for handle 0x{:04X} with no request", handle);
            return;
        }
        if status.is_success() {
            self.disconnects.insert(handle, Outcome::Accepted);
            return;
        }
        self.disconnects.remove(&handle);
        if registry.set_state(handle, LinkState::Connected).is_ok() {
            debug!("Handle 0x{:04X} Disconnecting -> Connected", handle);
        }
        self.rejected.remove(&handle);
        out.notify(HostEvent::DisconnectFailed {
            handle,
            error: Error::from_status(status),
        });
    }

    pub fn on_disconnection_complete(
        &mut self,
        out: &mut Outbox,
        registry: &mut ConnectionRegistry,
        handle: u16,
        reason: Status,
    ) {
        self.disconnects.remove(&handle);
        if self.updates.remove(&handle).is_some() {
            out.notify(HostEvent::ConnectionUpdated {
                handle,
                result: Err(Error::Disconnected(reason)),
            });
        }
        if self.phy_updates.remove(&handle).is_some() {
            out.notify(HostEvent::PhyUpdated {
                handle,
                result: Err(Error::Disconnected(reason)),
            });
        }

        let rejected = self.rejected.remove(&handle);
        if let Some(connection) = registry.on_disconnected(handle, reason) {
            info!("Disconnected from {}: {}", connection.peer, reason);
            if !rejected {
                out.notify(HostEvent::Disconnected {
                    handle,
                    peer: connection.peer,
                    reason,
                });
            }
        }
    }

    // Parameter and PHY updates

    pub fn update_connection(
        &mut self,
        out: &mut Outbox,
        registry: &ConnectionRegistry,
        handle: u16,
        params: ConnectionParams,
    ) -> Result<()> {
        let connection = registry.lookup(handle).ok_or(Error::UnknownHandle(handle))?;
        if connection.state == LinkState::Disconnecting {
            return Err(Error::CommandDisallowed("link is disconnecting"));
        }
        if !params.is_valid() {
            return Err(Error::CommandDisallowed("invalid connection parameters"));
        }
        if self.updates.contains_key(&handle) {
            return Err(Error::Busy);
        }
        out.send(Command::ConnectionUpdate { handle, params })?;
        self.updates.insert(handle, Outcome::Pending);
        Ok(())
    }

    pub fn on_connection_update_status(&mut self, out: &mut Outbox, handle: u16, status: Status) {
        if !self.updates.contains_key(&handle) {
            warn!("Update status for handle 0x{:04X} with no request", handle);
            return;
        }
        if status.is_success() {
            self.updates.insert(handle, Outcome::Accepted);
        } else {
            self.updates.remove(&handle);
            out.notify(HostEvent::ConnectionUpdated {
                handle,
                result: Err(Error::from_status(status)),
            });
        }
    }

    pub fn on_connection_update_complete(
        &mut self,
        out: &mut Outbox,
        registry: &mut ConnectionRegistry,
        handle: u16,
        status: Status,
        params: LinkParameters,
    ) -> Result<()> {
        let requested = self.updates.remove(&handle).is_some();
        if !status.is_success() {
            if requested {
                out.notify(HostEvent::ConnectionUpdated {
                    handle,
                    result: Err(Error::from_status(status)),
                });
            } else {
                warn!("Unrequested update on 0x{:04X} failed: {}", handle, status);
            }
            return Ok(());
        }
        registry.on_connection_updated(handle, params)?;
        out.notify(HostEvent::ConnectionUpdated {
            handle,
            result: Ok(params),
        });
        Ok(())
    }

    /// Answer a peer's parameter request before anything else happens
    ///
    /// Accepting does not change the link; the update-complete indication
    /// does.
    pub fn on_remote_parameter_request(
        &mut self,
        out: &mut Outbox,
        registry: &ConnectionRegistry,
        policy: &dyn GapPolicy,
        handle: u16,
        params: ConnectionParams,
    ) -> Result<()> {
        let reply = if registry.lookup(handle).is_none() {
            warn!("Parameter request on unknown handle 0x{:04X}", handle);
            Command::RemoteParamRequestNegativeReply {
                handle,
                reason: Status::UnknownConnectionId,
            }
        } else if !params.is_valid() {
            Command::RemoteParamRequestNegativeReply {
                handle,
                reason: Status::InvalidParameters,
            }
        } else if policy.accept_parameter_update(handle, &params) {
            Command::RemoteParamRequestReply { handle, params }
        } else {
            debug!("Parameter request on 0x{:04X} refused by policy", handle);
            Command::RemoteParamRequestNegativeReply {
                handle,
                reason: Status::UnacceptableConnectionParameters,
            }
        };
        out.send(reply)
    }

    pub fn set_phy(
        &mut self,
        out: &mut Outbox,
        registry: &ConnectionRegistry,
        handle: u16,
        phy: PhyPair,
    ) -> Result<()> {
        if registry.lookup(handle).is_none() {
            return Err(Error::UnknownHandle(handle));
        }
        if self.phy_updates.contains_key(&handle) {
            return Err(Error::Busy);
        }
        out.send(Command::SetPhy { handle, phy })?;
        self.phy_updates.insert(handle, Outcome::Pending);
        Ok(())
    }

    pub fn on_phy_update_status(&mut self, out: &mut Outbox, handle: u16, status: Status) {
        if status.is_success() {
            if let Some(outcome) = self.phy_updates.get_mut(&handle) {
                *outcome = Outcome::Accepted;
            }
        } else if self.phy_updates.remove(&handle).is_some() {
            out.notify(HostEvent::PhyUpdated {
                handle,
                result: Err(Error::from_status(status)),
            });
        }
    }

    pub fn on_phy_update_complete(
        &mut self,
        out: &mut Outbox,
        registry: &mut ConnectionRegistry,
        handle: u16,
        status: Status,
        phy: PhyPair,
    ) -> Result<()> {
        let requested = self.phy_updates.remove(&handle).is_some();
        if !status.is_success() {
            if requested {
                out.notify(HostEvent::PhyUpdated {
                    handle,
                    result: Err(Error::from_status(status)),
                });
            }
            return Ok(());
        }
        registry.set_phy(handle, phy)?;
        out.notify(HostEvent::PhyUpdated {
            handle,
            result: Ok(phy),
        });
        Ok(())
    }

    /// Drop all state, reporting every in-flight operation as aborted
    pub fn abort_all(&mut self, out: &mut Outbox) {
        if self.advertising.in_flight() {
            out.notify(HostEvent::OperationAborted {
                operation: Operation::Advertising,
            });
        }
        if self.scanning.in_flight() {
            out.notify(HostEvent::OperationAborted {
                operation: Operation::Scanning,
            });
        }
        if self.initiation != Initiation::Idle {
            out.notify(HostEvent::OperationAborted {
                operation: Operation::Connect,
            });
        }
        let pending = sorted_handles(&self.disconnects)
            .into_iter()
            .map(Operation::Disconnect)
            .chain(sorted_handles(&self.updates).into_iter().map(Operation::ConnectionUpdate))
            .chain(sorted_handles(&self.phy_updates).into_iter().map(Operation::PhyUpdate));
        for operation in pending {
            out.notify(HostEvent::OperationAborted { operation });
        }
        *self = Self::new(self.default_params);
    }

    fn set_advertising(&mut self, next: Activity) {
        debug!("Advertising {:?} -> {:?}", self.advertising, next);
        self.advertising = next;
    }

    fn set_scanning(&mut self, next: Activity) {
        debug!("Scanning {:?} -> {:?}", self.scanning, next);
        self.scanning = next;
    }

    fn set_initiation(&mut self, next: Initiation) {
        debug!("Initiation {:?} -> {:?}", self.initiation, next);
        self.initiation = next;
    }
}

fn sorted_handles(map: &HashMap<u16, Outcome>) -> Vec<u16> {
    let mut handles: Vec<u16> = map.keys().copied().collect();
    handles.sort_unstable();
    handles
}

fn status_result(status: Status) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::from_status(status))
    }
}
