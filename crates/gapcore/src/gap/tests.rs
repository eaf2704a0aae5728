//! Unit tests for the connection registry and the GAP state machine

use super::*;
use crate::error::Error;
use crate::hci::mock::RecordingTransport;
use crate::hci::{AdvertisingReport, Command, ConnectionComplete, Outbox, Status};
use crate::host::{HostEvent, Operation};
use crate::smp::SecurityLevel;

fn addr(last: u8) -> BdAddr {
    BdAddr::new([last, 0x44, 0x33, 0x22, 0x11, 0x00])
}

fn link() -> LinkParameters {
    LinkParameters {
        interval: 0x0018,
        latency: 0,
        supervision_timeout: 0x0190,
    }
}

fn complete(status: Status, handle: u16, role: Role, peer: PeerAddress) -> ConnectionComplete {
    ConnectionComplete {
        status,
        handle,
        role,
        peer,
        params: link(),
        local_rpa: None,
        peer_rpa: None,
    }
}

struct Fixture {
    transport: RecordingTransport,
    out: Outbox,
    registry: ConnectionRegistry,
    gap: GapManager,
}

impl Fixture {
    fn new() -> Self {
        let transport = RecordingTransport::new();
        Self {
            out: Outbox::new(Box::new(transport.clone())),
            transport,
            registry: ConnectionRegistry::new(),
            gap: GapManager::new(ConnectionParams::default()),
        }
    }

    /// Run a central connection to completion on `handle`
    fn connect(&mut self, handle: u16, peer: PeerAddress) {
        self.gap
            .create_connection(&mut self.out, &self.registry, peer, None)
            .unwrap();
        self.gap
            .on_create_connection_status(&mut self.out, Status::Success);
        self.gap
            .on_connection_complete(
                &mut self.out,
                &mut self.registry,
                &AcceptAll,
                complete(Status::Success, handle, Role::Central, peer),
            )
            .unwrap();
        self.out.drain();
    }
}

struct RejectAll;

impl GapPolicy for RejectAll {
    fn accept_connection(&self, _handle: u16, _peer: &PeerAddress) -> bool {
        false
    }

    fn accept_parameter_update(&self, _handle: u16, _params: &ConnectionParams) -> bool {
        false
    }
}

// Connection registry

#[test]
fn test_registry_lifecycle() {
    let mut registry = ConnectionRegistry::new();
    let peer = PeerAddress::public(addr(0x55));
    registry
        .on_connection_established(Connection::new(0x0040, Role::Central, peer, link()))
        .unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.lookup(0x0040).unwrap().peer, peer);
    assert_eq!(registry.lookup_by_address(&addr(0x55)).unwrap().handle, 0x0040);
    assert!(registry.lookup(0x0041).is_none());

    let updated = LinkParameters {
        interval: 0x0028,
        latency: 4,
        supervision_timeout: 0x0200,
    };
    registry.on_connection_updated(0x0040, updated).unwrap();
    assert_eq!(registry.lookup(0x0040).unwrap().params, updated);

    let removed = registry.on_disconnected(0x0040, Status::RemoteUserTerminated);
    assert_eq!(removed.unwrap().handle, 0x0040);
    assert!(registry.is_empty());
}

#[test]
fn test_registry_rejects_duplicate_handle() {
    let mut registry = ConnectionRegistry::new();
    let first = PeerAddress::public(addr(0x01));
    let second = PeerAddress::public(addr(0x02));
    registry
        .on_connection_established(Connection::new(0x0040, Role::Central, first, link()))
        .unwrap();

    let result =
        registry.on_connection_established(Connection::new(0x0040, Role::Central, second, link()));
    assert_eq!(result, Err(Error::DuplicateHandle(0x0040)));
    assert_eq!(registry.lookup(0x0040).unwrap().peer, first);
}

#[test]
fn test_registry_handle_reuse_after_disconnect() {
    let mut registry = ConnectionRegistry::new();
    let first = PeerAddress::public(addr(0x01));
    let second = PeerAddress::random(addr(0x02));
    registry
        .on_connection_established(Connection::new(0x0040, Role::Central, first, link()))
        .unwrap();
    registry.on_disconnected(0x0040, Status::RemoteUserTerminated);

    registry
        .on_connection_established(Connection::new(0x0040, Role::Peripheral, second, link()))
        .unwrap();
    let connection = registry.lookup(0x0040).unwrap();
    assert_eq!(connection.peer, second);
    assert_eq!(connection.role, Role::Peripheral);
    assert_eq!(connection.security, SecurityLevel::None);
    assert!(registry.lookup_by_address(&addr(0x01)).is_none());
}

#[test]
fn test_registry_unknown_handles() {
    let mut registry = ConnectionRegistry::new();
    assert_eq!(
        registry.on_connection_updated(0x0099, link()),
        Err(Error::UnknownHandle(0x0099))
    );
    assert!(registry
        .on_disconnected(0x0099, Status::ConnectionTimeout)
        .is_none());
    assert_eq!(
        registry.set_security(0x0099, SecurityLevel::Authenticated, 16),
        Err(Error::UnknownHandle(0x0099))
    );
}

#[test]
fn test_registry_identity_lookup() {
    let mut registry = ConnectionRegistry::new();
    let rpa = PeerAddress::random(addr(0x70));
    let identity = PeerAddress::new(AddressType::PublicIdentity, addr(0x01));
    registry
        .on_connection_established(Connection::new(0x0041, Role::Central, rpa, link()))
        .unwrap();

    registry.set_identity(0x0041, identity).unwrap();
    assert_eq!(registry.lookup_by_address(&addr(0x01)).unwrap().handle, 0x0041);
    assert_eq!(registry.lookup(0x0041).unwrap().identity_address(), identity);

    // Same address as the connection: nothing separate to remember
    let mut registry = ConnectionRegistry::new();
    let peer = PeerAddress::public(addr(0x02));
    registry
        .on_connection_established(Connection::new(0x0042, Role::Central, peer, link()))
        .unwrap();
    registry.set_identity(0x0042, peer).unwrap();
    assert_eq!(registry.lookup(0x0042).unwrap().identity, None);
}

#[test]
fn test_registry_handles_sorted() {
    let mut registry = ConnectionRegistry::new();
    for handle in [0x0043, 0x0040, 0x0042] {
        let peer = PeerAddress::public(addr(handle as u8));
        registry
            .on_connection_established(Connection::new(handle, Role::Central, peer, link()))
            .unwrap();
    }
    assert_eq!(registry.handles(), vec![0x0040, 0x0042, 0x0043]);
}

#[test]
fn test_address_type_codes() {
    for addr_type in [
        AddressType::Public,
        AddressType::Random,
        AddressType::PublicIdentity,
        AddressType::RandomIdentity,
    ] {
        assert_eq!(AddressType::try_from(u8::from(addr_type)), Ok(addr_type));
    }
    assert_eq!(AddressType::try_from(0x04), Err(0x04));
}

// Advertising and scanning

#[test]
fn test_advertising_lifecycle() {
    let mut f = Fixture::new();
    f.gap
        .start_advertising(&mut f.out, AdvertisingParams::default())
        .unwrap();
    assert_eq!(f.gap.advertising(), Activity::Starting);
    assert_eq!(
        f.gap.start_advertising(&mut f.out, AdvertisingParams::default()),
        Err(Error::Busy)
    );

    f.gap
        .on_advertising_enable_complete(&mut f.out, Status::Success);
    assert_eq!(f.gap.advertising(), Activity::Active);
    assert_eq!(
        f.out.poll(),
        Some(HostEvent::AdvertisingChanged {
            enabled: true,
            result: Ok(())
        })
    );

    f.gap.stop_advertising(&mut f.out).unwrap();
    f.gap
        .on_advertising_enable_complete(&mut f.out, Status::Success);
    assert_eq!(f.gap.advertising(), Activity::Stopped);
    assert_eq!(
        f.gap.stop_advertising(&mut f.out),
        Err(Error::CommandDisallowed("not advertising"))
    );
}

#[test]
fn test_scan_rejected_by_controller() {
    let mut f = Fixture::new();
    f.gap
        .start_scanning(&mut f.out, ScanParams::default())
        .unwrap();
    f.gap
        .on_scan_enable_complete(&mut f.out, Status::CommandDisallowed);

    assert_eq!(f.gap.scanning(), Activity::Stopped);
    assert!(matches!(
        f.out.poll(),
        Some(HostEvent::ScanningChanged {
            enabled: true,
            result: Err(Error::CommandDisallowed(_))
        })
    ));
}

#[test]
fn test_advertising_reports_forwarded() {
    let mut f = Fixture::new();
    let report = AdvertisingReport {
        peer: PeerAddress::random(addr(0x10)),
        rssi: -60,
        connectable: true,
        data: vec![0x02, 0x01, 0x06],
    };
    f.gap.on_advertising_report(&mut f.out, report.clone());
    assert_eq!(f.out.poll(), Some(HostEvent::AdvertisingReport(report)));
}

// Connection establishment

#[test]
fn test_central_connection() {
    let mut f = Fixture::new();
    let peer = PeerAddress::public(addr(0x55));
    f.gap
        .create_connection(&mut f.out, &f.registry, peer, None)
        .unwrap();
    assert_eq!(
        f.transport.last(),
        Some(Command::CreateConnection {
            peer,
            params: ConnectionParams::default()
        })
    );
    assert_eq!(
        f.gap.create_connection(&mut f.out, &f.registry, peer, None),
        Err(Error::Busy)
    );

    // Confirmation alone registers nothing
    f.gap
        .on_create_connection_status(&mut f.out, Status::Success);
    assert!(f.registry.is_empty());
    assert_eq!(f.out.pending_events(), 0);

    f.gap
        .on_connection_complete(
            &mut f.out,
            &mut f.registry,
            &AcceptAll,
            complete(Status::Success, 0x0040, Role::Central, peer),
        )
        .unwrap();
    assert_eq!(*f.gap.initiation(), Initiation::Idle);
    assert!(f.registry.contains(0x0040));
    assert_eq!(
        f.out.poll(),
        Some(HostEvent::Connected {
            handle: 0x0040,
            role: Role::Central,
            peer
        })
    );
}

#[test]
fn test_create_connection_rejections() {
    let mut f = Fixture::new();
    let peer = PeerAddress::public(addr(0x55));

    let invalid = ConnectionParams {
        interval_min: 0x0040,
        interval_max: 0x0020,
        ..ConnectionParams::default()
    };
    assert!(matches!(
        f.gap
            .create_connection(&mut f.out, &f.registry, peer, Some(invalid)),
        Err(Error::CommandDisallowed(_))
    ));

    f.connect(0x0040, peer);
    assert_eq!(
        f.gap.create_connection(&mut f.out, &f.registry, peer, None),
        Err(Error::CommandDisallowed("peer already connected"))
    );
}

#[test]
fn test_create_connection_send_failure_changes_nothing() {
    let mut f = Fixture::new();
    f.transport.fail_next_send();
    let result =
        f.gap
            .create_connection(&mut f.out, &f.registry, PeerAddress::public(addr(0x55)), None);
    assert!(matches!(result, Err(Error::Transport(_))));
    assert_eq!(*f.gap.initiation(), Initiation::Idle);
}

#[test]
fn test_create_connection_confirmation_failure() {
    let mut f = Fixture::new();
    let peer = PeerAddress::public(addr(0x55));
    f.gap
        .create_connection(&mut f.out, &f.registry, peer, None)
        .unwrap();
    f.gap
        .on_create_connection_status(&mut f.out, Status::ConnectionLimitExceeded);

    assert_eq!(*f.gap.initiation(), Initiation::Idle);
    assert_eq!(
        f.out.poll(),
        Some(HostEvent::ConnectionFailed {
            peer,
            error: Error::TransportRejected(Status::ConnectionLimitExceeded)
        })
    );
    assert!(f.registry.is_empty());
}

#[test]
fn test_cancel_connection() {
    let mut f = Fixture::new();
    let peer = PeerAddress::public(addr(0x55));
    assert!(matches!(
        f.gap.cancel_connection(&mut f.out),
        Err(Error::CommandDisallowed(_))
    ));

    f.gap
        .create_connection(&mut f.out, &f.registry, peer, None)
        .unwrap();
    f.gap
        .on_create_connection_status(&mut f.out, Status::Success);
    f.gap.cancel_connection(&mut f.out).unwrap();
    assert_eq!(f.gap.cancel_connection(&mut f.out), Err(Error::Busy));

    f.gap
        .on_create_connection_cancel_complete(&mut f.out, Status::Success);
    assert_eq!(f.out.poll(), Some(HostEvent::ConnectionCancelled { peer }));

    // The controller's failure indication for the cancelled attempt is
    // not a second terminal event.
    f.gap
        .on_connection_complete(
            &mut f.out,
            &mut f.registry,
            &AcceptAll,
            complete(Status::UnknownConnectionId, 0, Role::Central, peer),
        )
        .unwrap();
    assert_eq!(f.out.pending_events(), 0);
}

#[test]
fn test_cancel_races_connection_complete() {
    let mut f = Fixture::new();
    let peer = PeerAddress::public(addr(0x55));
    f.gap
        .create_connection(&mut f.out, &f.registry, peer, None)
        .unwrap();
    f.gap
        .on_create_connection_status(&mut f.out, Status::Success);
    f.gap.cancel_connection(&mut f.out).unwrap();

    // Too late: the controller connected and refuses the cancel
    f.gap
        .on_create_connection_cancel_complete(&mut f.out, Status::CommandDisallowed);
    assert!(matches!(f.gap.initiation(), Initiation::Initiating { .. }));
    f.gap
        .on_connection_complete(
            &mut f.out,
            &mut f.registry,
            &AcceptAll,
            complete(Status::Success, 0x0040, Role::Central, peer),
        )
        .unwrap();

    assert!(f.registry.contains(0x0040));
    let events = f.out.drain();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], HostEvent::Connected { handle: 0x0040, .. }));
}

#[test]
fn test_peripheral_connection_stops_advertising() {
    let mut f = Fixture::new();
    f.gap
        .start_advertising(&mut f.out, AdvertisingParams::default())
        .unwrap();
    f.gap
        .on_advertising_enable_complete(&mut f.out, Status::Success);
    f.out.drain();

    let peer = PeerAddress::random(addr(0x20));
    f.gap
        .on_connection_complete(
            &mut f.out,
            &mut f.registry,
            &AcceptAll,
            complete(Status::Success, 0x0041, Role::Peripheral, peer),
        )
        .unwrap();

    assert_eq!(f.gap.advertising(), Activity::Stopped);
    let events = f.out.drain();
    assert_eq!(
        events,
        vec![
            HostEvent::AdvertisingChanged {
                enabled: false,
                result: Ok(())
            },
            HostEvent::Connected {
                handle: 0x0041,
                role: Role::Peripheral,
                peer
            },
        ]
    );
}

#[test]
fn test_peripheral_connection_rejected_by_policy() {
    let mut f = Fixture::new();
    let peer = PeerAddress::random(addr(0x20));
    f.gap
        .on_connection_complete(
            &mut f.out,
            &mut f.registry,
            &RejectAll,
            complete(Status::Success, 0x0041, Role::Peripheral, peer),
        )
        .unwrap();

    assert_eq!(
        f.transport.last(),
        Some(Command::Disconnect {
            handle: 0x0041,
            reason: Status::RemoteUserTerminated
        })
    );
    assert_eq!(
        f.registry.lookup(0x0041).unwrap().state,
        LinkState::Disconnecting
    );

    f.gap.on_disconnection_complete(
        &mut f.out,
        &mut f.registry,
        0x0041,
        Status::LocalHostTerminated,
    );
    assert!(f.registry.is_empty());
    assert_eq!(f.out.pending_events(), 0);
}

#[test]
fn test_duplicate_connection_complete_is_rejected() {
    let mut f = Fixture::new();
    f.connect(0x0040, PeerAddress::public(addr(0x01)));
    let result = f.gap.on_connection_complete(
        &mut f.out,
        &mut f.registry,
        &AcceptAll,
        complete(
            Status::Success,
            0x0040,
            Role::Peripheral,
            PeerAddress::public(addr(0x02)),
        ),
    );
    assert_eq!(result, Err(Error::DuplicateHandle(0x0040)));
    assert_eq!(f.registry.len(), 1);
}

#[test]
fn test_duplicate_handle_ends_central_attempt() {
    let mut f = Fixture::new();
    f.connect(0x0040, PeerAddress::public(addr(0x01)));
    let second = PeerAddress::public(addr(0x02));
    f.gap
        .create_connection(&mut f.out, &f.registry, second, None)
        .unwrap();
    f.gap
        .on_create_connection_status(&mut f.out, Status::Success);

    let result = f.gap.on_connection_complete(
        &mut f.out,
        &mut f.registry,
        &AcceptAll,
        complete(Status::Success, 0x0040, Role::Central, second),
    );
    assert_eq!(result, Err(Error::DuplicateHandle(0x0040)));
    assert_eq!(*f.gap.initiation(), Initiation::Idle);
    assert_eq!(
        f.out.poll(),
        Some(HostEvent::ConnectionFailed {
            peer: second,
            error: Error::DuplicateHandle(0x0040)
        })
    );
    assert_eq!(f.out.poll(), None);

    // A new attempt is possible again
    f.gap
        .create_connection(&mut f.out, &f.registry, second, None)
        .unwrap();
}

#[test]
fn test_rejected_link_disconnect_send_failure() {
    let mut f = Fixture::new();
    let peer = PeerAddress::random(addr(0x20));
    f.transport.fail_next_send();
    let result = f.gap.on_connection_complete(
        &mut f.out,
        &mut f.registry,
        &RejectAll,
        complete(Status::Success, 0x0041, Role::Peripheral, peer),
    );
    assert!(matches!(result, Err(Error::Transport(_))));
    assert_eq!(f.registry.lookup(0x0041).unwrap().state, LinkState::Connected);
    assert!(matches!(
        f.out.poll(),
        Some(HostEvent::DisconnectFailed {
            handle: 0x0041,
            error: Error::Transport(_)
        })
    ));

    // The link is now reported like any other
    f.gap.on_disconnection_complete(
        &mut f.out,
        &mut f.registry,
        0x0041,
        Status::RemoteUserTerminated,
    );
    assert_eq!(
        f.out.poll(),
        Some(HostEvent::Disconnected {
            handle: 0x0041,
            peer,
            reason: Status::RemoteUserTerminated
        })
    );
}

// Disconnection

#[test]
fn test_disconnect_waits_for_indication() {
    let mut f = Fixture::new();
    let peer = PeerAddress::public(addr(0x55));
    f.connect(0x0040, peer);

    f.gap
        .disconnect(&mut f.out, &mut f.registry, 0x0040, Status::RemoteUserTerminated)
        .unwrap();
    assert_eq!(
        f.gap
            .disconnect(&mut f.out, &mut f.registry, 0x0040, Status::RemoteUserTerminated),
        Err(Error::Busy)
    );

    f.gap
        .on_disconnect_status(&mut f.out, &mut f.registry, 0x0040, Status::Success);
    assert_eq!(f.gap.disconnect_outcome(0x0040), Some(&Outcome::Accepted));
    // Still registered until the indication
    assert!(f.registry.contains(0x0040));

    f.gap.on_disconnection_complete(
        &mut f.out,
        &mut f.registry,
        0x0040,
        Status::LocalHostTerminated,
    );
    assert!(!f.registry.contains(0x0040));
    assert_eq!(
        f.out.poll(),
        Some(HostEvent::Disconnected {
            handle: 0x0040,
            peer,
            reason: Status::LocalHostTerminated
        })
    );
}

#[test]
fn test_disconnect_rejected_restores_link() {
    let mut f = Fixture::new();
    f.connect(0x0040, PeerAddress::public(addr(0x55)));
    assert_eq!(
        f.gap
            .disconnect(&mut f.out, &mut f.registry, 0x0099, Status::RemoteUserTerminated),
        Err(Error::UnknownHandle(0x0099))
    );

    f.gap
        .disconnect(&mut f.out, &mut f.registry, 0x0040, Status::RemoteUserTerminated)
        .unwrap();
    f.gap.on_disconnect_status(
        &mut f.out,
        &mut f.registry,
        0x0040,
        Status::UnknownConnectionId,
    );

    assert_eq!(f.registry.lookup(0x0040).unwrap().state, LinkState::Connected);
    assert_eq!(
        f.out.poll(),
        Some(HostEvent::DisconnectFailed {
            handle: 0x0040,
            error: Error::TransportRejected(Status::UnknownConnectionId)
        })
    );
}

#[test]
fn test_remote_disconnect_fails_pending_update() {
    let mut f = Fixture::new();
    f.connect(0x0040, PeerAddress::public(addr(0x55)));
    f.gap
        .update_connection(&mut f.out, &f.registry, 0x0040, ConnectionParams::default())
        .unwrap();

    f.gap.on_disconnection_complete(
        &mut f.out,
        &mut f.registry,
        0x0040,
        Status::ConnectionTimeout,
    );
    let events = f.out.drain();
    assert_eq!(
        events[0],
        HostEvent::ConnectionUpdated {
            handle: 0x0040,
            result: Err(Error::Disconnected(Status::ConnectionTimeout))
        }
    );
    assert!(matches!(events[1], HostEvent::Disconnected { .. }));
}

// Parameter and PHY updates

#[test]
fn test_connection_update() {
    let mut f = Fixture::new();
    f.connect(0x0040, PeerAddress::public(addr(0x55)));
    let params = ConnectionParams {
        interval_min: 0x0030,
        interval_max: 0x0030,
        latency: 2,
        supervision_timeout: 0x0200,
    };
    f.gap
        .update_connection(&mut f.out, &f.registry, 0x0040, params)
        .unwrap();
    assert_eq!(
        f.gap
            .update_connection(&mut f.out, &f.registry, 0x0040, params),
        Err(Error::Busy)
    );
    f.gap
        .on_connection_update_status(&mut f.out, 0x0040, Status::Success);
    // Nothing applied before the indication
    assert_eq!(f.registry.lookup(0x0040).unwrap().params, link());

    let applied = LinkParameters {
        interval: 0x0030,
        latency: 2,
        supervision_timeout: 0x0200,
    };
    f.gap
        .on_connection_update_complete(
            &mut f.out,
            &mut f.registry,
            0x0040,
            Status::Success,
            applied,
        )
        .unwrap();
    assert_eq!(f.registry.lookup(0x0040).unwrap().params, applied);
    assert_eq!(
        f.out.poll(),
        Some(HostEvent::ConnectionUpdated {
            handle: 0x0040,
            result: Ok(applied)
        })
    );
}

#[test]
fn test_update_unknown_or_disconnecting() {
    let mut f = Fixture::new();
    assert_eq!(
        f.gap
            .update_connection(&mut f.out, &f.registry, 0x0040, ConnectionParams::default()),
        Err(Error::UnknownHandle(0x0040))
    );

    f.connect(0x0040, PeerAddress::public(addr(0x55)));
    f.gap
        .disconnect(&mut f.out, &mut f.registry, 0x0040, Status::RemoteUserTerminated)
        .unwrap();
    assert_eq!(
        f.gap
            .update_connection(&mut f.out, &f.registry, 0x0040, ConnectionParams::default()),
        Err(Error::CommandDisallowed("link is disconnecting"))
    );
}

#[test]
fn test_remote_parameter_request_replies() {
    let mut f = Fixture::new();
    f.connect(0x0040, PeerAddress::public(addr(0x55)));
    let params = ConnectionParams::default();

    f.gap
        .on_remote_parameter_request(&mut f.out, &f.registry, &AcceptAll, 0x0040, params)
        .unwrap();
    assert_eq!(
        f.transport.last(),
        Some(Command::RemoteParamRequestReply {
            handle: 0x0040,
            params
        })
    );
    // Accepting alone changes nothing
    assert_eq!(f.registry.lookup(0x0040).unwrap().params, link());

    f.gap
        .on_remote_parameter_request(&mut f.out, &f.registry, &RejectAll, 0x0040, params)
        .unwrap();
    assert_eq!(
        f.transport.last(),
        Some(Command::RemoteParamRequestNegativeReply {
            handle: 0x0040,
            reason: Status::UnacceptableConnectionParameters
        })
    );

    let invalid = ConnectionParams {
        supervision_timeout: 0,
        ..params
    };
    f.gap
        .on_remote_parameter_request(&mut f.out, &f.registry, &AcceptAll, 0x0040, invalid)
        .unwrap();
    assert_eq!(
        f.transport.last(),
        Some(Command::RemoteParamRequestNegativeReply {
            handle: 0x0040,
            reason: Status::InvalidParameters
        })
    );

    f.gap
        .on_remote_parameter_request(&mut f.out, &f.registry, &AcceptAll, 0x0077, params)
        .unwrap();
    assert_eq!(
        f.transport.last(),
        Some(Command::RemoteParamRequestNegativeReply {
            handle: 0x0077,
            reason: Status::UnknownConnectionId
        })
    );
}

#[test]
fn test_phy_update() {
    let mut f = Fixture::new();
    f.connect(0x0040, PeerAddress::public(addr(0x55)));
    let phy = PhyPair {
        tx: Phy::Le2M,
        rx: Phy::Le2M,
    };
    f.gap
        .set_phy(&mut f.out, &f.registry, 0x0040, phy)
        .unwrap();
    assert_eq!(
        f.gap.set_phy(&mut f.out, &f.registry, 0x0040, phy),
        Err(Error::Busy)
    );
    f.gap
        .on_phy_update_complete(&mut f.out, &mut f.registry, 0x0040, Status::Success, phy)
        .unwrap();
    assert_eq!(f.registry.lookup(0x0040).unwrap().phy, phy);
    assert_eq!(
        f.out.poll(),
        Some(HostEvent::PhyUpdated {
            handle: 0x0040,
            result: Ok(phy)
        })
    );
}

#[test]
fn test_abort_all_reports_in_flight() {
    let mut f = Fixture::new();
    f.connect(0x0040, PeerAddress::public(addr(0x01)));
    f.gap
        .start_scanning(&mut f.out, ScanParams::default())
        .unwrap();
    f.gap
        .create_connection(&mut f.out, &f.registry, PeerAddress::public(addr(0x02)), None)
        .unwrap();
    f.gap
        .disconnect(&mut f.out, &mut f.registry, 0x0040, Status::RemoteUserTerminated)
        .unwrap();

    f.gap.abort_all(&mut f.out);
    let events = f.out.drain();
    assert_eq!(
        events,
        vec![
            HostEvent::OperationAborted {
                operation: Operation::Scanning
            },
            HostEvent::OperationAborted {
                operation: Operation::Connect
            },
            HostEvent::OperationAborted {
                operation: Operation::Disconnect(0x0040)
            },
        ]
    );
    assert_eq!(f.gap.scanning(), Activity::Stopped);
    assert_eq!(*f.gap.initiation(), Initiation::Idle);
}
