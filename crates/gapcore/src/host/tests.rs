//! End-to-end tests driving the host through controller events

use super::*;
use crate::error::Error;
use crate::gap::{AcceptAll, AddressType, LinkParameters, Role};
use crate::hci::mock::RecordingTransport;
use crate::hci::{Command, ConnectionComplete};
use crate::iso::{CisAssignment, CisConfig, CisState};
use crate::smp::constants::SMP_REASON_REPEATED_ATTEMPTS;
use crate::smp::{
    AuthReq, BondKeys, BondingDecision, FixedSecurity, IoCapability, KeyType, LongTermKey,
    PairingFeatures, PeerKeys, SecurityFailure, SecurityLevel,
};
use std::time::Duration;

const ACL: u16 = 0x0040;

fn addr(last: u8) -> BdAddr {
    BdAddr::new([last, 0x44, 0x33, 0x22, 0x11, 0x00])
}

fn peer() -> PeerAddress {
    PeerAddress::public(addr(0x55))
}

fn ltk() -> LongTermKey {
    LongTermKey {
        key: Key128([0xA5; 16]),
        ediv: 0x0102,
        rand: [7; 8],
        key_size: 16,
        secure_connections: false,
        authenticated: true,
    }
}

fn connection_complete(handle: u16, role: Role, peer: PeerAddress) -> Event {
    Event::ConnectionComplete(ConnectionComplete {
        status: Status::Success,
        handle,
        role,
        peer,
        params: LinkParameters {
            interval: 0x0018,
            latency: 0,
            supervision_timeout: 0x0190,
        },
        local_rpa: None,
        peer_rpa: None,
    })
}

fn passkey_entry() -> PairingFeatures {
    PairingFeatures {
        io_capability: IoCapability::KeyboardOnly,
        auth_req: AuthReq::BONDING | AuthReq::MITM,
        ..PairingFeatures::default()
    }
}

fn display_only() -> PairingFeatures {
    PairingFeatures {
        io_capability: IoCapability::DisplayOnly,
        ..PairingFeatures::default()
    }
}

struct Harness {
    transport: RecordingTransport,
    host: Host,
}

impl Harness {
    fn new() -> Self {
        Self::with(HostConfig::default(), FixedSecurity::default(), BondingStore::new())
    }

    fn with(config: HostConfig, security: FixedSecurity, store: BondingStore) -> Self {
        let transport = RecordingTransport::new();
        let host = Host::power_on(
            config,
            Box::new(transport.clone()),
            Box::new(AcceptAll),
            Box::new(security),
            store,
        );
        Self { transport, host }
    }

    fn event(&mut self, event: Event) {
        self.host.handle_event(event).unwrap();
    }

    /// Connect to `peer` as central and discard the resulting events
    fn connect(&mut self, handle: u16, peer: PeerAddress) {
        self.host.connect(peer, None).unwrap();
        self.event(Event::CreateConnectionStatus {
            status: Status::Success,
        });
        self.event(connection_complete(handle, Role::Central, peer));
        self.host.drain_events();
    }

    fn establish_cis(&mut self, cig_id: u8, cis_handle: u16) {
        self.host
            .set_cig_parameters(cig_id, CigParams::new(vec![CisConfig::new(1, 120)]))
            .unwrap();
        self.event(Event::CigParametersSet {
            cig_id,
            status: Status::Success,
            assignments: vec![CisAssignment {
                cis_id: 1,
                status: Status::Success,
                handle: cis_handle,
            }],
        });
        self.host
            .create_cis(&[CisPair {
                cis_handle,
                acl_handle: ACL,
            }])
            .unwrap();
        self.event(Event::CreateCisStatus {
            status: Status::Success,
            cis_handles: vec![cis_handle],
        });
        self.event(Event::CisEstablished {
            cis_handle,
            status: Status::Success,
        });
        self.host.drain_events();
    }
}

#[test]
fn test_connect_bond_and_commit() {
    let mut h = Harness::new();
    h.host.connect(peer(), None).unwrap();
    assert!(matches!(
        h.transport.last(),
        Some(Command::CreateConnection { .. })
    ));
    h.event(Event::CreateConnectionStatus {
        status: Status::Success,
    });
    // Nothing is registered before the indication
    assert!(h.host.connections().is_empty());

    h.event(connection_complete(ACL, Role::Central, peer()));
    assert_eq!(
        h.host.poll_event(),
        Some(HostEvent::Connected {
            handle: ACL,
            role: Role::Central,
            peer: peer()
        })
    );
    assert_eq!(h.host.connections(), vec![ACL]);

    h.host.bond(ACL).unwrap();
    assert!(matches!(
        h.transport.last(),
        Some(Command::PairingRequest { handle: ACL, .. })
    ));
    h.event(Event::PairingResponse {
        handle: ACL,
        features: PairingFeatures::default(),
    });
    assert_eq!(h.host.bonding_state(ACL), BondingState::KeyExchange);
    h.event(Event::EncryptionChange {
        handle: ACL,
        status: Status::Success,
        enabled: true,
    });
    let identity = PeerAddress::new(AddressType::PublicIdentity, addr(0x01));
    h.event(Event::KeysReceived {
        handle: ACL,
        keys: PeerKeys {
            ltk: Some(ltk()),
            irk: Some(Key128([0x11; 16])),
            identity: Some(identity),
            csrk: None,
        },
    });
    h.event(Event::PairingComplete {
        handle: ACL,
        status: Status::Success,
    });

    assert_eq!(
        h.host.drain_events(),
        vec![
            HostEvent::BondingStarted {
                handle: ACL,
                peer: peer(),
                previously_bonded: false
            },
            HostEvent::BondingComplete {
                handle: ACL,
                peer: identity,
                level: SecurityLevel::Unauthenticated,
                key_size: 16
            },
        ]
    );
    assert!(h.host.store().is_bonded(&identity.address));
    let link = h.host.connection(ACL).unwrap();
    assert_eq!(link.security, SecurityLevel::Unauthenticated);
    assert_eq!(link.identity, Some(identity));
    assert_eq!(
        h.host.connection_by_address(&identity.address).map(|c| c.handle),
        Some(ACL)
    );

    // The bond outlives the host
    let (store, _) = h.host.power_off();
    assert!(store.is_bonded(&identity.address));
}

#[test]
fn test_reconnect_with_stored_key() {
    let mut store = BondingStore::new();
    let keys = BondKeys {
        peer_ltk: Some(ltk()),
        ..BondKeys::default()
    };
    store
        .commit(peer(), keys, SecurityLevel::Authenticated, 16)
        .unwrap();
    let security = FixedSecurity {
        when_bonded: BondingDecision::EncryptWithStoredKey,
        ..FixedSecurity::default()
    };
    let mut h = Harness::with(HostConfig::default(), security, store);
    h.connect(ACL, peer());

    h.host.bond(ACL).unwrap();
    assert_eq!(
        h.transport.last(),
        Some(Command::StartEncryption {
            handle: ACL,
            ltk: ltk()
        })
    );
    h.event(Event::EncryptionChange {
        handle: ACL,
        status: Status::Success,
        enabled: true,
    });
    assert_eq!(
        h.host.drain_events(),
        vec![
            HostEvent::BondingStarted {
                handle: ACL,
                peer: peer(),
                previously_bonded: true
            },
            HostEvent::BondingComplete {
                handle: ACL,
                peer: peer(),
                level: SecurityLevel::Authenticated,
                key_size: 16
            },
        ]
    );
    assert_eq!(
        h.host.connection(ACL).unwrap().security,
        SecurityLevel::Authenticated
    );
}

#[test]
fn test_passkey_timeout_and_late_reply() {
    let security = FixedSecurity {
        features: passkey_entry(),
        ..FixedSecurity::default()
    };
    let mut h = Harness::with(HostConfig::default(), security, BondingStore::new());
    h.connect(ACL, peer());
    h.host.bond(ACL).unwrap();
    h.event(Event::PairingResponse {
        handle: ACL,
        features: display_only(),
    });
    assert_eq!(
        h.host.drain_events().last(),
        Some(&HostEvent::PasskeyRequest { handle: ACL })
    );

    h.host
        .check_timeouts(Instant::now() + Duration::from_secs(26));
    assert_eq!(
        h.host.drain_events(),
        vec![HostEvent::BondingFailed {
            handle: ACL,
            peer: peer(),
            error: Error::Timeout
        }]
    );

    let sent = h.transport.count();
    h.host.reply_passkey(ACL, Some(123_456)).unwrap();
    assert_eq!(h.transport.count(), sent);
    assert_eq!(h.host.poll_event(), None);
    assert_eq!(h.host.reply_passkey(0x0099, None), Err(Error::UnknownHandle(0x0099)));
}

#[test]
fn test_reply_after_deadline_fails_attempt() {
    let config = HostConfig {
        user_response_timeout: Duration::ZERO,
        ..HostConfig::default()
    };
    let security = FixedSecurity {
        features: passkey_entry(),
        ..FixedSecurity::default()
    };
    let mut h = Harness::with(config, security, BondingStore::new());
    h.connect(ACL, peer());
    h.host.bond(ACL).unwrap();
    h.event(Event::PairingResponse {
        handle: ACL,
        features: display_only(),
    });
    h.host.drain_events();

    h.host.reply_passkey(ACL, Some(123_456)).unwrap();
    assert_eq!(
        h.transport.last(),
        Some(Command::PairingFailed {
            handle: ACL,
            reason: SecurityFailure::PasskeyEntryFailed
        })
    );
    assert_eq!(h.host.bonding_state(ACL), BondingState::BondingFailed);
    assert!(matches!(
        h.host.poll_event(),
        Some(HostEvent::BondingFailed {
            error: Error::Timeout,
            ..
        })
    ));
}

#[test]
fn test_repeated_attempts_cooldown() {
    let mut h = Harness::new();
    h.connect(ACL, peer());
    h.host.bond(ACL).unwrap();
    h.event(Event::PairingFailed {
        handle: ACL,
        reason: SMP_REASON_REPEATED_ATTEMPTS,
    });
    assert!(matches!(
        h.host.drain_events().last(),
        Some(HostEvent::BondingFailed {
            error: Error::SecurityFailed(SecurityFailure::RepeatedAttempts),
            ..
        })
    ));

    assert_eq!(
        h.host.bond(ACL),
        Err(Error::SecurityFailed(SecurityFailure::RepeatedAttempts))
    );

    // A peer asking for security during the cool-down is turned away
    h.event(Event::SecurityRequest {
        handle: ACL,
        auth_req: AuthReq::BONDING,
    });
    assert_eq!(
        h.transport.last(),
        Some(Command::PairingFailed {
            handle: ACL,
            reason: SecurityFailure::RepeatedAttempts
        })
    );
    assert_eq!(h.host.poll_event(), None);
}

#[test]
fn test_unbond() {
    let mut store = BondingStore::new();
    for last in [0x55, 0x66] {
        store
            .commit(
                PeerAddress::public(addr(last)),
                BondKeys::default(),
                SecurityLevel::Unauthenticated,
                16,
            )
            .unwrap();
    }
    let mut h = Harness::with(HostConfig::default(), FixedSecurity::default(), store);

    assert!(h.host.unbond(&addr(0x55)).unwrap());
    assert!(!h.host.unbond(&addr(0x55)).unwrap());
    assert!(h.host.store().is_bonded(&addr(0x66)));

    h.host.unbond_all().unwrap();
    assert!(h.host.store().is_empty());
}

#[test]
fn test_phased_out_keys() {
    let mut store = BondingStore::new();
    store
        .commit(peer(), BondKeys::default(), SecurityLevel::Authenticated, 16)
        .unwrap();
    let mut h = Harness::with(HostConfig::default(), FixedSecurity::default(), store);
    h.event(Event::KeyTypeChanged {
        peer: peer().address,
        key_type: KeyType::Invalid,
    });
    assert_eq!(
        h.host.poll_event(),
        Some(HostEvent::KeysPhasedOut {
            peer: peer().address
        })
    );
    assert!(!h.host.store().is_bonded(&peer().address));
}

#[test]
fn test_peripheral_accepts_cis_request() {
    let mut h = Harness::new();
    h.event(connection_complete(ACL, Role::Peripheral, peer()));
    h.host.drain_events();

    h.event(Event::CisRequest {
        acl_handle: ACL,
        cis_handle: 0x0070,
        cig_id: 2,
        cis_id: 1,
    });
    assert_eq!(
        h.host.poll_event(),
        Some(HostEvent::CisRequest {
            acl_handle: ACL,
            cis_handle: 0x0070,
            cig_id: 2,
            cis_id: 1
        })
    );
    h.host.reply_cis_request(0x0070, true, None).unwrap();
    h.event(Event::CisReplyStatus {
        cis_handle: 0x0070,
        status: Status::Success,
    });
    h.event(Event::CisEstablished {
        cis_handle: 0x0070,
        status: Status::Success,
    });
    assert_eq!(h.host.iso().cis_state(0x0070), CisState::Established);

    // The CIS goes down on its own; the ACL stays
    h.event(Event::DisconnectionComplete {
        handle: 0x0070,
        reason: Status::RemoteUserTerminated,
    });
    assert_eq!(
        h.host.drain_events(),
        vec![
            HostEvent::CisEstablished {
                cis_handle: 0x0070,
                result: Ok(())
            },
            HostEvent::CisDisconnected {
                cis_handle: 0x0070,
                reason: Status::RemoteUserTerminated
            },
        ]
    );
    assert!(h.host.connection(ACL).is_some());
    assert!(!h.host.iso().owns(0x0070));
}

#[test]
fn test_cis_disconnect_status_is_routed_to_streams() {
    let mut h = Harness::new();
    h.connect(ACL, peer());
    h.establish_cis(1, 0x0060);

    h.host
        .terminate_cis(0x0060, Status::RemoteUserTerminated)
        .unwrap();
    h.event(Event::DisconnectStatus {
        handle: 0x0060,
        status: Status::CommandDisallowed,
    });
    assert!(matches!(
        h.host.poll_event(),
        Some(HostEvent::DisconnectFailed { handle: 0x0060, .. })
    ));
    assert_eq!(h.host.iso().cis_state(0x0060), CisState::Established);
    assert!(h.host.gap().disconnect_outcome(0x0060).is_none());
}

#[test]
fn test_acl_loss_tears_down_layers_in_order() {
    let mut h = Harness::new();
    h.connect(ACL, peer());
    h.establish_cis(1, 0x0060);
    h.host
        .setup_iso_data_path(0x0060, DataPathDirection::Input)
        .unwrap();
    h.event(Event::IsoDataPathComplete {
        handle: 0x0060,
        direction: DataPathDirection::Input,
        setup: true,
        status: Status::Success,
    });
    h.host.bond(ACL).unwrap();
    h.host.drain_events();

    h.event(Event::DisconnectionComplete {
        handle: ACL,
        reason: Status::ConnectionTimeout,
    });
    assert_eq!(
        h.host.drain_events(),
        vec![
            HostEvent::BondingFailed {
                handle: ACL,
                peer: peer(),
                error: Error::Disconnected(Status::ConnectionTimeout)
            },
            HostEvent::CisDisconnected {
                cis_handle: 0x0060,
                reason: Status::ConnectionTimeout
            },
            HostEvent::Disconnected {
                handle: ACL,
                peer: peer(),
                reason: Status::ConnectionTimeout
            },
        ]
    );
    assert!(h.host.connections().is_empty());
    assert!(!h.host.iso().has_data_path(0x0060, DataPathDirection::Input));
    assert_eq!(h.host.iso().cis_state(0x0060), CisState::ParamsSet);
    assert_eq!(h.host.bonding_state(ACL), BondingState::NoSecurity);

    // The CIG outlives the link and can be removed now
    h.host.remove_cig(1).unwrap();
}

#[test]
fn test_local_disconnect() {
    let mut h = Harness::new();
    h.connect(ACL, peer());
    h.host.disconnect(ACL, Status::RemoteUserTerminated).unwrap();
    h.event(Event::DisconnectStatus {
        handle: ACL,
        status: Status::Success,
    });
    // Still registered until the indication
    assert!(h.host.connection(ACL).is_some());

    h.event(Event::DisconnectionComplete {
        handle: ACL,
        reason: Status::LocalHostTerminated,
    });
    assert_eq!(
        h.host.poll_event(),
        Some(HostEvent::Disconnected {
            handle: ACL,
            peer: peer(),
            reason: Status::LocalHostTerminated
        })
    );
    assert!(h.host.connection(ACL).is_none());
}

#[test]
fn test_cancel_connect() {
    let mut h = Harness::new();
    assert!(matches!(
        h.host.cancel_connect(),
        Err(Error::CommandDisallowed(_))
    ));

    h.host.connect(peer(), None).unwrap();
    h.event(Event::CreateConnectionStatus {
        status: Status::Success,
    });
    h.host.cancel_connect().unwrap();
    assert_eq!(h.transport.last(), Some(Command::CreateConnectionCancel));
    h.event(Event::CreateConnectionCancelComplete {
        status: Status::Success,
    });
    assert_eq!(
        h.host.drain_events(),
        vec![HostEvent::ConnectionCancelled { peer: peer() }]
    );

    // The controller still reports the aborted attempt; nothing follows
    let mut failed = connection_complete(ACL, Role::Central, peer());
    if let Event::ConnectionComplete(complete) = &mut failed {
        complete.status = Status::UnknownConnectionId;
    }
    h.event(failed);
    assert_eq!(h.host.poll_event(), None);
    assert!(h.host.connections().is_empty());
}

#[test]
fn test_broadcast_with_data_path() {
    let mut h = Harness::new();
    h.host
        .create_big(1, 0x00, BigParams::new(1, 100))
        .unwrap();
    h.event(Event::CreateBigStatus {
        big_handle: 1,
        status: Status::Success,
    });
    h.event(Event::BigCreated {
        big_handle: 1,
        status: Status::Success,
        bis_handles: vec![0x0100],
    });
    h.host
        .setup_iso_data_path(0x0100, DataPathDirection::Input)
        .unwrap();
    h.event(Event::IsoDataPathComplete {
        handle: 0x0100,
        direction: DataPathDirection::Input,
        setup: true,
        status: Status::Success,
    });
    assert_eq!(
        h.host.terminate_big(1, Status::LocalHostTerminated),
        Err(Error::CommandDisallowed("BIS data path active"))
    );

    h.host
        .remove_iso_data_path(0x0100, DataPathDirection::Input)
        .unwrap();
    h.event(Event::IsoDataPathComplete {
        handle: 0x0100,
        direction: DataPathDirection::Input,
        setup: false,
        status: Status::Success,
    });
    h.host.terminate_big(1, Status::LocalHostTerminated).unwrap();
    h.event(Event::TerminateBigStatus {
        big_handle: 1,
        status: Status::Success,
    });
    h.event(Event::BigTerminated {
        big_handle: 1,
        reason: Status::LocalHostTerminated,
    });

    assert_eq!(
        h.host.drain_events(),
        vec![
            HostEvent::BigCreated {
                big_handle: 1,
                result: Ok(vec![0x0100])
            },
            HostEvent::IsoDataPathChanged {
                handle: 0x0100,
                direction: DataPathDirection::Input,
                active: true,
                result: Ok(())
            },
            HostEvent::IsoDataPathChanged {
                handle: 0x0100,
                direction: DataPathDirection::Input,
                active: false,
                result: Ok(())
            },
            HostEvent::BigTerminated {
                big_handle: 1,
                result: Ok(Status::LocalHostTerminated)
            },
        ]
    );
    assert!(h.host.iso().big(1).is_none());
}

#[test]
fn test_power_off_aborts_in_flight_operations() {
    let mut store = BondingStore::new();
    store
        .commit(
            PeerAddress::public(addr(0x66)),
            BondKeys::default(),
            SecurityLevel::Unauthenticated,
            16,
        )
        .unwrap();
    let mut h = Harness::with(HostConfig::default(), FixedSecurity::default(), store);
    h.connect(ACL, peer());
    h.host.bond(ACL).unwrap();
    h.host
        .set_cig_parameters(1, CigParams::new(vec![CisConfig::new(1, 120)]))
        .unwrap();
    h.host
        .start_advertising(crate::gap::AdvertisingParams::default())
        .unwrap();
    h.host
        .connect(PeerAddress::public(addr(0x77)), None)
        .unwrap();
    h.host.drain_events();

    let (store, events) = h.host.power_off();
    assert_eq!(
        events,
        vec![
            HostEvent::OperationAborted {
                operation: Operation::Bonding(ACL)
            },
            HostEvent::OperationAborted {
                operation: Operation::CigConfiguration(1)
            },
            HostEvent::OperationAborted {
                operation: Operation::Advertising
            },
            HostEvent::OperationAborted {
                operation: Operation::Connect
            },
        ]
    );
    assert!(store.is_bonded(&addr(0x66)));
}
