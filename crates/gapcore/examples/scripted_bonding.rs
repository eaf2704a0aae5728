/// Example driving the host through a scripted central bonding session
///
/// There is no controller here: commands are logged as they leave the host
/// and the controller's answers are replayed from a script.
use gapcore::gap::LinkParameters;
use gapcore::smp::{Key128, LongTermKey, PeerKeys};
use gapcore::*;
use log::info;

struct LoggingTransport;

impl Transport for LoggingTransport {
    fn send(&mut self, command: &Command) -> std::result::Result<(), HciError> {
        info!("-> {}", command.name());
        Ok(())
    }
}

fn print_events(host: &mut Host) {
    while let Some(event) = host.poll_event() {
        println!("  {:?}", event);
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Scripted Bonding Example");
    println!("------------------------");

    let mut host = Host::power_on(
        HostConfig::default(),
        Box::new(LoggingTransport),
        Box::new(AcceptAll),
        Box::new(FixedSecurity::default()),
        BondingStore::new(),
    );

    let peer = PeerAddress::public("00:11:22:33:44:55".parse()?);
    let handle = 0x0040;

    println!("Connecting to {}...", peer);
    host.connect(peer, None)?;
    host.handle_event(Event::CreateConnectionStatus {
        status: Status::Success,
    })?;
    host.handle_event(Event::ConnectionComplete(ConnectionComplete {
        status: Status::Success,
        handle,
        role: Role::Central,
        peer,
        params: LinkParameters {
            interval: 0x0018,
            latency: 0,
            supervision_timeout: 0x0190,
        },
        local_rpa: None,
        peer_rpa: None,
    }))?;
    print_events(&mut host);

    println!("Bonding...");
    host.bond(handle)?;
    host.handle_event(Event::PairingResponse {
        handle,
        features: PairingFeatures::default(),
    })?;
    host.handle_event(Event::EncryptionChange {
        handle,
        status: Status::Success,
        enabled: true,
    })?;
    host.handle_event(Event::KeysReceived {
        handle,
        keys: PeerKeys {
            ltk: Some(LongTermKey::generate_legacy(16, false)),
            irk: Some(Key128::random()),
            identity: None,
            csrk: None,
        },
    })?;
    host.handle_event(Event::PairingComplete {
        handle,
        status: Status::Success,
    })?;
    print_events(&mut host);

    println!("Disconnecting...");
    host.disconnect(handle, Status::RemoteUserTerminated)?;
    host.handle_event(Event::DisconnectStatus {
        handle,
        status: Status::Success,
    })?;
    host.handle_event(Event::DisconnectionComplete {
        handle,
        reason: Status::LocalHostTerminated,
    })?;
    print_events(&mut host);

    let (store, _) = host.power_off();
    for bonded in store.bonded_peers() {
        println!("Bonded: {}", bonded);
    }

    Ok(())
}
