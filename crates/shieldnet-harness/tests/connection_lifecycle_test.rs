//! Connection lifecycle tests.
//!
//! Interface bring-up, the outbound reconnect cycle, inbound accept and
//! pruning, outbound sends, and config-update commands.

use std::net::Ipv4Addr;

use shieldnet_core::{
    AcceptOutcome, AddressMode, AddressSource, ConfigCommand, ConnectionManager, Diagnostic,
    Fault, InterfaceSettings, InterfaceStatus, LeaseEvent, LinkError, LinkStatus, NetworkAddress,
    NodeConfig, OUTBOUND_DRAIN_LIMIT,
};
use shieldnet_harness::{DhcpLease, RecordingSink, SimManager, SimNetwork};

fn manager(network: &SimNetwork) -> SimManager {
    SimManager::new(network.shield(), NodeConfig::default(), RecordingSink::new())
}

fn ready_node() -> (SimManager, SimNetwork) {
    let network = SimNetwork::new();
    network.add_remote(NodeConfig::default().remote);
    let mut manager = manager(&network);
    assert_eq!(manager.initialize_interface(&InterfaceSettings::default()), InterfaceStatus::Ok);
    assert!(manager.start_listener(10002));
    (manager, network)
}

#[test]
fn bring_up_reports_static_addresses() {
    let network = SimNetwork::new();
    let mut manager = manager(&network);

    assert_eq!(manager.initialize_interface(&InterfaceSettings::default()), InterfaceStatus::Ok);
    let report = manager.report().unwrap();
    assert_eq!(report.local_ip, Ipv4Addr::new(169, 254, 235, 40));
    assert_eq!(report.gateway, Ipv4Addr::new(169, 254, 235, 1));
    assert_eq!(report.source, AddressSource::Static);
    assert_eq!(manager.faults().total(), 0);
}

#[test]
fn missing_hardware_degrades() {
    let network = SimNetwork::new();
    network.remove_hardware();
    let mut manager = manager(&network);

    assert_eq!(
        manager.initialize_interface(&InterfaceSettings::default()),
        InterfaceStatus::NoHardware
    );
    assert_eq!(manager.faults().hardware_not_found, 1);
    assert!(!manager.start_listener(10002));
    assert_eq!(manager.accept_pending_client(), AcceptOutcome::NoListener);
    assert!(!manager.ensure_outbound_connected());
}

#[test]
fn unplugged_cable_is_reported() {
    let network = SimNetwork::new();
    network.set_link(LinkStatus::Off);
    let mut manager = manager(&network);

    assert_eq!(
        manager.initialize_interface(&InterfaceSettings::default()),
        InterfaceStatus::LinkDown
    );
    assert_eq!(manager.faults().link_down, 1);
    assert_eq!(manager.sink().faults().collect::<Vec<_>>(), vec![Fault::LinkDown]);
}

#[test]
fn unknown_link_state_is_not_a_fault() {
    let network = SimNetwork::new();
    network.set_link(LinkStatus::Unknown);
    let mut manager = manager(&network);

    assert_eq!(manager.initialize_interface(&InterfaceSettings::default()), InterfaceStatus::Ok);
}

#[test]
fn dhcp_lease_and_fallback() {
    let network = SimNetwork::new();
    let settings = InterfaceSettings { mode: AddressMode::Dhcp, ..InterfaceSettings::default() };
    let mut manager = manager(&network);
    manager.initialize_interface(&settings);
    assert_eq!(manager.report().unwrap().source, AddressSource::Fallback);

    let lease = DhcpLease {
        ip: Ipv4Addr::new(192, 168, 1, 20),
        gateway: Ipv4Addr::new(192, 168, 1, 1),
        subnet: Ipv4Addr::new(255, 255, 255, 0),
        dns: Ipv4Addr::new(192, 168, 1, 1),
    };
    network.offer_dhcp(lease);
    manager.initialize_interface(&settings);
    let report = manager.report().unwrap();
    assert_eq!(report.source, AddressSource::Leased);
    assert_eq!(report.local_ip, lease.ip);
    assert_eq!(network.begin_calls(), 2);
}

#[test]
fn start_listener_is_idempotent() {
    let (mut manager, network) = ready_node();

    assert!(manager.start_listener(10002));
    assert!(manager.start_listener(4000));
    assert_eq!(manager.listener_port(), Some(10002));
    assert!(network.dial(4000).is_none());
    assert_eq!(
        manager.sink().count(|d| matches!(d, Diagnostic::ListenerStarted { .. })),
        1
    );
}

#[test]
fn outbound_connects_once_and_stays_up() {
    let (mut manager, network) = ready_node();

    assert!(manager.ensure_outbound_connected());
    assert!(manager.ensure_outbound_connected());
    assert_eq!(network.connect_attempts(), 1);
    assert_eq!(network.maintain_calls(), 2);
}

#[test]
fn refused_connection_retries_every_call() {
    let network = SimNetwork::new();
    let mut manager = manager(&network);
    manager.initialize_interface(&InterfaceSettings::default());

    for _ in 0..3 {
        assert!(!manager.ensure_outbound_connected());
    }
    assert_eq!(network.connect_attempts(), 3);
    assert_eq!(network.maintain_calls(), 3);
    assert_eq!(manager.faults().connect_failed, 3);
}

#[test]
fn lost_outbound_reconnects_on_next_call() {
    let (mut manager, network) = ready_node();
    let remote = manager.config().remote;
    assert!(manager.ensure_outbound_connected());

    network.latest_connection(remote).unwrap().close();
    assert!(manager.ensure_outbound_connected());

    assert_eq!(network.connect_attempts(), 2);
    assert_eq!(network.remote_connections(remote).len(), 2);
    assert_eq!(manager.sink().count(|d| matches!(d, Diagnostic::OutboundLost { .. })), 1);
}

#[test]
fn remote_that_replies_then_closes_is_redialed() {
    let (mut manager, network) = ready_node();
    let remote = manager.config().remote;
    assert!(manager.ensure_outbound_connected());

    let upstream = network.latest_connection(remote).unwrap();
    upstream.send(b"HTTP/1.1 200 OK\r\n\r\n");
    upstream.close();

    assert!(!manager.is_outbound_connected());
    assert!(manager.ensure_outbound_connected());
    assert_eq!(network.connect_attempts(), 2);
    assert_eq!(manager.sink().count(|d| matches!(d, Diagnostic::OutboundLost { .. })), 1);
}

#[test]
fn replies_on_live_outbound_are_discarded() {
    let (mut manager, network) = ready_node();
    let remote = manager.config().remote;
    assert!(manager.ensure_outbound_connected());

    let upstream = network.latest_connection(remote).unwrap();
    upstream.send(b"ack\r\n");

    assert!(manager.ensure_outbound_connected());
    assert_eq!(upstream.unread(), 0);
    assert_eq!(network.connect_attempts(), 1);
}

#[test]
fn long_reply_is_drained_across_checks() {
    let (mut manager, network) = ready_node();
    let remote = manager.config().remote;
    assert!(manager.ensure_outbound_connected());

    let upstream = network.latest_connection(remote).unwrap();
    upstream.send(&vec![b'x'; OUTBOUND_DRAIN_LIMIT + 10]);
    upstream.close();

    assert!(manager.is_outbound_connected());
    assert_eq!(upstream.unread(), 10);
    assert!(!manager.is_outbound_connected());
    assert!(manager.ensure_outbound_connected());
    assert_eq!(network.connect_attempts(), 2);
}

#[test]
fn lease_events_are_recorded() {
    let (mut manager, network) = ready_node();
    network.script_lease_events([LeaseEvent::RenewSuccess, LeaseEvent::Nothing]);

    manager.ensure_outbound_connected();
    assert_eq!(manager.last_lease(), LeaseEvent::RenewSuccess);
    manager.ensure_outbound_connected();
    assert_eq!(manager.last_lease(), LeaseEvent::Nothing);
    assert_eq!(
        manager.sink().count(|d| matches!(d, Diagnostic::Lease(_))),
        1
    );
}

#[test]
fn overflow_connection_is_closed_and_slots_unchanged() {
    let (mut manager, network) = ready_node();
    let peers: Vec<_> = (0..9).map(|_| network.dial(10002).unwrap()).collect();

    for slot in 0..8 {
        assert_eq!(manager.accept_pending_client(), AcceptOutcome::Accepted { slot });
    }
    assert_eq!(manager.accept_pending_client(), AcceptOutcome::Overflow);
    assert_eq!(manager.accept_pending_client(), AcceptOutcome::Idle);

    assert_eq!(manager.occupied_clients(), 8);
    assert!(!peers[8].is_open_on_node());
    assert!(peers[..8].iter().all(|p| p.is_open_on_node()));
    assert_eq!(manager.faults().accept_overflow, 1);
}

#[test]
fn prune_is_idempotent() {
    let (mut manager, network) = ready_node();
    let a = network.dial(10002).unwrap();
    let _b = network.dial(10002).unwrap();
    manager.accept_pending_client();
    manager.accept_pending_client();

    a.close();
    assert_eq!(manager.prune_disconnected_clients(), 1);
    assert_eq!(manager.prune_disconnected_clients(), 0);
    assert_eq!(manager.clients().occupied_slots().collect::<Vec<_>>(), vec![1]);
    assert!(!a.is_open_on_node());
}

#[test]
fn freed_slot_is_reused_first() {
    let (mut manager, network) = ready_node();
    let a = network.dial(10002).unwrap();
    let _b = network.dial(10002).unwrap();
    manager.accept_pending_client();
    manager.accept_pending_client();
    a.close();
    manager.prune_disconnected_clients();

    let _c = network.dial(10002).unwrap();
    assert_eq!(manager.accept_pending_client(), AcceptOutcome::Accepted { slot: 0 });
}

#[test]
fn closed_peer_with_unread_frame_is_drained_before_pruning() {
    let (mut manager, network) = ready_node();
    let peer = network.dial(10002).unwrap();
    peer.send(b"<last words>");
    peer.close();

    let first = manager.tick();
    assert_eq!(first.accept, AcceptOutcome::Accepted { slot: 0 });
    assert_eq!(first.pruned, 0);
    assert!(first.frame_ready);
    assert_eq!(manager.take_frame(<[u8]>::to_vec), Some(b"last words".to_vec()));

    let second = manager.tick();
    assert_eq!(second.pruned, 1);
    assert_eq!(manager.occupied_clients(), 0);
}

#[test]
fn send_text_and_float_reach_remote() {
    let (mut manager, network) = ready_node();
    manager.ensure_outbound_connected();

    manager.send_text("hello").unwrap();
    manager.send_float(3.14159).unwrap();

    let lines: Vec<_> = network
        .remote_connections(manager.config().remote)
        .iter()
        .flat_map(|p| p.received_lines())
        .collect();
    assert_eq!(lines, vec!["hello".to_string(), "3.141590118".to_string()]);
    let parsed: f32 = lines[1].trim().parse().unwrap();
    assert!((parsed - 3.14159).abs() < 1e-5);
}

#[test]
fn send_without_connection_fails() {
    let network = SimNetwork::new();
    let mut manager = manager(&network);
    manager.initialize_interface(&InterfaceSettings::default());

    assert!(matches!(manager.send_text("x"), Err(LinkError::NotConnected)));
    assert!(matches!(manager.send_float(1.0), Err(LinkError::NotConnected)));
}

#[test]
fn send_to_vanished_remote_drops_connection() {
    let (mut manager, network) = ready_node();
    let remote = manager.config().remote;
    manager.ensure_outbound_connected();
    let connection = network.latest_connection(remote).unwrap();
    connection.close();

    assert!(manager.send_text("anyone?").is_err());
    assert!(!manager.is_outbound_connected());
    assert!(!connection.is_open_on_node());
}

#[test]
fn server_ip_command_retargets_outbound() {
    let (mut manager, network) = ready_node();
    let old_remote = manager.config().remote;
    let new_remote = NetworkAddress::new(Ipv4Addr::new(169, 254, 235, 99), old_remote.port);
    network.add_remote(new_remote);
    manager.ensure_outbound_connected();

    let peer = network.dial(10002).unwrap();
    manager.accept_pending_client();
    peer.send(br#"<{"server_ip":"169.254.235.99"}>"#);
    assert!(manager.scan_frames());
    let command = manager.take_frame(ConfigCommand::parse).unwrap().unwrap();
    manager.apply_command(command);

    assert_eq!(manager.config().remote, new_remote);
    assert!(!network.latest_connection(old_remote).unwrap().is_open_on_node());
    assert!(manager.ensure_outbound_connected());
    assert_eq!(network.remote_connections(new_remote).len(), 1);
}

#[test]
fn numeric_port_command_retargets_outbound() {
    let (mut manager, _network) = ready_node();
    let command = ConfigCommand::parse(br#"{"port":9000}"#).unwrap();
    manager.apply_command(command);

    assert_eq!(manager.config().remote.port, 9000);
    assert_eq!(manager.config().remote.ip, NodeConfig::default().remote.ip);
}

#[test]
fn address_commands_are_staged_for_next_bring_up() {
    let (mut manager, network) = ready_node();
    manager.apply_command(ConfigCommand::ClientIp(Ipv4Addr::new(169, 254, 235, 41)));
    manager.apply_command(ConfigCommand::GatewayIp(Ipv4Addr::new(169, 254, 235, 2)));

    assert_eq!(manager.report().unwrap().local_ip, Ipv4Addr::new(169, 254, 235, 40));
    let settings = manager.config().interface.clone();
    assert_eq!(settings.dns, Ipv4Addr::new(169, 254, 235, 2));

    manager.initialize_interface(&settings);
    assert_eq!(manager.report().unwrap().local_ip, Ipv4Addr::new(169, 254, 235, 41));
    assert_eq!(manager.report().unwrap().gateway, Ipv4Addr::new(169, 254, 235, 2));
    assert_eq!(network.begin_calls(), 2);
}

#[test]
fn datetime_command_sets_clock_reference() {
    let (mut manager, _network) = ready_node();
    let command = ConfigCommand::parse(br#"{"datetime":"20240115-13:45:30.250000"}"#).unwrap();
    manager.apply_command(command);

    let at = manager.clock_reference().unwrap();
    assert_eq!(at.format("%Y-%m-%d %H:%M:%S%.3f").to_string(), "2024-01-15 13:45:30.250");
}

#[test]
fn custom_capacity_overflows_sooner() {
    let network = SimNetwork::new();
    let config = NodeConfig::default();
    let mut manager: ConnectionManager<_, RecordingSink, 1> =
        ConnectionManager::new(network.shield(), config.clone(), RecordingSink::new());
    manager.initialize_interface(&config.interface);
    manager.start_listener(config.listen_port);
    network.dial(config.listen_port).unwrap();
    network.dial(config.listen_port).unwrap();

    assert_eq!(manager.accept_pending_client(), AcceptOutcome::Accepted { slot: 0 });
    assert_eq!(manager.accept_pending_client(), AcceptOutcome::Overflow);
    assert!(
        manager.sink().faults().any(|f| f == Fault::ListenerAcceptOverflow { capacity: 1 })
    );
}
