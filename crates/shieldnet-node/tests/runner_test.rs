//! Control-loop tests over the simulated shield.

use std::time::Duration;

use shieldnet_core::{ConfigCommand, ConnectionManager, NodeConfig};
use shieldnet_harness::{RecordingSink, SimNetwork, SimShield};
use shieldnet_node::{FrameAction, NodeError, RunOptions, Runner};

fn runner(network: &SimNetwork, options: RunOptions) -> Runner<SimShield, RecordingSink> {
    let config = NodeConfig::default();
    network.add_remote(config.remote);
    let manager = ConnectionManager::new(network.shield(), config, RecordingSink::new());
    let mut runner = Runner::new(manager, options);
    runner.start().unwrap();
    runner
}

#[test]
fn command_frame_is_applied() {
    let network = SimNetwork::new();
    let mut runner = runner(&network, RunOptions::default());
    let peer = network.dial(10002).unwrap();
    peer.send(br#"<{"port":"9001"}>"#);

    let step = runner.step();
    assert_eq!(step.frame, Some(FrameAction::Applied(ConfigCommand::ServerPort(9001))));
    assert_eq!(runner.manager().config().remote.port, 9001);
}

#[test]
fn plain_frame_is_forwarded_when_enabled() {
    let network = SimNetwork::new();
    let mut runner = runner(&network, RunOptions { forward: true, ..RunOptions::default() });
    let peer = network.dial(10002).unwrap();
    peer.send(b"<temp=21.5>");

    let step = runner.step();
    assert_eq!(step.frame, Some(FrameAction::Forwarded("temp=21.5".to_string())));
    let remote = runner.manager().config().remote;
    assert_eq!(network.latest_connection(remote).unwrap().received_lines(), ["temp=21.5"]);
}

#[test]
fn json_reading_without_command_key_is_forwarded() {
    let network = SimNetwork::new();
    let mut runner = runner(&network, RunOptions { forward: true, ..RunOptions::default() });
    network.dial(10002).unwrap().send(br#"<{"lux":120}>"#);

    assert_eq!(runner.step().frame, Some(FrameAction::Forwarded(r#"{"lux":120}"#.to_string())));
    let remote = runner.manager().config().remote;
    assert_eq!(network.latest_connection(remote).unwrap().received_lines(), [r#"{"lux":120}"#]);
}

#[test]
fn plain_frame_is_dropped_without_forwarding() {
    let network = SimNetwork::new();
    let mut runner = runner(&network, RunOptions::default());
    network.dial(10002).unwrap().send(b"<temp=21.5>");

    assert_eq!(runner.step().frame, Some(FrameAction::Dropped));
}

#[test]
fn invalid_command_is_rejected() {
    let network = SimNetwork::new();
    let mut runner = runner(&network, RunOptions { forward: true, ..RunOptions::default() });
    network.dial(10002).unwrap().send(br#"<{"port":"eighty"}>"#);

    assert_eq!(runner.step().frame, Some(FrameAction::Rejected));
    assert_eq!(runner.manager().config().remote.port, 8000);
}

#[test]
fn readings_are_sent_on_schedule() {
    let network = SimNetwork::new();
    let options = RunOptions { sample: Some(2.5), sample_every: 2, ..RunOptions::default() };
    let mut runner = runner(&network, options);

    let sampled: Vec<bool> = (0..4).map(|_| runner.step().sampled).collect();
    assert_eq!(sampled, [false, true, false, true]);

    let remote = runner.manager().config().remote;
    let lines = network.latest_connection(remote).unwrap().received_lines();
    assert_eq!(lines, ["2.500000000", "2.500000000"]);
}

#[test]
fn run_stops_after_max_ticks() {
    let network = SimNetwork::new();
    let options = RunOptions {
        max_ticks: Some(3),
        poll_interval: Duration::ZERO,
        ..RunOptions::default()
    };
    let mut runner = runner(&network, options);

    runner.run();
    assert_eq!(runner.ticks(), 3);
    assert_eq!(network.maintain_calls(), 3);
}

#[test]
fn start_fails_without_listener() {
    let network = SimNetwork::new();
    network.remove_hardware();
    let manager =
        ConnectionManager::new(network.shield(), NodeConfig::default(), RecordingSink::new());
    let mut runner = Runner::new(manager, RunOptions::default());

    assert!(matches!(runner.start(), Err(NodeError::Listen { port: 10002 })));
}
