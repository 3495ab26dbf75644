//! Scenario builder API.

use shieldnet_core::{LinkStatus, NodeConfig};

use crate::{
    RecordingSink, SimNetwork,
    scenario::{OracleFn, SimManager, World},
};

#[derive(Debug, Clone)]
enum Step {
    Send { peer: String, bytes: Vec<u8> },
    Close { peer: String },
    Ticks(usize),
    SendText(String),
    SendFloat(f32),
}

/// Scenario builder.
///
/// Peers dial the node right after its listener starts, in the order they
/// were added. Steps then run in order. Call [`Scenario::oracle`] to get
/// something runnable.
pub struct Scenario {
    name: String,
    config: NodeConfig,
    seed: u64,
    hardware: bool,
    link: LinkStatus,
    remote_online: bool,
    peers: Vec<String>,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a scenario with default node configuration, a working
    /// interface and the remote host online.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: NodeConfig::default(),
            seed: 0,
            hardware: true,
            link: LinkStatus::On,
            remote_online: true,
            peers: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Use `config` instead of the defaults.
    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed for the simulated network.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run without an Ethernet controller.
    pub fn without_hardware(mut self) -> Self {
        self.hardware = false;
        self
    }

    /// Run with the cable unplugged.
    pub fn link_down(mut self) -> Self {
        self.link = LinkStatus::Off;
        self
    }

    /// Run with the remote host refusing connections.
    pub fn remote_offline(mut self) -> Self {
        self.remote_online = false;
        self
    }

    /// Add an inbound peer.
    pub fn peer(mut self, name: impl Into<String>) -> Self {
        self.peers.push(name.into());
        self
    }

    /// `peer` sends `bytes`.
    pub fn send(mut self, peer: impl Into<String>, bytes: &[u8]) -> Self {
        self.steps.push(Step::Send { peer: peer.into(), bytes: bytes.to_vec() });
        self
    }

    /// `peer` closes its connection.
    pub fn close(mut self, peer: impl Into<String>) -> Self {
        self.steps.push(Step::Close { peer: peer.into() });
        self
    }

    /// Run `n` control-loop passes.
    pub fn ticks(mut self, n: usize) -> Self {
        self.steps.push(Step::Ticks(n));
        self
    }

    /// The node sends a text line to the remote host.
    pub fn send_text(mut self, text: impl Into<String>) -> Self {
        self.steps.push(Step::SendText(text.into()));
        self
    }

    /// The node sends a float line to the remote host.
    pub fn send_float(mut self, value: f32) -> Self {
        self.steps.push(Step::SendFloat(value));
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory: there is no way to run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle, ready to execute.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario and run the oracle on the final world.
    ///
    /// Send failures are not errors; they show up in the world state the
    /// oracle sees.
    pub fn run(self) -> Result<(), String> {
        let Self { scenario, oracle } = self;

        let network = SimNetwork::with_seed(scenario.seed);
        if !scenario.hardware {
            network.remove_hardware();
        }
        network.set_link(scenario.link);
        if scenario.remote_online {
            network.add_remote(scenario.config.remote);
        }

        let mut manager =
            SimManager::new(network.shield(), scenario.config.clone(), RecordingSink::new());
        let status = manager.initialize_interface(&scenario.config.interface);
        manager.start_listener(scenario.config.listen_port);

        let mut world = World::new(manager, network.clone(), status);
        for name in scenario.peers {
            if let Some(peer) = network.dial(scenario.config.listen_port) {
                world.add_peer(name, peer);
            }
        }

        for step in scenario.steps {
            match step {
                Step::Send { peer, bytes } => {
                    let peer = world.peer(&peer).ok_or_else(|| {
                        format!("Scenario '{}': peer {peer} is not connected", scenario.name)
                    })?;
                    peer.send(&bytes);
                },
                Step::Close { peer } => {
                    let peer = world.peer(&peer).ok_or_else(|| {
                        format!("Scenario '{}': peer {peer} is not connected", scenario.name)
                    })?;
                    peer.close();
                },
                Step::Ticks(n) => (0..n).for_each(|_| world.tick()),
                Step::SendText(text) => world.send_text(&text),
                Step::SendFloat(value) => world.send_float(value),
            }
        }

        oracle(&world).map_err(|e| format!("Scenario '{}': {e}", scenario.name))
    }
}
