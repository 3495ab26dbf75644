//! World state for scenario execution.

use std::collections::HashMap;

use shieldnet_core::{ConnectionManager, InterfaceStatus, Tick};

use crate::{RecordingSink, SimNetwork, SimPeer, SimShield};

/// Connection manager over the simulated shield with default capacities.
pub type SimManager = ConnectionManager<SimShield, RecordingSink>;

/// Everything a scenario produced: the node, the network, the peers, and
/// the frames consumed along the way.
pub struct World {
    manager: SimManager,
    network: SimNetwork,
    status: InterfaceStatus,
    peers: HashMap<String, SimPeer>,
    frames: Vec<Vec<u8>>,
    ticks: Vec<Tick>,
    sends: Vec<bool>,
}

impl World {
    pub(crate) fn new(manager: SimManager, network: SimNetwork, status: InterfaceStatus) -> Self {
        Self {
            manager,
            network,
            status,
            peers: HashMap::new(),
            frames: Vec::new(),
            ticks: Vec::new(),
            sends: Vec::new(),
        }
    }

    pub(crate) fn add_peer(&mut self, name: String, peer: SimPeer) {
        self.peers.insert(name, peer);
    }

    pub(crate) fn send_text(&mut self, text: &str) {
        let sent = self.manager.send_text(text);
        self.sends.push(sent.is_ok());
    }

    pub(crate) fn send_float(&mut self, value: f32) {
        let sent = self.manager.send_float(value);
        self.sends.push(sent.is_ok());
    }

    /// One control-loop pass, consuming a ready frame.
    pub(crate) fn tick(&mut self) {
        let tick = self.manager.tick();
        if tick.frame_ready
            && let Some(frame) = self.manager.take_frame(<[u8]>::to_vec)
        {
            self.frames.push(frame);
        }
        self.ticks.push(tick);
    }

    /// The node's connection manager.
    pub fn manager(&self) -> &SimManager {
        &self.manager
    }

    /// The simulated network.
    pub fn network(&self) -> &SimNetwork {
        &self.network
    }

    /// Status returned by interface bring-up.
    pub fn status(&self) -> InterfaceStatus {
        self.status
    }

    /// A named inbound peer, if it managed to dial the node.
    pub fn peer(&self, name: &str) -> Option<&SimPeer> {
        self.peers.get(name)
    }

    /// Frame bodies consumed, in order.
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    /// Frame bodies as lossy UTF-8.
    pub fn frame_strings(&self) -> Vec<String> {
        self.frames.iter().map(|f| String::from_utf8_lossy(f).into_owned()).collect()
    }

    /// Summary of every tick run.
    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    /// Whether each scenario send reached the outbound peer, in order.
    pub fn sends(&self) -> &[bool] {
        &self.sends
    }

    /// Lines received by the configured remote host.
    pub fn remote_lines(&self) -> Vec<String> {
        let remote = self.manager.config().remote;
        self.network
            .remote_connections(remote)
            .iter()
            .flat_map(SimPeer::received_lines)
            .collect()
    }
}
