//! Simulated Ethernet shield and the network around it.
//!
//! [`SimNetwork`] is the test's control panel: it decides whether hardware is
//! present, whether the cable is plugged in, which remote hosts accept
//! connections, and it dials the node's listener on behalf of simulated
//! clients. [`SimShield`] is the node's view of the same state and implements
//! [`NetworkInterface`].
//!
//! All handles share one `Rc<RefCell<_>>`, so the harness is single-threaded
//! by construction.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    io,
    net::Ipv4Addr,
    rc::Rc,
    time::Duration,
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shieldnet_core::{
    AddressMode, AddressSource, HardwareStatus, InterfaceSettings, LeaseEvent, Listener,
    LinkStatus, NetworkAddress, NetworkInterface, NetworkReport,
};

use crate::sim_socket::{Pipe, SimPeer, SimSocket};

/// First port handed to simulated inbound clients.
const EPHEMERAL_BASE: u16 = 49152;

/// Addresses a simulated DHCP server hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpLease {
    /// Leased local address
    pub ip: Ipv4Addr,
    /// Leased gateway
    pub gateway: Ipv4Addr,
    /// Leased subnet mask
    pub subnet: Ipv4Addr,
    /// Leased DNS server
    pub dns: Ipv4Addr,
}

#[derive(Debug, Default)]
struct RemoteHost {
    accepting: bool,
    connections: Vec<SimPeer>,
}

#[derive(Debug)]
struct NetState {
    hardware_present: bool,
    link: LinkStatus,
    dhcp: Option<DhcpLease>,
    lease_script: VecDeque<LeaseEvent>,
    report: NetworkReport,
    remotes: HashMap<NetworkAddress, RemoteHost>,
    listeners: HashMap<u16, VecDeque<SimSocket>>,
    pipes: Vec<SimPeer>,
    dialed: u16,
    begin_calls: usize,
    maintain_calls: usize,
    connect_attempts: usize,
    rng: ChaCha8Rng,
}

/// Test-side handle to the simulated network.
#[derive(Debug, Clone)]
pub struct SimNetwork {
    state: Rc<RefCell<NetState>>,
}

impl SimNetwork {
    /// Network with hardware present, link up, no remote hosts, seed 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Same as [`Self::new`] with an explicit RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        let defaults = InterfaceSettings::default();
        let state = NetState {
            hardware_present: true,
            link: LinkStatus::On,
            dhcp: None,
            lease_script: VecDeque::new(),
            report: static_report(&defaults, AddressSource::Static),
            remotes: HashMap::new(),
            listeners: HashMap::new(),
            pipes: Vec::new(),
            dialed: 0,
            begin_calls: 0,
            maintain_calls: 0,
            connect_attempts: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        Self { state: Rc::new(RefCell::new(state)) }
    }

    /// Node-side interface sharing this network's state.
    pub fn shield(&self) -> SimShield {
        SimShield { state: Rc::clone(&self.state) }
    }

    /// Unplug the Ethernet controller.
    pub fn remove_hardware(&self) {
        self.state.borrow_mut().hardware_present = false;
    }

    /// Set the reported link state.
    pub fn set_link(&self, link: LinkStatus) {
        self.state.borrow_mut().link = link;
    }

    /// Run a DHCP server handing out `lease`.
    pub fn offer_dhcp(&self, lease: DhcpLease) {
        self.state.borrow_mut().dhcp = Some(lease);
    }

    /// Results for successive `maintain` calls. Once exhausted, maintenance
    /// reports [`LeaseEvent::Nothing`].
    pub fn script_lease_events(&self, events: impl IntoIterator<Item = LeaseEvent>) {
        self.state.borrow_mut().lease_script.extend(events);
    }

    /// Register a remote host that accepts connections.
    pub fn add_remote(&self, addr: NetworkAddress) {
        self.state.borrow_mut().remotes.entry(addr).or_default().accepting = true;
    }

    /// Make `addr` accept or refuse new connections.
    ///
    /// Refusing does not close connections already established.
    pub fn set_remote_accepting(&self, addr: NetworkAddress, accepting: bool) {
        self.state.borrow_mut().remotes.entry(addr).or_default().accepting = accepting;
    }

    /// Every connection the node has opened to `addr`, oldest first.
    pub fn remote_connections(&self, addr: NetworkAddress) -> Vec<SimPeer> {
        self.state.borrow().remotes.get(&addr).map_or_else(Vec::new, |r| r.connections.clone())
    }

    /// Most recent connection the node opened to `addr`.
    pub fn latest_connection(&self, addr: NetworkAddress) -> Option<SimPeer> {
        self.state.borrow().remotes.get(&addr).and_then(|r| r.connections.last().cloned())
    }

    /// All bytes the node sent to `addr`, across every connection.
    pub fn received_by(&self, addr: NetworkAddress) -> Vec<u8> {
        self.remote_connections(addr).iter().flat_map(SimPeer::received).collect()
    }

    /// Open a connection to the node's listener on `port`.
    ///
    /// Returns `None` when nothing listens there or the node has no working
    /// interface. The connection waits in the listener's backlog until the
    /// node accepts it.
    pub fn dial(&self, port: u16) -> Option<SimPeer> {
        let mut state = self.state.borrow_mut();
        if !state.hardware_present || state.link == LinkStatus::Off {
            return None;
        }
        if !state.listeners.contains_key(&port) {
            return None;
        }

        state.dialed = state.dialed.wrapping_add(1);
        let host = u8::try_from(state.dialed % 200).unwrap_or(0).saturating_add(50);
        let addr = NetworkAddress::new(
            Ipv4Addr::new(169, 254, 235, host),
            EPHEMERAL_BASE.wrapping_add(state.dialed),
        );

        let pipe = Pipe::open();
        let peer = SimPeer::new(Rc::clone(&pipe), addr);
        state.pipes.push(peer.clone());
        if let Some(backlog) = state.listeners.get_mut(&port) {
            backlog.push_back(SimSocket::new(pipe, addr));
        }
        tracing::trace!(%addr, port, "simulated client dialed");
        Some(peer)
    }

    /// Split `bytes` into 1..=`max_chunk` sized chunks and queue them on
    /// `peer`, using the network's seeded RNG.
    pub fn send_fragmented(&self, peer: &SimPeer, bytes: &[u8], max_chunk: usize) {
        let max_chunk = max_chunk.max(1);
        let mut chunks = Vec::new();
        {
            let mut state = self.state.borrow_mut();
            let mut rest = bytes;
            while !rest.is_empty() {
                let size = state.rng.gen_range(1..=max_chunk).min(rest.len());
                let (head, tail) = rest.split_at(size);
                chunks.push(head.to_vec());
                rest = tail;
            }
        }
        peer.send_chunks(chunks);
    }

    /// Deliver one pending chunk on every connection.
    ///
    /// Returns how many chunks moved.
    pub fn deliver_pending(&self) -> usize {
        let peers = self.state.borrow().pipes.clone();
        peers.iter().filter(|peer| peer.pipe().borrow_mut().deliver_one()).count()
    }

    /// Number of `begin` calls so far.
    pub fn begin_calls(&self) -> usize {
        self.state.borrow().begin_calls
    }

    /// Number of `maintain` calls so far.
    pub fn maintain_calls(&self) -> usize {
        self.state.borrow().maintain_calls
    }

    /// Number of outbound connect attempts so far.
    pub fn connect_attempts(&self) -> usize {
        self.state.borrow().connect_attempts
    }

    /// Connections waiting in the backlog of the listener on `port`.
    pub fn backlog(&self, port: u16) -> usize {
        self.state.borrow().listeners.get(&port).map_or(0, VecDeque::len)
    }
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Node-side simulated Ethernet shield.
#[derive(Debug, Clone)]
pub struct SimShield {
    state: Rc<RefCell<NetState>>,
}

impl NetworkInterface for SimShield {
    type Socket = SimSocket;
    type Listener = SimListener;

    fn begin(&mut self, settings: &InterfaceSettings) -> AddressSource {
        let mut state = self.state.borrow_mut();
        state.begin_calls += 1;

        let leased = match (settings.mode, state.dhcp) {
            (AddressMode::Dhcp, Some(lease))
                if state.hardware_present && state.link != LinkStatus::Off =>
            {
                Some(lease)
            },
            _ => None,
        };

        state.report = match (settings.mode, leased) {
            (_, Some(lease)) => NetworkReport {
                local_ip: lease.ip,
                gateway: lease.gateway,
                subnet: lease.subnet,
                dns: lease.dns,
                source: AddressSource::Leased,
            },
            (AddressMode::Dhcp, None) => static_report(settings, AddressSource::Fallback),
            (AddressMode::Static, None) => static_report(settings, AddressSource::Static),
        };
        state.report.source
    }

    fn hardware_status(&self) -> HardwareStatus {
        if self.state.borrow().hardware_present {
            HardwareStatus::Detected
        } else {
            HardwareStatus::NotFound
        }
    }

    fn link_status(&self) -> LinkStatus {
        self.state.borrow().link
    }

    fn report(&self) -> NetworkReport {
        self.state.borrow().report
    }

    fn maintain(&mut self) -> LeaseEvent {
        let mut state = self.state.borrow_mut();
        state.maintain_calls += 1;
        state.lease_script.pop_front().unwrap_or(LeaseEvent::Nothing)
    }

    fn listen(&mut self, port: u16) -> io::Result<SimListener> {
        let mut state = self.state.borrow_mut();
        if !state.hardware_present {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no Ethernet hardware"));
        }
        if state.listeners.contains_key(&port) {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, "port already bound"));
        }
        state.listeners.insert(port, VecDeque::new());
        Ok(SimListener { state: Rc::clone(&self.state), port })
    }

    fn connect(&mut self, remote: NetworkAddress, _timeout: Duration) -> io::Result<SimSocket> {
        let mut state = self.state.borrow_mut();
        state.connect_attempts += 1;

        if !state.hardware_present || state.link == LinkStatus::Off {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "interface down"));
        }
        let local = NetworkAddress::new(state.report.local_ip, EPHEMERAL_BASE);
        let host = state.remotes.get_mut(&remote).filter(|host| host.accepting);
        let Some(host) = host else {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"));
        };

        let pipe = Pipe::open();
        let peer = SimPeer::new(Rc::clone(&pipe), local);
        host.connections.push(peer.clone());
        state.pipes.push(peer);
        tracing::trace!(%remote, "simulated outbound connection");
        Ok(SimSocket::new(pipe, remote))
    }
}

/// Simulated listening socket.
#[derive(Debug)]
pub struct SimListener {
    state: Rc<RefCell<NetState>>,
    port: u16,
}

impl Listener for SimListener {
    type Socket = SimSocket;

    fn accept(&mut self) -> Option<SimSocket> {
        self.state.borrow_mut().listeners.get_mut(&self.port)?.pop_front()
    }

    fn local_port(&self) -> u16 {
        self.port
    }
}

fn static_report(settings: &InterfaceSettings, source: AddressSource) -> NetworkReport {
    NetworkReport {
        local_ip: settings.ip,
        gateway: settings.gateway,
        subnet: settings.subnet,
        dns: settings.dns,
        source,
    }
}

#[cfg(test)]
mod tests {
    use shieldnet_core::ClientSocket;
    use shieldnet_proto::ByteSource;

    use super::*;

    fn remote() -> NetworkAddress {
        NetworkAddress::new(Ipv4Addr::new(169, 254, 235, 35), 8000)
    }

    #[test]
    fn dhcp_falls_back_to_static_without_server() {
        let net = SimNetwork::new();
        let mut shield = net.shield();
        let settings = InterfaceSettings { mode: AddressMode::Dhcp, ..InterfaceSettings::default() };

        assert_eq!(shield.begin(&settings), AddressSource::Fallback);
        assert_eq!(shield.report().local_ip, settings.ip);
    }

    #[test]
    fn dhcp_lease_overrides_static_address() {
        let net = SimNetwork::new();
        let lease = DhcpLease {
            ip: Ipv4Addr::new(10, 0, 0, 7),
            gateway: Ipv4Addr::new(10, 0, 0, 1),
            subnet: Ipv4Addr::new(255, 255, 255, 0),
            dns: Ipv4Addr::new(10, 0, 0, 53),
        };
        net.offer_dhcp(lease);
        let mut shield = net.shield();
        let settings = InterfaceSettings { mode: AddressMode::Dhcp, ..InterfaceSettings::default() };

        assert_eq!(shield.begin(&settings), AddressSource::Leased);
        assert_eq!(shield.report().local_ip, lease.ip);
        assert_eq!(shield.report().dns, lease.dns);
    }

    #[test]
    fn connect_refused_without_remote() {
        let net = SimNetwork::new();
        let mut shield = net.shield();

        let err = shield.connect(remote(), Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
        assert_eq!(net.connect_attempts(), 1);
    }

    #[test]
    fn outbound_bytes_reach_remote() {
        let net = SimNetwork::new();
        net.add_remote(remote());
        let mut shield = net.shield();

        let mut socket = shield.connect(remote(), Duration::from_secs(1)).unwrap();
        socket.write_all(b"hello\r\n").unwrap();

        assert_eq!(net.received_by(remote()), b"hello\r\n");
    }

    #[test]
    fn dial_waits_in_backlog_until_accepted() {
        let net = SimNetwork::new();
        let mut shield = net.shield();
        assert!(net.dial(10002).is_none());

        let mut listener = shield.listen(10002).unwrap();
        let peer = net.dial(10002).unwrap();
        assert_eq!(net.backlog(10002), 1);

        peer.send(b"<x>");
        let mut socket = listener.accept().unwrap();
        assert_eq!(socket.read_byte(), Some(b'<'));
        assert_eq!(socket.peer(), Some(peer.addr()));
        assert!(listener.accept().is_none());
    }

    #[test]
    fn fragmentation_is_deterministic_per_seed() {
        let chunks_for = |seed| {
            let net = SimNetwork::with_seed(seed);
            let mut shield = net.shield();
            let _listener = shield.listen(1).unwrap();
            let peer = net.dial(1).unwrap();
            net.send_fragmented(&peer, b"<0123456789abcdef>", 4);

            let mut sizes = Vec::new();
            let mut seen = 0;
            while net.deliver_pending() > 0 {
                sizes.push(peer.unread() - seen);
                seen = peer.unread();
            }
            sizes
        };

        assert_eq!(chunks_for(7), chunks_for(7));
        assert_eq!(chunks_for(7).iter().sum::<usize>(), 18);
    }
}
