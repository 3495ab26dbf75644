//! Connection manager.
//!
//! Owns everything the node's control loop touches: the interface, the
//! outbound socket, the listener, the inbound client table and the frame
//! parser. The loop calls, in order:
//!
//! 1. [`ConnectionManager::ensure_outbound_connected`]
//! 2. [`ConnectionManager::accept_pending_client`]
//! 3. [`ConnectionManager::prune_disconnected_clients`]
//! 4. [`ConnectionManager::scan_frames`], then consume the frame if one is
//!    ready
//! 5. optionally [`ConnectionManager::send_text`] /
//!    [`ConnectionManager::send_float`]
//!
//! [`ConnectionManager::tick`] runs steps 1-4 in one call.
//!
//! # Outbound connection
//!
//! ```text
//! ┌──────────────┐  connect ok   ┌───────────┐
//! │ Disconnected │──────────────>│ Connected │
//! └──────────────┘<──────────────└───────────┘
//!                  observed closed / write failed
//! ```
//!
//! Loss of the outbound connection is never signalled; it is noticed the next
//! time something checks the socket. The node never consumes what the peer
//! sends on that connection: each check reads and discards up to
//! [`OUTBOUND_DRAIN_LIMIT`] bytes first, so a peer that replies and then
//! closes is seen as closed.
//!
//! # Frame buffer
//!
//! One parser is shared by every inbound client. Two peers sending at the same
//! time can interleave their bytes into a single corrupted frame; deployments
//! are expected to have one active producer at a time.
//!
//! All state lives in this value and every operation takes `&mut self`, so
//! the borrow checker rules out concurrent or reentrant calls.

use shieldnet_proto::{ByteSource, FloatLine, FrameParser, LINE_TERMINATOR};

use crate::{
    command::ConfigCommand,
    config::{DEFAULT_CLIENTS, DEFAULT_FRAME_CAPACITY, InterfaceSettings, NetworkAddress, NodeConfig},
    diag::{Diagnostic, DiagnosticSink, NoopSink},
    error::{Fault, FaultCounters, LinkError},
    slots::ClientTable,
    transport::{
        ClientSocket, HardwareStatus, LeaseEvent, Listener, LinkStatus, NetworkInterface,
        NetworkReport,
    },
};

/// Bytes read and discarded from the outbound socket per liveness check.
pub const OUTBOUND_DRAIN_LIMIT: usize = 512;

/// Interface condition after bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceStatus {
    /// Hardware present, link up or unknown
    Ok,
    /// No Ethernet controller found
    NoHardware,
    /// Controller found, cable unplugged
    LinkDown,
}

/// Result of one accept attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// No listener has been started
    NoListener,
    /// Nothing pending
    Idle,
    /// Connection placed in a slot
    Accepted {
        /// Slot index
        slot: usize,
    },
    /// Every slot occupied; the connection was closed immediately
    Overflow,
}

/// Summary of one control-loop pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Outbound connection state after the pass
    pub connected: bool,
    /// What the accept step did
    pub accept: AcceptOutcome,
    /// Slots freed by pruning
    pub pruned: usize,
    /// Whether a frame is ready to consume
    pub frame_ready: bool,
}

/// Connection manager for one node.
///
/// `C` is the inbound table capacity, `F` the frame buffer capacity
/// (terminator included).
pub struct ConnectionManager<
    I: NetworkInterface,
    D = NoopSink,
    const C: usize = DEFAULT_CLIENTS,
    const F: usize = DEFAULT_FRAME_CAPACITY,
> {
    interface: I,
    sink: D,
    config: NodeConfig,
    status: Option<InterfaceStatus>,
    report: Option<NetworkReport>,
    outbound: Option<I::Socket>,
    listener: Option<I::Listener>,
    clients: ClientTable<I::Socket, C>,
    parser: FrameParser<F>,
    faults: FaultCounters,
    last_lease: LeaseEvent,
    clock_reference: Option<chrono::NaiveDateTime>,
}

impl<I, D, const C: usize, const F: usize> ConnectionManager<I, D, C, F>
where
    I: NetworkInterface,
    D: DiagnosticSink,
{
    /// Create a manager. Nothing touches the interface until
    /// [`Self::initialize_interface`].
    pub fn new(interface: I, config: NodeConfig, sink: D) -> Self {
        Self {
            interface,
            sink,
            config,
            status: None,
            report: None,
            outbound: None,
            listener: None,
            clients: ClientTable::new(),
            parser: FrameParser::new(),
            faults: FaultCounters::default(),
            last_lease: LeaseEvent::Nothing,
            clock_reference: None,
        }
    }

    /// Bring the interface up with `settings`.
    ///
    /// Blocks while DHCP negotiates, if requested. The settings become the
    /// manager's current interface configuration. Missing hardware and a dead
    /// link are reported through the returned status, the diagnostic sink and
    /// the fault counters; the manager stays usable either way.
    pub fn initialize_interface(&mut self, settings: &InterfaceSettings) -> InterfaceStatus {
        self.config.interface = settings.clone();
        self.interface.begin(settings);

        let status = if self.interface.hardware_status() == HardwareStatus::NotFound {
            self.fault(Fault::HardwareNotFound);
            InterfaceStatus::NoHardware
        } else if self.interface.link_status() == LinkStatus::Off {
            self.fault(Fault::LinkDown);
            InterfaceStatus::LinkDown
        } else {
            InterfaceStatus::Ok
        };

        let report = self.interface.report();
        self.status = Some(status);
        self.report = Some(report);
        self.sink.emit(&Diagnostic::InterfaceUp { status, report });
        status
    }

    /// Start listening for inbound clients on `port`.
    ///
    /// Idempotent: once a listener exists, later calls return `true` without
    /// binding again, whatever port they name. A failed bind returns `false`
    /// and can be retried.
    pub fn start_listener(&mut self, port: u16) -> bool {
        if self.listener.is_some() {
            return true;
        }

        match self.interface.listen(port) {
            Ok(listener) => {
                let port = listener.local_port();
                self.listener = Some(listener);
                self.sink.emit(&Diagnostic::ListenerStarted { port });
                true
            },
            Err(_) => {
                self.sink.emit(&Diagnostic::ListenerFailed { port });
                false
            },
        }
    }

    /// Make one connect attempt if the outbound socket is down, then run
    /// lease maintenance.
    ///
    /// Maintenance happens on every call whatever the connection outcome.
    /// Returns whether the outbound connection is up afterwards.
    pub fn ensure_outbound_connected(&mut self) -> bool {
        if !self.check_outbound() {
            let remote = self.config.remote;
            match self.interface.connect(remote, self.config.connect_timeout) {
                Ok(socket) => {
                    self.outbound = Some(socket);
                    self.sink.emit(&Diagnostic::Connected { remote });
                },
                Err(_) => self.fault(Fault::ConnectFailed { remote }),
            }
        }

        let lease = self.interface.maintain();
        self.last_lease = lease;
        if lease != LeaseEvent::Nothing {
            self.sink.emit(&Diagnostic::Lease(lease));
        }

        self.check_outbound()
    }

    /// Take one pending inbound connection into the first free slot.
    ///
    /// Never blocks. With every slot occupied the connection is accepted and
    /// closed at once so it does not linger in the listener's backlog.
    pub fn accept_pending_client(&mut self) -> AcceptOutcome {
        let Some(listener) = self.listener.as_mut() else {
            return AcceptOutcome::NoListener;
        };
        let Some(socket) = listener.accept() else {
            return AcceptOutcome::Idle;
        };

        let peer = socket.peer();
        match self.clients.insert(socket) {
            Ok(slot) => {
                self.sink.emit(&Diagnostic::ClientAccepted { slot, peer });
                AcceptOutcome::Accepted { slot }
            },
            Err(mut rejected) => {
                rejected.stop();
                self.fault(Fault::ListenerAcceptOverflow { capacity: C });
                AcceptOutcome::Overflow
            },
        }
    }

    /// Close and free every slot whose client has disconnected.
    ///
    /// Returns the number of slots freed.
    pub fn prune_disconnected_clients(&mut self) -> usize {
        let sink = &mut self.sink;
        self.clients.prune(|slot| sink.emit(&Diagnostic::ClientRemoved { slot }))
    }

    /// Read inbound clients in slot order until a frame completes.
    ///
    /// At most one frame is produced per call. While a frame is ready no
    /// bytes are consumed at all; consume it with [`Self::frame`] and
    /// [`Self::clear_frame`], or with [`Self::take_frame`].
    pub fn scan_frames(&mut self) -> bool {
        if self.parser.is_ready() {
            return true;
        }
        if !self.parser.scan(self.clients.iter_mut()) {
            return false;
        }

        if self.parser.was_clamped() {
            self.fault(Fault::BufferOverflowClamped { max_body: F - 1 });
        }
        let len = self.parser.frame().map_or(0, <[u8]>::len);
        self.sink.emit(&Diagnostic::FrameReady { len });
        true
    }

    /// Body of the ready frame.
    pub fn frame(&self) -> Option<&[u8]> {
        self.parser.frame()
    }

    /// Mark the ready frame consumed.
    pub fn clear_frame(&mut self) {
        self.parser.clear();
    }

    /// Hand the ready frame to `consume`, then clear it.
    pub fn take_frame<R>(&mut self, consume: impl FnOnce(&[u8]) -> R) -> Option<R> {
        let result = self.parser.frame().map(consume);
        self.parser.clear();
        result
    }

    /// Send `text` as one line to the outbound peer.
    pub fn send_text(&mut self, text: &str) -> Result<(), LinkError> {
        self.send_parts(&[text.as_bytes(), LINE_TERMINATOR])
    }

    /// Send `value` as one fixed-format line to the outbound peer.
    pub fn send_float(&mut self, value: f32) -> Result<(), LinkError> {
        let line = FloatLine::format(value)?;
        self.send_parts(&[line.as_bytes()])
    }

    /// Run steps 1-4 of the control loop.
    pub fn tick(&mut self) -> Tick {
        let connected = self.ensure_outbound_connected();
        let accept = self.accept_pending_client();
        let pruned = self.prune_disconnected_clients();
        let frame_ready = self.scan_frames();
        Tick { connected, accept, pruned, frame_ready }
    }

    /// Apply a config-update command.
    ///
    /// Re-targeting the peer drops the current outbound connection so the
    /// next [`Self::ensure_outbound_connected`] dials the new address. Local
    /// address changes are staged in [`Self::config`] and take effect on the
    /// next bring-up.
    pub fn apply_command(&mut self, command: ConfigCommand) {
        match command {
            ConfigCommand::DateTime(at) => self.clock_reference = Some(at),
            ConfigCommand::ServerIp(ip) => {
                self.retarget(NetworkAddress::new(ip, self.config.remote.port));
            },
            ConfigCommand::ServerPort(port) => {
                self.retarget(NetworkAddress::new(self.config.remote.ip, port));
            },
            ConfigCommand::ClientIp(ip) => self.config.interface.ip = ip,
            ConfigCommand::GatewayIp(ip) => {
                self.config.interface.gateway = ip;
                self.config.interface.dns = ip;
            },
        }
        self.sink.emit(&Diagnostic::CommandApplied(command));
    }

    /// Whether the outbound connection is up, dropping it if it is not.
    pub fn is_outbound_connected(&mut self) -> bool {
        self.check_outbound()
    }

    /// Interface status from the last bring-up.
    pub fn status(&self) -> Option<InterfaceStatus> {
        self.status
    }

    /// Addresses reported by the last bring-up.
    pub fn report(&self) -> Option<NetworkReport> {
        self.report
    }

    /// Whether a listener is active.
    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// Port of the active listener.
    pub fn listener_port(&self) -> Option<u16> {
        self.listener.as_ref().map(Listener::local_port)
    }

    /// Number of occupied client slots.
    pub fn occupied_clients(&self) -> usize {
        self.clients.occupied()
    }

    /// Client table, for inspection.
    pub fn clients(&self) -> &ClientTable<I::Socket, C> {
        &self.clients
    }

    /// Fault totals since creation.
    pub fn faults(&self) -> &FaultCounters {
        &self.faults
    }

    /// Result of the most recent lease maintenance.
    pub fn last_lease(&self) -> LeaseEvent {
        self.last_lease
    }

    /// Wall-clock reference set by a `datetime` command.
    pub fn clock_reference(&self) -> Option<chrono::NaiveDateTime> {
        self.clock_reference
    }

    /// Current configuration, including staged command updates.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The frame parser, for inspection.
    pub fn parser(&self) -> &FrameParser<F> {
        &self.parser
    }

    /// The underlying interface.
    pub fn interface(&self) -> &I {
        &self.interface
    }

    /// The underlying interface, mutably.
    pub fn interface_mut(&mut self) -> &mut I {
        &mut self.interface
    }

    /// The diagnostic sink.
    pub fn sink(&self) -> &D {
        &self.sink
    }

    fn check_outbound(&mut self) -> bool {
        let Some(socket) = self.outbound.as_mut() else {
            return false;
        };
        let mut discarded = 0;
        while discarded < OUTBOUND_DRAIN_LIMIT && socket.read_byte().is_some() {
            discarded += 1;
        }
        if socket.is_connected() {
            return true;
        }

        socket.stop();
        self.outbound = None;
        self.sink.emit(&Diagnostic::OutboundLost { remote: self.config.remote });
        false
    }

    fn send_parts(&mut self, parts: &[&[u8]]) -> Result<(), LinkError> {
        if !self.check_outbound() {
            return Err(LinkError::NotConnected);
        }
        let Some(socket) = self.outbound.as_mut() else {
            return Err(LinkError::NotConnected);
        };

        let written = parts.iter().try_for_each(|part| socket.write_all(part));
        if let Err(e) = written {
            socket.stop();
            self.outbound = None;
            self.sink.emit(&Diagnostic::SendFailed { remote: self.config.remote });
            return Err(LinkError::Io(e));
        }
        Ok(())
    }

    fn retarget(&mut self, remote: NetworkAddress) {
        if remote == self.config.remote {
            return;
        }
        if let Some(mut socket) = self.outbound.take() {
            socket.stop();
        }
        self.config.remote = remote;
    }

    fn fault(&mut self, fault: Fault) {
        self.faults.record(&fault);
        self.sink.emit(&Diagnostic::Fault(fault));
    }
}
