//! Transport abstraction for a polled Ethernet interface.
//!
//! Models the socket API of small Ethernet controllers: one interface that
//! is brought up once, a listener that hands out accepted sockets, and client
//! sockets that are read a byte at a time. Every call except
//! [`NetworkInterface::begin`] and [`NetworkInterface::connect`] must return
//! immediately.
//!
//! Production on a host uses std TCP sockets, tests use the in-memory shield
//! from `shieldnet-harness`.

use std::{io, net::Ipv4Addr, time::Duration};

use shieldnet_proto::ByteSource;

use crate::config::{InterfaceSettings, NetworkAddress};

/// Whether an Ethernet controller answered during bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareStatus {
    /// Controller detected
    Detected,
    /// No controller answered
    NotFound,
}

/// Physical link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Controller cannot report link state
    Unknown,
    /// Cable connected
    On,
    /// Cable disconnected
    Off,
}

/// Where the active local address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    /// Configured static address
    Static,
    /// DHCP lease
    Leased,
    /// DHCP failed, static address used instead
    Fallback,
}

/// Result of periodic lease maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseEvent {
    /// Nothing needed doing
    Nothing,
    /// Lease renewal failed
    RenewFailed,
    /// Lease renewed
    RenewSuccess,
    /// Rebind failed
    RebindFailed,
    /// Rebound to a new server
    RebindSuccess,
}

/// Addresses in effect after bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkReport {
    /// Local address
    pub local_ip: Ipv4Addr,
    /// Default gateway
    pub gateway: Ipv4Addr,
    /// Subnet mask
    pub subnet: Ipv4Addr,
    /// DNS server
    pub dns: Ipv4Addr,
    /// Origin of `local_ip`
    pub source: AddressSource,
}

/// A connected TCP socket.
///
/// Reads come through [`ByteSource`] and never block.
pub trait ClientSocket: ByteSource {
    /// Whether the socket is still usable.
    ///
    /// A socket whose peer has closed stays connected while unread bytes
    /// remain, so trailing data is never lost to pruning.
    fn is_connected(&mut self) -> bool;

    /// Write all of `bytes`.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Close the socket. Further reads return nothing.
    fn stop(&mut self);

    /// Remote end of the connection, when known.
    fn peer(&self) -> Option<NetworkAddress>;
}

/// A listening socket.
pub trait Listener {
    /// Socket type handed out by [`Listener::accept`].
    type Socket: ClientSocket;

    /// Take one pending connection without blocking.
    fn accept(&mut self) -> Option<Self::Socket>;

    /// Port the listener is bound to.
    fn local_port(&self) -> u16;
}

/// An Ethernet interface and its socket factory.
pub trait NetworkInterface {
    /// Client socket type.
    type Socket: ClientSocket;

    /// Listener type, producing the same sockets.
    type Listener: Listener<Socket = Self::Socket>;

    /// Bring the interface up.
    ///
    /// May block for the duration of DHCP negotiation. Never fails: missing
    /// hardware or a dead link shows up in [`Self::hardware_status`] and
    /// [`Self::link_status`] afterwards.
    fn begin(&mut self, settings: &InterfaceSettings) -> AddressSource;

    /// Controller presence as of the last bring-up.
    fn hardware_status(&self) -> HardwareStatus;

    /// Current link state.
    fn link_status(&self) -> LinkStatus;

    /// Addresses currently in effect.
    fn report(&self) -> NetworkReport;

    /// Renew or rebind the DHCP lease when due.
    fn maintain(&mut self) -> LeaseEvent;

    /// Start listening on `port`.
    fn listen(&mut self, port: u16) -> io::Result<Self::Listener>;

    /// Open a connection to `remote`, giving up after `timeout`.
    fn connect(&mut self, remote: NetworkAddress, timeout: Duration) -> io::Result<Self::Socket>;
}
