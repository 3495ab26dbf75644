//! std TCP implementation of the transport traits.
//!
//! The host's network stack owns addressing, so bring-up only records the
//! configured values for reporting. Sockets are non-blocking for reads and
//! accepts; writes block up to [`WRITE_TIMEOUT`].

use std::{
    io::{self, Read, Write},
    net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream},
    time::Duration,
};

use shieldnet_core::{
    AddressMode, AddressSource, ClientSocket, HardwareStatus, InterfaceSettings, LeaseEvent,
    Listener, LinkStatus, NetworkAddress, NetworkInterface, NetworkReport,
};
use shieldnet_proto::ByteSource;
use tracing::{debug, trace};

/// Upper bound on one blocking write.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Read-ahead buffer per socket.
const READ_AHEAD: usize = 256;

/// Host network interface.
#[derive(Debug)]
pub struct StdInterface {
    bind_ip: Ipv4Addr,
    report: NetworkReport,
}

impl StdInterface {
    /// Interface listening on every local address.
    pub fn new() -> Self {
        Self::bound_to(Ipv4Addr::UNSPECIFIED)
    }

    /// Interface whose listeners bind to `ip` only.
    pub fn bound_to(ip: Ipv4Addr) -> Self {
        let defaults = InterfaceSettings::default();
        Self {
            bind_ip: ip,
            report: NetworkReport {
                local_ip: defaults.ip,
                gateway: defaults.gateway,
                subnet: defaults.subnet,
                dns: defaults.dns,
                source: AddressSource::Static,
            },
        }
    }
}

impl Default for StdInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkInterface for StdInterface {
    type Socket = StdSocket;
    type Listener = StdListener;

    fn begin(&mut self, settings: &InterfaceSettings) -> AddressSource {
        // No lease negotiation on a host: DHCP mode reports the static values
        // as a fallback
        let source = match settings.mode {
            AddressMode::Static => AddressSource::Static,
            AddressMode::Dhcp => AddressSource::Fallback,
        };
        self.report = NetworkReport {
            local_ip: settings.ip,
            gateway: settings.gateway,
            subnet: settings.subnet,
            dns: settings.dns,
            source,
        };
        source
    }

    fn hardware_status(&self) -> HardwareStatus {
        HardwareStatus::Detected
    }

    fn link_status(&self) -> LinkStatus {
        LinkStatus::Unknown
    }

    fn report(&self) -> NetworkReport {
        self.report
    }

    fn maintain(&mut self) -> LeaseEvent {
        LeaseEvent::Nothing
    }

    fn listen(&mut self, port: u16) -> io::Result<StdListener> {
        let inner = TcpListener::bind(SocketAddrV4::new(self.bind_ip, port))?;
        inner.set_nonblocking(true)?;
        let port = inner.local_addr()?.port();
        debug!(port, "listener bound");
        Ok(StdListener { inner, port })
    }

    fn connect(&mut self, remote: NetworkAddress, timeout: Duration) -> io::Result<StdSocket> {
        let addr = SocketAddr::V4(remote.into());
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        StdSocket::new(stream)
    }
}

/// Non-blocking TCP listener.
#[derive(Debug)]
pub struct StdListener {
    inner: TcpListener,
    port: u16,
}

impl Listener for StdListener {
    type Socket = StdSocket;

    fn accept(&mut self) -> Option<StdSocket> {
        match self.inner.accept() {
            Ok((stream, addr)) => match StdSocket::new(stream) {
                Ok(socket) => Some(socket),
                Err(e) => {
                    debug!(%addr, error = %e, "dropping accepted connection");
                    None
                },
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                debug!(error = %e, "accept failed");
                None
            },
        }
    }

    fn local_port(&self) -> u16 {
        self.port
    }
}

/// TCP socket with byte-at-a-time reads.
///
/// Reads go through a small buffer so polling one byte does not cost one
/// syscall.
#[derive(Debug)]
pub struct StdSocket {
    stream: TcpStream,
    peer: Option<NetworkAddress>,
    buf: [u8; READ_AHEAD],
    start: usize,
    end: usize,
    eof: bool,
    open: bool,
}

impl StdSocket {
    /// Wrap a connected stream.
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        let peer = match stream.peer_addr()? {
            SocketAddr::V4(addr) => Some(addr.into()),
            SocketAddr::V6(_) => None,
        };
        Ok(Self { stream, peer, buf: [0; READ_AHEAD], start: 0, end: 0, eof: false, open: true })
    }

    fn fill(&mut self) {
        if self.start < self.end || self.eof || !self.open {
            return;
        }
        match self.stream.read(&mut self.buf) {
            Ok(0) => self.eof = true,
            Ok(n) => {
                self.start = 0;
                self.end = n;
            },
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {},
            Err(e) => {
                trace!(peer = ?self.peer, error = %e, "read failed");
                self.eof = true;
            },
        }
    }
}

impl ByteSource for StdSocket {
    fn read_byte(&mut self) -> Option<u8> {
        self.fill();
        if self.start < self.end {
            let byte = self.buf[self.start];
            self.start += 1;
            Some(byte)
        } else {
            None
        }
    }
}

impl ClientSocket for StdSocket {
    fn is_connected(&mut self) -> bool {
        if !self.open {
            return false;
        }
        self.fill();
        self.start < self.end || !self.eof
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "socket stopped"));
        }
        self.stream.set_nonblocking(false)?;
        let written = self.stream.write_all(bytes).and_then(|()| self.stream.flush());
        self.stream.set_nonblocking(true)?;
        written
    }

    fn stop(&mut self) {
        if self.open {
            self.open = false;
            self.start = 0;
            self.end = 0;
            // Peer may already be gone
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }

    fn peer(&self) -> Option<NetworkAddress> {
        self.peer
    }
}
