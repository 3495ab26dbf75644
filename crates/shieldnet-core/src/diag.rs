//! Diagnostic events and sinks.
//!
//! The manager reports what it does as [`Diagnostic`] values. Where they end
//! up is the embedder's choice:
//!
//! - [`NoopSink`] drops everything, for builds without a debug channel
//! - [`TextSink`] renders human-readable status lines into any `fmt::Write`
//!   (a serial console, a string)
//! - [`TracingSink`] turns them into structured `tracing` events
//!
//! Diagnostics are not part of the functional contract. Every fact they
//! carry is also available from the manager's accessors.

use std::fmt;

use crate::{
    command::ConfigCommand,
    config::NetworkAddress,
    error::Fault,
    manager::InterfaceStatus,
    transport::{LeaseEvent, NetworkReport},
};

/// Something the connection manager did or observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// Interface bring-up finished
    InterfaceUp {
        /// Resulting status
        status: InterfaceStatus,
        /// Addresses in effect
        report: NetworkReport,
    },
    /// Listener bound
    ListenerStarted {
        /// Bound port
        port: u16,
    },
    /// Listener could not be bound
    ListenerFailed {
        /// Requested port
        port: u16,
    },
    /// Outbound connection established
    Connected {
        /// Peer address
        remote: NetworkAddress,
    },
    /// Outbound connection found closed
    OutboundLost {
        /// Peer address
        remote: NetworkAddress,
    },
    /// Outbound write failed
    SendFailed {
        /// Peer address
        remote: NetworkAddress,
    },
    /// Inbound client placed in a slot
    ClientAccepted {
        /// Slot index
        slot: usize,
        /// Remote end, when known
        peer: Option<NetworkAddress>,
    },
    /// Inbound client evicted after disconnecting
    ClientRemoved {
        /// Freed slot index
        slot: usize,
    },
    /// A frame completed
    FrameReady {
        /// Body length
        len: usize,
    },
    /// Lease maintenance did something
    Lease(LeaseEvent),
    /// A config-update command was applied
    CommandApplied(ConfigCommand),
    /// A non-fatal fault
    Fault(Fault),
}

/// Destination for diagnostics.
pub trait DiagnosticSink {
    /// Record one event.
    fn emit(&mut self, diagnostic: &Diagnostic);
}

impl<D: DiagnosticSink + ?Sized> DiagnosticSink for &mut D {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        (**self).emit(diagnostic);
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn emit(&mut self, _diagnostic: &Diagnostic) {}
}

/// Sink that writes status lines to a text channel.
#[derive(Debug, Default)]
pub struct TextSink<W> {
    out: W,
}

impl<W: fmt::Write> TextSink<W> {
    /// Wrap a text writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Borrow the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, diagnostic: &Diagnostic) -> fmt::Result {
        let out = &mut self.out;
        match diagnostic {
            Diagnostic::InterfaceUp { report, .. } => {
                writeln!(out, "Network information:")?;
                writeln!(out, "IPv4 Address: {}", report.local_ip)?;
                writeln!(out, "Gateway: {}", report.gateway)?;
                writeln!(out, "Subnet mask: {}", report.subnet)?;
                writeln!(out, "DNS Server: {}", report.dns)
            },
            Diagnostic::ListenerStarted { port } => writeln!(out, "Listening on port {port}."),
            Diagnostic::ListenerFailed { port } => {
                writeln!(out, "ERROR: could not listen on port {port}.")
            },
            Diagnostic::Connected { .. } => writeln!(out, "Connected to host."),
            Diagnostic::OutboundLost { .. } => writeln!(out, "Host connection lost."),
            Diagnostic::SendFailed { .. } => writeln!(out, "Send to host failed."),
            Diagnostic::ClientAccepted { slot, peer: Some(peer) } => {
                writeln!(out, "Got new client: {peer} (slot {slot})")
            },
            Diagnostic::ClientAccepted { slot, peer: None } => {
                writeln!(out, "Got new client (slot {slot})")
            },
            Diagnostic::ClientRemoved { slot } => writeln!(out, "Client left (slot {slot})"),
            Diagnostic::FrameReady { len } => writeln!(out, "Received frame ({len} bytes)"),
            Diagnostic::Lease(event) => writeln!(out, "DHCP: {event:?}"),
            Diagnostic::CommandApplied(command) => writeln!(out, "Applied {command:?}"),
            Diagnostic::Fault(Fault::HardwareNotFound) => {
                writeln!(out, "ERROR: Ethernet shield was not found.")
            },
            Diagnostic::Fault(Fault::LinkDown) => {
                writeln!(out, "ERROR: Ethernet cable is not connected.")
            },
            Diagnostic::Fault(Fault::ConnectFailed { .. }) => {
                writeln!(out, "Connection to host failed.")
            },
            Diagnostic::Fault(fault) => writeln!(out, "WARNING: {fault}."),
        }
    }
}

impl<W: fmt::Write> DiagnosticSink for TextSink<W> {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        // A full or broken debug channel must not disturb the control loop
        let _ = self.render(diagnostic);
    }
}

/// Sink that forwards to `tracing`.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[cfg(feature = "tracing")]
impl DiagnosticSink for TracingSink {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        use tracing::{debug, info, warn};

        match diagnostic {
            Diagnostic::InterfaceUp { status, report } => info!(
                ?status,
                local_ip = %report.local_ip,
                gateway = %report.gateway,
                subnet = %report.subnet,
                dns = %report.dns,
                source = ?report.source,
                "interface up"
            ),
            Diagnostic::ListenerStarted { port } => info!(port, "listening"),
            Diagnostic::ListenerFailed { port } => warn!(port, "listen failed"),
            Diagnostic::Connected { remote } => info!(%remote, "connected to host"),
            Diagnostic::OutboundLost { remote } => info!(%remote, "host connection lost"),
            Diagnostic::SendFailed { remote } => warn!(%remote, "send to host failed"),
            Diagnostic::ClientAccepted { slot, peer } => {
                info!(slot, ?peer, "client accepted");
            },
            Diagnostic::ClientRemoved { slot } => info!(slot, "client removed"),
            Diagnostic::FrameReady { len } => debug!(len, "frame ready"),
            Diagnostic::Lease(event) => info!(?event, "lease maintenance"),
            Diagnostic::CommandApplied(command) => info!(?command, "config command applied"),
            Diagnostic::Fault(fault) => warn!(%fault, "fault"),
        }
    }
}
