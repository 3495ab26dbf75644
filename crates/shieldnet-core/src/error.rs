//! Faults and error types.
//!
//! [`Fault`] is the taxonomy of things that go wrong inside the control loop.
//! None of them is fatal: the manager records the fault, reports it to the
//! diagnostic sink, and carries on. [`LinkError`] and friends are ordinary
//! `Result` errors for the few calls that have a caller to report to.

use std::io;

use shieldnet_proto::ProtocolError;
use thiserror::Error;

use crate::config::NetworkAddress;

/// Non-fatal fault observed by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    /// No Ethernet controller responded during bring-up
    #[error("Ethernet hardware was not found")]
    HardwareNotFound,

    /// Controller present but the cable is unplugged
    #[error("Ethernet link is down")]
    LinkDown,

    /// Outbound connect attempt failed
    #[error("connection to {remote} failed")]
    ConnectFailed {
        /// Peer that refused or timed out
        remote: NetworkAddress,
    },

    /// Inbound connection arrived with every slot occupied
    #[error("client table full ({capacity} slots), connection dropped")]
    ListenerAcceptOverflow {
        /// Table capacity
        capacity: usize,
    },

    /// Frame body was longer than the buffer and got clamped
    #[error("frame body clamped to {max_body} bytes")]
    BufferOverflowClamped {
        /// Longest body the buffer keeps
        max_body: usize,
    },
}

/// Running totals of each fault kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultCounters {
    /// Bring-ups that found no hardware
    pub hardware_not_found: u32,
    /// Bring-ups that found the link down
    pub link_down: u32,
    /// Failed outbound connect attempts
    pub connect_failed: u32,
    /// Inbound connections dropped for lack of a slot
    pub accept_overflow: u32,
    /// Frames whose body was clamped
    pub clamped_frames: u32,
}

impl FaultCounters {
    /// Count one occurrence of `fault`.
    pub fn record(&mut self, fault: &Fault) {
        let counter = match fault {
            Fault::HardwareNotFound => &mut self.hardware_not_found,
            Fault::LinkDown => &mut self.link_down,
            Fault::ConnectFailed { .. } => &mut self.connect_failed,
            Fault::ListenerAcceptOverflow { .. } => &mut self.accept_overflow,
            Fault::BufferOverflowClamped { .. } => &mut self.clamped_frames,
        };
        *counter = counter.saturating_add(1);
    }

    /// Sum over every fault kind.
    pub fn total(&self) -> u32 {
        self.hardware_not_found
            .saturating_add(self.link_down)
            .saturating_add(self.connect_failed)
            .saturating_add(self.accept_overflow)
            .saturating_add(self.clamped_frames)
    }
}

/// Errors from sending on the outbound connection.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No outbound connection is established
    #[error("outbound connection is not established")]
    NotConnected,

    /// The transport rejected the write; the connection has been dropped
    #[error("write to outbound peer failed: {0}")]
    Io(#[from] io::Error),

    /// The value could not be encoded
    #[error("encoding failed: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Errors decoding a config-update command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Body is not valid JSON of the expected shape
    #[error("invalid command JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Object carries no known key
    #[error("command has no recognised key")]
    Empty,

    /// Object carries more than one known key
    #[error("command carries {0} keys, expected exactly one")]
    Ambiguous(usize),

    /// Address value is not a dotted IPv4 address
    #[error("invalid IPv4 address: {0:?}")]
    InvalidAddress(String),

    /// Port value is not a number in 1..=65535
    #[error("invalid port: {0:?}")]
    InvalidPort(String),

    /// Timestamp does not match `YYYYmmdd-HH:MM:SS.ffffff`
    #[error("invalid datetime {value:?}: {source}")]
    InvalidDateTime {
        /// The rejected text
        value: String,
        /// Parser failure
        source: chrono::ParseError,
    },
}

/// Errors parsing configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// MAC address is not six hex octets
    #[error("invalid MAC address: {0:?}")]
    InvalidMac(String),

    /// Network address is not `a.b.c.d:port`
    #[error("invalid network address: {0:?}")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn counters_track_each_kind() {
        let mut counters = FaultCounters::default();
        let remote = NetworkAddress::new(Ipv4Addr::LOCALHOST, 8000);

        counters.record(&Fault::ConnectFailed { remote });
        counters.record(&Fault::ConnectFailed { remote });
        counters.record(&Fault::ListenerAcceptOverflow { capacity: 4 });

        assert_eq!(counters.connect_failed, 2);
        assert_eq!(counters.accept_overflow, 1);
        assert_eq!(counters.total(), 3);
    }

    #[test]
    fn fault_messages_name_the_cause() {
        let remote = NetworkAddress::new(Ipv4Addr::new(10, 0, 0, 1), 8000);
        assert_eq!(Fault::ConnectFailed { remote }.to_string(), "connection to 10.0.0.1:8000 failed");
        assert_eq!(
            Fault::BufferOverflowClamped { max_body: 63 }.to_string(),
            "frame body clamped to 63 bytes"
        );
    }
}
