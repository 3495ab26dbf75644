//! shieldnet core logic
//!
//! Connection management for a single Ethernet node polled from one control
//! loop: bring the interface up, keep one outbound connection to a fixed peer,
//! accept inbound clients into a fixed table, and scan them for delimited
//! frames.
//!
//! # Architecture
//!
//! All hardware access goes through the [`transport`] traits, so the same
//! [`manager::ConnectionManager`] runs against a real TCP stack, an embedded
//! Ethernet driver, or the in-memory simulation used by the test harness.
//! Nothing here blocks except interface bring-up and the bounded outbound
//! connect attempt, and nothing allocates on the connection, parse or send
//! paths.
//!
//! Failures never propagate out of the control loop. Each one degrades
//! locally, is retried on the next call, and is reported as a [`Fault`]
//! through the [`diag`] sink and the manager's counters.
//!
//! # Components
//!
//! - [`config`]: Node addressing and timeouts
//! - [`transport`]: Interface, listener and socket abstraction
//! - [`slots`]: Fixed-capacity inbound client table
//! - [`manager`]: Connection manager and frame scanning
//! - [`command`]: Config-update commands carried in frames
//! - [`diag`]: Diagnostic events and sinks
//! - [`error`]: Faults and error types

pub mod command;
pub mod config;
pub mod diag;
pub mod error;
pub mod manager;
pub mod slots;
pub mod transport;

pub use command::ConfigCommand;
pub use config::{
    AddressMode, DEFAULT_CLIENTS, DEFAULT_FRAME_CAPACITY, InterfaceSettings, MacAddress,
    NetworkAddress, NodeConfig,
};
pub use diag::{Diagnostic, DiagnosticSink, NoopSink, TextSink};
#[cfg(feature = "tracing")]
pub use diag::TracingSink;
pub use error::{CommandError, ConfigError, Fault, FaultCounters, LinkError};
pub use manager::{AcceptOutcome, ConnectionManager, InterfaceStatus, OUTBOUND_DRAIN_LIMIT, Tick};
pub use slots::ClientTable;
pub use transport::{
    AddressSource, ClientSocket, HardwareStatus, LeaseEvent, Listener, LinkStatus,
    NetworkInterface, NetworkReport,
};
