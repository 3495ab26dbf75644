//! Deterministic simulation harness for shieldnet testing.
//!
//! An in-memory Ethernet shield implementing the `shieldnet-core` transport
//! traits. Tests drive both ends: the node side through a
//! [`shieldnet_core::ConnectionManager`] over [`SimShield`], the remote side
//! through [`SimPeer`] handles obtained from [`SimNetwork`].
//!
//! Everything is single-threaded and seeded, so a failing run replays
//! exactly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod recording_sink;
pub mod scenario;
pub mod sim_network;
pub mod sim_socket;

pub use recording_sink::RecordingSink;
pub use scenario::{Scenario, SimManager, World};
pub use sim_network::{DhcpLease, SimListener, SimNetwork, SimShield};
pub use sim_socket::{SimPeer, SimSocket};
