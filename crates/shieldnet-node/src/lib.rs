//! Host build of a shieldnet node.
//!
//! Runs the connection manager over ordinary std TCP sockets so the node's
//! behavior can be exercised from a desktop: one outbound connection to a
//! fixed peer, a listener for inbound clients, `<...>` frames read from those
//! clients, and CRLF lines sent back out.
//!
//! - [`transport`]: std implementation of the core transport traits
//! - [`runner`]: the control loop
//! - [`push`]: the host-side config-update tool

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod push;
pub mod runner;
pub mod transport;

pub use error::NodeError;
pub use push::push_command;
pub use runner::{FrameAction, RunOptions, Runner, Step};
pub use transport::{StdInterface, StdListener, StdSocket};
