//! Node error types.

use std::io;

use shieldnet_core::{CommandError, NetworkAddress};
use shieldnet_proto::ProtocolError;
use thiserror::Error;

/// Errors that stop the node binary.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Listener could not be bound
    #[error("could not listen on port {port}")]
    Listen {
        /// Requested port
        port: u16,
    },

    /// Config push could not reach the node
    #[error("push to {target} failed: {source}")]
    Push {
        /// Node listener address
        target: NetworkAddress,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// Frame encoding error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Invalid config-update command
    #[error(transparent)]
    Command(#[from] CommandError),
}
