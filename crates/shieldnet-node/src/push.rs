//! Host-side config updater.
//!
//! Connects to a node's listener, writes one framed JSON command and closes
//! the connection.

use std::{
    net::{SocketAddr, TcpStream},
    time::Duration,
};

use shieldnet_core::{ConfigCommand, NetworkAddress};
use shieldnet_proto::write_frame;
use tracing::info;

use crate::error::NodeError;

/// Send `command` to the node listening at `target`.
pub fn push_command(
    target: NetworkAddress,
    command: &ConfigCommand,
    timeout: Duration,
) -> Result<(), NodeError> {
    let body = command.to_json();
    let io_err = |source| NodeError::Push { target, source };

    let mut stream =
        TcpStream::connect_timeout(&SocketAddr::V4(target.into()), timeout).map_err(io_err)?;
    stream.set_write_timeout(Some(timeout)).map_err(io_err)?;
    write_frame(&mut stream, body.as_bytes())?;

    info!(%target, %body, "config command pushed");
    Ok(())
}
