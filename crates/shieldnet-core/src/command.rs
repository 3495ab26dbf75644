//! Config-update commands carried in frame bodies.
//!
//! A host-side updater sends one JSON object per frame, with exactly one of
//! these keys:
//!
//! | key          | value                                   |
//! |--------------|-----------------------------------------|
//! | `datetime`   | `"YYYYmmdd-HH:MM:SS.ffffff"`            |
//! | `server_ip`  | dotted IPv4 of the outbound peer         |
//! | `port`       | outbound peer port, string or number     |
//! | `client_ip`  | this node's static address              |
//! | `gateway_ip` | gateway and DNS address                 |
//!
//! For example `<{"server_ip": "169.254.235.35"}>`.

use std::net::Ipv4Addr;

use chrono::{NaiveDateTime, Timelike};
use serde::Deserialize;
use serde_json::json;

use crate::error::CommandError;

/// `chrono` format of the `datetime` value.
pub const DATETIME_FORMAT: &str = "%Y%m%d-%H:%M:%S%.f";

/// A decoded config-update command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Wall-clock reference for the node
    DateTime(NaiveDateTime),
    /// New outbound peer address
    ServerIp(Ipv4Addr),
    /// New outbound peer port
    ServerPort(u16),
    /// New local static address, applied on next bring-up
    ClientIp(Ipv4Addr),
    /// New gateway and DNS address, applied on next bring-up
    GatewayIp(Ipv4Addr),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct WireCommand {
    datetime: Option<String>,
    server_ip: Option<String>,
    port: Option<PortValue>,
    client_ip: Option<String>,
    gateway_ip: Option<String>,
}

impl ConfigCommand {
    /// Decode a frame body.
    pub fn parse(body: &[u8]) -> Result<Self, CommandError> {
        let wire: WireCommand = serde_json::from_slice(body)?;

        let present = [
            wire.datetime.is_some(),
            wire.server_ip.is_some(),
            wire.port.is_some(),
            wire.client_ip.is_some(),
            wire.gateway_ip.is_some(),
        ]
        .into_iter()
        .filter(|&p| p)
        .count();

        match present {
            0 => return Err(CommandError::Empty),
            1 => {},
            n => return Err(CommandError::Ambiguous(n)),
        }

        if let Some(value) = wire.datetime {
            return Self::datetime(&value);
        }
        if let Some(value) = wire.server_ip {
            return parse_ip(&value).map(Self::ServerIp);
        }
        if let Some(value) = wire.port {
            return parse_port(value).map(Self::ServerPort);
        }
        if let Some(value) = wire.client_ip {
            return parse_ip(&value).map(Self::ClientIp);
        }
        match wire.gateway_ip {
            Some(value) => parse_ip(&value).map(Self::GatewayIp),
            None => Err(CommandError::Empty),
        }
    }

    /// Build a `datetime` command from its wire text.
    ///
    /// The wire resolution is microseconds; fraction digits past the sixth
    /// are truncated.
    pub fn datetime(value: &str) -> Result<Self, CommandError> {
        let at = NaiveDateTime::parse_from_str(value.trim(), DATETIME_FORMAT)
            .map_err(|source| CommandError::InvalidDateTime { value: value.to_string(), source })?;
        let micros = at.nanosecond() / 1_000 * 1_000;
        Ok(Self::DateTime(at.with_nanosecond(micros).unwrap_or(at)))
    }

    /// Encode as the JSON object a frame body carries.
    ///
    /// Ports are written as strings, matching the host-side updater.
    pub fn to_json(&self) -> String {
        let value = match self {
            Self::DateTime(at) => {
                json!({ "datetime": at.format("%Y%m%d-%H:%M:%S%.6f").to_string() })
            },
            Self::ServerIp(ip) => json!({ "server_ip": ip.to_string() }),
            Self::ServerPort(port) => json!({ "port": port.to_string() }),
            Self::ClientIp(ip) => json!({ "client_ip": ip.to_string() }),
            Self::GatewayIp(ip) => json!({ "gateway_ip": ip.to_string() }),
        };
        value.to_string()
    }
}

fn parse_ip(value: &str) -> Result<Ipv4Addr, CommandError> {
    value.trim().parse().map_err(|_| CommandError::InvalidAddress(value.to_string()))
}

fn parse_port(value: PortValue) -> Result<u16, CommandError> {
    let (parsed, text) = match value {
        PortValue::Number(n) => (u16::try_from(n).ok(), n.to_string()),
        PortValue::Text(s) => (s.trim().parse::<u16>().ok(), s),
    };
    parsed.filter(|&p| p != 0).ok_or(CommandError::InvalidPort(text))
}
