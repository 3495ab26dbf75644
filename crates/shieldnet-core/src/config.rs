//! Node configuration.
//!
//! Everything here is fixed when the node starts. The only runtime changes
//! come from config-update frames (see [`crate::command`]), which re-target
//! the outbound peer or stage new local addresses for the next bring-up.

use std::{
    fmt,
    net::{Ipv4Addr, SocketAddrV4},
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default inbound client table capacity.
pub const DEFAULT_CLIENTS: usize = 8;

/// Default frame buffer capacity, terminator included.
pub const DEFAULT_FRAME_CAPACITY: usize = 64;

/// IPv4 address plus port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkAddress {
    /// Host address
    pub ip: Ipv4Addr,
    /// TCP port
    pub port: u16,
}

impl NetworkAddress {
    /// Create an address from its parts.
    pub const fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl From<SocketAddrV4> for NetworkAddress {
    fn from(addr: SocketAddrV4) -> Self {
        Self { ip: *addr.ip(), port: addr.port() }
    }
}

impl From<NetworkAddress> for SocketAddrV4 {
    fn from(addr: NetworkAddress) -> Self {
        Self::new(addr.ip, addr.port)
    }
}

impl FromStr for NetworkAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddrV4>()
            .map(Self::from)
            .map_err(|_| ConfigError::InvalidAddress(s.to_string()))
    }
}

/// 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for MacAddress {
    type Err = ConfigError;

    /// Parse `DE:AD:BE:EF:FE:ED` or `de-ad-be-ef-fe-ed`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidMac(s.to_string());
        let mut octets = [0u8; 6];
        let mut parts = s.split([':', '-']);

        for octet in &mut octets {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

/// How the interface obtains its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressMode {
    /// Use the configured static address
    Static,
    /// Request a lease, falling back to the static address on failure
    Dhcp,
}

/// Interface bring-up parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSettings {
    /// Hardware address
    pub mac: MacAddress,
    /// Static or DHCP addressing
    pub mode: AddressMode,
    /// Local address (static, or DHCP fallback)
    pub ip: Ipv4Addr,
    /// DNS server
    pub dns: Ipv4Addr,
    /// Default gateway
    pub gateway: Ipv4Addr,
    /// Subnet mask
    pub subnet: Ipv4Addr,
}

impl Default for InterfaceSettings {
    fn default() -> Self {
        Self {
            mac: MacAddress([0xDE, 0xAD, 0xBE, 0xEF, 0xFE, 0xED]),
            mode: AddressMode::Static,
            ip: Ipv4Addr::new(169, 254, 235, 40),
            dns: Ipv4Addr::new(169, 254, 235, 1),
            gateway: Ipv4Addr::new(169, 254, 235, 1),
            subnet: Ipv4Addr::new(255, 255, 0, 0),
        }
    }
}

/// Full node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Interface bring-up parameters
    pub interface: InterfaceSettings,
    /// Fixed peer for the outbound connection
    pub remote: NetworkAddress,
    /// Local port for inbound clients
    pub listen_port: u16,
    /// Upper bound on one outbound connect attempt
    pub connect_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            interface: InterfaceSettings::default(),
            remote: NetworkAddress::new(Ipv4Addr::new(169, 254, 235, 35), 8000),
            listen_port: 10002,
            connect_timeout: Duration::from_secs(1),
        }
    }
}
