//! shieldnet node binary.
//!
//! `run` drives the node over host TCP sockets; `push` sends one
//! config-update command to a running node.

use std::{fmt, io::Write as _, net::Ipv4Addr, process::ExitCode, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};
use shieldnet_core::{
    AddressMode, ConfigCommand, ConnectionManager, DiagnosticSink, InterfaceSettings,
    MacAddress, NetworkAddress, NodeConfig, NoopSink, TextSink, TracingSink,
};
use shieldnet_node::{NodeError, RunOptions, Runner, StdInterface, push_command};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Polled Ethernet node over host TCP sockets
#[derive(Parser)]
#[command(name = "shieldnet-node", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the node's control loop
    Run(RunArgs),
    /// Send one config-update command to a node
    Push(PushArgs),
}

#[derive(Args)]
struct NetArgs {
    /// Hardware address reported by the interface
    #[arg(long, default_value = "DE:AD:BE:EF:FE:ED")]
    mac: MacAddress,

    /// Request a DHCP lease, falling back to the static address
    #[arg(long)]
    dhcp: bool,

    /// Static local address
    #[arg(long, default_value = "169.254.235.40")]
    ip: Ipv4Addr,

    /// DNS server
    #[arg(long, default_value = "169.254.235.1")]
    dns: Ipv4Addr,

    /// Default gateway
    #[arg(long, default_value = "169.254.235.1")]
    gateway: Ipv4Addr,

    /// Subnet mask
    #[arg(long, default_value = "255.255.0.0")]
    subnet: Ipv4Addr,

    /// Outbound peer
    #[arg(long, default_value = "169.254.235.35:8000")]
    remote: NetworkAddress,

    /// Port for inbound clients
    #[arg(long, default_value_t = 10002)]
    listen_port: u16,

    /// Outbound connect timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    connect_timeout_ms: u64,

    /// Address listeners bind to
    #[arg(long, default_value = "0.0.0.0")]
    bind: Ipv4Addr,
}

impl NetArgs {
    fn node_config(&self) -> NodeConfig {
        NodeConfig {
            interface: InterfaceSettings {
                mac: self.mac,
                mode: if self.dhcp { AddressMode::Dhcp } else { AddressMode::Static },
                ip: self.ip,
                dns: self.dns,
                gateway: self.gateway,
                subnet: self.subnet,
            },
            remote: self.remote,
            listen_port: self.listen_port,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Diagnostics {
    /// Structured `tracing` events
    Tracing,
    /// Plain status lines on stderr
    Text,
    /// Nothing
    None,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    net: NetArgs,

    /// Forward received frame bodies to the outbound peer
    #[arg(long)]
    forward: bool,

    /// Send this reading to the outbound peer periodically
    #[arg(long)]
    sample: Option<f32>,

    /// Ticks between readings
    #[arg(long, default_value_t = 100)]
    sample_every: u64,

    /// Milliseconds between control-loop passes
    #[arg(long, default_value_t = 10)]
    poll_ms: u64,

    /// Stop after this many passes
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Where connection diagnostics go
    #[arg(long, value_enum, default_value_t = Diagnostics::Tracing)]
    diagnostics: Diagnostics,
}

#[derive(Args)]
#[group(required = true, multiple = false, id = "update")]
struct UpdateArgs {
    /// Wall-clock reference, `YYYYmmdd-HH:MM:SS.ffffff` or `now`
    #[arg(long)]
    datetime: Option<String>,

    /// New outbound peer address
    #[arg(long)]
    server_ip: Option<Ipv4Addr>,

    /// New outbound peer port
    #[arg(long)]
    port: Option<u16>,

    /// New static address for the node
    #[arg(long)]
    client_ip: Option<Ipv4Addr>,

    /// New gateway and DNS address for the node
    #[arg(long)]
    gateway_ip: Option<Ipv4Addr>,
}

impl UpdateArgs {
    fn command(&self) -> Result<ConfigCommand, NodeError> {
        let command = match (&self.datetime, self.server_ip, self.port, self.client_ip) {
            (Some(value), ..) if value == "now" => {
                ConfigCommand::DateTime(chrono::Local::now().naive_local())
            },
            (Some(value), ..) => ConfigCommand::datetime(value)?,
            (None, Some(ip), ..) => ConfigCommand::ServerIp(ip),
            (None, None, Some(port), _) => ConfigCommand::ServerPort(port),
            (None, None, None, Some(ip)) => ConfigCommand::ClientIp(ip),
            (None, None, None, None) => match self.gateway_ip {
                Some(ip) => ConfigCommand::GatewayIp(ip),
                None => return Err(shieldnet_core::CommandError::Empty.into()),
            },
        };
        Ok(command)
    }
}

#[derive(Args)]
struct PushArgs {
    /// Node listener address
    #[arg(long, default_value = "169.254.235.40:10002")]
    target: NetworkAddress,

    /// Connect and write timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    #[command(flatten)]
    update: UpdateArgs,
}

/// `fmt::Write` adapter onto stderr for the text sink.
struct Stderr;

impl fmt::Write for Stderr {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        std::io::stderr().write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

fn run_node<D: DiagnosticSink>(args: &RunArgs, sink: D) -> Result<(), NodeError> {
    let config = args.net.node_config();
    info!(remote = %config.remote, listen_port = config.listen_port, "starting node");

    let manager = ConnectionManager::new(StdInterface::bound_to(args.net.bind), config, sink);
    let options = RunOptions {
        forward: args.forward,
        sample: args.sample,
        sample_every: args.sample_every,
        poll_interval: Duration::from_millis(args.poll_ms),
        max_ticks: args.max_ticks,
    };

    let mut runner = Runner::new(manager, options);
    runner.start()?;
    runner.run();
    Ok(())
}

fn run(cli: Cli) -> Result<(), NodeError> {
    match cli.command {
        Command::Run(args) => match args.diagnostics {
            Diagnostics::Tracing => run_node(&args, TracingSink),
            Diagnostics::Text => run_node(&args, TextSink::new(Stderr)),
            Diagnostics::None => run_node(&args, NoopSink),
        },
        Command::Push(args) => {
            let command = args.update.command()?;
            push_command(args.target, &command, Duration::from_millis(args.timeout_ms))
        },
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "node failed");
            ExitCode::FAILURE
        },
    }
}
