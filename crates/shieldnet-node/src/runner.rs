//! The node's control loop.
//!
//! Each [`Runner::step`] runs one manager tick, handles the frame it
//! produced, and sends a float reading when one is due. A frame body that
//! decodes as a config-update command is applied. A body that is not JSON, or
//! is a JSON object with no command key, is forwarded to the outbound peer as
//! a text line when forwarding is enabled.

use std::{thread, time::Duration};

use shieldnet_core::{
    CommandError, ConfigCommand, ConnectionManager, DiagnosticSink, InterfaceStatus,
    NetworkInterface, Tick,
};
use tracing::{debug, info, warn};

use crate::error::NodeError;

/// Control-loop behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Forward non-command frame bodies to the outbound peer
    pub forward: bool,
    /// Reading sent with `send_float` every `sample_every` ticks
    pub sample: Option<f32>,
    /// Ticks between readings
    pub sample_every: u64,
    /// Sleep between ticks
    pub poll_interval: Duration,
    /// Stop after this many ticks
    pub max_ticks: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            forward: false,
            sample: None,
            sample_every: 100,
            poll_interval: Duration::from_millis(10),
            max_ticks: None,
        }
    }
}

/// What happened to the frame a step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameAction {
    /// Decoded and applied as a config-update command
    Applied(ConfigCommand),
    /// Sent to the outbound peer as a line
    Forwarded(String),
    /// Dropped: not a command, forwarding disabled or the peer unreachable
    Dropped,
    /// Looked like a command but was invalid
    Rejected,
}

/// Outcome of one control-loop step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Manager tick summary
    pub tick: Tick,
    /// Frame handling, if a frame was ready
    pub frame: Option<FrameAction>,
    /// Whether a reading was sent
    pub sampled: bool,
}

/// Drives a [`ConnectionManager`] in a polling loop.
pub struct Runner<I: NetworkInterface, D> {
    manager: ConnectionManager<I, D>,
    options: RunOptions,
    ticks: u64,
}

impl<I, D> Runner<I, D>
where
    I: NetworkInterface,
    D: DiagnosticSink,
{
    /// Wrap a manager.
    pub fn new(manager: ConnectionManager<I, D>, options: RunOptions) -> Self {
        Self { manager, options, ticks: 0 }
    }

    /// Bring the interface up and start the listener.
    ///
    /// A missing controller or dead link is not an error; the loop keeps
    /// running degraded. Failing to listen is.
    pub fn start(&mut self) -> Result<InterfaceStatus, NodeError> {
        let settings = self.manager.config().interface.clone();
        let status = self.manager.initialize_interface(&settings);
        if status != InterfaceStatus::Ok {
            warn!(?status, "interface degraded");
        }

        let port = self.manager.config().listen_port;
        if !self.manager.start_listener(port) {
            return Err(NodeError::Listen { port });
        }
        Ok(status)
    }

    /// Run one control-loop pass.
    pub fn step(&mut self) -> Step {
        let tick = self.manager.tick();
        self.ticks += 1;

        let frame = if tick.frame_ready {
            self.manager.take_frame(<[u8]>::to_vec).map(|body| self.handle_frame(&body))
        } else {
            None
        };

        let sampled = self.sample_due() && self.send_sample();
        Step { tick, frame, sampled }
    }

    /// Run until `max_ticks`, sleeping `poll_interval` between passes.
    pub fn run(&mut self) {
        info!(options = ?self.options, "control loop started");
        loop {
            self.step();
            if self.options.max_ticks.is_some_and(|max| self.ticks >= max) {
                break;
            }
            thread::sleep(self.options.poll_interval);
        }
        info!(ticks = self.ticks, "control loop stopped");
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The wrapped manager.
    pub fn manager(&self) -> &ConnectionManager<I, D> {
        &self.manager
    }

    /// The wrapped manager, mutably.
    pub fn manager_mut(&mut self) -> &mut ConnectionManager<I, D> {
        &mut self.manager
    }

    fn handle_frame(&mut self, body: &[u8]) -> FrameAction {
        match ConfigCommand::parse(body) {
            Ok(command) => {
                self.manager.apply_command(command);
                FrameAction::Applied(command)
            },
            // Not JSON, or a JSON object with no command key
            Err(CommandError::Json(_) | CommandError::Empty) => self.forward(body),
            Err(e) => {
                warn!(error = %e, "rejected config command");
                FrameAction::Rejected
            },
        }
    }

    fn forward(&mut self, body: &[u8]) -> FrameAction {
        if !self.options.forward {
            return FrameAction::Dropped;
        }
        let line = String::from_utf8_lossy(body).into_owned();
        match self.manager.send_text(&line) {
            Ok(()) => FrameAction::Forwarded(line),
            Err(e) => {
                debug!(error = %e, "forward failed");
                FrameAction::Dropped
            },
        }
    }

    fn sample_due(&self) -> bool {
        self.options.sample.is_some() && self.ticks % self.options.sample_every.max(1) == 0
    }

    fn send_sample(&mut self) -> bool {
        let Some(value) = self.options.sample else {
            return false;
        };
        match self.manager.send_float(value) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "sample not sent");
                false
            },
        }
    }
}
