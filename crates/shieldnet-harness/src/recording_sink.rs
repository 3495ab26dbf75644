//! Diagnostic sink that keeps every event for later assertions.

use shieldnet_core::{Diagnostic, DiagnosticSink, Fault};

/// Sink recording diagnostics in emission order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Vec<Diagnostic>,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event recorded so far.
    pub fn events(&self) -> &[Diagnostic] {
        &self.events
    }

    /// Recorded faults, in order.
    pub fn faults(&self) -> impl Iterator<Item = Fault> + '_ {
        self.events.iter().filter_map(|event| match event {
            Diagnostic::Fault(fault) => Some(*fault),
            _ => None,
        })
    }

    /// Number of events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Diagnostic) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(event)).count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        self.events.push(*diagnostic);
    }
}
