//! Log sinks
//!
//! The callback manager owns one sink for the lifetime of a run and hands it
//! to every hook through the callback context.

use std::cell::RefCell;
use std::rc::Rc;

pub use tracing::Level;

/// Destination for structured log lines emitted by callbacks.
pub trait LogSink {
    /// Record one message at `level`.
    fn log(&mut self, level: Level, message: &str);
}

/// Forwards every message to the `tracing` macros.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&mut self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "entrenar_callbacks", "{message}"),
            Level::WARN => tracing::warn!(target: "entrenar_callbacks", "{message}"),
            Level::INFO => tracing::info!(target: "entrenar_callbacks", "{message}"),
            Level::DEBUG => tracing::debug!(target: "entrenar_callbacks", "{message}"),
            _ => tracing::trace!(target: "entrenar_callbacks", "{message}"),
        }
    }
}

/// Keeps messages in memory. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    records: Rc<RefCell<Vec<(Level, String)>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records.
    pub fn records(&self) -> Vec<(Level, String)> {
        self.records.borrow().clone()
    }

    /// Messages logged at `level`.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Whether any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.records.borrow().iter().any(|(_, m)| m.contains(needle))
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Whether nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl LogSink for MemorySink {
    fn log(&mut self, level: Level, message: &str) {
        self.records.borrow_mut().push((level, message.to_string()));
    }
}
