//! Log sink seam used by the transfer tasks, plus subscriber setup for the CLI.

use std::sync::{Mutex, PoisonError};

use tracing_subscriber::EnvFilter;

/// Destination for transfer lifecycle and per-item events.
///
/// Task start/finish events go to `info`, recovered interruptions to `warn`,
/// and per-item enqueue/dequeue traces to `item`. Callers only emit `item`
/// events when verbose logging is enabled.
pub trait LogSink: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn item(&self, message: &str);
}

/// Forwards events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn info(&self, message: &str) {
        tracing::info!(target: "bounded_transfer::transfer", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "bounded_transfer::transfer", "{message}");
    }

    fn item(&self, message: &str) {
        tracing::debug!(target: "bounded_transfer::transfer", "{message}");
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Item,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, level: LogLevel, message: &str) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogEvent {
                level,
                message: message.to_string(),
            });
    }

    /// Copy of all events recorded so far.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages recorded at `level`.
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|event| event.level == level)
            .map(|event| event.message)
            .collect()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.messages(level).len()
    }
}

impl LogSink for MemorySink {
    fn info(&self, message: &str) {
        self.record(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.record(LogLevel::Warn, message);
    }

    fn item(&self, message: &str) {
        self.record(LogLevel::Item, message);
    }
}

/// Install a stderr fmt subscriber. `RUST_LOG` overrides the verbosity switch.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .try_init()
}
