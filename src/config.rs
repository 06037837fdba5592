//! Tunables for the transfer tasks and the demo driver.

use std::time::Duration;

/// Default wait inside the consumer's timed take before it re-checks for completion.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Per-transfer options handed to the coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferOptions {
    /// How long one consumer poll waits for an item.
    pub poll_interval: Duration,
    /// Emit one event per enqueued/dequeued item.
    pub verbose: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            verbose: false,
        }
    }
}

impl TransferOptions {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Constants supplied by the demo driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoConfig {
    pub total_items: usize,
    pub capacity: usize,
    /// Interval between `[STATUS]` lines.
    pub status_interval: Duration,
    /// Upper bound on the final wait for both workers.
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    pub verbose: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            total_items: 25,
            capacity: 10,
            status_interval: Duration::from_millis(300),
            wait_timeout: Duration::from_secs(10),
            poll_interval: DEFAULT_POLL_INTERVAL,
            verbose: false,
        }
    }
}

impl DemoConfig {
    /// Options for the coordinator derived from this configuration.
    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions::default()
            .with_poll_interval(self.poll_interval)
            .with_verbose(self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_defaults_match_documented_constants() {
        let config = DemoConfig::default();
        assert_eq!(config.total_items, 25);
        assert_eq!(config.capacity, 10);
        assert_eq!(config.status_interval, Duration::from_millis(300));
        assert_eq!(config.transfer_options(), TransferOptions::default());
    }
}
