//! Consumer side: drains the channel into the destination until the producer is done.
//!
//! Each iteration first attempts a timed take. Only when that take comes back
//! empty does the consumer look at the producer-done flag and then at channel
//! emptiness. The flag is raised strictly after the producer's last put
//! returned, so any item enqueued before the flag flipped is still in the
//! channel when the consumer observes the flag, and the emptiness check keeps
//! the consumer running until it has been taken.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::channel::BoundedChannel;
use crate::config::DEFAULT_POLL_INTERVAL;
use crate::destination::Destination;
use crate::logging::LogSink;
use crate::types::Item;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerState {
    Running,
    Terminated,
}

/// Why the consumer stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerExit {
    /// Producer finished and the channel was observed empty.
    Drained,
    /// Cancelled while polling; the drain may be partial.
    Interrupted,
}

pub struct ConsumerTask {
    channel: Arc<BoundedChannel<Item>>,
    destination: Arc<Destination>,
    producer_done: Arc<AtomicBool>,
    cancel: CancelToken,
    log: Arc<dyn LogSink>,
    poll_interval: Duration,
    verbose: bool,
    state: ConsumerState,
    exit: Option<ConsumerExit>,
}

impl ConsumerTask {
    pub fn new(
        channel: Arc<BoundedChannel<Item>>,
        destination: Arc<Destination>,
        producer_done: Arc<AtomicBool>,
        cancel: CancelToken,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            channel,
            destination,
            producer_done,
            cancel,
            log,
            poll_interval: DEFAULT_POLL_INTERVAL,
            verbose: false,
            state: ConsumerState::Running,
            exit: None,
        }
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Run one poll iteration and return the resulting state.
    pub fn step(&mut self) -> ConsumerState {
        if self.state == ConsumerState::Terminated {
            return self.state;
        }

        match self.channel.try_take(self.poll_interval, &self.cancel) {
            Ok(Some(item)) => {
                let description = self.verbose.then(|| item.to_string());
                self.destination.push(item);
                if let Some(description) = description {
                    self.log.item(&format!("Consumed: {description}"));
                }
            }
            Ok(None) => {
                // Completion is only checked after a take came back empty.
                if self.producer_done.load(Ordering::SeqCst) && self.channel.is_empty() {
                    self.log
                        .info("Queue drained and producer done. Consumer exiting.");
                    self.terminate(ConsumerExit::Drained);
                }
            }
            Err(_) => {
                self.log.warn("Consumer interrupted. Exiting.");
                self.terminate(ConsumerExit::Interrupted);
            }
        }
        self.state
    }

    fn terminate(&mut self, exit: ConsumerExit) {
        self.state = ConsumerState::Terminated;
        self.exit = Some(exit);
    }

    /// Poll until terminated.
    pub fn run(mut self) -> ConsumerExit {
        self.log.info("Consumer started.");
        while self.step() == ConsumerState::Running {}
        self.log.info(&format!(
            "Consumer finished. Items consumed: {}",
            self.destination.len()
        ));
        self.exit.unwrap_or(ConsumerExit::Interrupted)
    }
}
