//! Producer side: feeds source items into the channel in order.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cancel::CancelToken;
use crate::channel::BoundedChannel;
use crate::logging::LogSink;
use crate::types::{Item, ItemId};

/// How a producer run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProducerOutcome {
    /// Every source item was enqueued.
    Completed { enqueued: usize },
    /// Cancelled while blocked on `at`; that item and the rest were not enqueued.
    Interrupted { at: ItemId, enqueued: usize },
}

/// Pushes every source item into the channel, counting successful puts.
///
/// The task never signals completion itself; whoever runs it marks the
/// producer as done once [`run`](Self::run) returns.
pub struct ProducerTask {
    source: Vec<Item>,
    channel: Arc<BoundedChannel<Item>>,
    enqueued: Arc<AtomicUsize>,
    cancel: CancelToken,
    log: Arc<dyn LogSink>,
    verbose: bool,
}

impl ProducerTask {
    pub fn new(
        source: Vec<Item>,
        channel: Arc<BoundedChannel<Item>>,
        enqueued: Arc<AtomicUsize>,
        cancel: CancelToken,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            source,
            channel,
            enqueued,
            cancel,
            log,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn run(self) -> ProducerOutcome {
        self.log.info(&format!(
            "Producer started. Items to produce: {}",
            self.source.len()
        ));

        for item in self.source {
            let id = item.id();
            let description = self.verbose.then(|| item.to_string());
            // Blocks while the channel is full.
            if self.channel.put(item, &self.cancel).is_err() {
                self.log.warn(&format!(
                    "Producer interrupted at item {id}. Exiting early."
                ));
                return ProducerOutcome::Interrupted {
                    at: id,
                    enqueued: self.enqueued.load(Ordering::SeqCst),
                };
            }
            self.enqueued.fetch_add(1, Ordering::SeqCst);
            if let Some(description) = description {
                self.log.item(&format!("Enqueued: {description}"));
            }
        }

        let enqueued = self.enqueued.load(Ordering::SeqCst);
        self.log
            .info(&format!("Producer finished. Total enqueued: {enqueued}"));
        ProducerOutcome::Completed { enqueued }
    }
}
