//! Orchestrates one producer and one consumer over a shared bounded channel.
//!
//! A coordinator is single-use: `start_transfer` succeeds once per instance.
//! The producer-done flag is raised by the coordinator's producer wrapper
//! only after [`ProducerTask::run`] has returned, on the same thread, so no
//! put can follow the flag.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::channel::{BoundedChannel, ChannelStatus};
use crate::config::TransferOptions;
use crate::consumer::ConsumerTask;
use crate::destination::Destination;
use crate::error::{Result, TransferError};
use crate::logging::{LogSink, TracingSink};
use crate::pool::WorkerPool;
use crate::producer::{ProducerOutcome, ProducerTask};
use crate::types::Item;

/// One worker for the consumer, one for the producer.
const WORKER_COUNT: usize = 2;

/// Progress snapshot. Fields are read independently, not atomically as a set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueStatus {
    pub channel: ChannelStatus,
    pub enqueued: usize,
    pub consumed: usize,
    pub producer_done: bool,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | Enqueued={} | Consumed={} | ProducerDone={}",
            self.channel, self.enqueued, self.consumed, self.producer_done
        )
    }
}

pub struct TransferCoordinator {
    channel: Arc<BoundedChannel<Item>>,
    options: TransferOptions,
    log: Arc<dyn LogSink>,
    started: AtomicBool,
    stopped: AtomicBool,
    producer_done: Arc<AtomicBool>,
    enqueued: Arc<AtomicUsize>,
    cancel: CancelToken,
    pool: OnceLock<WorkerPool>,
    destination: OnceLock<Arc<Destination>>,
}

impl TransferCoordinator {
    /// Create an idle coordinator that owns `channel`.
    pub fn new(channel: BoundedChannel<Item>) -> Self {
        Self {
            channel: Arc::new(channel),
            options: TransferOptions::default(),
            log: Arc::new(TracingSink),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            producer_done: Arc::new(AtomicBool::new(false)),
            enqueued: Arc::new(AtomicUsize::new(0)),
            cancel: CancelToken::new(),
            pool: OnceLock::new(),
            destination: OnceLock::new(),
        }
    }

    /// Coordinator over a fresh channel of `capacity`.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self::new(BoundedChannel::new(capacity)?))
    }

    /// Replace the poll interval and verbosity used by both tasks.
    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    /// Send task events to `log` instead of `tracing`.
    pub fn with_log_sink(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    /// Launch the consumer, then the producer, and return without waiting.
    ///
    /// Fails with [`TransferError::IllegalState`] on every call after the first.
    pub fn start_transfer(&self, source: Vec<Item>, destination: Arc<Destination>) -> Result<()> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TransferError::IllegalState(
                "transfer coordinator is single-use; create a new instance for a new transfer"
                    .to_string(),
            ));
        }

        self.producer_done.store(false, Ordering::SeqCst);
        self.enqueued.store(0, Ordering::SeqCst);
        // The `started` transition above admits exactly one caller, so the slot is still empty.
        if self.destination.set(Arc::clone(&destination)).is_err() {
            return Err(TransferError::IllegalState(
                "destination already attached".to_string(),
            ));
        }
        let pool = self.pool.get_or_init(|| WorkerPool::new(WORKER_COUNT));

        let consumer = ConsumerTask::new(
            Arc::clone(&self.channel),
            destination,
            Arc::clone(&self.producer_done),
            self.cancel.clone(),
            Arc::clone(&self.log),
        )
        .poll_interval(self.options.poll_interval)
        .verbose(self.options.verbose);

        let producer = ProducerTask::new(
            source,
            Arc::clone(&self.channel),
            Arc::clone(&self.enqueued),
            self.cancel.clone(),
            Arc::clone(&self.log),
        )
        .verbose(self.options.verbose);

        // Consumer first so it is already polling when the first item lands.
        pool.spawn("transfer-consumer", move || {
            consumer.run();
        })?;

        let producer_done = Arc::clone(&self.producer_done);
        let log = Arc::clone(&self.log);
        let spawned = pool.spawn("transfer-producer", move || {
            let outcome = producer.run();
            producer_done.store(true, Ordering::SeqCst);
            match outcome {
                ProducerOutcome::Completed { enqueued } => {
                    log.info(&format!("Producer done. Total enqueued: {enqueued}"));
                }
                ProducerOutcome::Interrupted { at, enqueued } => {
                    log.info(&format!(
                        "Producer done early at item {at}. Total enqueued: {enqueued}"
                    ));
                }
            }
        });
        if let Err(err) = spawned {
            self.producer_done.store(true, Ordering::SeqCst);
            self.request_cancel();
            return Err(err);
        }

        self.log.info("Transfer started.");
        Ok(())
    }

    /// Request cancellation of both tasks. Only the first call has any effect.
    pub fn stop_transfer(&self) {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        self.log.info("Stopping transfer.");
        self.request_cancel();
    }

    fn request_cancel(&self) {
        self.cancel.cancel();
        self.channel.interrupt_waiters();
    }

    /// Block until both tasks return or `timeout` elapses.
    ///
    /// Returns `true` if both finished cleanly in time. On timeout the tasks
    /// are cancelled before returning `false`.
    pub fn wait_for_completion(&self, timeout: Duration) -> bool {
        let Some(pool) = self.pool.get() else {
            return true;
        };
        let finished = pool.await_termination(timeout);
        if !finished {
            self.log
                .warn("Workers did not finish cleanly in time. Forcing shutdown.");
            self.request_cancel();
        }
        finished
    }

    /// Occupancy, counters and the producer-done flag, read without locking them together.
    pub fn queue_status(&self) -> QueueStatus {
        QueueStatus {
            channel: self.channel.status(),
            enqueued: self.enqueued_count(),
            consumed: self.consumed_count(),
            producer_done: self.is_producer_done(),
        }
    }

    /// Items produced but not yet consumed.
    pub fn in_flight_count(&self) -> usize {
        self.channel.len()
    }

    /// Successful puts so far.
    pub fn enqueued_count(&self) -> usize {
        self.enqueued.load(Ordering::SeqCst)
    }

    /// Length of the destination, zero before the transfer starts.
    pub fn consumed_count(&self) -> usize {
        self.destination.get().map_or(0, |destination| destination.len())
    }

    /// Whether the producer has returned, normally or early.
    pub fn is_producer_done(&self) -> bool {
        self.producer_done.load(Ordering::SeqCst)
    }

    /// Whether `start_transfer` has been accepted.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Whether `stop_transfer` has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Workers that have been launched and have not returned yet.
    pub fn workers_running(&self) -> usize {
        self.pool.get().map_or(0, WorkerPool::running)
    }

    /// Capacity of the owned channel.
    pub fn capacity(&self) -> usize {
        self.channel.capacity()
    }
}

impl Drop for TransferCoordinator {
    fn drop(&mut self) {
        self.request_cancel();
    }
}
