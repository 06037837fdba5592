//! Fixed-capacity FIFO channel with blocking, timed and cancellable operations.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::error::{Result, TransferError};

/// A synchronized, bounded FIFO buffer shared by one producer and one consumer.
pub struct BoundedChannel<T> {
    capacity: usize,
    queue: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

/// Point-in-time occupancy of a channel. Only built by [`BoundedChannel::status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelStatus {
    len: usize,
    capacity: usize,
}

impl ChannelStatus {
    /// Items buffered when the snapshot was taken.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Capacity of the channel the snapshot came from.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupancy as a whole percentage, rounded down.
    pub fn percent_full(&self) -> usize {
        (self.len as u128 * 100)
            .checked_div(self.capacity as u128)
            .map_or(0, |percent| percent as usize)
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queue[{}/{} ({}% full)]",
            self.len,
            self.capacity,
            self.percent_full()
        )
    }
}

impl<T> BoundedChannel<T> {
    /// Create an empty channel; a zero capacity is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(TransferError::InvalidArgument(
                "capacity must be > 0".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            // Grows on demand; `capacity` may be far larger than memory allows.
            queue: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })
    }

    // The guarded deque is never left half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until there is room, then append `item` at the tail.
    ///
    /// Fails with [`TransferError::Interrupted`] if `cancel` fires before the
    /// item is stored; the item is dropped, never inserted.
    pub fn put(&self, item: T, cancel: &CancelToken) -> Result<()> {
        let mut guard = self.lock();
        loop {
            if cancel.is_cancelled() {
                return Err(TransferError::Interrupted);
            }
            if guard.len() < self.capacity {
                guard.push_back(item);
                self.not_empty.notify_one();
                return Ok(());
            }
            // Wait releases the lock and re-acquires it before returning.
            guard = self
                .not_full
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until an item is available, then remove and return the head.
    pub fn take(&self, cancel: &CancelToken) -> Result<T> {
        let mut guard = self.lock();
        loop {
            if cancel.is_cancelled() {
                return Err(TransferError::Interrupted);
            }
            if let Some(item) = guard.pop_front() {
                self.not_full.notify_one();
                return Ok(item);
            }
            guard = self
                .not_empty
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`take`](Self::take), but gives up with `Ok(None)` once `timeout` elapses.
    pub fn try_take(&self, timeout: Duration, cancel: &CancelToken) -> Result<Option<T>> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock();
        loop {
            if cancel.is_cancelled() {
                return Err(TransferError::Interrupted);
            }
            if let Some(item) = guard.pop_front() {
                self.not_full.notify_one();
                return Ok(Some(item));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // Spurious wakeups and early timeouts both loop back to the deadline check.
            guard = self
                .not_empty
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Wake every blocked caller so it can re-check its cancellation token.
    ///
    /// Taking the lock before notifying closes the window between a waiter's
    /// token check and its wait.
    pub fn interrupt_waiters(&self) {
        let _guard = self.lock();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Current number of buffered items.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is buffered right now.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a `put` would block right now.
    pub fn is_full(&self) -> bool {
        self.lock().len() >= self.capacity
    }

    /// Maximum number of buffered items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the current occupancy.
    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            len: self.len(),
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn zero_capacity_is_rejected() {
        let result = BoundedChannel::<u64>::new(0);
        assert!(matches!(result, Err(TransferError::InvalidArgument(_))));
    }

    #[test]
    fn items_come_out_in_insertion_order() {
        let channel = BoundedChannel::new(4).expect("capacity");
        let cancel = CancelToken::new();
        for id in 0..4u64 {
            channel.put(id, &cancel).expect("put");
        }
        assert!(channel.is_full());
        let drained: Vec<u64> = (0..4)
            .map(|_| channel.take(&cancel).expect("take"))
            .collect();
        assert_eq!(drained, vec![0, 1, 2, 3]);
        assert!(channel.is_empty());
    }

    #[test]
    fn put_blocks_until_take_frees_a_slot() {
        let channel = Arc::new(BoundedChannel::new(1).expect("capacity"));
        let cancel = CancelToken::new();
        channel.put(1u64, &cancel).expect("first put");

        let (done_tx, done_rx) = mpsc::channel();
        let producer = {
            let channel = Arc::clone(&channel);
            let cancel = cancel.clone();
            thread::spawn(move || {
                channel.put(2, &cancel).expect("second put");
                done_tx.send(()).expect("send done");
            })
        };

        // Channel is full, so the second put must still be parked.
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(channel.len(), 1);

        assert_eq!(channel.take(&cancel).expect("take"), 1);
        done_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("second put completes");
        producer.join().expect("producer thread panicked");
        assert_eq!(channel.take(&cancel).expect("take"), 2);
    }

    #[test]
    fn take_wakes_on_put() {
        let channel = Arc::new(BoundedChannel::new(2).expect("capacity"));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (tx, rx) = mpsc::channel();

        let consumer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                let cancel = CancelToken::new();
                ready_tx.send(()).expect("send ready");
                let value = channel.take(&cancel).expect("take");
                tx.send(value).expect("send value");
            })
        };

        ready_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("ready");
        channel.put(99u64, &CancelToken::new()).expect("put");

        let received = rx
            .recv_timeout(Duration::from_secs(1))
            .expect("receive value");
        assert_eq!(received, 99);
        consumer.join().expect("consumer thread panicked");
    }

    #[test]
    fn try_take_times_out_without_error() {
        let channel = BoundedChannel::<u64>::new(3).expect("capacity");
        let start = Instant::now();
        let result = channel
            .try_take(Duration::from_millis(30), &CancelToken::new())
            .expect("timeout is not an error");
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn try_take_returns_available_item_immediately() {
        let channel = BoundedChannel::new(3).expect("capacity");
        let cancel = CancelToken::new();
        channel.put(5u64, &cancel).expect("put");
        let result = channel
            .try_take(Duration::from_secs(5), &cancel)
            .expect("try_take");
        assert_eq!(result, Some(5));
    }

    #[test]
    fn cancelled_put_unblocks_and_does_not_insert() {
        let channel = Arc::new(BoundedChannel::new(1).expect("capacity"));
        let cancel = CancelToken::new();
        channel.put(1u64, &cancel).expect("first put");

        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let producer = {
            let channel = Arc::clone(&channel);
            let cancel = cancel.clone();
            thread::spawn(move || {
                ready_tx.send(()).expect("ready");
                let result = channel.put(2, &cancel);
                done_tx
                    .send(matches!(result, Err(TransferError::Interrupted)))
                    .expect("done");
            })
        };

        ready_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("ready");
        cancel.cancel();
        channel.interrupt_waiters();

        let interrupted = done_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("done recv");
        assert!(interrupted);
        producer.join().expect("producer thread panicked");
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn cancelled_take_unblocks() {
        let channel = Arc::new(BoundedChannel::<u64>::new(2).expect("capacity"));
        let cancel = CancelToken::new();
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let consumer = {
            let channel = Arc::clone(&channel);
            let cancel = cancel.clone();
            thread::spawn(move || {
                ready_tx.send(()).expect("ready");
                let result = channel.take(&cancel);
                done_tx
                    .send(matches!(result, Err(TransferError::Interrupted)))
                    .expect("done");
            })
        };

        ready_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("ready");
        cancel.cancel();
        channel.interrupt_waiters();

        assert!(
            done_rx
                .recv_timeout(Duration::from_secs(1))
                .expect("done recv")
        );
        consumer.join().expect("consumer thread panicked");
    }

    #[test]
    fn cancelled_try_take_fails_before_timeout() {
        let channel = BoundedChannel::<u64>::new(2).expect("capacity");
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = channel.try_take(Duration::from_secs(5), &cancel);
        assert!(matches!(result, Err(TransferError::Interrupted)));
    }

    #[test]
    fn status_reports_percent_full() {
        let channel = BoundedChannel::new(4).expect("capacity");
        let cancel = CancelToken::new();
        channel.put(1u64, &cancel).expect("put");
        let status = channel.status();
        assert_eq!(status.len(), 1);
        assert_eq!(status.capacity(), 4);
        assert_eq!(status.to_string(), "Queue[1/4 (25% full)]");
    }

    #[test]
    fn huge_capacity_builds_without_reserving() {
        let channel = BoundedChannel::new(usize::MAX).expect("capacity");
        let cancel = CancelToken::new();
        channel.put(1u64, &cancel).expect("put");
        assert_eq!(channel.capacity(), usize::MAX);
        assert!(!channel.is_full());
        // Percent must not overflow for a capacity this large.
        assert_eq!(channel.status().percent_full(), 0);
        assert_eq!(channel.take(&cancel).expect("take"), 1);
    }
}
