//! Fixed-size set of named worker threads with a timed "all finished" wait.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Result, TransferError};

#[derive(Default)]
struct LatchState {
    running: usize,
    // Sticky: once a worker panics every later wait reports failure.
    panicked: bool,
}

struct Latch {
    state: Mutex<LatchState>,
    idle: Condvar,
}

impl Latch {
    fn lock(&self) -> MutexGuard<'_, LatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decrements the running count when a worker exits, including by panic.
struct RunningGuard(Arc<Latch>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        if thread::panicking() {
            state.panicked = true;
        }
        state.running -= 1;
        if state.running == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Execution context owning at most `size` worker threads.
pub struct WorkerPool {
    size: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
    latch: Arc<Latch>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            handles: Mutex::new(Vec::with_capacity(size)),
            latch: Arc::new(Latch {
                state: Mutex::new(LatchState::default()),
                idle: Condvar::new(),
            }),
        }
    }

    /// Start `job` on a new thread called `name`.
    pub fn spawn<F>(&self, name: &str, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if handles.len() >= self.size {
            return Err(TransferError::IllegalState(format!(
                "worker pool is limited to {} threads",
                self.size
            )));
        }

        self.latch.lock().running += 1;
        let latch = Arc::clone(&self.latch);
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _running = RunningGuard(latch);
                job();
            });
        match spawned {
            Ok(handle) => {
                handles.push(handle);
                Ok(())
            }
            Err(err) => {
                // The closure never ran, so undo the count by hand.
                let mut state = self.latch.lock();
                state.running -= 1;
                if state.running == 0 {
                    self.latch.idle.notify_all();
                }
                Err(TransferError::Spawn(err))
            }
        }
    }

    /// Number of workers that have not returned yet.
    pub fn running(&self) -> usize {
        self.latch.lock().running
    }

    /// Wait up to `timeout` for every worker to return.
    ///
    /// Returns `true` only if all workers finished in time and none panicked.
    /// Safe to call from several threads; each caller gets the same verdict.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let state = self.latch.lock();
        let (state, _) = self
            .latch
            .idle
            .wait_timeout_while(state, timeout, |state| state.running > 0)
            .unwrap_or_else(PoisonError::into_inner);
        if state.running > 0 {
            return false;
        }
        let panicked = state.panicked;
        drop(state);

        // Reap finished threads; whichever caller drains them, the verdict comes from the latch.
        let handles: Vec<JoinHandle<()>> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let joined_cleanly = handles
            .into_iter()
            .fold(true, |clean, handle| handle.join().is_ok() && clean);
        joined_cleanly && !panicked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn waits_for_all_workers() {
        let pool = WorkerPool::new(2);
        for _ in 0..2 {
            pool.spawn("worker", || thread::sleep(Duration::from_millis(20)))
                .expect("spawn");
        }
        assert!(pool.await_termination(Duration::from_secs(2)));
        assert_eq!(pool.running(), 0);
    }

    #[test]
    fn rejects_workers_beyond_size() {
        let pool = WorkerPool::new(1);
        pool.spawn("first", || {}).expect("spawn");
        let result = pool.spawn("second", || {});
        assert!(matches!(result, Err(TransferError::IllegalState(_))));
        assert!(pool.await_termination(Duration::from_secs(1)));
    }

    #[test]
    fn times_out_while_a_worker_is_blocked() {
        let pool = WorkerPool::new(1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        pool.spawn("blocked", move || {
            let _ = release_rx.recv();
        })
        .expect("spawn");

        assert!(!pool.await_termination(Duration::from_millis(50)));
        assert_eq!(pool.running(), 1);

        release_tx.send(()).expect("release");
        assert!(pool.await_termination(Duration::from_secs(1)));
    }

    #[test]
    fn panicking_worker_is_not_clean() {
        let pool = WorkerPool::new(1);
        pool.spawn("panics", || panic!("worker failure")).expect("spawn");
        assert!(!pool.await_termination(Duration::from_secs(1)));
        assert_eq!(pool.running(), 0);
    }

    #[test]
    fn every_concurrent_waiter_sees_the_panic() {
        let pool = Arc::new(WorkerPool::new(1));
        let (release_tx, release_rx) = mpsc::channel::<()>();
        pool.spawn("panics-later", move || {
            let _ = release_rx.recv();
            panic!("worker failure");
        })
        .expect("spawn");

        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || pool.await_termination(Duration::from_secs(5)))
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        release_tx.send(()).expect("release");

        for waiter in waiters {
            assert!(!waiter.join().expect("waiter thread panicked"));
        }
        // Handles are gone by now, yet the result stays unclean.
        assert!(!pool.await_termination(Duration::from_millis(10)));
    }

    #[test]
    fn worker_threads_carry_their_name() {
        let pool = WorkerPool::new(1);
        let (tx, rx) = mpsc::channel();
        pool.spawn("named-worker", move || {
            let name = thread::current().name().map(str::to_string);
            tx.send(name).expect("send name");
        })
        .expect("spawn");
        let name = rx.recv_timeout(Duration::from_secs(1)).expect("name");
        assert_eq!(name.as_deref(), Some("named-worker"));
        assert!(pool.await_termination(Duration::from_secs(1)));
    }
}
