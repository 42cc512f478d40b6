//! Fixed-size worker thread pool.
//!
//! Workers are named `worker-<id>` and each processes one handle at a time.
//! An offer is admitted only when a worker is idle and not already claimed
//! by an earlier offer, so an admitted handle never waits behind another
//! connection. Everything else is rejected and handed back.

use crate::error::PoolError;
use crate::handoff::{HandOff, Rejected};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

type Handler<H> = Arc<dyn Fn(H) + Send + Sync>;

struct State<H> {
    /// Workers waiting for work that no offer has claimed yet.
    idle: usize,
    /// Admitted handles not yet picked up by a worker.
    pending: VecDeque<H>,
    closed: bool,
}

struct Shared<H> {
    state: Mutex<State<H>>,
    ready: Condvar,
}

impl<H> Shared<H> {
    fn lock(&self) -> MutexGuard<'_, State<H>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }
}

/// A pool of worker threads that each run `handler` on admitted handles.
pub struct WorkerPool<H> {
    shared: Arc<Shared<H>>,
    workers: Vec<JoinHandle<()>>,
}

impl<H: Send + 'static> WorkerPool<H> {
    /// Spawn exactly `threads` workers.
    pub fn start<F>(threads: usize, handler: F) -> Result<Self, PoolError>
    where
        F: Fn(H) + Send + Sync + 'static,
    {
        if threads == 0 {
            return Err(PoolError::NoWorkers);
        }

        let shared = Arc::new(Shared {
            // Every worker starts out idle, before its thread is even scheduled.
            state: Mutex::new(State {
                idle: threads,
                pending: VecDeque::with_capacity(threads),
                closed: false,
            }),
            ready: Condvar::new(),
        });
        let handler: Handler<H> = Arc::new(handler);

        let mut pool = WorkerPool {
            shared,
            workers: Vec::with_capacity(threads),
        };

        for worker_id in 0..threads {
            let shared = Arc::clone(&pool.shared);
            let handler = Arc::clone(&handler);

            let spawned = thread::Builder::new()
                .name(format!("worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, shared, handler));

            match spawned {
                Ok(handle) => pool.workers.push(handle),
                // Dropping the pool stops the workers already running.
                Err(e) => return Err(PoolError::Spawn(worker_id, e)),
            }
        }

        info!(workers = threads, "Worker pool started");
        Ok(pool)
    }
}

impl<H> WorkerPool<H> {
    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Workers currently free to take a new handle.
    pub fn idle_workers(&self) -> usize {
        self.shared.lock().idle
    }

    /// Stop admitting work, let workers finish admitted handles, and join
    /// every worker thread.
    pub fn shutdown(mut self) {
        self.stop();
        info!("Worker pool stopped");
    }

    /// Give up the pool without waiting for its workers.
    ///
    /// Workers keep serving their current connections until the process
    /// exits. Used on the fatal path, where nothing may block termination.
    pub fn abandon(mut self) {
        let detached = self.workers.drain(..).count();
        warn!(workers = detached, "Abandoning worker pool");
    }

    fn stop(&mut self) {
        self.shared.close();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Worker thread exited abnormally");
            }
        }
    }
}

impl<H> HandOff<H> for WorkerPool<H> {
    fn offer(&self, handle: H) -> Result<(), Rejected<H>> {
        // `closed` is only set once the pool is owned exclusively by
        // shutdown or drop, so no offer can observe it.
        let mut state = self.shared.lock();
        if state.idle == 0 {
            return Err(Rejected::new(handle));
        }

        state.idle -= 1;
        state.pending.push_back(handle);
        drop(state);

        self.shared.ready.notify_one();
        Ok(())
    }
}

impl<H> Drop for WorkerPool<H> {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop();
        }
    }
}

fn worker_loop<H>(worker_id: usize, shared: Arc<Shared<H>>, handler: Handler<H>) {
    debug!(worker = worker_id, "Worker started");

    loop {
        let handle = {
            let mut state = shared.lock();
            loop {
                if let Some(handle) = state.pending.pop_front() {
                    break Some(handle);
                }
                if state.closed {
                    state.idle -= 1;
                    break None;
                }
                state = shared
                    .ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let Some(handle) = handle else {
            break;
        };

        // A panicking handler drops the handle while unwinding, which closes it.
        let handler = handler.as_ref();
        if panic::catch_unwind(AssertUnwindSafe(move || handler(handle))).is_err() {
            error!(worker = worker_id, "Connection handler panicked");
        }

        shared.lock().idle += 1;
    }

    debug!(worker = worker_id, "Worker exiting");
}
