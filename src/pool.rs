//! Fixed-size worker pool with one reusable slot per worker.
//!
//! There is no shared queue. A submission either lands in a free slot or runs
//! synchronously on the submitting thread, so `start` never blocks on capacity.
//!
//! ```text
//!             start(job)
//!                 │
//!     guard engaged? ── yes ──▶ run inline
//!                 │ no
//!     claim lock: scan slots ── none free ──▶ run inline
//!                 │ slot i free
//!     slot i: occupant = caller, job = Some(job), notify
//!                 │
//!     worker i wakes, runs job, frees slot i, notifies `idle`
//! ```
//!
//! ## Locks
//!
//! - `claim` (busy count) is taken before any slot lock, by submitters and by
//!   workers releasing their slot. No slot lock is ever held while taking
//!   `claim`.
//! - `gate` only counts outstanding [`WaitPermit`]s and is never held together
//!   with another lock.
//!
//! ## Capacity gate
//!
//! Fork-join roots block a thread until their subtree completes. At most
//! `threads - 1` of them may hold a permit at once, so at least one worker is
//! always left to run the work they wait on.

#[path = "pool/guard.rs"]
mod guard;
#[path = "pool/slot.rs"]
mod slot;

pub use guard::ReentrancyGuard;

use crate::error::{Error, Result};
use slot::Slot;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// A unit of work submitted to the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where a submitted job ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Handed to the worker owning this slot.
    Worker(usize),
    /// Ran to completion on the submitting thread.
    Inline,
}

struct Shared {
    slots: Vec<Slot>,
    claim: Mutex<usize>,
    idle: Condvar,
    gate: Mutex<usize>,
}

/// Fixed set of long-lived worker threads.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("threads", &self.threads()).finish()
    }
}

impl WorkerPool {
    /// Spawn `threads` workers.
    ///
    /// Fails with [`Error::NoWorkers`] for zero threads. If any worker cannot
    /// be spawned the ones already running are shut down and joined before the
    /// error is returned.
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::NoWorkers);
        }

        let shared = Arc::new(Shared {
            slots: (0..threads).map(|_| Slot::new()).collect(),
            claim: Mutex::new(0),
            idle: Condvar::new(),
            gate: Mutex::new(0),
        });
        let pool = WorkerPool { shared, workers: Mutex::new(Vec::with_capacity(threads)) };

        for index in 0..threads {
            let shared = Arc::clone(&pool.shared);
            let spawned = thread::Builder::new()
                .name(format!("templar-worker-{index}"))
                .spawn(move || worker_loop(&shared, index));
            match spawned {
                Ok(handle) => pool.workers.lock().map_err(|_| Error::Poisoned("pool workers"))?.push(handle),
                Err(source) => {
                    warn!(index, error = %source, "failed to spawn worker, tearing down pool");
                    pool.shutdown();
                    return Err(Error::Spawn { index, source });
                }
            }
        }

        debug!(threads, "worker pool started");
        Ok(pool)
    }

    pub fn threads(&self) -> usize {
        self.shared.slots.len()
    }

    /// Number of slots currently holding a job.
    pub fn busy(&self) -> usize {
        *self.shared.claim.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit `job`, or run it inline when no slot is free.
    ///
    /// Inline execution also happens when the calling thread holds a
    /// [`ReentrancyGuard`] or the pool has been shut down.
    pub fn start(&self, job: Job) -> Result<Placement> {
        if ReentrancyGuard::is_engaged() {
            trace!("reentrant submission, running inline");
            job();
            return Ok(Placement::Inline);
        }

        let submitter = thread::current().id();
        let claimed = {
            let mut busy = self.shared.claim.lock().map_err(|_| Error::Poisoned("pool claim"))?;
            let mut job = Some(job);
            let mut claimed = None;
            for (index, slot) in self.shared.slots.iter().enumerate() {
                if let Some(pending) = job.take() {
                    match slot.try_fill(submitter, pending)? {
                        Ok(()) => {
                            *busy += 1;
                            claimed = Some(index);
                            break;
                        }
                        Err(returned) => job = Some(returned),
                    }
                }
            }
            match claimed {
                Some(index) => Ok(index),
                None => Err(job),
            }
        };

        match claimed {
            Ok(index) => {
                trace!(worker = index, "job handed to worker");
                Ok(Placement::Worker(index))
            }
            Err(job) => {
                trace!("pool saturated, running inline");
                if let Some(job) = job {
                    job();
                }
                Ok(Placement::Inline)
            }
        }
    }

    /// Reserve capacity for a blocking fork-join root.
    ///
    /// Returns `None` when `threads - 1` permits are already out.
    pub fn try_reserve(&self) -> Option<WaitPermit> {
        let mut outstanding = self.shared.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if *outstanding + 1 >= self.threads() {
            return None;
        }
        *outstanding += 1;
        Some(WaitPermit { shared: Arc::clone(&self.shared) })
    }

    /// Block until every slot is free.
    pub fn wait_idle(&self) -> Result<()> {
        let busy = self.shared.claim.lock().map_err(|_| Error::Poisoned("pool claim"))?;
        let _busy = self.shared.idle.wait_while(busy, |busy| *busy > 0).map_err(|_| Error::Poisoned("pool claim"))?;
        Ok(())
    }

    /// Stop and join every worker. Jobs already in a slot still run.
    ///
    /// Idempotent. When called from one of the pool's own workers, that worker
    /// is not joined; it exits once its current job returns.
    pub fn shutdown(&self) {
        for slot in &self.shared.slots {
            slot.close();
        }

        let handles = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        if handles.is_empty() {
            return;
        }
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("worker exited with a panic");
            }
        }
        debug!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A reserved fork-join root. Dropping it releases the reservation.
#[must_use]
pub struct WaitPermit {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for WaitPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WaitPermit")
    }
}

impl Drop for WaitPermit {
    fn drop(&mut self) {
        let mut outstanding = self.shared.gate.lock().unwrap_or_else(PoisonError::into_inner);
        *outstanding = outstanding.saturating_sub(1);
    }
}

fn worker_loop(shared: &Shared, index: usize) {
    let slot = &shared.slots[index];
    while let Some((submitter, job)) = slot.next_job() {
        trace!(worker = index, ?submitter, "running job");
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)).is_err() {
            tracing::error!(worker = index, "job panicked");
        }

        let mut busy = shared.claim.lock().unwrap_or_else(PoisonError::into_inner);
        slot.release();
        *busy = busy.saturating_sub(1);
        if *busy == 0 {
            shared.idle.notify_all();
        }
    }
    trace!(worker = index, "worker exiting");
}
