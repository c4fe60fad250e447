//! A worker's single-job holding cell.

use super::Job;
use crate::error::{Error, Result};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::ThreadId;

struct SlotState {
    /// Submitting thread; `Some` while the slot is claimed.
    occupant: Option<ThreadId>,
    job: Option<Job>,
    shutdown: bool,
}

/// Allocated once per worker and reused for the pool's lifetime.
pub(super) struct Slot {
    state: Mutex<SlotState>,
    signal: Condvar,
}

impl Slot {
    pub(super) fn new() -> Self {
        Slot { state: Mutex::new(SlotState { occupant: None, job: None, shutdown: false }), signal: Condvar::new() }
    }

    /// Place `job` in the slot if it is free and open, otherwise hand it back.
    ///
    /// Callers must hold the pool's claim lock.
    pub(super) fn try_fill(&self, submitter: ThreadId, job: Job) -> Result<std::result::Result<(), Job>> {
        let mut state = self.state.lock().map_err(|_| Error::Poisoned("worker slot"))?;
        if state.occupant.is_some() || state.shutdown {
            return Ok(Err(job));
        }
        state.occupant = Some(submitter);
        state.job = Some(job);
        self.signal.notify_one();
        Ok(Ok(()))
    }

    /// Block until a job arrives. `None` once the slot is closed and drained.
    pub(super) fn next_job(&self) -> Option<(ThreadId, Job)> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self
            .signal
            .wait_while(state, |s| s.job.is_none() && !s.shutdown)
            .unwrap_or_else(PoisonError::into_inner);
        let job = state.job.take()?;
        Some((state.occupant.unwrap_or_else(|| std::thread::current().id()), job))
    }

    /// Mark the slot free again. Callers must hold the pool's claim lock.
    pub(super) fn release(&self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).occupant = None;
    }

    /// Refuse new jobs and wake the worker so it can exit.
    pub(super) fn close(&self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).shutdown = true;
        self.signal.notify_one();
    }
}
