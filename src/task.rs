//! Scheduling policy: inline or parallel execution of instruction bodies.
//!
//! Every instruction body passes through [`Scheduler::dispatch`], which looks
//! at the branch's [`TaskMode`] and the instruction's `fork` attribute:
//!
//! ```text
//! mode      fork attr            action
//! ───────   ──────────────────   ─────────────────────────────────────
//! (no pool) any                  inline
//! SINGLE    any                  inline
//! DENY      != "yes"             serial
//! DENY      "yes"                mode := DEFAULT, then as DEFAULT
//! DEFAULT   "no"                 serial
//! DEFAULT   "deny"               mode := DENY, serial
//! DEFAULT   absent, not eligible serial
//! DEFAULT   anything else        parallel
//! ```
//!
//! "serial" is an inline run that is also recorded; "parallel" is a pool
//! submission (which may itself run inline when the pool is saturated).
//!
//! [`Scheduler::run_and_wait`] is the fork-join root: it attaches a fresh
//! [`ForkCounter`] to the context, and every parallel task spawned from
//! contexts carrying that counter claims a unit of it until it completes.
//!
//! ## Invariants
//!
//! - A claimed fork unit is released exactly once, by [`ForkCompletion`]'s
//!   `Drop`, whether the body returns, panics or never runs.
//! - Mode changes are made on the instruction's own context, so they reach the
//!   body and everything derived from it.

#[path = "task/context.rs"]
mod context;
#[path = "task/fork.rs"]
mod fork;
#[path = "task/graph.rs"]
mod graph;

pub use context::{BranchContext, Instruction, InstructionSet, TaskMode};
pub use fork::{ForkCompletion, ForkCounter};
pub use graph::{NullRecorder, TaskEvent, TaskGraph, TaskKind, TaskRecorder};

use crate::error::Result;
use crate::pool::{Placement, ReentrancyGuard, WorkerPool};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Routes instruction bodies to the pool or the current thread.
pub struct Scheduler {
    pool: Option<Arc<WorkerPool>>,
    parallel: InstructionSet,
    recorder: Arc<dyn TaskRecorder>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").field("pool", &self.pool).field("parallel", &self.parallel).finish()
    }
}

impl Scheduler {
    /// Scheduler backed by a new pool of `threads` workers.
    ///
    /// A pool that cannot be built (including `threads == 0`) leaves the
    /// scheduler without one: every body then runs inline.
    pub fn new(threads: usize, parallel: InstructionSet, recorder: Arc<dyn TaskRecorder>) -> Self {
        let pool = match WorkerPool::new(threads) {
            Ok(pool) => Some(Arc::new(pool)),
            Err(err) => {
                warn!(threads, error = %err, "running without a worker pool");
                None
            }
        };
        Scheduler { pool, parallel, recorder }
    }

    pub fn pool(&self) -> Option<&WorkerPool> {
        self.pool.as_deref()
    }

    pub fn parallel(&self) -> InstructionSet {
        self.parallel
    }

    /// Run `body` for `instruction`, inline or on the pool.
    ///
    /// `ctx` is the context the instruction executes in; `body` receives a
    /// child of it.
    pub fn dispatch<F>(&self, instruction: &Instruction, ctx: &mut BranchContext, body: F) -> Result<Placement>
    where
        F: FnOnce(BranchContext) + Send + 'static,
    {
        let Some(pool) = &self.pool else {
            body(ctx.child());
            return Ok(Placement::Inline);
        };
        let fork = instruction.fork.as_deref();

        match ctx.mode {
            TaskMode::Single => {
                trace!(instruction = %instruction.name, "single task mode");
                body(ctx.child());
                return Ok(Placement::Inline);
            }
            TaskMode::Deny if fork != Some("yes") => {
                trace!(instruction = %instruction.name, "deny task mode");
                return Ok(self.run_serial(instruction, ctx, body));
            }
            TaskMode::Deny => {
                debug!(instruction = %instruction.name, branch = ctx.id, "switching to default task mode");
                ctx.mode = TaskMode::Default;
            }
            TaskMode::Default => match fork {
                Some("no") => return Ok(self.run_serial(instruction, ctx, body)),
                Some("deny") => {
                    debug!(instruction = %instruction.name, branch = ctx.id, "switching to deny task mode");
                    ctx.mode = TaskMode::Deny;
                    return Ok(self.run_serial(instruction, ctx, body));
                }
                None if !self.parallel.intersects(instruction.kind) => {
                    return Ok(self.run_serial(instruction, ctx, body));
                }
                _ => {}
            },
        }

        let child = ctx.child();
        if let Some(counter) = &child.fork {
            counter.increase()?;
        }
        let done = ForkCompletion::new(child.fork.clone());
        self.recorder.record_parallel(Some(instruction), &child);
        trace!(instruction = %instruction.name, branch = child.id, "running in new task");
        pool.start(Box::new(move || {
            let _done = done;
            body(child);
        }))
    }

    fn run_serial<F>(&self, instruction: &Instruction, ctx: &BranchContext, body: F) -> Placement
    where
        F: FnOnce(BranchContext),
    {
        let child = ctx.child();
        self.recorder.record_serial(instruction, &child);
        body(child);
        Placement::Inline
    }

    /// Run `body` as a fork-join root and return once it and every task
    /// spawned under it have finished.
    ///
    /// Falls back to an inline run when there is no pool or the pool cannot
    /// reserve capacity for another blocking root.
    pub fn run_and_wait<F>(&self, ctx: &mut BranchContext, body: F) -> Result<()>
    where
        F: FnOnce(BranchContext) + Send + 'static,
    {
        let Some(pool) = &self.pool else {
            body(ctx.child());
            return Ok(());
        };
        let Some(permit) = pool.try_reserve() else {
            debug!(branch = ctx.id, "no capacity for another fork-join root, running inline");
            body(ctx.child());
            return Ok(());
        };

        let counter = Arc::new(ForkCounter::new(1));
        let previous = ctx.fork.replace(Arc::clone(&counter));
        let child = ctx.child();
        let done = ForkCompletion::new(Some(Arc::clone(&counter)));
        self.recorder.record_parallel(None, &child);

        let result = pool
            .start(Box::new(move || {
                let _done = done;
                body(child);
            }))
            .and_then(|_| counter.wait());

        ctx.fork = previous;
        drop(permit);
        result
    }

    /// Run `body` with pool submissions from this thread forced inline.
    ///
    /// Use it around code that already holds a lock or other resource a pool
    /// job could need, such as an output sink shared with the forked bodies:
    /// anything `body` dispatches then runs on this thread instead of waiting
    /// on a worker that may block on the same resource.
    pub fn run_locked<R>(&self, body: impl FnOnce() -> R) -> R {
        let _guard = ReentrancyGuard::engage();
        body()
    }
}
