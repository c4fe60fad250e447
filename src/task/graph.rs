//! Recording of scheduling decisions.
//!
//! The scheduler reports every instruction it runs serially or hands to the
//! pool. Recorders are called from arbitrary threads and must synchronize
//! internally.

use super::context::{BranchContext, Instruction};
use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};
use std::thread::ThreadId;

/// Sink for scheduling decisions. Calls are fire-and-forget.
pub trait TaskRecorder: Send + Sync {
    fn record_serial(&self, instruction: &Instruction, ctx: &BranchContext);

    /// `instruction` is `None` for the root of a fork-join operation.
    fn record_parallel(&self, instruction: Option<&Instruction>, ctx: &BranchContext);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl TaskRecorder for NullRecorder {
    fn record_serial(&self, _instruction: &Instruction, _ctx: &BranchContext) {}

    fn record_parallel(&self, _instruction: Option<&Instruction>, _ctx: &BranchContext) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Serial,
    Parallel,
}

/// One recorded decision.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub kind: TaskKind,
    /// Instruction name; `None` for a fork-join root.
    pub instruction: Option<String>,
    pub branch: u64,
    pub parent: Option<u64>,
    /// Thread that made the decision.
    pub thread: ThreadId,
    pub recorded_at: DateTime<Utc>,
}

/// In-memory event log.
#[derive(Debug, Default)]
pub struct TaskGraph {
    events: Mutex<Vec<TaskEvent>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far, in recording order.
    pub fn events(&self) -> Vec<TaskEvent> {
        self.lock().clone()
    }

    pub fn serial_count(&self) -> usize {
        self.count(TaskKind::Serial)
    }

    pub fn parallel_count(&self) -> usize {
        self.count(TaskKind::Parallel)
    }

    fn count(&self, kind: TaskKind) -> usize {
        self.lock().iter().filter(|e| e.kind == kind).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TaskEvent>> {
        // Events are only ever appended, so a poisoned log is still consistent.
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, kind: TaskKind, instruction: Option<&Instruction>, ctx: &BranchContext) {
        let event = TaskEvent {
            kind,
            instruction: instruction.map(|i| i.name.clone()),
            branch: ctx.id,
            parent: ctx.parent,
            thread: std::thread::current().id(),
            recorded_at: Utc::now(),
        };
        self.lock().push(event);
    }
}

impl TaskRecorder for TaskGraph {
    fn record_serial(&self, instruction: &Instruction, ctx: &BranchContext) {
        self.push(TaskKind::Serial, Some(instruction), ctx);
    }

    fn record_parallel(&self, instruction: Option<&Instruction>, ctx: &BranchContext) {
        self.push(TaskKind::Parallel, instruction, ctx);
    }
}
