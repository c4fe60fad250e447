//! Engine options and their environment overrides.

use crate::error::{Error, Result};
use crate::task::{InstructionSet, TaskMode};
use once_cell::sync::Lazy;
use std::num::NonZeroUsize;

/// Worker count used when nothing else is configured.
static DEFAULT_THREADS: Lazy<usize> =
    Lazy::new(|| std::thread::available_parallelism().map_or(1, NonZeroUsize::get));

pub const THREADS_VAR: &str = "TEMPLAR_THREADS";
pub const PARALLEL_VAR: &str = "TEMPLAR_PARALLEL";
pub const TASK_MODE_VAR: &str = "TEMPLAR_TASK_MODE";

/// Options that affect rule selection and scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Worker threads. `0` disables the pool and runs everything inline.
    pub threads: usize,
    /// Instructions that fork by default when they carry no `fork` attribute.
    pub parallel: InstructionSet,
    /// Mode of the outermost branch.
    pub task_mode: TaskMode,
    /// Template mode used for the document root.
    pub mode: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options { threads: *DEFAULT_THREADS, parallel: InstructionSet::default(), task_mode: TaskMode::Default, mode: None }
    }
}

impl Options {
    /// Defaults overridden by `TEMPLAR_THREADS`, `TEMPLAR_PARALLEL` and
    /// `TEMPLAR_TASK_MODE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = Options::default();
        if let Some(raw) = lookup(THREADS_VAR) {
            options.threads =
                raw.trim().parse().map_err(|_| Error::Config { key: THREADS_VAR, value: raw.clone() })?;
        }
        if let Some(raw) = lookup(PARALLEL_VAR) {
            options.parallel = InstructionSet::parse_list(&raw)?;
        }
        if let Some(raw) = lookup(TASK_MODE_VAR) {
            options.task_mode = raw.parse()?;
        }
        Ok(options)
    }
}
