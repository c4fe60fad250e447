//! Crate-wide error type.
//!
//! Only setup-time failures and broken synchronization primitives are errors
//! here. A lookup that finds no rule is a normal `None`, and a saturated pool
//! runs work inline instead of failing.

use std::io;

/// Errors produced while compiling rules, configuring the engine or driving
/// the worker pool.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A match pattern could not be compiled.
    #[error("pattern `{text}` failed to compile: {reason}")]
    Compile { text: String, reason: String },

    /// A rule was registered with neither a `name` nor a `match` pattern.
    #[error("rule has neither a name nor a match pattern")]
    AnonymousRule,

    /// The worker pool was asked for zero threads.
    #[error("worker pool needs at least one thread")]
    NoWorkers,

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },

    /// A mutex or condition variable was poisoned by a panicking holder.
    ///
    /// The owning structure is in an undefined state; callers must not retry.
    #[error("synchronization primitive poisoned: {0}")]
    Poisoned(&'static str),

    /// A configuration value could not be parsed.
    #[error("invalid value `{value}` for {key}")]
    Config { key: &'static str, value: String },
}

impl Error {
    pub(crate) fn compile(text: &str, reason: impl Into<String>) -> Self {
        Error::Compile { text: text.to_string(), reason: reason.into() }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
