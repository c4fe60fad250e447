use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    /// Whether the current thread holds a [`ReentrancyGuard`].
    static ENGAGED: Cell<bool> = const { Cell::new(false) };
}

/// Per-thread flag that makes pool submissions from this thread run inline.
///
/// Engaging is exclusive per thread: a second `engage` on the same thread
/// returns `None` until the first guard is dropped. The guard is tied to the
/// thread that created it and cannot be sent elsewhere.
#[must_use]
#[derive(Debug)]
pub struct ReentrancyGuard {
    _thread: PhantomData<*const ()>,
}

impl ReentrancyGuard {
    pub fn engage() -> Option<Self> {
        if Self::is_engaged() {
            return None;
        }
        ENGAGED.with(|engaged| engaged.set(true));
        Some(ReentrancyGuard { _thread: PhantomData })
    }

    pub fn is_engaged() -> bool {
        ENGAGED.with(Cell::get)
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        ENGAGED.with(|engaged| engaged.set(false));
    }
}
