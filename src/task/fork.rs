//! Fork-join accounting.

use crate::error::{Error, Result};
use std::sync::{Arc, Condvar, Mutex};

/// Count of outstanding units of work under one fork-join root.
///
/// Waiters block until the count reaches zero.
#[derive(Debug)]
pub struct ForkCounter {
    pending: Mutex<usize>,
    done: Condvar,
}

impl ForkCounter {
    pub fn new(pending: usize) -> Self {
        ForkCounter { pending: Mutex::new(pending), done: Condvar::new() }
    }

    /// Claim one more unit.
    pub fn increase(&self) -> Result<()> {
        *self.pending.lock().map_err(|_| Error::Poisoned("fork counter"))? += 1;
        Ok(())
    }

    /// Release one unit, waking waiters when none are left.
    pub fn decrease(&self) -> Result<()> {
        let mut pending = self.pending.lock().map_err(|_| Error::Poisoned("fork counter"))?;
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.done.notify_all();
        }
        Ok(())
    }

    /// Block until every unit has been released.
    pub fn wait(&self) -> Result<()> {
        let pending = self.pending.lock().map_err(|_| Error::Poisoned("fork counter"))?;
        let _pending = self.done.wait_while(pending, |n| *n > 0).map_err(|_| Error::Poisoned("fork counter"))?;
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().map_or(0, |n| *n)
    }
}

/// Releases one unit of a counter when dropped, including during unwinding
/// and when the job owning it is dropped without running.
#[derive(Debug)]
pub struct ForkCompletion {
    counter: Option<Arc<ForkCounter>>,
}

impl ForkCompletion {
    pub fn new(counter: Option<Arc<ForkCounter>>) -> Self {
        ForkCompletion { counter }
    }
}

impl Drop for ForkCompletion {
    fn drop(&mut self) {
        if let Some(counter) = self.counter.take() {
            if let Err(err) = counter.decrease() {
                tracing::error!(error = %err, "failed to release fork unit");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_returns_once_all_units_are_released() {
        let counter = Arc::new(ForkCounter::new(1));
        counter.increase().unwrap();
        assert_eq!(counter.pending(), 2);

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5 * (i + 1)));
                    counter.decrease().unwrap();
                })
            })
            .collect();
        counter.wait().unwrap();
        assert_eq!(counter.pending(), 0);
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn decrease_saturates_at_zero() {
        let counter = ForkCounter::new(0);
        counter.decrease().unwrap();
        assert_eq!(counter.pending(), 0);
        counter.wait().unwrap();
    }

    #[test]
    fn completion_releases_on_panic() {
        let counter = Arc::new(ForkCounter::new(1));
        let done = ForkCompletion::new(Some(Arc::clone(&counter)));
        let result = thread::spawn(move || {
            let _done = done;
            panic!("body failed");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(counter.pending(), 0);
    }
}
