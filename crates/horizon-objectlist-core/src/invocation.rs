//! Completion handles for marshalled work.
//!
//! When a non-owner thread posts work to the owner thread it normally keeps
//! going without waiting (fire-and-continue). A caller that needs synchronous
//! completion pairs the posted work with a [`CompletionHandle`] and blocks on
//! the matching [`CompletionWaiter`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A handle for signaling completion of a posted work item.
///
/// Dropping the handle without calling [`signal_done`](Self::signal_done)
/// also releases the waiter, so a discarded work item never blocks its
/// poster forever.
#[derive(Debug)]
pub struct CompletionHandle {
    inner: Arc<CompletionState>,
}

impl CompletionHandle {
    /// Signal that the work item is complete.
    pub fn signal_done(self) {
        // Drop does the work.
    }

    fn release(&self) {
        let mut done = self.inner.done.lock();
        *done = true;
        self.inner.condvar.notify_all();
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// A waiter for blocking on completion.
#[derive(Debug)]
pub struct CompletionWaiter {
    inner: Arc<CompletionState>,
}

impl CompletionWaiter {
    /// Wait for the work item to complete.
    ///
    /// # Warning
    ///
    /// Calling this on the owner thread for work that only the owner thread
    /// processes will deadlock.
    pub fn wait(self) {
        let mut done = self.inner.done.lock();
        while !*done {
            self.inner.condvar.wait(&mut done);
        }
    }

    /// Wait for completion with a timeout.
    ///
    /// Returns `true` if the work completed, `false` if the timeout elapsed.
    pub fn wait_timeout(self, timeout: Duration) -> bool {
        let mut done = self.inner.done.lock();
        if *done {
            return true;
        }
        let result = self.inner.condvar.wait_for(&mut done, timeout);
        *done || !result.timed_out()
    }

    /// Returns `true` if the work has already completed.
    pub fn is_done(&self) -> bool {
        *self.inner.done.lock()
    }
}

#[derive(Debug)]
struct CompletionState {
    done: Mutex<bool>,
    condvar: Condvar,
}

/// Create a completion handle/waiter pair.
pub fn completion_pair() -> (CompletionHandle, CompletionWaiter) {
    let state = Arc::new(CompletionState {
        done: Mutex::new(false),
        condvar: Condvar::new(),
    });

    (
        CompletionHandle {
            inner: state.clone(),
        },
        CompletionWaiter { inner: state },
    )
}
