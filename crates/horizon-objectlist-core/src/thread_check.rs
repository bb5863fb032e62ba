//! Owner-thread tracking for Horizon ObjectList.
//!
//! The projection engine runs on a single logical owner thread (the UI thread
//! of the host control). Shared state such as the backing collection and the
//! identity map is protected by that discipline rather than by locks, so every
//! public mutation entry point checks where it is being called from.
//!
//! ```
//! use horizon_objectlist_core::thread_check::ThreadAffinity;
//!
//! struct Engine {
//!     affinity: ThreadAffinity,
//!     value: std::cell::Cell<i32>,
//! }
//!
//! impl Engine {
//!     fn set_value(&self, v: i32) {
//!         if self.affinity.is_same_thread() {
//!             self.value.set(v);
//!         }
//!     }
//! }
//! ```

use std::thread::ThreadId;

/// Thread affinity tracker.
///
/// Records the thread on which an object was created and answers whether
/// subsequent operations happen on that same thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAffinity {
    thread_id: ThreadId,
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}

impl ThreadAffinity {
    /// Create a new thread affinity tracker for the current thread.
    #[inline]
    pub fn current() -> Self {
        Self {
            thread_id: std::thread::current().id(),
        }
    }

    /// Get the thread ID this affinity is bound to.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Check if the current thread matches this affinity.
    #[inline]
    pub fn is_same_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Rebind the affinity to the calling thread.
    ///
    /// Used when ownership of an engine is handed over to another thread
    /// before any work has been done on it.
    pub fn rebind(&mut self) {
        self.thread_id = std::thread::current().id();
    }

    /// Assert that we are on the owner thread, with a custom message.
    ///
    /// # Panics
    ///
    /// Panics if called from a different thread.
    pub fn assert_same_thread_with_msg(&self, msg: &str) {
        if !self.is_same_thread() {
            self.panic_wrong_thread(msg);
        }
    }

    #[cold]
    #[inline(never)]
    fn panic_wrong_thread(&self, msg: &str) -> ! {
        let current = std::thread::current();
        let current_name = current.name().unwrap_or("<unnamed>");
        let current_id = current.id();

        panic!(
            "THREAD AFFINITY VIOLATION: {msg}\n\
             Owner thread: {:?}\n\
             Current thread: \"{current_name}\" (ID: {current_id:?})",
            self.thread_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_thread_affinity_same_thread() {
        let affinity = ThreadAffinity::current();
        assert!(affinity.is_same_thread());
        affinity.assert_same_thread_with_msg("same thread");
    }

    #[test]
    fn test_thread_affinity_different_thread() {
        let affinity = ThreadAffinity::current();

        let result = Arc::new(AtomicBool::new(false));
        let result_clone = result.clone();

        std::thread::spawn(move || {
            result_clone.store(!affinity.is_same_thread(), Ordering::SeqCst);
        })
        .join()
        .unwrap();

        assert!(result.load(Ordering::SeqCst));
    }

    #[test]
    fn test_thread_affinity_panic_on_wrong_thread() {
        let affinity = ThreadAffinity::current();

        let result = std::thread::spawn(move || {
            affinity.assert_same_thread_with_msg("drained off the owner thread");
        })
        .join();

        assert!(result.is_err(), "expected affinity violation panic");
    }

    #[test]
    fn test_thread_affinity_rebind() {
        let affinity = ThreadAffinity::current();

        let rebound = std::thread::spawn(move || {
            let mut affinity = affinity;
            affinity.rebind();
            affinity.is_same_thread()
        })
        .join()
        .unwrap();

        assert!(rebound);
    }
}
