//! Owner-thread work queue.
//!
//! Work posted from any thread is queued here and executed by the owner
//! thread when it drains the queue. This is how calls made off the owner
//! thread are marshalled onto it: the poster continues immediately unless it
//! asked for a [`CompletionWaiter`].
//!
//! ```
//! use horizon_objectlist_core::queue::owner_queue;
//!
//! let (poster, queue) = owner_queue::<u32>();
//! let remote = poster.clone();
//! std::thread::spawn(move || {
//!     remote.post(7).unwrap();
//! })
//! .join()
//! .unwrap();
//!
//! let mut seen = Vec::new();
//! queue.process_all(|n| seen.push(n));
//! assert_eq!(seen, vec![7]);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::invocation::{CompletionHandle, CompletionWaiter, completion_pair};
use crate::thread_check::ThreadAffinity;

/// A unique identifier for a posted work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Get the raw u64 value of this task ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Error returned when the owner side of a queue has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

impl fmt::Display for QueueClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "the owner queue has been closed")
    }
}

impl std::error::Error for QueueClosed {}

/// Internal queued item.
struct Posted<T> {
    id: TaskId,
    payload: T,
    completion: Option<CompletionHandle>,
}

/// Sending half of an owner queue. Cheap to clone and `Send` when `T` is.
pub struct QueuePoster<T> {
    sender: Sender<Posted<T>>,
    next_id: Arc<AtomicU64>,
}

impl<T> Clone for QueuePoster<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<T> fmt::Debug for QueuePoster<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuePoster")
            .field("pending", &self.sender.len())
            .finish()
    }
}

impl<T> QueuePoster<T> {
    fn next_task_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Post a work item and continue without waiting.
    pub fn post(&self, payload: T) -> Result<TaskId, QueueClosed> {
        let id = self.next_task_id();
        self.sender
            .send(Posted {
                id,
                payload,
                completion: None,
            })
            .map_err(|_| QueueClosed)?;
        tracing::trace!(target: "horizon_objectlist_core::queue", task = id.as_u64(), "posted");
        Ok(id)
    }

    /// Post a work item and return a waiter that is released once the owner
    /// has processed (or discarded) it.
    pub fn post_with_completion(&self, payload: T) -> Result<CompletionWaiter, QueueClosed> {
        let id = self.next_task_id();
        let (handle, waiter) = completion_pair();
        self.sender
            .send(Posted {
                id,
                payload,
                completion: Some(handle),
            })
            .map_err(|_| QueueClosed)?;
        tracing::trace!(target: "horizon_objectlist_core::queue", task = id.as_u64(), "posted with completion");
        Ok(waiter)
    }
}

/// Receiving half of an owner queue, bound to the thread that created it.
pub struct OwnerQueue<T> {
    receiver: Receiver<Posted<T>>,
    poster: QueuePoster<T>,
    affinity: ThreadAffinity,
    batch_size: usize,
}

impl<T> fmt::Debug for OwnerQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerQueue")
            .field("pending", &self.receiver.len())
            .field("affinity", &self.affinity)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

/// Create a new owner queue bound to the calling thread.
pub fn owner_queue<T>() -> (QueuePoster<T>, OwnerQueue<T>) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    let poster = QueuePoster {
        sender,
        next_id: Arc::new(AtomicU64::new(1)),
    };
    let queue = OwnerQueue {
        receiver,
        poster: poster.clone(),
        affinity: ThreadAffinity::current(),
        batch_size: 64,
    };
    (poster, queue)
}

impl<T> OwnerQueue<T> {
    /// Another poster for this queue.
    pub fn poster(&self) -> QueuePoster<T> {
        self.poster.clone()
    }

    /// The owner thread this queue drains on.
    pub fn affinity(&self) -> ThreadAffinity {
        self.affinity
    }

    /// Rebind the queue to the calling thread.
    pub fn rebind(&mut self) {
        self.affinity.rebind();
    }

    /// Check if there are any pending items.
    pub fn has_pending(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Get the number of pending items.
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Set the maximum number of items handled by [`process_batch`](Self::process_batch).
    pub fn set_batch_size(&mut self, size: usize) {
        self.batch_size = size.max(1);
    }

    fn next(&self) -> Option<Posted<T>> {
        match self.receiver.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn run<F: FnMut(T)>(item: Posted<T>, handler: &mut F) {
        let Posted {
            id,
            payload,
            completion,
        } = item;
        tracing::trace!(target: "horizon_objectlist_core::queue", task = id.as_u64(), "processing");
        handler(payload);
        if let Some(completion) = completion {
            completion.signal_done();
        }
    }

    /// Process up to the batch size of pending items in submission order.
    ///
    /// Returns the number of items processed.
    ///
    /// # Panics
    ///
    /// Panics if called off the owner thread.
    pub fn process_batch<F: FnMut(T)>(&self, mut handler: F) -> usize {
        self.affinity
            .assert_same_thread_with_msg("owner queue drained off its owner thread");
        let mut count = 0;
        while count < self.batch_size {
            let Some(item) = self.next() else { break };
            Self::run(item, &mut handler);
            count += 1;
        }
        count
    }

    /// Process all pending items in submission order, including items posted
    /// by the handler itself.
    ///
    /// # Panics
    ///
    /// Panics if called off the owner thread.
    pub fn process_all<F: FnMut(T)>(&self, mut handler: F) -> usize {
        self.affinity
            .assert_same_thread_with_msg("owner queue drained off its owner thread");
        let mut count = 0;
        while let Some(item) = self.next() {
            Self::run(item, &mut handler);
            count += 1;
        }
        count
    }
}

static_assertions::assert_impl_all!(QueuePoster<u32>: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_post_and_process_in_order() {
        let (poster, queue) = owner_queue::<&'static str>();
        poster.post("a").unwrap();
        poster.post("b").unwrap();
        poster.post("c").unwrap();
        assert_eq!(queue.pending_count(), 3);

        let mut seen = Vec::new();
        assert_eq!(queue.process_all(|s| seen.push(s)), 3);
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert!(!queue.has_pending());
    }

    #[test]
    fn test_task_ids_increase() {
        let (poster, _queue) = owner_queue::<()>();
        let first = poster.post(()).unwrap();
        let second = poster.clone().post(()).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_process_batch_limits() {
        let (poster, mut queue) = owner_queue::<u8>();
        queue.set_batch_size(2);
        for n in 0..5 {
            poster.post(n).unwrap();
        }

        let mut seen = Vec::new();
        assert_eq!(queue.process_batch(|n| seen.push(n)), 2);
        assert_eq!(seen, vec![0, 1]);
        assert_eq!(queue.pending_count(), 3);
    }

    #[test]
    fn test_post_with_completion_from_other_thread() {
        let (poster, queue) = owner_queue::<u32>();

        let worker = std::thread::spawn(move || {
            let waiter = poster.post_with_completion(9).unwrap();
            waiter.wait_timeout(Duration::from_secs(5))
        });

        let mut total = 0;
        while total == 0 {
            queue.process_all(|n| total += n);
            std::thread::yield_now();
        }

        assert!(worker.join().unwrap());
        assert_eq!(total, 9);
    }

    #[test]
    fn test_post_after_owner_dropped() {
        let (poster, queue) = owner_queue::<u32>();
        drop(queue);
        assert_eq!(poster.post(1), Err(QueueClosed));
    }

    #[test]
    fn test_drain_off_owner_thread_panics() {
        let (poster, queue) = owner_queue::<u32>();
        poster.post(1).unwrap();

        let result = std::thread::spawn(move || {
            queue.process_all(|_| {});
        })
        .join();

        assert!(result.is_err());
    }
}
