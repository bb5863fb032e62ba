//! Cross-thread marshalling.
//!
//! An [`ObjectList`] belongs to the thread that created it. Work arriving
//! from other threads is posted as a [`Mutation`] into the list's owner
//! queue and applied, in submission order, when the owner calls
//! [`process_pending`](ObjectList::process_pending).
//!
//! There are two ways in:
//!
//! - A [`MutationSender`], obtained with [`ObjectList::sender`], can be
//!   moved to any thread. Its `post*` methods are fire-and-continue; the
//!   `*_and_wait` variants block until the owner has applied the mutation.
//! - Calling a mutation entry point directly on a list that was moved or
//!   shared to another thread (for example behind a mutex) marshals the call
//!   automatically when [`marshal_cross_thread`](crate::ListConfig::marshal_cross_thread)
//!   is set, and fails with [`ListError::WrongThread`] otherwise.
//!
//! # Example
//!
//! ```
//! use horizon_objectlist::{Column, ListConfig, Model, ObjectList};
//!
//! #[derive(Clone)]
//! struct Job(u32);
//!
//! impl Model for Job {
//!     type Key = u32;
//!     fn key(&self) -> u32 {
//!         self.0
//!     }
//! }
//!
//! let mut list = ObjectList::new(vec![Column::new("id", |j: &Job| j.0)], ListConfig::default());
//! let sender = list.sender();
//! std::thread::spawn(move || {
//!     sender.add_objects(vec![Job(1), Job(2)]).unwrap();
//! })
//! .join()
//! .unwrap();
//!
//! assert_eq!(list.len(), 0);
//! list.process_pending().unwrap();
//! assert_eq!(list.len(), 2);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use horizon_objectlist_core::logging::targets;
use horizon_objectlist_core::{QueuePoster, ThreadAffinity};

use crate::error::{ListError, Result};
use crate::identity::CheckState;
use crate::list::{FilterSlot, ObjectList};
use crate::model::Model;
use crate::persist::ListState;
use crate::sort::SortSpec;
use crate::value::Value;

/// A deferred call on an [`ObjectList`].
pub enum Mutation<M: Model> {
    /// [`ObjectList::set_objects`].
    SetObjects { objects: Vec<M>, preserve_state: bool },
    /// [`ObjectList::add_objects`].
    Add(Vec<M>),
    /// [`ObjectList::insert_objects`].
    Insert { index: usize, objects: Vec<M> },
    /// [`ObjectList::remove_objects`].
    Remove(Vec<M::Key>),
    /// [`ObjectList::update_objects`].
    Update(Vec<M>),
    /// [`ObjectList::rebuild`].
    Rebuild { preserve_state: bool },
    /// [`ObjectList::sort_by`].
    SortBy(SortSpec),
    /// [`ObjectList::set_secondary_sort`].
    SetSecondarySort(Option<SortSpec>),
    /// [`ObjectList::clear_sort`].
    ClearSort,
    /// [`ObjectList::group_by`].
    GroupBy(SortSpec),
    /// [`ObjectList::clear_group_by`].
    ClearGroupBy,
    /// [`ObjectList::set_show_groups`].
    SetShowGroups(bool),
    /// Any of the filter setters.
    SetFilter(FilterSlot<M>),
    /// [`ObjectList::set_check_state`].
    SetCheckState(M::Key, CheckState),
    /// [`ObjectList::toggle_check`].
    ToggleCheck(M::Key),
    /// [`ObjectList::check_all`] or [`ObjectList::uncheck_all`].
    SetAllCheckStates(CheckState),
    /// [`ObjectList::set_enabled`].
    SetEnabled(M::Key, bool),
    /// [`ObjectList::enable_all`].
    EnableAll,
    /// [`ObjectList::set_cell_value`].
    SetCellValue { key: M::Key, column: usize, value: Value },
    /// [`ObjectList::restore_state`].
    RestoreState(ListState),
    /// Arbitrary work run against the list on its owner thread.
    Invoke(Box<dyn FnOnce(&mut ObjectList<M>) -> Result<()> + Send>),
}

impl<M: Model> fmt::Debug for Mutation<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::SetObjects {
                objects,
                preserve_state,
            } => f
                .debug_struct("SetObjects")
                .field("objects", &objects.len())
                .field("preserve_state", preserve_state)
                .finish(),
            Mutation::Add(objects) => f.debug_tuple("Add").field(&objects.len()).finish(),
            Mutation::Insert { index, objects } => f
                .debug_struct("Insert")
                .field("index", index)
                .field("objects", &objects.len())
                .finish(),
            Mutation::Remove(keys) => f.debug_tuple("Remove").field(keys).finish(),
            Mutation::Update(objects) => f.debug_tuple("Update").field(&objects.len()).finish(),
            Mutation::Rebuild { preserve_state } => f
                .debug_struct("Rebuild")
                .field("preserve_state", preserve_state)
                .finish(),
            Mutation::SortBy(spec) => f.debug_tuple("SortBy").field(spec).finish(),
            Mutation::SetSecondarySort(spec) => f.debug_tuple("SetSecondarySort").field(spec).finish(),
            Mutation::ClearSort => f.write_str("ClearSort"),
            Mutation::GroupBy(spec) => f.debug_tuple("GroupBy").field(spec).finish(),
            Mutation::ClearGroupBy => f.write_str("ClearGroupBy"),
            Mutation::SetShowGroups(show) => f.debug_tuple("SetShowGroups").field(show).finish(),
            Mutation::SetFilter(slot) => f.debug_tuple("SetFilter").field(slot).finish(),
            Mutation::SetCheckState(key, state) => {
                f.debug_tuple("SetCheckState").field(key).field(state).finish()
            }
            Mutation::ToggleCheck(key) => f.debug_tuple("ToggleCheck").field(key).finish(),
            Mutation::SetAllCheckStates(state) => f.debug_tuple("SetAllCheckStates").field(state).finish(),
            Mutation::SetEnabled(key, enabled) => {
                f.debug_tuple("SetEnabled").field(key).field(enabled).finish()
            }
            Mutation::EnableAll => f.write_str("EnableAll"),
            Mutation::SetCellValue { key, column, value } => f
                .debug_struct("SetCellValue")
                .field("key", key)
                .field("column", column)
                .field("value", value)
                .finish(),
            Mutation::RestoreState(state) => f.debug_tuple("RestoreState").field(state).finish(),
            Mutation::Invoke(_) => f.write_str("Invoke(..)"),
        }
    }
}

impl<M: Model> ObjectList<M> {
    /// Whether the caller is on a thread other than the owner thread.
    pub fn is_foreign_thread(&self) -> bool {
        !self.affinity.is_same_thread()
    }

    /// The owner thread.
    pub fn owner_affinity(&self) -> ThreadAffinity {
        self.affinity
    }

    /// Makes the calling thread the owner thread.
    ///
    /// Only call this after moving the list to a new thread and before
    /// anything else touches it there.
    pub fn rebind_owner_thread(&mut self) {
        self.affinity.rebind();
        if let Some(inbox) = &mut self.inbox {
            inbox.rebind();
        }
        tracing::debug!(target: targets::DISPATCH, owner = ?self.affinity.thread_id(), "rebound owner thread");
    }

    /// Posts a mutation for the owner thread, or rejects it when
    /// marshalling is disabled.
    pub(crate) fn forward(&self, mutation: Mutation<M>) -> Result<()> {
        if !self.config.marshal_cross_thread {
            tracing::warn!(target: targets::DISPATCH, ?mutation, "mutation attempted off the owner thread");
            return Err(ListError::WrongThread);
        }
        tracing::debug!(target: targets::DISPATCH, ?mutation, "marshalling to owner thread");
        self.poster.post(mutation)?;
        Ok(())
    }

    /// A handle other threads use to post mutations.
    pub fn sender(&self) -> MutationSender<M> {
        MutationSender {
            poster: self.poster.clone(),
            invalidated: self.invalidated.clone(),
            owner: self.affinity,
        }
    }

    /// Number of posted mutations waiting for
    /// [`process_pending`](Self::process_pending).
    pub fn pending_mutations(&self) -> usize {
        self.inbox.as_ref().map_or(0, |inbox| inbox.pending_count())
    }

    /// Applies a mutation on the owner thread.
    pub fn apply(&mut self, mutation: Mutation<M>) -> Result<()> {
        match mutation {
            Mutation::SetObjects {
                objects,
                preserve_state,
            } => self.set_objects(objects, preserve_state),
            Mutation::Add(objects) => self.add_objects(objects),
            Mutation::Insert { index, objects } => self.insert_objects(index, objects),
            Mutation::Remove(keys) => self.remove_objects(keys),
            Mutation::Update(objects) => self.update_objects(objects),
            Mutation::Rebuild { preserve_state } => self.rebuild(preserve_state),
            Mutation::SortBy(spec) => self.sort_by(spec.column, spec.order),
            Mutation::SetSecondarySort(spec) => self.set_secondary_sort(spec),
            Mutation::ClearSort => self.clear_sort(),
            Mutation::GroupBy(spec) => self.group_by(spec.column, spec.order),
            Mutation::ClearGroupBy => self.clear_group_by(),
            Mutation::SetShowGroups(show) => self.set_show_groups(show),
            Mutation::SetFilter(slot) => self.set_filter_slot(slot),
            Mutation::SetCheckState(key, state) => self.set_check_state(&key, state).map(drop),
            Mutation::ToggleCheck(key) => self.toggle_check(&key).map(drop),
            Mutation::SetAllCheckStates(state) => self.set_all_check_states(state),
            Mutation::SetEnabled(key, enabled) => self.set_enabled(&key, enabled).map(drop),
            Mutation::EnableAll => self.enable_all(),
            Mutation::SetCellValue { key, column, value } => {
                self.set_cell_value(&key, column, value).map(drop)
            }
            Mutation::RestoreState(state) => self.restore_state(&state),
            Mutation::Invoke(work) => work(self),
        }
    }

    /// Applies every posted mutation in submission order, then runs a
    /// rebuild if one was requested through
    /// [`MutationSender::invalidate`].
    ///
    /// A mutation that fails is logged and skipped; the rest still apply.
    /// Returns the number of mutations applied.
    pub fn process_pending(&mut self) -> Result<usize> {
        if self.is_foreign_thread() {
            return Err(ListError::WrongThread);
        }
        // Taken out so a mutation that processes pending work itself finds
        // nothing to do.
        let Some(inbox) = self.inbox.take() else {
            return Ok(0);
        };

        let mut failed = 0;
        let count = inbox.process_all(|mutation| {
            if let Err(error) = self.apply(mutation) {
                failed += 1;
                tracing::warn!(target: targets::DISPATCH, %error, "marshalled mutation failed");
            }
        });
        self.inbox = Some(inbox);

        if self.invalidated.load(Ordering::Acquire) && self.state == crate::list::RebuildState::Idle {
            self.request_rebuild(true)?;
        }
        if count > 0 {
            tracing::debug!(target: targets::DISPATCH, count, failed, "processed marshalled mutations");
        }
        Ok(count)
    }
}

/// A `Send` handle for posting mutations to an [`ObjectList`] from any
/// thread.
pub struct MutationSender<M: Model> {
    poster: QueuePoster<Mutation<M>>,
    invalidated: Arc<AtomicBool>,
    owner: ThreadAffinity,
}

impl<M: Model> Clone for MutationSender<M> {
    fn clone(&self) -> Self {
        Self {
            poster: self.poster.clone(),
            invalidated: self.invalidated.clone(),
            owner: self.owner,
        }
    }
}

impl<M: Model> fmt::Debug for MutationSender<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationSender")
            .field("owner", &self.owner)
            .field("invalidated", &self.invalidated.load(Ordering::Relaxed))
            .finish()
    }
}

impl<M: Model> MutationSender<M> {
    /// Posts a mutation and returns immediately.
    pub fn post(&self, mutation: Mutation<M>) -> Result<()> {
        tracing::trace!(target: targets::DISPATCH, ?mutation, "posting mutation");
        self.poster.post(mutation)?;
        Ok(())
    }

    /// Posts a mutation and blocks until the owner thread has processed it.
    ///
    /// On the owner thread itself this cannot wait (the owner would be
    /// waiting for itself), so the mutation is only posted.
    pub fn post_and_wait(&self, mutation: Mutation<M>) -> Result<()> {
        if self.owner.is_same_thread() {
            tracing::debug!(target: targets::DISPATCH, "post_and_wait on the owner thread, not waiting");
            return self.post(mutation);
        }
        self.poster.post_with_completion(mutation)?.wait();
        Ok(())
    }

    /// Like [`post_and_wait`](Self::post_and_wait) with an upper bound on
    /// the wait. Returns `false` if the owner did not get to it in time.
    pub fn post_and_wait_timeout(&self, mutation: Mutation<M>, timeout: Duration) -> Result<bool> {
        if self.owner.is_same_thread() {
            self.post(mutation)?;
            return Ok(false);
        }
        Ok(self.poster.post_with_completion(mutation)?.wait_timeout(timeout))
    }

    /// Posts [`ObjectList::set_objects`].
    pub fn set_objects(&self, objects: Vec<M>, preserve_state: bool) -> Result<()> {
        self.post(Mutation::SetObjects {
            objects,
            preserve_state,
        })
    }

    /// Posts [`ObjectList::add_objects`].
    pub fn add_objects(&self, objects: Vec<M>) -> Result<()> {
        self.post(Mutation::Add(objects))
    }

    /// Posts [`ObjectList::insert_objects`].
    pub fn insert_objects(&self, index: usize, objects: Vec<M>) -> Result<()> {
        self.post(Mutation::Insert { index, objects })
    }

    /// Posts [`ObjectList::remove_objects`].
    pub fn remove_objects(&self, keys: Vec<M::Key>) -> Result<()> {
        self.post(Mutation::Remove(keys))
    }

    /// Posts [`ObjectList::update_objects`].
    pub fn update_objects(&self, objects: Vec<M>) -> Result<()> {
        self.post(Mutation::Update(objects))
    }

    /// Posts arbitrary work to run against the list on its owner thread.
    pub fn invoke<F>(&self, work: F) -> Result<()>
    where
        F: FnOnce(&mut ObjectList<M>) -> Result<()> + Send + 'static,
    {
        self.post(Mutation::Invoke(Box::new(work)))
    }

    /// Asks for a state-preserving rebuild. Requests made before the owner
    /// gets to them, or while a rebuild is running, collapse into one.
    pub fn invalidate(&self) {
        if !self.invalidated.swap(true, Ordering::AcqRel) {
            tracing::trace!(target: targets::DISPATCH, "rebuild requested");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use parking_lot::Mutex;
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::column::Column;
    use crate::config::ListConfig;
    use crate::sort::SortOrder;

    #[derive(Debug, Clone)]
    struct Job {
        id: u32,
        name: String,
    }

    impl Model for Job {
        type Key = u32;
        fn key(&self) -> u32 {
            self.id
        }
    }

    assert_impl_all!(MutationSender<Job>: Send, Sync, Clone);
    assert_impl_all!(ObjectList<Job>: Send);

    fn job(id: u32, name: &str) -> Job {
        Job {
            id,
            name: name.to_string(),
        }
    }

    fn list(config: ListConfig) -> ObjectList<Job> {
        ObjectList::new(vec![Column::new("name", |j: &Job| j.name.clone())], config)
    }

    fn order(list: &ObjectList<Job>) -> Vec<u32> {
        list.projection().keys().copied().collect()
    }

    #[test]
    fn test_posted_mutations_apply_in_order() {
        let mut list = list(ListConfig::default());
        let sender = list.sender();
        thread::spawn(move || {
            sender.add_objects(vec![job(1, "b"), job(2, "a")]).unwrap();
            sender.post(Mutation::SortBy(SortSpec::ascending(0))).unwrap();
            sender.remove_objects(vec![1]).unwrap();
            sender.add_objects(vec![job(3, "0")]).unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(list.pending_mutations(), 4);
        assert_eq!(list.process_pending().unwrap(), 4);
        assert_eq!(order(&list), vec![3, 2]);
        assert_eq!(list.pending_mutations(), 0);
    }

    #[test]
    fn test_post_and_wait_returns_after_processing() {
        let list = Arc::new(Mutex::new(list(ListConfig::default())));
        let sender = list.lock().sender();

        let worker = thread::spawn(move || {
            sender.post_and_wait(Mutation::Add(vec![job(1, "x")])).unwrap();
        });

        // Drain until the worker has been served.
        while !worker.is_finished() {
            list.lock().process_pending().unwrap();
            thread::yield_now();
        }
        worker.join().unwrap();
        assert_eq!(list.lock().len(), 1);
    }

    #[test]
    fn test_off_thread_calls_are_marshalled() {
        let list = Arc::new(Mutex::new(list(ListConfig::default())));
        let remote = list.clone();
        thread::spawn(move || {
            let mut list = remote.lock();
            list.add_objects(vec![job(1, "x")]).unwrap();
            list.sort_by(0, SortOrder::Descending).unwrap();
            assert!(list.is_empty());
        })
        .join()
        .unwrap();

        let mut list = list.lock();
        assert_eq!(list.process_pending().unwrap(), 2);
        assert_eq!(order(&list), vec![1]);
        assert_eq!(list.parameters().primary_sort, Some(SortSpec::descending(0)));
    }

    #[test]
    fn test_off_thread_calls_rejected_without_marshalling() {
        let list = Arc::new(Mutex::new(list(ListConfig::default().with_cross_thread_marshalling(false))));
        let remote = list.clone();
        let result = thread::spawn(move || remote.lock().add_objects(vec![job(1, "x")]))
            .join()
            .unwrap();
        assert_eq!(result, Err(ListError::WrongThread));
        assert_eq!(list.lock().pending_mutations(), 0);

        let remote = list.clone();
        let result = thread::spawn(move || remote.lock().process_pending()).join().unwrap();
        assert_eq!(result, Err(ListError::WrongThread));
    }

    #[test]
    fn test_invalidate_coalesces() {
        let mut list = list(ListConfig::default());
        list.set_objects(vec![job(1, "x")], false).unwrap();
        let rebuilds = Arc::new(Mutex::new(0));
        let counter = rebuilds.clone();
        list.projection_changed.connect(move |change| {
            if change.rebuilt {
                *counter.lock() += 1;
            }
        });

        let sender = list.sender();
        sender.invalidate();
        sender.invalidate();
        list.process_pending().unwrap();
        assert_eq!(*rebuilds.lock(), 1);

        list.process_pending().unwrap();
        assert_eq!(*rebuilds.lock(), 1);
    }

    #[test]
    fn test_invoke_runs_on_owner() {
        let mut list = list(ListConfig::default());
        let sender = list.sender();
        let owner = list.owner_affinity();
        thread::spawn(move || {
            sender
                .invoke(move |list| {
                    assert!(owner.is_same_thread());
                    list.add_objects(vec![job(5, "five")])
                })
                .unwrap();
        })
        .join()
        .unwrap();
        list.process_pending().unwrap();
        assert_eq!(order(&list), vec![5]);
    }

    #[test]
    fn test_failed_mutation_does_not_stop_the_queue() {
        let mut list = list(ListConfig::default());
        let sender = list.sender();
        sender.post(Mutation::SortBy(SortSpec::ascending(9))).unwrap();
        sender.add_objects(vec![job(1, "x")]).unwrap();
        assert_eq!(list.process_pending().unwrap(), 2);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_closed_queue() {
        let list = list(ListConfig::default());
        let sender = list.sender();
        drop(list);
        assert_eq!(sender.add_objects(vec![job(1, "x")]), Err(ListError::QueueClosed));
    }
}
