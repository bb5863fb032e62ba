//! Batched updates.
//!
//! Between [`begin_update`](ObjectList::begin_update) and the matching
//! [`end_update`](ObjectList::end_update), rebuild requests are coalesced
//! and notifications are held back. Closing the outermost batch runs at most
//! one rebuild and emits each notification at most once, with the net
//! change.
//!
//! ```
//! use horizon_objectlist::{Column, ListConfig, Model, ObjectList};
//!
//! #[derive(Clone)]
//! struct Row(u32);
//!
//! impl Model for Row {
//!     type Key = u32;
//!     fn key(&self) -> u32 {
//!         self.0
//!     }
//! }
//!
//! let mut list = ObjectList::new(vec![Column::new("n", |r: &Row| r.0)], ListConfig::default());
//! list.batch(|list| {
//!     list.add_objects(vec![Row(1), Row(2)])?;
//!     list.remove_objects([1])
//! })
//! .unwrap();
//! assert_eq!(list.len(), 1);
//! ```

use std::ops::{Deref, DerefMut};

use horizon_objectlist_core::logging::targets;

use crate::error::Result;
use crate::identity::CheckState;
use crate::list::{ObjectList, ProjectionChanged};
use crate::model::Model;

/// Bookkeeping for an open batch.
#[derive(Debug)]
pub(crate) struct BatchState<K> {
    pub(crate) depth: usize,
    /// Deferred rebuild; `Some(false)` once any request asked not to
    /// preserve state.
    pub(crate) pending_rebuild: Option<bool>,
    pub(crate) changed: bool,
    pub(crate) rebuilt: bool,
    pub(crate) checks: Vec<(K, CheckState)>,
}

impl<K> Default for BatchState<K> {
    fn default() -> Self {
        Self {
            depth: 0,
            pending_rebuild: None,
            changed: false,
            rebuilt: false,
            checks: Vec::new(),
        }
    }
}

impl<K> BatchState<K> {
    pub(crate) fn defer_rebuild(&mut self, preserve_state: bool) {
        self.pending_rebuild = Some(match self.pending_rebuild {
            Some(previous) => previous && preserve_state,
            None => preserve_state,
        });
    }
}

impl<M: Model> ObjectList<M> {
    /// Opens a batch. Batches nest; only closing the outermost one flushes.
    pub fn begin_update(&mut self) {
        if self.batch.depth == 0 {
            self.selection.defer_notifications();
        }
        self.batch.depth += 1;
    }

    /// Closes a batch. Closing the outermost batch runs the deferred
    /// rebuild, if any, and emits the held-back notifications.
    ///
    /// The batch is closed even when the rebuild fails; the error is
    /// returned and the previous projection stays.
    pub fn end_update(&mut self) -> Result<()> {
        match self.batch.depth {
            0 => {
                tracing::warn!(target: targets::MUTATION, "end_update without matching begin_update");
                return Ok(());
            }
            1 => {}
            _ => {
                self.batch.depth -= 1;
                return Ok(());
            }
        }

        // Still at depth one, so notifications from the rebuild are
        // collected rather than emitted.
        let result = match self.batch.pending_rebuild.take() {
            Some(preserve_state) => self.run_rebuilds(preserve_state),
            None => Ok(()),
        };
        self.batch.depth = 0;

        let changed = std::mem::take(&mut self.batch.changed);
        let rebuilt = std::mem::take(&mut self.batch.rebuilt);
        let checks = std::mem::take(&mut self.batch.checks);
        if changed {
            self.projection_changed.emit(ProjectionChanged {
                rows: self.projection.len(),
                groups: self.projection.groups().len(),
                rebuilt,
            });
        }
        if !checks.is_empty() {
            self.check_state_changed.emit(checks);
        }
        self.selection.flush_notifications();
        result
    }

    /// Whether a batch is open.
    pub fn is_updating(&self) -> bool {
        self.batch.depth > 0
    }

    /// Opens a batch that closes when the returned guard is dropped.
    ///
    /// Dropping the guard cannot report a failed rebuild; it is logged. Use
    /// [`BatchGuard::finish`] to observe it.
    pub fn begin_batch(&mut self) -> BatchGuard<'_, M> {
        self.begin_update();
        BatchGuard { list: Some(self) }
    }

    /// Runs `body` inside a batch.
    ///
    /// The batch is closed whether or not `body` succeeds. An error from
    /// `body` takes precedence over an error from the closing rebuild.
    pub fn batch<R, F>(&mut self, body: F) -> Result<R>
    where
        F: FnOnce(&mut Self) -> Result<R>,
    {
        self.begin_update();
        let result = body(self);
        let closed = self.end_update();
        let value = result?;
        closed.map(|()| value)
    }
}

/// RAII batch over an [`ObjectList`].
pub struct BatchGuard<'a, M: Model> {
    list: Option<&'a mut ObjectList<M>>,
}

impl<M: Model> BatchGuard<'_, M> {
    /// Closes the batch and reports the result of the deferred rebuild.
    pub fn finish(mut self) -> Result<()> {
        match self.list.take() {
            Some(list) => list.end_update(),
            None => Ok(()),
        }
    }
}

impl<M: Model> Deref for BatchGuard<'_, M> {
    type Target = ObjectList<M>;

    fn deref(&self) -> &Self::Target {
        match &self.list {
            Some(list) => &**list,
            None => unreachable!("batch guard used after finish"),
        }
    }
}

impl<M: Model> DerefMut for BatchGuard<'_, M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.list {
            Some(list) => &mut **list,
            None => unreachable!("batch guard used after finish"),
        }
    }
}

impl<M: Model> Drop for BatchGuard<'_, M> {
    fn drop(&mut self) {
        if let Some(list) = self.list.take()
            && let Err(error) = list.end_update()
        {
            tracing::warn!(target: targets::REBUILD, %error, "deferred rebuild failed when closing batch");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::column::Column;
    use crate::config::ListConfig;
    use crate::list::ObjectList;
    use crate::model::Model;
    use crate::selection::SelectionFlags;
    use crate::sort::SortOrder;

    #[derive(Debug, Clone)]
    struct Entry {
        id: u32,
        name: &'static str,
    }

    impl Model for Entry {
        type Key = u32;
        fn key(&self) -> u32 {
            self.id
        }
    }

    fn list() -> ObjectList<Entry> {
        let mut list = ObjectList::new(vec![Column::new("name", |e: &Entry| e.name)], ListConfig::default());
        list.set_objects(
            vec![Entry { id: 1, name: "b" }, Entry { id: 2, name: "a" }],
            false,
        )
        .unwrap();
        list.sort_by(0, SortOrder::Ascending).unwrap();
        list
    }

    #[test]
    fn test_batch_emits_once() {
        let mut list = list();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        list.projection_changed.connect(move |change| sink.lock().push(*change));

        list.batch(|list| {
            list.add_objects(vec![Entry { id: 3, name: "c" }])?;
            list.add_objects(vec![Entry { id: 4, name: "0" }])?;
            list.sort_by(0, SortOrder::Descending)
        })
        .unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert!(events[0].rebuilt);
        assert_eq!(events[0].rows, 4);
        assert_eq!(list.projection().keys().copied().collect::<Vec<_>>(), vec![3, 1, 2, 4]);
    }

    #[test]
    fn test_nested_batches_flush_at_outermost() {
        let mut list = list();
        list.begin_update();
        list.begin_update();
        list.add_objects(vec![Entry { id: 3, name: "c" }]).unwrap();
        list.end_update().unwrap();
        assert!(list.is_updating());
        assert_eq!(list.len(), 2);
        list.end_update().unwrap();
        assert!(!list.is_updating());
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_selection_change_is_net() {
        let mut list = list();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        list.selection_changed()
            .connect(move |(selected, deselected)| sink.lock().push((selected.clone(), deselected.clone())));

        {
            let mut batch = list.begin_batch();
            batch.select([1], SelectionFlags::SELECT);
            batch.select([2], SelectionFlags::SELECT);
            batch.select([1], SelectionFlags::DESELECT);
        }

        assert_eq!(*events.lock(), vec![(vec![2], vec![])]);
    }

    #[test]
    fn test_check_notifications_are_collected() {
        let mut list = list();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        list.check_state_changed.connect(move |changes| sink.lock().push(changes.len()));

        let mut batch = list.begin_batch();
        batch.check(&1).unwrap();
        batch.check(&2).unwrap();
        assert!(events.lock().is_empty());
        batch.finish().unwrap();
        assert_eq!(*events.lock(), vec![2]);
    }

    #[test]
    fn test_unbalanced_end_update_is_harmless() {
        let mut list = list();
        list.end_update().unwrap();
        assert!(!list.is_updating());
    }
}
