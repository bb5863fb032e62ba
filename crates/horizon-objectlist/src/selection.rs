//! Selection, focus and scroll state.
//!
//! This module provides [`SelectionModel`], which tracks which models are
//! selected, which one has focus, and the scroll offset of the list. It is
//! keyed by model identity rather than by row, so a selection can be
//! captured before a rebuild and re-applied to the rows the rebuild creates.
//!
//! # Example
//!
//! ```
//! use horizon_objectlist::selection::{SelectionFlags, SelectionMode, SelectionModel};
//!
//! let mut selection = SelectionModel::new(SelectionMode::ExtendedSelection);
//! selection.select("ant", SelectionFlags::SELECT_CURRENT);
//! selection.select("cat", SelectionFlags::SELECT);
//! assert_eq!(selection.selected_count(), 2);
//! assert_eq!(selection.focus(), Some(&"ant"));
//!
//! // "cat" did not survive the rebuild.
//! let snapshot = selection.snapshot();
//! selection.restore(snapshot, |key| *key != "cat", 10);
//! assert_eq!(selection.selected_keys(), &["ant"]);
//! ```

use std::collections::HashSet;
use std::hash::Hash;

use horizon_objectlist_core::Signal;
use serde::{Deserialize, Serialize};

/// Selection behavior mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    /// No models can be selected.
    NoSelection,
    /// Only one model can be selected at a time.
    SingleSelection,
    /// Multiple models can be selected one by one.
    MultiSelection,
    /// Range selection extended by individual toggles (default).
    #[default]
    ExtendedSelection,
}

impl SelectionMode {
    fn allows_many(self) -> bool {
        matches!(self, SelectionMode::MultiSelection | SelectionMode::ExtendedSelection)
    }
}

/// Flags controlling selection operations.
///
/// These flags can be combined to perform complex selection operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionFlags {
    /// Clear existing selection before applying operation.
    pub clear: bool,
    /// Select the specified models.
    pub select: bool,
    /// Deselect the specified models.
    pub deselect: bool,
    /// Toggle selection state of specified models.
    pub toggle: bool,
    /// Move focus to the last specified model.
    pub current: bool,
    /// Update anchor point for range selection.
    pub anchor: bool,
}

impl SelectionFlags {
    /// No operation.
    pub const NONE: Self = Self::empty();

    /// Clear existing selection.
    pub const CLEAR: Self = Self {
        clear: true,
        ..Self::empty()
    };

    /// Select.
    pub const SELECT: Self = Self {
        select: true,
        ..Self::empty()
    };

    /// Deselect.
    pub const DESELECT: Self = Self {
        deselect: true,
        ..Self::empty()
    };

    /// Toggle selection.
    pub const TOGGLE: Self = Self {
        toggle: true,
        ..Self::empty()
    };

    /// Clear existing selection and select.
    pub const CLEAR_AND_SELECT: Self = Self {
        clear: true,
        select: true,
        ..Self::empty()
    };

    /// Select and focus.
    pub const SELECT_CURRENT: Self = Self {
        select: true,
        current: true,
        ..Self::empty()
    };

    /// Clear, select, and focus.
    pub const CLEAR_SELECT_CURRENT: Self = Self {
        clear: true,
        select: true,
        current: true,
        ..Self::empty()
    };

    const fn empty() -> Self {
        Self {
            clear: false,
            select: false,
            deselect: false,
            toggle: false,
            current: false,
            anchor: false,
        }
    }

    /// Creates flags with current set.
    pub fn with_current(mut self) -> Self {
        self.current = true;
        self
    }

    /// Creates flags with anchor set.
    pub fn with_anchor(mut self) -> Self {
        self.anchor = true;
        self
    }
}

/// Selection, focus and scroll offset captured before a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSnapshot<K> {
    /// Selected keys in selection order.
    pub selected: Vec<K>,
    /// Focused key.
    pub focus: Option<K>,
    /// Index of the first visible row.
    pub top_index: usize,
}

/// Manages selection state for an object list.
///
/// # Signals
///
/// - `selection_changed`: emitted with (selected, deselected) keys
/// - `focus_changed`: emitted with (new, old) focus
///
/// While notifications are deferred (see
/// [`defer_notifications`](Self::defer_notifications)) nothing is emitted;
/// [`flush_notifications`](Self::flush_notifications) then emits the net
/// change once.
pub struct SelectionModel<K: 'static> {
    mode: SelectionMode,
    focus: Option<K>,
    anchor: Option<K>,
    selected_set: HashSet<K>,
    selected: Vec<K>,
    top_index: usize,
    deferred: Option<(Vec<K>, Option<K>)>,

    /// Emitted when selection changes. Args: (selected, deselected)
    pub selection_changed: Signal<(Vec<K>, Vec<K>)>,

    /// Emitted when focus changes. Args: (new, old)
    pub focus_changed: Signal<(Option<K>, Option<K>)>,
}

impl<K: std::fmt::Debug + 'static> std::fmt::Debug for SelectionModel<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionModel")
            .field("mode", &self.mode)
            .field("focus", &self.focus)
            .field("selected", &self.selected)
            .field("top_index", &self.top_index)
            .field("deferred", &self.deferred.is_some())
            .finish()
    }
}

impl<K: Clone + Eq + Hash + 'static> Default for SelectionModel<K> {
    fn default() -> Self {
        Self::new(SelectionMode::default())
    }
}

impl<K: Clone + Eq + Hash + 'static> SelectionModel<K> {
    /// Creates an empty selection model.
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            focus: None,
            anchor: None,
            selected_set: HashSet::new(),
            selected: Vec::new(),
            top_index: 0,
            deferred: None,
            selection_changed: Signal::new(),
            focus_changed: Signal::new(),
        }
    }

    // =========================================================================
    // Selection Mode
    // =========================================================================

    /// Gets the current selection mode.
    pub fn selection_mode(&self) -> SelectionMode {
        self.mode
    }

    /// Sets the selection mode.
    ///
    /// Switching to [`SelectionMode::NoSelection`] clears the selection;
    /// switching to [`SelectionMode::SingleSelection`] keeps only the most
    /// recently selected model.
    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
        match mode {
            SelectionMode::NoSelection => self.clear_selection(),
            SelectionMode::SingleSelection if self.selected.len() > 1 => {
                let keep = self.selected.len() - 1;
                let deselected: Vec<K> = self.selected.drain(..keep).collect();
                for key in &deselected {
                    self.selected_set.remove(key);
                }
                self.notify_selection(Vec::new(), deselected);
            }
            _ => {}
        }
    }

    // =========================================================================
    // Focus, anchor and scroll offset
    // =========================================================================

    /// The focused model.
    pub fn focus(&self) -> Option<&K> {
        self.focus.as_ref()
    }

    /// Moves focus. Selection is applied through `flags` like
    /// [`select`](Self::select).
    pub fn set_focus(&mut self, key: Option<K>, flags: SelectionFlags) {
        match key {
            Some(key) if flags.clear || flags.select || flags.deselect || flags.toggle => {
                self.select(key, flags.with_current());
            }
            key => self.replace_focus(key),
        }
    }

    fn replace_focus(&mut self, key: Option<K>) {
        if self.focus == key {
            return;
        }
        let old = std::mem::replace(&mut self.focus, key.clone());
        if self.deferred.is_none() {
            self.focus_changed.emit((key, old));
        }
    }

    /// The anchor for range selection.
    pub fn anchor(&self) -> Option<&K> {
        self.anchor.as_ref()
    }

    /// Index of the first visible row.
    pub fn top_index(&self) -> usize {
        self.top_index
    }

    /// Sets the index of the first visible row.
    pub fn set_top_index(&mut self, top_index: usize) {
        self.top_index = top_index;
    }

    // =========================================================================
    // Selection Queries
    // =========================================================================

    /// Checks if a model is selected.
    pub fn is_selected(&self, key: &K) -> bool {
        self.selected_set.contains(key)
    }

    /// Returns true if any models are selected.
    pub fn has_selection(&self) -> bool {
        !self.selected.is_empty()
    }

    /// Returns the number of selected models.
    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Returns the selected keys in selection order.
    pub fn selected_keys(&self) -> &[K] {
        &self.selected
    }

    // =========================================================================
    // Selection Operations
    // =========================================================================

    /// Performs a selection operation on one model.
    pub fn select(&mut self, key: K, flags: SelectionFlags) {
        self.select_many(std::iter::once(key), flags);
    }

    /// Performs a selection operation on several models.
    ///
    /// The behavior depends on the flags:
    /// - `clear`: Deselects everything first
    /// - `select`: Adds the models to the selection
    /// - `deselect`: Removes the models from the selection
    /// - `toggle`: Toggles the selection state of each model
    /// - `current`/`anchor`: Moves focus/anchor to the last model given
    pub fn select_many<I>(&mut self, keys: I, flags: SelectionFlags)
    where
        I: IntoIterator<Item = K>,
    {
        if self.mode == SelectionMode::NoSelection {
            return;
        }

        let mut newly_selected = Vec::new();
        let mut newly_deselected = Vec::new();
        let mut cleared = HashSet::new();

        if flags.clear && !self.selected.is_empty() {
            newly_deselected = std::mem::take(&mut self.selected);
            cleared = std::mem::take(&mut self.selected_set);
        }

        let mut last = None;
        for key in keys {
            let was_selected = self.selected_set.contains(&key);
            if flags.toggle {
                if was_selected {
                    self.remove(&key);
                    newly_deselected.push(key.clone());
                } else {
                    self.insert(key.clone());
                    newly_selected.push(key.clone());
                }
            } else if flags.select && !was_selected {
                self.insert(key.clone());
                newly_selected.push(key.clone());
            } else if flags.deselect && was_selected {
                self.remove(&key);
                newly_deselected.push(key.clone());
            }
            last = Some(key);
        }

        // Enforce single selection mode
        if !self.mode.allows_many() && self.selected.len() > 1 {
            let keep = self.selected.len() - 1;
            for removed in self.selected.drain(..keep) {
                self.selected_set.remove(&removed);
                newly_deselected.push(removed);
            }
        }

        // Cleared and then re-selected is no change either way.
        newly_selected.retain(|key| !cleared.contains(key) && self.selected_set.contains(key));
        newly_deselected.retain(|key| !self.selected_set.contains(key));
        dedup(&mut newly_deselected);

        if let Some(last) = last {
            if flags.anchor {
                self.anchor = Some(last.clone());
            }
            if flags.current {
                self.replace_focus(Some(last));
            }
        }

        self.notify_selection(newly_selected, newly_deselected);
    }

    /// Deselects one model.
    pub fn deselect(&mut self, key: &K) {
        if self.remove(key) {
            self.notify_selection(Vec::new(), vec![key.clone()]);
        }
    }

    /// Clears all selection.
    pub fn clear_selection(&mut self) {
        if self.selected.is_empty() {
            return;
        }
        let deselected = std::mem::take(&mut self.selected);
        self.selected_set.clear();
        self.notify_selection(Vec::new(), deselected);
    }

    /// Clears all selection and resets focus, anchor and scroll offset.
    pub fn clear(&mut self) {
        self.clear_selection();
        self.replace_focus(None);
        self.anchor = None;
        self.top_index = 0;
    }

    /// Drops selection, focus and anchor for keys that `keep` rejects.
    pub fn retain<F: Fn(&K) -> bool>(&mut self, keep: F) {
        let (kept, dropped): (Vec<K>, Vec<K>) =
            std::mem::take(&mut self.selected).into_iter().partition(|key| keep(key));
        for key in &dropped {
            self.selected_set.remove(key);
        }
        self.selected = kept;
        if self.anchor.as_ref().is_some_and(|key| !keep(key)) {
            self.anchor = None;
        }
        if self.focus.as_ref().is_some_and(|key| !keep(key)) {
            self.replace_focus(None);
        }
        self.notify_selection(Vec::new(), dropped);
    }

    // =========================================================================
    // Snapshot and restore
    // =========================================================================

    /// Captures selection, focus and scroll offset.
    pub fn snapshot(&self) -> SelectionSnapshot<K> {
        SelectionSnapshot {
            selected: self.selected.clone(),
            focus: self.focus.clone(),
            top_index: self.top_index,
        }
    }

    /// Re-applies a snapshot after a rebuild.
    ///
    /// Keys that `available` rejects are dropped. The scroll offset falls
    /// back to the top of the list if it is no longer within `row_count`.
    pub fn restore<F>(&mut self, snapshot: SelectionSnapshot<K>, available: F, row_count: usize)
    where
        F: Fn(&K) -> bool,
    {
        self.restore_filtered(snapshot, &available, &available, row_count);
    }

    /// Like [`restore`](Self::restore), with a separate test for selection.
    ///
    /// Focus and the anchor survive if `visible` accepts them. Selected keys
    /// must pass both `visible` and `selectable`, so a row that can be
    /// focused but not selected keeps focus.
    pub fn restore_filtered<V, S>(
        &mut self,
        snapshot: SelectionSnapshot<K>,
        visible: V,
        selectable: S,
        row_count: usize,
    ) where
        V: Fn(&K) -> bool,
        S: Fn(&K) -> bool,
    {
        let SelectionSnapshot {
            selected,
            focus,
            top_index,
        } = snapshot;

        let previous = std::mem::take(&mut self.selected);
        let previous_set = std::mem::take(&mut self.selected_set);

        if self.mode != SelectionMode::NoSelection {
            for key in selected.into_iter().filter(|key| visible(key) && selectable(key)) {
                self.insert(key);
            }
            if !self.mode.allows_many() && self.selected.len() > 1 {
                let keep = self.selected.len() - 1;
                for key in self.selected.drain(..keep) {
                    self.selected_set.remove(&key);
                }
            }
        }

        let newly_selected = self
            .selected
            .iter()
            .filter(|key| !previous_set.contains(*key))
            .cloned()
            .collect();
        let newly_deselected = previous
            .into_iter()
            .filter(|key| !self.selected_set.contains(key))
            .collect();

        self.anchor = self.anchor.take().filter(|key| visible(key));
        self.replace_focus(focus.filter(|key| visible(key)));
        self.top_index = if top_index < row_count { top_index } else { 0 };
        self.notify_selection(newly_selected, newly_deselected);
    }

    // =========================================================================
    // Deferred notification
    // =========================================================================

    /// Starts collecting changes instead of emitting them.
    pub fn defer_notifications(&mut self) {
        if self.deferred.is_none() {
            self.deferred = Some((self.selected.clone(), self.focus.clone()));
        }
    }

    /// Whether notifications are currently deferred.
    pub fn is_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// Stops deferring and emits the net change since deferral began.
    pub fn flush_notifications(&mut self) {
        let Some((baseline, baseline_focus)) = self.deferred.take() else {
            return;
        };
        let baseline_set: HashSet<&K> = baseline.iter().collect();
        let newly_selected: Vec<K> = self
            .selected
            .iter()
            .filter(|key| !baseline_set.contains(key))
            .cloned()
            .collect();
        let newly_deselected: Vec<K> = baseline
            .iter()
            .filter(|key| !self.selected_set.contains(*key))
            .cloned()
            .collect();
        self.notify_selection(newly_selected, newly_deselected);
        if baseline_focus != self.focus {
            self.focus_changed.emit((self.focus.clone(), baseline_focus));
        }
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    fn notify_selection(&self, selected: Vec<K>, deselected: Vec<K>) {
        if self.deferred.is_some() || (selected.is_empty() && deselected.is_empty()) {
            return;
        }
        self.selection_changed.emit((selected, deselected));
    }

    fn insert(&mut self, key: K) {
        if self.selected_set.insert(key.clone()) {
            self.selected.push(key);
        }
    }

    fn remove(&mut self, key: &K) -> bool {
        if self.selected_set.remove(key) {
            self.selected.retain(|k| k != key);
            true
        } else {
            false
        }
    }
}

fn dedup<K: Eq + Hash + Clone>(keys: &mut Vec<K>) {
    let mut seen = HashSet::new();
    keys.retain(|key| seen.insert(key.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn test_selection_model_creation() {
        let model = SelectionModel::<u32>::default();
        assert_eq!(model.selection_mode(), SelectionMode::ExtendedSelection);
        assert!(model.focus().is_none());
        assert!(!model.has_selection());
    }

    #[test]
    fn test_single_selection() {
        let mut model = SelectionModel::new(SelectionMode::SingleSelection);

        model.select(1, SelectionFlags::SELECT);
        assert!(model.is_selected(&1));

        // A second select replaces the first in single selection mode.
        model.select(2, SelectionFlags::SELECT);
        assert!(!model.is_selected(&1));
        assert!(model.is_selected(&2));
        assert_eq!(model.selected_count(), 1);
    }

    #[test]
    fn test_toggle_selection() {
        let mut model = SelectionModel::new(SelectionMode::MultiSelection);
        model.select(1, SelectionFlags::TOGGLE);
        assert!(model.is_selected(&1));
        model.select(1, SelectionFlags::TOGGLE);
        assert!(!model.is_selected(&1));
    }

    #[test]
    fn test_no_selection_mode() {
        let mut model = SelectionModel::new(SelectionMode::NoSelection);
        model.select(1, SelectionFlags::SELECT);
        assert!(!model.has_selection());
    }

    #[test]
    fn test_selection_signal() {
        let mut model = SelectionModel::new(SelectionMode::MultiSelection);

        let selected_count = Arc::new(AtomicUsize::new(0));
        let count_clone = selected_count.clone();
        model.selection_changed.connect(move |(selected, _)| {
            count_clone.fetch_add(selected.len(), Ordering::SeqCst);
        });

        model.select(0, SelectionFlags::SELECT);
        model.select(1, SelectionFlags::SELECT);
        model.select(1, SelectionFlags::SELECT);

        assert_eq!(selected_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clear_and_reselect_is_not_a_change() {
        let mut model = SelectionModel::new(SelectionMode::MultiSelection);
        model.select_many([1, 2], SelectionFlags::SELECT);

        let changes = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = changes.clone();
        model.selection_changed.connect(move |change| sink.lock().push(change.clone()));

        model.select(2, SelectionFlags::CLEAR_AND_SELECT);
        assert_eq!(changes.lock().as_slice(), &[(vec![], vec![1])]);
    }

    #[test]
    fn test_focus_changed_signal() {
        let mut model = SelectionModel::new(SelectionMode::MultiSelection);

        let changed_count = Arc::new(AtomicUsize::new(0));
        let count_clone = changed_count.clone();
        model.focus_changed.connect(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        model.set_focus(Some(1), SelectionFlags::NONE);
        model.set_focus(Some(1), SelectionFlags::NONE);
        model.select(2, SelectionFlags::SELECT_CURRENT);
        assert_eq!(model.focus(), Some(&2));
        assert_eq!(changed_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_restore_drops_unavailable_keys() {
        let mut model = SelectionModel::new(SelectionMode::ExtendedSelection);
        model.select_many([1, 2, 3], SelectionFlags::SELECT);
        model.set_focus(Some(2), SelectionFlags::NONE);
        model.set_top_index(40);

        let snapshot = model.snapshot();
        model.restore(snapshot, |key| *key != 2, 10);

        assert_eq!(model.selected_keys(), &[1, 3]);
        assert_eq!(model.focus(), None);
        assert_eq!(model.top_index(), 0);
    }

    #[test]
    fn test_restore_keeps_focus_on_unselectable_key() {
        let mut model = SelectionModel::new(SelectionMode::ExtendedSelection);
        model.select_many([1, 2], SelectionFlags::SELECT);
        model.set_focus(Some(3), SelectionFlags::NONE);

        let snapshot = model.snapshot();
        model.restore_filtered(snapshot, |_| true, |key| *key != 3 && *key != 2, 10);

        assert_eq!(model.selected_keys(), &[1]);
        assert_eq!(model.focus(), Some(&3));
    }

    #[test]
    fn test_restore_keeps_scroll_in_range() {
        let mut model = SelectionModel::<u32>::new(SelectionMode::ExtendedSelection);
        model.set_top_index(5);
        let snapshot = model.snapshot();
        model.restore(snapshot, |_| true, 6);
        assert_eq!(model.top_index(), 5);
    }

    #[test]
    fn test_deferred_notifications_emit_net_change_once() {
        let mut model = SelectionModel::new(SelectionMode::MultiSelection);
        model.select(9, SelectionFlags::SELECT);

        let emitted = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = emitted.clone();
        model.selection_changed.connect(move |change| sink.lock().push(change.clone()));

        model.defer_notifications();
        model.select(1, SelectionFlags::SELECT);
        model.select(2, SelectionFlags::SELECT);
        model.deselect(&1);
        model.deselect(&9);
        assert!(emitted.lock().is_empty());

        model.flush_notifications();
        assert_eq!(emitted.lock().as_slice(), &[(vec![2], vec![9])]);
    }

    #[test]
    fn test_retain() {
        let mut model = SelectionModel::new(SelectionMode::MultiSelection);
        model.select_many([1, 2, 3], SelectionFlags::SELECT_CURRENT);
        model.retain(|key| *key != 3);
        assert_eq!(model.selected_keys(), &[1, 2]);
        assert_eq!(model.focus(), None);
    }

    #[test]
    fn test_switch_to_single_keeps_latest() {
        let mut model = SelectionModel::new(SelectionMode::MultiSelection);
        model.select_many([1, 2, 3], SelectionFlags::SELECT);
        model.set_selection_mode(SelectionMode::SingleSelection);
        assert_eq!(model.selected_keys(), &[3]);
    }
}
