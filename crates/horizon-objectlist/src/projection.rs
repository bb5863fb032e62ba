//! The externally visible output of a rebuild.
//!
//! A [`Projection`] owns the display rows in display order. When grouping is
//! active it also owns the groups, whose items are display indices into the
//! same row sequence, so every row is reachable both by position and through
//! exactly one group.

use std::collections::HashMap;
use std::hash::Hash;

use crate::group::Group;
use crate::identity::CheckState;
use crate::value::Value;

/// A projection wrapper around exactly one model.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<K> {
    pub(crate) key: K,
    pub(crate) source_index: usize,
    pub(crate) display_index: usize,
    pub(crate) cells: Vec<String>,
    pub(crate) check_state: CheckState,
    pub(crate) enabled: bool,
}

impl<K> Row<K> {
    /// The model's identity key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Position of the model in the backing collection.
    pub fn source_index(&self) -> usize {
        self.source_index
    }

    /// Position of this row in display order.
    pub fn display_index(&self) -> usize {
        self.display_index
    }

    /// Cached display text of every column, by column index.
    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Cached display text of one column.
    pub fn cell(&self, column: usize) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// Check state when the row was built or last patched.
    pub fn check_state(&self) -> CheckState {
        self.check_state
    }

    /// Whether the row is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// The current flat or grouped ordered output of the engine.
#[derive(Debug, Clone)]
pub struct Projection<K> {
    rows: Vec<Row<K>>,
    groups: Option<Vec<Group<usize>>>,
    positions: HashMap<K, usize>,
}

impl<K> Default for Projection<K> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            groups: None,
            positions: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> Projection<K> {
    /// A flat projection over rows already in display order.
    pub(crate) fn flat(rows: Vec<Row<K>>) -> Self {
        let mut projection = Self {
            rows,
            groups: None,
            positions: HashMap::new(),
        };
        projection.renumber();
        projection
    }

    /// A grouped projection. Rows are laid out group after group.
    pub(crate) fn grouped(groups: Vec<Group<Row<K>>>) -> Self {
        let mut rows = Vec::new();
        let groups = groups
            .into_iter()
            .map(|group| {
                group.map_items(|row| {
                    rows.push(row);
                    rows.len() - 1
                })
            })
            .collect();
        let mut projection = Self {
            rows,
            groups: Some(groups),
            positions: HashMap::new(),
        };
        projection.renumber();
        projection
    }

    fn renumber(&mut self) {
        self.positions.clear();
        self.renumber_from(0);
    }

    /// Renumbers rows from `start` on. Rows before it keep their positions.
    fn renumber_from(&mut self, start: usize) {
        for (index, row) in self.rows.iter_mut().enumerate().skip(start) {
            row.display_index = index;
            self.positions.insert(row.key.clone(), index);
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether this projection is partitioned into groups.
    pub fn is_grouped(&self) -> bool {
        self.groups.is_some()
    }

    /// Rows in display order.
    pub fn rows(&self) -> &[Row<K>] {
        &self.rows
    }

    /// Groups in display order; empty for a flat projection.
    pub fn groups(&self) -> &[Group<usize>] {
        self.groups.as_deref().unwrap_or_default()
    }

    /// Rows of one group.
    pub fn group_rows<'a>(&'a self, group: &'a Group<usize>) -> impl Iterator<Item = &'a Row<K>> + 'a {
        group.items().iter().filter_map(|&index| self.rows.get(index))
    }

    /// The row at a display index.
    pub fn row_at(&self, display_index: usize) -> Option<&Row<K>> {
        self.rows.get(display_index)
    }

    /// Display index of the row for a model key.
    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// The row for a model key.
    pub fn row_for(&self, key: &K) -> Option<&Row<K>> {
        self.index_of(key).and_then(|index| self.rows.get(index))
    }

    /// Whether a model is part of the projection.
    pub fn contains(&self, key: &K) -> bool {
        self.positions.contains_key(key)
    }

    /// Keys in display order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.rows.iter().map(|row| &row.key)
    }

    /// The group with the given key.
    pub fn group(&self, key: &Value) -> Option<&Group<usize>> {
        self.groups().iter().find(|group| group.key() == key)
    }

    pub(crate) fn group_mut(&mut self, key: &Value) -> Option<&mut Group<usize>> {
        self.groups.as_mut()?.iter_mut().find(|group| group.key() == key)
    }

    pub(crate) fn groups_mut(&mut self) -> &mut [Group<usize>] {
        self.groups.as_deref_mut().unwrap_or_default()
    }

    pub(crate) fn row_mut(&mut self, key: &K) -> Option<&mut Row<K>> {
        let index = self.index_of(key)?;
        self.rows.get_mut(index)
    }

    /// Appends or inserts rows into a flat projection. Only rows from `at`
    /// on are renumbered, so appending costs the rows appended.
    pub(crate) fn insert_rows(&mut self, at: usize, rows: Vec<Row<K>>) {
        let at = at.min(self.rows.len());
        self.rows.splice(at..at, rows);
        self.renumber_from(at);
    }

    /// Removes the rows for the given keys, then remaps source indices
    /// through `remap` (old source index to new). Groups left empty are
    /// dropped; titles are not recomputed.
    pub(crate) fn remove_rows<R, F>(&mut self, removed: R, remap: F)
    where
        R: Fn(&K) -> bool,
        F: Fn(usize) -> Option<usize>,
    {
        let mut next = 0;
        let display_map: Vec<Option<usize>> = self
            .rows
            .iter()
            .map(|row| {
                if removed(&row.key) {
                    None
                } else {
                    next += 1;
                    Some(next - 1)
                }
            })
            .collect();

        self.rows.retain(|row| !removed(&row.key));
        for row in &mut self.rows {
            if let Some(index) = remap(row.source_index) {
                row.source_index = index;
            }
        }
        if let Some(groups) = &mut self.groups {
            for group in groups.iter_mut() {
                let items = group.items_mut();
                *items = items.iter().filter_map(|&index| display_map[index]).collect();
            }
            groups.retain(|group| group.item_count() > 0);
        }
        self.renumber();
    }

    /// Shifts the source index of every row at or after `from` by `by`.
    pub(crate) fn shift_sources(&mut self, from: usize, by: usize) {
        for row in &mut self.rows {
            if row.source_index >= from {
                row.source_index += by;
            }
        }
    }
}

static_assertions::assert_impl_all!(Projection<u32>: Send, Sync, Clone);
