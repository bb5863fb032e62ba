//! Saved view state.
//!
//! [`ListState`] is the sort, grouping and column layout of a list as plain
//! serde data. Columns are referred to by name, so a saved state survives
//! columns being added or reordered between sessions. The storage format is
//! up to the host.
//!
//! ```
//! use horizon_objectlist::{Column, ListConfig, ListState, Model, ObjectList, SortOrder};
//!
//! #[derive(Clone)]
//! struct Song {
//!     id: u32,
//!     title: String,
//! }
//!
//! impl Model for Song {
//!     type Key = u32;
//!     fn key(&self) -> u32 {
//!         self.id
//!     }
//! }
//!
//! let columns = || vec![Column::new("title", |s: &Song| s.title.clone())];
//! let mut list = ObjectList::new(columns(), ListConfig::default());
//! list.sort_by(0, SortOrder::Descending).unwrap();
//! let saved: ListState = list.save_state();
//!
//! let mut restored = ObjectList::new(columns(), ListConfig::default());
//! restored.restore_state(&saved).unwrap();
//! assert_eq!(restored.parameters(), list.parameters());
//! ```

use serde::{Deserialize, Serialize};

use horizon_objectlist_core::logging::targets;

use crate::dispatch::Mutation;
use crate::error::{ListError, Result};
use crate::list::ObjectList;
use crate::model::Model;
use crate::sort::{SortOrder, SortSpec};

/// Current [`ListState::version`].
pub const STATE_VERSION: u32 = 1;

/// A sort or group level, by column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    /// Column name.
    pub column: String,
    /// Direction.
    #[serde(default)]
    pub order: SortOrder,
}

/// Width and visibility of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnState {
    /// Column name.
    pub name: String,
    /// Width hint.
    pub width: u32,
    /// Visibility hint.
    pub visible: bool,
}

/// The persistable view state of an [`ObjectList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListState {
    /// Format version.
    pub version: u32,
    /// Column layout.
    pub columns: Vec<ColumnState>,
    /// Primary sort.
    pub primary_sort: Option<SortState>,
    /// Tie-break sort.
    pub secondary_sort: Option<SortState>,
    /// Group-by column.
    pub group_by: Option<SortState>,
    /// Whether groups are shown.
    pub show_groups: bool,
}

impl Default for ListState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            columns: Vec::new(),
            primary_sort: None,
            secondary_sort: None,
            group_by: None,
            show_groups: true,
        }
    }
}

impl<M: Model> ObjectList<M> {
    /// Captures the current sort, grouping and column layout.
    pub fn save_state(&self) -> ListState {
        let level = |spec: Option<SortSpec>| {
            spec.and_then(|spec| {
                self.columns.get(spec.column).map(|column| SortState {
                    column: column.name().to_string(),
                    order: spec.order,
                })
            })
        };
        ListState {
            version: STATE_VERSION,
            columns: self
                .columns
                .iter()
                .map(|column| ColumnState {
                    name: column.name().to_string(),
                    width: column.width(),
                    visible: column.is_visible(),
                })
                .collect(),
            primary_sort: level(self.params.primary_sort),
            secondary_sort: level(self.params.secondary_sort),
            group_by: level(self.params.group_by),
            show_groups: self.params.show_groups,
        }
    }

    /// Re-applies saved state and rebuilds.
    ///
    /// Names that no longer match a column are skipped, or rejected with
    /// [`ListError::UnknownColumnName`] in strict mode. Sort levels on
    /// columns that are no longer sortable, and grouping on columns that are
    /// no longer groupable, are dropped the same way. Nothing changes when
    /// an error is returned.
    pub fn restore_state(&mut self, state: &ListState) -> Result<()> {
        if self.is_foreign_thread() {
            return self.forward(Mutation::RestoreState(state.clone()));
        }
        if state.version > STATE_VERSION {
            tracing::warn!(target: targets::REBUILD, version = state.version, "restoring state from a newer version");
        }

        let primary_sort = self.resolve_sort_state(state.primary_sort.as_ref())?;
        let secondary_sort = self.resolve_sort_state(state.secondary_sort.as_ref())?;
        let group_by = match state.group_by.as_ref() {
            Some(level) => self.resolve_group_state(level)?,
            None => None,
        };
        let mut layout = Vec::with_capacity(state.columns.len());
        for column in &state.columns {
            if let Some(index) = self.lookup_column(&column.name)? {
                layout.push((index, column.width, column.visible));
            }
        }

        self.reconfigure(|list| {
            list.params.primary_sort = primary_sort;
            list.params.secondary_sort = secondary_sort;
            list.params.group_by = group_by;
            list.params.show_groups = state.show_groups;
        })?;
        for (index, width, visible) in layout {
            self.set_column_width(index, width)?;
            self.set_column_visible(index, visible)?;
        }
        Ok(())
    }

    fn lookup_column(&self, name: &str) -> Result<Option<usize>> {
        match self.column_index(name) {
            Some(index) => Ok(Some(index)),
            None if self.config.strict => Err(ListError::UnknownColumnName { name: name.to_string() }),
            None => {
                tracing::debug!(target: targets::REBUILD, column = name, "skipping unknown column in saved state");
                Ok(None)
            }
        }
    }

    fn resolve_sort_state(&self, level: Option<&SortState>) -> Result<Option<SortSpec>> {
        let Some(level) = level else {
            return Ok(None);
        };
        match self.lookup_column(&level.column)? {
            Some(index) => self.checked_sort(SortSpec::new(index, level.order)),
            None => Ok(None),
        }
    }

    fn resolve_group_state(&self, level: &SortState) -> Result<Option<SortSpec>> {
        let Some(index) = self.lookup_column(&level.column)? else {
            return Ok(None);
        };
        let column = self.column(index)?;
        if column.is_groupable() {
            return Ok(Some(SortSpec::new(index, level.order)));
        }
        if self.config.strict {
            return Err(ListError::NotGroupable {
                column: column.name().to_string(),
            });
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::config::ListConfig;

    #[derive(Debug, Clone)]
    struct Track {
        id: u32,
        artist: &'static str,
        title: &'static str,
    }

    impl Model for Track {
        type Key = u32;
        fn key(&self) -> u32 {
            self.id
        }
    }

    fn columns() -> Vec<Column<Track>> {
        vec![
            Column::new("artist", |t: &Track| t.artist),
            Column::new("title", |t: &Track| t.title),
            Column::new("id", |t: &Track| t.id).groupable(false),
        ]
    }

    fn list(strict: bool) -> ObjectList<Track> {
        let mut list = ObjectList::new(columns(), ListConfig::default().with_strict(strict));
        list.set_objects(
            vec![
                Track { id: 1, artist: "b", title: "x" },
                Track { id: 2, artist: "a", title: "y" },
            ],
            false,
        )
        .unwrap();
        list
    }

    #[test]
    fn test_save_state_names_columns() {
        let mut list = list(false);
        list.group_by(0, SortOrder::Descending).unwrap();
        list.sort_by(1, SortOrder::Ascending).unwrap();
        list.set_column_width(2, 40).unwrap();

        let state = list.save_state();
        assert_eq!(state.version, STATE_VERSION);
        assert_eq!(
            state.group_by,
            Some(SortState {
                column: "artist".into(),
                order: SortOrder::Descending
            })
        );
        assert_eq!(state.primary_sort.as_ref().map(|s| s.column.as_str()), Some("title"));
        assert_eq!(state.columns[2].width, 40);
    }

    #[test]
    fn test_restore_round_trip_through_json() {
        let mut source = list(false);
        source.group_by(0, SortOrder::Ascending).unwrap();
        source.set_secondary_sort(Some(SortSpec::descending(1))).unwrap();
        source.set_column_visible(1, false).unwrap();
        let json = serde_json::to_string(&source.save_state()).unwrap();

        let mut target = list(false);
        target.restore_state(&serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(target.parameters(), source.parameters());
        assert!(!target.columns()[1].is_visible());
        assert!(target.projection().is_grouped());
    }

    #[test]
    fn test_unknown_names_skipped_when_lenient() {
        let mut list = list(false);
        let state = ListState {
            primary_sort: Some(SortState {
                column: "gone".into(),
                order: SortOrder::Ascending,
            }),
            group_by: Some(SortState {
                column: "id".into(),
                order: SortOrder::Ascending,
            }),
            columns: vec![ColumnState {
                name: "gone".into(),
                width: 1,
                visible: false,
            }],
            ..ListState::default()
        };
        list.restore_state(&state).unwrap();
        assert_eq!(list.parameters().primary_sort, None);
        assert_eq!(list.parameters().group_by, None);
    }

    #[test]
    fn test_unknown_names_rejected_when_strict() {
        let mut list = list(true);
        list.sort_by(0, SortOrder::Ascending).unwrap();
        let state = ListState {
            primary_sort: Some(SortState {
                column: "gone".into(),
                order: SortOrder::Descending,
            }),
            ..ListState::default()
        };
        assert_eq!(
            list.restore_state(&state),
            Err(ListError::UnknownColumnName { name: "gone".into() })
        );
        assert_eq!(list.parameters().primary_sort, Some(SortSpec::ascending(0)));

        let state = ListState {
            group_by: Some(SortState {
                column: "id".into(),
                order: SortOrder::Ascending,
            }),
            ..ListState::default()
        };
        assert_eq!(
            list.restore_state(&state),
            Err(ListError::NotGroupable { column: "id".into() })
        );
    }

    #[test]
    fn test_partial_state_from_toml() {
        let state: ListState = toml::from_str(
            r#"
            show_groups = false

            [primary_sort]
            column = "title"
            order = "Descending"
            "#,
        )
        .unwrap();
        assert_eq!(state.version, STATE_VERSION);

        let mut list = list(false);
        list.restore_state(&state).unwrap();
        assert_eq!(list.parameters().primary_sort, Some(SortSpec::descending(1)));
        assert!(!list.parameters().show_groups);
        assert_eq!(list.projection().keys().copied().collect::<Vec<_>>(), vec![2, 1]);
    }
}
