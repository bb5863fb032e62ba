//! Engine configuration.
//!
//! Everything that would otherwise be a process-wide default lives in a
//! [`ListConfig`] handed to [`ObjectList::new`](crate::ObjectList::new).
//! Missing fields fall back to their defaults when deserializing, so a host
//! can load a partial configuration from TOML or JSON.
//!
//! ```
//! use horizon_objectlist::{ListConfig, SelectionMode};
//!
//! let config = ListConfig::default()
//!     .with_strict(true)
//!     .with_selection_mode(SelectionMode::SingleSelection);
//! assert!(config.strict);
//! assert_eq!(config.null_group_title, "{null}");
//! ```

use serde::{Deserialize, Serialize};

use crate::group::GroupTitleFormat;
use crate::selection::SelectionMode;

/// Configuration of an [`ObjectList`](crate::ObjectList).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Surface unresolved aspects and non-sortable or non-groupable
    /// requests as errors instead of recovering.
    pub strict: bool,
    /// Append item counts to group titles.
    pub show_item_count_on_groups: bool,
    /// Group title template for several items.
    pub group_item_count_format: String,
    /// Group title template for exactly one item.
    pub group_item_count_singular_format: String,
    /// Title of the group of models without a group key.
    pub null_group_title: String,
    /// Sort rows inside groups by the primary column rather than by the
    /// current sort column.
    pub sort_groups_by_primary_column: bool,
    /// Index of the primary column.
    pub primary_column: usize,
    /// Selection behavior.
    pub selection_mode: SelectionMode,
    /// Let checkboxes cycle through the indeterminate state.
    pub tri_state_checkboxes: bool,
    /// Apply filters at all.
    pub use_filtering: bool,
    /// Marshal calls made off the owner thread instead of rejecting them.
    pub marshal_cross_thread: bool,
    /// Toggling a selected row's checkbox applies to every selected row.
    pub propagate_checks_to_selection: bool,
}

impl Default for ListConfig {
    fn default() -> Self {
        let titles = GroupTitleFormat::default();
        Self {
            strict: false,
            show_item_count_on_groups: titles.show_item_count,
            group_item_count_format: titles.plural,
            group_item_count_singular_format: titles.singular,
            null_group_title: titles.null_title,
            sort_groups_by_primary_column: true,
            primary_column: 0,
            selection_mode: SelectionMode::default(),
            tri_state_checkboxes: false,
            use_filtering: true,
            marshal_cross_thread: true,
            propagate_checks_to_selection: true,
        }
    }
}

impl ListConfig {
    /// Sets strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets whether group titles carry item counts.
    pub fn with_item_counts_on_groups(mut self, show: bool) -> Self {
        self.show_item_count_on_groups = show;
        self
    }

    /// Sets the plural and singular group title templates.
    pub fn with_group_title_formats(
        mut self,
        plural: impl Into<String>,
        singular: impl Into<String>,
    ) -> Self {
        self.group_item_count_format = plural.into();
        self.group_item_count_singular_format = singular.into();
        self
    }

    /// Sets the title of the null-key group.
    pub fn with_null_group_title(mut self, title: impl Into<String>) -> Self {
        self.null_group_title = title.into();
        self
    }

    /// Sets whether rows inside groups sort by the primary column.
    pub fn with_sort_groups_by_primary_column(mut self, enabled: bool) -> Self {
        self.sort_groups_by_primary_column = enabled;
        self
    }

    /// Sets the primary column index.
    pub fn with_primary_column(mut self, column: usize) -> Self {
        self.primary_column = column;
        self
    }

    /// Sets the selection mode.
    pub fn with_selection_mode(mut self, mode: SelectionMode) -> Self {
        self.selection_mode = mode;
        self
    }

    /// Enables tri-state checkboxes.
    pub fn with_tri_state_checkboxes(mut self, enabled: bool) -> Self {
        self.tri_state_checkboxes = enabled;
        self
    }

    /// Enables or disables filtering.
    pub fn with_filtering(mut self, enabled: bool) -> Self {
        self.use_filtering = enabled;
        self
    }

    /// Sets whether off-thread calls are marshalled.
    pub fn with_cross_thread_marshalling(mut self, enabled: bool) -> Self {
        self.marshal_cross_thread = enabled;
        self
    }

    /// Sets whether checkbox toggles propagate to the selection.
    pub fn with_check_propagation(mut self, enabled: bool) -> Self {
        self.propagate_checks_to_selection = enabled;
        self
    }

    /// The group title settings as used by the grouping engine.
    pub fn group_titles(&self) -> GroupTitleFormat {
        GroupTitleFormat {
            show_item_count: self.show_item_count_on_groups,
            plural: self.group_item_count_format.clone(),
            singular: self.group_item_count_singular_format.clone(),
            null_title: self.null_group_title.clone(),
        }
    }
}

static_assertions::assert_impl_all!(ListConfig: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ListConfig::default();
        assert!(!config.strict);
        assert!(config.use_filtering);
        assert!(config.marshal_cross_thread);
        assert_eq!(config.group_item_count_format, "{title} [{n} items]");
        assert_eq!(config.group_item_count_singular_format, "{title} [{n} item]");
        assert_eq!(config.selection_mode, SelectionMode::ExtendedSelection);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ListConfig =
            serde_json::from_str(r#"{ "strict": true, "primary_column": 2 }"#).unwrap();
        assert!(config.strict);
        assert_eq!(config.primary_column, 2);
        assert!(config.sort_groups_by_primary_column);
    }

    #[test]
    fn test_group_titles() {
        let config = ListConfig::default()
            .with_item_counts_on_groups(false)
            .with_null_group_title("(none)");
        let titles = config.group_titles();
        assert!(!titles.show_item_count);
        assert_eq!(titles.null_title, "(none)");
    }
}
