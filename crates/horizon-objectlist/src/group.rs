//! Grouping engine.
//!
//! Grouping partitions the surviving rows into buckets by a column's group
//! key, sorts the rows inside each bucket, titles each bucket and finally
//! orders the buckets themselves.
//!
//! Groups are rebuilt from scratch on every call. The only stable thing about
//! a group across rebuilds is its key, which is what [`carry_collapsed`]
//! matches on.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::{Deserialize, Serialize};

use crate::column::Column;
use crate::error::{ListError, Result};
use crate::sort::{SortLevel, SortOrder, SortSpec, sort_rows};
use crate::value::{Value, compare_text, compare_values};

/// An ordered bucket of items sharing a group key.
///
/// The engine produces `Group<usize>` (indices into the backing collection);
/// a [`Projection`](crate::Projection) exposes groups whose items are display
/// indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<T> {
    key: Value,
    title: String,
    items: Vec<T>,
    collapsed: bool,
}

impl<T> Group<T> {
    /// Creates an expanded group.
    pub fn new(key: Value, title: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            key,
            title: title.into(),
            items,
            collapsed: false,
        }
    }

    /// The group key shared by every item.
    pub fn key(&self) -> &Value {
        &self.key
    }

    /// The display title, including the item count suffix if enabled.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The items in display order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of items in the group.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Whether the group is collapsed.
    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Collapses or expands the group.
    pub fn set_collapsed(&mut self, collapsed: bool) {
        self.collapsed = collapsed;
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }

    pub(crate) fn set_title(&mut self, title: String) {
        self.title = title;
    }

    /// Converts the items, keeping key, title and collapsed state.
    pub fn map_items<U, F: FnMut(T) -> U>(self, f: F) -> Group<U> {
        Group {
            key: self.key,
            title: self.title,
            items: self.items.into_iter().map(f).collect(),
            collapsed: self.collapsed,
        }
    }
}

/// How group titles are built from keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTitleFormat {
    /// Append the item count to titles.
    pub show_item_count: bool,
    /// Title template for groups with several (or zero) items. `{title}`
    /// and `{n}` are substituted.
    pub plural: String,
    /// Title template for groups with exactly one item.
    pub singular: String,
    /// Title of the bucket holding models with no group key.
    pub null_title: String,
}

impl Default for GroupTitleFormat {
    fn default() -> Self {
        Self {
            show_item_count: true,
            plural: "{title} [{n} items]".to_string(),
            singular: "{title} [{n} item]".to_string(),
            null_title: "{null}".to_string(),
        }
    }
}

/// Computes a group's display title.
///
/// A column's group title converter wins; otherwise the key's natural
/// string form is used, with the null title standing in for empty keys.
pub fn group_title<M>(
    column: &Column<M>,
    key: &Value,
    count: usize,
    format: &GroupTitleFormat,
) -> String {
    let title = match column.group_title(key) {
        Some(title) => title,
        None if key.is_empty() => format.null_title.clone(),
        None => key.to_string(),
    };
    if !format.show_item_count {
        return title;
    }
    let template = if count == 1 {
        &format.singular
    } else {
        &format.plural
    };
    template
        .replace("{title}", &title)
        .replace("{n}", &count.to_string())
}

/// Everything [`build_groups`] needs.
#[derive(Debug)]
pub struct GroupingParameters<'a, M> {
    /// Column whose group key partitions the rows.
    pub group_by: &'a Column<M>,
    /// Direction the groups themselves are ordered in.
    pub group_order: SortOrder,
    /// Primary sort inside each group.
    pub primary: Option<SortLevel<'a, M>>,
    /// Tie-break sort inside each group.
    pub secondary: Option<SortLevel<'a, M>>,
    /// Title construction.
    pub titles: &'a GroupTitleFormat,
    /// Surface unresolved aspects as errors.
    pub strict: bool,
}

/// Partitions `rows` (indices into `models`) into ordered groups.
///
/// Every row lands in exactly one group. Models whose group key is missing
/// or null share one bucket. Rows inside a group keep their input order
/// unless a sort level is given.
pub fn build_groups<M>(
    models: &[M],
    rows: &[usize],
    params: &GroupingParameters<'_, M>,
) -> Result<Vec<Group<usize>>> {
    let mut groups: Vec<Group<usize>> = Vec::new();
    let mut slots: HashMap<Value, usize> = HashMap::new();

    for &row in rows {
        let mut key = params.group_by.group_key(&models[row], params.strict)?;
        if key.is_empty() {
            key = Value::Null;
        }
        match slots.entry(key) {
            Entry::Occupied(slot) => groups[*slot.get()].items.push(row),
            Entry::Vacant(slot) => {
                let group = Group::new(slot.key().clone(), String::new(), vec![row]);
                slot.insert(groups.len());
                groups.push(group);
            }
        }
    }

    let levels = match (params.primary, params.secondary) {
        (Some(primary), secondary) => Some((primary, secondary)),
        (None, Some(secondary)) => Some((secondary, None)),
        (None, None) => None,
    };

    for group in &mut groups {
        if let Some((primary, secondary)) = levels {
            sort_rows(models, &mut group.items, primary, secondary, params.strict)?;
        }
        group.title = group_title(params.group_by, &group.key, group.items.len(), params.titles);
    }

    groups.sort_by(|a, b| compare_groups(a, b, params.group_order));

    tracing::debug!(
        target: "horizon_objectlist::group",
        column = params.group_by.name(),
        rows = rows.len(),
        groups = groups.len(),
        "built groups"
    );
    Ok(groups)
}

/// Display order of two groups: by key, then by title.
pub(crate) fn compare_groups<T, U>(a: &Group<T>, b: &Group<U>, order: SortOrder) -> Ordering {
    order.apply(compare_values(&a.key, &b.key).then_with(|| compare_text(&a.title, &b.title)))
}

/// Outcome of a request to group by a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupResolution {
    /// Group by the requested column.
    GroupBy(SortSpec),
    /// The requested column is not groupable. Grouping stays on `group_by`
    /// (the previously active column, if any) and the requested column
    /// becomes the primary sort, unless it is not sortable either.
    Fallback {
        /// Group-by column that stays in effect.
        group_by: Option<SortSpec>,
        /// Sort promoted from the request.
        sort: Option<SortSpec>,
    },
}

/// Decides what a request to group by `requested` actually does.
///
/// In strict mode a non-groupable column is an error rather than a
/// fallback.
pub fn resolve_group_request<M>(
    columns: &[Column<M>],
    requested: SortSpec,
    current: Option<SortSpec>,
    strict: bool,
) -> Result<GroupResolution> {
    let column = columns
        .get(requested.column)
        .ok_or(ListError::UnknownColumn {
            index: requested.column,
        })?;

    if column.is_groupable() {
        return Ok(GroupResolution::GroupBy(requested));
    }
    if strict {
        return Err(ListError::NotGroupable {
            column: column.name().to_string(),
        });
    }

    tracing::debug!(
        target: "horizon_objectlist::group",
        column = column.name(),
        "column not groupable, keeping previous grouping and sorting by it instead"
    );
    Ok(GroupResolution::Fallback {
        group_by: current,
        sort: column.is_sortable().then_some(requested),
    })
}

/// Carries the collapsed flag from `previous` groups onto `next` groups
/// with equal keys. Returns the number of groups collapsed.
pub fn carry_collapsed<T, U>(previous: &[Group<T>], next: &mut [Group<U>]) -> usize {
    let collapsed: Vec<&Value> = previous
        .iter()
        .filter(|group| group.collapsed)
        .map(|group| &group.key)
        .collect();

    let mut carried = 0;
    for group in next.iter_mut() {
        if collapsed.contains(&&group.key) {
            group.collapsed = true;
            carried += 1;
        }
    }
    carried
}
