//! The object list: rebuild orchestration and the public surface.
//!
//! [`ObjectList`] owns the backing collection, the columns, the transform
//! parameters, the identity map, the selection and the current
//! [`Projection`]. Every change funnels into one of two paths:
//!
//! - a **rebuild** runs filter, then sort or group, then restores selection,
//!   focus and scroll offset onto the new rows
//! - a **patch** edits the existing projection directly when no sort, group
//!   or filter is active (see [`add_objects`](ObjectList::add_objects))
//!
//! A rebuild either commits a complete projection or fails and leaves the
//! previous one in place. Parameter setters are transactional on top of
//! that: when the rebuild they trigger fails, the parameter change is rolled
//! back too.
//!
//! # Example
//!
//! ```
//! use horizon_objectlist::{Column, ListConfig, Model, ObjectList, SortOrder};
//!
//! #[derive(Debug, Clone)]
//! struct Person {
//!     id: u32,
//!     name: String,
//! }
//!
//! impl Model for Person {
//!     type Key = u32;
//!     fn key(&self) -> u32 {
//!         self.id
//!     }
//! }
//!
//! let mut list = ObjectList::new(
//!     vec![Column::new("name", |p: &Person| p.name.clone())],
//!     ListConfig::default(),
//! );
//! list.set_objects(
//!     vec![
//!         Person { id: 1, name: "b".into() },
//!         Person { id: 2, name: "a".into() },
//!     ],
//!     false,
//! )
//! .unwrap();
//! list.sort_by(0, SortOrder::Ascending).unwrap();
//!
//! let order: Vec<u32> = list.projection().keys().copied().collect();
//! assert_eq!(order, vec![2, 1]);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use horizon_objectlist_core::logging::{PerfSpan, span_names, targets};
use horizon_objectlist_core::{OwnerQueue, QueuePoster, Signal, ThreadAffinity, owner_queue};
use serde::{Deserialize, Serialize};

use crate::batch::BatchState;
use crate::column::Column;
use crate::config::ListConfig;
use crate::dispatch::Mutation;
use crate::error::{ListError, Result};
use crate::filter::{ListFilter, ModelFilter, filter_indices};
use crate::group::{Group, GroupResolution, GroupingParameters, build_groups, resolve_group_request};
use crate::identity::{CheckState, IdentityMap};
use crate::model::Model;
use crate::projection::{Projection, Row};
use crate::selection::{SelectionFlags, SelectionModel};
use crate::sort::{SortLevel, SortOrder, SortSpec, sort_rows};
use crate::value::Value;

/// Upper bound on back-to-back rebuilds triggered by invalidation requests
/// that arrive while a rebuild is running.
const MAX_COALESCED_PASSES: usize = 8;

/// Sort and group parameters as plain data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformParameters {
    /// Primary sort.
    pub primary_sort: Option<SortSpec>,
    /// Tie-break sort.
    pub secondary_sort: Option<SortSpec>,
    /// Group-by column and the direction groups are ordered in.
    pub group_by: Option<SortSpec>,
    /// Whether grouping is shown at all.
    pub show_groups: bool,
}

impl Default for TransformParameters {
    fn default() -> Self {
        Self {
            primary_sort: None,
            secondary_sort: None,
            group_by: None,
            show_groups: true,
        }
    }
}

impl TransformParameters {
    /// Whether the projection is grouped under these parameters.
    pub fn is_grouping(&self) -> bool {
        self.show_groups && self.group_by.is_some()
    }
}

/// The filters currently installed.
pub(crate) struct Filters<M> {
    pub(crate) model: Option<Arc<dyn ModelFilter<M>>>,
    pub(crate) list: Option<Arc<dyn ListFilter<M>>>,
    pub(crate) additional: Option<Arc<dyn ModelFilter<M>>>,
    pub(crate) columns: BTreeMap<usize, Arc<dyn ModelFilter<M>>>,
}

impl<M> Default for Filters<M> {
    fn default() -> Self {
        Self {
            model: None,
            list: None,
            additional: None,
            columns: BTreeMap::new(),
        }
    }
}

impl<M> Clone for Filters<M> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            list: self.list.clone(),
            additional: self.additional.clone(),
            columns: self.columns.clone(),
        }
    }
}

impl<M> Filters<M> {
    fn is_empty(&self) -> bool {
        self.model.is_none()
            && self.list.is_none()
            && self.additional.is_none()
            && self.columns.is_empty()
    }
}

/// Rebuild state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebuildState {
    /// No rebuild is running.
    #[default]
    Idle,
    /// A rebuild is running; further requests are coalesced.
    Rebuilding,
}

/// Payload of [`ObjectList::projection_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionChanged {
    /// Rows in the projection.
    pub rows: usize,
    /// Groups in the projection (zero when flat).
    pub groups: usize,
    /// Whether a full rebuild happened (as opposed to only patches).
    pub rebuilt: bool,
}

/// Projects a collection of models into ordered, optionally grouped rows.
pub struct ObjectList<M: Model> {
    pub(crate) config: ListConfig,
    pub(crate) columns: Vec<Column<M>>,
    pub(crate) objects: Vec<M>,
    pub(crate) sources: HashMap<M::Key, usize>,
    pub(crate) params: TransformParameters,
    pub(crate) filters: Filters<M>,
    pub(crate) identity: IdentityMap<M::Key>,
    pub(crate) selection: SelectionModel<M::Key>,
    pub(crate) projection: Projection<M::Key>,
    pub(crate) state: RebuildState,
    pub(crate) batch: BatchState<M::Key>,
    pub(crate) affinity: ThreadAffinity,
    pub(crate) inbox: Option<OwnerQueue<Mutation<M>>>,
    pub(crate) poster: QueuePoster<Mutation<M>>,
    pub(crate) invalidated: Arc<AtomicBool>,

    /// Emitted after every committed rebuild or patch (once per batch).
    pub projection_changed: Signal<ProjectionChanged>,

    /// Emitted with the models whose check state changed and their new
    /// state.
    pub check_state_changed: Signal<Vec<(M::Key, CheckState)>>,
}

impl<M: Model> fmt::Debug for ObjectList<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectList")
            .field("objects", &self.objects.len())
            .field("rows", &self.projection.len())
            .field("columns", &self.columns)
            .field("params", &self.params)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<M: Model> ObjectList<M> {
    /// Creates an empty list bound to the calling thread.
    pub fn new(columns: Vec<Column<M>>, config: ListConfig) -> Self {
        let (poster, inbox) = owner_queue();
        Self {
            selection: SelectionModel::new(config.selection_mode),
            config,
            columns,
            objects: Vec::new(),
            sources: HashMap::new(),
            params: TransformParameters::default(),
            filters: Filters::default(),
            identity: IdentityMap::new(),
            projection: Projection::default(),
            state: RebuildState::Idle,
            batch: BatchState::default(),
            affinity: ThreadAffinity::current(),
            inbox: Some(inbox),
            poster,
            invalidated: Arc::new(AtomicBool::new(false)),
            projection_changed: Signal::new(),
            check_state_changed: Signal::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The configuration.
    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    /// The columns.
    pub fn columns(&self) -> &[Column<M>] {
        &self.columns
    }

    /// A column by index.
    pub fn column(&self, index: usize) -> Result<&Column<M>> {
        self.columns
            .get(index)
            .ok_or(ListError::UnknownColumn { index })
    }

    /// Index of the column with the given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name() == name)
    }

    /// The backing collection, in insertion order.
    pub fn objects(&self) -> &[M] {
        &self.objects
    }

    /// The model with the given key.
    pub fn object(&self, key: &M::Key) -> Option<&M> {
        self.sources.get(key).map(|&index| &self.objects[index])
    }

    /// The current projection.
    pub fn projection(&self) -> &Projection<M::Key> {
        &self.projection
    }

    /// The current sort and group parameters.
    pub fn parameters(&self) -> &TransformParameters {
        &self.params
    }

    /// Where the rebuild state machine currently is.
    pub fn rebuild_state(&self) -> RebuildState {
        self.state
    }

    /// Number of rows in the projection.
    pub fn len(&self) -> usize {
        self.projection.len()
    }

    /// Returns `true` if the projection has no rows.
    pub fn is_empty(&self) -> bool {
        self.projection.is_empty()
    }

    /// The model displayed at a display index.
    pub fn model_at(&self, display_index: usize) -> Option<&M> {
        self.projection
            .row_at(display_index)
            .and_then(|row| self.objects.get(row.source_index()))
    }

    /// Display index of a model.
    pub fn index_of(&self, model: &M) -> Option<usize> {
        self.projection.index_of(&model.key())
    }

    /// The row displaying the model with the given key.
    pub fn row_for(&self, key: &M::Key) -> Option<&Row<M::Key>> {
        self.projection.row_for(key)
    }

    /// Models that survived filtering, in display order.
    pub fn filtered_objects(&self) -> impl Iterator<Item = &M> {
        self.projection
            .rows()
            .iter()
            .filter_map(|row| self.objects.get(row.source_index()))
    }

    // =========================================================================
    // Rebuild orchestration
    // =========================================================================

    /// Rebuilds the projection from the backing collection.
    ///
    /// With `preserve_state`, the selection, focus and scroll offset are
    /// re-applied to the new rows by model identity; otherwise they are
    /// cleared. Inside a batch the rebuild is deferred to the end of the
    /// batch.
    pub fn rebuild(&mut self, preserve_state: bool) -> Result<()> {
        if self.is_foreign_thread() {
            return self.forward(Mutation::Rebuild { preserve_state });
        }
        self.request_rebuild(preserve_state)
    }

    pub(crate) fn request_rebuild(&mut self, preserve_state: bool) -> Result<()> {
        if self.batch.depth > 0 {
            self.batch.defer_rebuild(preserve_state);
            return Ok(());
        }
        self.run_rebuilds(preserve_state)
    }

    /// Runs a rebuild, then one more for as long as invalidation requests
    /// arrived while the previous pass was running.
    pub(crate) fn run_rebuilds(&mut self, preserve_state: bool) -> Result<()> {
        // Slots cannot borrow the list, so a pass is only ever re-requested
        // through the invalidation flag.
        self.state = RebuildState::Rebuilding;
        self.invalidated.store(false, Ordering::Release);
        let mut result = self.rebuild_once(preserve_state);

        let mut passes = 1;
        while result.is_ok() && self.invalidated.swap(false, Ordering::AcqRel) {
            if passes == MAX_COALESCED_PASSES {
                tracing::warn!(target: targets::REBUILD, passes, "rebuild keeps being invalidated, giving up");
                break;
            }
            tracing::trace!(target: targets::REBUILD, passes, "coalesced rebuild request");
            result = self.rebuild_once(true);
            passes += 1;
        }

        self.state = RebuildState::Idle;
        result
    }

    fn rebuild_once(&mut self, preserve_state: bool) -> Result<()> {
        let _span = PerfSpan::new(span_names::REBUILD);
        let snapshot = preserve_state.then(|| self.selection.snapshot());

        let projection = self.build_projection().inspect_err(|error| {
            tracing::warn!(target: targets::REBUILD, %error, "rebuild failed, keeping previous projection");
        })?;
        self.projection = projection;

        match snapshot {
            Some(snapshot) => {
                let projection = &self.projection;
                let identity = &self.identity;
                // Disabled rows may hold focus but never selection.
                self.selection.restore_filtered(
                    snapshot,
                    |key| projection.contains(key),
                    |key| identity.is_enabled(key),
                    projection.len(),
                );
            }
            None => self.selection.clear(),
        }

        tracing::debug!(
            target: targets::REBUILD,
            models = self.objects.len(),
            rows = self.projection.len(),
            groups = self.projection.groups().len(),
            "rebuilt projection"
        );
        self.notify_projection(true);
        Ok(())
    }

    fn build_projection(&self) -> Result<Projection<M::Key>> {
        let strict = self.config.strict;
        let survivors = {
            let _span = PerfSpan::new(span_names::FILTER);
            self.filtered_indices()
        };

        if let Some(group_by) = self.params.group_by.filter(|_| self.params.show_groups) {
            let _span = PerfSpan::new(span_names::GROUP);
            let titles = self.config.group_titles();
            let (primary, secondary) = self.group_sort_levels()?;
            let groups = build_groups(
                &self.objects,
                &survivors,
                &GroupingParameters {
                    group_by: self.column(group_by.column)?,
                    group_order: group_by.order,
                    primary,
                    secondary,
                    titles: &titles,
                    strict,
                },
            )?;

            let mut grouped = Vec::with_capacity(groups.len());
            for group in groups {
                let rows = group
                    .items()
                    .iter()
                    .map(|&source| self.make_row(source))
                    .collect::<Result<Vec<_>>>()?;
                grouped.push(Group::new(group.key().clone(), group.title(), rows));
            }
            return Ok(Projection::grouped(grouped));
        }

        let mut order = survivors;
        if let Some(primary) = self.sort_level(self.params.primary_sort)? {
            let _span = PerfSpan::new(span_names::SORT);
            let secondary = self.sort_level(self.params.secondary_sort)?;
            sort_rows(&self.objects, &mut order, primary, secondary, strict)?;
        }
        let rows = order
            .into_iter()
            .map(|source| self.make_row(source))
            .collect::<Result<Vec<_>>>()?;
        Ok(Projection::flat(rows))
    }

    fn filtered_indices(&self) -> Vec<usize> {
        if !self.config.use_filtering {
            return (0..self.objects.len()).collect();
        }

        let mut model_filters: Vec<&dyn ModelFilter<M>> = Vec::new();
        for filter in self.filters.columns.values() {
            model_filters.push(&**filter);
        }
        if let Some(filter) = &self.filters.model {
            model_filters.push(&**filter);
        }
        if let Some(filter) = &self.filters.additional {
            model_filters.push(&**filter);
        }
        let combined = |model: &M| model_filters.iter().all(|filter| filter.matches(model));
        let model_filter: Option<&dyn ModelFilter<M>> =
            (!model_filters.is_empty()).then_some(&combined as &dyn ModelFilter<M>);

        filter_indices(&self.objects, self.filters.list.as_deref(), model_filter)
    }

    fn sort_level(&self, spec: Option<SortSpec>) -> Result<Option<SortLevel<'_, M>>> {
        let Some(spec) = spec else {
            return Ok(None);
        };
        let column = self.column(spec.column)?;
        if !column.is_sortable() {
            if self.config.strict {
                return Err(ListError::NotSortable {
                    column: column.name().to_string(),
                });
            }
            return Ok(None);
        }
        Ok(Some(SortLevel::new(column, spec.order)))
    }

    fn group_sort_levels(&self) -> Result<(Option<SortLevel<'_, M>>, Option<SortLevel<'_, M>>)> {
        let primary = if self.config.sort_groups_by_primary_column {
            let order = self.params.primary_sort.map_or(SortOrder::Ascending, |spec| spec.order);
            self.columns
                .get(self.config.primary_column)
                .map(|column| SortLevel::new(column, order))
        } else {
            self.sort_level(self.params.primary_sort)?
        };
        Ok((primary, self.sort_level(self.params.secondary_sort)?))
    }

    pub(crate) fn cells_for(&self, model: &M) -> Result<Vec<String>> {
        self.columns
            .iter()
            .map(|column| column.display_text(model, self.config.strict))
            .collect()
    }

    pub(crate) fn make_row(&self, source: usize) -> Result<Row<M::Key>> {
        let model = &self.objects[source];
        let key = model.key();
        Ok(Row {
            cells: self.cells_for(model)?,
            check_state: self.identity.check_state(&key),
            enabled: self.identity.is_enabled(&key),
            key,
            source_index: source,
            display_index: 0,
        })
    }

    pub(crate) fn notify_projection(&mut self, rebuilt: bool) {
        if self.batch.depth > 0 {
            self.batch.changed = true;
            self.batch.rebuilt |= rebuilt;
            return;
        }
        self.projection_changed.emit(ProjectionChanged {
            rows: self.projection.len(),
            groups: self.projection.groups().len(),
            rebuilt,
        });
    }

    /// Whether mutations can patch the projection instead of rebuilding.
    pub(crate) fn can_patch(&self) -> bool {
        self.params.primary_sort.is_none()
            && !self.params.is_grouping()
            && !(self.config.use_filtering && !self.filters.is_empty())
    }

    pub(crate) fn reindex(&mut self) {
        self.sources = self
            .objects
            .iter()
            .enumerate()
            .map(|(index, model)| (model.key(), index))
            .collect();
    }

    /// Refreshes the key lookup for models from `start` on.
    pub(crate) fn reindex_from(&mut self, start: usize) {
        for (index, model) in self.objects.iter().enumerate().skip(start) {
            self.sources.insert(model.key(), index);
        }
    }

    // =========================================================================
    // Transform parameters
    // =========================================================================

    /// Applies a parameter change and rebuilds. If the rebuild fails, the
    /// change is rolled back and the previous projection stays.
    pub(crate) fn reconfigure<F: FnOnce(&mut Self)>(&mut self, change: F) -> Result<()> {
        let previous = (self.params.clone(), self.filters.clone());
        change(self);
        match self.request_rebuild(true) {
            Ok(()) => Ok(()),
            Err(error) => {
                (self.params, self.filters) = previous;
                tracing::warn!(target: targets::REBUILD, %error, "parameter change rolled back");
                Err(error)
            }
        }
    }

    pub(crate) fn checked_sort(&self, spec: SortSpec) -> Result<Option<SortSpec>> {
        let column = self.column(spec.column)?;
        if column.is_sortable() {
            return Ok(Some(spec));
        }
        if self.config.strict {
            return Err(ListError::NotSortable {
                column: column.name().to_string(),
            });
        }
        tracing::debug!(target: targets::REBUILD, column = column.name(), "ignoring sort on non-sortable column");
        Ok(None)
    }

    /// Sorts by a column.
    ///
    /// Sorting by a non-sortable column is ignored, or an error in strict
    /// mode.
    pub fn sort_by(&mut self, column: usize, order: SortOrder) -> Result<()> {
        let spec = SortSpec::new(column, order);
        if self.is_foreign_thread() {
            return self.forward(Mutation::SortBy(spec));
        }
        match self.checked_sort(spec)? {
            Some(spec) => self.reconfigure(|list| list.params.primary_sort = Some(spec)),
            None => Ok(()),
        }
    }

    /// Sets or clears the tie-break sort.
    pub fn set_secondary_sort(&mut self, spec: Option<SortSpec>) -> Result<()> {
        if self.is_foreign_thread() {
            return self.forward(Mutation::SetSecondarySort(spec));
        }
        let spec = match spec {
            Some(spec) => match self.checked_sort(spec)? {
                Some(spec) => Some(spec),
                None => return Ok(()),
            },
            None => None,
        };
        self.reconfigure(|list| list.params.secondary_sort = spec)
    }

    /// Removes both sort levels.
    pub fn clear_sort(&mut self) -> Result<()> {
        if self.is_foreign_thread() {
            return self.forward(Mutation::ClearSort);
        }
        self.reconfigure(|list| {
            list.params.primary_sort = None;
            list.params.secondary_sort = None;
        })
    }

    /// Groups by a column.
    ///
    /// Requesting a non-groupable column keeps the previous grouping and
    /// promotes the column to primary sort instead (see
    /// [`GroupResolution::Fallback`]); strict mode rejects it.
    pub fn group_by(&mut self, column: usize, order: SortOrder) -> Result<()> {
        let requested = SortSpec::new(column, order);
        if self.is_foreign_thread() {
            return self.forward(Mutation::GroupBy(requested));
        }
        let resolution =
            resolve_group_request(&self.columns, requested, self.params.group_by, self.config.strict)?;
        match resolution {
            GroupResolution::GroupBy(spec) => self.reconfigure(|list| list.params.group_by = Some(spec)),
            GroupResolution::Fallback { group_by, sort } => self.reconfigure(|list| {
                list.params.group_by = group_by;
                if sort.is_some() {
                    list.params.primary_sort = sort;
                }
            }),
        }
    }

    /// Stops grouping.
    pub fn clear_group_by(&mut self) -> Result<()> {
        if self.is_foreign_thread() {
            return self.forward(Mutation::ClearGroupBy);
        }
        self.reconfigure(|list| list.params.group_by = None)
    }

    /// Shows or hides groups without forgetting the group-by column.
    pub fn set_show_groups(&mut self, show: bool) -> Result<()> {
        if self.is_foreign_thread() {
            return self.forward(Mutation::SetShowGroups(show));
        }
        if self.params.show_groups == show {
            return Ok(());
        }
        self.reconfigure(|list| list.params.show_groups = show)
    }

    pub(crate) fn set_filter_slot(&mut self, slot: FilterSlot<M>) -> Result<()> {
        if self.is_foreign_thread() {
            return self.forward(Mutation::SetFilter(slot));
        }
        if let FilterSlot::Column(column, _) = &slot {
            self.column(*column)?;
        }
        self.reconfigure(|list| match slot {
            FilterSlot::Model(filter) => list.filters.model = filter,
            FilterSlot::List(filter) => list.filters.list = filter,
            FilterSlot::Additional(filter) => list.filters.additional = filter,
            FilterSlot::Column(column, Some(filter)) => {
                list.filters.columns.insert(column, filter);
            }
            FilterSlot::Column(column, None) => {
                list.filters.columns.remove(&column);
            }
            FilterSlot::ClearUser => {
                list.filters.model = None;
                list.filters.list = None;
                list.filters.columns.clear();
            }
        })
    }

    /// Installs the model filter.
    pub fn set_model_filter<F: ModelFilter<M> + 'static>(&mut self, filter: F) -> Result<()> {
        self.set_filter_slot(FilterSlot::Model(Some(Arc::new(filter))))
    }

    /// Removes the model filter.
    pub fn clear_model_filter(&mut self) -> Result<()> {
        self.set_filter_slot(FilterSlot::Model(None))
    }

    /// Installs the list filter, which runs before any model filter.
    pub fn set_list_filter<F: ListFilter<M> + 'static>(&mut self, filter: F) -> Result<()> {
        self.set_filter_slot(FilterSlot::List(Some(Arc::new(filter))))
    }

    /// Removes the list filter.
    pub fn clear_list_filter(&mut self) -> Result<()> {
        self.set_filter_slot(FilterSlot::List(None))
    }

    /// Installs the additional filter, which is ANDed with every other
    /// model filter and survives [`clear_filters`](Self::clear_filters).
    pub fn set_additional_filter<F: ModelFilter<M> + 'static>(&mut self, filter: F) -> Result<()> {
        self.set_filter_slot(FilterSlot::Additional(Some(Arc::new(filter))))
    }

    /// Removes the additional filter.
    pub fn clear_additional_filter(&mut self) -> Result<()> {
        self.set_filter_slot(FilterSlot::Additional(None))
    }

    /// Installs the filter of one column (for example a
    /// [`OneOfFilter`](crate::filter::OneOfFilter)), replacing any previous
    /// filter of that column.
    pub fn set_column_filter<F: ModelFilter<M> + 'static>(&mut self, column: usize, filter: F) -> Result<()> {
        self.set_filter_slot(FilterSlot::Column(column, Some(Arc::new(filter))))
    }

    /// Removes the filter of one column.
    pub fn clear_column_filter(&mut self, column: usize) -> Result<()> {
        self.set_filter_slot(FilterSlot::Column(column, None))
    }

    /// Removes the model filter, the list filter and every column filter.
    /// The additional filter stays.
    pub fn clear_filters(&mut self) -> Result<()> {
        self.set_filter_slot(FilterSlot::ClearUser)
    }

    /// Sets a column's width hint.
    pub fn set_column_width(&mut self, column: usize, width: u32) -> Result<()> {
        self.columns
            .get_mut(column)
            .ok_or(ListError::UnknownColumn { index: column })?
            .set_width(width);
        Ok(())
    }

    /// Sets a column's visibility hint.
    pub fn set_column_visible(&mut self, column: usize, visible: bool) -> Result<()> {
        self.columns
            .get_mut(column)
            .ok_or(ListError::UnknownColumn { index: column })?
            .set_visible(visible);
        Ok(())
    }

    // =========================================================================
    // Check state and enablement
    // =========================================================================

    /// Check state of a model.
    pub fn check_state(&self, key: &M::Key) -> CheckState {
        self.identity.check_state(key)
    }

    /// Whether a model is enabled.
    pub fn is_enabled(&self, key: &M::Key) -> bool {
        self.identity.is_enabled(key)
    }

    /// Sets the check state of a model. Returns `true` if it changed.
    ///
    /// Keys not in the backing collection are ignored.
    pub fn set_check_state(&mut self, key: &M::Key, state: CheckState) -> Result<bool> {
        if self.is_foreign_thread() {
            return self
                .forward(Mutation::SetCheckState(key.clone(), state))
                .map(|()| false);
        }
        if !self.is_present(key) {
            return Ok(false);
        }
        Ok(!self.apply_check_states(vec![(key.clone(), state)]).is_empty())
    }

    /// Checks a model.
    pub fn check(&mut self, key: &M::Key) -> Result<bool> {
        self.set_check_state(key, CheckState::Checked)
    }

    /// Unchecks a model.
    pub fn uncheck(&mut self, key: &M::Key) -> Result<bool> {
        self.set_check_state(key, CheckState::Unchecked)
    }

    /// Toggles a model's checkbox the way a user click does.
    ///
    /// If the model is selected and
    /// [`propagate_checks_to_selection`](ListConfig::propagate_checks_to_selection)
    /// is set, every enabled selected model takes the new state too.
    /// Returns the new state, or `None` if nothing was toggled here
    /// (disabled or unknown model, or the call was marshalled).
    pub fn toggle_check(&mut self, key: &M::Key) -> Result<Option<CheckState>> {
        if self.is_foreign_thread() {
            return self.forward(Mutation::ToggleCheck(key.clone())).map(|()| None);
        }
        if !self.is_present(key) || !self.identity.is_enabled(key) {
            return Ok(None);
        }

        let state = self
            .identity
            .check_state(key)
            .toggle(self.config.tri_state_checkboxes);
        let mut affected = vec![key.clone()];
        if self.config.propagate_checks_to_selection && self.selection.is_selected(key) {
            affected.extend(
                self.selection
                    .selected_keys()
                    .iter()
                    .filter(|&other| other != key && self.identity.is_enabled(other) && self.sources.contains_key(other))
                    .cloned(),
            );
        }

        self.apply_check_states(affected.into_iter().map(|target| (target, state)).collect());
        Ok(Some(state))
    }

    /// Checks every model in the backing collection.
    pub fn check_all(&mut self) -> Result<()> {
        self.set_all_check_states(CheckState::Checked)
    }

    /// Unchecks every model in the backing collection.
    pub fn uncheck_all(&mut self) -> Result<()> {
        self.set_all_check_states(CheckState::Unchecked)
    }

    pub(crate) fn set_all_check_states(&mut self, state: CheckState) -> Result<()> {
        if self.is_foreign_thread() {
            return self.forward(Mutation::SetAllCheckStates(state));
        }
        let changes = self.objects.iter().map(|model| (model.key(), state)).collect();
        self.apply_check_states(changes);
        Ok(())
    }

    /// Models whose check state is not unchecked, in collection order.
    pub fn checked_objects(&self) -> Vec<&M> {
        self.objects
            .iter()
            .filter(|model| self.identity.check_state(&model.key()).is_checked())
            .collect()
    }

    fn apply_check_states(&mut self, changes: Vec<(M::Key, CheckState)>) -> Vec<(M::Key, CheckState)> {
        let mut changed = Vec::new();
        for (key, state) in changes {
            if self.identity.set_check_state(key.clone(), state) {
                if let Some(row) = self.projection.row_mut(&key) {
                    row.check_state = state;
                }
                changed.push((key, state));
            }
        }
        if !changed.is_empty() {
            if self.batch.depth > 0 {
                self.batch.checks.extend(changed.iter().cloned());
            } else {
                self.check_state_changed.emit(changed.clone());
            }
        }
        changed
    }

    /// Enables or disables a model. Disabling deselects it. Returns `true`
    /// if the state changed.
    pub fn set_enabled(&mut self, key: &M::Key, enabled: bool) -> Result<bool> {
        if self.is_foreign_thread() {
            return self
                .forward(Mutation::SetEnabled(key.clone(), enabled))
                .map(|()| false);
        }
        if !self.is_present(key) || !self.identity.set_enabled(key.clone(), enabled) {
            return Ok(false);
        }
        if let Some(row) = self.projection.row_mut(key) {
            row.enabled = enabled;
        }
        if !enabled {
            self.selection.deselect(key);
        }
        Ok(true)
    }

    /// Enables a model.
    pub fn enable(&mut self, key: &M::Key) -> Result<bool> {
        self.set_enabled(key, true)
    }

    /// Disables a model.
    pub fn disable(&mut self, key: &M::Key) -> Result<bool> {
        self.set_enabled(key, false)
    }

    /// Enables every model.
    pub fn enable_all(&mut self) -> Result<()> {
        if self.is_foreign_thread() {
            return self.forward(Mutation::EnableAll);
        }
        let keys: Vec<M::Key> = self.identity.disabled_keys().cloned().collect();
        self.identity.set_all_enabled(keys.iter().cloned(), true);
        for key in &keys {
            if let Some(row) = self.projection.row_mut(key) {
                row.enabled = true;
            }
        }
        Ok(())
    }

    fn is_present(&self, key: &M::Key) -> bool {
        let present = self.sources.contains_key(key);
        if !present {
            tracing::debug!(target: targets::MUTATION, ?key, "ignoring stale model reference");
        }
        present
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Writes an edited value back into a model and refreshes its row.
    ///
    /// Returns `false` if the model is unknown, the column is not editable
    /// or the column's putter rejected the value.
    pub fn set_cell_value(&mut self, key: &M::Key, column: usize, value: Value) -> Result<bool> {
        if self.is_foreign_thread() {
            return self
                .forward(Mutation::SetCellValue {
                    key: key.clone(),
                    column,
                    value,
                })
                .map(|()| false);
        }
        self.column(column)?;
        let Some(&source) = self.sources.get(key) else {
            tracing::debug!(target: targets::MUTATION, ?key, "ignoring edit of stale model");
            return Ok(false);
        };

        if !self.columns[column].put_value(&mut self.objects[source], value) {
            return Ok(false);
        }

        if self.objects[source].key() != *key {
            // The edit changed the model's identity.
            self.reindex();
            self.request_rebuild(true)?;
        } else {
            self.refresh_sources(&[source])?;
        }
        Ok(true)
    }

    /// Re-reads changed models: patches their rows when possible, rebuilds
    /// otherwise.
    pub(crate) fn refresh_sources(&mut self, sources: &[usize]) -> Result<()> {
        if sources.is_empty() {
            return Ok(());
        }
        if !self.can_patch() {
            return self.request_rebuild(true);
        }
        self.patch_cells(sources)?;
        self.notify_projection(false);
        Ok(())
    }

    /// Re-reads the cells of rows in place without notifying.
    pub(crate) fn patch_cells(&mut self, sources: &[usize]) -> Result<()> {
        let refreshed = sources
            .iter()
            .map(|&source| -> Result<(M::Key, Vec<String>)> {
                let model = &self.objects[source];
                Ok((model.key(), self.cells_for(model)?))
            })
            .collect::<Result<Vec<_>>>()?;
        for (key, cells) in refreshed {
            if let Some(row) = self.projection.row_mut(&key) {
                row.cells = cells;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Collapses or expands the group with the given key. Returns `false`
    /// if there is no such group.
    ///
    /// Collapsed state belongs to the groups of the current projection; use
    /// [`carry_collapsed`](crate::group::carry_collapsed) to carry it across
    /// rebuilds.
    pub fn set_group_collapsed(&mut self, key: &Value, collapsed: bool) -> bool {
        match self.projection.group_mut(key) {
            Some(group) => {
                group.set_collapsed(collapsed);
                true
            }
            None => false,
        }
    }

    /// Flips the collapsed state of a group, returning the new state.
    pub fn toggle_group_collapsed(&mut self, key: &Value) -> Option<bool> {
        let group = self.projection.group_mut(key)?;
        let collapsed = !group.is_collapsed();
        group.set_collapsed(collapsed);
        Some(collapsed)
    }

    /// Collapses every group.
    pub fn collapse_all(&mut self) {
        for group in self.projection.groups_mut() {
            group.set_collapsed(true);
        }
    }

    /// Expands every group.
    pub fn expand_all(&mut self) {
        for group in self.projection.groups_mut() {
            group.set_collapsed(false);
        }
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// The selection model.
    pub fn selection(&self) -> &SelectionModel<M::Key> {
        &self.selection
    }

    /// Emitted with (selected, deselected) keys.
    pub fn selection_changed(&self) -> &Signal<(Vec<M::Key>, Vec<M::Key>)> {
        &self.selection.selection_changed
    }

    /// Applies a selection operation. Keys that are not displayed or are
    /// disabled are skipped.
    pub fn select<I>(&mut self, keys: I, flags: SelectionFlags)
    where
        I: IntoIterator<Item = M::Key>,
    {
        let projection = &self.projection;
        let identity = &self.identity;
        let keys: Vec<M::Key> = keys
            .into_iter()
            .filter(|key| projection.contains(key) && identity.is_enabled(key))
            .collect();
        self.selection.select_many(keys, flags);
    }

    /// Selects every enabled displayed model.
    pub fn select_all(&mut self) {
        let keys: Vec<M::Key> = self.projection.keys().cloned().collect();
        self.select(keys, SelectionFlags::SELECT);
    }

    /// Clears the selection.
    pub fn deselect_all(&mut self) {
        self.selection.clear_selection();
    }

    /// Moves focus to a displayed model, or clears it.
    pub fn set_focus(&mut self, key: Option<M::Key>) {
        let key = key.filter(|key| self.projection.contains(key));
        self.selection.set_focus(key, SelectionFlags::NONE);
    }

    /// Sets the scroll offset (index of the first visible row).
    pub fn set_top_index(&mut self, top_index: usize) {
        self.selection.set_top_index(top_index);
    }

    /// Selected models in selection order.
    pub fn selected_objects(&self) -> Vec<&M> {
        self.selection
            .selected_keys()
            .iter()
            .filter_map(|key| self.object(key))
            .collect()
    }

    /// The focused model.
    pub fn focused_object(&self) -> Option<&M> {
        self.selection.focus().and_then(|key| self.object(key))
    }
}

/// A filter change, as carried by [`Mutation::SetFilter`].
pub enum FilterSlot<M> {
    /// Replace the model filter.
    Model(Option<Arc<dyn ModelFilter<M>>>),
    /// Replace the list filter.
    List(Option<Arc<dyn ListFilter<M>>>),
    /// Replace the additional filter.
    Additional(Option<Arc<dyn ModelFilter<M>>>),
    /// Replace one column's filter.
    Column(usize, Option<Arc<dyn ModelFilter<M>>>),
    /// Remove the model, list and column filters.
    ClearUser,
}

impl<M> fmt::Debug for FilterSlot<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSlot::Model(filter) => write!(f, "Model(set: {})", filter.is_some()),
            FilterSlot::List(filter) => write!(f, "List(set: {})", filter.is_some()),
            FilterSlot::Additional(filter) => write!(f, "Additional(set: {})", filter.is_some()),
            FilterSlot::Column(column, filter) => {
                write!(f, "Column({column}, set: {})", filter.is_some())
            }
            FilterSlot::ClearUser => f.write_str("ClearUser"),
        }
    }
}
