//! Collection mutations.
//!
//! Each mutation edits the backing collection, then either patches the
//! projection in place or falls back to a state-preserving rebuild. Patching
//! is only possible while the projection is the collection in insertion
//! order (no sort, no grouping, no active filter), so both paths leave the
//! projection equal to what a full rebuild would produce. Removal is the
//! exception: dropping rows never reorders the survivors, so it patches
//! sorted and grouped projections too.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use horizon_objectlist_core::logging::targets;

use crate::dispatch::Mutation;
use crate::error::Result;
use crate::group::{compare_groups, group_title};
use crate::list::ObjectList;
use crate::model::Model;

impl<M: Model> ObjectList<M> {
    /// Replaces the backing collection.
    ///
    /// Check state and enablement are kept for models that are still
    /// present. With `preserve_state` the selection, focus and scroll offset
    /// are re-applied to the new rows as well.
    pub fn set_objects<I>(&mut self, objects: I, preserve_state: bool) -> Result<()>
    where
        I: IntoIterator<Item = M>,
    {
        let objects: Vec<M> = objects.into_iter().collect();
        if self.is_foreign_thread() {
            return self.forward(Mutation::SetObjects {
                objects,
                preserve_state,
            });
        }
        self.validate(&objects)?;

        self.objects.clear();
        self.sources.clear();
        self.absorb(objects);

        let sources = &self.sources;
        self.identity.retain(|key| sources.contains_key(key));
        tracing::debug!(target: targets::MUTATION, models = self.objects.len(), "replaced collection");
        self.request_rebuild(preserve_state)
    }

    /// Appends models. A model whose key is already present replaces the
    /// existing one in place.
    pub fn add_objects<I>(&mut self, objects: I) -> Result<()>
    where
        I: IntoIterator<Item = M>,
    {
        let objects: Vec<M> = objects.into_iter().collect();
        if objects.is_empty() {
            return Ok(());
        }
        if self.is_foreign_thread() {
            return self.forward(Mutation::Add(objects));
        }
        self.validate(&objects)?;

        let start = self.objects.len();
        let replaced = self.absorb(objects);
        tracing::debug!(
            target: targets::MUTATION,
            added = self.objects.len() - start,
            replaced = replaced.len(),
            "added models"
        );

        if !self.can_patch() {
            return self.request_rebuild(true);
        }
        let rows = (start..self.objects.len())
            .map(|source| self.make_row(source))
            .collect::<Result<Vec<_>>>()?;
        self.projection.insert_rows(self.projection.len(), rows);
        self.patch_cells(&replaced)?;
        self.notify_projection(false);
        Ok(())
    }

    /// Inserts models at a collection position (clamped to the end). A
    /// model whose key is already present replaces the existing one in
    /// place instead.
    pub fn insert_objects<I>(&mut self, index: usize, objects: I) -> Result<()>
    where
        I: IntoIterator<Item = M>,
    {
        let objects: Vec<M> = objects.into_iter().collect();
        if objects.is_empty() {
            return Ok(());
        }
        if self.is_foreign_thread() {
            return self.forward(Mutation::Insert { index, objects });
        }
        self.validate(&objects)?;

        let mut fresh: Vec<M> = Vec::with_capacity(objects.len());
        let mut replaced = Vec::new();
        let mut positions = HashMap::new();
        for model in objects {
            let key = model.key();
            if let Some(&source) = self.sources.get(&key) {
                self.objects[source] = model;
                replaced.push(source);
            } else if let Some(&position) = positions.get(&key) {
                fresh[position] = model;
            } else {
                positions.insert(key, fresh.len());
                fresh.push(model);
            }
        }

        let at = index.min(self.objects.len());
        let count = fresh.len();
        self.objects.splice(at..at, fresh);
        self.reindex_from(at);
        self.projection.shift_sources(at, count);
        let replaced: Vec<usize> = replaced
            .into_iter()
            .map(|source| if source >= at { source + count } else { source })
            .collect();
        tracing::debug!(target: targets::MUTATION, at, inserted = count, "inserted models");

        if !self.can_patch() {
            return self.request_rebuild(true);
        }
        let rows = (at..at + count)
            .map(|source| self.make_row(source))
            .collect::<Result<Vec<_>>>()?;
        // Without sort, grouping or filtering, collection and display
        // positions coincide.
        self.projection.insert_rows(at, rows);
        self.patch_cells(&replaced)?;
        self.notify_projection(false);
        Ok(())
    }

    /// Removes models by key. Keys that are not present are ignored.
    ///
    /// Removed models lose their check state and enablement and are dropped
    /// from the selection.
    pub fn remove_objects<I>(&mut self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = M::Key>,
    {
        let keys: Vec<M::Key> = keys.into_iter().collect();
        if self.is_foreign_thread() {
            return self.forward(Mutation::Remove(keys));
        }

        let doomed: HashSet<M::Key> = keys
            .into_iter()
            .filter(|key| {
                let present = self.sources.contains_key(key);
                if !present {
                    tracing::debug!(target: targets::MUTATION, ?key, "ignoring removal of absent model");
                }
                present
            })
            .collect();
        if doomed.is_empty() {
            return Ok(());
        }

        let mut remap = Vec::with_capacity(self.objects.len());
        let mut next = 0;
        for model in &self.objects {
            if doomed.contains(&model.key()) {
                remap.push(None);
            } else {
                remap.push(Some(next));
                next += 1;
            }
        }
        self.objects.retain(|model| !doomed.contains(&model.key()));
        self.reindex();
        self.identity.retain(|key| !doomed.contains(key));
        self.selection.retain(|key| !doomed.contains(key));
        self.projection
            .remove_rows(|key| doomed.contains(key), |source| remap.get(source).copied().flatten());
        tracing::debug!(target: targets::MUTATION, removed = doomed.len(), "removed models");

        if self.projection.is_grouped() && !self.retitle_groups()? {
            return self.request_rebuild(true);
        }
        self.notify_projection(false);
        Ok(())
    }

    /// Recomputes group titles after group sizes changed. Returns whether
    /// the groups are still in display order, which a title tie-break can
    /// upset.
    fn retitle_groups(&mut self) -> Result<bool> {
        let Some(group_by) = self.params.group_by else {
            return Ok(true);
        };
        let column = self.column(group_by.column)?;
        let format = self.config.group_titles();
        let titles: Vec<String> = self
            .projection
            .groups()
            .iter()
            .map(|group| group_title(column, group.key(), group.item_count(), &format))
            .collect();

        let groups = self.projection.groups_mut();
        for (group, title) in groups.iter_mut().zip(titles) {
            group.set_title(title);
        }
        Ok(groups
            .windows(2)
            .all(|pair| compare_groups(&pair[0], &pair[1], group_by.order) != Ordering::Greater))
    }

    /// Replaces models with fresh copies that have the same keys. Models
    /// that are not present are ignored.
    pub fn update_objects<I>(&mut self, objects: I) -> Result<()>
    where
        I: IntoIterator<Item = M>,
    {
        let objects: Vec<M> = objects.into_iter().collect();
        if self.is_foreign_thread() {
            return self.forward(Mutation::Update(objects));
        }
        self.validate(&objects)?;

        let mut updated = Vec::new();
        for model in objects {
            match self.sources.get(&model.key()) {
                Some(&source) => {
                    self.objects[source] = model;
                    updated.push(source);
                }
                None => {
                    tracing::debug!(target: targets::MUTATION, key = ?model.key(), "ignoring update of absent model");
                }
            }
        }
        self.refresh_sources(&updated)
    }

    /// Re-reads models that changed in place (for example through interior
    /// mutability) and refreshes their rows.
    pub fn refresh_objects<I>(&mut self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = M::Key>,
    {
        let keys: Vec<M::Key> = keys.into_iter().collect();
        if self.is_foreign_thread() {
            return self.forward(Mutation::Invoke(Box::new(move |list: &mut ObjectList<M>| list.refresh_objects(keys))));
        }
        let sources: Vec<usize> = keys
            .iter()
            .filter_map(|key| self.sources.get(key).copied())
            .collect();
        self.refresh_sources(&sources)
    }

    /// Appends new models and replaces models whose key is already present.
    /// Returns the source indices of the replaced models.
    fn absorb(&mut self, objects: Vec<M>) -> Vec<usize> {
        let mut replaced = Vec::new();
        for model in objects {
            let key = model.key();
            match self.sources.get(&key) {
                Some(&source) => {
                    self.objects[source] = model;
                    replaced.push(source);
                }
                None => {
                    self.sources.insert(key, self.objects.len());
                    self.objects.push(model);
                }
            }
        }
        replaced
    }

    /// In strict mode, checks that every column resolves on the incoming
    /// models before anything is changed.
    fn validate(&self, objects: &[M]) -> Result<()> {
        if !self.config.strict {
            return Ok(());
        }
        let group_column = self
            .params
            .group_by
            .filter(|_| self.params.show_groups)
            .map(|spec| self.column(spec.column))
            .transpose()?;
        for model in objects {
            for column in &self.columns {
                column.value(model, true)?;
            }
            if let Some(column) = group_column {
                column.group_key(model, true)?;
            }
        }
        Ok(())
    }
}
