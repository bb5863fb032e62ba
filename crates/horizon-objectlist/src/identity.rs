//! Out-of-band per-model state keyed by model identity.
//!
//! Rows are recreated on every rebuild, so state that must survive a rebuild
//! (checkbox state, enablement) lives here, keyed by [`Model::Key`]
//! rather than by row or position.
//!
//! [`Model::Key`]: crate::Model::Key

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Check state for checkable rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CheckState {
    /// Row is unchecked.
    #[default]
    Unchecked,
    /// Row is checked.
    Checked,
    /// Row is partially checked (tri-state checkboxes only).
    Indeterminate,
}

impl CheckState {
    /// Returns `true` if the row is checked (fully or partially).
    pub fn is_checked(&self) -> bool {
        !matches!(self, CheckState::Unchecked)
    }

    /// Returns `true` if the row is fully checked.
    pub fn is_fully_checked(&self) -> bool {
        matches!(self, CheckState::Checked)
    }

    /// The state a user toggle moves to.
    ///
    /// Two-state checkboxes flip between Unchecked and Checked
    /// (Indeterminate becomes Checked). Tri-state checkboxes cycle
    /// Unchecked → Checked → Indeterminate → Unchecked.
    pub fn toggle(&self, tri_state: bool) -> CheckState {
        match (self, tri_state) {
            (CheckState::Unchecked, _) => CheckState::Checked,
            (CheckState::Checked, true) => CheckState::Indeterminate,
            (CheckState::Checked, false) => CheckState::Unchecked,
            (CheckState::Indeterminate, true) => CheckState::Unchecked,
            (CheckState::Indeterminate, false) => CheckState::Checked,
        }
    }
}

/// Two independent maps keyed by model equality: check state and
/// enablement.
///
/// Absent entries report the defaults (unchecked, enabled), so the map only
/// stores deviations.
#[derive(Debug, Clone)]
pub struct IdentityMap<K> {
    checks: HashMap<K, CheckState>,
    disabled: HashSet<K>,
}

impl<K> Default for IdentityMap<K> {
    fn default() -> Self {
        Self {
            checks: HashMap::new(),
            disabled: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> IdentityMap<K> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check state of a model (Unchecked if absent).
    pub fn check_state(&self, key: &K) -> CheckState {
        self.checks.get(key).copied().unwrap_or_default()
    }

    /// Sets the check state of a model. Returns `true` if it changed.
    pub fn set_check_state(&mut self, key: K, state: CheckState) -> bool {
        let previous = match state {
            CheckState::Unchecked => self.checks.remove(&key),
            _ => self.checks.insert(key, state),
        };
        previous.unwrap_or_default() != state
    }

    /// Sets the same check state on every key. Returns the keys whose state
    /// changed.
    pub fn set_all_checked<I>(&mut self, keys: I, state: CheckState) -> Vec<K>
    where
        I: IntoIterator<Item = K>,
    {
        keys.into_iter()
            .filter(|key| self.set_check_state(key.clone(), state))
            .collect()
    }

    /// Keys of every model whose state is not Unchecked.
    pub fn checked_keys(&self) -> impl Iterator<Item = &K> {
        self.checks.keys()
    }

    /// Whether a model is enabled (true if absent).
    pub fn is_enabled(&self, key: &K) -> bool {
        !self.disabled.contains(key)
    }

    /// Enables or disables a model. Returns `true` if it changed.
    pub fn set_enabled(&mut self, key: K, enabled: bool) -> bool {
        if enabled {
            self.disabled.remove(&key)
        } else {
            self.disabled.insert(key)
        }
    }

    /// Enables or disables every key. Returns the keys whose state changed.
    pub fn set_all_enabled<I>(&mut self, keys: I, enabled: bool) -> Vec<K>
    where
        I: IntoIterator<Item = K>,
    {
        keys.into_iter()
            .filter(|key| self.set_enabled(key.clone(), enabled))
            .collect()
    }

    /// Keys of every disabled model.
    pub fn disabled_keys(&self) -> impl Iterator<Item = &K> {
        self.disabled.iter()
    }

    /// Forgets all check state.
    pub fn clear_checks(&mut self) {
        self.checks.clear();
    }

    /// Re-enables every model.
    pub fn clear_disabled(&mut self) {
        self.disabled.clear();
    }

    /// Forgets all state.
    pub fn clear(&mut self) {
        self.clear_checks();
        self.clear_disabled();
    }

    /// Drops state for keys that `keep` rejects.
    pub fn retain<F: Fn(&K) -> bool>(&mut self, keep: F) {
        self.checks.retain(|key, _| keep(key));
        self.disabled.retain(|key| keep(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_state_toggle() {
        assert_eq!(CheckState::Unchecked.toggle(false), CheckState::Checked);
        assert_eq!(CheckState::Checked.toggle(false), CheckState::Unchecked);
        assert_eq!(CheckState::Indeterminate.toggle(false), CheckState::Checked);

        assert_eq!(CheckState::Checked.toggle(true), CheckState::Indeterminate);
        assert_eq!(CheckState::Indeterminate.toggle(true), CheckState::Unchecked);
    }

    #[test]
    fn test_defaults_for_absent_keys() {
        let map = IdentityMap::<u32>::new();
        assert_eq!(map.check_state(&1), CheckState::Unchecked);
        assert!(map.is_enabled(&1));
    }

    #[test]
    fn test_set_check_state_reports_change() {
        let mut map = IdentityMap::new();
        assert!(map.set_check_state(7, CheckState::Checked));
        assert!(!map.set_check_state(7, CheckState::Checked));
        assert!(map.set_check_state(7, CheckState::Indeterminate));
        assert!(map.set_check_state(7, CheckState::Unchecked));
        assert!(!map.set_check_state(7, CheckState::Unchecked));
        assert_eq!(map.checked_keys().count(), 0);
    }

    #[test]
    fn test_bulk_operations() {
        let mut map = IdentityMap::new();
        map.set_check_state(2, CheckState::Checked);

        let changed = map.set_all_checked([1, 2, 3], CheckState::Checked);
        assert_eq!(changed, vec![1, 3]);

        let changed = map.set_all_enabled([1, 2], false);
        assert_eq!(changed, vec![1, 2]);
        assert!(!map.is_enabled(&2));
        assert!(map.is_enabled(&3));

        map.clear();
        assert_eq!(map.check_state(&1), CheckState::Unchecked);
        assert!(map.is_enabled(&1));
    }

    #[test]
    fn test_retain() {
        let mut map = IdentityMap::new();
        map.set_all_checked([1, 2, 3], CheckState::Checked);
        map.set_enabled(2, false);
        map.retain(|k| *k != 2);
        assert_eq!(map.check_state(&2), CheckState::Unchecked);
        assert!(map.is_enabled(&2));
        assert_eq!(map.check_state(&3), CheckState::Checked);
    }
}
