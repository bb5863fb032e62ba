//! The identity capability every displayed model type supplies.

use std::fmt::Debug;
use std::hash::Hash;

/// A domain object displayed by an [`ObjectList`](crate::ObjectList).
///
/// Models are matched by the key they report, never by position or by
/// reference: the identity map, selection, focus and mutation requests all
/// find "the same model" by comparing keys. Two model values with equal keys
/// are the same model for every purpose of the engine, which is what allows
/// record-like models to be replaced by fresh copies through
/// [`update_objects`](crate::ObjectList::update_objects).
///
/// # Example
///
/// ```
/// use horizon_objectlist::Model;
///
/// #[derive(Clone)]
/// struct FileEntry {
///     path: String,
///     size: u64,
/// }
///
/// impl Model for FileEntry {
///     type Key = String;
///
///     fn key(&self) -> String {
///         self.path.clone()
///     }
/// }
/// ```
pub trait Model {
    /// The equality key.
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Returns this model's equality key.
    fn key(&self) -> Self::Key;
}
