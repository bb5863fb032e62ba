//! Columns and aspect access.
//!
//! A [`Column`] describes one way of looking at a model: how to read a value
//! from it, how to turn that value into display text, and (optionally) how to
//! write an edited value back. Accessors are plain closures bound when the
//! column is configured, so a column works with any shape of model without
//! runtime name resolution.
//!
//! # Example
//!
//! ```
//! use horizon_objectlist::{Column, Value};
//!
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! let name = Column::new("name", |p: &Person| p.name.clone());
//! let age = Column::new("age", |p: &Person| p.age)
//!     .with_formatter(|v| format!("{v} years"));
//!
//! let alice = Person { name: "Alice".into(), age: 30 };
//! assert_eq!(name.value(&alice, false).unwrap(), Value::from("Alice"));
//! assert_eq!(age.display_text(&alice, false).unwrap(), "30 years");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::{ListError, Result};
use crate::value::Value;

/// Reads a value from a model. `None` means the aspect does not resolve on
/// that particular model.
pub type AspectGetter<M> = Arc<dyn Fn(&M) -> Option<Value> + Send + Sync>;

/// Writes an edited value back into a model. Returns `false` if the value
/// was rejected.
pub type AspectPutter<M> = Arc<dyn Fn(&mut M, Value) -> bool + Send + Sync>;

/// Converts a value into display text.
pub type ValueFormatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Replacement comparator for a column.
pub type ColumnComparer<M> = Arc<dyn Fn(&M, &M) -> Ordering + Send + Sync>;

/// Composes two accessors into a chained aspect getter.
///
/// The outer accessor navigates to an intermediate object; the inner one
/// reads the value from it. If the outer step does not resolve, the chained
/// aspect does not resolve either.
///
/// ```
/// use horizon_objectlist::{Column, Value, column::chain};
///
/// struct Address { city: String }
/// struct Person { address: Option<Address> }
///
/// let city = Column::partial(
///     "city",
///     chain(|p: &Person| p.address.as_ref(), |a: &Address| Some(Value::from(a.city.as_str()))),
/// );
///
/// let homeless = Person { address: None };
/// assert!(city.value(&homeless, false).unwrap().is_missing());
/// ```
pub fn chain<M, T, F, G>(outer: F, inner: G) -> impl Fn(&M) -> Option<Value> + Send + Sync + 'static
where
    T: ?Sized,
    F: Fn(&M) -> Option<&T> + Send + Sync + 'static,
    G: Fn(&T) -> Option<Value> + Send + Sync + 'static,
{
    move |model: &M| outer(model).and_then(|intermediate| inner(intermediate))
}

/// One way of looking at a model.
pub struct Column<M> {
    name: String,
    title: String,
    getter: AspectGetter<M>,
    formatter: Option<ValueFormatter>,
    putter: Option<AspectPutter<M>>,
    sortable: bool,
    groupable: bool,
    editable: bool,
    group_key_getter: Option<AspectGetter<M>>,
    group_title: Option<ValueFormatter>,
    comparer: Option<ColumnComparer<M>>,
    width: u32,
    visible: bool,
    free_space_proportion: u32,
}

impl<M> Clone for Column<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            title: self.title.clone(),
            getter: self.getter.clone(),
            formatter: self.formatter.clone(),
            putter: self.putter.clone(),
            sortable: self.sortable,
            groupable: self.groupable,
            editable: self.editable,
            group_key_getter: self.group_key_getter.clone(),
            group_title: self.group_title.clone(),
            comparer: self.comparer.clone(),
            width: self.width,
            visible: self.visible,
            free_space_proportion: self.free_space_proportion,
        }
    }
}

impl<M> fmt::Debug for Column<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("sortable", &self.sortable)
            .field("groupable", &self.groupable)
            .field("editable", &self.editable)
            .field("width", &self.width)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

impl<M> Column<M> {
    /// Creates a column whose aspect always resolves.
    pub fn new<V, F>(name: impl Into<String>, getter: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&M) -> V + Send + Sync + 'static,
    {
        Self::partial(name, move |model: &M| Some(getter(model).into()))
    }

    /// Creates a column whose aspect may not resolve on every model.
    ///
    /// Heterogeneous collections use this: the getter returns `None` for
    /// models that do not have the aspect.
    pub fn partial<F>(name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&M) -> Option<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            getter: Arc::new(getter),
            formatter: None,
            putter: None,
            sortable: true,
            groupable: true,
            editable: false,
            group_key_getter: None,
            group_title: None,
            comparer: None,
            width: 100,
            visible: true,
            free_space_proportion: 0,
        }
    }

    /// Sets the header title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the value-to-text conversion used for display.
    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Sets the write-back function and marks the column editable.
    pub fn with_putter<F>(mut self, putter: F) -> Self
    where
        F: Fn(&mut M, Value) -> bool + Send + Sync + 'static,
    {
        self.putter = Some(Arc::new(putter));
        self.editable = true;
        self
    }

    /// Sets whether cells of this column may be edited.
    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// Sets whether this column can be sorted on.
    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    /// Sets whether this column can be grouped by.
    pub fn groupable(mut self, groupable: bool) -> Self {
        self.groupable = groupable;
        self
    }

    /// Sets the group-key extraction, replacing the column value for
    /// grouping purposes (for example size buckets instead of byte counts).
    pub fn with_group_key<V, F>(mut self, getter: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&M) -> V + Send + Sync + 'static,
    {
        self.group_key_getter = Some(Arc::new(move |model: &M| Some(getter(model).into())));
        self
    }

    /// Sets the group-key-to-title conversion.
    pub fn with_group_title<F>(mut self, title: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.group_title = Some(Arc::new(title));
        self
    }

    /// Replaces the generic value comparison with a custom comparator.
    ///
    /// Sort direction and the secondary tie-break still apply around it.
    pub fn with_comparer<F>(mut self, comparer: F) -> Self
    where
        F: Fn(&M, &M) -> Ordering + Send + Sync + 'static,
    {
        self.comparer = Some(Arc::new(comparer));
        self
    }

    /// Sets the width hint in pixels.
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    /// Sets the share of free horizontal space this column should absorb.
    pub fn with_free_space_proportion(mut self, proportion: u32) -> Self {
        self.free_space_proportion = proportion;
        self
    }

    /// Sets the visibility hint.
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// The stable column name used for persistence.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The header title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Whether this column can be sorted on.
    pub fn is_sortable(&self) -> bool {
        self.sortable
    }

    /// Whether this column can be grouped by.
    pub fn is_groupable(&self) -> bool {
        self.groupable
    }

    /// Whether values can be written back through this column.
    pub fn is_editable(&self) -> bool {
        self.editable && self.putter.is_some()
    }

    /// Width hint in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Free-space proportion hint.
    pub fn free_space_proportion(&self) -> u32 {
        self.free_space_proportion
    }

    /// Visibility hint.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn set_width(&mut self, width: u32) {
        self.width = width;
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn comparer(&self) -> Option<&ColumnComparer<M>> {
        self.comparer.as_ref()
    }

    fn resolve(&self, resolved: Option<Value>, strict: bool) -> Result<Value> {
        match resolved {
            Some(value) => Ok(value),
            None if strict => Err(ListError::UnresolvedAspect {
                column: self.name.clone(),
            }),
            None => {
                tracing::trace!(target: "horizon_objectlist::aspect", column = %self.name, "aspect missing");
                Ok(Value::Missing)
            }
        }
    }

    /// Reads this column's value from a model.
    ///
    /// An aspect that does not resolve yields [`Value::Missing`], or an
    /// [`ListError::UnresolvedAspect`] error when `strict` is set.
    pub fn value(&self, model: &M, strict: bool) -> Result<Value> {
        self.resolve((self.getter)(model), strict)
    }

    /// Converts a value to this column's display text.
    pub fn format_value(&self, value: &Value) -> String {
        if value.is_missing() {
            return String::new();
        }
        match &self.formatter {
            Some(formatter) => formatter(value),
            None => value.to_string(),
        }
    }

    /// Reads this column's display text from a model.
    pub fn display_text(&self, model: &M, strict: bool) -> Result<String> {
        self.value(model, strict).map(|value| self.format_value(&value))
    }

    /// Writes a value back into a model.
    ///
    /// Returns `true` if the column is editable and the putter accepted the
    /// value. Only the model is touched.
    pub fn put_value(&self, model: &mut M, value: Value) -> bool {
        match &self.putter {
            Some(putter) if self.editable => putter(model, value),
            _ => false,
        }
    }

    /// Reads the key used to bucket a model when grouping by this column.
    pub fn group_key(&self, model: &M, strict: bool) -> Result<Value> {
        match &self.group_key_getter {
            Some(getter) => self.resolve(getter(model), strict),
            None => self.value(model, strict),
        }
    }

    /// Converts a group key to a title, if this column customises titles.
    pub fn group_title(&self, key: &Value) -> Option<String> {
        self.group_title.as_ref().map(|title| title(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    enum Shape {
        Circle { radius: f64 },
        Square { side: f64, label: String },
    }

    fn label_column() -> Column<Shape> {
        Column::partial("label", |s: &Shape| match s {
            Shape::Square { label, .. } => Some(Value::from(label.as_str())),
            Shape::Circle { .. } => None,
        })
    }

    #[test]
    fn test_missing_aspect_lenient() {
        let column = label_column();
        let circle = Shape::Circle { radius: 1.0 };
        assert!(column.value(&circle, false).unwrap().is_missing());
        assert_eq!(column.display_text(&circle, false).unwrap(), "");
    }

    #[test]
    fn test_missing_aspect_strict() {
        let column = label_column();
        let circle = Shape::Circle { radius: 1.0 };
        assert_eq!(
            column.value(&circle, true),
            Err(ListError::UnresolvedAspect {
                column: "label".into()
            })
        );
    }

    #[test]
    fn test_formatter_and_fallback() {
        let area = Column::new("area", |s: &Shape| match s {
            Shape::Circle { radius } => radius * radius * 3.0,
            Shape::Square { side, .. } => side * side,
        });
        let square = Shape::Square {
            side: 2.0,
            label: "sq".into(),
        };
        assert_eq!(area.display_text(&square, false).unwrap(), "4");

        let area = area.with_formatter(|v| format!("{:.1} m²", v.as_float().unwrap_or_default()));
        assert_eq!(area.display_text(&square, false).unwrap(), "4.0 m²");
    }

    #[test]
    fn test_put_value_requires_editable() {
        let column = label_column().with_putter(|s: &mut Shape, v| match s {
            Shape::Square { label, .. } => {
                *label = v.to_string();
                true
            }
            Shape::Circle { .. } => false,
        });
        let mut square = Shape::Square {
            side: 1.0,
            label: "old".into(),
        };
        assert!(column.is_editable());
        assert!(column.put_value(&mut square, Value::from("new")));
        assert_eq!(column.display_text(&square, false).unwrap(), "new");

        let column = column.editable(false);
        assert!(!column.put_value(&mut square, Value::from("newer")));
        assert_eq!(column.display_text(&square, false).unwrap(), "new");
    }

    #[test]
    fn test_group_key_defaults_to_value() {
        let column = Column::new("size", |n: &u64| *n);
        assert_eq!(column.group_key(&5, false).unwrap(), Value::Int(5));

        let bucketed = column.with_group_key(|n: &u64| if *n < 10 { "small" } else { "large" });
        assert_eq!(bucketed.group_key(&5, false).unwrap(), Value::from("small"));
        assert_eq!(bucketed.value(&5, false).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_chain_resolves_through_intermediate() {
        struct Inner {
            n: i64,
        }
        struct Outer {
            inner: Option<Inner>,
        }

        let column = Column::partial(
            "n",
            chain(|o: &Outer| o.inner.as_ref(), |i: &Inner| Some(Value::Int(i.n))),
        );
        let present = Outer {
            inner: Some(Inner { n: 7 }),
        };
        assert_eq!(column.value(&present, false).unwrap(), Value::Int(7));
        assert!(column.value(&Outer { inner: None }, true).is_err());
    }
}
