//! Filter pipeline.
//!
//! Filtering decides which models of the backing collection take part in the
//! projection. It never touches the collection itself.
//!
//! Two kinds of filter compose:
//!
//! - a [`ListFilter`] sees the whole sequence at once, so it can express
//!   filters that need global context ("the first 10")
//! - a [`ModelFilter`] predicates one model at a time; any
//!   `Fn(&M) -> bool + Send + Sync` closure is a model filter, and
//!   [`CompositeFilter`] combines model filters with AND or OR
//!
//! The list filter runs first, then the model filter, and relative order is
//! preserved throughout.
//!
//! # Example
//!
//! ```
//! use horizon_objectlist::filter::{filter_indices, CompositeFilter, HeadFilter};
//!
//! let numbers = vec![5, 12, 7, 30, 2];
//! let big = |n: &i32| *n > 4;
//! let even = |n: &i32| n % 2 == 0;
//!
//! let either = CompositeFilter::<i32>::any(vec![Box::new(big), Box::new(even)]);
//! assert_eq!(filter_indices(&numbers, None, Some(&either)), vec![0, 1, 2, 3, 4]);
//!
//! let first_three = HeadFilter::new(3);
//! let both = CompositeFilter::<i32>::all(vec![Box::new(big), Box::new(even)]);
//! assert_eq!(filter_indices(&numbers, Some(&first_three), Some(&both)), vec![1]);
//! ```

use std::collections::HashSet;
use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::column::Column;
use crate::value::Value;

/// Predicates a single model.
pub trait ModelFilter<M>: Send + Sync {
    /// Returns `true` if the model should be part of the projection.
    fn matches(&self, model: &M) -> bool;
}

impl<M, F> ModelFilter<M> for F
where
    F: Fn(&M) -> bool + Send + Sync,
{
    fn matches(&self, model: &M) -> bool {
        self(model)
    }
}

/// Filters a whole sequence at once.
pub trait ListFilter<M>: Send + Sync {
    /// Returns the positions (into `models`) to keep, in display order.
    fn filter(&self, models: &[&M]) -> Vec<usize>;
}

/// Runs the filter pipeline over `models` and returns the indices of the
/// survivors, in their original relative order.
pub fn filter_indices<M>(
    models: &[M],
    list_filter: Option<&dyn ListFilter<M>>,
    model_filter: Option<&dyn ModelFilter<M>>,
) -> Vec<usize> {
    let mut survivors: Vec<usize> = (0..models.len()).collect();

    if let Some(list_filter) = list_filter {
        let refs: Vec<&M> = models.iter().collect();
        let mut seen = HashSet::new();
        survivors = list_filter
            .filter(&refs)
            .into_iter()
            .filter(|&position| position < models.len() && seen.insert(position))
            .collect();
    }

    if let Some(model_filter) = model_filter {
        survivors.retain(|&index| model_filter.matches(&models[index]));
    }

    tracing::trace!(
        target: "horizon_objectlist::filter",
        total = models.len(),
        survivors = survivors.len(),
        "filtered"
    );
    survivors
}

/// How a [`CompositeFilter`] combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeMode {
    /// Every child must match.
    All,
    /// At least one child must match.
    Any,
}

/// A model filter combining other model filters.
///
/// An empty composite accepts everything, whatever its mode.
pub struct CompositeFilter<M> {
    mode: CompositeMode,
    filters: Vec<Box<dyn ModelFilter<M>>>,
}

impl<M> fmt::Debug for CompositeFilter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeFilter")
            .field("mode", &self.mode)
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl<M> CompositeFilter<M> {
    /// AND of the given filters.
    pub fn all(filters: Vec<Box<dyn ModelFilter<M>>>) -> Self {
        Self {
            mode: CompositeMode::All,
            filters,
        }
    }

    /// OR of the given filters.
    pub fn any(filters: Vec<Box<dyn ModelFilter<M>>>) -> Self {
        Self {
            mode: CompositeMode::Any,
            filters,
        }
    }

    /// Adds another child filter.
    pub fn push(&mut self, filter: Box<dyn ModelFilter<M>>) {
        self.filters.push(filter);
    }

    /// The combination mode.
    pub fn mode(&self) -> CompositeMode {
        self.mode
    }

    /// Number of child filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if there are no child filters.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl<M> ModelFilter<M> for CompositeFilter<M> {
    fn matches(&self, model: &M) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        match self.mode {
            CompositeMode::All => self.filters.iter().all(|f| f.matches(model)),
            CompositeMode::Any => self.filters.iter().any(|f| f.matches(model)),
        }
    }
}

/// How a [`TextMatchFilter`] matches its text.
#[derive(Debug, Clone)]
enum TextPattern {
    Contains(String),
    Prefix(String),
    Regex(Regex),
}

impl TextPattern {
    fn is_match(&self, text: &str) -> bool {
        match self {
            TextPattern::Contains(needle) => text.to_lowercase().contains(needle.as_str()),
            TextPattern::Prefix(needle) => text.to_lowercase().starts_with(needle.as_str()),
            TextPattern::Regex(regex) => regex.is_match(text),
        }
    }
}

/// Matches models whose display text in any of the given columns matches
/// the pattern. Matching is case-insensitive. An empty pattern matches
/// everything.
pub struct TextMatchFilter<M> {
    columns: Vec<Column<M>>,
    pattern: Option<TextPattern>,
}

impl<M> fmt::Debug for TextMatchFilter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextMatchFilter")
            .field("columns", &self.columns.iter().map(Column::name).collect::<Vec<_>>())
            .field("pattern", &self.pattern)
            .finish()
    }
}

impl<M> TextMatchFilter<M> {
    fn with_pattern(columns: Vec<Column<M>>, pattern: Option<TextPattern>) -> Self {
        Self { columns, pattern }
    }

    /// Matches cells containing `text`.
    pub fn contains(columns: Vec<Column<M>>, text: &str) -> Self {
        let pattern = (!text.is_empty()).then(|| TextPattern::Contains(text.to_lowercase()));
        Self::with_pattern(columns, pattern)
    }

    /// Matches cells starting with `text`.
    pub fn prefix(columns: Vec<Column<M>>, text: &str) -> Self {
        let pattern = (!text.is_empty()).then(|| TextPattern::Prefix(text.to_lowercase()));
        Self::with_pattern(columns, pattern)
    }

    /// Matches cells against a regular expression.
    pub fn regex(columns: Vec<Column<M>>, pattern: &str) -> Result<Self, regex::Error> {
        if pattern.is_empty() {
            return Ok(Self::with_pattern(columns, None));
        }
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self::with_pattern(columns, Some(TextPattern::Regex(regex))))
    }
}

impl<M> ModelFilter<M> for TextMatchFilter<M> {
    fn matches(&self, model: &M) -> bool {
        let Some(pattern) = &self.pattern else {
            return true;
        };
        self.columns.iter().any(|column| {
            column
                .display_text(model, false)
                .is_ok_and(|text| pattern.is_match(&text))
        })
    }
}

/// Matches models whose value in a column is one of a chosen set.
///
/// This is the per-column filter a column header's filter menu produces.
pub struct OneOfFilter<M> {
    column: Column<M>,
    values: HashSet<Value>,
}

impl<M> fmt::Debug for OneOfFilter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneOfFilter")
            .field("column", &self.column.name())
            .field("values", &self.values)
            .finish()
    }
}

impl<M> OneOfFilter<M> {
    /// Creates a filter accepting models whose column value is in `values`.
    pub fn new<I>(column: Column<M>, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self {
            column,
            values: values.into_iter().collect(),
        }
    }

    /// The accepted values.
    pub fn values(&self) -> &HashSet<Value> {
        &self.values
    }
}

impl<M> ModelFilter<M> for OneOfFilter<M> {
    fn matches(&self, model: &M) -> bool {
        self.column
            .value(model, false)
            .is_ok_and(|value| self.values.contains(&value))
    }
}

/// Keeps the first `count` models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadFilter {
    count: usize,
}

impl HeadFilter {
    /// Creates a filter keeping the first `count` models.
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

impl<M> ListFilter<M> for HeadFilter {
    fn filter(&self, models: &[&M]) -> Vec<usize> {
        (0..models.len().min(self.count)).collect()
    }
}

/// Keeps the last `count` models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailFilter {
    count: usize,
}

impl TailFilter {
    /// Creates a filter keeping the last `count` models.
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

impl<M> ListFilter<M> for TailFilter {
    fn filter(&self, models: &[&M]) -> Vec<usize> {
        (models.len().saturating_sub(self.count)..models.len()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Animal {
        name: &'static str,
        legs: u32,
    }

    fn animals() -> Vec<Animal> {
        vec![
            Animal { name: "ant", legs: 6 },
            Animal { name: "bee", legs: 6 },
            Animal { name: "cat", legs: 4 },
        ]
    }

    fn name_column() -> Column<Animal> {
        Column::new("name", |a: &Animal| a.name)
    }

    #[test]
    fn test_text_contains() {
        let models = animals();
        let filter = TextMatchFilter::contains(vec![name_column()], "A");
        assert_eq!(filter_indices(&models, None, Some(&filter)), vec![0, 2]);
    }

    #[test]
    fn test_text_prefix_and_regex() {
        let models = animals();
        let prefix = TextMatchFilter::prefix(vec![name_column()], "b");
        assert_eq!(filter_indices(&models, None, Some(&prefix)), vec![1]);

        let regex = TextMatchFilter::regex(vec![name_column()], "^[ac]").unwrap();
        assert_eq!(filter_indices(&models, None, Some(&regex)), vec![0, 2]);

        assert!(TextMatchFilter::regex(vec![name_column()], "(").is_err());
    }

    #[test]
    fn test_empty_text_matches_everything() {
        let models = animals();
        let filter = TextMatchFilter::contains(vec![name_column()], "");
        assert_eq!(filter_indices(&models, None, Some(&filter)).len(), 3);
    }

    #[test]
    fn test_one_of_filter() {
        let models = animals();
        let legs = Column::new("legs", |a: &Animal| a.legs);
        let filter = OneOfFilter::new(legs, [Value::Int(4)]);
        assert_eq!(filter_indices(&models, None, Some(&filter)), vec![2]);
    }

    #[test]
    fn test_empty_composite_accepts_all() {
        let models = animals();
        let all = CompositeFilter::<Animal>::all(Vec::new());
        let any = CompositeFilter::<Animal>::any(Vec::new());
        assert_eq!(filter_indices(&models, None, Some(&all)).len(), 3);
        assert_eq!(filter_indices(&models, None, Some(&any)).len(), 3);
    }

    #[test]
    fn test_list_filter_runs_before_model_filter() {
        let models = animals();
        let six_legs = |a: &Animal| a.legs == 6;
        // Tail first keeps [bee, cat]; then the predicate keeps bee.
        let tail = TailFilter::new(2);
        assert_eq!(filter_indices(&models, Some(&tail), Some(&six_legs)), vec![1]);
    }

    #[test]
    fn test_list_filter_output_is_sanitised() {
        struct Sloppy;
        impl ListFilter<Animal> for Sloppy {
            fn filter(&self, _models: &[&Animal]) -> Vec<usize> {
                vec![2, 2, 9, 0]
            }
        }
        let models = animals();
        assert_eq!(filter_indices(&models, Some(&Sloppy), None), vec![2, 0]);
    }

    #[test]
    fn test_empty_input() {
        let models: Vec<Animal> = Vec::new();
        let head = HeadFilter::new(10);
        assert!(filter_indices(&models, Some(&head), None).is_empty());
    }
}
