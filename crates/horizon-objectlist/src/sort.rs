//! Sort engine.
//!
//! Rows are ordered by a primary column and direction, with an optional
//! secondary column and direction breaking ties. Anything still equal keeps
//! its input order, because the sort is stable.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::column::Column;
use crate::error::Result;
use crate::value::{Value, compare_values};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortOrder {
    /// Applies this direction to an ascending comparison result.
    #[inline]
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }

    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// A column index paired with a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    /// Index of the column.
    pub column: usize,
    /// Direction.
    pub order: SortOrder,
}

impl SortSpec {
    /// Creates a sort spec.
    pub fn new(column: usize, order: SortOrder) -> Self {
        Self { column, order }
    }

    /// Ascending on `column`.
    pub fn ascending(column: usize) -> Self {
        Self::new(column, SortOrder::Ascending)
    }

    /// Descending on `column`.
    pub fn descending(column: usize) -> Self {
        Self::new(column, SortOrder::Descending)
    }
}

/// One level of a sort: a resolved column and its direction.
#[derive(Debug)]
pub struct SortLevel<'a, M> {
    /// The column compared at this level.
    pub column: &'a Column<M>,
    /// Direction of this level.
    pub order: SortOrder,
}

impl<M> Clone for SortLevel<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for SortLevel<'_, M> {}

impl<'a, M> SortLevel<'a, M> {
    /// Creates a sort level.
    pub fn new(column: &'a Column<M>, order: SortOrder) -> Self {
        Self { column, order }
    }

    fn key(&self, model: &M, strict: bool) -> Result<Value> {
        if self.column.comparer().is_some() {
            // Custom comparers see the models, not extracted values.
            return Ok(Value::Missing);
        }
        self.column.value(model, strict)
    }

    fn compare(&self, a: &M, b: &M, key_a: &Value, key_b: &Value) -> Ordering {
        let ordering = match self.column.comparer() {
            Some(comparer) => comparer(a, b),
            None => compare_values(key_a, key_b),
        };
        self.order.apply(ordering)
    }
}

/// Compares two models by a primary level, falling back to a secondary
/// level on ties.
///
/// Returns `Ordering::Equal` if both levels tie; callers that need a total
/// order rely on a stable sort to keep input order for such pairs.
pub fn compare_rows<M>(
    a: &M,
    b: &M,
    primary: SortLevel<'_, M>,
    secondary: Option<SortLevel<'_, M>>,
    strict: bool,
) -> Result<Ordering> {
    for level in std::iter::once(primary).chain(secondary) {
        let ordering = level.compare(a, b, &level.key(a, strict)?, &level.key(b, strict)?);
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }
    Ok(Ordering::Equal)
}

/// Sorts `rows` (indices into `models`) in place.
///
/// Sort keys are extracted once per row before any reordering, so an
/// extraction failure in strict mode leaves `rows` untouched.
pub fn sort_rows<M>(
    models: &[M],
    rows: &mut [usize],
    primary: SortLevel<'_, M>,
    secondary: Option<SortLevel<'_, M>>,
    strict: bool,
) -> Result<()> {
    let levels: Vec<SortLevel<'_, M>> = std::iter::once(primary).chain(secondary).collect();

    let mut keyed = rows
        .iter()
        .map(|&row| -> Result<(Vec<Value>, usize)> {
            let keys = levels
                .iter()
                .map(|level| level.key(&models[row], strict))
                .collect::<Result<Vec<_>>>()?;
            Ok((keys, row))
        })
        .collect::<Result<Vec<_>>>()?;

    keyed.sort_by(|(keys_a, a), (keys_b, b)| {
        levels
            .iter()
            .enumerate()
            .map(|(n, level)| level.compare(&models[*a], &models[*b], &keys_a[n], &keys_b[n]))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    for (slot, (_, row)) in rows.iter_mut().zip(keyed) {
        *slot = row;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ListError;

    #[derive(Debug, Clone, PartialEq)]
    struct Track {
        id: u32,
        artist: &'static str,
        year: Option<i64>,
    }

    fn tracks() -> Vec<Track> {
        vec![
            Track { id: 1, artist: "b", year: Some(1990) },
            Track { id: 2, artist: "a", year: Some(2001) },
            Track { id: 3, artist: "b", year: Some(1985) },
            Track { id: 4, artist: "a", year: None },
        ]
    }

    fn artist() -> Column<Track> {
        Column::new("artist", |t: &Track| t.artist)
    }

    fn year() -> Column<Track> {
        Column::partial("year", |t: &Track| t.year.map(Value::Int))
    }

    fn ids(models: &[Track], rows: &[usize]) -> Vec<u32> {
        rows.iter().map(|&r| models[r].id).collect()
    }

    #[test]
    fn test_primary_then_secondary() {
        let models = tracks();
        let (artist, year) = (artist(), year());
        let mut rows = vec![0, 1, 2, 3];
        sort_rows(
            &models,
            &mut rows,
            SortLevel::new(&artist, SortOrder::Ascending),
            Some(SortLevel::new(&year, SortOrder::Descending)),
            false,
        )
        .unwrap();
        // Missing years sort first ascending, so last when descending.
        assert_eq!(ids(&models, &rows), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let models = tracks();
        let artist = artist();
        let mut rows = vec![3, 2, 1, 0];
        sort_rows(&models, &mut rows, SortLevel::new(&artist, SortOrder::Descending), None, false)
            .unwrap();
        assert_eq!(ids(&models, &rows), vec![3, 1, 4, 2]);
    }

    #[test]
    fn test_custom_comparer_respects_direction() {
        let models = tracks();
        let by_id = Column::new("id", |t: &Track| t.id).with_comparer(|a: &Track, b: &Track| {
            // Odd ids before even ids, then numeric.
            (a.id % 2 == 0).cmp(&(b.id % 2 == 0)).then(a.id.cmp(&b.id))
        });
        let mut rows = vec![0, 1, 2, 3];
        sort_rows(&models, &mut rows, SortLevel::new(&by_id, SortOrder::Ascending), None, false)
            .unwrap();
        assert_eq!(ids(&models, &rows), vec![1, 3, 2, 4]);

        sort_rows(&models, &mut rows, SortLevel::new(&by_id, SortOrder::Descending), None, false)
            .unwrap();
        assert_eq!(ids(&models, &rows), vec![4, 2, 3, 1]);
    }

    #[test]
    fn test_strict_failure_leaves_rows_untouched() {
        let models = tracks();
        let year = year();
        let mut rows = vec![3, 2, 1, 0];
        let result = sort_rows(&models, &mut rows, SortLevel::new(&year, SortOrder::Ascending), None, true);
        assert_eq!(
            result,
            Err(ListError::UnresolvedAspect {
                column: "year".into()
            })
        );
        assert_eq!(rows, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_compare_rows() {
        let models = tracks();
        let (artist, year) = (artist(), year());
        let primary = SortLevel::new(&artist, SortOrder::Ascending);
        assert_eq!(
            compare_rows(&models[0], &models[2], primary, None, false).unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            compare_rows(
                &models[0],
                &models[2],
                primary,
                Some(SortLevel::new(&year, SortOrder::Ascending)),
                false
            )
            .unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn test_sort_order_helpers() {
        assert_eq!(SortOrder::Ascending.reversed(), SortOrder::Descending);
        assert_eq!(SortOrder::Descending.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(SortSpec::descending(2).order, SortOrder::Descending);
    }
}
