//! Error types for the projection engine.

/// Result type alias for object list operations.
pub type Result<T> = std::result::Result<T, ListError>;

/// Errors surfaced to the integrating application.
///
/// Only configuration errors and owner-thread violations are reported.
/// Recoverable conditions (an aspect that does not resolve on one model in
/// lenient mode, a mutation naming a model that is no longer present)
/// degrade to an empty cell or a no-op instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListError {
    /// A column index does not name a configured column.
    #[error("no column at index {index}")]
    UnknownColumn { index: usize },

    /// A column name does not name a configured column.
    #[error("no column named '{name}'")]
    UnknownColumnName { name: String },

    /// Sorting was requested on a column that is not sortable (strict mode).
    #[error("column '{column}' is not sortable")]
    NotSortable { column: String },

    /// Grouping was requested on a column that is not groupable (strict mode).
    #[error("column '{column}' is not groupable")]
    NotGroupable { column: String },

    /// A column's aspect could not be resolved on a model (strict mode).
    #[error("aspect of column '{column}' does not resolve on every model")]
    UnresolvedAspect { column: String },

    /// A mutation was attempted off the owner thread and marshalling is
    /// disabled.
    #[error("object list accessed off its owner thread without marshalling support")]
    WrongThread,

    /// The owner side of a marshalling queue has been dropped.
    #[error("the object list that owned this queue has been dropped")]
    QueueClosed,
}

impl ListError {
    /// Returns `true` for errors caused by column or parameter configuration.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::WrongThread | Self::QueueClosed)
    }
}

impl From<horizon_objectlist_core::QueueClosed> for ListError {
    fn from(_: horizon_objectlist_core::QueueClosed) -> Self {
        Self::QueueClosed
    }
}
