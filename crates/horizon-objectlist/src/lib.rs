//! Model projection and synchronization engine for Horizon ObjectList.
//!
//! This crate turns a collection of arbitrary model objects into an ordered,
//! optionally grouped sequence of display rows, and keeps that projection in
//! step with the collection as it changes:
//!
//! - **Columns**: Aspect accessors that read, format and write back values
//! - **Filtering**: Model, list, additional and per-column filters
//! - **Sorting**: Stable primary/secondary sort on pre-extracted keys
//! - **Grouping**: Buckets by group key, with titles and item counts
//! - **Identity**: Check state and enablement that survive rebuilds
//! - **Selection**: Selection, focus and scroll offset restored by identity
//! - **Mutations**: Incremental add/insert/remove/update with batching
//! - **Dispatch**: Marshalling of calls made off the owner thread
//!
//! # Example
//!
//! ```
//! use horizon_objectlist::prelude::*;
//!
//! #[derive(Debug, Clone)]
//! struct Person {
//!     id: u32,
//!     name: String,
//!     team: Option<String>,
//! }
//!
//! impl Model for Person {
//!     type Key = u32;
//!     fn key(&self) -> u32 {
//!         self.id
//!     }
//! }
//!
//! let columns = vec![
//!     Column::new("name", |p: &Person| p.name.clone()),
//!     Column::partial("team", |p: &Person| p.team.clone().map(Value::from)),
//! ];
//! let mut list = ObjectList::new(columns, ListConfig::default());
//! list.set_objects(
//!     vec![
//!         Person { id: 1, name: "Ann".into(), team: Some("red".into()) },
//!         Person { id: 2, name: "Bob".into(), team: None },
//!         Person { id: 3, name: "Cy".into(), team: Some("red".into()) },
//!     ],
//!     false,
//! )?;
//! list.group_by(1, SortOrder::Ascending)?;
//!
//! let titles: Vec<&str> = list.projection().groups().iter().map(|g| g.title()).collect();
//! assert_eq!(titles, vec!["{null} [1 item]", "red [2 items]"]);
//! # Ok::<(), horizon_objectlist::ListError>(())
//! ```

pub mod batch;
pub mod column;
pub mod config;
pub mod dispatch;
pub mod filter;
pub mod group;
pub mod identity;
pub mod list;
pub mod model;
pub mod mutation;
pub mod persist;
pub mod projection;
pub mod selection;
pub mod sort;
pub mod value;

mod error;

pub use batch::BatchGuard;
pub use column::Column;
pub use config::ListConfig;
pub use dispatch::{Mutation, MutationSender};
pub use error::{ListError, Result};
pub use filter::{
    CompositeFilter, CompositeMode, HeadFilter, ListFilter, ModelFilter, OneOfFilter, TailFilter,
    TextMatchFilter,
};
pub use group::{Group, GroupTitleFormat};
pub use identity::{CheckState, IdentityMap};
pub use list::{ObjectList, ProjectionChanged, RebuildState, TransformParameters};
pub use model::Model;
pub use persist::{ColumnState, ListState, SortState};
pub use projection::{Projection, Row};
pub use selection::{SelectionFlags, SelectionMode, SelectionModel, SelectionSnapshot};
pub use sort::{SortOrder, SortSpec};
pub use value::Value;

/// Prelude module with commonly used types.
pub mod prelude {
    pub use crate::column::Column;
    pub use crate::config::ListConfig;
    pub use crate::filter::{ListFilter, ModelFilter, TextMatchFilter};
    pub use crate::identity::CheckState;
    pub use crate::list::ObjectList;
    pub use crate::model::Model;
    pub use crate::selection::{SelectionFlags, SelectionMode};
    pub use crate::sort::{SortOrder, SortSpec};
    pub use crate::value::Value;
}
