//! Core systems for Horizon ObjectList.
//!
//! This crate provides the domain-agnostic infrastructure the projection
//! engine is built on:
//!
//! - **Signal/Slot System**: Type-safe change notification ([`Signal`])
//! - **Thread Affinity**: Owner-thread tracking ([`ThreadAffinity`])
//! - **Owner Queue**: Marshalling work from any thread onto the owner thread
//! - **Completion Handles**: Optional synchronous completion of posted work
//! - **Logging**: Tracing targets and a [`PerfSpan`] guard
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_objectlist_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(42);
//! value_changed.disconnect(conn_id);
//! ```

pub mod invocation;
pub mod logging;
pub mod queue;
pub mod signal;
pub mod thread_check;

pub use invocation::{CompletionHandle, CompletionWaiter, completion_pair};
pub use logging::PerfSpan;
pub use queue::{OwnerQueue, QueueClosed, QueuePoster, TaskId, owner_queue};
pub use signal::{ConnectionId, Signal};
pub use thread_check::ThreadAffinity;
