//! Logging and tracing facilities for Horizon ObjectList.
//!
//! Horizon ObjectList uses the `tracing` crate for instrumentation. The
//! library never installs a subscriber; to see logs, install one in your
//! application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_objectlist=debug")
//!     .init();
//! ```

use std::time::Instant;

/// Span names used throughout Horizon ObjectList for tracing.
pub mod span_names {
    /// A full projection rebuild.
    pub const REBUILD: &str = "horizon_objectlist::rebuild";
    /// Filter pipeline evaluation.
    pub const FILTER: &str = "horizon_objectlist::filter";
    /// Sorting of a flat row sequence.
    pub const SORT: &str = "horizon_objectlist::sort";
    /// Group construction.
    pub const GROUP: &str = "horizon_objectlist::group";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core infrastructure target.
    pub const CORE: &str = "horizon_objectlist_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_objectlist_core::signal";
    /// Owner queue target.
    pub const QUEUE: &str = "horizon_objectlist_core::queue";
    /// Rebuild orchestration target.
    pub const REBUILD: &str = "horizon_objectlist::rebuild";
    /// Incremental mutation target.
    pub const MUTATION: &str = "horizon_objectlist::mutation";
    /// Filter pipeline target.
    pub const FILTER: &str = "horizon_objectlist::filter";
    /// Grouping engine target.
    pub const GROUP: &str = "horizon_objectlist::group";
    /// Cross-thread dispatch target.
    pub const DISPATCH: &str = "horizon_objectlist::dispatch";
    /// Aspect extraction target.
    pub const ASPECT: &str = "horizon_objectlist::aspect";
}

/// A performance tracing span guard.
///
/// The span stays entered until the guard is dropped; on drop the elapsed
/// time is logged at trace level.
///
/// ```
/// use horizon_objectlist_core::logging::{PerfSpan, span_names};
///
/// {
///     let _span = PerfSpan::new(span_names::SORT);
///     // ... sort rows ...
/// }
/// ```
#[derive(Debug)]
pub struct PerfSpan {
    name: &'static str,
    started: Instant,
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create and enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::debug_span!(target: "horizon_objectlist::perf", "perf", operation = name);
        Self {
            name,
            started: Instant::now(),
            _span: span.entered(),
        }
    }

    /// The operation name this span was created with.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Time elapsed since the span was entered.
    pub fn elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }
}

impl Drop for PerfSpan {
    fn drop(&mut self) {
        tracing::trace!(
            target: "horizon_objectlist::perf",
            operation = self.name,
            elapsed_us = self.started.elapsed().as_micros() as u64,
            "span finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_span() {
        let span = PerfSpan::new(span_names::REBUILD);
        assert_eq!(span.name(), "horizon_objectlist::rebuild");
        let _ = span.elapsed();
    }

    #[test]
    fn test_targets_share_crate_prefix() {
        for target in [targets::REBUILD, targets::MUTATION, targets::FILTER, targets::GROUP] {
            assert!(target.starts_with("horizon_objectlist::"));
        }
    }
}
