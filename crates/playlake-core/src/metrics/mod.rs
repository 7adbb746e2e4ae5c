//! Metrics emission.
//!
//! Events are recorded on the `metrics` facade. No exporter is installed by
//! this crate: a one-shot batch run has no scrape window, so whichever
//! recorder the embedding process installs (if any) receives them.

pub mod events;

/// Macro for emitting metric events (Vector-style pattern).
///
/// Calls `InternalEvent::emit()` on the given event, which records the
/// corresponding counter or histogram.
///
/// # Example
///
/// ```
/// use playlake_core::emit;
/// use playlake_core::metrics::events::RowsDropped;
/// use playlake_core::metrics::events::DropReason;
///
/// emit!(RowsDropped { rows: 3, reason: DropReason::Unmatched, table: "songplay".to_string() });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

// Re-export the macro at crate root
pub use crate::emit;
