mod analysis;
mod errors;
mod events;
mod graph;
mod repository;
mod runtime;
mod types;

// Re-export the public surface of the core.
pub use analysis::{DeadlockedThread, PotentialDeadlock, SyncSkeleton};
pub use errors::{AnalysisError, RuntimeError};
pub use events::{AcquireEvent, Event, JoinEvent, ReleaseEvent, SegmentHopEvent, StartEvent};
pub use graph::{Gatelocks, GatelockInterner, LockEdge, LockGraph, LockGraphLabel, SegmentationGraph};
pub use repository::Repository;
pub use runtime::{
    disable_event_logging, enable_event_logging, is_disabled, is_enabled, notify_acquire,
    notify_acquire_at, notify_join, notify_recursive_acquire, notify_recursive_acquire_at,
    notify_recursive_release, notify_release, notify_start, set_log_repository,
    unset_log_repository,
};
pub use types::*;
