//! # d2
//!
//! A post-mortem deadlock detector for multithreaded programs.
//!
//! d2 observes a program's synchronization events at runtime, records them
//! into a repository, and later analyzes the recorded trace to report
//! *potential* deadlocks: lock-ordering inversions that could deadlock a
//! real execution, even if the observed run completed just fine.
//!
//! ## Overview
//!
//! The system works in two phases:
//!
//! - **Runtime phase.** The traced program notifies d2 of lock
//!   acquisitions and releases and of thread starts and joins. Events are
//!   appended to a filesystem repository: one stream per thread, plus one
//!   shared stream for the start/join events.
//! - **Analysis phase.** The repository is read back into two graphs: a
//!   *segmentation graph* encoding the happens-before order induced by
//!   starts and joins, and a *lock-order graph* recording, per edge, that
//!   some thread held one lock while acquiring another. Cycles in the
//!   lock-order graph that survive a thread-disjointness, gatelock and
//!   happens-before filter are reported as potential deadlocks.
//!
//! Because the analysis reasons about lock ordering rather than about the
//! interleaving that actually happened, a single clean run of the program
//! is often enough to expose inversions that only deadlock under unlucky
//! scheduling.
//!
//! ## Usage
//!
//! ```no_run
//! use d2::{Repository, SyncSkeleton};
//!
//! // Runtime phase: record a trace.
//! d2::set_log_repository("trace_repo")?;
//! d2::enable_event_logging();
//!
//! d2::notify_start(0, 1);
//! d2::notify_acquire(0, 100);
//! d2::notify_acquire(0, 200); // thread 0: 100 then 200
//! d2::notify_release(0, 200);
//! d2::notify_release(0, 100);
//! d2::notify_acquire(1, 200);
//! d2::notify_acquire(1, 100); // thread 1: 200 then 100
//! d2::notify_release(1, 100);
//! d2::notify_release(1, 200);
//! d2::notify_join(0, 1);
//!
//! d2::disable_event_logging();
//! d2::unset_log_repository();
//!
//! // Analysis phase: read the trace back and report inversions.
//! let repository = Repository::open("trace_repo")?;
//! let skeleton = SyncSkeleton::from_repository(&repository)?;
//! for deadlock in skeleton.deadlocks() {
//!     println!("{deadlock}");
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! The same notifications are available to C programs through the
//! [`ffi`] module, and the `d2` binary runs the analysis from the command
//! line. Setting the `D2_REPOSITORY` environment variable selects a
//! repository and enables logging without touching the program.

mod core;

pub use core::{
    AcquireEvent, AcquireInfo, AnalysisError, DeadlockedThread, Event, Gatelocks,
    GatelockInterner, JoinEvent, LockEdge, LockGraph, LockGraphLabel, LockId, PotentialDeadlock,
    ReleaseEvent, Repository, RuntimeError, Segment, SegmentHopEvent, SegmentationGraph,
    SourceLocation, StartEvent, SyncSkeleton, ThreadId, disable_event_logging,
    enable_event_logging, is_disabled, is_enabled, notify_acquire, notify_acquire_at, notify_join,
    notify_recursive_acquire, notify_recursive_acquire_at, notify_recursive_release,
    notify_release, notify_start, set_log_repository, unset_log_repository,
};

pub mod ffi;
