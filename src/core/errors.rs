use crate::core::types::{LockId, ThreadId};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the runtime half of the system, while events are being
/// recorded.
///
/// The notification API never propagates these to the caller; they are
/// absorbed and reflected through `is_enabled`. They surface directly only
/// from `set_log_repository` and from the segment allocator.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A thread started or joined itself, or referenced a thread that has no
    /// segment.
    #[error("invalid topology: {reason} (parent thread {parent}, child thread {child})")]
    InvalidTopology {
        reason: &'static str,
        parent: ThreadId,
        child: ThreadId,
    },

    /// A stream of the repository could not be created or opened.
    #[error("unable to open the repository at {path}")]
    RepositoryIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors raised while reading a repository back and building the graphs.
///
/// Each variant carries the offending entity so the command-line tool can
/// explain the failure without string matching.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A stream contained an event of a kind that is not valid at that
    /// position, e.g. a segmentation stream not beginning with a start.
    #[error("encountered an event of type {actual} while expecting an event of type {expected}")]
    EventTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// A thread released a lock it was not holding.
    #[error("lock {lock} was unexpectedly released by thread {thread}")]
    UnexpectedRelease { thread: ThreadId, lock: LockId },

    /// A textual record did not parse as any event.
    #[error("malformed event record {record:?}")]
    CorruptRecord { record: String },

    /// The repository or one of its streams could not be read.
    #[error("unable to read the repository at {path}")]
    RepositoryIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
