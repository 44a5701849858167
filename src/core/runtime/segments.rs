//! Allocation of fresh segments at every thread start and join.

use crate::core::errors::RuntimeError;
use crate::core::types::{Segment, ThreadId};
use fxhash::FxHashMap;
use parking_lot::Mutex;

/// Segments involved in a start: the parent's old segment, its new one, and
/// the segment the child begins in.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StartSegments {
    pub parent: Segment,
    pub new_parent: Segment,
    pub child: Segment,
}

/// Segments involved in a join: the parent's old segment, its new one, and
/// the child's final segment.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JoinSegments {
    pub parent: Segment,
    pub new_parent: Segment,
    pub child: Segment,
}

#[derive(Debug, Default)]
struct AllocatorState {
    current: Segment,
    segment_of: FxHashMap<ThreadId, Segment>,
}

/// Process-wide segment allocator: a monotonic counter plus the mapping from
/// each live thread to its current segment, both guarded by a single mutex.
#[derive(Debug, Default)]
pub(crate) struct SegmentAllocator {
    state: Mutex<AllocatorState>,
}

impl SegmentAllocator {
    /// Record that `parent` started `child`, splitting the parent's segment
    /// and creating a fresh one for the child.
    pub(crate) fn on_start(
        &self,
        parent: ThreadId,
        child: ThreadId,
    ) -> Result<StartSegments, RuntimeError> {
        if parent == child {
            return Err(RuntimeError::InvalidTopology {
                reason: "a thread cannot start itself",
                parent,
                child,
            });
        }

        let mut state = self.state.lock();
        if !state.segment_of.is_empty() && !state.segment_of.contains_key(&parent) {
            return Err(RuntimeError::InvalidTopology {
                reason: "the starting thread was never started",
                parent,
                child,
            });
        }

        // On the very first start the parent owns the initial segment, which
        // equals the counter's initial value; the counter is pre-incremented
        // so the fresh segments stay distinct from it.
        let parent_segment = *state.segment_of.entry(parent).or_default();
        let new_parent_segment = state.current.next();
        let child_segment = new_parent_segment.next();
        state.current = child_segment;
        state.segment_of.insert(parent, new_parent_segment);
        state.segment_of.insert(child, child_segment);

        Ok(StartSegments {
            parent: parent_segment,
            new_parent: new_parent_segment,
            child: child_segment,
        })
    }

    /// Record that `parent` joined `child`, splitting the parent's segment
    /// again and retiring the child.
    pub(crate) fn on_join(
        &self,
        parent: ThreadId,
        child: ThreadId,
    ) -> Result<JoinSegments, RuntimeError> {
        if parent == child {
            return Err(RuntimeError::InvalidTopology {
                reason: "a thread cannot join itself",
                parent,
                child,
            });
        }

        let mut state = self.state.lock();
        let parent_segment =
            *state
                .segment_of
                .get(&parent)
                .ok_or(RuntimeError::InvalidTopology {
                    reason: "the joining thread was never started",
                    parent,
                    child,
                })?;
        let child_segment =
            *state
                .segment_of
                .get(&child)
                .ok_or(RuntimeError::InvalidTopology {
                    reason: "the joined thread was never started",
                    parent,
                    child,
                })?;

        let new_parent_segment = state.current.next();
        state.current = new_parent_segment;
        state.segment_of.insert(parent, new_parent_segment);
        state.segment_of.remove(&child);

        Ok(JoinSegments {
            parent: parent_segment,
            new_parent: new_parent_segment,
            child: child_segment,
        })
    }
}
