//! Post-mortem analysis of a recorded trace.
//!
//! A [`SyncSkeleton`] is a program stripped of everything unrelated to
//! synchronization: the segmentation graph built from the start/join stream
//! and the lock-order graph built from the per-thread streams. Its
//! [`deadlocks`](SyncSkeleton::deadlocks) method enumerates the cycles of
//! the lock graph and keeps those that could actually deadlock a real
//! execution.

mod cycles;

use crate::core::errors::AnalysisError;
use crate::core::graph::{GatelockInterner, LockGraph, SegmentationGraph, feed_thread_stream};
use crate::core::repository::Repository;
use crate::core::types::{LockId, ThreadId};
use fxhash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single thread within a potential deadlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlockedThread {
    pub thread: ThreadId,
    /// Locks held by the thread at the moment of the deadlock, in their
    /// order of acquisition. The last lock is the acquisition that would
    /// block.
    pub locks: Vec<LockId>,
}

impl fmt::Display for DeadlockedThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.locks.split_last() {
            Some((acquired, held)) => write!(
                f,
                "thread {} acquires lock {} while holding {:?}",
                self.thread, acquired, held
            ),
            None => write!(f, "thread {} holds no locks", self.thread),
        }
    }
}

/// A state which, if reached by the program, would deadlock it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotentialDeadlock {
    pub threads: Vec<DeadlockedThread>,
}

impl PotentialDeadlock {
    /// Two potential deadlocks are equivalent when their multisets of
    /// per-thread lock sets are equal, i.e. they only differ by rotation or
    /// by the order in which each thread acquired its locks.
    pub fn is_equivalent_to(&self, other: &PotentialDeadlock) -> bool {
        self.equivalence_key() == other.equivalence_key()
    }

    fn equivalence_key(&self) -> Vec<(ThreadId, Vec<LockId>)> {
        let mut key: Vec<(ThreadId, Vec<LockId>)> = self
            .threads
            .iter()
            .map(|thread| {
                let mut locks = thread.locks.clone();
                locks.sort_unstable();
                locks.dedup();
                (thread.thread, locks)
            })
            .collect();
        key.sort();
        key
    }
}

impl fmt::Display for PotentialDeadlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "potential deadlock between {} threads:",
            self.threads.len()
        )?;
        for thread in &self.threads {
            writeln!(f, "    {thread}")?;
        }
        Ok(())
    }
}

/// A program stripped from all information unrelated to synchronization.
///
/// Building one is potentially expensive: both graphs are constructed
/// eagerly from the repository's streams.
#[derive(Debug)]
pub struct SyncSkeleton {
    segmentation: SegmentationGraph,
    lock_graph: LockGraph,
    thread_count: usize,
}

impl SyncSkeleton {
    /// Build the skeleton from the events recorded in `repository`.
    ///
    /// The start/join stream may be absent, e.g. when the traced program
    /// never started a second thread; the segmentation graph is then empty
    /// and every pair of segments is unordered.
    pub fn from_repository(repository: &Repository) -> Result<Self, AnalysisError> {
        let segmentation = match repository.start_join_events()? {
            Some(events) => SegmentationGraph::from_events(&events)?,
            None => SegmentationGraph::default(),
        };

        let mut lock_graph = LockGraph::default();
        let mut interner = GatelockInterner::default();
        let streams = repository.thread_streams()?;
        let thread_count = streams.len();
        for (thread, events) in &streams {
            feed_thread_stream(&mut lock_graph, &mut interner, *thread, events)?;
        }

        Ok(SyncSkeleton {
            segmentation,
            lock_graph,
            thread_count,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        segmentation: SegmentationGraph,
        lock_graph: LockGraph,
        thread_count: usize,
    ) -> Self {
        SyncSkeleton {
            segmentation,
            lock_graph,
            thread_count,
        }
    }

    /// Number of threads spawned in the part of the program captured by the
    /// skeleton.
    pub fn number_of_threads(&self) -> usize {
        self.thread_count
    }

    /// Number of unique locks created in the part of the program captured by
    /// the skeleton.
    pub fn number_of_locks(&self) -> usize {
        self.lock_graph.num_locks()
    }

    /// Report the potential deadlocks of the trace, one representative per
    /// equivalence class.
    ///
    /// A cycle of the lock graph is a potential deadlock only if every
    /// ordered pair of its edges could be reached concurrently: the threads
    /// must differ, the gatelock sets must not overlap, and the segments
    /// must not be ordered by happens-before.
    pub fn deadlocks(&self) -> Vec<PotentialDeadlock> {
        let mut reports = Vec::new();
        let mut seen_keys: FxHashSet<Vec<(ThreadId, Vec<LockId>)>> = FxHashSet::default();

        for cycle in cycles::all_cycles(&self.lock_graph) {
            if !self.is_deadlock(&cycle) {
                continue;
            }
            let report = self.report(&cycle);
            if seen_keys.insert(report.equivalence_key()) {
                reports.push(report);
            }
        }

        reports
    }

    fn is_deadlock(&self, cycle: &[usize]) -> bool {
        for (i, &e1) in cycle.iter().enumerate() {
            for (j, &e2) in cycle.iter().enumerate() {
                if i == j {
                    continue;
                }
                let first = &self.lock_graph.edge(e1).label;
                let second = &self.lock_graph.edge(e2).label;

                let concurrent =
                    // The threads must differ.
                    first.thread != second.thread
                    // The gatelock sets must not overlap.
                    && !first.gatelocks.intersects(&second.gatelocks)
                    // The segments must not be ordered.
                    && !self.segmentation.happens_before(first.s2, second.s1);

                if !concurrent {
                    return false;
                }
            }
        }
        true
    }

    fn report(&self, cycle: &[usize]) -> PotentialDeadlock {
        let threads = cycle
            .iter()
            .map(|&id| {
                let edge = self.lock_graph.edge(id);
                let mut locks: Vec<LockId> = edge.label.gatelocks.iter().collect();
                locks.push(edge.from);
                locks.push(edge.to);
                DeadlockedThread {
                    thread: edge.label.thread,
                    locks,
                }
            })
            .collect();
        PotentialDeadlock { threads }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{Event, JoinEvent, StartEvent};
    use crate::core::graph::LockGraphLabel;
    use crate::core::types::{AcquireInfo, Segment};

    struct SkeletonBuilder {
        segmentation_events: Vec<Event>,
        lock_graph: LockGraph,
        interner: GatelockInterner,
    }

    impl SkeletonBuilder {
        fn new() -> Self {
            SkeletonBuilder {
                segmentation_events: Vec::new(),
                lock_graph: LockGraph::default(),
                interner: GatelockInterner::default(),
            }
        }

        fn start(mut self, parent: usize, new_parent: usize, child: usize) -> Self {
            self.segmentation_events.push(Event::Start(StartEvent {
                parent: Segment::new(parent),
                new_parent: Segment::new(new_parent),
                child: Segment::new(child),
            }));
            self
        }

        fn join(mut self, parent: usize, new_parent: usize, child: usize) -> Self {
            self.segmentation_events.push(Event::Join(JoinEvent {
                parent: Segment::new(parent),
                new_parent: Segment::new(new_parent),
                child: Segment::new(child),
            }));
            self
        }

        fn edge(
            mut self,
            from: LockId,
            to: LockId,
            thread: ThreadId,
            segment: usize,
            gatelocks: &[LockId],
        ) -> Self {
            let label = LockGraphLabel {
                s1: Segment::new(segment),
                s2: Segment::new(segment),
                thread,
                gatelocks: self.interner.intern(gatelocks.to_vec()),
                info_at_s1: AcquireInfo::default(),
                info_at_s2: AcquireInfo::default(),
            };
            self.lock_graph.add_edge(from, to, label);
            self
        }

        fn deadlocks(self) -> Vec<PotentialDeadlock> {
            let segmentation = SegmentationGraph::from_events(&self.segmentation_events).unwrap();
            SyncSkeleton::from_parts(segmentation, self.lock_graph, 2).deadlocks()
        }
    }

    #[test]
    fn an_unordered_inversion_between_two_threads_is_reported_once() {
        let deadlocks = SkeletonBuilder::new()
            .start(0, 1, 2)
            .edge(1, 2, 0, 1, &[])
            .edge(2, 1, 1, 2, &[])
            .deadlocks();

        assert_eq!(deadlocks.len(), 1);
        assert_eq!(deadlocks[0].threads.len(), 2);
    }

    #[test]
    fn a_cycle_within_one_thread_is_not_a_deadlock() {
        let deadlocks = SkeletonBuilder::new()
            .start(0, 1, 2)
            .edge(1, 2, 0, 1, &[])
            .edge(2, 1, 0, 1, &[])
            .deadlocks();

        assert!(deadlocks.is_empty());
    }

    #[test]
    fn a_common_gatelock_serializes_the_threads() {
        let deadlocks = SkeletonBuilder::new()
            .start(0, 1, 2)
            .edge(1, 2, 0, 1, &[9])
            .edge(2, 1, 1, 2, &[9])
            .deadlocks();

        assert!(deadlocks.is_empty());
    }

    #[test]
    fn segments_ordered_by_a_join_cannot_deadlock() {
        // Thread 1 runs in segment 2, which the join orders before the
        // parent's post-join segment 3.
        let deadlocks = SkeletonBuilder::new()
            .start(0, 1, 2)
            .join(1, 3, 2)
            .edge(2, 1, 1, 2, &[])
            .edge(1, 2, 0, 3, &[])
            .deadlocks();

        assert!(deadlocks.is_empty());
    }

    #[test]
    fn rotations_of_one_cycle_collapse_into_one_report() {
        let deadlocks = SkeletonBuilder::new()
            .start(0, 1, 2)
            .edge(1, 2, 0, 1, &[])
            .edge(2, 1, 1, 2, &[])
            .deadlocks();

        assert_eq!(deadlocks.len(), 1);

        let report = &deadlocks[0];
        let rotated = PotentialDeadlock {
            threads: report.threads.iter().rev().cloned().collect(),
        };
        assert!(report.is_equivalent_to(&rotated));
    }

    #[test]
    fn reported_locks_are_gatelocks_then_source_then_target() {
        let deadlocks = SkeletonBuilder::new()
            .start(0, 1, 2)
            .edge(1, 2, 0, 1, &[5])
            .edge(2, 1, 1, 2, &[6])
            .deadlocks();

        assert_eq!(deadlocks.len(), 1);
        let locks_of = |thread: ThreadId| {
            deadlocks[0]
                .threads
                .iter()
                .find(|t| t.thread == thread)
                .map(|t| t.locks.clone())
                .unwrap()
        };
        assert_eq!(locks_of(0), vec![5, 1, 2]);
        assert_eq!(locks_of(1), vec![6, 2, 1]);
    }

    #[test]
    fn equivalence_ignores_acquisition_order_within_a_thread() {
        let first = PotentialDeadlock {
            threads: vec![
                DeadlockedThread { thread: 0, locks: vec![1, 2] },
                DeadlockedThread { thread: 1, locks: vec![2, 1] },
            ],
        };
        let second = PotentialDeadlock {
            threads: vec![
                DeadlockedThread { thread: 1, locks: vec![1, 2] },
                DeadlockedThread { thread: 0, locks: vec![2, 1] },
            ],
        };
        let third = PotentialDeadlock {
            threads: vec![
                DeadlockedThread { thread: 0, locks: vec![1, 2] },
                DeadlockedThread { thread: 2, locks: vec![2, 1] },
            ],
        };

        assert!(first.is_equivalent_to(&second));
        assert!(!first.is_equivalent_to(&third));
    }
}
