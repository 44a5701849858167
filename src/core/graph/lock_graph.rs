//! The lock-order graph: a directed multigraph over locks whose labeled
//! edges record that some thread held the source lock and then acquired the
//! target lock within a particular pair of segments.
//!
//! # How it is built
//!
//! Each per-thread stream is replayed in program order while tracking that
//! thread's current segment and its stack of held locks. Whenever the thread
//! acquires a lock `l`, one edge `g -> l` is added for every lock `g` it
//! already holds, labeled with the segments involved, the thread, the other
//! gatelocks and the diagnostic metadata of both acquisition sites. Cycles
//! in this graph are candidate deadlocks; whether they survive the deadlock
//! filter is decided later.

use crate::core::errors::AnalysisError;
use crate::core::events::Event;
use crate::core::types::{AcquireInfo, LockId, Segment, ThreadId};
use fxhash::FxHashMap;
use std::sync::Arc;

/// Set of locks a thread already held at the moment it acquired another,
/// kept in acquisition order.
///
/// Many edges carry equal gatelock sets, so the underlying storage is shared:
/// cloning a `Gatelocks` only bumps a reference count, and
/// [`GatelockInterner`] hands out one shared allocation per distinct set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gatelocks {
    locks: Arc<[LockId]>,
}

impl Gatelocks {
    fn from_vec(locks: Vec<LockId>) -> Self {
        Gatelocks {
            locks: locks.into(),
        }
    }

    pub fn contains(&self, lock: LockId) -> bool {
        self.locks.contains(&lock)
    }

    /// Whether the two sets have any lock in common.
    pub fn intersects(&self, other: &Gatelocks) -> bool {
        self.locks.iter().any(|&lock| other.contains(lock))
    }

    pub fn iter(&self) -> impl Iterator<Item = LockId> + '_ {
        self.locks.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn shares_storage_with(&self, other: &Gatelocks) -> bool {
        Arc::ptr_eq(&self.locks, &other.locks)
    }
}

/// Interning table mapping each distinct gatelock sequence to one shared
/// allocation, keeping the graph's footprint bounded when many edges share
/// the same context.
#[derive(Debug, Default)]
pub struct GatelockInterner {
    table: FxHashMap<Vec<LockId>, Gatelocks>,
}

impl GatelockInterner {
    pub fn intern(&mut self, locks: Vec<LockId>) -> Gatelocks {
        if let Some(shared) = self.table.get(&locks) {
            return shared.clone();
        }
        let shared = Gatelocks::from_vec(locks.clone());
        self.table.insert(locks, shared.clone());
        shared
    }
}

/// Label of one lock-order edge.
///
/// Thread `thread`, while in segment `s1`, held the locks in `gatelocks`
/// (excluding the edge's own source) and acquired the edge's target; the
/// acquisition completed in segment `s2`. The metadata of both acquisition
/// sites is part of the label, so diagnostic variants of the same ordering
/// are kept as distinct edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockGraphLabel {
    pub s1: Segment,
    pub s2: Segment,
    pub thread: ThreadId,
    pub gatelocks: Gatelocks,
    pub info_at_s1: AcquireInfo,
    pub info_at_s2: AcquireInfo,
}

/// One labeled edge of the lock graph.
#[derive(Debug)]
pub struct LockEdge {
    pub from: LockId,
    pub to: LockId,
    pub label: LockGraphLabel,
}

/// Directed multigraph over locks. Vertices are created implicitly on first
/// acquisition; parallel edges are allowed as long as their labels differ.
#[derive(Debug, Default)]
pub struct LockGraph {
    vertices: Vec<LockId>,
    vertex_index: FxHashMap<LockId, usize>,
    edges: Vec<LockEdge>,
    out_edges: Vec<Vec<usize>>,
}

impl LockGraph {
    pub fn num_locks(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub(crate) fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub(crate) fn index_of(&self, lock: LockId) -> usize {
        self.vertex_index[&lock]
    }

    pub(crate) fn edge(&self, id: usize) -> &LockEdge {
        &self.edges[id]
    }

    pub(crate) fn out_edge_ids(&self, vertex: usize) -> &[usize] {
        &self.out_edges[vertex]
    }

    fn ensure_vertex(&mut self, lock: LockId) -> usize {
        if let Some(&index) = self.vertex_index.get(&lock) {
            return index;
        }
        let index = self.vertices.len();
        self.vertices.push(lock);
        self.vertex_index.insert(lock, index);
        self.out_edges.push(Vec::new());
        index
    }

    /// Add an edge unless an identically labeled one between the same locks
    /// already exists. Self edges are never recorded.
    ///
    /// Returns whether the edge was added.
    pub fn add_edge(&mut self, from: LockId, to: LockId, label: LockGraphLabel) -> bool {
        if from == to {
            return false;
        }
        let from_index = self.ensure_vertex(from);
        self.ensure_vertex(to);

        let duplicate = self.out_edges[from_index].iter().any(|&id| {
            let edge = &self.edges[id];
            edge.to == to && edge.label == label
        });
        if duplicate {
            return false;
        }

        let id = self.edges.len();
        self.edges.push(LockEdge { from, to, label });
        self.out_edges[from_index].push(id);
        true
    }
}

/// A lock currently held by the thread being replayed.
struct HeldLock {
    lock: LockId,
    since: Segment,
    info: AcquireInfo,
}

/// State of one thread's replay: its current segment, its lock stack and the
/// recursion counts of its re-entrant locks.
struct ThreadReplay<'a> {
    graph: &'a mut LockGraph,
    interner: &'a mut GatelockInterner,
    thread: ThreadId,
    current_segment: Segment,
    held: Vec<HeldLock>,
    recursion: FxHashMap<LockId, usize>,
}

impl ThreadReplay<'_> {
    fn acquire(&mut self, lock: LockId, info: AcquireInfo) {
        for gate in &self.held {
            let gatelocks: Vec<LockId> = self
                .held
                .iter()
                .map(|held| held.lock)
                .filter(|&held| held != gate.lock)
                .collect();
            let label = LockGraphLabel {
                s1: gate.since,
                s2: self.current_segment,
                thread: self.thread,
                gatelocks: self.interner.intern(gatelocks),
                info_at_s1: gate.info.clone(),
                info_at_s2: info.clone(),
            };
            self.graph.add_edge(gate.lock, lock, label);
        }
        self.graph.ensure_vertex(lock);
        self.held.push(HeldLock {
            lock,
            since: self.current_segment,
            info,
        });
    }

    fn release(&mut self, lock: LockId) -> Result<(), AnalysisError> {
        // Locks need not be released in LIFO order; a release anywhere in
        // the stack removes the lock from its current position.
        match self.held.iter().rposition(|held| held.lock == lock) {
            Some(position) => {
                self.held.remove(position);
                Ok(())
            }
            None => Err(AnalysisError::UnexpectedRelease {
                thread: self.thread,
                lock,
            }),
        }
    }

    fn recursive_acquire(&mut self, lock: LockId, info: AcquireInfo) {
        let count = self.recursion.entry(lock).or_insert(0);
        if *count == 0 {
            *count += 1;
            self.acquire(lock, info);
        } else {
            *count += 1;
        }
    }

    fn recursive_release(&mut self, lock: LockId) -> Result<(), AnalysisError> {
        match self.recursion.get_mut(&lock) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.release(lock)?;
                }
                Ok(())
            }
            _ => Err(AnalysisError::UnexpectedRelease {
                thread: self.thread,
                lock,
            }),
        }
    }
}

/// Replay one thread's event stream, in program order, into the lock graph.
pub(crate) fn feed_thread_stream(
    graph: &mut LockGraph,
    interner: &mut GatelockInterner,
    thread: ThreadId,
    events: &[Event],
) -> Result<(), AnalysisError> {
    let mut replay = ThreadReplay {
        graph,
        interner,
        thread,
        current_segment: Segment::default(),
        held: Vec::new(),
        recursion: FxHashMap::default(),
    };

    for event in events {
        match event {
            Event::SegmentHop(hop) => replay.current_segment = hop.segment,
            Event::Acquire(acquire) => replay.acquire(acquire.lock, acquire.info.clone()),
            Event::Release(release) => replay.release(release.lock)?,
            Event::RecursiveAcquire(acquire) => {
                replay.recursive_acquire(acquire.lock, acquire.info.clone())
            }
            Event::RecursiveRelease(release) => replay.recursive_release(release.lock)?,
            other => {
                return Err(AnalysisError::EventTypeMismatch {
                    expected: "a thread-specific event",
                    actual: other.kind(),
                });
            }
        }
    }

    Ok(())
}
