//! The segmentation graph: a DAG over segments encoding the happens-before
//! partial order induced by thread starts and joins.
//!
//! For a start event `(p, p', c)` the graph gains the edges `p -> p'` and
//! `p -> c`; for a join event `(p, p', c)` it gains `p -> p'` and `c -> p'`.
//! Since every segment on the right-hand side of an event is freshly
//! allocated, the graph is acyclic by construction.

use crate::core::errors::AnalysisError;
use crate::core::events::Event;
use crate::core::types::Segment;
use fxhash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Directed acyclic graph over segments. `happens_before` is reachability.
#[derive(Debug, Default)]
pub struct SegmentationGraph {
    vertices: FxHashSet<Segment>,
    edges: FxHashMap<Segment, FxHashSet<Segment>>,
}

impl SegmentationGraph {
    /// Build the graph from the shared start/join stream, in arrival order.
    ///
    /// The first event of a non-empty stream must be a start (the trace of
    /// any program begins with its main thread starting another one), and
    /// only start and join events are allowed. On error nothing is built,
    /// so a failed construction leaves no partial graph behind.
    pub fn from_events(events: &[Event]) -> Result<Self, AnalysisError> {
        let mut graph = SegmentationGraph::default();

        for (position, event) in events.iter().enumerate() {
            match event {
                Event::Start(start) => {
                    graph.add_edge(start.parent, start.new_parent);
                    graph.add_edge(start.parent, start.child);
                }
                Event::Join(join) if position > 0 => {
                    graph.add_edge(join.parent, join.new_parent);
                    graph.add_edge(join.child, join.new_parent);
                }
                other => {
                    return Err(AnalysisError::EventTypeMismatch {
                        expected: if position == 0 { "start" } else { "start or join" },
                        actual: other.kind(),
                    });
                }
            }
        }

        Ok(graph)
    }

    fn add_edge(&mut self, from: Segment, to: Segment) {
        self.vertices.insert(from);
        self.vertices.insert(to);
        self.edges.entry(from).or_default().insert(to);
    }

    pub fn num_segments(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Whether every event in segment `u` finishes before any event in
    /// segment `v`, i.e. whether `v` is reachable from `u`.
    ///
    /// The relation is irreflexive: a segment does not happen before itself.
    pub fn happens_before(&self, u: Segment, v: Segment) -> bool {
        if u == v || !self.vertices.contains(&u) {
            return false;
        }

        let mut queue = VecDeque::new();
        let mut visited = FxHashSet::default();
        queue.push_back(u);
        visited.insert(u);

        while let Some(current) = queue.pop_front() {
            if let Some(successors) = self.edges.get(&current) {
                for &successor in successors {
                    if successor == v {
                        return true;
                    }
                    if visited.insert(successor) {
                        queue.push_back(successor);
                    }
                }
            }
        }

        false
    }
}
