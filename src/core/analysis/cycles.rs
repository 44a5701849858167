//! Enumeration of the cycles of the lock graph.
//!
//! This is deliberately a simple algorithm rather than Tiernan's or
//! Johnson's: a depth-first search records a predecessor edge for every tree
//! edge, and whenever a back edge is found the cycle is reconstructed by
//! walking the predecessors back from its source. A first search starts at
//! the first vertex; every vertex implicated in a cycle found so far then
//! becomes the root of another search, which uncovers the rotations of each
//! cycle the first pass could not see. Searching from a -> b -> a also finds
//! b -> a -> b, for example.
//!
//! Cycles are deduplicated by their exact edge sequence, so the same
//! sequence reached from two roots is reported once; rotations of one cycle
//! are distinct sequences and are left for the downstream filter to fold
//! together. The worst case is far from optimal, which is accepted: lock
//! graphs of well-designed programs rarely contain cycles at all.

use crate::core::graph::LockGraph;
use fxhash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Enumerate every cycle of `graph` as a sequence of edge ids, in discovery
/// order.
pub(crate) fn all_cycles(graph: &LockGraph) -> Vec<Vec<usize>> {
    let vertex_count = graph.vertex_count();
    if vertex_count == 0 {
        return Vec::new();
    }

    let mut seen = FxHashSet::default();
    let mut cycles = Vec::new();

    dfs_forest(graph, 0, &mut seen, &mut cycles);

    // Find all vertices implicated in the cycles found so far and start
    // over a depth-first search at each of them.
    let mut hot_vertices = BTreeSet::new();
    for cycle in &cycles {
        hot_vertices.insert(graph.index_of(graph.edge(cycle[0]).from));
        for &edge in cycle {
            hot_vertices.insert(graph.index_of(graph.edge(edge).to));
        }
    }
    hot_vertices.remove(&0); // already visited

    for &root in &hot_vertices {
        dfs_forest(graph, root, &mut seen, &mut cycles);
    }

    cycles
}

/// One full depth-first traversal of the graph, rooted at `root` and then
/// continuing from every still-unvisited vertex in order. Back edges emit
/// cycles into `out`, deduplicated through `seen`.
fn dfs_forest(
    graph: &LockGraph,
    root: usize,
    seen: &mut FxHashSet<Vec<usize>>,
    out: &mut Vec<Vec<usize>>,
) {
    let vertex_count = graph.vertex_count();
    let mut color = vec![Color::White; vertex_count];
    let mut predecessor: FxHashMap<usize, usize> = FxHashMap::default();

    let roots = std::iter::once(root).chain((0..vertex_count).filter(|&v| v != root));
    for start in roots {
        if color[start] != Color::White {
            continue;
        }

        color[start] = Color::Grey;
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some(top) = stack.last_mut() {
            let vertex = top.0;
            let out_edges = graph.out_edge_ids(vertex);
            if top.1 == out_edges.len() {
                color[vertex] = Color::Black;
                stack.pop();
                continue;
            }

            let edge = out_edges[top.1];
            top.1 += 1;
            let target = graph.index_of(graph.edge(edge).to);
            match color[target] {
                Color::White => {
                    predecessor.insert(target, edge);
                    color[target] = Color::Grey;
                    stack.push((target, 0));
                }
                Color::Grey => {
                    let cycle = reconstruct_cycle(graph, edge, &predecessor);
                    if seen.insert(cycle.clone()) {
                        out.push(cycle);
                    }
                }
                Color::Black => {}
            }
        }
    }
}

/// Walk the predecessor edges back from the source of `back_edge`, producing
/// the edge path `(u, v) (v, w) (w, x) ...` that closes the cycle.
fn reconstruct_cycle(
    graph: &LockGraph,
    back_edge: usize,
    predecessor: &FxHashMap<usize, usize>,
) -> Vec<usize> {
    let mut cycle = vec![back_edge];
    let mut vertex = graph.index_of(graph.edge(back_edge).from);
    while let Some(&edge) = predecessor.get(&vertex) {
        cycle.push(edge);
        vertex = graph.index_of(graph.edge(edge).from);
    }
    cycle.reverse();
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::{GatelockInterner, LockGraphLabel};
    use crate::core::types::{AcquireInfo, LockId, Segment, ThreadId};

    fn label(thread: ThreadId) -> LockGraphLabel {
        LockGraphLabel {
            s1: Segment::new(0),
            s2: Segment::new(0),
            thread,
            gatelocks: GatelockInterner::default().intern(Vec::new()),
            info_at_s1: AcquireInfo::default(),
            info_at_s2: AcquireInfo::default(),
        }
    }

    fn graph_of(edges: &[(LockId, LockId)]) -> LockGraph {
        let mut graph = LockGraph::default();
        for (thread, &(from, to)) in edges.iter().enumerate() {
            graph.add_edge(from, to, label(thread));
        }
        graph
    }

    fn endpoints(graph: &LockGraph, cycle: &[usize]) -> Vec<(LockId, LockId)> {
        cycle
            .iter()
            .map(|&id| (graph.edge(id).from, graph.edge(id).to))
            .collect()
    }

    #[test]
    fn acyclic_graphs_have_no_cycles() {
        let graph = graph_of(&[(1, 2), (2, 3), (1, 3)]);
        assert!(all_cycles(&graph).is_empty());
    }

    #[test]
    fn a_two_cycle_is_found_in_both_rotations() {
        let graph = graph_of(&[(1, 2), (2, 1)]);
        let cycles = all_cycles(&graph);

        let mut paths: Vec<_> = cycles.iter().map(|c| endpoints(&graph, c)).collect();
        paths.sort();
        assert_eq!(
            paths,
            vec![vec![(1, 2), (2, 1)], vec![(2, 1), (1, 2)]]
        );
    }

    #[test]
    fn a_three_cycle_is_found() {
        let graph = graph_of(&[(1, 2), (2, 3), (3, 1)]);
        let cycles = all_cycles(&graph);

        assert!(
            cycles
                .iter()
                .any(|c| endpoints(&graph, c) == vec![(1, 2), (2, 3), (3, 1)])
        );
    }

    #[test]
    fn disjoint_cycles_are_all_found() {
        let graph = graph_of(&[(1, 2), (2, 1), (3, 4), (4, 3)]);
        let cycles = all_cycles(&graph);

        let paths: Vec<_> = cycles.iter().map(|c| endpoints(&graph, c)).collect();
        assert!(paths.contains(&vec![(1, 2), (2, 1)]));
        assert!(paths.contains(&vec![(3, 4), (4, 3)]));
    }

    #[test]
    fn identical_sequences_from_different_roots_are_reported_once() {
        let graph = graph_of(&[(1, 2), (2, 1)]);
        let cycles = all_cycles(&graph);

        let mut sequences = cycles.clone();
        sequences.sort();
        sequences.dedup();
        assert_eq!(sequences.len(), cycles.len());
    }
}
