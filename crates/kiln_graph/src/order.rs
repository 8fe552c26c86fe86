//! Deterministic topological ordering.

use crate::graph::GraphNode;
use kiln_common::CanonicalId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, HashSet};

/// Orders an acyclic graph so every node follows its dependencies.
///
/// Among nodes that are ready at the same time the smallest canonical ID
/// (file path, then in-file path) goes first. Nodes on a cycle are left
/// out; callers run cycle detection first.
pub(crate) fn topological_order(graph: &DiGraph<GraphNode, ()>) -> Vec<CanonicalId> {
    let mut remaining: Vec<usize> = graph
        .node_indices()
        .map(|idx| distinct(graph, idx, Direction::Outgoing).len())
        .collect();
    let mut ready: BTreeMap<CanonicalId, NodeIndex> = graph
        .node_indices()
        .filter(|idx| remaining[idx.index()] == 0)
        .map(|idx| (graph[idx].id.clone(), idx))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some((id, idx)) = ready.pop_first() {
        order.push(id);
        for dependent in distinct(graph, idx, Direction::Incoming) {
            let count = &mut remaining[dependent.index()];
            *count -= 1;
            if *count == 0 {
                ready.insert(graph[dependent].id.clone(), dependent);
            }
        }
    }
    order
}

fn distinct(graph: &DiGraph<GraphNode, ()>, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
    let mut seen = HashSet::new();
    graph
        .neighbors_directed(idx, direction)
        .filter(|n| seen.insert(*n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use kiln_common::parse_canonical_id;

    fn order(nodes: &[&str], edges: &[(usize, usize)]) -> Vec<String> {
        let mut g = DiGraph::new();
        let idx: Vec<_> = nodes
            .iter()
            .map(|n| {
                g.add_node(GraphNode {
                    id: parse_canonical_id(n).unwrap(),
                    kind: NodeKind::Binding,
                })
            })
            .collect();
        for (a, b) in edges {
            g.add_edge(idx[*a], idx[*b], ());
        }
        topological_order(&g).into_iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn dependencies_come_first() {
        // a needs b, b needs c.
        assert_eq!(
            order(&["a::x", "b::x", "c::x"], &[(0, 1), (1, 2)]),
            vec!["c::x", "b::x", "a::x"]
        );
    }

    #[test]
    fn independent_nodes_sorted_by_file_then_path() {
        assert_eq!(
            order(&["b.ts::a", "a.ts::z", "a.ts::b"], &[]),
            vec!["a.ts::b", "a.ts::z", "b.ts::a"]
        );
    }

    proptest::proptest! {
        #[test]
        fn every_edge_points_backwards(edges in proptest::collection::vec((0usize..12, 0usize..12), 0..40)) {
            let names: Vec<String> = (0..12).map(|i| format!("f{}.ts::n", i % 3 + i)).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            // Only keep edges from higher to lower index so the graph is acyclic.
            let dag: Vec<(usize, usize)> = edges.into_iter().filter(|(a, b)| a > b).collect();
            let sorted = order(&refs, &dag);
            proptest::prop_assert_eq!(sorted.len(), names.len());
            let position = |name: &str| sorted.iter().position(|s| s == name).unwrap();
            for (a, b) in dag {
                proptest::prop_assert!(position(&names[b]) < position(&names[a]));
            }
        }
    }

    #[test]
    fn duplicate_edges_counted_once() {
        assert_eq!(
            order(&["a::x", "b::x"], &[(0, 1), (0, 1)]),
            vec!["b::x", "a::x"]
        );
    }
}
