//! Cycle detection by iterative depth-first search.
//!
//! Nodes carry a tri-state mark. Reaching an in-progress node is a back edge;
//! the frames on the explicit stack from that node upward are the cycle.

use crate::graph::GraphNode;
use kiln_common::CanonicalId;
use petgraph::graph::{DiGraph, NodeIndex};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

struct Frame {
    node: NodeIndex,
    successors: Vec<NodeIndex>,
    next: usize,
}

/// Returns the first cycle found, as a chain that repeats its first ID at
/// the end. Roots and successors are visited in ID order so the reported
/// chain is deterministic.
pub(crate) fn find_cycle(graph: &DiGraph<GraphNode, ()>) -> Option<Vec<CanonicalId>> {
    let mut marks = vec![Mark::Unvisited; graph.node_count()];
    let mut roots: Vec<NodeIndex> = graph.node_indices().collect();
    roots.sort_by(|a, b| graph[*a].id.cmp(&graph[*b].id));

    let frame = |node: NodeIndex| {
        let mut successors: Vec<NodeIndex> = graph.neighbors(node).collect();
        successors.sort_by(|a, b| graph[*a].id.cmp(&graph[*b].id));
        successors.dedup();
        Frame {
            node,
            successors,
            next: 0,
        }
    };

    for root in roots {
        if marks[root.index()] != Mark::Unvisited {
            continue;
        }
        marks[root.index()] = Mark::InProgress;
        let mut stack = vec![frame(root)];

        while let Some(top) = stack.last_mut() {
            if top.next == top.successors.len() {
                marks[top.node.index()] = Mark::Done;
                stack.pop();
                continue;
            }
            let succ = top.successors[top.next];
            top.next += 1;
            match marks[succ.index()] {
                Mark::Unvisited => {
                    marks[succ.index()] = Mark::InProgress;
                    stack.push(frame(succ));
                }
                Mark::InProgress => {
                    let start = stack.iter().position(|f| f.node == succ).unwrap_or(0);
                    let mut chain: Vec<CanonicalId> =
                        stack[start..].iter().map(|f| graph[f.node].id.clone()).collect();
                    chain.push(graph[succ].id.clone());
                    return Some(chain);
                }
                Mark::Done => {}
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use kiln_common::parse_canonical_id;

    fn graph(nodes: &[&str], edges: &[(usize, usize)]) -> DiGraph<GraphNode, ()> {
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
        g
    }

    fn ids(chain: Vec<CanonicalId>) -> Vec<String> {
        chain.into_iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn acyclic_graph_has_no_cycle() {
        let g = graph(&["a::x", "b::y", "c::z"], &[(0, 1), (1, 2), (0, 2)]);
        assert!(find_cycle(&g).is_none());
    }

    #[test]
    fn reports_full_chain() {
        let g = graph(
            &["a::x", "b::y", "c::z", "d::w"],
            &[(3, 0), (0, 1), (1, 2), (2, 0)],
        );
        assert_eq!(
            ids(find_cycle(&g).unwrap()),
            vec!["a::x", "b::y", "c::z", "a::x"]
        );
    }

    #[test]
    fn self_loop() {
        let g = graph(&["a::x"], &[(0, 0)]);
        assert_eq!(ids(find_cycle(&g).unwrap()), vec!["a::x", "a::x"]);
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let names: Vec<String> = (0..20_000).map(|i| format!("f.ts::n{i:05}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let edges: Vec<(usize, usize)> = (0..names.len() - 1).map(|i| (i, i + 1)).collect();
        let g = graph(&refs, &edges);
        assert!(find_cycle(&g).is_none());
    }
}
