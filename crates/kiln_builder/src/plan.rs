//! Grouping cache misses into chunks and scheduling them in waves.
//!
//! Chunks of the same wave never depend on each other and run in parallel;
//! a chunk runs only after every chunk it reads values from finished in an
//! earlier wave.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use kiln_common::{InternalError, KilnResult};
use kiln_config::ChunkingMode;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;

/// How miss files are grouped into evaluation chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// One chunk per file. Files whose definitions read each other in a
    /// file-level cycle share a chunk.
    #[default]
    PerFile,
    /// One chunk per connected component of miss files.
    PerComponent,
}

impl From<ChunkingMode> for ChunkStrategy {
    fn from(mode: ChunkingMode) -> Self {
        match mode {
            ChunkingMode::File => ChunkStrategy::PerFile,
            ChunkingMode::Component => ChunkStrategy::PerComponent,
        }
    }
}

/// Waves of chunks; each chunk is a sorted list of file keys.
pub type Schedule = Vec<Vec<Vec<String>>>;

/// Plans the evaluation of `misses`.
///
/// `dependencies` maps each file to the files it reads from; dependencies
/// on files that are not misses are ignored because their values are
/// already materialized.
pub fn plan_chunks(
    misses: &BTreeSet<String>,
    dependencies: &BTreeMap<String, BTreeSet<String>>,
    strategy: ChunkStrategy,
) -> KilnResult<Schedule> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
    for file in misses {
        nodes.insert(file.as_str(), graph.add_node(file.as_str()));
    }
    for file in misses {
        for dep in dependencies.get(file).into_iter().flatten() {
            if let Some(&target) = nodes.get(dep.as_str()) {
                graph.add_edge(nodes[file.as_str()], target, ());
            }
        }
    }

    let groups: Vec<Vec<NodeIndex>> = match strategy {
        ChunkStrategy::PerFile => tarjan_scc(&graph),
        ChunkStrategy::PerComponent => {
            let mut sets = UnionFind::new(graph.node_count());
            for edge in graph.edge_references() {
                sets.union(edge.source().index(), edge.target().index());
            }
            let mut components: BTreeMap<usize, Vec<NodeIndex>> = BTreeMap::new();
            for node in graph.node_indices() {
                components.entry(sets.find(node.index())).or_default().push(node);
            }
            components.into_values().collect()
        }
    };

    let mut chunks: Vec<Vec<String>> = groups
        .into_iter()
        .map(|group| {
            let mut files: Vec<String> = group.into_iter().map(|n| graph[n].to_string()).collect();
            files.sort();
            files
        })
        .collect();
    chunks.sort();

    let chunk_of: HashMap<&str, usize> = chunks
        .iter()
        .enumerate()
        .flat_map(|(i, files)| files.iter().map(move |f| (f.as_str(), i)))
        .collect();
    let mut chunk_graph: DiGraph<usize, ()> = DiGraph::new();
    let chunk_nodes: Vec<NodeIndex> = (0..chunks.len()).map(|i| chunk_graph.add_node(i)).collect();
    for edge in graph.edge_references() {
        let from = chunk_of[graph[edge.source()]];
        let to = chunk_of[graph[edge.target()]];
        if from != to {
            chunk_graph.update_edge(chunk_nodes[from], chunk_nodes[to], ());
        }
    }

    let order = toposort(&chunk_graph, None)
        .map_err(|_| InternalError::new("chunk dependencies contain a cycle"))?;
    let mut levels = vec![0usize; chunks.len()];
    // Dependents come first in `order`, so walk it backwards.
    for node in order.into_iter().rev() {
        let level = chunk_graph
            .neighbors(node)
            .map(|dep| levels[chunk_graph[dep]] + 1)
            .max()
            .unwrap_or(0);
        levels[chunk_graph[node]] = level;
    }

    let wave_count = levels.iter().max().map_or(0, |max| max + 1);
    let mut schedule: Schedule = vec![Vec::new(); wave_count];
    for (chunk, level) in chunks.into_iter().zip(levels) {
        schedule[level].push(chunk);
    }
    Ok(schedule)
}
