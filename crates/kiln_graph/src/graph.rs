//! The dependency graph over canonical IDs.

use kiln_analyzer::DefinitionKind;
use kiln_common::CanonicalId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// What a graph node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A definition that becomes an artifact element.
    Definition(DefinitionKind),
    /// A plain top-level binding read by definitions.
    Binding,
}

/// A node of the dependency graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// The node's identity.
    pub id: CanonicalId,
    /// Definition or binding.
    pub kind: NodeKind,
}

/// What a free identifier in a node's body resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Another node of the graph.
    Node(CanonicalId),
    /// The `gql` builder intrinsic.
    Intrinsic,
    /// A named export of an injected module.
    External {
        /// The module specifier.
        specifier: String,
        /// The imported name.
        name: String,
    },
}

/// Per-file bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct FileInfo {
    /// The normalized absolute path the file was analyzed under.
    pub source_path: String,
    /// Nodes declared in the file, in ID order.
    pub ids: Vec<CanonicalId>,
}

/// A directed acyclic graph of definitions and bindings.
///
/// An edge `A -> B` means evaluating `A` needs the value of `B`. Files are
/// keyed by the file component of their canonical IDs.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    pub(crate) graph: DiGraph<GraphNode, ()>,
    pub(crate) index: HashMap<CanonicalId, NodeIndex>,
    pub(crate) scopes: HashMap<CanonicalId, BTreeMap<String, Resolved>>,
    pub(crate) files: BTreeMap<String, FileInfo>,
    pub(crate) order: Vec<CanonicalId>,
}

impl DependencyGraph {
    pub(crate) fn add_node(&mut self, id: CanonicalId, kind: NodeKind) -> NodeIndex {
        let idx = self.graph.add_node(GraphNode {
            id: id.clone(),
            kind,
        });
        self.index.insert(id, idx);
        idx
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Looks up a node.
    pub fn node(&self, id: &CanonicalId) -> Option<&GraphNode> {
        self.index.get(id).and_then(|idx| self.graph.node_weight(*idx))
    }

    /// Returns `true` if the graph contains `id`.
    pub fn contains(&self, id: &CanonicalId) -> bool {
        self.index.contains_key(id)
    }

    /// Every node ID in topological order: dependencies before dependents,
    /// ties broken by file path then in-file path.
    pub fn topological_order(&self) -> &[CanonicalId] {
        &self.order
    }

    /// The direct dependencies of `id`, sorted.
    pub fn dependencies(&self, id: &CanonicalId) -> Vec<CanonicalId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// The direct dependents of `id`, sorted.
    pub fn dependents(&self, id: &CanonicalId) -> Vec<CanonicalId> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: &CanonicalId, direction: Direction) -> Vec<CanonicalId> {
        let Some(idx) = self.index.get(id) else {
            return Vec::new();
        };
        let set: BTreeSet<CanonicalId> = self
            .graph
            .neighbors_directed(*idx, direction)
            .map(|n| self.graph[n].id.clone())
            .collect();
        set.into_iter().collect()
    }

    /// How the free identifiers of `id`'s body resolve.
    pub fn scope(&self, id: &CanonicalId) -> Option<&BTreeMap<String, Resolved>> {
        self.scopes.get(id)
    }

    /// All files in the build, including files that declare nothing.
    pub fn files(&self) -> &BTreeMap<String, FileInfo> {
        &self.files
    }

    /// The node IDs declared in `file`.
    pub fn ids_in_file(&self, file: &str) -> &[CanonicalId] {
        self.files.get(file).map(|f| f.ids.as_slice()).unwrap_or(&[])
    }

    /// For each file, the other files its nodes depend on directly.
    pub fn file_dependencies(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut deps: BTreeMap<String, BTreeSet<String>> = self
            .files
            .keys()
            .map(|file| (file.clone(), BTreeSet::new()))
            .collect();
        for edge in self.graph.raw_edges() {
            let from = self.graph[edge.source()].id.file_path();
            let to = self.graph[edge.target()].id.file_path();
            if from != to {
                deps.entry(from.to_string())
                    .or_default()
                    .insert(to.to_string());
            }
        }
        deps
    }

    /// Every node that transitively depends on any of `roots`, roots included.
    pub fn transitive_dependents<'a>(
        &self,
        roots: impl IntoIterator<Item = &'a CanonicalId>,
    ) -> BTreeSet<CanonicalId> {
        let mut seen = BTreeSet::new();
        let mut queue: Vec<NodeIndex> = roots
            .into_iter()
            .filter_map(|id| self.index.get(id).copied())
            .collect();
        while let Some(idx) = queue.pop() {
            if !seen.insert(self.graph[idx].id.clone()) {
                continue;
            }
            queue.extend(self.graph.neighbors_directed(idx, Direction::Incoming));
        }
        seen
    }
}
