//! Chunk program synthesis.
//!
//! A chunk program is a self-contained unit of evaluation: the chunk's own
//! nodes in topological order, each with a resolved scope, plus the already
//! materialized values of every node outside the chunk that it reads.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use kiln_analyzer::{Expr, ModuleAnalysis, RawReference, ReferenceTarget};
use kiln_artifact::Value;
use kiln_common::{CanonicalId, InternalError, KilnResult};
use kiln_graph::{DependencyGraph, NodeKind, Resolved};

/// The value of a node outside the chunk, or why it has none.
pub type ImportedValue = Result<Value, String>;

/// Where a name read by a step gets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRef {
    /// An earlier step of the same chunk.
    Step(usize),
    /// A node outside the chunk, listed in [`ChunkProgram::imports`].
    Import(CanonicalId),
    /// An export of an injected module.
    Injected {
        /// The module specifier.
        specifier: String,
        /// The export name.
        name: String,
    },
    /// The `gql` builder intrinsic.
    Intrinsic,
}

/// One node to evaluate.
#[derive(Debug, Clone)]
pub struct Step {
    /// The node's identity.
    pub id: CanonicalId,
    /// Definition or binding.
    pub kind: NodeKind,
    /// The body to evaluate.
    pub expr: Expr,
    /// Free identifiers of the body.
    pub scope: BTreeMap<String, SlotRef>,
    /// Nested definitions referenced by in-file path.
    pub nested: BTreeMap<String, SlotRef>,
}

/// A synthesized evaluation unit.
#[derive(Debug, Clone)]
pub struct ChunkProgram {
    /// Position of the chunk in the build's schedule.
    pub index: usize,
    /// Files evaluated by this chunk.
    pub files: Vec<String>,
    /// Steps in topological order.
    pub steps: Vec<Step>,
    /// Values of nodes outside the chunk read by any step.
    pub imports: BTreeMap<CanonicalId, ImportedValue>,
}

impl ChunkProgram {
    /// The injected module specifiers the program needs.
    pub fn required_modules(&self) -> BTreeSet<&str> {
        self.steps
            .iter()
            .flat_map(|step| step.scope.values())
            .filter_map(|slot| match slot {
                SlotRef::Injected { specifier, .. } => Some(specifier.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Builds the program evaluating every node of `files`.
///
/// `modules` maps file keys to their analyses. `resolve` supplies the value
/// of a node outside the chunk; it is called once per imported node.
pub fn synthesize(
    index: usize,
    files: &[String],
    graph: &DependencyGraph,
    modules: &HashMap<String, ModuleAnalysis>,
    resolve: impl Fn(&CanonicalId) -> ImportedValue,
) -> KilnResult<ChunkProgram> {
    let in_chunk: BTreeSet<&str> = files.iter().map(String::as_str).collect();
    let ids: Vec<&CanonicalId> = graph
        .topological_order()
        .iter()
        .filter(|id| in_chunk.contains(id.file_path()))
        .collect();
    let positions: HashMap<&CanonicalId, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut imports = BTreeMap::new();
    let mut slot_for = |target: &CanonicalId| match positions.get(target) {
        Some(position) => SlotRef::Step(*position),
        None => {
            imports
                .entry(target.clone())
                .or_insert_with(|| resolve(target));
            SlotRef::Import(target.clone())
        }
    };

    let mut steps = Vec::with_capacity(ids.len());
    for id in ids {
        let node = graph
            .node(id)
            .ok_or_else(|| InternalError::new(format!("`{id}` is ordered but not in the graph")))?;
        let module = modules
            .get(id.file_path())
            .ok_or_else(|| InternalError::new(format!("no analysis for `{}`", id.file_path())))?;
        let (expr, references) = body(module, id.in_file_path())
            .ok_or_else(|| InternalError::new(format!("no body for `{id}`")))?;

        let mut scope = BTreeMap::new();
        for (name, resolved) in graph.scope(id).into_iter().flatten() {
            let slot = match resolved {
                Resolved::Node(target) => slot_for(target),
                Resolved::Intrinsic => SlotRef::Intrinsic,
                Resolved::External { specifier, name: export } => SlotRef::Injected {
                    specifier: specifier.clone(),
                    name: export.clone(),
                },
            };
            scope.insert(name.clone(), slot);
        }

        let mut nested = BTreeMap::new();
        for reference in references {
            if let ReferenceTarget::Nested(path) = &reference.target {
                let target = id
                    .sibling(path)
                    .map_err(|e| InternalError::new(e.to_string()))?;
                nested.insert(path.clone(), slot_for(&target));
            }
        }

        steps.push(Step {
            id: id.clone(),
            kind: node.kind,
            expr: expr.clone(),
            scope,
            nested,
        });
    }

    Ok(ChunkProgram {
        index,
        files: files.to_vec(),
        steps,
        imports,
    })
}

fn body<'a>(module: &'a ModuleAnalysis, path: &str) -> Option<(&'a Expr, &'a [RawReference])> {
    module
        .definition(path)
        .map(|d| (&d.expr, d.raw_references.as_slice()))
        .or_else(|| module.binding(path).map(|b| (&b.expr, b.raw_references.as_slice())))
}
