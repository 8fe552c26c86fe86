//! Merging module analyses into one dependency graph.
//!
//! Every definition and plain binding becomes a node. Each raw reference is
//! resolved through the file's own declarations and import table, following
//! re-exports (named and `export *`) transitively, and becomes an edge or a
//! scope entry for the intrinsic and injected modules.

use crate::cycle::find_cycle;
use crate::error::GraphError;
use crate::graph::{DependencyGraph, FileInfo, NodeKind, Resolved};
use crate::order::topological_order;
use crate::resolver::{ModuleResolver, ModuleTarget, ResolverOptions};
use kiln_analyzer::{ExportEntry, ModuleAnalysis, RawReference, ReferenceTarget};
use kiln_common::{canonical_file_path, create_canonical_id, CanonicalId};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Inputs to graph construction besides the analyses.
#[derive(Debug, Clone, Default)]
pub struct GraphOptions {
    /// Canonical IDs are relative to this directory when set.
    pub base_dir: Option<String>,
    /// Module resolution settings.
    pub resolver: ResolverOptions,
}

/// Builds the dependency graph for a set of analyzed files.
///
/// Analyses must be keyed by normalized absolute paths. Files are processed
/// in path order so the first reported error is deterministic.
pub fn build_graph(
    analyses: &[ModuleAnalysis],
    options: &GraphOptions,
) -> Result<DependencyGraph, GraphError> {
    let mut sorted: Vec<&ModuleAnalysis> = analyses.iter().collect();
    sorted.sort_by(|a, b| a.file_path.cmp(&b.file_path));

    let base_dir = options.base_dir.as_deref();
    let mut graph = DependencyGraph::default();
    let mut ids: HashMap<&str, HashMap<&str, CanonicalId>> = HashMap::new();

    for &analysis in &sorted {
        let file_key = canonical_file_path(&analysis.file_path, base_dir)?;
        let mut info = FileInfo {
            source_path: analysis.file_path.clone(),
            ids: Vec::new(),
        };
        let table = ids.entry(analysis.file_path.as_str()).or_default();
        let declared = analysis
            .definitions
            .iter()
            .map(|d| (d.export_path.as_str(), NodeKind::Definition(d.kind)))
            .chain(analysis.bindings.iter().map(|b| (b.name.as_str(), NodeKind::Binding)));
        for (path, kind) in declared {
            let id = create_canonical_id(&analysis.file_path, path, base_dir)?;
            graph.add_node(id.clone(), kind);
            table.insert(path, id.clone());
            info.ids.push(id);
        }
        info.ids.sort();
        graph.files.insert(file_key, info);
    }

    let files: HashSet<String> = sorted.iter().map(|a| a.file_path.clone()).collect();
    let by_path: HashMap<&str, &ModuleAnalysis> =
        sorted.iter().map(|a| (a.file_path.as_str(), *a)).collect();
    let resolver = References {
        modules: ModuleResolver::new(&options.resolver, &files),
        by_path,
        ids: &ids,
    };

    for &analysis in &sorted {
        let mut bodies: Vec<(&str, &[RawReference])> = analysis
            .definitions
            .iter()
            .map(|d| (d.export_path.as_str(), d.raw_references.as_slice()))
            .chain(
                analysis
                    .bindings
                    .iter()
                    .map(|b| (b.name.as_str(), b.raw_references.as_slice())),
            )
            .collect();
        bodies.sort_by_key(|(path, _)| *path);

        for (path, references) in bodies {
            let Some(from) = resolver.lookup(&analysis.file_path, path).cloned() else {
                continue;
            };
            let mut scope = BTreeMap::new();
            for reference in references {
                let resolved = resolver
                    .resolve(analysis, &reference.target)
                    .map_err(|unresolved| GraphError::MissingImport {
                        importer: from.clone(),
                        target: unresolved.target,
                        reason: unresolved.reason,
                        span: reference.span,
                    })?;
                if let Resolved::Node(to) = &resolved {
                    let (a, b) = (graph.index[&from], graph.index[to]);
                    graph.graph.update_edge(a, b, ());
                }
                if let ReferenceTarget::Identifier(name) = &reference.target {
                    scope.insert(name.clone(), resolved);
                }
            }
            graph.scopes.insert(from, scope);
        }
    }

    if let Some(chain) = find_cycle(&graph.graph) {
        return Err(GraphError::CircularDependency { chain });
    }
    graph.order = topological_order(&graph.graph);

    debug!(
        files = graph.files.len(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "dependency graph built"
    );
    Ok(graph)
}

struct Unresolved {
    target: String,
    reason: String,
}

struct References<'a> {
    modules: ModuleResolver<'a>,
    by_path: HashMap<&'a str, &'a ModuleAnalysis>,
    ids: &'a HashMap<&'a str, HashMap<&'a str, CanonicalId>>,
}

impl References<'_> {
    fn lookup(&self, file: &str, path: &str) -> Option<&CanonicalId> {
        self.ids.get(file).and_then(|table| table.get(path))
    }

    fn resolve(&self, analysis: &ModuleAnalysis, target: &ReferenceTarget) -> Result<Resolved, Unresolved> {
        match target {
            ReferenceTarget::Nested(path) => self
                .lookup(&analysis.file_path, path)
                .map(|id| Resolved::Node(id.clone()))
                .ok_or_else(|| Unresolved {
                    target: path.clone(),
                    reason: "no definition at this in-file path".to_string(),
                }),
            ReferenceTarget::Identifier(name) => {
                self.resolve_local(analysis, name, &mut HashSet::new())
            }
        }
    }

    /// Resolves a top-level name of `analysis`: a declaration or an import.
    fn resolve_local(
        &self,
        analysis: &ModuleAnalysis,
        name: &str,
        visited: &mut HashSet<(String, String)>,
    ) -> Result<Resolved, Unresolved> {
        if let Some(id) = self.lookup(&analysis.file_path, name) {
            return Ok(Resolved::Node(id.clone()));
        }
        match analysis.import(name) {
            Some(import) => self.resolve_import(
                &analysis.file_path,
                &import.specifier,
                &import.imported,
                visited,
            ),
            None => Err(Unresolved {
                target: name.to_string(),
                reason: "it is neither declared nor imported in this file".to_string(),
            }),
        }
    }

    fn resolve_import(
        &self,
        importer: &str,
        specifier: &str,
        imported: &str,
        visited: &mut HashSet<(String, String)>,
    ) -> Result<Resolved, Unresolved> {
        match self.modules.resolve(importer, specifier) {
            None => Err(Unresolved {
                target: specifier.to_string(),
                reason: "no module in the build matches this specifier".to_string(),
            }),
            Some(ModuleTarget::Intrinsic) => Ok(Resolved::Intrinsic),
            Some(ModuleTarget::External(specifier)) => Ok(Resolved::External {
                specifier,
                name: imported.to_string(),
            }),
            Some(ModuleTarget::File(path)) => {
                self.resolve_export(&path, imported, visited)
                    .ok_or_else(|| Unresolved {
                        target: format!("{specifier}#{imported}"),
                        reason: format!("`{path}` does not export `{imported}`"),
                    })
            }
        }
    }

    /// Finds what `file` exports as `name`, following re-exports.
    fn resolve_export(
        &self,
        file: &str,
        name: &str,
        visited: &mut HashSet<(String, String)>,
    ) -> Option<Resolved> {
        if !visited.insert((file.to_string(), name.to_string())) {
            return None;
        }
        let analysis = self.by_path.get(file)?;
        for entry in &analysis.exports {
            match entry {
                ExportEntry::Local { exported, local } if exported == name => {
                    return self.resolve_local(analysis, local, visited).ok();
                }
                ExportEntry::ReExport {
                    exported,
                    imported,
                    specifier,
                } if exported == name => {
                    return self.resolve_import(file, specifier, imported, visited).ok();
                }
                _ => {}
            }
        }
        for entry in &analysis.exports {
            if let ExportEntry::ReExportAll { specifier } = entry {
                if let Some(ModuleTarget::File(target)) = self.modules.resolve(file, specifier) {
                    if let Some(resolved) = self.resolve_export(&target, name, visited) {
                        return Some(resolved);
                    }
                }
            }
        }
        None
    }
}
