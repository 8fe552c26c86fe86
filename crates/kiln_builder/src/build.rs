//! The build pipeline.
//!
//! ```text
//! discover -> analyze -> graph -> classify -> plan -> evaluate waves -> assemble -> persist
//! ```
//!
//! Cache hits contribute their stored elements and values; misses are
//! grouped into chunks and evaluated in dependency order. The cache is only
//! written when the build produces an artifact.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use kiln_analyzer::{Analyzer, ModuleAnalysis, SourceAnalyzer};
use kiln_artifact::{ArtifactElement, BuilderArtifact, CacheStats, Value};
use kiln_cache::{classify, CacheStore, FilePayload};
use kiln_common::{CanonicalId, InternalError};
use kiln_config::{load_config, resolve_schema, ResolvedBuildConfig};
use kiln_diagnostics::{Diagnostic, DiagnosticCode, Location};
use kiln_eval::{
    synthesize, ChunkOutput, ChunkProgram, Evaluator, ImportedValue, InjectedModules, LoadError, Sandbox,
};
use kiln_graph::{build_graph, DependencyGraph, GraphOptions, NodeKind, ResolverOptions};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analyze::analyze_files;
use crate::assemble::{assemble, Assembly};
use crate::cancel::CancellationToken;
use crate::discover::discover;
use crate::error::BuildError;
use crate::execute::run_chunk;
use crate::plan::{plan_chunks, ChunkStrategy};

/// Builds artifacts for one resolved schema configuration.
pub struct Builder {
    config: ResolvedBuildConfig,
    analyzer: Arc<dyn Analyzer>,
    evaluator: Arc<dyn Evaluator>,
    strategy: ChunkStrategy,
    cancellation: CancellationToken,
    partial_override: Option<bool>,
    strategy_override: Option<ChunkStrategy>,
}

impl Builder {
    /// A builder with the default analyzer and sandbox.
    pub fn new(config: ResolvedBuildConfig) -> Self {
        let strategy = ChunkStrategy::from(config.chunking);
        Self {
            config,
            analyzer: Arc::new(SourceAnalyzer),
            evaluator: Arc::new(Sandbox::new()),
            strategy,
            cancellation: CancellationToken::new(),
            partial_override: None,
            strategy_override: None,
        }
    }

    /// Loads `kiln.toml` from `project_dir` and resolves `schema`.
    pub fn from_project(project_dir: &Path, schema: &str) -> Result<Self, BuildError> {
        let config = load_config(project_dir)?;
        Ok(Self::new(resolve_schema(&config, schema, project_dir)?))
    }

    /// Replaces the module analyzer.
    pub fn with_analyzer(mut self, analyzer: impl Analyzer + 'static) -> Self {
        self.analyzer = Arc::new(analyzer);
        self
    }

    /// Replaces the chunk evaluator.
    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    /// Overrides the configured chunking.
    pub fn with_strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.strategy = strategy;
        self.strategy_override = Some(strategy);
        self
    }

    /// Overrides the configured failure mode.
    pub fn with_partial(mut self, partial: bool) -> Self {
        self.config.partial = partial;
        self.partial_override = Some(partial);
        self
    }

    /// Swaps in a freshly resolved configuration, keeping the overrides
    /// set through [`with_partial`](Self::with_partial) and
    /// [`with_strategy`](Self::with_strategy).
    pub fn reconfigure(&mut self, mut config: ResolvedBuildConfig) {
        if let Some(partial) = self.partial_override {
            config.partial = partial;
        }
        self.strategy = self
            .strategy_override
            .unwrap_or_else(|| ChunkStrategy::from(config.chunking));
        self.config = config;
    }

    /// Uses `token` to stop builds early.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The resolved configuration.
    pub fn config(&self) -> &ResolvedBuildConfig {
        &self.config
    }

    /// The token checked between pipeline stages and chunks.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Opens the cache store for this configuration.
    pub fn open_store(&self) -> CacheStore {
        CacheStore::load(&self.config.cache_dir, &self.config.name, self.config.fingerprint)
    }

    /// Runs one build against `store`.
    ///
    /// On success the store has been saved; on failure its persisted state
    /// is unchanged.
    pub fn build(&self, store: &mut CacheStore) -> Result<BuilderArtifact, BuildError> {
        let result = self.run(store);
        match &result {
            Ok(artifact) => info!(
                config = %self.config.name,
                elements = artifact.elements.len(),
                hits = artifact.report.stats.hits,
                misses = artifact.report.stats.misses,
                skips = artifact.report.stats.skips,
                warnings = artifact.report.warnings.len(),
                duration_ms = artifact.report.duration_ms,
                "build finished"
            ),
            Err(err) => {
                store.discard_pending();
                warn!(config = %self.config.name, code = %err.code(), "build failed: {err}");
            }
        }
        result
    }

    fn run(&self, store: &mut CacheStore) -> Result<BuilderArtifact, BuildError> {
        let started = Instant::now();
        info!(config = %self.config.name, partial = self.config.partial, "build started");

        let injected = Arc::new(InjectedModules::load(&self.config.inject).map_err(BuildError::Injected)?);
        let discovered = discover(&self.config)?;
        self.check_cancelled()?;

        let analyzed = analyze_files(&discovered.files, self.analyzer.as_ref(), store)?;
        let mut warnings = Vec::new();
        let mut hashes = BTreeMap::new();
        let mut keys = Vec::with_capacity(analyzed.len());
        let mut analyses = Vec::with_capacity(analyzed.len());
        for file in analyzed {
            if !file.cached {
                store.stage_analysis(&file.key, &file.analysis)?;
            }
            warnings.extend(file.analysis.diagnostics.iter().cloned());
            hashes.insert(file.key.clone(), file.content_hash);
            keys.push(file.key);
            analyses.push(file.analysis);
        }
        self.check_cancelled()?;

        let graph = build_graph(&analyses, &self.graph_options())?;
        let modules: HashMap<String, ModuleAnalysis> = keys.into_iter().zip(analyses).collect();
        let dependencies = graph.file_dependencies();
        let classification = classify(store, &hashes, &dependencies, discovered.skipped);
        let stats = CacheStats {
            hits: classification.hits.len(),
            misses: classification.misses.len(),
            skips: classification.skips.len(),
        };
        debug!(hits = stats.hits, misses = stats.misses, skips = stats.skips, "classified files");

        let mut state = EvalState::default();
        let mut assembly = Assembly {
            warnings,
            stats,
            ..Assembly::default()
        };
        for (file, payload) in classification.hits {
            for id in graph.ids_in_file(&file) {
                let value = payload
                    .value(id)
                    .ok_or_else(|| format!("`{id}` did not evaluate in an earlier build"));
                state.values.insert(id.clone(), value);
            }
            assembly.reused.extend(payload.elements);
            assembly.failures.extend(payload.failures);
        }

        let misses: BTreeSet<String> = classification.misses.into_keys().collect();
        let schedule = plan_chunks(&misses, &dependencies, self.strategy)?;
        debug!(
            waves = schedule.len(),
            chunks = schedule.iter().map(Vec::len).sum::<usize>(),
            "planned evaluation"
        );

        let mut next_index = 0;
        for wave in schedule {
            self.check_cancelled()?;
            let mut programs = Vec::with_capacity(wave.len());
            for files in &wave {
                programs.push(synthesize(next_index, files, &graph, &modules, |id| state.resolve(id))?);
                next_index += 1;
            }

            let results: Vec<(ChunkProgram, Option<Result<ChunkOutput, LoadError>>)> = programs
                .into_par_iter()
                .map(|program| {
                    if self.cancellation.is_cancelled() {
                        return (program, None);
                    }
                    let result = run_chunk(
                        Arc::clone(&self.evaluator),
                        Arc::clone(&injected),
                        program.clone(),
                        self.config.chunk_timeout,
                    );
                    (program, Some(result))
                })
                .collect();

            for (program, result) in results {
                match result {
                    Some(Ok(output)) => state.absorb(&program, output, &graph, &modules),
                    Some(Err(err)) => state.load_failed(&program, &err, &graph),
                    None => return Err(BuildError::Cancelled),
                }
            }
        }

        assembly.fresh = state.elements;
        assembly.failures.extend(state.failures);
        let artifact = assemble(assembly, self.config.partial, started.elapsed())?;

        for (file, payload) in &state.payloads {
            let hash = hashes
                .get(file)
                .copied()
                .ok_or_else(|| InternalError::new(format!("evaluated `{file}` without hashing it")))?;
            store.stage_file(file, hash, graph.ids_in_file(file).to_vec(), payload)?;
        }
        for file in &state.unloaded {
            store.remove_file(file);
        }
        store.retain_files(&hashes.keys().cloned().collect());
        store.save()?;
        Ok(artifact)
    }

    fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            base_dir: self.config.base_dir.clone(),
            resolver: ResolverOptions {
                extensions: self.config.extensions.clone(),
                aliases: self.config.aliases.clone(),
                graphql_system_aliases: self.config.graphql_system_aliases.clone(),
            },
        }
    }

    fn check_cancelled(&self) -> Result<(), BuildError> {
        if self.cancellation.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        Ok(())
    }
}

/// Values and results accumulated while evaluating waves.
#[derive(Default)]
struct EvalState {
    values: HashMap<CanonicalId, ImportedValue>,
    elements: BTreeMap<CanonicalId, ArtifactElement>,
    failures: Vec<Diagnostic>,
    payloads: BTreeMap<String, FilePayload>,
    unloaded: BTreeSet<String>,
}

impl EvalState {
    fn resolve(&self, id: &CanonicalId) -> ImportedValue {
        self.values
            .get(id)
            .cloned()
            .unwrap_or_else(|| Err(format!("`{id}` was not evaluated")))
    }

    fn absorb(
        &mut self,
        program: &ChunkProgram,
        mut output: ChunkOutput,
        graph: &DependencyGraph,
        modules: &HashMap<String, ModuleAnalysis>,
    ) {
        for file in &program.files {
            let mut payload = FilePayload::default();
            for id in graph.ids_in_file(file) {
                let Some(node) = graph.node(id) else { continue };
                let result = match (output.values.remove(id), output.failures.remove(id)) {
                    (_, Some(reason)) => Err(reason),
                    (Some(value), None) => Ok(value),
                    (None, None) => Err("the evaluator produced no value".to_string()),
                };
                match (node.kind, result) {
                    (NodeKind::Definition(_), Ok(Value::Element(element))) => {
                        payload.elements.insert(id.clone(), (*element).clone());
                        self.elements.insert(id.clone(), (*element).clone());
                        self.values.insert(id.clone(), Ok(Value::Element(element)));
                    }
                    (NodeKind::Definition(_), Ok(other)) => {
                        let reason = format!("produced {} instead of an element", other.type_name());
                        self.fail_definition(id, reason, modules, &mut payload);
                    }
                    (NodeKind::Definition(_), Err(reason)) => {
                        self.fail_definition(id, reason, modules, &mut payload);
                    }
                    (NodeKind::Binding, Ok(value)) => {
                        payload.bindings.insert(id.clone(), value.clone());
                        self.values.insert(id.clone(), Ok(value));
                    }
                    (NodeKind::Binding, Err(reason)) => {
                        self.values.insert(id.clone(), Err(reason));
                    }
                }
            }
            self.payloads.insert(file.clone(), payload);
        }
    }

    fn fail_definition(
        &mut self,
        id: &CanonicalId,
        reason: String,
        modules: &HashMap<String, ModuleAnalysis>,
        payload: &mut FilePayload,
    ) {
        let mut location = Location::file(id.file_path()).with_ast_path(id.in_file_path());
        if let Some(definition) = modules
            .get(id.file_path())
            .and_then(|module| module.definition(id.in_file_path()))
        {
            location = location.with_span(definition.location.span);
        }
        let diag = Diagnostic::error(
            DiagnosticCode::ElementEvaluationFailed,
            format!("`{id}` failed to evaluate: {reason}"),
        )
        .with_location(location);
        payload.failures.push(diag.clone());
        self.failures.push(diag);
        self.values.insert(id.clone(), Err(reason));
    }

    fn load_failed(&mut self, program: &ChunkProgram, err: &LoadError, graph: &DependencyGraph) {
        warn!(chunk = program.index, files = ?program.files, "chunk failed to load: {err}");
        let mut diag = Diagnostic::error(
            DiagnosticCode::RuntimeModuleLoadFailed,
            format!("chunk {} failed to load: {err}", program.index),
        );
        if let Some(first) = program.files.first() {
            diag = diag.with_location(Location::file(first.as_str()));
        }
        for file in &program.files {
            diag = diag.with_related(file.as_str());
        }
        if let Some(help) = load_error_help(err) {
            diag = diag.with_help(help);
        }
        self.failures.push(diag);

        for file in &program.files {
            for id in graph.ids_in_file(file) {
                self.values
                    .insert(id.clone(), Err(format!("its chunk failed to load: {err}")));
            }
            self.unloaded.insert(file.clone());
        }
    }
}

fn load_error_help(err: &LoadError) -> Option<&'static str> {
    match err {
        LoadError::Timeout(_) => Some("raise `[builder].chunk_timeout_ms` or use `chunking = \"file\"`"),
        LoadError::MissingModule { .. } => Some("add the module to `[builder.inject]`"),
        LoadError::MissingExport { .. } => Some("add the export to the injected JSON module"),
        _ => None,
    }
}
