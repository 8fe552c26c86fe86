//! Merging reused and fresh elements into the final artifact.

use std::collections::BTreeMap;
use std::time::Duration;

use kiln_artifact::{ArtifactElement, BuildReport, BuilderArtifact, CacheStats};
use kiln_common::CanonicalId;
use kiln_diagnostics::Diagnostic;

use crate::error::BuildError;

/// Everything the assembler needs from one build.
#[derive(Debug, Default)]
pub struct Assembly {
    /// Elements of cache hits.
    pub reused: BTreeMap<CanonicalId, ArtifactElement>,
    /// Elements evaluated in this build.
    pub fresh: BTreeMap<CanonicalId, ArtifactElement>,
    /// Element and chunk failures, fresh and replayed.
    pub failures: Vec<Diagnostic>,
    /// Warnings gathered before evaluation.
    pub warnings: Vec<Diagnostic>,
    /// Cache counts for the report.
    pub stats: CacheStats,
}

/// Produces the artifact.
///
/// Fresh elements replace reused ones with the same ID. Duplicate operation
/// names fail the build in every mode. Failures fail a strict build and
/// become warnings in a partial one.
pub fn assemble(assembly: Assembly, partial: bool, elapsed: Duration) -> Result<BuilderArtifact, BuildError> {
    let Assembly {
        reused,
        fresh,
        mut failures,
        mut warnings,
        stats,
    } = assembly;

    let mut elements = reused;
    elements.extend(fresh);
    check_operation_names(&elements)?;

    failures.sort_by(|a, b| failure_order(a).cmp(&failure_order(b)));
    if !failures.is_empty() {
        if !partial {
            return Err(BuildError::Evaluation { diagnostics: failures });
        }
        warnings.extend(failures.into_iter().map(Diagnostic::into_warning));
    }

    Ok(BuilderArtifact {
        elements,
        report: BuildReport {
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            warnings,
            stats,
        },
    })
}

/// Fails on the alphabetically first operation name declared more than once.
pub fn check_operation_names(elements: &BTreeMap<CanonicalId, ArtifactElement>) -> Result<(), BuildError> {
    let mut by_name: BTreeMap<&str, Vec<&CanonicalId>> = BTreeMap::new();
    for (id, element) in elements {
        if let Some(name) = element.operation_name() {
            by_name.entry(name).or_default().push(id);
        }
    }
    match by_name.into_iter().find(|(_, ids)| ids.len() > 1) {
        Some((name, ids)) => Err(BuildError::DuplicateOperation {
            name: name.to_string(),
            sources: ids.into_iter().cloned().collect(),
        }),
        None => Ok(()),
    }
}

fn failure_order(diag: &Diagnostic) -> (&str, &str, &str) {
    match &diag.location {
        Some(location) => (
            location.file_path.as_str(),
            location.ast_path.as_deref().unwrap_or(""),
            diag.message.as_str(),
        ),
        None => ("", "", diag.message.as_str()),
    }
}
