//! The per-file analysis result consumed by the graph builder and cache.

use crate::ast::Expr;
use kiln_common::ContentHash;
use kiln_diagnostics::{Diagnostic, Severity};
use kiln_source::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four kinds of definition a builder call can declare.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    /// `gql.model(...)`
    Model,
    /// `gql.fragment(...)`
    Fragment,
    /// `gql.slice(...)`
    Slice,
    /// `gql.operation(...)`
    Operation,
}

impl DefinitionKind {
    /// Maps a builder method name to a definition kind.
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "model" => Some(DefinitionKind::Model),
            "fragment" => Some(DefinitionKind::Fragment),
            "slice" => Some(DefinitionKind::Slice),
            "operation" => Some(DefinitionKind::Operation),
            _ => None,
        }
    }

    /// The builder method name for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            DefinitionKind::Model => "model",
            DefinitionKind::Fragment => "fragment",
            DefinitionKind::Slice => "slice",
            DefinitionKind::Operation => "operation",
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder methods that build values but do not declare definitions.
pub const HELPER_METHODS: &[&str] = &["field"];

/// Where a definition or binding starts in its file.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Byte range of the whole declaration.
    pub span: Span,
    /// 1-indexed line of the span start.
    pub line: u32,
    /// 1-indexed column of the span start.
    pub column: u32,
}

/// What a raw reference names.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum ReferenceTarget {
    /// A free identifier: a top-level name of this file or an imported name.
    Identifier(String),
    /// A definition nested inside the same top-level binding, by in-file path.
    Nested(String),
}

impl fmt::Display for ReferenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceTarget::Identifier(name) | ReferenceTarget::Nested(name) => f.write_str(name),
        }
    }
}

/// A name used inside a definition or binding body.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RawReference {
    /// The referenced name.
    pub target: ReferenceTarget,
    /// Where the first use appears.
    pub span: Span,
}

/// A definition declared by a statically reachable builder call.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    /// Which builder method declared it.
    pub kind: DefinitionKind,
    /// The in-file path, e.g. `queries.byId`.
    pub export_path: String,
    /// Whether the enclosing top-level binding is exported.
    pub exported: bool,
    /// Where the builder call appears.
    pub location: SourceLocation,
    /// The builder call expression.
    pub expr: Expr,
    /// Names the call reads, in order of first use.
    pub raw_references: Vec<RawReference>,
}

/// A plain top-level binding (a constant, helper or object holding nested
/// definitions). Bindings become graph nodes so definitions can read them,
/// but never become artifact elements.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// The bound name, which is also its in-file path.
    pub name: String,
    /// Whether the binding is exported.
    pub exported: bool,
    /// Where the declaration appears.
    pub location: SourceLocation,
    /// The initializer with nested definitions replaced by references.
    pub expr: Expr,
    /// Names the initializer reads, in order of first use.
    pub raw_references: Vec<RawReference>,
}

/// One imported name.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBinding {
    /// The local name.
    pub local: String,
    /// The name exported by the target module.
    pub imported: String,
    /// The module specifier as written.
    pub specifier: String,
    /// Source range of the import specifier.
    pub span: Span,
}

/// One entry of a module's export table.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ExportEntry {
    /// `export const x` or `export { local as exported }`.
    Local {
        /// The name visible to importers.
        exported: String,
        /// The local binding, declaration or import it refers to.
        local: String,
    },
    /// `export { imported as exported } from "specifier"`.
    ReExport {
        /// The name visible to importers.
        exported: String,
        /// The name in the target module.
        imported: String,
        /// The target module specifier.
        specifier: String,
    },
    /// `export * from "specifier"`.
    ReExportAll {
        /// The target module specifier.
        specifier: String,
    },
}

/// The analysis of one source file.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleAnalysis {
    /// The normalized path of the analyzed file.
    pub file_path: String,
    /// Hash of the analyzed source text.
    pub content_hash: ContentHash,
    /// Definitions in source order.
    pub definitions: Vec<Definition>,
    /// Plain top-level bindings in source order.
    #[serde(default)]
    pub bindings: Vec<Binding>,
    /// Imported names in source order.
    pub imports: Vec<ImportBinding>,
    /// The export table in source order.
    pub exports: Vec<ExportEntry>,
    /// Problems found in the file.
    pub diagnostics: Vec<Diagnostic>,
}

impl ModuleAnalysis {
    /// Returns `true` if any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Looks up a definition by in-file path.
    pub fn definition(&self, path: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.export_path == path)
    }

    /// Looks up a plain binding by name.
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// Looks up an import by local name.
    pub fn import(&self, local: &str) -> Option<&ImportBinding> {
        self.imports.iter().find(|i| i.local == local)
    }

    /// Returns `true` if `name` is a top-level definition or binding.
    pub fn declares(&self, name: &str) -> bool {
        self.definition(name).is_some() || self.binding(name).is_some()
    }
}
