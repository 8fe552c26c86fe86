//! AST node types for definition modules.
//!
//! Expressions are serializable because definition and binding bodies are
//! stored in the cached [`ModuleAnalysis`](crate::ModuleAnalysis) and shipped
//! to the evaluator inside chunk programs.

use kiln_source::Span;
use serde::{Deserialize, Serialize};

/// A parsed module: the ordered list of top-level statements.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleAst {
    /// Top-level statements in source order.
    pub items: Vec<Stmt>,
}

/// The declaration keyword of a variable statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarKind {
    /// `const`
    Const,
    /// `let`
    Let,
    /// `var`
    Var,
}

/// One `name` or `name as alias` entry in an import list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImportSpecifier {
    /// The name exported by the target module.
    pub imported: String,
    /// The local binding name.
    pub local: String,
    /// Source range of the specifier.
    pub span: Span,
}

/// One `name` or `name as alias` entry in an export list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportSpecifier {
    /// The local (or, for re-exports, imported) name.
    pub local: String,
    /// The name visible to importers.
    pub exported: String,
    /// Source range of the specifier.
    pub span: Span,
}

/// A statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Stmt {
    /// `import { a, b as c } from "specifier";`
    Import {
        /// Imported names.
        specifiers: Vec<ImportSpecifier>,
        /// The module specifier.
        source: String,
        /// Source range.
        span: Span,
    },
    /// `export const ...` or `export function ...`
    ExportDecl {
        /// The exported declaration.
        decl: Box<Stmt>,
        /// Source range.
        span: Span,
    },
    /// `export { a, b as c };` or `export { a } from "specifier";`
    ExportList {
        /// Exported names.
        specifiers: Vec<ExportSpecifier>,
        /// Present for re-exports.
        source: Option<String>,
        /// Source range.
        span: Span,
    },
    /// `export * from "specifier";`
    ExportAll {
        /// The re-exported module.
        source: String,
        /// Source range.
        span: Span,
    },
    /// `const name = init;`
    Var {
        /// `const`, `let` or `var`.
        declaration: VarKind,
        /// The bound name.
        name: String,
        /// Source range of the name.
        name_span: Span,
        /// The initializer, if any.
        init: Option<Expr>,
        /// Source range.
        span: Span,
    },
    /// `function name(params) { body }`
    Function {
        /// The function name.
        name: String,
        /// Source range of the name.
        name_span: Span,
        /// Parameter names.
        params: Vec<String>,
        /// Body statements.
        body: Vec<Stmt>,
        /// Source range.
        span: Span,
    },
    /// `if (cond) then else otherwise`
    If {
        /// The condition.
        cond: Expr,
        /// The taken branch.
        then: Box<Stmt>,
        /// The `else` branch.
        otherwise: Option<Box<Stmt>>,
        /// Source range.
        span: Span,
    },
    /// `{ ... }`
    Block {
        /// Statements in the block.
        body: Vec<Stmt>,
        /// Source range.
        span: Span,
    },
    /// `return expr;`
    Return {
        /// The returned value.
        value: Option<Expr>,
        /// Source range.
        span: Span,
    },
    /// An expression statement.
    Expr {
        /// The expression.
        expr: Expr,
        /// Source range.
        span: Span,
    },
    /// A statement that failed to parse.
    Error {
        /// Source range.
        span: Span,
    },
}

/// An element of an array literal or call argument list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Element {
    /// A plain element.
    Item {
        /// The element value.
        expr: Expr,
    },
    /// `...expr`
    Spread {
        /// The spread operand.
        expr: Expr,
    },
}

impl Element {
    /// The wrapped expression, spread or not.
    pub fn expr(&self) -> &Expr {
        match self {
            Element::Item { expr } | Element::Spread { expr } => expr,
        }
    }
}

/// A property of an object literal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Property {
    /// `key: value`
    KeyValue {
        /// The property key.
        key: String,
        /// The property value.
        value: Expr,
        /// Source range.
        span: Span,
    },
    /// `name` (shorthand for `name: name`)
    Shorthand {
        /// The property name, also the referenced identifier.
        name: String,
        /// Source range.
        span: Span,
    },
    /// `...expr`
    Spread {
        /// The spread operand.
        expr: Expr,
    },
}

/// The body of an arrow function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ArrowBody {
    /// `=> expr`
    Expr {
        /// The returned expression.
        expr: Box<Expr>,
    },
    /// `=> { ... }`
    Block {
        /// Body statements.
        body: Vec<Stmt>,
    },
}

/// An expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expr {
    /// `null`
    Null {
        /// Source range.
        span: Span,
    },
    /// `true` / `false`
    Bool {
        /// The literal value.
        value: bool,
        /// Source range.
        span: Span,
    },
    /// A numeric literal (negative literals fold the leading `-`).
    Number {
        /// The literal value.
        value: f64,
        /// Source range.
        span: Span,
    },
    /// A string literal with escapes resolved.
    String {
        /// The literal value.
        value: String,
        /// Source range.
        span: Span,
    },
    /// An identifier reference.
    Ident {
        /// The identifier.
        name: String,
        /// Source range.
        span: Span,
    },
    /// `[a, ...b]`
    Array {
        /// Elements in order.
        elements: Vec<Element>,
        /// Source range.
        span: Span,
    },
    /// `{ a: 1, b, ...c }`
    Object {
        /// Properties in order.
        properties: Vec<Property>,
        /// Source range.
        span: Span,
    },
    /// `object.property`
    Member {
        /// The accessed object.
        object: Box<Expr>,
        /// The property name.
        property: String,
        /// Source range.
        span: Span,
    },
    /// `object[index]`
    Index {
        /// The accessed object.
        object: Box<Expr>,
        /// The index expression.
        index: Box<Expr>,
        /// Source range.
        span: Span,
    },
    /// `callee(args)`
    Call {
        /// The called expression.
        callee: Box<Expr>,
        /// Arguments, possibly spread.
        args: Vec<Element>,
        /// Source range.
        span: Span,
    },
    /// `(params) => body`
    Arrow {
        /// Parameter names.
        params: Vec<String>,
        /// The body.
        body: ArrowBody,
        /// Source range.
        span: Span,
    },
    /// `function (params) { ... }`
    Function {
        /// The optional function name.
        name: Option<String>,
        /// Parameter names.
        params: Vec<String>,
        /// Body statements.
        body: Vec<Stmt>,
        /// Source range.
        span: Span,
    },
    /// A reference to a definition nested in the same top-level binding,
    /// substituted for the definition call during analysis.
    DefinitionRef {
        /// The in-file path of the referenced definition.
        path: String,
        /// Source range of the original call.
        span: Span,
    },
    /// An expression that failed to parse.
    Error {
        /// Source range.
        span: Span,
    },
}

impl Expr {
    /// The source range of this expression.
    pub fn span(&self) -> Span {
        match self {
            Expr::Null { span }
            | Expr::Bool { span, .. }
            | Expr::Number { span, .. }
            | Expr::String { span, .. }
            | Expr::Ident { span, .. }
            | Expr::Array { span, .. }
            | Expr::Object { span, .. }
            | Expr::Member { span, .. }
            | Expr::Index { span, .. }
            | Expr::Call { span, .. }
            | Expr::Arrow { span, .. }
            | Expr::Function { span, .. }
            | Expr::DefinitionRef { span, .. }
            | Expr::Error { span } => *span,
        }
    }

    /// If this is a `gql.<method>(...)` call, returns the method name.
    pub fn builder_method(&self) -> Option<&str> {
        let Expr::Call { callee, .. } = self else {
            return None;
        };
        match callee.as_ref() {
            Expr::Member {
                object, property, ..
            } => match object.as_ref() {
                Expr::Ident { name, .. } if name == BUILDER_IDENT => Some(property.as_str()),
                _ => None,
            },
            _ => None,
        }
    }
}

/// The identifier through which definition builder calls are made.
pub const BUILDER_IDENT: &str = "gql";

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Expr {
        Expr::Ident {
            name: name.into(),
            span: Span::default(),
        }
    }

    #[test]
    fn builder_method_detection() {
        let call = Expr::Call {
            callee: Box::new(Expr::Member {
                object: Box::new(ident("gql")),
                property: "fragment".into(),
                span: Span::default(),
            }),
            args: vec![],
            span: Span::new(0, 10),
        };
        assert_eq!(call.builder_method(), Some("fragment"));
        assert_eq!(call.span(), Span::new(0, 10));

        let other = Expr::Call {
            callee: Box::new(ident("makeFragment")),
            args: vec![],
            span: Span::default(),
        };
        assert_eq!(other.builder_method(), None);
    }

    #[test]
    fn expressions_serialize_tagged() {
        let json = serde_json::to_value(ident("x")).unwrap();
        assert_eq!(json["kind"], "ident");
        assert_eq!(json["name"], "x");
    }
}
