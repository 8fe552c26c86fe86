//! Walks a parsed module and collects its definitions, bindings, imports and
//! exports.
//!
//! A definition call is statically reachable when it is the initializer of a
//! top-level binding or sits on an object-literal property path below one.
//! The straight-line statements of a function reached that way count too:
//! `const` initializers and `return` values in its body, or the expression
//! body of an arrow. Reachable calls become [`Definition`]s named by their
//! in-file path (`factory.arrow#0.baseQuery`). At the top level they are
//! replaced in the enclosing binding by [`Expr::DefinitionRef`]. Calls
//! anywhere else (branches, blocks, array elements, call arguments) are
//! reported as `ANALYSIS_NON_TOP_LEVEL_DEFINITION`.
//!
//! A definition inside a function is evaluated on its own, outside any call
//! of that function. Reads of the function's parameters or plain locals are
//! left unresolved and fail when the element is evaluated; locals bound to
//! other lifted definitions link to those definitions.

use crate::analysis::*;
use crate::ast::*;
use kiln_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Location};
use kiln_source::{LineIndex, Span};
use std::collections::{HashMap, HashSet};

/// The declarations collected from one module.
pub(crate) struct Collected {
    pub definitions: Vec<Definition>,
    pub bindings: Vec<Binding>,
    pub imports: Vec<ImportBinding>,
    pub exports: Vec<ExportEntry>,
}

/// Collects the declarations of a parsed module, reporting problems to `sink`.
pub(crate) fn collect(file_path: &str, source: &str, ast: ModuleAst, sink: &DiagnosticSink) -> Collected {
    let mut collector = Collector {
        file_path,
        lines: LineIndex::new(source),
        sink,
        definitions: Vec::new(),
        bindings: Vec::new(),
        imports: Vec::new(),
        exports: Vec::new(),
        declared: HashSet::new(),
        used_paths: HashMap::new(),
        anonymous: HashMap::new(),
        locals: Vec::new(),
    };
    for stmt in ast.items {
        collector.top_level(stmt);
    }
    collector.finish()
}

struct Collector<'a> {
    file_path: &'a str,
    lines: LineIndex,
    sink: &'a DiagnosticSink,
    definitions: Vec<Definition>,
    bindings: Vec<Binding>,
    imports: Vec<ImportBinding>,
    exports: Vec<(ExportEntry, Span)>,
    declared: HashSet<String>,
    used_paths: HashMap<String, usize>,
    anonymous: HashMap<String, usize>,
    /// Names bound by the enclosing function bodies, innermost last.
    locals: Vec<Local>,
}

/// A parameter or declaration of an enclosing function body.
struct Local {
    name: String,
    /// In-file path of the definition the name was initialized with.
    definition: Option<String>,
}

impl Collector<'_> {
    fn location(&self, span: Span) -> SourceLocation {
        let (line, column) = self.lines.line_col(span.start);
        SourceLocation { span, line, column }
    }

    fn diag_location(&self, path: &[String], span: Span) -> Location {
        let location = Location::file(self.file_path).with_span(span);
        if path.is_empty() {
            location
        } else {
            location.with_ast_path(path.join("."))
        }
    }

    /// Records a top-level name. Returns `false` for a duplicate.
    fn declare(&mut self, name: &str, span: Span) -> bool {
        if self.declared.insert(name.to_string()) {
            return true;
        }
        self.sink.emit(
            Diagnostic::error(
                DiagnosticCode::AnalysisDuplicateBinding,
                format!("`{name}` is declared more than once"),
            )
            .with_location(Location::file(self.file_path).with_span(span))
            .with_help("rename one of the declarations"),
        );
        false
    }

    fn top_level(&mut self, stmt: Stmt) {
        match stmt {
            Stmt::Import {
                specifiers, source, ..
            } => {
                for spec in specifiers {
                    if self.declare(&spec.local, spec.span) {
                        self.imports.push(ImportBinding {
                            local: spec.local,
                            imported: spec.imported,
                            specifier: source.clone(),
                            span: spec.span,
                        });
                    }
                }
            }
            Stmt::ExportDecl { decl, span } => {
                let name = match decl.as_ref() {
                    Stmt::Var { name, .. } | Stmt::Function { name, .. } => Some(name.clone()),
                    _ => None,
                };
                if let Some(name) = name {
                    self.exports.push((
                        ExportEntry::Local {
                            exported: name.clone(),
                            local: name,
                        },
                        span,
                    ));
                }
                self.top_level(*decl);
            }
            Stmt::ExportList {
                specifiers, source, ..
            } => {
                for spec in specifiers {
                    let entry = match &source {
                        None => ExportEntry::Local {
                            exported: spec.exported,
                            local: spec.local,
                        },
                        Some(specifier) => ExportEntry::ReExport {
                            exported: spec.exported,
                            imported: spec.local,
                            specifier: specifier.clone(),
                        },
                    };
                    self.exports.push((entry, spec.span));
                }
            }
            Stmt::ExportAll { source, span } => {
                self.exports
                    .push((ExportEntry::ReExportAll { specifier: source }, span));
            }
            Stmt::Var {
                name,
                name_span,
                init,
                span,
                ..
            } => {
                if !self.declare(&name, name_span) {
                    return;
                }
                let init = init.unwrap_or(Expr::Null { span: name_span });
                let mut path = vec![name.clone()];
                let expr = self.lift(init, &mut path);
                if matches!(expr, Expr::DefinitionRef { .. }) {
                    // The initializer itself was the definition.
                    return;
                }
                let raw_references = references(&expr);
                let location = self.location(span);
                self.bindings.push(Binding {
                    name,
                    exported: false,
                    location,
                    expr,
                    raw_references,
                });
            }
            Stmt::Function {
                name,
                name_span,
                params,
                body,
                span,
            } => {
                if !self.declare(&name, name_span) {
                    return;
                }
                let mut path = vec![name.clone()];
                self.bind_locals(&params);
                self.function_body(&body, &mut path);
                self.locals.clear();
                let expr = Expr::Function {
                    name: Some(name.clone()),
                    params,
                    body,
                    span,
                };
                let raw_references = references(&expr);
                let location = self.location(span);
                self.bindings.push(Binding {
                    name,
                    exported: false,
                    location,
                    expr,
                    raw_references,
                });
            }
            Stmt::If { .. } | Stmt::Block { .. } | Stmt::Return { .. } | Stmt::Expr { .. } => {
                self.scan_stmt(&stmt, &mut Vec::new());
            }
            Stmt::Error { .. } => {}
        }
    }

    /// Walks a statically reachable expression, extracting definitions.
    fn lift(&mut self, expr: Expr, path: &mut Vec<String>) -> Expr {
        if let Some(method) = expr.builder_method() {
            let Some(kind) = DefinitionKind::from_method(method) else {
                let method = method.to_string();
                self.check_helper(&method, expr.span(), path);
                return expr;
            };
            let span = expr.span();
            let export_path = self.define(kind, expr, path);
            return Expr::DefinitionRef {
                path: export_path,
                span,
            };
        }
        match expr {
            Expr::Object { properties, span } => {
                let mut lifted = Vec::with_capacity(properties.len());
                for prop in properties {
                    lifted.push(match prop {
                        Property::KeyValue { key, value, span } => {
                            path.push(key.clone());
                            let value = self.lift(value, path);
                            path.pop();
                            Property::KeyValue { key, value, span }
                        }
                        Property::Spread { expr } => {
                            self.scan(&expr, path);
                            Property::Spread { expr }
                        }
                        shorthand @ Property::Shorthand { .. } => shorthand,
                    });
                }
                Expr::Object {
                    properties: lifted,
                    span,
                }
            }
            function @ (Expr::Arrow { .. } | Expr::Function { .. }) => {
                self.function(&function, path);
                function
            }
            other => {
                self.scan(&other, path);
                other
            }
        }
    }

    fn define(&mut self, kind: DefinitionKind, expr: Expr, path: &[String]) -> String {
        let export_path = self.unique_path(path.join("."));
        let location = self.location(expr.span());
        let raw_references = self.local_references(&expr);
        self.definitions.push(Definition {
            kind,
            export_path: export_path.clone(),
            exported: false,
            location,
            expr,
            raw_references,
        });
        export_path
    }

    /// Walks a function reached from a statically reachable position.
    fn function(&mut self, expr: &Expr, path: &mut Vec<String>) {
        let segment = match expr {
            Expr::Function { name: Some(name), .. } => name.clone(),
            Expr::Function { name: None, .. } => self.anonymous_segment("function", path),
            _ => self.anonymous_segment("arrow", path),
        };
        path.push(segment);
        let mark = self.locals.len();
        match expr {
            Expr::Arrow { params, body, .. } => {
                self.bind_locals(params);
                match body {
                    ArrowBody::Expr { expr } => {
                        self.reachable(expr, path);
                    }
                    ArrowBody::Block { body } => self.function_body(body, path),
                }
            }
            Expr::Function {
                name, params, body, ..
            } => {
                self.bind_locals(name.iter().chain(params));
                self.function_body(body, path);
            }
            _ => {}
        }
        self.locals.truncate(mark);
        path.pop();
    }

    /// Walks the top-level statements of a reachable function body.
    fn function_body(&mut self, body: &[Stmt], path: &mut Vec<String>) {
        let declared: Vec<String> = body
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Var { name, .. } | Stmt::Function { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        self.bind_locals(&declared);

        for stmt in body {
            match stmt {
                Stmt::Var {
                    name,
                    init: Some(init),
                    ..
                } => {
                    path.push(name.clone());
                    let lifted = self.reachable(init, path);
                    path.pop();
                    if let Some(definition) = lifted {
                        if let Some(local) = self.locals.iter_mut().rev().find(|l| &l.name == name) {
                            local.definition = Some(definition);
                        }
                    }
                }
                Stmt::Function {
                    name, params, body, ..
                } => {
                    path.push(name.clone());
                    let mark = self.locals.len();
                    self.bind_locals(params);
                    self.function_body(body, path);
                    self.locals.truncate(mark);
                    path.pop();
                }
                Stmt::Return {
                    value: Some(value), ..
                } => {
                    self.reachable(value, path);
                }
                other => self.scan_stmt(other, path),
            }
        }
    }

    /// Walks an expression in a straight-line position of a function body.
    /// Returns the in-file path when the expression is itself a definition.
    fn reachable(&mut self, expr: &Expr, path: &mut Vec<String>) -> Option<String> {
        if let Some(method) = expr.builder_method() {
            let Some(kind) = DefinitionKind::from_method(method) else {
                self.check_helper(method, expr.span(), path);
                return None;
            };
            let linked = self.link_locals(expr.clone());
            return Some(self.define(kind, linked, path));
        }
        match expr {
            Expr::Object { properties, .. } => {
                for prop in properties {
                    match prop {
                        Property::KeyValue { key, value, .. } => {
                            path.push(key.clone());
                            self.reachable(value, path);
                            path.pop();
                        }
                        Property::Spread { expr } => self.scan(expr, path),
                        Property::Shorthand { .. } => {}
                    }
                }
            }
            Expr::Arrow { .. } | Expr::Function { .. } => self.function(expr, path),
            other => self.scan(other, path),
        }
        None
    }

    fn bind_locals<'n>(&mut self, names: impl IntoIterator<Item = &'n String>) {
        self.locals.extend(names.into_iter().map(|name| Local {
            name: name.clone(),
            definition: None,
        }));
    }

    fn local(&self, name: &str) -> Option<&Local> {
        self.locals.iter().rev().find(|local| local.name == name)
    }

    fn linked(&self, name: &str) -> Option<String> {
        self.local(name).and_then(|local| local.definition.clone())
    }

    /// References of a definition body. Names bound by an enclosing function
    /// are not module-level references.
    fn local_references(&self, expr: &Expr) -> Vec<RawReference> {
        references(expr)
            .into_iter()
            .filter(|reference| match &reference.target {
                ReferenceTarget::Identifier(name) => self.local(name).is_none(),
                ReferenceTarget::Nested(_) => true,
            })
            .collect()
    }

    /// Rewrites reads of locals bound to lifted definitions into references
    /// to those definitions.
    fn link_locals(&self, mut expr: Expr) -> Expr {
        if self.locals.iter().any(|local| local.definition.is_some()) {
            self.link(&mut expr);
        }
        expr
    }

    fn link(&self, expr: &mut Expr) {
        match expr {
            Expr::Ident { name, span } => {
                if let Some(path) = self.linked(name) {
                    let span = *span;
                    *expr = Expr::DefinitionRef { path, span };
                }
            }
            Expr::Array { elements, .. } => {
                for element in elements {
                    match element {
                        Element::Item { expr } | Element::Spread { expr } => self.link(expr),
                    }
                }
            }
            Expr::Object { properties, .. } => {
                for prop in properties.iter_mut() {
                    let replacement = match prop {
                        Property::KeyValue { value, .. } => {
                            self.link(value);
                            None
                        }
                        Property::Spread { expr } => {
                            self.link(expr);
                            None
                        }
                        Property::Shorthand { name, span } => self.linked(name).map(|path| Property::KeyValue {
                            key: name.clone(),
                            value: Expr::DefinitionRef { path, span: *span },
                            span: *span,
                        }),
                    };
                    if let Some(replacement) = replacement {
                        *prop = replacement;
                    }
                }
            }
            Expr::Member { object, .. } => self.link(object),
            Expr::Index { object, index, .. } => {
                self.link(object);
                self.link(index);
            }
            Expr::Call { callee, args, .. } => {
                self.link(callee);
                for arg in args {
                    match arg {
                        Element::Item { expr } | Element::Spread { expr } => self.link(expr),
                    }
                }
            }
            Expr::Null { .. }
            | Expr::Bool { .. }
            | Expr::Number { .. }
            | Expr::String { .. }
            | Expr::Arrow { .. }
            | Expr::Function { .. }
            | Expr::DefinitionRef { .. }
            | Expr::Error { .. } => {}
        }
    }

    /// Walks an expression in which no definition may appear.
    fn scan(&mut self, expr: &Expr, path: &mut Vec<String>) {
        if let Some(method) = expr.builder_method() {
            match DefinitionKind::from_method(method) {
                Some(kind) => self.non_top_level(kind, path, expr.span()),
                None => self.check_helper(method, expr.span(), path),
            }
            return;
        }
        match expr {
            Expr::Array { elements, .. } => {
                for element in elements {
                    self.scan(element.expr(), path);
                }
            }
            Expr::Object { properties, .. } => {
                for prop in properties {
                    match prop {
                        Property::KeyValue { key, value, .. } => {
                            path.push(key.clone());
                            self.scan(value, path);
                            path.pop();
                        }
                        Property::Spread { expr } => self.scan(expr, path),
                        Property::Shorthand { .. } => {}
                    }
                }
            }
            Expr::Member { object, .. } => self.scan(object, path),
            Expr::Index { object, index, .. } => {
                self.scan(object, path);
                self.scan(index, path);
            }
            Expr::Call { callee, args, .. } => {
                self.scan(callee, path);
                for arg in args {
                    self.scan(arg.expr(), path);
                }
            }
            Expr::Arrow { body, .. } => {
                let segment = self.anonymous_segment("arrow", path);
                path.push(segment);
                match body {
                    ArrowBody::Expr { expr } => self.scan(expr, path),
                    ArrowBody::Block { body } => self.scan_stmts(body, path),
                }
                path.pop();
            }
            Expr::Function { name, body, .. } => {
                let segment = match name {
                    Some(name) => name.clone(),
                    None => self.anonymous_segment("function", path),
                };
                path.push(segment);
                self.scan_stmts(body, path);
                path.pop();
            }
            Expr::Null { .. }
            | Expr::Bool { .. }
            | Expr::Number { .. }
            | Expr::String { .. }
            | Expr::Ident { .. }
            | Expr::DefinitionRef { .. }
            | Expr::Error { .. } => {}
        }
    }

    fn scan_stmts(&mut self, body: &[Stmt], path: &mut Vec<String>) {
        for stmt in body {
            self.scan_stmt(stmt, path);
        }
    }

    fn scan_stmt(&mut self, stmt: &Stmt, path: &mut Vec<String>) {
        match stmt {
            Stmt::Var {
                name,
                init: Some(init),
                ..
            } => {
                path.push(name.clone());
                self.scan(init, path);
                path.pop();
            }
            Stmt::Function { name, body, .. } => {
                path.push(name.clone());
                self.scan_stmts(body, path);
                path.pop();
            }
            Stmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                self.scan(cond, path);
                self.scan_stmt(then, path);
                if let Some(otherwise) = otherwise {
                    self.scan_stmt(otherwise, path);
                }
            }
            Stmt::Block { body, .. } => self.scan_stmts(body, path),
            Stmt::Return {
                value: Some(value), ..
            } => self.scan(value, path),
            Stmt::Expr { expr, .. } => self.scan(expr, path),
            Stmt::ExportDecl { decl, .. } => self.scan_stmt(decl, path),
            _ => {}
        }
    }

    fn non_top_level(&self, kind: DefinitionKind, path: &[String], span: Span) {
        self.sink.emit(
            Diagnostic::error(
                DiagnosticCode::AnalysisNonTopLevelDefinition,
                format!("`gql.{kind}` call is not in a statically reachable position"),
            )
            .with_location(self.diag_location(path, span))
            .with_note("definitions are re-evaluated outside their original control flow")
            .with_help("assign the definition to a top-level `const` or to an object property below one"),
        );
    }

    fn check_helper(&self, method: &str, span: Span, path: &[String]) {
        if HELPER_METHODS.contains(&method) {
            return;
        }
        self.sink.emit(
            Diagnostic::error(
                DiagnosticCode::AnalysisUnknownDefinitionKind,
                format!("unknown definition kind `gql.{method}`"),
            )
            .with_location(self.diag_location(path, span))
            .with_help("expected one of `model`, `fragment`, `slice`, `operation`"),
        );
    }

    /// Appends `$N` to a path that was already used in this file.
    fn unique_path(&mut self, path: String) -> String {
        let count = self.used_paths.entry(path.clone()).or_insert(0);
        let unique = if *count == 0 {
            path
        } else {
            format!("{path}${count}")
        };
        *count += 1;
        unique
    }

    /// Returns `arrow#N` / `function#N`, numbered per enclosing path.
    fn anonymous_segment(&mut self, prefix: &str, path: &[String]) -> String {
        let key = format!("{}/{prefix}", path.join("."));
        let counter = self.anonymous.entry(key).or_insert(0);
        let segment = format!("{prefix}#{counter}");
        *counter += 1;
        segment
    }

    fn finish(self) -> Collected {
        let mut exported_locals = HashSet::new();
        for (entry, span) in &self.exports {
            if let ExportEntry::Local { local, .. } = entry {
                if !self.declared.contains(local) {
                    self.sink.emit(
                        Diagnostic::error(
                            DiagnosticCode::AnalysisUnknownExport,
                            format!("`{local}` is exported but never declared or imported"),
                        )
                        .with_location(Location::file(self.file_path).with_span(*span)),
                    );
                }
                exported_locals.insert(local.clone());
            }
        }

        let mut definitions = self.definitions;
        for def in &mut definitions {
            let root = def.export_path.split('.').next().unwrap_or_default();
            def.exported = exported_locals.contains(root);
        }
        let mut bindings = self.bindings;
        for binding in &mut bindings {
            binding.exported = exported_locals.contains(&binding.name);
        }

        Collected {
            definitions,
            bindings,
            imports: self.imports,
            exports: self.exports.into_iter().map(|(entry, _)| entry).collect(),
        }
    }
}

/// Collects the free identifiers and nested-definition references of `expr`.
pub(crate) fn references(expr: &Expr) -> Vec<RawReference> {
    let mut refs = References::default();
    refs.expr(expr);
    refs.out
}

#[derive(Default)]
struct References {
    bound: Vec<String>,
    seen: HashSet<ReferenceTarget>,
    out: Vec<RawReference>,
}

impl References {
    fn push(&mut self, target: ReferenceTarget, span: Span) {
        if self.seen.insert(target.clone()) {
            self.out.push(RawReference { target, span });
        }
    }

    fn ident(&mut self, name: &str, span: Span) {
        if !self.bound.iter().any(|b| b == name) {
            self.push(ReferenceTarget::Identifier(name.to_string()), span);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident { name, span } => self.ident(name, *span),
            Expr::DefinitionRef { path, span } => {
                self.push(ReferenceTarget::Nested(path.clone()), *span)
            }
            Expr::Array { elements, .. } => {
                for element in elements {
                    self.expr(element.expr());
                }
            }
            Expr::Object { properties, .. } => {
                for prop in properties {
                    match prop {
                        Property::KeyValue { value, .. } => self.expr(value),
                        Property::Shorthand { name, span } => self.ident(name, *span),
                        Property::Spread { expr } => self.expr(expr),
                    }
                }
            }
            Expr::Member { object, .. } => self.expr(object),
            Expr::Index { object, index, .. } => {
                self.expr(object);
                self.expr(index);
            }
            Expr::Call { callee, args, .. } => {
                self.expr(callee);
                for arg in args {
                    self.expr(arg.expr());
                }
            }
            Expr::Arrow { params, body, .. } => {
                let mark = self.bound.len();
                self.bound.extend(params.iter().cloned());
                match body {
                    ArrowBody::Expr { expr } => self.expr(expr),
                    ArrowBody::Block { body } => self.block(body),
                }
                self.bound.truncate(mark);
            }
            Expr::Function {
                name, params, body, ..
            } => {
                let mark = self.bound.len();
                self.bound.extend(name.iter().cloned());
                self.bound.extend(params.iter().cloned());
                self.block(body);
                self.bound.truncate(mark);
            }
            Expr::Null { .. }
            | Expr::Bool { .. }
            | Expr::Number { .. }
            | Expr::String { .. }
            | Expr::Error { .. } => {}
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        let mark = self.bound.len();
        for stmt in body {
            if let Stmt::Var { name, .. } | Stmt::Function { name, .. } = stmt {
                self.bound.push(name.clone());
            }
        }
        for stmt in body {
            self.stmt(stmt);
        }
        self.bound.truncate(mark);
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var {
                init: Some(init), ..
            } => self.expr(init),
            Stmt::Function { params, body, .. } => {
                let mark = self.bound.len();
                self.bound.extend(params.iter().cloned());
                self.block(body);
                self.bound.truncate(mark);
            }
            Stmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                self.expr(cond);
                self.stmt(then);
                if let Some(otherwise) = otherwise {
                    self.stmt(otherwise);
                }
            }
            Stmt::Block { body, .. } => self.block(body),
            Stmt::Return {
                value: Some(value), ..
            } => self.expr(value),
            Stmt::Expr { expr, .. } => self.expr(expr),
            _ => {}
        }
    }
}
