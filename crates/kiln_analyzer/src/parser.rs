//! Core parser infrastructure and statement-level parsing rules.
//!
//! The [`Parser`] struct provides primitive operations (advance, expect, eat)
//! and error recovery; statement rules live here and expression rules in
//! `expr.rs`. Syntax errors are reported to the diagnostic sink as
//! `ANALYSIS_PARSE_ERROR` and leave `Error` nodes behind so one file can
//! report several problems.

use crate::ast::*;
use crate::lexer::unescape;
use crate::token::{Token, TokenKind};
use kiln_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Location};
use kiln_source::Span;

/// A recursive descent parser over a token stream produced by the lexer.
pub struct Parser<'src> {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    pub(crate) source: &'src str,
    pub(crate) file_path: &'src str,
    pub(crate) sink: &'src DiagnosticSink,
}

impl<'src> Parser<'src> {
    /// Creates a new parser. `tokens` must have been lexed from `source`.
    pub fn new(
        tokens: Vec<Token>,
        source: &'src str,
        file_path: &'src str,
        sink: &'src DiagnosticSink,
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            file_path,
            sink,
        }
    }

    // ========================================================================
    // Primitive operations
    // ========================================================================

    pub(crate) fn current(&self) -> TokenKind {
        self.peek_kind(0)
    }

    pub(crate) fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or(self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }

    pub(crate) fn current_text(&self) -> &'src str {
        let span = self.current_span();
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or("")
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.current() == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.current() == TokenKind::Eof
    }

    pub(crate) fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    pub(crate) fn advance(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes `kind` or reports "expected" and returns `false`.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.expected(kind.describe());
            false
        }
    }

    /// Consumes an identifier and returns its text and span.
    pub(crate) fn expect_ident(&mut self) -> Option<(String, Span)> {
        if self.at(TokenKind::Identifier) {
            let text = self.current_text().to_string();
            let span = self.current_span();
            self.advance();
            Some((text, span))
        } else {
            self.expected("identifier");
            None
        }
    }

    /// Consumes a string literal and returns its decoded value.
    pub(crate) fn expect_string(&mut self) -> Option<String> {
        if self.at(TokenKind::String) {
            let value = unescape(self.current_text());
            self.advance();
            Some(value)
        } else {
            self.expected("string literal");
            None
        }
    }

    pub(crate) fn peek_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    pub(crate) fn span_from(&self, start: Span) -> Span {
        start.merge(self.prev_span())
    }

    // ========================================================================
    // Error handling and recovery
    // ========================================================================

    fn location(&self, span: Span) -> Location {
        Location::file(self.file_path).with_span(span)
    }

    /// Emits a parse error at the current position.
    pub(crate) fn error(&self, msg: &str) {
        self.sink.emit(
            Diagnostic::error(DiagnosticCode::AnalysisParseError, msg)
                .with_location(self.location(self.current_span())),
        );
    }

    /// Emits an "expected X, found Y" error at the current position.
    pub(crate) fn expected(&self, what: &str) {
        if self.at(TokenKind::Error) {
            // The lexer already reported this token.
            return;
        }
        self.error(&format!(
            "expected {what}, found {}",
            self.current().describe()
        ));
    }

    /// Reports a well-formed but unsupported construct.
    pub(crate) fn unsupported(&self, msg: &str, span: Span) {
        self.sink.emit(
            Diagnostic::error(DiagnosticCode::AnalysisUnsupportedSyntax, msg)
                .with_location(self.location(span)),
        );
    }

    /// Skips to the end of the current statement.
    ///
    /// Stops after a `;` or before a `}` at nesting depth zero, or before a
    /// token that can only start a new declaration.
    pub(crate) fn recover_to_statement_end(&mut self) {
        let mut depth = 0usize;
        while !self.at_eof() {
            match self.current() {
                TokenKind::LeftBrace | TokenKind::LeftParen | TokenKind::LeftBracket => depth += 1,
                TokenKind::RightBrace | TokenKind::RightParen | TokenKind::RightBracket => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::Import
                | TokenKind::Export
                | TokenKind::Const
                | TokenKind::Let
                | TokenKind::Var
                | TokenKind::Function
                    if depth == 0 =>
                {
                    return;
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn finish_statement(&mut self) {
        self.eat(TokenKind::Semicolon);
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Parses a complete module.
    pub fn parse_module(&mut self) -> ModuleAst {
        let mut items = Vec::new();
        while !self.at_eof() {
            let before = self.pos;
            if let Some(stmt) = self.parse_stmt(true) {
                items.push(stmt);
            }
            if self.pos == before {
                // A stray closing delimiter; the error is already reported.
                self.advance();
            }
        }
        ModuleAst { items }
    }

    /// Parses one statement. Returns `None` for an empty statement (`;`).
    pub(crate) fn parse_stmt(&mut self, top_level: bool) -> Option<Stmt> {
        let start = self.current_span();
        match self.current() {
            TokenKind::Semicolon => {
                self.advance();
                None
            }
            TokenKind::Import | TokenKind::Export if !top_level => {
                self.error("import and export declarations are only allowed at the top level");
                self.advance();
                self.recover_to_statement_end();
                Some(Stmt::Error {
                    span: self.span_from(start),
                })
            }
            TokenKind::Import => Some(self.parse_import()),
            TokenKind::Export => Some(self.parse_export()),
            TokenKind::Const | TokenKind::Let | TokenKind::Var => Some(self.parse_var()),
            TokenKind::Function => Some(self.parse_function_decl()),
            TokenKind::If => Some(self.parse_if()),
            TokenKind::LeftBrace => {
                let body = self.parse_block();
                Some(Stmt::Block {
                    body,
                    span: self.span_from(start),
                })
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.at(TokenKind::Semicolon)
                    || self.at(TokenKind::RightBrace)
                    || self.at_eof()
                {
                    None
                } else {
                    Some(self.parse_expr())
                };
                self.finish_statement();
                Some(Stmt::Return {
                    value,
                    span: self.span_from(start),
                })
            }
            _ => {
                let expr = self.parse_expr();
                if matches!(expr, Expr::Error { .. }) {
                    self.recover_to_statement_end();
                } else {
                    self.finish_statement();
                }
                Some(Stmt::Expr {
                    expr,
                    span: self.span_from(start),
                })
            }
        }
    }

    /// Parses `{ stmt* }` and returns the statements.
    pub(crate) fn parse_block(&mut self) -> Vec<Stmt> {
        let mut body = Vec::new();
        if !self.expect(TokenKind::LeftBrace) {
            return body;
        }
        while !self.at(TokenKind::RightBrace) && !self.at_eof() {
            let before = self.pos;
            if let Some(stmt) = self.parse_stmt(false) {
                body.push(stmt);
            }
            if self.pos == before {
                self.advance();
            }
        }
        self.expect(TokenKind::RightBrace);
        body
    }

    fn parse_import(&mut self) -> Stmt {
        let start = self.current_span();
        self.advance();

        if self.at(TokenKind::String) {
            // Side-effect import: `import "x";`
            let source = self.expect_string().unwrap_or_default();
            self.finish_statement();
            return Stmt::Import {
                specifiers: Vec::new(),
                source,
                span: self.span_from(start),
            };
        }

        if !self.at(TokenKind::LeftBrace) {
            self.unsupported(
                "only named imports (`import { a } from \"...\"`) are supported",
                start.merge(self.current_span()),
            );
            self.recover_to_statement_end();
            return Stmt::Error {
                span: self.span_from(start),
            };
        }

        let specifiers = self.parse_name_list(|imported, local, span| ImportSpecifier {
            imported,
            local,
            span,
        });
        let source = if self.expect(TokenKind::From) {
            self.expect_string()
        } else {
            None
        };
        match source {
            Some(source) => {
                self.finish_statement();
                Stmt::Import {
                    specifiers,
                    source,
                    span: self.span_from(start),
                }
            }
            None => {
                self.recover_to_statement_end();
                Stmt::Error {
                    span: self.span_from(start),
                }
            }
        }
    }

    /// Parses `{ a, b as c }` into a list built by `make(name, alias, span)`.
    fn parse_name_list<T>(&mut self, make: impl Fn(String, String, Span) -> T) -> Vec<T> {
        let mut out = Vec::new();
        self.expect(TokenKind::LeftBrace);
        while !self.at(TokenKind::RightBrace) && !self.at_eof() {
            let Some((name, span)) = self.expect_ident() else {
                self.recover_to_statement_end();
                return out;
            };
            let (alias, span) = if self.eat(TokenKind::As) {
                match self.expect_ident() {
                    Some((alias, alias_span)) => (alias, span.merge(alias_span)),
                    None => (name.clone(), span),
                }
            } else {
                (name.clone(), span)
            };
            out.push(make(name, alias, span));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightBrace);
        out
    }

    fn parse_export(&mut self) -> Stmt {
        let start = self.current_span();
        self.advance();
        match self.current() {
            TokenKind::Const | TokenKind::Let | TokenKind::Var | TokenKind::Function => {
                let decl = if self.at(TokenKind::Function) {
                    self.parse_function_decl()
                } else {
                    self.parse_var()
                };
                Stmt::ExportDecl {
                    decl: Box::new(decl),
                    span: self.span_from(start),
                }
            }
            TokenKind::LeftBrace => {
                let specifiers = self.parse_name_list(|local, exported, span| ExportSpecifier {
                    local,
                    exported,
                    span,
                });
                let source = if self.eat(TokenKind::From) {
                    self.expect_string()
                } else {
                    None
                };
                self.finish_statement();
                Stmt::ExportList {
                    specifiers,
                    source,
                    span: self.span_from(start),
                }
            }
            TokenKind::Star if self.peek_kind(1) == TokenKind::From => {
                self.advance();
                self.advance();
                let source = self.expect_string();
                self.finish_statement();
                match source {
                    Some(source) => Stmt::ExportAll {
                        source,
                        span: self.span_from(start),
                    },
                    None => Stmt::Error {
                        span: self.span_from(start),
                    },
                }
            }
            _ => {
                let what = if self.at(TokenKind::Default) {
                    "default exports are not supported; use a named export"
                } else {
                    "unsupported export form"
                };
                self.unsupported(what, start.merge(self.current_span()));
                self.recover_to_statement_end();
                Stmt::Error {
                    span: self.span_from(start),
                }
            }
        }
    }

    fn parse_var(&mut self) -> Stmt {
        let start = self.current_span();
        let declaration = match self.current() {
            TokenKind::Let => VarKind::Let,
            TokenKind::Var => VarKind::Var,
            _ => VarKind::Const,
        };
        self.advance();
        let Some((name, name_span)) = self.expect_ident() else {
            self.recover_to_statement_end();
            return Stmt::Error {
                span: self.span_from(start),
            };
        };
        let init = if self.eat(TokenKind::Eq) {
            let expr = self.parse_expr();
            if matches!(expr, Expr::Error { .. }) {
                self.recover_to_statement_end();
            }
            Some(expr)
        } else {
            None
        };
        if self.at(TokenKind::Comma) {
            self.unsupported(
                "declare one binding per statement",
                self.current_span(),
            );
            self.recover_to_statement_end();
        }
        self.finish_statement();
        Stmt::Var {
            declaration,
            name,
            name_span,
            init,
            span: self.span_from(start),
        }
    }

    fn parse_function_decl(&mut self) -> Stmt {
        let start = self.current_span();
        self.advance();
        let Some((name, name_span)) = self.expect_ident() else {
            self.recover_to_statement_end();
            return Stmt::Error {
                span: self.span_from(start),
            };
        };
        let params = self.parse_params();
        let body = self.parse_block();
        Stmt::Function {
            name,
            name_span,
            params,
            body,
            span: self.span_from(start),
        }
    }

    /// Parses `(a, b, c)`.
    pub(crate) fn parse_params(&mut self) -> Vec<String> {
        let mut params = Vec::new();
        if !self.expect(TokenKind::LeftParen) {
            return params;
        }
        while !self.at(TokenKind::RightParen) && !self.at_eof() {
            match self.expect_ident() {
                Some((name, _)) => params.push(name),
                None => {
                    // Skip a destructuring pattern or default value.
                    while !self.at(TokenKind::RightParen) && !self.at_eof() {
                        self.advance();
                    }
                    break;
                }
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParen);
        params
    }

    fn parse_if(&mut self) -> Stmt {
        let start = self.current_span();
        self.advance();
        self.expect(TokenKind::LeftParen);
        let cond = self.parse_expr();
        self.expect(TokenKind::RightParen);
        let then = self.parse_stmt(false).unwrap_or(Stmt::Block {
            body: Vec::new(),
            span: self.prev_span(),
        });
        let otherwise = if self.eat(TokenKind::Else) {
            self.parse_stmt(false).map(Box::new)
        } else {
            None
        };
        Stmt::If {
            cond,
            then: Box::new(then),
            otherwise,
            span: self.span_from(start),
        }
    }
}
