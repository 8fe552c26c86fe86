//! Expression parsing: literals, identifiers, arrays, objects, member access,
//! calls and arrow/function expressions.

use crate::ast::*;
use crate::lexer::unescape;
use crate::parser::Parser;
use crate::token::TokenKind;

impl Parser<'_> {
    /// Parses an expression.
    pub(crate) fn parse_expr(&mut self) -> Expr {
        if self.at(TokenKind::Identifier) && self.peek_kind(1) == TokenKind::FatArrow {
            let start = self.current_span();
            let param = self.current_text().to_string();
            self.advance();
            self.advance();
            return self.parse_arrow_body(vec![param], start);
        }
        if self.at(TokenKind::LeftParen) && self.is_arrow_ahead() {
            let start = self.current_span();
            let params = self.parse_params();
            self.expect(TokenKind::FatArrow);
            return self.parse_arrow_body(params, start);
        }
        let primary = self.parse_primary();
        self.parse_postfix(primary)
    }

    /// Returns `true` if the parenthesized group at the cursor is followed by `=>`.
    fn is_arrow_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut offset = 0usize;
        loop {
            match self.peek_kind(offset) {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        return self.peek_kind(offset + 1) == TokenKind::FatArrow;
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            offset += 1;
        }
    }

    fn parse_arrow_body(&mut self, params: Vec<String>, start: kiln_source::Span) -> Expr {
        let body = if self.at(TokenKind::LeftBrace) {
            ArrowBody::Block {
                body: self.parse_block(),
            }
        } else {
            ArrowBody::Expr {
                expr: Box::new(self.parse_expr()),
            }
        };
        Expr::Arrow {
            params,
            body,
            span: self.span_from(start),
        }
    }

    fn parse_primary(&mut self) -> Expr {
        let span = self.current_span();
        match self.current() {
            TokenKind::Null => {
                self.advance();
                Expr::Null { span }
            }
            TokenKind::True | TokenKind::False => {
                let value = self.at(TokenKind::True);
                self.advance();
                Expr::Bool { value, span }
            }
            TokenKind::Number => self.parse_number(false),
            TokenKind::Minus if self.peek_kind(1) == TokenKind::Number => {
                self.advance();
                self.parse_number(true)
            }
            TokenKind::String => {
                let value = unescape(self.current_text());
                self.advance();
                Expr::String { value, span }
            }
            TokenKind::Identifier => {
                let name = self.current_text().to_string();
                self.advance();
                Expr::Ident { name, span }
            }
            TokenKind::LeftBracket => self.parse_array(),
            TokenKind::LeftBrace => self.parse_object(),
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(TokenKind::RightParen);
                inner
            }
            TokenKind::Function => {
                self.advance();
                let name = if self.at(TokenKind::Identifier) {
                    self.expect_ident().map(|(n, _)| n)
                } else {
                    None
                };
                let params = self.parse_params();
                let body = self.parse_block();
                Expr::Function {
                    name,
                    params,
                    body,
                    span: self.span_from(span),
                }
            }
            TokenKind::RightBrace | TokenKind::RightParen | TokenKind::RightBracket | TokenKind::Eof => {
                self.expected("expression");
                Expr::Error { span }
            }
            _ => {
                self.expected("expression");
                self.advance();
                Expr::Error { span }
            }
        }
    }

    fn parse_number(&mut self, negative: bool) -> Expr {
        let start = if negative {
            self.prev_span()
        } else {
            self.current_span()
        };
        let text = self.current_text();
        let value = match text.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            Ok(_) => {
                self.error(&format!("number literal `{text}` is out of range"));
                0.0
            }
            Err(_) => {
                self.error(&format!("invalid number literal `{text}`"));
                0.0
            }
        };
        self.advance();
        Expr::Number {
            value: if negative { -value } else { value },
            span: self.span_from(start),
        }
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Expr {
        loop {
            let start = expr.span();
            match self.current() {
                TokenKind::Dot => {
                    self.advance();
                    if self.at(TokenKind::Identifier) || self.current().is_keyword() {
                        let property = self.current_text().to_string();
                        self.advance();
                        expr = Expr::Member {
                            object: Box::new(expr),
                            property,
                            span: self.span_from(start),
                        };
                    } else {
                        self.expected("property name");
                        return expr;
                    }
                }
                TokenKind::LeftParen => {
                    self.advance();
                    let args = self.parse_elements(TokenKind::RightParen);
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        span: self.span_from(start),
                    };
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expr();
                    self.expect(TokenKind::RightBracket);
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        span: self.span_from(start),
                    };
                }
                _ => return expr,
            }
        }
    }

    /// Parses comma-separated elements up to and including `close`.
    fn parse_elements(&mut self, close: TokenKind) -> Vec<Element> {
        let mut elements = Vec::new();
        while !self.at(close) && !self.at_eof() {
            let element = if self.eat(TokenKind::Ellipsis) {
                Element::Spread {
                    expr: self.parse_expr(),
                }
            } else {
                Element::Item {
                    expr: self.parse_expr(),
                }
            };
            let failed = matches!(element.expr(), Expr::Error { .. });
            elements.push(element);
            if failed || !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(close);
        elements
    }

    fn parse_array(&mut self) -> Expr {
        let start = self.current_span();
        self.advance();
        let elements = self.parse_elements(TokenKind::RightBracket);
        Expr::Array {
            elements,
            span: self.span_from(start),
        }
    }

    fn parse_object(&mut self) -> Expr {
        let start = self.current_span();
        self.advance();
        let mut properties = Vec::new();
        while !self.at(TokenKind::RightBrace) && !self.at_eof() {
            let prop_start = self.current_span();
            if self.eat(TokenKind::Ellipsis) {
                properties.push(Property::Spread {
                    expr: self.parse_expr(),
                });
            } else {
                let key = match self.current() {
                    TokenKind::String => unescape(self.current_text()),
                    TokenKind::Identifier | TokenKind::Number => self.current_text().to_string(),
                    kind if kind.is_keyword() => self.current_text().to_string(),
                    _ => {
                        self.expected("property key");
                        break;
                    }
                };
                let shorthand_ok = self.at(TokenKind::Identifier);
                self.advance();
                if self.eat(TokenKind::Colon) {
                    let value = self.parse_expr();
                    properties.push(Property::KeyValue {
                        key,
                        value,
                        span: self.span_from(prop_start),
                    });
                } else if shorthand_ok && (self.at(TokenKind::Comma) || self.at(TokenKind::RightBrace)) {
                    properties.push(Property::Shorthand {
                        name: key,
                        span: prop_start,
                    });
                } else {
                    self.expected("`:`");
                    break;
                }
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        if !self.expect(TokenKind::RightBrace) {
            self.recover_to_statement_end();
            self.eat(TokenKind::RightBrace);
        }
        Expr::Object {
            properties,
            span: self.span_from(start),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::lexer::lex;
    use crate::parser::Parser;
    use kiln_diagnostics::DiagnosticSink;

    fn parse_expr(source: &str) -> Expr {
        let sink = DiagnosticSink::new();
        let tokens = lex(source, "test.ts", &sink);
        let expr = Parser::new(tokens, source, "test.ts", &sink).parse_expr();
        let diags = sink.take_all();
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        expr
    }

    #[test]
    fn literals() {
        assert!(matches!(parse_expr("null"), Expr::Null { .. }));
        assert!(matches!(parse_expr("true"), Expr::Bool { value: true, .. }));
        assert!(matches!(parse_expr("-2.5"), Expr::Number { value, .. } if value == -2.5));
        assert!(matches!(parse_expr("'hi'"), Expr::String { value, .. } if value == "hi"));
    }

    #[test]
    fn builder_call_with_object_argument() {
        let expr = parse_expr(r#"gql.fragment("User", { fields: ["id", ...base] })"#);
        assert_eq!(expr.builder_method(), Some("fragment"));
        let Expr::Call { args, .. } = expr else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        let Expr::Object { properties, .. } = args[1].expr() else {
            panic!("expected object");
        };
        let Property::KeyValue { key, value, .. } = &properties[0] else {
            panic!("expected key/value");
        };
        assert_eq!(key, "fields");
        let Expr::Array { elements, .. } = value else {
            panic!("expected array");
        };
        assert!(matches!(elements[1], Element::Spread { .. }));
    }

    #[test]
    fn member_and_index_chains() {
        let expr = parse_expr("queries.byId[0].name");
        let Expr::Member { object, property, .. } = expr else {
            panic!("expected member");
        };
        assert_eq!(property, "name");
        assert!(matches!(*object, Expr::Index { .. }));
    }

    #[test]
    fn arrow_functions() {
        assert!(matches!(
            parse_expr("(a, b) => a"),
            Expr::Arrow { params, body: ArrowBody::Expr { .. }, .. } if params == vec!["a", "b"]
        ));
        assert!(matches!(
            parse_expr("x => { return x; }"),
            Expr::Arrow { body: ArrowBody::Block { .. }, .. }
        ));
        assert!(matches!(parse_expr("(a)"), Expr::Ident { .. }));
    }

    #[test]
    fn shorthand_and_spread_properties() {
        let Expr::Object { properties, .. } = parse_expr("{ a, ...b, 'c-d': 1, default: 2 }") else {
            panic!("expected object");
        };
        assert!(matches!(&properties[0], Property::Shorthand { name, .. } if name == "a"));
        assert!(matches!(properties[1], Property::Spread { .. }));
        assert!(matches!(&properties[2], Property::KeyValue { key, .. } if key == "c-d"));
        assert!(matches!(&properties[3], Property::KeyValue { key, .. } if key == "default"));
    }

    #[test]
    fn function_expression() {
        assert!(matches!(
            parse_expr("function named(a) { return a; }"),
            Expr::Function { name: Some(n), .. } if n == "named"
        ));
    }

    #[test]
    fn trailing_commas() {
        assert!(matches!(parse_expr("[1, 2,]"), Expr::Array { elements, .. } if elements.len() == 2));
        assert!(matches!(parse_expr("f(1,)"), Expr::Call { args, .. } if args.len() == 1));
    }
}
