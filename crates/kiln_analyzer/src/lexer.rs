//! Lexical analyzer for definition modules.
//!
//! Converts source text into a sequence of [`Token`]s, skipping whitespace
//! and `//` / `/* */` comments. Errors are reported to the [`DiagnosticSink`]
//! and produce [`TokenKind::Error`] tokens so the parser can keep going.

use crate::token::{lookup_keyword, Token, TokenKind};
use kiln_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Location};
use kiln_source::Span;

/// Lexes the given source text into a vector of tokens.
///
/// The returned vector always ends with a [`TokenKind::Eof`] token.
pub fn lex(source: &str, file_path: &str, sink: &DiagnosticSink) -> Vec<Token> {
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: 0,
        file_path,
        sink,
    };
    lexer.lex_all()
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    file_path: &'a str,
    sink: &'a DiagnosticSink,
}

impl Lexer<'_> {
    fn lex_all(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.source.len() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span::new(self.pos as u32, self.pos as u32),
                });
                break;
            }
            tokens.push(self.next_token());
        }
        tokens
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start as u32, self.pos as u32)
    }

    fn error(&self, msg: &str, span: Span) {
        self.sink.emit(
            Diagnostic::error(DiagnosticCode::AnalysisParseError, msg)
                .with_location(Location::file(self.file_path).with_span(span)),
        );
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.peek() == b'/' && self.peek_at(1) == b'/' {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            if self.peek() == b'/' && self.peek_at(1) == b'*' {
                let start = self.pos;
                self.pos += 2;
                loop {
                    if self.pos >= self.source.len() {
                        self.error("unterminated block comment", self.span_from(start));
                        break;
                    }
                    if self.source[self.pos] == b'*' && self.peek_at(1) == b'/' {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            return;
        }
    }

    fn next_token(&mut self) -> Token {
        let start = self.pos;
        let b = self.peek();

        let kind = if is_ident_start(b) {
            self.lex_word()
        } else if b.is_ascii_digit() || (b == b'.' && self.peek_at(1).is_ascii_digit()) {
            self.lex_number()
        } else if b == b'"' || b == b'\'' {
            self.lex_string(b)
        } else if b == b'`' {
            self.pos += 1;
            while self.pos < self.source.len() && self.source[self.pos] != b'`' {
                self.pos += 1;
            }
            self.pos = (self.pos + 1).min(self.source.len());
            self.error("template literals are not supported", self.span_from(start));
            TokenKind::Error
        } else {
            self.lex_punct()
        };

        Token {
            kind,
            span: self.span_from(start),
        }
    }

    fn lex_word(&mut self) -> TokenKind {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let word = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");
        lookup_keyword(word).unwrap_or(TokenKind::Identifier)
    }

    fn lex_number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.pos += 1;
        }
        if self.peek() == b'.' && self.peek_at(1).is_ascii_digit() {
            self.pos += 1;
            while self.peek().is_ascii_digit() {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), b'e' | b'E') {
            let sign = usize::from(matches!(self.peek_at(1), b'+' | b'-'));
            if self.peek_at(1 + sign).is_ascii_digit() {
                self.pos += 1 + sign;
                while self.peek().is_ascii_digit() {
                    self.pos += 1;
                }
            }
        }
        TokenKind::Number
    }

    fn lex_string(&mut self, quote: u8) -> TokenKind {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.source.get(self.pos) {
                None | Some(b'\n') => {
                    self.error("unterminated string literal", self.span_from(start));
                    return TokenKind::Error;
                }
                Some(&b'\\') => self.pos += 2,
                Some(&c) if c == quote => {
                    self.pos += 1;
                    return TokenKind::String;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn lex_punct(&mut self) -> TokenKind {
        let start = self.pos;
        let b = self.peek();
        let (kind, len) = match b {
            b'{' => (TokenKind::LeftBrace, 1),
            b'}' => (TokenKind::RightBrace, 1),
            b'(' => (TokenKind::LeftParen, 1),
            b')' => (TokenKind::RightParen, 1),
            b'[' => (TokenKind::LeftBracket, 1),
            b']' => (TokenKind::RightBracket, 1),
            b',' => (TokenKind::Comma, 1),
            b';' => (TokenKind::Semicolon, 1),
            b':' => (TokenKind::Colon, 1),
            b'*' => (TokenKind::Star, 1),
            b'-' => (TokenKind::Minus, 1),
            b'.' if self.peek_at(1) == b'.' && self.peek_at(2) == b'.' => (TokenKind::Ellipsis, 3),
            b'.' => (TokenKind::Dot, 1),
            b'=' if self.peek_at(1) == b'>' => (TokenKind::FatArrow, 2),
            b'=' if self.peek_at(1) != b'=' => (TokenKind::Eq, 1),
            _ => {
                // Consume one full UTF-8 character so spans stay on char boundaries.
                let width = utf8_width(b);
                self.pos = (self.pos + width).min(self.source.len());
                let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
                self.error(&format!("unexpected character `{text}`"), self.span_from(start));
                return TokenKind::Error;
            }
        };
        self.pos += len;
        kind
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn utf8_width(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}

/// Decodes the body of a quoted string token, resolving escape sequences.
///
/// `raw` includes the surrounding quotes.
pub fn unescape(raw: &str) -> String {
    let inner = raw.get(1..raw.len().saturating_sub(1)).unwrap_or("");
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
