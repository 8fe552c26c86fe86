//! Token types for the definition-module lexer.
//!
//! Literal values are not stored in the token; the parser reads them back
//! from the source text using the token's span.

use kiln_source::Span;

/// A token kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TokenKind {
    /// An identifier such as `userFragment` or `$scalar`.
    Identifier,
    /// A single- or double-quoted string literal.
    String,
    /// A numeric literal.
    Number,

    /// `import`
    Import,
    /// `export`
    Export,
    /// `from`
    From,
    /// `as`
    As,
    /// `const`
    Const,
    /// `let`
    Let,
    /// `var`
    Var,
    /// `function`
    Function,
    /// `return`
    Return,
    /// `if`
    If,
    /// `else`
    Else,
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `default`
    Default,

    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `...`
    Ellipsis,
    /// `=`
    Eq,
    /// `=>`
    FatArrow,
    /// `*`
    Star,
    /// `-`
    Minus,

    /// A character sequence the lexer could not tokenize.
    Error,
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Returns `true` for reserved words. Reserved words are still accepted
    /// as object keys and member property names.
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Import
                | TokenKind::Export
                | TokenKind::From
                | TokenKind::As
                | TokenKind::Const
                | TokenKind::Let
                | TokenKind::Var
                | TokenKind::Function
                | TokenKind::Return
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::Default
        )
    }

    /// A short human-readable description used in "expected X, found Y" messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::String => "string literal",
            TokenKind::Number => "number",
            TokenKind::Import => "`import`",
            TokenKind::Export => "`export`",
            TokenKind::From => "`from`",
            TokenKind::As => "`as`",
            TokenKind::Const => "`const`",
            TokenKind::Let => "`let`",
            TokenKind::Var => "`var`",
            TokenKind::Function => "`function`",
            TokenKind::Return => "`return`",
            TokenKind::If => "`if`",
            TokenKind::Else => "`else`",
            TokenKind::True => "`true`",
            TokenKind::False => "`false`",
            TokenKind::Null => "`null`",
            TokenKind::Default => "`default`",
            TokenKind::LeftBrace => "`{`",
            TokenKind::RightBrace => "`}`",
            TokenKind::LeftParen => "`(`",
            TokenKind::RightParen => "`)`",
            TokenKind::LeftBracket => "`[`",
            TokenKind::RightBracket => "`]`",
            TokenKind::Comma => "`,`",
            TokenKind::Semicolon => "`;`",
            TokenKind::Colon => "`:`",
            TokenKind::Dot => "`.`",
            TokenKind::Ellipsis => "`...`",
            TokenKind::Eq => "`=`",
            TokenKind::FatArrow => "`=>`",
            TokenKind::Star => "`*`",
            TokenKind::Minus => "`-`",
            TokenKind::Error => "invalid token",
            TokenKind::Eof => "end of file",
        }
    }
}

/// Looks up the keyword for an identifier-shaped word.
pub fn lookup_keyword(word: &str) -> Option<TokenKind> {
    Some(match word {
        "import" => TokenKind::Import,
        "export" => TokenKind::Export,
        "from" => TokenKind::From,
        "as" => TokenKind::As,
        "const" => TokenKind::Const,
        "let" => TokenKind::Let,
        "var" => TokenKind::Var,
        "function" => TokenKind::Function,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "default" => TokenKind::Default,
        _ => return None,
    })
}

/// A token with its source span.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    /// The token kind.
    pub kind: TokenKind,
    /// The byte range of the token in the source.
    pub span: Span,
}
