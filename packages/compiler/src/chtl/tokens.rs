//! CHTL token definitions

use serde::{Deserialize, Serialize};

use crate::parse_util::Span;

/// Token kinds produced by the CHTL lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TokenKind {
    Identifier,
    String,
    Number,
    /// Bare word accepted where a string is expected (`color: red;`).
    UnquotedLiteral,
    /// `[Template]`, `[Custom]`, `[Origin]`, `[Namespace]`,
    /// `[Configuration]`, `[Import]` and the word keywords.
    Keyword,
    Punctuation,
    Operator,
    CommentLine,
    CommentBlock,
    /// `-- text` comment, preserved through generation.
    CommentGenerator,
    Whitespace,
    Eof,
    Invalid,
}

/// A single CHTL token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, span: Span) -> Self {
        Token { kind, value: value.into(), span }
    }

    pub fn eof(span: Span) -> Self {
        Token::new(TokenKind::Eof, "", span)
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_punct(&self, ch: char) -> bool {
        self.kind == TokenKind::Punctuation && self.value.chars().next() == Some(ch)
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.value == word
    }

    pub fn is_ident(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.value == word
    }

    /// Identifier-or-keyword text, for places where keywords are valid
    /// names (`style`, `text` as attribute names).
    pub fn word(&self) -> Option<&str> {
        match self.kind {
            TokenKind::Identifier | TokenKind::Keyword => Some(&self.value),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::String | TokenKind::Number | TokenKind::UnquotedLiteral
        )
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

/// Bracketed declaration keywords.
pub const BRACKET_KEYWORDS: &[&str] = &[
    "[Template]",
    "[Custom]",
    "[Origin]",
    "[Namespace]",
    "[Configuration]",
    "[Import]",
];

/// Plain word keywords.
pub const WORD_KEYWORDS: &[&str] = &[
    "style", "script", "text", "delete", "inherit", "except", "from", "as", "use",
];

pub fn is_bracket_keyword(text: &str) -> bool {
    BRACKET_KEYWORDS.contains(&text)
}

pub fn is_word_keyword(text: &str) -> bool {
    WORD_KEYWORDS.contains(&text)
}
