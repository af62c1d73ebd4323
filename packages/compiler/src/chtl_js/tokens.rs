//! CHTL-JS token definitions

use serde::{Deserialize, Serialize};

use crate::parse_util::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Identifier,
    /// `listen`, `delegate`, `animate`, `vir`, `module`.
    Keyword,
    /// Raw text of a string literal, quotes included.
    String,
    Number,
    /// Content captured between `{{` and `}}`.
    Selector,
    /// `->`
    Arrow,
    /// `&->`
    EventBind,
    /// `=>`
    FatArrow,
    Punctuation,
    Operator,
    Eof,
}

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

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    pub fn is_punct(&self, ch: char) -> bool {
        self.kind == TokenKind::Punctuation && self.value.chars().next() == Some(ch)
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.value == word
    }
}

pub const BLOCK_KEYWORDS: &[&str] = &["listen", "delegate", "animate", "vir", "module"];

pub fn is_block_keyword(word: &str) -> bool {
    BLOCK_KEYWORDS.contains(&word)
}
