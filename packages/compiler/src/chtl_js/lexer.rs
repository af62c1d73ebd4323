//! CHTL-JS lexer
//!
//! Context-sensitive tokenizer over script bodies. An explicit state
//! stack follows the lexer through strings, comments, selector literals
//! and the structured blocks; pushes and pops are kept in parity by
//! routing every push through `with_state`, which owns the matching pop
//! on all exit paths.

use serde::{Deserialize, Serialize};

use super::tokens::{self, Token, TokenKind};
use crate::chars;
use crate::parse_util::{Position, Span};

/// Lexer states. Block states are entered when the opening brace of a
/// recognised block keyword is consumed and left on its closing brace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LexState {
    Normal,
    InString,
    InCommentSingle,
    InCommentMulti,
    InSelector,
    InListen,
    InDelegate,
    InAnimate,
    InVir,
    InModule,
}

struct BlockEntry {
    state: LexState,
    depth: usize,
}

/// The CHTL-JS lexer.
pub struct Lexer<'a> {
    source: &'a str,
    pos: Position,
    stack: Vec<LexState>,
    blocks: Vec<BlockEntry>,
    brace_depth: usize,
    pending_block: Option<LexState>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            pos: Position::default(),
            stack: vec![LexState::Normal],
            blocks: Vec::new(),
            brace_depth: 0,
            pending_block: None,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Current innermost state.
    pub fn state(&self) -> LexState {
        *self.stack.last().unwrap_or(&LexState::Normal)
    }

    fn with_state<T>(&mut self, state: LexState, f: impl FnOnce(&mut Self) -> T) -> T {
        self.stack.push(state);
        let result = f(self);
        self.stack.pop();
        result
    }

    fn eof(&self) -> bool {
        self.pos.offset >= self.source.len()
    }

    fn peek(&self) -> char {
        self.source[self.pos.offset..].chars().next().unwrap_or(chars::EOF)
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos.offset..]
    }

    fn bump(&mut self) -> char {
        let ch = self.peek();
        if ch != chars::EOF {
            self.pos.advance(ch);
        }
        ch
    }

    fn span_from(&self, start: Position) -> Span {
        Span::new(start, self.pos)
    }

    /// Produce the next token, skipping whitespace and comments. Block
    /// keywords arm the state machine so that a directly following `{`
    /// enters the corresponding block state; any other token disarms it.
    pub fn next_token(&mut self) -> Token {
        let token = self.next_token_inner();
        match token.kind {
            TokenKind::Keyword => {
                self.pending_block = Some(match token.value.as_str() {
                    "listen" => LexState::InListen,
                    "delegate" => LexState::InDelegate,
                    "animate" => LexState::InAnimate,
                    "vir" => LexState::InVir,
                    _ => LexState::InModule,
                });
            }
            TokenKind::Punctuation if token.value == "{" => {}
            _ => self.pending_block = None,
        }
        token
    }

    fn next_token_inner(&mut self) -> Token {
        loop {
            while !self.eof() && chars::is_whitespace(self.peek()) {
                self.bump();
            }
            if self.eof() {
                return Token::eof(Span::at(self.pos));
            }
            if self.rest().starts_with("//") {
                self.with_state(LexState::InCommentSingle, |lexer| {
                    while !lexer.eof() && lexer.peek() != chars::NEWLINE {
                        lexer.bump();
                    }
                });
                continue;
            }
            if self.rest().starts_with("/*") {
                self.with_state(LexState::InCommentMulti, |lexer| {
                    lexer.bump();
                    lexer.bump();
                    while !lexer.eof() && !lexer.rest().starts_with("*/") {
                        lexer.bump();
                    }
                    if !lexer.eof() {
                        lexer.bump();
                        lexer.bump();
                    }
                });
                continue;
            }
            return self.scan_token();
        }
    }

    fn scan_token(&mut self) -> Token {
        let start = self.pos;
        let ch = self.peek();

        if self.rest().starts_with("{{") {
            return self.scan_selector(start);
        }
        if self.rest().starts_with("&->") {
            self.bump();
            self.bump();
            self.bump();
            return Token::new(TokenKind::EventBind, "&->", self.span_from(start));
        }
        if self.rest().starts_with("->") {
            self.bump();
            self.bump();
            return Token::new(TokenKind::Arrow, "->", self.span_from(start));
        }
        if self.rest().starts_with("=>") {
            self.bump();
            self.bump();
            return Token::new(TokenKind::FatArrow, "=>", self.span_from(start));
        }

        if ch == chars::DQ || ch == chars::SQ || ch == '`' {
            return self.scan_string(start);
        }

        if chars::is_digit(ch) {
            while chars::is_digit(self.peek()) || self.peek() == chars::PERIOD {
                self.bump();
            }
            let value = &self.source[start.offset..self.pos.offset];
            return Token::new(TokenKind::Number, value, self.span_from(start));
        }

        if chars::is_ident_start(ch) || ch == chars::DOLLAR {
            while chars::is_ident_part(self.peek()) || self.peek() == chars::DOLLAR {
                self.bump();
            }
            let value = &self.source[start.offset..self.pos.offset];
            let kind = if tokens::is_block_keyword(value) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            return Token::new(kind, value, self.span_from(start));
        }

        self.bump();
        match ch {
            chars::LBRACE => {
                self.brace_depth += 1;
                if let Some(state) = self.pending_block.take() {
                    self.stack.push(state);
                    self.blocks.push(BlockEntry { state, depth: self.brace_depth });
                }
                Token::new(TokenKind::Punctuation, ch, self.span_from(start))
            }
            chars::RBRACE => {
                if self.blocks.last().is_some_and(|e| e.depth == self.brace_depth) {
                    let entry = self.blocks.pop().unwrap();
                    debug_assert_eq!(self.stack.last().copied(), Some(entry.state));
                    self.stack.pop();
                }
                self.brace_depth = self.brace_depth.saturating_sub(1);
                Token::new(TokenKind::Punctuation, ch, self.span_from(start))
            }
            chars::LPAREN | chars::RPAREN | chars::LBRACKET | chars::RBRACKET
            | chars::SEMICOLON | chars::COLON | chars::COMMA | chars::PERIOD | chars::HASH
            | chars::AT => Token::new(TokenKind::Punctuation, ch, self.span_from(start)),
            _ => Token::new(TokenKind::Operator, ch, self.span_from(start)),
        }
    }

    /// Capture everything between `{{` and the matching `}}` as one
    /// selector token.
    fn scan_selector(&mut self, start: Position) -> Token {
        self.with_state(LexState::InSelector, |lexer| {
            lexer.bump();
            lexer.bump();
            let content_start = lexer.pos.offset;
            while !lexer.eof() && !lexer.rest().starts_with("}}") {
                lexer.bump();
            }
            let content = lexer.source[content_start..lexer.pos.offset].trim().to_string();
            if !lexer.eof() {
                lexer.bump();
                lexer.bump();
            }
            Token::new(TokenKind::Selector, content, lexer.span_from(start))
        })
    }

    fn scan_string(&mut self, start: Position) -> Token {
        self.with_state(LexState::InString, |lexer| {
            let quote = lexer.bump();
            while !lexer.eof() {
                let ch = lexer.bump();
                if ch == chars::BACKSLASH {
                    if !lexer.eof() {
                        lexer.bump();
                    }
                    continue;
                }
                if ch == quote {
                    break;
                }
            }
            let value = &lexer.source[start.offset..lexer.pos.offset];
            Token::new(TokenKind::String, value.to_string(), lexer.span_from(start))
        })
    }
}
