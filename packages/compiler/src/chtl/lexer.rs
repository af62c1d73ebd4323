//! CHTL lexer
//!
//! A streaming lexer driven by the parser. Besides ordinary tokens it
//! supports raw block capture for script and origin bodies, where the
//! content is JavaScript or arbitrary text that must not be tokenized.
//! Error tokens are never discarded silently: each one also records an
//! entry in the error vector together with the lexer state at the time.

use serde::{Deserialize, Serialize};

use super::tokens::{self, Token, TokenKind};
use crate::chars;
use crate::parse_util::{Position, Span};

/// Lexer state, reported alongside lex errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LexerState {
    Default,
    InString,
    InComment,
    InRawBlock,
}

/// A recorded lexing problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexError {
    pub message: String,
    pub position: Position,
    pub text: String,
    pub state: LexerState,
}

/// Lexer configuration.
#[derive(Debug, Clone)]
pub struct LexerConfig {
    pub skip_whitespace: bool,
    pub skip_comments: bool,
    pub track_positions: bool,
    pub strict_mode: bool,
    pub max_tokens: usize,
}

impl Default for LexerConfig {
    fn default() -> Self {
        LexerConfig {
            skip_whitespace: true,
            skip_comments: false,
            track_positions: true,
            strict_mode: false,
            max_tokens: 1_000_000,
        }
    }
}

/// The CHTL lexer.
pub struct Lexer<'a> {
    source: &'a str,
    config: LexerConfig,
    pos: Position,
    state: LexerState,
    emitted: usize,
    halted: bool,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, config: LexerConfig) -> Self {
        Lexer {
            source,
            config,
            pos: Position::default(),
            state: LexerState::Default,
            emitted: 0,
            halted: false,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<LexError> {
        std::mem::take(&mut self.errors)
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    fn eof(&self) -> bool {
        self.pos.offset >= self.source.len()
    }

    fn peek(&self) -> char {
        self.source[self.pos.offset..].chars().next().unwrap_or(chars::EOF)
    }

    fn peek_at(&self, byte_lookahead: usize) -> char {
        self.source[self.pos.offset..]
            .chars()
            .nth(byte_lookahead)
            .unwrap_or(chars::EOF)
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
        if !self.config.track_positions {
            return Span::default();
        }
        Span::new(start, self.pos)
    }

    fn record_error(&mut self, message: impl Into<String>, start: Position) {
        let text = self.source[start.offset..self.pos.offset].to_string();
        self.errors.push(LexError {
            message: message.into(),
            position: start,
            text,
            state: self.state,
        });
        // In strict mode the first bad token ends the stream.
        if self.config.strict_mode {
            self.halted = true;
        }
    }

    /// Produce the next token. At end of input this returns EOF tokens
    /// forever.
    pub fn next_token(&mut self) -> Token {
        loop {
            if self.halted || self.emitted >= self.config.max_tokens {
                return Token::eof(Span::at(self.pos));
            }
            let token = self.scan_token();
            match token.kind {
                TokenKind::Whitespace if self.config.skip_whitespace => continue,
                TokenKind::CommentLine | TokenKind::CommentBlock if self.config.skip_comments => {
                    continue
                }
                _ => {
                    self.emitted += 1;
                    return token;
                }
            }
        }
    }

    fn scan_token(&mut self) -> Token {
        if self.eof() {
            return Token::eof(Span::at(self.pos));
        }
        let start = self.pos;
        let ch = self.peek();

        if chars::is_whitespace(ch) {
            while !self.eof() && chars::is_whitespace(self.peek()) {
                self.bump();
            }
            return Token::new(TokenKind::Whitespace, "", self.span_from(start));
        }

        if self.rest().starts_with("//") {
            return self.scan_line_comment(start, TokenKind::CommentLine, 2);
        }
        if self.rest().starts_with("/*") {
            return self.scan_block_comment(start);
        }
        if self.rest().starts_with("--") {
            return self.scan_line_comment(start, TokenKind::CommentGenerator, 2);
        }

        if ch == chars::DQ || ch == chars::SQ {
            return self.scan_string(start);
        }

        if ch == chars::LBRACKET {
            if let Some(token) = self.scan_bracket_keyword(start) {
                return token;
            }
        }

        if chars::is_digit(ch) {
            return self.scan_number_or_unit(start);
        }

        if chars::is_ident_start(ch) {
            return self.scan_word(start);
        }

        // Multi-char operators first (maximal munch).
        for op in ["->", "=="] {
            if self.rest().starts_with(op) {
                for _ in 0..op.len() {
                    self.bump();
                }
                return Token::new(TokenKind::Operator, op, self.span_from(start));
            }
        }

        match ch {
            chars::LBRACE | chars::RBRACE | chars::LPAREN | chars::RPAREN | chars::LBRACKET
            | chars::RBRACKET | chars::COLON | chars::SEMICOLON | chars::COMMA | chars::AT
            | chars::AMPERSAND | chars::PERIOD | chars::HASH => {
                self.bump();
                return Token::new(TokenKind::Punctuation, ch, self.span_from(start));
            }
            chars::EQ | chars::PLUS | chars::MINUS | chars::STAR | chars::SLASH
            | chars::PERCENT | chars::GT | chars::LT | chars::BANG | chars::QUESTION
            | chars::DOLLAR | chars::BAR => {
                self.bump();
                return Token::new(TokenKind::Operator, ch, self.span_from(start));
            }
            _ => {}
        }

        // Unknown character: record and emit an invalid token.
        self.bump();
        let token = Token::new(TokenKind::Invalid, ch, self.span_from(start));
        self.record_error(format!("invalid character `{}`", ch), start);
        token
    }

    fn scan_line_comment(&mut self, start: Position, kind: TokenKind, marker_len: usize) -> Token {
        for _ in 0..marker_len {
            self.bump();
        }
        let text_start = self.pos.offset;
        while !self.eof() && self.peek() != chars::NEWLINE {
            self.bump();
        }
        let value = self.source[text_start..self.pos.offset].trim().to_string();
        Token::new(kind, value, self.span_from(start))
    }

    fn scan_block_comment(&mut self, start: Position) -> Token {
        self.state = LexerState::InComment;
        self.bump();
        self.bump();
        let text_start = self.pos.offset;
        loop {
            if self.eof() {
                self.record_error("unterminated block comment", start);
                self.state = LexerState::Default;
                let value = self.source[text_start..self.pos.offset].to_string();
                return Token::new(TokenKind::Invalid, value, self.span_from(start));
            }
            if self.rest().starts_with("*/") {
                let value = self.source[text_start..self.pos.offset].trim().to_string();
                self.bump();
                self.bump();
                self.state = LexerState::Default;
                return Token::new(TokenKind::CommentBlock, value, self.span_from(start));
            }
            self.bump();
        }
    }

    fn scan_string(&mut self, start: Position) -> Token {
        self.state = LexerState::InString;
        let quote = self.bump();
        let mut value = String::new();
        loop {
            if self.eof() || self.peek() == chars::NEWLINE {
                self.record_error("unterminated string literal", start);
                self.state = LexerState::Default;
                return Token::new(TokenKind::Invalid, value, self.span_from(start));
            }
            let ch = self.bump();
            if ch == quote {
                break;
            }
            if ch == chars::BACKSLASH && !self.eof() {
                let escaped = self.bump();
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                continue;
            }
            value.push(ch);
        }
        self.state = LexerState::Default;
        Token::new(TokenKind::String, value, self.span_from(start))
    }

    /// `[Template]`-style keywords are lexed as a single token; any other
    /// `[` falls through to punctuation.
    fn scan_bracket_keyword(&mut self, start: Position) -> Option<Token> {
        let rest = self.rest();
        let close = rest.find(chars::RBRACKET)?;
        let candidate = &rest[..=close];
        if !tokens::is_bracket_keyword(candidate) {
            return None;
        }
        for _ in 0..candidate.chars().count() {
            self.bump();
        }
        Some(Token::new(TokenKind::Keyword, candidate, self.span_from(start)))
    }

    /// A number, or a CSS-style dimension (`10px`, `1.5em`) lexed as one
    /// unquoted literal.
    fn scan_number_or_unit(&mut self, start: Position) -> Token {
        while chars::is_digit(self.peek()) {
            self.bump();
        }
        if self.peek() == chars::PERIOD && chars::is_digit(self.peek_at(1)) {
            self.bump();
            while chars::is_digit(self.peek()) {
                self.bump();
            }
        }
        if chars::is_ident_start(self.peek()) || self.peek() == chars::PERCENT {
            while chars::is_ident_part(self.peek()) || self.peek() == chars::PERCENT {
                self.bump();
            }
            let value = &self.source[start.offset..self.pos.offset];
            return Token::new(TokenKind::UnquotedLiteral, value, self.span_from(start));
        }
        let value = &self.source[start.offset..self.pos.offset];
        Token::new(TokenKind::Number, value, self.span_from(start))
    }

    fn scan_word(&mut self, start: Position) -> Token {
        while chars::is_ident_part(self.peek()) {
            self.bump();
        }
        let value = &self.source[start.offset..self.pos.offset];
        if tokens::is_word_keyword(value) {
            Token::new(TokenKind::Keyword, value, self.span_from(start))
        } else {
            Token::new(TokenKind::Identifier, value, self.span_from(start))
        }
    }

    /// Capture everything up to the brace matching an already-consumed
    /// `{`, string- and comment-aware. Returns the body (closing brace
    /// excluded, consumed). Used for script and origin bodies.
    pub fn capture_raw_block(&mut self) -> Result<(String, Span), LexError> {
        let start = self.pos;
        self.state = LexerState::InRawBlock;
        let mut depth = 1usize;
        loop {
            if self.eof() {
                let err = LexError {
                    message: "unterminated block".to_string(),
                    position: start,
                    text: String::new(),
                    state: self.state,
                };
                self.errors.push(err.clone());
                self.state = LexerState::Default;
                return Err(err);
            }
            let ch = self.peek();
            match ch {
                chars::DQ | chars::SQ | '`' => self.skip_raw_string(),
                chars::SLASH if self.rest().starts_with("//") => {
                    while !self.eof() && self.peek() != chars::NEWLINE {
                        self.bump();
                    }
                }
                chars::SLASH if self.rest().starts_with("/*") => {
                    self.bump();
                    self.bump();
                    while !self.eof() && !self.rest().starts_with("*/") {
                        self.bump();
                    }
                    if !self.eof() {
                        self.bump();
                        self.bump();
                    }
                }
                chars::LBRACE => {
                    depth += 1;
                    self.bump();
                }
                chars::RBRACE => {
                    depth -= 1;
                    if depth == 0 {
                        let end = self.pos;
                        self.bump();
                        self.state = LexerState::Default;
                        let body = self.source[start.offset..end.offset].to_string();
                        return Ok((body, Span::new(start, end)));
                    }
                    self.bump();
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn skip_raw_string(&mut self) {
        let quote = self.bump();
        while !self.eof() {
            let ch = self.bump();
            if ch == chars::BACKSLASH {
                if !self.eof() {
                    self.bump();
                }
                continue;
            }
            if ch == quote {
                break;
            }
        }
    }
}
