//! Unified scanner
//!
//! Slices a mixed CHTL source into typed fragments in a single forward
//! pass, without pre-knowing block boundaries. Brace nesting is tracked
//! through strings and comments so block contents are captured verbatim;
//! script bodies are classified (and, when mixed, split) into CHTL-JS and
//! pure-JS fragments after capture.

use log::trace;
use thiserror::Error;

use crate::chars;
use crate::parse_util::{Position, Span};

/// Fragment classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FragmentKind {
    Chtl,
    ChtlJs,
    PureJs,
    Css,
    Html,
    Comment,
}

impl FragmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentKind::Chtl => "CHTL",
            FragmentKind::ChtlJs => "CHTL_JS",
            FragmentKind::PureJs => "PURE_JS",
            FragmentKind::Css => "CSS",
            FragmentKind::Html => "HTML",
            FragmentKind::Comment => "COMMENT",
        }
    }
}

/// A contiguous, typed slice of the input. Fragments are totally ordered
/// by their origin span.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub content: String,
    pub span: Span,
    pub depth: usize,
}

impl Fragment {
    fn new(kind: FragmentKind, content: String, span: Span, depth: usize) -> Self {
        Fragment { kind, content, span, depth }
    }
}

/// Scanner configuration.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// When false, every script body is treated as pure JS.
    pub detect_chtl_js: bool,
    /// Emit COMMENT fragments for `//` and `/* */` found between blocks.
    /// Generator comments are always routed into CHTL fragments.
    pub keep_comments: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig { detect_chtl_js: true, keep_comments: false }
    }
}

/// Scan failure. The scanner only fails on unterminated constructs; any
/// merely unexpected text is forwarded to the CHTL parser as a fragment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("unterminated string literal starting at {0}")]
    UnterminatedString(Position),
    #[error("unterminated block comment starting at {0}")]
    UnterminatedComment(Position),
    #[error("unterminated brace block starting at {0}")]
    UnterminatedBrace(Position),
}

impl ScanError {
    pub fn position(&self) -> Position {
        match self {
            ScanError::UnterminatedString(p)
            | ScanError::UnterminatedComment(p)
            | ScanError::UnterminatedBrace(p) => *p,
        }
    }
}

bitflags::bitflags! {
    /// CHTL-JS features observed in a script statement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ScriptFeatures: u8 {
        const SELECTOR      = 1 << 0;
        const ARROW         = 1 << 1;
        const EVENT_BINDING = 1 << 2;
        const BLOCK_KEYWORD = 1 << 3;
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: Position,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Cursor { src, pos: Position::default() }
    }

    fn eof(&self) -> bool {
        self.pos.offset >= self.src.len()
    }

    fn peek(&self) -> char {
        self.src[self.pos.offset..].chars().next().unwrap_or(chars::EOF)
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos.offset..]
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn advance(&mut self) {
        if let Some(ch) = self.src[self.pos.offset..].chars().next() {
            self.pos.advance(ch);
        }
    }

    fn advance_str(&mut self, s: &str) {
        for ch in s.chars() {
            debug_assert_eq!(self.peek(), ch);
            self.pos.advance(ch);
        }
    }

    fn skip_line(&mut self) {
        while !self.eof() && self.peek() != chars::NEWLINE {
            self.advance();
        }
        if !self.eof() {
            self.advance();
        }
    }
}

/// The unified scanner.
pub struct UnifiedScanner {
    config: ScannerConfig,
}

impl UnifiedScanner {
    pub fn new(config: ScannerConfig) -> Self {
        UnifiedScanner { config }
    }

    /// Scan a source into fragments in source order.
    pub fn scan(&self, source: &str) -> Result<Vec<Fragment>, ScanError> {
        let mut cursor = Cursor::new(source);
        let mut fragments = Vec::new();

        while !cursor.eof() {
            skip_whitespace(&mut cursor);
            if cursor.eof() {
                break;
            }

            let start = cursor.pos;

            if cursor.starts_with("//") {
                cursor.skip_line();
                self.push_comment(&mut fragments, source, start, cursor.pos);
                continue;
            }
            if cursor.starts_with("/*") {
                skip_block_comment(&mut cursor)?;
                self.push_comment(&mut fragments, source, start, cursor.pos);
                continue;
            }
            if cursor.starts_with("--") {
                // Generator comment: CHTL content, parsed by the CHTL parser.
                cursor.skip_line();
                push_fragment(&mut fragments, FragmentKind::Chtl, source, start, cursor.pos, 0);
                continue;
            }
            if cursor.peek() == chars::LBRACKET {
                self.scan_bracket_construct(&mut cursor, source, &mut fragments)?;
                continue;
            }
            if at_keyword_block(&cursor, "style") {
                let (body_span, depth) = capture_keyword_block(&mut cursor, "style")?;
                fragments.push(Fragment::new(
                    FragmentKind::Css,
                    body_span.text(source).to_string(),
                    body_span,
                    depth,
                ));
                continue;
            }
            if at_keyword_block(&cursor, "script") {
                let (body_span, depth) = capture_keyword_block(&mut cursor, "script")?;
                self.push_script_fragments(&mut fragments, source, body_span, depth);
                continue;
            }
            if cursor.peek() == chars::LT {
                scan_html_run(&mut cursor);
                push_fragment(&mut fragments, FragmentKind::Html, source, start, cursor.pos, 0);
                continue;
            }
            if chars::is_ident_start(cursor.peek()) && at_element_block(&cursor) {
                capture_element_block(&mut cursor)?;
                push_fragment(&mut fragments, FragmentKind::Chtl, source, start, cursor.pos, 0);
                continue;
            }

            // Anything else is handed to the CHTL parser, which will
            // produce a proper diagnostic for it.
            cursor.skip_line();
            push_fragment(&mut fragments, FragmentKind::Chtl, source, start, cursor.pos, 0);
        }

        trace!("scanned {} fragments", fragments.len());
        Ok(fragments)
    }

    fn push_comment(
        &self,
        fragments: &mut Vec<Fragment>,
        source: &str,
        start: Position,
        end: Position,
    ) {
        if self.config.keep_comments {
            push_fragment(fragments, FragmentKind::Comment, source, start, end, 0);
        }
    }

    /// `[Template]`, `[Custom]`, `[Origin]`, `[Configuration]`,
    /// `[Namespace]` and `[Import]` all start a CHTL fragment.
    fn scan_bracket_construct(
        &self,
        cursor: &mut Cursor,
        source: &str,
        fragments: &mut Vec<Fragment>,
    ) -> Result<(), ScanError> {
        let start = cursor.pos;
        // Consume `[Keyword]`.
        cursor.advance();
        while !cursor.eof() && cursor.peek() != chars::RBRACKET {
            cursor.advance();
        }
        if !cursor.eof() {
            cursor.advance();
        }
        let keyword = Span::new(start, cursor.pos);
        let is_import = keyword.text(source).eq_ignore_ascii_case("[Import]");

        if is_import {
            // Import is a statement, not a block.
            while !cursor.eof() && cursor.peek() != chars::SEMICOLON && cursor.peek() != chars::NEWLINE {
                cursor.advance();
            }
            if !cursor.eof() {
                cursor.advance();
            }
        } else {
            // Skip the header up to the opening brace, then the block.
            while !cursor.eof() && cursor.peek() != chars::LBRACE {
                cursor.advance();
            }
            if cursor.eof() {
                return Err(ScanError::UnterminatedBrace(start));
            }
            skip_braced_block(cursor)?;
        }
        push_fragment(fragments, FragmentKind::Chtl, source, start, cursor.pos, 0);
        Ok(())
    }

    /// Classify a captured script body and append one fragment per
    /// contiguous same-kind statement run.
    fn push_script_fragments(
        &self,
        fragments: &mut Vec<Fragment>,
        source: &str,
        body_span: Span,
        depth: usize,
    ) {
        let body = body_span.text(source);
        if !self.config.detect_chtl_js {
            fragments.push(Fragment::new(FragmentKind::PureJs, body.to_string(), body_span, depth));
            return;
        }

        let statements = split_statements(body, body_span.start);
        let mut runs: Vec<(FragmentKind, Span)> = Vec::new();
        for stmt in statements {
            let kind = if script_features(stmt.text(source)).is_empty() {
                FragmentKind::PureJs
            } else {
                FragmentKind::ChtlJs
            };
            match runs.last_mut() {
                Some((last_kind, last_span)) if *last_kind == kind => {
                    last_span.end = stmt.end;
                }
                _ => runs.push((kind, stmt)),
            }
        }

        if runs.is_empty() {
            // Whitespace-only body still belongs to the JS channel.
            fragments.push(Fragment::new(FragmentKind::PureJs, body.to_string(), body_span, depth));
            return;
        }
        for (kind, span) in runs {
            fragments.push(Fragment::new(kind, span.text(source).to_string(), span, depth));
        }
    }
}

impl Default for UnifiedScanner {
    fn default() -> Self {
        UnifiedScanner::new(ScannerConfig::default())
    }
}

/// Detect the CHTL-JS features present in a script statement, ignoring
/// string literals and comments.
pub fn script_features(statement: &str) -> ScriptFeatures {
    let stripped = strip_js_noise(statement);
    let mut features = ScriptFeatures::empty();
    if stripped.contains("{{") && stripped.contains("}}") {
        features |= ScriptFeatures::SELECTOR;
    }
    if stripped.contains("&->") {
        features |= ScriptFeatures::EVENT_BINDING;
    }
    if stripped.replace("&->", "").contains("->") {
        features |= ScriptFeatures::ARROW;
    }
    for keyword in ["listen", "delegate", "animate", "vir", "module"] {
        if has_block_keyword(&stripped, keyword) {
            features |= ScriptFeatures::BLOCK_KEYWORD;
        }
    }
    features
}

/// `keyword` followed (modulo whitespace) by `{`, or `vir name =`.
fn has_block_keyword(stripped: &str, keyword: &str) -> bool {
    let bytes = stripped.as_bytes();
    let mut search = 0;
    while let Some(found) = stripped[search..].find(keyword) {
        let at = search + found;
        search = at + keyword.len();
        let before_ok = at == 0 || !chars::is_ident_part(bytes[at - 1] as char);
        let after = stripped[at + keyword.len()..].trim_start();
        let after_ok = if keyword == "vir" {
            after.chars().next().map(chars::is_ident_start).unwrap_or(false)
        } else {
            after.starts_with('{')
        };
        if before_ok && after_ok {
            return true;
        }
    }
    false
}

/// Blank out string literals and comments so feature detection cannot be
/// fooled by their contents. Byte offsets are preserved: blanked ASCII
/// becomes a space, newlines and non-ASCII characters pass through.
fn strip_js_noise(input: &str) -> String {
    fn blank(out: &mut String, c: char) {
        if c == '\n' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push(' ');
        }
    }

    let mut out = String::with_capacity(input.len());
    let mut chars_iter = input.chars().peekable();
    while let Some(ch) = chars_iter.next() {
        match ch {
            '"' | '\'' | '`' => {
                out.push(' ');
                while let Some(c) = chars_iter.next() {
                    if c == '\\' {
                        out.push(' ');
                        if let Some(escaped) = chars_iter.next() {
                            blank(&mut out, escaped);
                        }
                    } else if c == ch {
                        out.push(' ');
                        break;
                    } else {
                        blank(&mut out, c);
                    }
                }
            }
            '/' if chars_iter.peek() == Some(&'/') => {
                out.push(' ');
                while let Some(&c) = chars_iter.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars_iter.next();
                    blank(&mut out, c);
                }
            }
            '/' if chars_iter.peek() == Some(&'*') => {
                chars_iter.next();
                out.push_str("  ");
                let mut prev = ' ';
                for c in chars_iter.by_ref() {
                    blank(&mut out, c);
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

fn skip_whitespace(cursor: &mut Cursor) {
    while !cursor.eof() && chars::is_whitespace(cursor.peek()) {
        cursor.advance();
    }
}

fn skip_block_comment(cursor: &mut Cursor) -> Result<(), ScanError> {
    let start = cursor.pos;
    cursor.advance_str("/*");
    loop {
        if cursor.eof() {
            return Err(ScanError::UnterminatedComment(start));
        }
        if cursor.starts_with("*/") {
            cursor.advance_str("*/");
            return Ok(());
        }
        cursor.advance();
    }
}

fn skip_string(cursor: &mut Cursor) -> Result<(), ScanError> {
    let start = cursor.pos;
    let quote = cursor.peek();
    cursor.advance();
    loop {
        if cursor.eof() {
            return Err(ScanError::UnterminatedString(start));
        }
        let ch = cursor.peek();
        if ch == chars::BACKSLASH {
            cursor.advance();
            if !cursor.eof() {
                cursor.advance();
            }
            continue;
        }
        cursor.advance();
        if ch == quote {
            return Ok(());
        }
    }
}

/// Skip a `{ … }` block with nesting, string and comment awareness.
/// The cursor must be on the opening brace; it ends past the closing one.
fn skip_braced_block(cursor: &mut Cursor) -> Result<(), ScanError> {
    let start = cursor.pos;
    debug_assert_eq!(cursor.peek(), chars::LBRACE);
    cursor.advance();
    let mut depth = 1usize;
    while depth > 0 {
        if cursor.eof() {
            return Err(ScanError::UnterminatedBrace(start));
        }
        match cursor.peek() {
            chars::DQ | chars::SQ | '`' => skip_string(cursor)?,
            chars::SLASH if cursor.starts_with("//") => cursor.skip_line(),
            chars::SLASH if cursor.starts_with("/*") => skip_block_comment(cursor)?,
            chars::LBRACE => {
                depth += 1;
                cursor.advance();
            }
            chars::RBRACE => {
                depth -= 1;
                cursor.advance();
            }
            _ => cursor.advance(),
        }
    }
    Ok(())
}

/// True when the cursor sits on `keyword` followed by optional
/// whitespace and `{`.
fn at_keyword_block(cursor: &Cursor, keyword: &str) -> bool {
    let rest = cursor.rest();
    if !rest.starts_with(keyword) {
        return false;
    }
    let after = &rest[keyword.len()..];
    if after.chars().next().map(chars::is_ident_part).unwrap_or(false) {
        return false;
    }
    after.trim_start().starts_with(chars::LBRACE)
}

/// Consume `keyword { body }` and return the span of the body (without
/// braces) plus its nesting depth.
fn capture_keyword_block(cursor: &mut Cursor, keyword: &str) -> Result<(Span, usize), ScanError> {
    cursor.advance_str(keyword);
    skip_whitespace(cursor);
    let open = cursor.pos;
    debug_assert_eq!(cursor.peek(), chars::LBRACE);
    skip_braced_block(cursor)?;
    let mut body_start = open;
    body_start.advance(chars::LBRACE);
    // Body ends before the closing brace just consumed.
    let mut body_end = cursor.pos;
    body_end.offset -= 1;
    body_end.col = body_end.col.saturating_sub(1);
    Ok((Span::new(body_start, body_end), 1))
}

/// True when an identifier is followed by an opening brace
/// (`div {` at top level).
fn at_element_block(cursor: &Cursor) -> bool {
    let rest = cursor.rest();
    let ident_len = rest.chars().take_while(|&c| chars::is_ident_part(c)).count();
    if ident_len == 0 {
        return false;
    }
    let after: String = rest.chars().skip(ident_len).collect();
    after.trim_start().starts_with(chars::LBRACE)
}

/// Consume `ident { … }`.
fn capture_element_block(cursor: &mut Cursor) -> Result<(), ScanError> {
    while chars::is_ident_part(cursor.peek()) {
        cursor.advance();
    }
    skip_whitespace(cursor);
    skip_braced_block(cursor)
}

/// Consume a run of raw HTML lines (each starting with `<`).
fn scan_html_run(cursor: &mut Cursor) {
    loop {
        cursor.skip_line();
        let rest = cursor.rest();
        let trimmed = rest.trim_start();
        if !trimmed.starts_with(chars::LT) {
            break;
        }
        // Only whitespace between the line break and the next `<`.
        let gap = &rest[..rest.len() - trimmed.len()];
        if gap.contains("\n\n") {
            break;
        }
        skip_whitespace(cursor);
    }
}

/// Split a script body into top-level statements, each reported as a span
/// in the enclosing source. Statement boundaries are `;` at depth zero
/// and the closing brace of a depth-zero block.
fn split_statements(body: &str, base: Position) -> Vec<Span> {
    let mut statements = Vec::new();
    let mut pos = base;
    let mut start: Option<Position> = None;
    let mut depth = 0usize;
    let noise_free = strip_js_noise(body);
    let mut iter = noise_free.chars().peekable();

    while let Some(ch) = iter.next() {
        let current = pos;
        pos.advance(ch);
        if chars::is_whitespace(ch) && start.is_none() {
            continue;
        }
        if start.is_none() {
            start = Some(current);
        }
        match ch {
            chars::LBRACE | chars::LPAREN | chars::LBRACKET => depth += 1,
            chars::RBRACE => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    // A block statement may be followed by `;` or `)`;
                    // keep those glued to it.
                    let mut end = pos;
                    while matches!(iter.peek(), Some(&c) if c == chars::SEMICOLON || c == chars::RPAREN)
                    {
                        let c = iter.next().unwrap();
                        pos.advance(c);
                        end = pos;
                    }
                    statements.push(Span::new(start.take().unwrap(), end));
                }
            }
            chars::RPAREN | chars::RBRACKET => depth = depth.saturating_sub(1),
            chars::SEMICOLON if depth == 0 => {
                statements.push(Span::new(start.take().unwrap(), pos));
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        statements.push(Span::new(s, pos));
    }
    statements
}

fn push_fragment(
    fragments: &mut Vec<Fragment>,
    kind: FragmentKind,
    source: &str,
    start: Position,
    end: Position,
    depth: usize,
) {
    let span = Span::new(start, end);
    fragments.push(Fragment::new(kind, span.text(source).to_string(), span, depth));
}
