//! CHTL-JS parser
//!
//! Walks a script body and lifts the extension constructs into typed
//! nodes while keeping every untouched byte of user JavaScript as raw
//! parts. The result is a `Program` whose parts, emitted in order,
//! reproduce the user's code with the extensions translated in place.

use smallvec::SmallVec;

use super::ast::{
    AnimateNode, DelegateNode, EventBindingNode, EventHandler, JsNode, Keyframe, ListenNode,
    ModuleNode, SelectorNode, VirNode,
};
use super::lexer::Lexer;
use super::tokens::{Token, TokenKind};
use crate::parse_util::{Diagnostic, DiagnosticCode, Span};

/// The CHTL-JS parser.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    source: &'a str,
    lookahead: SmallVec<[Token; 2]>,
    diagnostics: Vec<Diagnostic>,
    /// Byte offset from which raw text has not yet been flushed.
    raw_mark: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(source),
            source,
            lookahead: SmallVec::new(),
            diagnostics: Vec::new(),
            raw_mark: 0,
        }
    }

    /// Parse the whole body into a `Program`.
    pub fn parse(mut self) -> (JsNode, Vec<Diagnostic>) {
        let mut parts: Vec<JsNode> = Vec::new();

        loop {
            let token = self.peek().clone();
            if token.is_eof() {
                break;
            }
            match token.kind {
                TokenKind::Selector => {
                    self.flush_raw(&mut parts, token.span.start.offset);
                    let selector = self.parse_selector();
                    parts.push(JsNode::EnhancedSelector(selector));
                }
                TokenKind::Arrow => {
                    // `-> listen { … }` / `-> delegate { … }` attach to
                    // the expression before the arrow.
                    if self.peek2().is_keyword("listen") || self.peek2().is_keyword("delegate") {
                        self.flush_raw(&mut parts, token.span.start.offset);
                        self.bump();
                        let keyword = self.bump();
                        let target = pop_target(&mut parts);
                        if keyword.value == "listen" {
                            let node = self.parse_listen_block(keyword.span, target);
                            parts.push(JsNode::Listen(node));
                        } else {
                            let node = self.parse_delegate_block(keyword.span, target);
                            parts.push(JsNode::Delegate(node));
                        }
                    } else {
                        self.flush_raw(&mut parts, token.span.start.offset);
                        self.bump();
                        self.mark_after_last();
                        parts.push(JsNode::ArrowAccess);
                    }
                }
                TokenKind::EventBind => {
                    self.flush_raw_split_target(&mut parts, token.span.start.offset);
                    self.bump();
                    let node = self.parse_event_binding(&mut parts, token.span);
                    if let Some(binding) = node {
                        parts.push(JsNode::EventBinding(binding));
                    }
                }
                TokenKind::Keyword => match token.value.as_str() {
                    "vir" => {
                        self.flush_raw(&mut parts, token.span.start.offset);
                        if let Some(node) = self.parse_vir() {
                            parts.push(JsNode::Vir(node));
                        }
                    }
                    "module" if self.peek2().is_punct('{') => {
                        self.flush_raw(&mut parts, token.span.start.offset);
                        let node = self.parse_module_block();
                        parts.push(JsNode::Module(node));
                    }
                    "animate" if self.peek2().is_punct('{') => {
                        self.flush_raw(&mut parts, token.span.start.offset);
                        let keyword = self.bump();
                        let node = self.parse_animate_block(keyword.span);
                        parts.push(JsNode::Animate(node));
                    }
                    "listen" if self.peek2().is_punct('{') => {
                        self.flush_raw(&mut parts, token.span.start.offset);
                        let keyword = self.bump();
                        let node = self.parse_listen_block(keyword.span, None);
                        parts.push(JsNode::Listen(node));
                    }
                    "delegate" if self.peek2().is_punct('{') => {
                        self.flush_raw(&mut parts, token.span.start.offset);
                        let keyword = self.bump();
                        let node = self.parse_delegate_block(keyword.span, None);
                        parts.push(JsNode::Delegate(node));
                    }
                    _ => {
                        self.bump();
                    }
                },
                _ => {
                    self.bump();
                }
            }
        }
        self.flush_raw(&mut parts, self.source.len());

        (JsNode::Program(parts), self.diagnostics)
    }

    // ---- token plumbing -------------------------------------------------

    fn fill(&mut self, n: usize) {
        while self.lookahead.len() < n {
            let token = self.lexer.next_token();
            self.lookahead.push(token);
        }
    }

    fn peek(&mut self) -> &Token {
        self.fill(1);
        &self.lookahead[0]
    }

    fn peek2(&mut self) -> &Token {
        self.fill(2);
        &self.lookahead[1]
    }

    fn bump(&mut self) -> Token {
        self.fill(1);
        self.lookahead.remove(0)
    }

    fn eat_punct(&mut self, ch: char) -> bool {
        if self.peek().is_punct(ch) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, ch: char) {
        if !self.eat_punct(ch) {
            let span = self.peek().span;
            let found = self.peek().value.clone();
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::MissingPunctuation,
                format!("expected `{}` but found `{}`", ch, found),
                Some(span),
            ));
        }
    }

    /// Flush unclaimed source text up to `offset` as a raw part.
    fn flush_raw(&mut self, parts: &mut Vec<JsNode>, offset: usize) {
        if offset > self.raw_mark {
            let text = &self.source[self.raw_mark..offset];
            if !text.is_empty() {
                parts.push(JsNode::Raw(text.to_string()));
            }
        }
        self.raw_mark = offset.max(self.raw_mark);
    }

    /// Flush raw text before an `&->`, splitting a trailing expression
    /// off the raw run to serve as the binding target.
    fn flush_raw_split_target(&mut self, parts: &mut Vec<JsNode>, offset: usize) {
        if offset <= self.raw_mark {
            return;
        }
        let pending = &self.source[self.raw_mark..offset];
        if pending.trim().is_empty() {
            self.flush_raw(parts, offset);
            return;
        }
        let split = trailing_expression_start(pending);
        let (prefix, target) = pending.split_at(split);
        if !prefix.is_empty() {
            parts.push(JsNode::Raw(prefix.to_string()));
        }
        let target = target.trim();
        if !target.is_empty() {
            parts.push(JsNode::Raw(target.to_string()));
        }
        self.raw_mark = offset;
    }

    /// Move the raw mark past the last consumed token.
    fn mark_after_last(&mut self) {
        // Called immediately after `bump`; the consumed token ended where
        // the next unconsumed text begins.
        let next_start = self.peek().span.start.offset;
        self.raw_mark = self.raw_mark.max(next_start.min(self.source.len()));
    }

    // ---- constructs -----------------------------------------------------

    fn parse_selector(&mut self) -> SelectorNode {
        let token = self.bump();
        let query = SelectorNode::classify(&token.value);
        let mut node = SelectorNode {
            selector: token.value,
            query,
            index: None,
            span: token.span,
        };
        // Optional `[n]` index.
        if self.peek().is_punct('[') && self.peek2().kind == TokenKind::Number {
            self.bump();
            let number = self.bump();
            node.index = number.value.parse().ok();
            self.expect_punct(']');
        }
        self.mark_after_last();
        node
    }

    fn parse_event_binding(
        &mut self,
        parts: &mut Vec<JsNode>,
        start: Span,
    ) -> Option<EventBindingNode> {
        let event_token = self.bump();
        if event_token.kind != TokenKind::Identifier {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::MalformedDeclaration,
                format!("expected an event name after `&->`, found `{}`", event_token.value),
                Some(event_token.span),
            ));
            return None;
        }
        self.expect_punct('{');
        let body = self.capture_block_text();
        self.mark_after_last();

        let target = pop_target(parts)?;
        Some(EventBindingNode {
            target,
            event: event_token.value,
            body,
            span: start,
        })
    }

    fn parse_vir(&mut self) -> Option<VirNode> {
        let keyword = self.bump(); // `vir`
        let name_token = self.bump();
        if name_token.kind != TokenKind::Identifier {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::MalformedDeclaration,
                "expected a name after `vir`".to_string(),
                Some(name_token.span),
            ));
            return None;
        }
        if self.peek().value != "=" {
            let span = self.peek().span;
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::MissingPunctuation,
                "expected `=` in vir declaration".to_string(),
                Some(span),
            ));
            return None;
        }
        self.bump(); // `=`

        let block_token = self.peek().clone();
        let block: JsNode = match block_token.value.as_str() {
            "listen" if block_token.kind == TokenKind::Keyword => {
                let kw = self.bump();
                JsNode::Listen(self.parse_listen_block(kw.span, None))
            }
            "delegate" if block_token.kind == TokenKind::Keyword => {
                let kw = self.bump();
                JsNode::Delegate(self.parse_delegate_block(kw.span, None))
            }
            "animate" if block_token.kind == TokenKind::Keyword => {
                let kw = self.bump();
                JsNode::Animate(self.parse_animate_block(kw.span))
            }
            _ => {
                // Any other initializer block is captured verbatim.
                let text = self.capture_statement_text();
                JsNode::Raw(text)
            }
        };
        self.eat_punct(';');
        self.mark_after_last();
        Some(VirNode {
            name: name_token.value,
            block: Box::new(block),
            span: keyword.span,
        })
    }

    fn parse_listen_block(&mut self, span: Span, target: Option<Box<JsNode>>) -> ListenNode {
        self.expect_punct('{');
        let handlers = self.parse_event_handlers();
        self.expect_punct('}');
        self.eat_punct(';');
        self.mark_after_last();
        ListenNode { target, handlers, span }
    }

    fn parse_delegate_block(&mut self, span: Span, parent: Option<Box<JsNode>>) -> DelegateNode {
        self.expect_punct('{');
        let mut target = String::new();
        let mut handlers = Vec::new();
        loop {
            if self.peek().is_eof() || self.peek().is_punct('}') {
                break;
            }
            let Some(key) = self.parse_entry_key() else { break };
            self.expect_punct(':');
            if key == "target" {
                target = self.capture_entry_value();
            } else {
                let handler = self.capture_entry_value();
                handlers.push(EventHandler { event: key, handler });
            }
            self.eat_punct(',');
        }
        self.expect_punct('}');
        self.eat_punct(';');
        self.mark_after_last();
        DelegateNode { parent, target, handlers, span }
    }

    fn parse_animate_block(&mut self, span: Span) -> AnimateNode {
        self.expect_punct('{');
        let mut node = AnimateNode {
            options: Vec::new(),
            begin: Vec::new(),
            end: Vec::new(),
            keyframes: Vec::new(),
            span,
        };
        let mut when_counter = 0usize;
        loop {
            if self.peek().is_eof() || self.peek().is_punct('}') {
                break;
            }
            let Some(key) = self.parse_entry_key() else { break };
            if matches!(key.as_str(), "begin" | "end" | "when") {
                self.eat_punct(':');
            }
            match key.as_str() {
                "begin" | "end" if self.peek().is_punct('{') => {
                    self.bump();
                    let props = self.parse_prop_list();
                    self.expect_punct('}');
                    if key == "begin" {
                        node.begin = props;
                    } else {
                        node.end = props;
                    }
                }
                "when" => {
                    let index = if self.eat_punct('[') {
                        let number = self.bump();
                        let idx = number.value.parse().unwrap_or(when_counter);
                        self.expect_punct(']');
                        idx
                    } else {
                        when_counter
                    };
                    when_counter = index + 1;
                    self.expect_punct('{');
                    let mut props = self.parse_prop_list();
                    self.expect_punct('}');
                    let at = props
                        .iter()
                        .position(|(k, _)| k == "at")
                        .map(|i| props.remove(i).1);
                    node.keyframes.push(Keyframe { index, at, props });
                }
                _ => {
                    self.expect_punct(':');
                    let value = self.capture_entry_value();
                    node.options.push((key, value));
                }
            }
            self.eat_punct(',');
            self.eat_punct(';');
        }
        self.expect_punct('}');
        self.eat_punct(';');
        self.mark_after_last();
        node.keyframes.sort_by_key(|k| k.index);
        node
    }

    fn parse_module_block(&mut self) -> ModuleNode {
        let keyword = self.bump(); // `module`
        self.expect_punct('{');
        let mut loads = Vec::new();
        loop {
            // Both the chained form `load: a, load: b` and the list form
            // `load: a, b, c` are accepted; stray commas are skipped.
            while self.eat_punct(',') {}
            if self.peek().is_eof() || self.peek().is_punct('}') {
                break;
            }
            let token = self.peek().clone();
            if token.kind == TokenKind::Identifier && token.value == "load" {
                self.bump();
                self.expect_punct(':');
                continue;
            }
            let path = self.capture_entry_value();
            if path.is_empty() {
                let span = self.peek().span;
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticCode::MalformedDeclaration,
                    "expected a module path".to_string(),
                    Some(span),
                ));
                self.bump();
                continue;
            }
            loads.push(unquote_path(&path));
        }
        self.expect_punct('}');
        self.eat_punct(';');
        self.mark_after_last();
        ModuleNode { loads, span: keyword.span }
    }

    // ---- entry helpers --------------------------------------------------

    fn parse_entry_key(&mut self) -> Option<String> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier | TokenKind::Keyword => {
                self.bump();
                Some(token.value)
            }
            TokenKind::String => {
                self.bump();
                Some(unquote_path(&token.value))
            }
            _ => {
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticCode::UnexpectedToken,
                    format!("expected an entry name, found `{}`", token.value),
                    Some(token.span),
                ));
                self.bump();
                None
            }
        }
    }

    /// `event: handler` pairs until the closing brace.
    fn parse_event_handlers(&mut self) -> Vec<EventHandler> {
        let mut handlers = Vec::new();
        loop {
            if self.peek().is_eof() || self.peek().is_punct('}') {
                break;
            }
            let Some(event) = self.parse_entry_key() else { continue };
            self.expect_punct(':');
            let handler = self.capture_entry_value();
            handlers.push(EventHandler { event, handler });
            self.eat_punct(',');
            self.eat_punct(';');
        }
        handlers
    }

    /// `k: v` pairs separated by `;` or `,` until the closing brace.
    fn parse_prop_list(&mut self) -> Vec<(String, String)> {
        let mut props = Vec::new();
        loop {
            if self.peek().is_eof() || self.peek().is_punct('}') {
                break;
            }
            let Some(key) = self.parse_entry_key() else { continue };
            self.expect_punct(':');
            let value = self.capture_entry_value();
            props.push((key, value));
            self.eat_punct(';');
            self.eat_punct(',');
        }
        props
    }

    /// Raw source text of a value, up to a top-level `,`, `;` or the
    /// enclosing `}`. Nested braces, parens and brackets are balanced,
    /// so function expressions survive intact.
    fn capture_entry_value(&mut self) -> String {
        let start = self.peek().span.start.offset;
        let mut end = start;
        let mut depth = 0usize;
        loop {
            let token = self.peek();
            if token.is_eof() {
                break;
            }
            match token.value.as_str() {
                "{" | "(" | "[" => depth += 1,
                "}" if depth == 0 => break,
                "}" | ")" | "]" => depth = depth.saturating_sub(1),
                "," | ";" if depth == 0 => break,
                _ => {}
            }
            let consumed = self.bump();
            end = consumed.span.end.offset;
        }
        self.source[start..end].trim().to_string()
    }

    /// Raw text of an already-opened `{ … }` block; consumes the brace.
    fn capture_block_text(&mut self) -> String {
        let start = self.peek().span.start.offset;
        let mut end = start;
        let mut depth = 1usize;
        loop {
            let token = self.peek();
            if token.is_eof() {
                break;
            }
            match token.value.as_str() {
                "{" => depth += 1,
                "}" => {
                    depth -= 1;
                    if depth == 0 {
                        self.bump();
                        break;
                    }
                }
                _ => {}
            }
            let consumed = self.bump();
            end = consumed.span.end.offset;
        }
        self.source[start..end].trim().to_string()
    }

    /// Raw text up to a top-level `;` (used for unrecognised vir
    /// initializers).
    fn capture_statement_text(&mut self) -> String {
        let start = self.peek().span.start.offset;
        let mut end = start;
        let mut depth = 0usize;
        loop {
            let token = self.peek();
            if token.is_eof() {
                break;
            }
            match token.value.as_str() {
                "{" | "(" | "[" => depth += 1,
                "}" | ")" | "]" => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                ";" if depth == 0 => break,
                _ => {}
            }
            let consumed = self.bump();
            end = consumed.span.end.offset;
        }
        self.source[start..end].trim().to_string()
    }
}

/// Take the most recent non-whitespace part as a binding target.
fn pop_target(parts: &mut Vec<JsNode>) -> Option<Box<JsNode>> {
    while let Some(last) = parts.last() {
        if last.is_raw_whitespace() {
            parts.pop();
            continue;
        }
        break;
    }
    parts.pop().map(Box::new)
}

/// Byte index where the trailing expression of a raw run begins: scans
/// backwards over identifier chains, member access and balanced call or
/// index argument lists.
fn trailing_expression_start(raw: &str) -> usize {
    let trimmed_end = raw.trim_end().len();
    let bytes = raw.as_bytes();
    let mut i = trimmed_end;
    let mut balance = 0i32;
    while i > 0 {
        let ch = bytes[i - 1] as char;
        match ch {
            ')' | ']' => balance += 1,
            '(' | '[' => {
                if balance == 0 {
                    break;
                }
                balance -= 1;
            }
            ';' | '{' | '}' | ',' if balance == 0 => break,
            c if c.is_whitespace() && balance == 0 => break,
            _ => {}
        }
        i -= 1;
    }
    i
}

fn unquote_path(value: &str) -> String {
    crate::util::unquote(value).to_string()
}
