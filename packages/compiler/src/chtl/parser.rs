//! CHTL parser
//!
//! Recursive descent over the streaming lexer with two tokens of
//! lookahead. On a syntax error the parser records a diagnostic,
//! advances to the next synchronising token (`;`, `}`, a bracket
//! keyword or EOF) and keeps going, producing a partial AST whose
//! unusable subtrees are marked `Invalid`.

use smallvec::SmallVec;

use super::lexer::{Lexer, LexerConfig};
use super::tokens::{Token, TokenKind};
use crate::ast::{CommentKind, DeclKind, DeleteKind, Node, NodeKind, OriginKind, ScriptKind};
use crate::parse_util::{Diagnostic, DiagnosticCode, Span};
use crate::scanner::script_features;

/// Parser configuration.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Permissive mode recovers at synchronising tokens; strict mode
    /// stops at the first syntax error.
    pub recover: bool,
    pub max_errors: usize,
    pub lexer: LexerConfig,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            recover: true,
            max_errors: 100,
            lexer: LexerConfig::default(),
        }
    }
}

/// The CHTL parser.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: SmallVec<[Token; 2]>,
    diagnostics: Vec<Diagnostic>,
    config: ParserConfig,
    halted: bool,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, config: ParserConfig) -> Self {
        let lexer = Lexer::new(source, config.lexer.clone());
        Parser {
            lexer,
            lookahead: SmallVec::new(),
            diagnostics: Vec::new(),
            config,
            halted: false,
        }
    }

    /// Parse a whole compilation unit into a `Document` node.
    pub fn parse(mut self) -> (Node, Vec<Diagnostic>) {
        let start = self.peek().span;
        let mut document = Node::new(NodeKind::Document, start);

        while !self.peek().is_eof() && !self.halted {
            if let Some(node) = self.parse_top_decl() {
                document.add_child(node);
            }
        }
        document.span = Span::new(start.start, self.peek().span.end);

        for lex_error in self.lexer.take_errors() {
            let code = if lex_error.message.contains("unterminated") {
                DiagnosticCode::UnterminatedLiteral
            } else {
                DiagnosticCode::InvalidCharacter
            };
            self.diagnostics.push(Diagnostic::error(
                code,
                format!("{} (`{}`)", lex_error.message, lex_error.text),
                Some(Span::at(lex_error.position)),
            ));
        }

        (document, self.diagnostics)
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

    fn at_punct(&mut self, ch: char) -> bool {
        self.peek().is_punct(ch)
    }

    fn eat_punct(&mut self, ch: char) -> bool {
        if self.at_punct(ch) {
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
            self.error(
                DiagnosticCode::MissingPunctuation,
                format!("expected `{}` but found `{}`", ch, found),
                span,
            );
        }
    }

    fn error(&mut self, code: DiagnosticCode, message: String, span: Span) {
        if self.diagnostics.len() < self.config.max_errors {
            self.diagnostics.push(Diagnostic::error(code, message, Some(span)));
        }
        if !self.config.recover {
            self.halted = true;
        }
    }

    /// Skip to the next synchronising token. Consumes a `;` terminator,
    /// leaves `}` and bracket keywords for the caller.
    fn synchronize(&mut self) {
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Eof => return,
                TokenKind::Punctuation if token.value == ";" => {
                    self.bump();
                    return;
                }
                TokenKind::Punctuation if token.value == "}" => return,
                TokenKind::Keyword if token.value.starts_with('[') => return,
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn invalid_here(&mut self) -> Node {
        let span = self.peek().span;
        self.synchronize();
        Node::new(NodeKind::Invalid, span)
    }

    // ---- top level ------------------------------------------------------

    fn parse_top_decl(&mut self) -> Option<Node> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Keyword => match token.value.as_str() {
                "[Namespace]" => Some(self.parse_namespace()),
                "[Template]" => Some(self.parse_template_decl(false)),
                "[Custom]" => Some(self.parse_template_decl(true)),
                "[Origin]" => Some(self.parse_origin()),
                "[Configuration]" => Some(self.parse_configuration()),
                "[Import]" => Some(self.parse_import()),
                "style" if self.peek2().is_punct('{') => Some(self.parse_style_block()),
                "script" if self.peek2().is_punct('{') => Some(self.parse_script_block()),
                "use" => Some(self.parse_use_statement()),
                "text" if self.peek2().is_punct('{') => {
                    // A stray text block at top level is tolerated.
                    Some(self.parse_text_block())
                }
                _ => {
                    self.error(
                        DiagnosticCode::UnexpectedToken,
                        format!("unexpected keyword `{}`", token.value),
                        token.span,
                    );
                    Some(self.invalid_here())
                }
            },
            TokenKind::CommentGenerator => {
                let token = self.bump();
                Some(comment_node(token, CommentKind::Generator))
            }
            TokenKind::CommentLine | TokenKind::CommentBlock => {
                self.bump();
                None
            }
            TokenKind::Identifier if self.peek2().is_punct('{') => {
                let name = self.bump();
                Some(self.parse_element(name))
            }
            _ => {
                self.error(
                    DiagnosticCode::UnexpectedToken,
                    format!("unexpected token `{}`", token.value),
                    token.span,
                );
                Some(self.invalid_here())
            }
        }
    }

    /// `use html5;`
    fn parse_use_statement(&mut self) -> Node {
        let start = self.bump().span;
        let mut node = Node::new(NodeKind::Configuration, start);
        if let Some(word) = self.peek().word().map(str::to_string) {
            self.bump();
            node.set_attribute("use", word);
        } else {
            let span = self.peek().span;
            self.error(
                DiagnosticCode::MalformedDeclaration,
                "expected a target after `use`".to_string(),
                span,
            );
        }
        self.expect_punct(';');
        node
    }

    // ---- elements -------------------------------------------------------

    fn parse_element(&mut self, name: Token) -> Node {
        let mut element = Node::with_value(NodeKind::Element, name.span, name.value);
        self.expect_punct('{');
        self.parse_element_body(&mut element);
        let end = self.peek().span;
        self.expect_punct('}');
        element.span = Span::new(name.span.start, end.end);
        element
    }

    fn parse_element_body(&mut self, parent: &mut Node) {
        loop {
            if self.halted || self.peek().is_eof() || self.at_punct('}') {
                return;
            }
            let token = self.peek().clone();
            match token.kind {
                TokenKind::CommentGenerator => {
                    let t = self.bump();
                    parent.add_child(comment_node(t, CommentKind::Generator));
                }
                TokenKind::CommentLine | TokenKind::CommentBlock => {
                    self.bump();
                }
                TokenKind::Keyword => match token.value.as_str() {
                    "style" if self.peek2().is_punct('{') => {
                        let style = self.parse_style_block();
                        parent.add_child(style);
                    }
                    "script" if self.peek2().is_punct('{') => {
                        let script = self.parse_script_block();
                        parent.add_child(script);
                    }
                    "text" if self.peek2().is_punct('{') => {
                        let text = self.parse_text_block();
                        parent.add_child(text);
                    }
                    "delete" => self.parse_delete_into(parent),
                    "inherit" => parent.add_child(self.parse_inherit()),
                    "except" => parent.add_child(self.parse_except()),
                    "[Origin]" => parent.add_child(self.parse_origin()),
                    "[Template]" | "[Custom]" => {
                        // Kind-qualified use: `[Custom] @Element Box;`
                        self.bump();
                        if let Some(node) = self.parse_at_reference() {
                            parent.add_child(node);
                        }
                    }
                    _ => {
                        // Keywords double as attribute names (`from: x;`).
                        if self.peek2().is_punct(':') || self.peek2().value == "=" {
                            self.parse_attribute_into(parent);
                        } else {
                            self.error(
                                DiagnosticCode::UnexpectedToken,
                                format!("unexpected `{}` in element body", token.value),
                                token.span,
                            );
                            parent.add_child(self.invalid_here());
                        }
                    }
                },
                TokenKind::Punctuation if token.value == "@" => {
                    if let Some(node) = self.parse_at_reference() {
                        parent.add_child(node);
                    }
                }
                TokenKind::String
                | TokenKind::UnquotedLiteral
                | TokenKind::Number => {
                    let t = self.bump();
                    let mut text = Node::with_value(NodeKind::Text, t.span, t.value);
                    text.span = t.span;
                    parent.add_child(text);
                    self.eat_punct(';');
                }
                TokenKind::Identifier => {
                    if self.peek2().is_punct('{') {
                        let name = self.bump();
                        let child = self.parse_element(name);
                        parent.add_child(child);
                    } else if self.peek2().is_punct(':') || self.peek2().value == "=" {
                        self.parse_attribute_into(parent);
                    } else {
                        self.error(
                            DiagnosticCode::UnexpectedToken,
                            format!("unexpected identifier `{}`", token.value),
                            token.span,
                        );
                        parent.add_child(self.invalid_here());
                    }
                }
                _ => {
                    self.error(
                        DiagnosticCode::UnexpectedToken,
                        format!("unexpected token `{}` in element body", token.value),
                        token.span,
                    );
                    parent.add_child(self.invalid_here());
                }
            }
        }
    }

    /// `name: value;` where the value may be a quoted string, a number or a
    /// run of unquoted tokens up to the terminating semicolon.
    fn parse_attribute_into(&mut self, parent: &mut Node) {
        let name_token = self.bump();
        let name = name_token.value;
        self.bump(); // `:` or `=`
        let value = self.collect_value_until_semicolon();
        self.expect_punct(';');
        parent.set_attribute(name, value);
    }

    fn collect_value_until_semicolon(&mut self) -> String {
        let mut parts: Vec<Token> = Vec::new();
        loop {
            let token = self.peek();
            if token.is_eof() || token.is_punct(';') || token.is_punct('}') {
                break;
            }
            let t = self.bump();
            parts.push(t);
        }
        join_value_tokens(&parts)
    }

    // ---- style ----------------------------------------------------------

    fn parse_style_block(&mut self) -> Node {
        let start = self.bump().span; // `style`
        let mut style = Node::new(NodeKind::Style, start);
        self.expect_punct('{');
        self.parse_style_body(&mut style, true);
        let end = self.peek().span;
        self.expect_punct('}');
        style.span = Span::new(start.start, end.end);
        style
    }

    /// Style bodies hold declarations, selector rules, references and
    /// deletes. Inside a selector rule only declarations appear.
    fn parse_style_body(&mut self, style: &mut Node, allow_rules: bool) {
        loop {
            if self.halted || self.peek().is_eof() || self.at_punct('}') {
                return;
            }
            let token = self.peek().clone();
            match token.kind {
                TokenKind::CommentGenerator => {
                    let t = self.bump();
                    style.add_child(comment_node(t, CommentKind::Generator));
                }
                TokenKind::CommentLine | TokenKind::CommentBlock => {
                    self.bump();
                }
                TokenKind::Punctuation if token.value == "@" => {
                    if let Some(node) = self.parse_at_reference() {
                        style.add_child(node);
                    }
                }
                TokenKind::Keyword if token.value == "delete" => self.parse_delete_into(style),
                TokenKind::Keyword if token.value == "inherit" => {
                    style.add_child(self.parse_inherit());
                }
                TokenKind::Keyword if token.value == "except" => {
                    style.add_child(self.parse_except());
                }
                TokenKind::Punctuation
                    if allow_rules && matches!(token.value.as_str(), "." | "#" | "&") =>
                {
                    let rule = self.parse_style_rule();
                    style.add_child(rule);
                }
                _ => {
                    if let Some(word) = self.peek().word().map(str::to_string) {
                        if self.peek2().is_punct(':') {
                            self.bump();
                            self.bump();
                            let value = self.collect_value_until_semicolon();
                            self.expect_punct(';');
                            style.set_attribute(word, value);
                            continue;
                        }
                        if allow_rules && self.peek2().is_punct('{') {
                            let rule = self.parse_style_rule();
                            style.add_child(rule);
                            continue;
                        }
                    }
                    self.error(
                        DiagnosticCode::UnexpectedToken,
                        format!("unexpected `{}` in style block", token.value),
                        token.span,
                    );
                    style.add_child(self.invalid_here());
                }
            }
        }
    }

    /// `.card:hover { … }`: selector tokens up to the opening brace.
    fn parse_style_rule(&mut self) -> Node {
        let start = self.peek().span;
        let mut selector_tokens: Vec<Token> = Vec::new();
        while !self.peek().is_eof() && !self.at_punct('{') && !self.at_punct('}') {
            let t = self.bump();
            selector_tokens.push(t);
        }
        let selector = join_selector_tokens(&selector_tokens);
        let mut rule = Node::with_value(NodeKind::StyleRule, start, selector);
        self.expect_punct('{');
        self.parse_style_body(&mut rule, false);
        let end = self.peek().span;
        self.expect_punct('}');
        rule.span = Span::new(start.start, end.end);
        rule
    }

    // ---- script ---------------------------------------------------------

    fn parse_script_block(&mut self) -> Node {
        let start = self.bump().span; // `script`
        if !self.eat_punct('{') {
            let span = self.peek().span;
            self.error(
                DiagnosticCode::MissingPunctuation,
                "expected `{` after `script`".to_string(),
                span,
            );
            return self.invalid_here();
        }
        debug_assert!(self.lookahead.is_empty());
        match self.lexer.capture_raw_block() {
            Ok((body, span)) => {
                let kind = if script_features(&body).is_empty() {
                    ScriptKind::Plain
                } else {
                    ScriptKind::ChtlJs
                };
                let mut node = Node::with_value(NodeKind::Script(kind), span, body);
                node.span = Span::new(start.start, span.end);
                node
            }
            Err(err) => {
                self.error(
                    DiagnosticCode::UnmatchedBrace,
                    "unterminated script block".to_string(),
                    Span::at(err.position),
                );
                Node::new(NodeKind::Invalid, start)
            }
        }
    }

    // ---- text -----------------------------------------------------------

    fn parse_text_block(&mut self) -> Node {
        let start = self.bump().span; // `text`
        let mut text = Node::new(NodeKind::Text, start);
        self.expect_punct('{');
        let mut parts: Vec<String> = Vec::new();
        loop {
            let token = self.peek().clone();
            if token.is_eof() || token.is_punct('}') {
                break;
            }
            if token.is_literal() || token.word().is_some() {
                let t = self.bump();
                parts.push(t.value);
                self.eat_punct(';');
                self.eat_punct(',');
            } else {
                self.error(
                    DiagnosticCode::UnexpectedToken,
                    format!("unexpected `{}` in text block", token.value),
                    token.span,
                );
                self.synchronize();
            }
        }
        let end = self.peek().span;
        self.expect_punct('}');
        text.value = parts.join(" ");
        text.span = Span::new(start.start, end.end);
        text
    }

    // ---- references -----------------------------------------------------

    /// `@Kind Name`, optionally with call arguments, a `from` clause and
    /// a specialisation block.
    fn parse_at_reference(&mut self) -> Option<Node> {
        let at = self.bump(); // `@`
        let kind_token = self.bump();
        let Some(kind_word) = kind_token.word().map(str::to_string) else {
            self.error(
                DiagnosticCode::MalformedDeclaration,
                "expected a kind after `@`".to_string(),
                kind_token.span,
            );
            self.synchronize();
            return Some(Node::new(NodeKind::Invalid, at.span));
        };
        let Some(kind) = DeclKind::parse(&kind_word) else {
            self.error(
                DiagnosticCode::MalformedDeclaration,
                format!("unknown reference kind `@{}`", kind_word),
                kind_token.span,
            );
            self.synchronize();
            return Some(Node::new(NodeKind::Invalid, at.span));
        };

        let name_token = self.bump();
        let Some(name) = name_token.word().map(str::to_string) else {
            self.error(
                DiagnosticCode::MalformedDeclaration,
                format!("expected a name after `@{}`", kind_word),
                name_token.span,
            );
            self.synchronize();
            return Some(Node::new(NodeKind::Invalid, at.span));
        };

        let mut node = Node::with_value(NodeKind::TemplateRef(kind), at.span, name);

        if self.eat_punct('(') {
            self.parse_call_arguments(&mut node);
        }
        if self.peek().is_keyword("from") {
            self.bump();
            let path = self.collect_dotted_path();
            node.set_attribute("from", path);
        }
        if self.at_punct('{') {
            node.kind = NodeKind::CustomRef(kind);
            self.bump();
            self.parse_specialisation_body(&mut node);
            self.expect_punct('}');
        } else {
            self.expect_punct(';');
        }
        node.span = Span::new(at.span.start, self.peek().span.start);
        Some(node)
    }

    /// `(label="x", width=10px)`
    fn parse_call_arguments(&mut self, node: &mut Node) {
        loop {
            if self.peek().is_eof() || self.at_punct(')') {
                break;
            }
            let name_token = self.bump();
            let Some(name) = name_token.word().map(str::to_string) else {
                self.error(
                    DiagnosticCode::MalformedDeclaration,
                    "expected an argument name".to_string(),
                    name_token.span,
                );
                break;
            };
            let mut value = String::new();
            if self.peek().value == "=" || self.peek().is_punct(':') {
                self.bump();
                let value_token = self.bump();
                value = value_token.value;
            }
            node.set_attribute(name, value);
            if !self.eat_punct(',') {
                break;
            }
        }
        self.expect_punct(')');
    }

    /// Specialisation body of a custom use: declaration overrides and
    /// delete statements.
    fn parse_specialisation_body(&mut self, node: &mut Node) {
        loop {
            if self.halted || self.peek().is_eof() || self.at_punct('}') {
                return;
            }
            let token = self.peek().clone();
            if token.is_keyword("delete") {
                self.parse_delete_into(node);
                continue;
            }
            if let Some(word) = token.word().map(str::to_string) {
                if self.peek2().is_punct(':') {
                    self.bump();
                    self.bump();
                    let value = self.collect_value_until_semicolon();
                    self.expect_punct(';');
                    node.set_attribute(word, value);
                    continue;
                }
            }
            self.error(
                DiagnosticCode::UnexpectedToken,
                format!("unexpected `{}` in specialisation", token.value),
                token.span,
            );
            node.add_child(self.invalid_here());
        }
    }

    fn collect_dotted_path(&mut self) -> String {
        let mut path = String::new();
        loop {
            let token = self.peek().clone();
            if let Some(word) = token.word() {
                path.push_str(word);
                self.bump();
            } else if token.kind == TokenKind::String {
                path.push_str(&token.value);
                self.bump();
            } else {
                break;
            }
            if self.at_punct('.') {
                self.bump();
                path.push('.');
            } else {
                break;
            }
        }
        path
    }

    // ---- declarations ---------------------------------------------------

    fn parse_template_decl(&mut self, is_custom: bool) -> Node {
        let keyword = self.bump(); // `[Template]` / `[Custom]`
        self.expect_punct('@');
        let kind_token = self.bump();
        let kind = kind_token
            .word()
            .and_then(DeclKind::parse);
        let Some(kind) = kind else {
            self.error(
                DiagnosticCode::MalformedDeclaration,
                format!("unknown declaration kind `@{}`", kind_token.value),
                kind_token.span,
            );
            return self.invalid_here();
        };

        let name_token = self.bump();
        let Some(name) = name_token.word().map(str::to_string) else {
            self.error(
                DiagnosticCode::MalformedDeclaration,
                "expected a declaration name".to_string(),
                name_token.span,
            );
            return self.invalid_here();
        };

        let node_kind = if is_custom {
            NodeKind::Custom(kind)
        } else {
            NodeKind::Template(kind)
        };
        let mut node = Node::with_value(node_kind, keyword.span, name);

        self.expect_punct('{');
        match kind {
            DeclKind::Var => self.parse_var_entries(&mut node),
            DeclKind::Style => self.parse_style_body(&mut node, true),
            DeclKind::Element => self.parse_element_body(&mut node),
        }
        let end = self.peek().span;
        self.expect_punct('}');
        node.span = Span::new(keyword.span.start, end.end);
        node
    }

    /// `key = value;` entries of a `@Var` group.
    fn parse_var_entries(&mut self, node: &mut Node) {
        loop {
            if self.halted || self.peek().is_eof() || self.at_punct('}') {
                return;
            }
            let token = self.peek().clone();
            let Some(word) = token.word().map(str::to_string) else {
                self.error(
                    DiagnosticCode::MalformedDeclaration,
                    format!("expected a variable name, found `{}`", token.value),
                    token.span,
                );
                self.synchronize();
                continue;
            };
            self.bump();
            if self.peek().value == "=" || self.at_punct(':') {
                self.bump();
            } else {
                let span = self.peek().span;
                self.error(
                    DiagnosticCode::MissingPunctuation,
                    "expected `=` in variable entry".to_string(),
                    span,
                );
            }
            let value = self.collect_value_until_semicolon();
            self.expect_punct(';');
            node.set_attribute(word, value);
        }
    }

    fn parse_origin(&mut self) -> Node {
        let keyword = self.bump(); // `[Origin]`
        self.expect_punct('@');
        let kind_token = self.bump();
        let kind = kind_token.word().and_then(OriginKind::parse);
        let Some(kind) = kind else {
            self.error(
                DiagnosticCode::MalformedDeclaration,
                format!("unknown origin kind `@{}`", kind_token.value),
                kind_token.span,
            );
            return self.invalid_here();
        };

        let mut name = None;
        if let Some(word) = self.peek().word().map(str::to_string) {
            self.bump();
            name = Some(word);
        }

        if self.at_punct('{') {
            self.bump();
            debug_assert!(self.lookahead.is_empty());
            match self.lexer.capture_raw_block() {
                Ok((body, span)) => {
                    let mut node = Node::with_value(NodeKind::Origin(kind), keyword.span, body);
                    if let Some(n) = name {
                        node.set_attribute("name", n);
                    }
                    node.span = Span::new(keyword.span.start, span.end);
                    node
                }
                Err(err) => {
                    self.error(
                        DiagnosticCode::UnmatchedBrace,
                        "unterminated origin block".to_string(),
                        Span::at(err.position),
                    );
                    Node::new(NodeKind::Invalid, keyword.span)
                }
            }
        } else {
            // Use of a named origin: `[Origin] @Html name;`
            let mut node = Node::new(NodeKind::OriginRef(kind), keyword.span);
            match name {
                Some(n) => node.value = n,
                None => {
                    let span = self.peek().span;
                    self.error(
                        DiagnosticCode::MalformedDeclaration,
                        "origin reference needs a name".to_string(),
                        span,
                    );
                }
            }
            self.expect_punct(';');
            node
        }
    }

    fn parse_namespace(&mut self) -> Node {
        let keyword = self.bump(); // `[Namespace]`
        let path = self.collect_dotted_path();
        let mut node = Node::with_value(NodeKind::Namespace, keyword.span, path);
        if node.value.is_empty() {
            let span = self.peek().span;
            self.error(
                DiagnosticCode::MalformedDeclaration,
                "expected a namespace path".to_string(),
                span,
            );
        }
        if self.eat_punct('{') {
            while !self.peek().is_eof() && !self.at_punct('}') && !self.halted {
                if let Some(child) = self.parse_top_decl() {
                    node.add_child(child);
                }
            }
            self.expect_punct('}');
        } else {
            self.eat_punct(';');
        }
        node
    }

    fn parse_configuration(&mut self) -> Node {
        let keyword = self.bump(); // `[Configuration]`
        let mut node = Node::new(NodeKind::Configuration, keyword.span);
        if let Some(word) = self.peek().word().map(str::to_string) {
            self.bump();
            node.value = word;
        }
        self.expect_punct('{');
        self.parse_var_entries(&mut node);
        self.expect_punct('}');
        node
    }

    fn parse_import(&mut self) -> Node {
        let keyword = self.bump(); // `[Import]`
        let mut node = Node::new(NodeKind::Import, keyword.span);

        if self.at_punct('@') {
            self.bump();
            let kind_token = self.bump();
            if let Some(word) = kind_token.word() {
                node.set_attribute("kind", word);
            }
        }
        if !self.peek().is_keyword("from") {
            if let Some(word) = self.peek().word().map(str::to_string) {
                self.bump();
                node.value = word;
            } else if self.peek().kind == TokenKind::String {
                let t = self.bump();
                node.value = t.value;
            }
        }
        if self.peek().is_keyword("from") {
            self.bump();
            let path = if self.peek().kind == TokenKind::String {
                self.bump().value
            } else {
                self.collect_dotted_path()
            };
            if path.is_empty() {
                let span = self.peek().span;
                self.error(
                    DiagnosticCode::MalformedDeclaration,
                    "expected a path after `from`".to_string(),
                    span,
                );
            }
            node.set_attribute("from", path);
        }
        if self.peek().is_keyword("as") {
            self.bump();
            if let Some(word) = self.peek().word().map(str::to_string) {
                self.bump();
                node.set_attribute("as", word);
            }
        }
        self.eat_punct(';');
        node
    }

    // ---- statements -----------------------------------------------------

    /// `delete prop1, prop2;` or `delete inherit;`, one node per item.
    fn parse_delete_into(&mut self, parent: &mut Node) {
        let keyword = self.bump(); // `delete`
        if self.peek().is_keyword("inherit") {
            self.bump();
            self.expect_punct(';');
            parent.add_child(Node::new(NodeKind::Delete(DeleteKind::Inherit), keyword.span));
            return;
        }
        loop {
            let token = self.peek().clone();
            let Some(word) = token.word().map(str::to_string) else {
                self.error(
                    DiagnosticCode::MalformedDeclaration,
                    "expected a property name after `delete`".to_string(),
                    token.span,
                );
                self.synchronize();
                return;
            };
            self.bump();
            parent.add_child(Node::with_value(
                NodeKind::Delete(DeleteKind::Property),
                keyword.span,
                word,
            ));
            if !self.eat_punct(',') {
                break;
            }
        }
        self.expect_punct(';');
    }

    fn parse_inherit(&mut self) -> Node {
        let keyword = self.bump(); // `inherit`
        let mut node = Node::new(NodeKind::Inherit, keyword.span);
        if self.eat_punct('@') {
            let kind_token = self.bump();
            if let Some(word) = kind_token.word() {
                node.set_attribute("kind", word);
            }
        }
        if let Some(word) = self.peek().word().map(str::to_string) {
            self.bump();
            node.value = word;
        } else {
            let span = self.peek().span;
            self.error(
                DiagnosticCode::MalformedDeclaration,
                "expected a name after `inherit`".to_string(),
                span,
            );
        }
        self.expect_punct(';');
        node
    }

    /// `except a, [Custom] @Element Box;`: the raw list is kept on the
    /// node; the constraint checker parses it into rules.
    fn parse_except(&mut self) -> Node {
        let keyword = self.bump(); // `except`
        let mut parts: Vec<Token> = Vec::new();
        while !self.peek().is_eof() && !self.at_punct(';') && !self.at_punct('}') {
            let t = self.bump();
            parts.push(t);
        }
        self.eat_punct(';');
        Node::with_value(NodeKind::Except, keyword.span, join_selector_tokens(&parts))
    }
}

fn comment_node(token: Token, kind: CommentKind) -> Node {
    Node::with_value(NodeKind::Comment(kind), token.span, token.value)
}

/// Join value tokens back into one string. Tokens that were separated
/// in the source stay separated by a single space; adjacent tokens stay
/// glued, so `#fff`, `G(k)` and `0 10px 5px auto` all survive intact.
fn join_value_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && token.span.start.offset > tokens[i - 1].span.end.offset {
            out.push(' ');
        }
        if token.kind == TokenKind::String {
            out.push('"');
            out.push_str(&token.value);
            out.push('"');
        } else {
            out.push_str(&token.value);
        }
    }
    out
}

/// Join selector tokens, preserving the source's separations:
/// `.card:hover` stays tight while `.a .b` keeps its descendant space.
fn join_selector_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && token.span.start.offset > tokens[i - 1].span.end.offset {
            out.push(' ');
        }
        out.push_str(&token.value);
    }
    out
}
