//! CHTL generator
//!
//! Walks the AST and emits HTML plus collected CSS. Template uses are
//! expanded by deep-cloning the declaration into the call site with a
//! variable-substitution context; custom style uses merge call-site
//! overrides onto the cloned base with override winning; origin blocks
//! pass through verbatim into their output channel. Script bodies are
//! collected for the CHTL-JS pipeline rather than emitted here.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{CommentKind, DeclKind, DeleteKind, Node, NodeKind, OriginKind, ScriptKind};
use crate::namespace::{NamespaceRegistry, SymbolKind, GLOBAL};
use crate::parse_util::{Diagnostic, DiagnosticCode};
use crate::selector_automation::{resolve_reference, ReferenceContext};
use crate::util::{escape_html_attr, escape_html_text};

static PLACEHOLDER_REGEXP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s*\{\s*([A-Za-z_][\w-]*)\s*\}").unwrap());

static VAR_CALL_REGEXP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z_]\w*)\(\s*([A-Za-z_][\w-]*)\s*\)").unwrap());

/// Void elements never take a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Generator configuration. Layout concerns (indentation, minification)
/// are applied by the dispatcher's post-pass; emission itself is
/// compact and deterministic.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub emit_generator_comments: bool,
    /// Expansion depth bound for self-referencing templates.
    pub max_expansion_depth: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            emit_generator_comments: true,
            max_expansion_depth: 32,
        }
    }
}

/// Everything one document generates.
#[derive(Debug, Clone, Default)]
pub struct GeneratedUnit {
    pub html: String,
    pub css: String,
    /// Script bodies in source order, for the JS pipeline.
    pub scripts: Vec<(ScriptKind, String)>,
    pub diagnostics: Vec<Diagnostic>,
}

/// The CHTL generator.
pub struct HtmlGenerator<'a> {
    registry: &'a NamespaceRegistry,
    config: GeneratorConfig,
}

struct EmitState {
    html: String,
    css: String,
    scripts: Vec<(ScriptKind, String)>,
    diagnostics: Vec<Diagnostic>,
    substitutions: Vec<IndexMap<String, String>>,
    doctype: bool,
}

impl<'a> HtmlGenerator<'a> {
    pub fn new(registry: &'a NamespaceRegistry, config: GeneratorConfig) -> Self {
        HtmlGenerator { registry, config }
    }

    /// Generate a unit from a document node. Generation is a pure
    /// function of the AST: running it twice yields identical output.
    pub fn generate(&self, root: &Node) -> GeneratedUnit {
        let mut state = EmitState {
            html: String::new(),
            css: String::new(),
            scripts: Vec::new(),
            diagnostics: Vec::new(),
            substitutions: Vec::new(),
            doctype: false,
        };
        self.emit_children(root, &mut state, 0);

        let mut html = String::new();
        if state.doctype {
            html.push_str("<!DOCTYPE html>\n");
        }
        html.push_str(state.html.trim_end_matches('\n'));

        GeneratedUnit {
            html,
            css: state.css.trim_end_matches('\n').to_string(),
            scripts: state.scripts,
            diagnostics: state.diagnostics,
        }
    }

    fn emit_children(&self, parent: &Node, state: &mut EmitState, depth: usize) {
        for child in &parent.children {
            self.emit_node(child, state, depth);
        }
    }

    fn emit_node(&self, node: &Node, state: &mut EmitState, depth: usize) {
        match node.kind {
            NodeKind::Document | NodeKind::Namespace => self.emit_children(node, state, depth),
            NodeKind::Element => {
                self.emit_element(node, state, depth);
                state.html.push('\n');
            }
            NodeKind::Text => {
                let text = self.substitute(&node.value, state);
                state.html.push_str(&escape_html_text(&text));
                state.html.push('\n');
            }
            NodeKind::Comment(CommentKind::Generator) => {
                if self.config.emit_generator_comments {
                    state.html.push_str(&format!("<!-- {} -->\n", node.value));
                }
            }
            NodeKind::Comment(_) => {}
            NodeKind::Style => {
                // Global style block: selector rules go to the CSS
                // stream as written.
                for rule in &node.children {
                    if rule.kind == NodeKind::StyleRule {
                        self.emit_css_rule(rule, None, state);
                    }
                }
            }
            NodeKind::Script(kind) => state.scripts.push((kind, node.value.clone())),
            NodeKind::Origin(kind) => {
                // Anonymous origins emit in place; named ones only at
                // their reference sites.
                if node.attribute("name").is_none() {
                    self.emit_origin_body(kind, &node.value, state);
                }
            }
            NodeKind::OriginRef(kind) => self.emit_origin_ref(node, kind, state),
            NodeKind::TemplateRef(DeclKind::Element) | NodeKind::CustomRef(DeclKind::Element) => {
                self.expand_element_template(node, state, depth);
            }
            NodeKind::Configuration => {
                if node.attribute("use") == Some("html5") {
                    state.doctype = true;
                }
            }
            NodeKind::Template(_)
            | NodeKind::Custom(_)
            | NodeKind::Import
            | NodeKind::Except
            | NodeKind::Invalid
            | NodeKind::Delete(_)
            | NodeKind::Inherit
            | NodeKind::Attribute
            | NodeKind::StyleRule
            | NodeKind::TemplateRef(_)
            | NodeKind::CustomRef(_) => {}
        }
    }

    fn emit_element(&self, element: &Node, state: &mut EmitState, depth: usize) {
        let tag = &element.value;

        // Local styles contribute an inline declaration set and CSS
        // rules scoped by the element's own class or id.
        let mut inline = IndexMap::new();
        for child in &element.children {
            if child.kind == NodeKind::Style {
                self.collect_style_declarations(child, &mut inline, state);
                for rule in &child.children {
                    if rule.kind == NodeKind::StyleRule {
                        self.emit_css_rule(rule, Some(element), state);
                    }
                }
            }
        }

        state.html.push('<');
        state.html.push_str(tag);
        for (name, value) in &element.attributes {
            let value = self.substitute(value, state);
            state
                .html
                .push_str(&format!(" {}=\"{}\"", name, escape_html_attr(&value)));
        }
        if !inline.is_empty() && !element.has_attribute("style") {
            let declarations: Vec<String> = inline
                .iter()
                .map(|(k, v)| format!("{}: {}", k, self.substitute(v, state)))
                .collect();
            state
                .html
                .push_str(&format!(" style=\"{}\"", escape_html_attr(&declarations.join("; "))));
        }

        if VOID_ELEMENTS.contains(&tag.as_str()) {
            state.html.push_str(" />");
            return;
        }
        state.html.push('>');

        for child in &element.children {
            match child.kind {
                NodeKind::Element => self.emit_element(child, state, depth),
                NodeKind::Text => {
                    let text = self.substitute(&child.value, state);
                    state.html.push_str(&escape_html_text(&text));
                }
                NodeKind::Comment(CommentKind::Generator) => {
                    if self.config.emit_generator_comments {
                        state.html.push_str(&format!("<!-- {} -->", child.value));
                    }
                }
                NodeKind::Script(kind) => state.scripts.push((kind, child.value.clone())),
                NodeKind::Origin(origin_kind) => {
                    if child.attribute("name").is_none() {
                        self.emit_origin_body(origin_kind, &child.value, state);
                    }
                }
                NodeKind::OriginRef(origin_kind) => {
                    self.emit_origin_ref(child, origin_kind, state)
                }
                NodeKind::TemplateRef(DeclKind::Element)
                | NodeKind::CustomRef(DeclKind::Element) => {
                    self.expand_element_template(child, state, depth);
                }
                // Styles were handled above; the rest has no HTML shape.
                _ => {}
            }
        }

        state.html.push_str(&format!("</{}>", tag));
    }

    // ---- styles ---------------------------------------------------------

    /// Direct declarations plus referenced style groups of one local
    /// style block, in application order: references first, own
    /// declarations last so they win.
    fn collect_style_declarations(
        &self,
        style: &Node,
        into: &mut IndexMap<String, String>,
        state: &mut EmitState,
    ) {
        for child in &style.children {
            match child.kind {
                NodeKind::TemplateRef(DeclKind::Style) => {
                    let group = self.resolve_style_group(child, false, state, 0);
                    merge_declarations(into, group);
                }
                NodeKind::CustomRef(DeclKind::Style) => {
                    let mut group = self.resolve_style_group(child, true, state, 0);
                    // Specialisation: deletes first, then overrides win.
                    for entry in &child.children {
                        if let NodeKind::Delete(DeleteKind::Property) = entry.kind {
                            group.shift_remove(&entry.value);
                        }
                    }
                    for (key, value) in &child.attributes {
                        group.insert(key.clone(), value.clone());
                    }
                    merge_declarations(into, group);
                }
                NodeKind::Delete(DeleteKind::Property) => {
                    into.shift_remove(&child.value);
                }
                _ => {}
            }
        }
        for (key, value) in &style.attributes {
            into.insert(key.clone(), value.clone());
        }
    }

    /// The merged declaration set of a `@Style` group, walking the
    /// inheritance chain unless a `delete inherit;` severs it.
    fn resolve_style_group(
        &self,
        reference: &Node,
        custom_first: bool,
        state: &mut EmitState,
        depth: usize,
    ) -> IndexMap<String, String> {
        let mut result = IndexMap::new();
        if depth > self.config.max_expansion_depth {
            state.diagnostics.push(Diagnostic::error(
                DiagnosticCode::UndefinedCustom,
                format!("style group `{}` expands beyond the depth bound", reference.value),
                Some(reference.span),
            ));
            return result;
        }

        let Some(symbol) = self.lookup_style_symbol(reference, custom_first) else {
            let code = if custom_first {
                DiagnosticCode::UndefinedCustom
            } else {
                DiagnosticCode::UndefinedTemplate
            };
            state.diagnostics.push(Diagnostic::error(
                code,
                format!("style group `{}` is not defined", reference.value),
                Some(reference.span),
            ));
            return result;
        };
        let declaration = symbol.node.clone_deep();

        let severed = declaration
            .children
            .iter()
            .any(|c| matches!(c.kind, NodeKind::Delete(DeleteKind::Inherit)));

        if !severed {
            for child in &declaration.children {
                match child.kind {
                    NodeKind::Inherit => {
                        let synthetic = Node::with_value(
                            NodeKind::TemplateRef(DeclKind::Style),
                            child.span,
                            child.value.clone(),
                        );
                        let inherited =
                            self.resolve_style_group(&synthetic, custom_first, state, depth + 1);
                        merge_declarations(&mut result, inherited);
                    }
                    NodeKind::TemplateRef(DeclKind::Style) => {
                        let nested = self.resolve_style_group(child, false, state, depth + 1);
                        merge_declarations(&mut result, nested);
                    }
                    _ => {}
                }
            }
        }
        for child in &declaration.children {
            if let NodeKind::Delete(DeleteKind::Property) = child.kind {
                result.shift_remove(&child.value);
            }
        }
        for (key, value) in &declaration.attributes {
            result.insert(key.clone(), value.clone());
        }
        result
    }

    fn lookup_style_symbol(
        &self,
        reference: &Node,
        custom_first: bool,
    ) -> Option<&crate::namespace::Symbol> {
        let name = &reference.value;
        let lookup = |kind: SymbolKind| match reference.attribute("from") {
            Some(path) => self.registry.lookup_qualified(path, kind, name),
            None => self.registry.lookup(GLOBAL, kind, name),
        };
        if custom_first {
            lookup(SymbolKind::Custom).or_else(|| lookup(SymbolKind::Template))
        } else {
            lookup(SymbolKind::Template).or_else(|| lookup(SymbolKind::Custom))
        }
    }

    fn emit_css_rule(&self, rule: &Node, element: Option<&Node>, state: &mut EmitState) {
        let mut selector = rule.value.clone();
        if let Some(element) = element {
            if selector.starts_with('&') {
                let resolved = resolve_reference(element, ReferenceContext::Style);
                selector = format!("{}{}", resolved, &selector[1..]);
            }
        }
        let mut declarations: IndexMap<String, String> = IndexMap::new();
        self.collect_style_declarations(rule, &mut declarations, state);
        let body: Vec<String> = declarations
            .iter()
            .map(|(k, v)| format!("{}: {};", k, self.substitute(v, state)))
            .collect();
        state
            .css
            .push_str(&format!("{} {{ {} }}\n", selector, body.join(" ")));
    }

    // ---- origins --------------------------------------------------------

    fn emit_origin_body(&self, kind: OriginKind, body: &str, state: &mut EmitState) {
        match kind {
            OriginKind::Html | OriginKind::Custom => {
                state.html.push_str(body);
                state.html.push('\n');
            }
            OriginKind::Style => {
                state.css.push_str(body.trim());
                state.css.push('\n');
            }
            OriginKind::JavaScript => {
                state.scripts.push((ScriptKind::Plain, body.to_string()));
            }
        }
    }

    fn emit_origin_ref(&self, node: &Node, kind: OriginKind, state: &mut EmitState) {
        let symbol = match node.attribute("from") {
            Some(path) => self.registry.lookup_qualified(path, SymbolKind::Origin, &node.value),
            None => self.registry.lookup(GLOBAL, SymbolKind::Origin, &node.value),
        };
        match symbol {
            Some(symbol) => {
                let body = symbol.node.value.clone();
                self.emit_origin_body(kind, &body, state);
            }
            None => state.diagnostics.push(Diagnostic::error(
                DiagnosticCode::UndefinedOrigin,
                format!("origin `{}` is not defined", node.value),
                Some(node.span),
            )),
        }
    }

    // ---- templates ------------------------------------------------------

    /// `@Element Name(args);` clones the declaration's children into
    /// the call site under a substitution context built from the args.
    fn expand_element_template(&self, reference: &Node, state: &mut EmitState, depth: usize) {
        if depth > self.config.max_expansion_depth {
            state.diagnostics.push(Diagnostic::error(
                DiagnosticCode::UndefinedTemplate,
                format!("template `{}` expands beyond the depth bound", reference.value),
                Some(reference.span),
            ));
            return;
        }
        let custom_first = matches!(reference.kind, NodeKind::CustomRef(_));
        let symbol = {
            let name = &reference.value;
            let lookup = |kind: SymbolKind| match reference.attribute("from") {
                Some(path) => self.registry.lookup_qualified(path, kind, name),
                None => self.registry.lookup(GLOBAL, kind, name),
            };
            if custom_first {
                lookup(SymbolKind::Custom).or_else(|| lookup(SymbolKind::Template))
            } else {
                lookup(SymbolKind::Template).or_else(|| lookup(SymbolKind::Custom))
            }
        };
        let Some(symbol) = symbol else {
            state.diagnostics.push(Diagnostic::error(
                if custom_first {
                    DiagnosticCode::UndefinedCustom
                } else {
                    DiagnosticCode::UndefinedTemplate
                },
                format!("element template `{}` is not defined", reference.value),
                Some(reference.span),
            ));
            return;
        };

        let declaration = symbol.node.clone_deep();
        state.substitutions.push(reference.attributes.clone());
        for child in &declaration.children {
            self.emit_node(child, state, depth + 1);
        }
        state.substitutions.pop();
        // Expansion inserts inline; drop the trailing newline the
        // child emission added so surrounding text stays tight.
        if state.html.ends_with('\n') {
            state.html.pop();
        }
    }

    // ---- value substitution ---------------------------------------------

    /// Apply `$ {name}` placeholder substitution from the innermost
    /// expansion context, then `Group(key)` variable lookups.
    fn substitute(&self, value: &str, state: &mut EmitState) -> String {
        let with_placeholders = PLACEHOLDER_REGEXP
            .replace_all(value, |caps: &regex::Captures| {
                let key = &caps[1];
                for context in state.substitutions.iter().rev() {
                    if let Some(replacement) = context.get(key) {
                        return replacement.clone();
                    }
                }
                caps[0].to_string()
            })
            .to_string();

        let mut unknown: Vec<(String, String)> = Vec::new();
        let result = VAR_CALL_REGEXP
            .replace_all(&with_placeholders, |caps: &regex::Captures| {
                let group = &caps[1];
                let key = &caps[2];
                let symbol = self
                    .registry
                    .lookup(GLOBAL, SymbolKind::Template, group)
                    .or_else(|| self.registry.lookup(GLOBAL, SymbolKind::Custom, group))
                    .filter(|s| {
                        matches!(
                            s.node.kind,
                            NodeKind::Template(DeclKind::Var) | NodeKind::Custom(DeclKind::Var)
                        )
                    });
                match symbol {
                    Some(symbol) => match symbol.node.attribute(key) {
                        Some(replacement) => replacement.to_string(),
                        None => {
                            unknown.push((group.to_string(), key.to_string()));
                            caps[0].to_string()
                        }
                    },
                    None => caps[0].to_string(),
                }
            })
            .to_string();

        for (group, key) in unknown {
            state.diagnostics.push(Diagnostic::error(
                DiagnosticCode::UndefinedVariable,
                format!("variable group `{}` has no entry `{}`", group, key),
                None,
            ));
        }
        result
    }
}

fn merge_declarations(into: &mut IndexMap<String, String>, from: IndexMap<String, String>) {
    for (key, value) in from {
        into.insert(key, value);
    }
}
