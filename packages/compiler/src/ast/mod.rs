//! CHTL Abstract Syntax Tree
//!
//! A single tagged node type covers every CHTL construct. Each node
//! carries its kind tag, source span, string value, an insertion-ordered
//! attribute map and exclusively-owned children. Cloning is structural,
//! so a deep clone shares nothing with the original subtree.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::parse_util::Span;

/// Sub-kind for `[Template]` and `[Custom]` declarations and their uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclKind {
    Style,
    Element,
    Var,
}

impl DeclKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclKind::Style => "@Style",
            DeclKind::Element => "@Element",
            DeclKind::Var => "@Var",
        }
    }

    pub fn parse(name: &str) -> Option<DeclKind> {
        match name {
            "Style" => Some(DeclKind::Style),
            "Element" => Some(DeclKind::Element),
            "Var" => Some(DeclKind::Var),
            _ => None,
        }
    }
}

/// Sub-kind for `[Origin]` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginKind {
    Html,
    Style,
    JavaScript,
    Custom,
}

impl OriginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginKind::Html => "@Html",
            OriginKind::Style => "@Style",
            OriginKind::JavaScript => "@JavaScript",
            OriginKind::Custom => "@Custom",
        }
    }

    pub fn parse(name: &str) -> Option<OriginKind> {
        match name {
            "Html" => Some(OriginKind::Html),
            "Style" => Some(OriginKind::Style),
            "JavaScript" => Some(OriginKind::JavaScript),
            "Custom" => Some(OriginKind::Custom),
            _ => None,
        }
    }
}

/// Comment flavour. Generator comments (`--`) survive generation when the
/// configuration asks for them; the other two never reach the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentKind {
    Line,
    Block,
    Generator,
}

/// Classification of a script block's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptKind {
    Plain,
    ChtlJs,
}

/// What a `delete` statement removes inside a style specialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteKind {
    Property,
    Inherit,
}

/// Node kind tag. Variant payloads stay small; bulk data lives in the
/// uniform `Node` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Root of a parsed compilation unit.
    Document,
    /// HTML element; `value` is the tag name.
    Element,
    /// Standalone attribute assignment; `value` is the attribute value,
    /// the name is in `attributes` under `"name"`.
    Attribute,
    /// Text child; `value` is the text.
    Text,
    /// Comment; `value` is the comment text without markers.
    Comment(CommentKind),
    /// Local or global style block. Direct declarations live in
    /// `attributes`; selector rules are `StyleRule` children.
    Style,
    /// One CSS rule inside a style block; `value` is the selector,
    /// declarations are in `attributes`.
    StyleRule,
    /// Script block; `value` is the raw body.
    Script(ScriptKind),
    /// `[Template] @Kind Name { … }`; `value` is the name.
    Template(DeclKind),
    /// `[Custom] @Kind Name { … }`; `value` is the name.
    Custom(DeclKind),
    /// `[Origin] @Kind Name? { … }`; `value` is the verbatim body, the
    /// optional name is in `attributes` under `"name"`.
    Origin(OriginKind),
    /// `[Namespace] path { … }`; `value` is the dotted path.
    Namespace,
    /// `[Import] … from path`; `value` is the imported name, the source
    /// path is in `attributes` under `"from"`.
    Import,
    /// `[Configuration] Name? { … }`; settings live in `attributes`.
    Configuration,
    /// Use of a template at a call site; `value` is the referenced name,
    /// call arguments are in `attributes`.
    TemplateRef(DeclKind),
    /// Use of a custom at a call site, with optional specialisation
    /// children (`StyleRule`, `Delete`).
    CustomRef(DeclKind),
    /// Use of an origin block at a call site; `value` is the name.
    OriginRef(OriginKind),
    /// `delete property;` or `delete inherit;`; `value` is the property
    /// name for the property form.
    Delete(DeleteKind),
    /// `inherit Name;` inside a custom body; `value` is the base name.
    Inherit,
    /// `except a, [Custom] @Element Box;`; `value` is the raw constraint
    /// list, parsed further by the constraint checker.
    Except,
    /// Subtree the parser could not make sense of; kept so downstream
    /// passes can skip it without losing sibling context.
    Invalid,
}

/// A CHTL AST node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub value: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Node {
            kind,
            span,
            value: String::new(),
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_value(kind: NodeKind, span: Span, value: impl Into<String>) -> Self {
        let mut node = Node::new(kind, span);
        node.value = value.into();
        node
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Deep clone producing an independent subtree.
    pub fn clone_deep(&self) -> Node {
        self.clone()
    }

    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// First child of the given kind, if any.
    pub fn find_child(&self, kind: NodeKind) -> Option<&Node> {
        self.children.iter().find(|c| c.kind == kind)
    }

    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        dispatch(visitor, self);
    }
}

fn dispatch<V: Visitor + ?Sized>(visitor: &mut V, node: &Node) {
    match node.kind {
        NodeKind::Document => visitor.visit_document(node),
        NodeKind::Element => visitor.visit_element(node),
        NodeKind::Attribute => visitor.visit_attribute(node),
        NodeKind::Text => visitor.visit_text(node),
        NodeKind::Comment(_) => visitor.visit_comment(node),
        NodeKind::Style => visitor.visit_style(node),
        NodeKind::StyleRule => visitor.visit_style_rule(node),
        NodeKind::Script(_) => visitor.visit_script(node),
        NodeKind::Template(_) => visitor.visit_template(node),
        NodeKind::Custom(_) => visitor.visit_custom(node),
        NodeKind::Origin(_) => visitor.visit_origin(node),
        NodeKind::Namespace => visitor.visit_namespace(node),
        NodeKind::Import => visitor.visit_import(node),
        NodeKind::Configuration => visitor.visit_configuration(node),
        NodeKind::TemplateRef(_) => visitor.visit_template_ref(node),
        NodeKind::CustomRef(_) => visitor.visit_custom_ref(node),
        NodeKind::OriginRef(_) => visitor.visit_origin_ref(node),
        NodeKind::Delete(_) => visitor.visit_delete(node),
        NodeKind::Inherit => visitor.visit_inherit(node),
        NodeKind::Except => visitor.visit_except(node),
        NodeKind::Invalid => visitor.visit_invalid(node),
    }
}

/// Visit every node in order.
pub fn visit_all<V: Visitor + ?Sized>(visitor: &mut V, nodes: &[Node]) {
    for node in nodes {
        dispatch(visitor, node);
    }
}

/// Walk a node's children in insertion order.
pub fn walk_children<V: Visitor + ?Sized>(visitor: &mut V, node: &Node) {
    visit_all(visitor, &node.children);
}

/// AST visitor. Every method defaults to traversing children, so an
/// implementation only overrides the kinds it cares about.
pub trait Visitor {
    fn visit_document(&mut self, node: &Node) {
        walk_children(self, node);
    }
    fn visit_element(&mut self, node: &Node) {
        walk_children(self, node);
    }
    fn visit_attribute(&mut self, _node: &Node) {}
    fn visit_text(&mut self, _node: &Node) {}
    fn visit_comment(&mut self, _node: &Node) {}
    fn visit_style(&mut self, node: &Node) {
        walk_children(self, node);
    }
    fn visit_style_rule(&mut self, _node: &Node) {}
    fn visit_script(&mut self, _node: &Node) {}
    fn visit_template(&mut self, node: &Node) {
        walk_children(self, node);
    }
    fn visit_custom(&mut self, node: &Node) {
        walk_children(self, node);
    }
    fn visit_origin(&mut self, _node: &Node) {}
    fn visit_namespace(&mut self, node: &Node) {
        walk_children(self, node);
    }
    fn visit_import(&mut self, _node: &Node) {}
    fn visit_configuration(&mut self, _node: &Node) {}
    fn visit_template_ref(&mut self, _node: &Node) {}
    fn visit_custom_ref(&mut self, node: &Node) {
        walk_children(self, node);
    }
    fn visit_origin_ref(&mut self, _node: &Node) {}
    fn visit_delete(&mut self, _node: &Node) {}
    fn visit_inherit(&mut self, _node: &Node) {}
    fn visit_except(&mut self, _node: &Node) {}
    fn visit_invalid(&mut self, _node: &Node) {}
}

/// No-op recursive visitor, handy as a traversal base.
pub struct RecursiveVisitor;

impl Visitor for RecursiveVisitor {}
