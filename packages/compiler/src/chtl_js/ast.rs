//! CHTL-JS AST
//!
//! A program is an ordered sequence of parts: raw JavaScript runs are
//! kept verbatim, extension constructs become typed nodes translated by
//! the generator in place. This mirrors how the language embeds into
//! ordinary scripts rather than replacing them.

use serde::{Deserialize, Serialize};

use crate::parse_util::Span;

/// How an enhanced selector queries the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorQuery {
    Class,
    Id,
    Tag,
    Compound,
    /// `{{&}}`: the element owning the enclosing script block.
    Reference,
}

/// `{{ .box }}`, optionally indexed: `{{ .box }}[2]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorNode {
    pub selector: String,
    pub query: SelectorQuery,
    pub index: Option<usize>,
    pub span: Span,
}

impl SelectorNode {
    pub fn classify(content: &str) -> SelectorQuery {
        let trimmed = content.trim();
        if trimmed == "&" {
            SelectorQuery::Reference
        } else if trimmed.contains(char::is_whitespace)
            || trimmed.matches(['.', '#']).count() > 1
        {
            SelectorQuery::Compound
        } else if trimmed.starts_with('.') {
            SelectorQuery::Class
        } else if trimmed.starts_with('#') {
            SelectorQuery::Id
        } else {
            SelectorQuery::Tag
        }
    }
}

/// One `event: handler` pair inside a listen or delegate block. The
/// handler body is raw JavaScript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHandler {
    pub event: String,
    pub handler: String,
}

/// `target -> listen { click: fn, … }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenNode {
    pub target: Option<Box<JsNode>>,
    pub handlers: Vec<EventHandler>,
    pub span: Span,
}

/// `parent -> delegate { target: '.item', click: fn, … }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateNode {
    pub parent: Option<Box<JsNode>>,
    pub target: String,
    pub handlers: Vec<EventHandler>,
    pub span: Span,
}

/// One keyframe of an animate block: `when[0] { at: 0.3; opacity: 0; }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyframe {
    pub index: usize,
    pub at: Option<String>,
    pub props: Vec<(String, String)>,
}

/// `animate { target: …, duration: …, when[k] { … }, … }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimateNode {
    /// Scalar options in declaration order (target, duration, easing,
    /// loop, direction, delay, callback).
    pub options: Vec<(String, String)>,
    pub begin: Vec<(String, String)>,
    pub end: Vec<(String, String)>,
    pub keyframes: Vec<Keyframe>,
    pub span: Span,
}

/// `target &-> click { body }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBindingNode {
    pub target: Box<JsNode>,
    pub event: String,
    pub body: String,
    pub span: Span,
}

/// `vir name = listen { … }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirNode {
    pub name: String,
    pub block: Box<JsNode>,
    pub span: Span,
}

/// `module { load: a, load: b }` (or comma-separated load lists).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleNode {
    pub loads: Vec<String>,
    pub span: Span,
}

/// CHTL-JS node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JsNode {
    Program(Vec<JsNode>),
    /// Verbatim user JavaScript.
    Raw(String),
    EnhancedSelector(SelectorNode),
    /// `->` between two parts, flattened to `.` on emission.
    ArrowAccess,
    Listen(ListenNode),
    Delegate(DelegateNode),
    Animate(AnimateNode),
    EventBinding(EventBindingNode),
    Vir(VirNode),
    Module(ModuleNode),
}

impl JsNode {
    pub fn is_raw_whitespace(&self) -> bool {
        matches!(self, JsNode::Raw(text) if text.trim().is_empty())
    }

    /// Parts of a program node; a leaf is its own single part.
    pub fn parts(&self) -> &[JsNode] {
        match self {
            JsNode::Program(parts) => parts,
            _ => std::slice::from_ref(self),
        }
    }
}
