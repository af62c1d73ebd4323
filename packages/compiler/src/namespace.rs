//! Namespace registry and symbol table
//!
//! Namespaces form a tree rooted at the anonymous global namespace.
//! The tree lives in an arena; nodes refer to parents and children by
//! index, never by owning pointers. Each namespace owns four symbol
//! maps keyed by name, with insertion order preserved so merge
//! tie-breaks are deterministic in source order.

use indexmap::IndexMap;

use crate::ast::Node;
use crate::parse_util::{Diagnostic, DiagnosticCode, Span};
use crate::util::split_dotted_path;

/// Index of a namespace in the registry arena.
pub type NamespaceId = usize;

/// The four symbol kinds a namespace can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Template,
    Custom,
    Origin,
    Config,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Template => "template",
            SymbolKind::Custom => "custom",
            SymbolKind::Origin => "origin",
            SymbolKind::Config => "configuration",
        }
    }
}

/// Names that may not be used as namespace components.
pub const RESERVED_NAMES: &[&str] = &["global", "default", "system", "chtl", "temp", "tmp"];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// A registered declaration. The identity pair (file, offset) makes
/// re-registration of the same declaration idempotent while rejecting a
/// different declaration under the same name.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub node: Node,
    pub identity: (String, usize),
}

/// One namespace in the tree.
#[derive(Debug, Clone, Default)]
pub struct NamespaceInfo {
    pub name: String,
    pub parent: Option<NamespaceId>,
    pub children: Vec<NamespaceId>,
    pub templates: IndexMap<String, Symbol>,
    pub customs: IndexMap<String, Symbol>,
    pub origins: IndexMap<String, Symbol>,
    pub configs: IndexMap<String, Symbol>,
    pub imports: Vec<Node>,
}

impl NamespaceInfo {
    fn map(&self, kind: SymbolKind) -> &IndexMap<String, Symbol> {
        match kind {
            SymbolKind::Template => &self.templates,
            SymbolKind::Custom => &self.customs,
            SymbolKind::Origin => &self.origins,
            SymbolKind::Config => &self.configs,
        }
    }

    fn map_mut(&mut self, kind: SymbolKind) -> &mut IndexMap<String, Symbol> {
        match kind {
            SymbolKind::Template => &mut self.templates,
            SymbolKind::Custom => &mut self.customs,
            SymbolKind::Origin => &mut self.origins,
            SymbolKind::Config => &mut self.configs,
        }
    }
}

/// The namespace registry.
#[derive(Debug)]
pub struct NamespaceRegistry {
    arena: Vec<NamespaceInfo>,
    cursor: Vec<NamespaceId>,
}

pub const GLOBAL: NamespaceId = 0;

impl NamespaceRegistry {
    pub fn new() -> Self {
        NamespaceRegistry {
            arena: vec![NamespaceInfo::default()],
            cursor: Vec::new(),
        }
    }

    pub fn get(&self, id: NamespaceId) -> &NamespaceInfo {
        &self.arena[id]
    }

    /// Current namespace: innermost entered, or the global one.
    pub fn current(&self) -> NamespaceId {
        self.cursor.last().copied().unwrap_or(GLOBAL)
    }

    /// Create a namespace (and any missing ancestors) for a dotted path.
    /// Rejects reserved component names.
    pub fn create(&mut self, path: &str) -> Result<NamespaceId, Diagnostic> {
        let components = split_dotted_path(path);
        let mut current = GLOBAL;
        for component in &components {
            if is_reserved(component) {
                return Err(Diagnostic::error(
                    DiagnosticCode::ReservedName,
                    format!("`{}` is a reserved namespace name", component),
                    None,
                ));
            }
            current = match self.find_child(current, component) {
                Some(child) => child,
                None => self.add_child(current, component.clone()),
            };
        }
        Ok(current)
    }

    fn add_child(&mut self, parent: NamespaceId, name: String) -> NamespaceId {
        let id = self.arena.len();
        self.arena.push(NamespaceInfo {
            name,
            parent: Some(parent),
            ..NamespaceInfo::default()
        });
        self.arena[parent].children.push(id);
        id
    }

    fn find_child(&self, parent: NamespaceId, name: &str) -> Option<NamespaceId> {
        self.arena[parent]
            .children
            .iter()
            .copied()
            .find(|&c| self.arena[c].name == name)
    }

    /// Find a namespace by path. A fully-qualified dotted path is walked
    /// directly from the root; a bare short name falls back to a
    /// depth-first search over the whole tree.
    pub fn find(&self, path: &str) -> Option<NamespaceId> {
        if path.is_empty() {
            return Some(GLOBAL);
        }
        let components = split_dotted_path(path);
        let mut current = GLOBAL;
        let mut walked = true;
        for component in &components {
            match self.find_child(current, component) {
                Some(child) => current = child,
                None => {
                    walked = false;
                    break;
                }
            }
        }
        if walked {
            return Some(current);
        }
        if components.len() == 1 {
            return self.find_by_short_name(GLOBAL, &components[0]);
        }
        None
    }

    fn find_by_short_name(&self, root: NamespaceId, name: &str) -> Option<NamespaceId> {
        for &child in &self.arena[root].children {
            if self.arena[child].name == name {
                return Some(child);
            }
            if let Some(found) = self.find_by_short_name(child, name) {
                return Some(found);
            }
        }
        None
    }

    /// Enter a namespace, creating it if needed.
    pub fn enter(&mut self, path: &str) -> Result<NamespaceId, Diagnostic> {
        let id = match self.find(path) {
            Some(id) => id,
            None => self.create(path)?,
        };
        self.cursor.push(id);
        Ok(id)
    }

    pub fn exit(&mut self) {
        self.cursor.pop();
    }

    /// Dotted path from the root, empty for the global namespace.
    pub fn full_name(&self, id: NamespaceId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            if c == GLOBAL {
                break;
            }
            parts.push(self.arena[c].name.clone());
            current = self.arena[c].parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// Register a declaration. Registration is idempotent for the same
    /// identity; a different declaration under an existing (kind, name)
    /// is a name conflict.
    pub fn register(
        &mut self,
        ns: NamespaceId,
        kind: SymbolKind,
        name: &str,
        node: Node,
        identity: (String, usize),
    ) -> Result<(), Diagnostic> {
        if let Some(existing) = self.arena[ns].map(kind).get(name) {
            if existing.identity == identity {
                return Ok(());
            }
            let full_name = self.full_name(ns);
            return Err(Diagnostic::error(
                DiagnosticCode::NameConflict,
                format!(
                    "{} `{}` is already defined in namespace `{}`",
                    kind.as_str(),
                    name,
                    display_name(&full_name),
                ),
                Some(node.span),
            ));
        }
        self.arena[ns]
            .map_mut(kind)
            .insert(name.to_string(), Symbol { node, identity });
        Ok(())
    }

    /// Record an import in declaration order.
    pub fn add_import(&mut self, ns: NamespaceId, import: Node) {
        self.arena[ns].imports.push(import);
    }

    /// Resolve a bare reference: the starting namespace, then its
    /// ancestors up to and including the global namespace.
    pub fn lookup(&self, from: NamespaceId, kind: SymbolKind, name: &str) -> Option<&Symbol> {
        let mut current = Some(from);
        while let Some(ns) = current {
            if let Some(symbol) = self.arena[ns].map(kind).get(name) {
                return Some(symbol);
            }
            current = self.arena[ns].parent;
        }
        self.arena[GLOBAL].map(kind).get(name)
    }

    /// Resolve `from X.Y.Z name`: lookup anchored at an absolute path.
    pub fn lookup_qualified(
        &self,
        path: &str,
        kind: SymbolKind,
        name: &str,
    ) -> Option<&Symbol> {
        let ns = self.find(path)?;
        self.arena[ns].map(kind).get(name)
    }

    /// Merge every namespace sharing a short name into the first one
    /// encountered in preorder. Key conflicts keep the first-registered
    /// entry; new entries are appended in source order.
    pub fn auto_merge(&mut self, short_name: &str) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if is_reserved(short_name) {
            diagnostics.push(Diagnostic::warning(
                DiagnosticCode::ReservedName,
                format!("not merging reserved namespace name `{}`", short_name),
                None,
            ));
            return diagnostics;
        }

        let mut matches = Vec::new();
        self.collect_by_name(GLOBAL, short_name, &mut matches);
        if matches.len() < 2 {
            return diagnostics;
        }

        let target = matches[0];
        for &source in &matches[1..] {
            for kind in [
                SymbolKind::Template,
                SymbolKind::Custom,
                SymbolKind::Origin,
                SymbolKind::Config,
            ] {
                let entries: Vec<(String, Symbol)> =
                    self.arena[source].map_mut(kind).drain(..).collect();
                for (name, symbol) in entries {
                    let target_map = self.arena[target].map_mut(kind);
                    if !target_map.contains_key(&name) {
                        target_map.insert(name, symbol);
                    }
                }
            }
            let imports = std::mem::take(&mut self.arena[source].imports);
            self.arena[target].imports.extend(imports);
        }
        diagnostics
    }

    fn collect_by_name(&self, root: NamespaceId, name: &str, out: &mut Vec<NamespaceId>) {
        for &child in &self.arena[root].children {
            if self.arena[child].name == name {
                out.push(child);
            }
            self.collect_by_name(child, name, out);
        }
    }

    /// The implicit per-file namespace: base filename with directory and
    /// extension stripped.
    pub fn default_namespace_for(file: &str) -> String {
        let base = file.rsplit(['/', '\\']).next().unwrap_or(file);
        base.rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(base)
            .to_string()
    }

    /// Walk a parsed document and register its declarations under the
    /// given namespace, recursing into namespace nodes.
    pub fn collect_document(
        &mut self,
        root: &Node,
        file: &str,
        base: NamespaceId,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.collect_children(root, file, base, &mut diagnostics);
        diagnostics
    }

    fn collect_children(
        &mut self,
        node: &Node,
        file: &str,
        ns: NamespaceId,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        use crate::ast::NodeKind;
        for child in &node.children {
            match child.kind {
                NodeKind::Template(_) => {
                    self.register_symbol(ns, SymbolKind::Template, child, file, diagnostics);
                }
                NodeKind::Custom(_) => {
                    self.register_symbol(ns, SymbolKind::Custom, child, file, diagnostics);
                }
                NodeKind::Origin(_) => {
                    if child.attribute("name").is_some() {
                        self.register_symbol(ns, SymbolKind::Origin, child, file, diagnostics);
                    }
                }
                NodeKind::Configuration => {
                    if !child.value.is_empty() {
                        self.register_symbol(ns, SymbolKind::Config, child, file, diagnostics);
                    }
                }
                NodeKind::Import => {
                    self.add_import(ns, child.clone());
                }
                NodeKind::Namespace => match self.create(&child.value) {
                    Ok(nested) => {
                        self.collect_children(child, file, nested, diagnostics);
                    }
                    Err(mut diagnostic) => {
                        diagnostic.span = Some(child.span);
                        diagnostics.push(diagnostic.in_file(file));
                    }
                },
                _ => {}
            }
        }
    }

    fn register_symbol(
        &mut self,
        ns: NamespaceId,
        kind: SymbolKind,
        node: &Node,
        file: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let name = match kind {
            SymbolKind::Origin => node.attribute("name").unwrap_or_default().to_string(),
            _ => node.value.clone(),
        };
        let identity = (file.to_string(), node.span.start.offset);
        if let Err(diagnostic) =
            self.register(ns, kind, &name, node.clone_deep(), identity)
        {
            diagnostics.push(diagnostic.in_file(file));
        }
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        NamespaceRegistry::new()
    }
}

fn display_name(full: &str) -> &str {
    if full.is_empty() {
        "<global>"
    } else {
        full
    }
}

/// Identity helper used by callers registering AST declarations.
pub fn identity_of(file: &str, span: Span) -> (String, usize) {
    (file.to_string(), span.start.offset)
}
