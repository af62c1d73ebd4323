//! Constraint checker
//!
//! Constraint rules restrict what may appear inside a scope. Rules and
//! matchers are separate: a rule carries type, priority and scope, while
//! its target matcher handles literal names, kind-qualified forms like
//! `[Custom] @Element Box`, and wildcard prefixes like `foo*`. `except`
//! clauses in the source attach one rule per entry to their enclosing
//! scope.

use crate::ast::{DeclKind, Node, NodeKind};
use crate::parse_util::{Diagnostic, DiagnosticCode};

/// What a constraint rule restricts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintType {
    Element,
    Template,
    Custom,
    Origin,
    Global,
    Property,
}

/// Scope a node is evaluated in, derived from its enclosing block kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintContext {
    Global,
    Namespace,
    Element,
    Style,
    Script,
    Template,
    Custom,
}

/// Target matcher of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
    /// Bare name: matches elements and references of that name.
    Literal(String),
    /// `[Template] @Kind Name` / `[Custom] @Kind Name` qualified form.
    Qualified {
        custom: bool,
        kind: DeclKind,
        name: String,
    },
    /// `foo*` prefix form.
    WildcardPrefix(String),
}

impl RuleTarget {
    /// Parse a single target entry from an `except` list.
    pub fn parse(entry: &str) -> Option<(ConstraintType, RuleTarget)> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        if let Some(rest) = entry.strip_prefix("[Template]") {
            let (kind, name) = parse_qualified_rest(rest)?;
            return Some((
                ConstraintType::Template,
                RuleTarget::Qualified { custom: false, kind, name },
            ));
        }
        if let Some(rest) = entry.strip_prefix("[Custom]") {
            let (kind, name) = parse_qualified_rest(rest)?;
            return Some((
                ConstraintType::Custom,
                RuleTarget::Qualified { custom: true, kind, name },
            ));
        }
        if let Some(rest) = entry.strip_prefix("[Origin]") {
            let name = rest.trim().trim_start_matches('@').to_string();
            return Some((ConstraintType::Origin, RuleTarget::Literal(name)));
        }
        if let Some(prefix) = entry.strip_suffix('*') {
            return Some((
                ConstraintType::Element,
                RuleTarget::WildcardPrefix(prefix.trim().to_string()),
            ));
        }
        if let Some(rest) = entry.strip_prefix('@') {
            // `@Style Name` is an unqualified template-kind restriction.
            let mut words = rest.split_whitespace();
            let kind = DeclKind::parse(words.next()?)?;
            let name = words.next().unwrap_or("").to_string();
            return Some((
                ConstraintType::Template,
                RuleTarget::Qualified { custom: false, kind, name },
            ));
        }
        Some((ConstraintType::Element, RuleTarget::Literal(entry.to_string())))
    }

    /// Does this target match the given node?
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            RuleTarget::Literal(name) => match node.kind {
                NodeKind::Element => node.value == *name,
                NodeKind::TemplateRef(_) | NodeKind::CustomRef(_) => node.value == *name,
                NodeKind::Origin(_) => node.attribute("name") == Some(name.as_str()),
                NodeKind::OriginRef(_) => node.value == *name,
                _ => false,
            },
            RuleTarget::Qualified { custom, kind, name } => {
                let (node_custom, node_kind) = match node.kind {
                    NodeKind::Template(k) | NodeKind::TemplateRef(k) => (false, k),
                    NodeKind::Custom(k) | NodeKind::CustomRef(k) => (true, k),
                    _ => return false,
                };
                // A use site does not distinguish template from custom
                // until resolution, so a qualified rule matches by kind
                // and name there.
                let flavour_ok = node_custom == *custom
                    || matches!(node.kind, NodeKind::TemplateRef(_) | NodeKind::CustomRef(_));
                flavour_ok && node_kind == *kind && (name.is_empty() || node.value == *name)
            }
            RuleTarget::WildcardPrefix(prefix) => match node.kind {
                NodeKind::Element
                | NodeKind::TemplateRef(_)
                | NodeKind::CustomRef(_)
                | NodeKind::OriginRef(_) => node.value.starts_with(prefix.as_str()),
                _ => false,
            },
        }
    }
}

fn parse_qualified_rest(rest: &str) -> Option<(DeclKind, String)> {
    let rest = rest.trim();
    let rest = rest.strip_prefix('@')?;
    let mut words = rest.split_whitespace();
    let kind = DeclKind::parse(words.next()?)?;
    let name = words.next().unwrap_or("").to_string();
    Some((kind, name))
}

/// One constraint rule.
#[derive(Debug, Clone)]
pub struct ConstraintRule {
    pub rule_type: ConstraintType,
    pub target: RuleTarget,
    pub context: String,
    pub is_global: bool,
    pub priority: i32,
    pub message: String,
    pub exceptions: Vec<RuleTarget>,
}

impl ConstraintRule {
    pub fn new(rule_type: ConstraintType, target: RuleTarget) -> Self {
        let message = format!("use of `{}` is not allowed here", describe_target(&target));
        ConstraintRule {
            rule_type,
            target,
            context: String::new(),
            is_global: false,
            priority: 0,
            message,
            exceptions: Vec::new(),
        }
    }

    pub fn global(mut self) -> Self {
        self.is_global = true;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn applies(&self, node: &Node) -> bool {
        if !self.target.matches(node) {
            return false;
        }
        !self.exceptions.iter().any(|e| e.matches(node))
    }
}

fn describe_target(target: &RuleTarget) -> String {
    match target {
        RuleTarget::Literal(name) => name.clone(),
        RuleTarget::Qualified { custom, kind, name } => format!(
            "{} {} {}",
            if *custom { "[Custom]" } else { "[Template]" },
            kind.as_str(),
            name
        ),
        RuleTarget::WildcardPrefix(prefix) => format!("{}*", prefix),
    }
}

/// Rule admissibility per evaluation context.
pub fn admissible(rule_type: ConstraintType, context: ConstraintContext) -> bool {
    match context {
        ConstraintContext::Global | ConstraintContext::Namespace => true,
        ConstraintContext::Style => matches!(
            rule_type,
            ConstraintType::Property | ConstraintType::Template | ConstraintType::Custom
        ),
        ConstraintContext::Script => {
            matches!(rule_type, ConstraintType::Template | ConstraintType::Origin)
        }
        ConstraintContext::Element | ConstraintContext::Template | ConstraintContext::Custom => {
            matches!(
                rule_type,
                ConstraintType::Element | ConstraintType::Template | ConstraintType::Custom
            )
        }
    }
}

/// Checker configuration.
#[derive(Debug, Clone)]
pub struct ConstraintConfig {
    /// Abort on the first violation instead of accumulating.
    pub strict_mode: bool,
    pub max_violations: usize,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        ConstraintConfig { strict_mode: false, max_violations: 100 }
    }
}

/// The constraint system: registered global rules plus per-scope rules
/// discovered from `except` clauses during traversal.
pub struct ConstraintSystem {
    rules: Vec<ConstraintRule>,
    config: ConstraintConfig,
}

impl ConstraintSystem {
    pub fn new(config: ConstraintConfig) -> Self {
        ConstraintSystem { rules: Vec::new(), config }
    }

    pub fn add_rule(&mut self, rule: ConstraintRule) {
        self.rules.push(rule);
        self.rules.sort_by_key(|r| std::cmp::Reverse(r.priority));
    }

    /// Parse an `except` list into one rule per comma-separated entry.
    pub fn parse_except_list(raw: &str, context: &str) -> Vec<ConstraintRule> {
        raw.split(',')
            .filter_map(|entry| RuleTarget::parse(entry))
            .map(|(rule_type, target)| {
                let mut rule = ConstraintRule::new(rule_type, target);
                rule.context = context.to_string();
                rule
            })
            .collect()
    }

    /// Validate a tree. Returns accumulated violations; in strict mode
    /// at most one.
    pub fn validate(&self, root: &Node) -> Vec<Diagnostic> {
        let mut violations = Vec::new();
        let mut scope_rules: Vec<Vec<ConstraintRule>> = Vec::new();
        self.check_node(root, ConstraintContext::Global, &mut scope_rules, &mut violations);
        violations
    }

    fn check_node(
        &self,
        node: &Node,
        context: ConstraintContext,
        scope_rules: &mut Vec<Vec<ConstraintRule>>,
        violations: &mut Vec<Diagnostic>,
    ) {
        if self.halted(violations) {
            return;
        }

        // `except` clauses among the children open a local rule scope
        // for this subtree.
        let local: Vec<ConstraintRule> = node
            .children
            .iter()
            .filter(|c| c.kind == NodeKind::Except)
            .flat_map(|c| Self::parse_except_list(&c.value, &node.value))
            .collect();
        scope_rules.push(local);

        for child in &node.children {
            let child_context = derive_context(node, context);
            self.check_against_rules(child, child_context, scope_rules, violations);
            if self.halted(violations) {
                break;
            }
            self.check_node(child, child_context, scope_rules, violations);
        }

        scope_rules.pop();
    }

    fn check_against_rules(
        &self,
        node: &Node,
        context: ConstraintContext,
        scope_rules: &[Vec<ConstraintRule>],
        violations: &mut Vec<Diagnostic>,
    ) {
        let local = scope_rules.iter().flatten();
        for rule in self.rules.iter().chain(local) {
            if !rule.is_global && !admissible(rule.rule_type, context) {
                continue;
            }
            if rule.applies(node) {
                violations.push(Diagnostic::error(
                    DiagnosticCode::ConstraintViolation,
                    rule.message.clone(),
                    Some(node.span),
                ));
                if self.halted(violations) {
                    return;
                }
            }
        }
    }

    fn halted(&self, violations: &[Diagnostic]) -> bool {
        (self.config.strict_mode && !violations.is_empty())
            || violations.len() >= self.config.max_violations
    }
}

/// Context a node's children are evaluated in.
fn derive_context(parent: &Node, inherited: ConstraintContext) -> ConstraintContext {
    match parent.kind {
        NodeKind::Document => ConstraintContext::Global,
        NodeKind::Namespace => ConstraintContext::Namespace,
        NodeKind::Element => ConstraintContext::Element,
        NodeKind::Style | NodeKind::StyleRule => ConstraintContext::Style,
        NodeKind::Script(_) => ConstraintContext::Script,
        NodeKind::Template(_) => ConstraintContext::Template,
        NodeKind::Custom(_) | NodeKind::CustomRef(_) => ConstraintContext::Custom,
        _ => inherited,
    }
}
