//! Selector automation
//!
//! Elements pick up `class` and `id` attributes inferred from their own
//! style and script blocks: the first class selector in a local style
//! block becomes the element's class when none is set, symmetrically for
//! ids. Script selector references (`{{.foo}}`, `{{#bar}}`) trigger the
//! same injection only when the style block did not already provide one.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Node, NodeKind};

static SCRIPT_SELECTOR_REGEXP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([.#][A-Za-z_][\w-]*)\s*\}\}").unwrap());

static SELECTOR_NAME_REGEXP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[.#]([A-Za-z_][\w-]*)").unwrap());

/// Per-direction automation switches.
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    pub style_auto_class: bool,
    pub style_auto_id: bool,
    pub script_auto_class: bool,
    pub script_auto_id: bool,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        AutomationConfig {
            style_auto_class: true,
            style_auto_id: true,
            script_auto_class: true,
            script_auto_id: true,
        }
    }
}

/// Context in which an `&` reference is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceContext {
    Style,
    Script,
}

/// The automation pass. This is the only pass that mutates the AST
/// after parsing; it injects attributes and nothing else.
pub struct SelectorAutomation {
    config: AutomationConfig,
}

impl SelectorAutomation {
    pub fn new(config: AutomationConfig) -> Self {
        SelectorAutomation { config }
    }

    /// Walk the tree and inject inferred `class` / `id` attributes.
    pub fn process(&self, root: &mut Node) {
        self.process_node(root);
    }

    fn process_node(&self, node: &mut Node) {
        if node.kind == NodeKind::Element {
            self.automate_element(node);
        }
        for child in &mut node.children {
            self.process_node(child);
        }
    }

    fn automate_element(&self, element: &mut Node) {
        let style_selectors = collect_style_selectors(element);
        let script_refs = collect_script_references(element);

        let style_class = first_with_prefix(&style_selectors, '.');
        let style_id = first_with_prefix(&style_selectors, '#');

        let mut class_injected_by_style = false;
        if self.config.style_auto_class && !element.has_attribute("class") {
            if let Some(name) = &style_class {
                element.set_attribute("class", clean_selector_name(name));
                class_injected_by_style = true;
            }
        }
        let mut id_injected_by_style = false;
        if self.config.style_auto_id && !element.has_attribute("id") {
            if let Some(name) = &style_id {
                element.set_attribute("id", clean_selector_name(name));
                id_injected_by_style = true;
            }
        }

        // Script-driven injection fires only when the style block did
        // not already decide the attribute.
        if self.config.script_auto_class
            && !class_injected_by_style
            && !element.has_attribute("class")
        {
            if let Some(name) = first_with_prefix(&script_refs, '.') {
                element.set_attribute("class", clean_selector_name(&name));
            }
        }
        if self.config.script_auto_id && !id_injected_by_style && !element.has_attribute("id") {
            if let Some(name) = first_with_prefix(&script_refs, '#') {
                element.set_attribute("id", clean_selector_name(&name));
            }
        }
    }
}

impl Default for SelectorAutomation {
    fn default() -> Self {
        SelectorAutomation::new(AutomationConfig::default())
    }
}

/// Selectors of the element's local style blocks, in source order.
pub fn collect_style_selectors(element: &Node) -> Vec<String> {
    let mut selectors = Vec::new();
    for child in &element.children {
        if child.kind != NodeKind::Style {
            continue;
        }
        for rule in &child.children {
            if rule.kind == NodeKind::StyleRule {
                selectors.push(rule.value.clone());
            }
        }
    }
    selectors
}

/// `{{.foo}}` / `{{#bar}}` references of the element's local script
/// blocks, in source order.
pub fn collect_script_references(element: &Node) -> Vec<String> {
    let mut references = Vec::new();
    for child in &element.children {
        if !matches!(child.kind, NodeKind::Script(_)) {
            continue;
        }
        for capture in SCRIPT_SELECTOR_REGEXP.captures_iter(&child.value) {
            references.push(capture[1].to_string());
        }
    }
    references
}

fn first_with_prefix(selectors: &[String], prefix: char) -> Option<String> {
    selectors
        .iter()
        .find(|s| s.starts_with(prefix))
        .cloned()
}

/// `.card:hover` → `card`, `#box .inner` → `box`.
pub fn clean_selector_name(selector: &str) -> String {
    SELECTOR_NAME_REGEXP
        .captures(selector)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| selector.trim_start_matches(['.', '#']).to_string())
}

/// Resolve an `&` reference against its owning element. Style contexts
/// prefer the class; script contexts prefer the id. Falls back to the
/// bare tag name when the element carries neither.
pub fn resolve_reference(element: &Node, context: ReferenceContext) -> String {
    let class = element.attribute("class").map(|c| format!(".{}", first_word(c)));
    let id = element.attribute("id").map(|i| format!("#{}", i));
    let picked = match context {
        ReferenceContext::Style => class.or(id),
        ReferenceContext::Script => id.or(class),
    };
    picked.unwrap_or_else(|| element.value.clone())
}

fn first_word(value: &str) -> &str {
    value.split_whitespace().next().unwrap_or(value)
}
