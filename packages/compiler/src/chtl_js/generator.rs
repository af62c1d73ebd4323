//! CHTL-JS generator
//!
//! Emits the runtime prelude followed by the user's code with extension
//! constructs translated in place. Repeated identical selectors are
//! hoisted into locals ahead of the translated code instead of being
//! re-queried at every use.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::ast::{
    AnimateNode, DelegateNode, EventBindingNode, JsNode, ListenNode, ModuleNode, SelectorNode,
    SelectorQuery, VirNode,
};
use crate::util::escape_js_string;

static INLINE_SELECTOR_REGEXP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^}]*)\}\}").unwrap());

/// Shape of the emitted module loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleFormat {
    /// Dynamic `<script>` injection through the runtime loader shim.
    #[default]
    ScriptInjection,
    CommonJs,
    EsModule,
}

/// Generator configuration.
#[derive(Debug, Clone)]
pub struct JsGeneratorConfig {
    pub wrap_iife: bool,
    pub use_strict: bool,
    pub module_format: ModuleFormat,
}

impl Default for JsGeneratorConfig {
    fn default() -> Self {
        JsGeneratorConfig {
            wrap_iife: true,
            use_strict: true,
            module_format: ModuleFormat::ScriptInjection,
        }
    }
}

const SELECTOR_PRELUDE: &str = r#"// CHTL JS selector helpers
var CHTLSelector = {
  byClass: function(className) {
    return document.getElementsByClassName(className.substring(1));
  },
  byId: function(id) {
    return document.getElementById(id.substring(1));
  },
  byTag: function(tag) {
    return document.getElementsByTagName(tag);
  },
  query: function(selector) {
    return document.querySelectorAll(selector);
  },
  current: function() {
    return this._currentElement || document.body;
  }
};
"#;

const DELEGATION_PRELUDE: &str = r#"// CHTL JS event delegation
var CHTLEventDelegation = (function() {
  var delegations = new Map();
  function delegate(parent, target, event, handler) {
    var key = parent + '_' + event;
    if (!delegations.has(key)) {
      var parentEl = typeof parent === 'string' ? document.querySelector(parent) : parent;
      parentEl.addEventListener(event, function(e) {
        var targetEl = e.target.closest(target);
        if (targetEl) {
          delegations.get(key).forEach(function(h) {
            if (h.target === target) h.handler.call(targetEl, e);
          });
        }
      });
      delegations.set(key, []);
    }
    delegations.get(key).push({target: target, handler: handler});
  }
  return { delegate: delegate };
})();
"#;

const ANIMATION_PRELUDE: &str = r#"// CHTL JS animation
var CHTLAnimation = (function() {
  function interpolate(from, to, t) {
    var fromNum = parseFloat(from);
    var toNum = parseFloat(to);
    if (isNaN(fromNum) || isNaN(toNum)) return t < 1 ? from : to;
    var unit = String(to).replace(/^-?[\d.]+/, '');
    return fromNum + (toNum - fromNum) * t + unit;
  }
  function applyProps(el, props) {
    for (var key in props) el.style[key] = props[key];
  }
  function animate(options) {
    var el = options.target;
    if (el && el.length !== undefined) el = el[0];
    if (!el) return;
    var duration = options.duration || 1000;
    var delay = options.delay || 0;
    var frames = options.keyframes || [];
    var loops = options.loop || 1;
    var reverse = options.direction === 'reverse';
    if (options.begin) applyProps(el, options.begin);
    var played = 0;
    function run() {
      var start = null;
      function step(timestamp) {
        if (start === null) start = timestamp;
        var t = Math.min((timestamp - start) / duration, 1);
        if (reverse) t = 1 - t;
        for (var i = 0; i + 1 < frames.length; i++) {
          var a = frames[i], b = frames[i + 1];
          if (t >= a.at && t <= b.at) {
            var local = (t - a.at) / (b.at - a.at || 1);
            for (var key in b.props) {
              var from = a.props[key] !== undefined ? a.props[key] : el.style[key];
              el.style[key] = interpolate(from, b.props[key], local);
            }
            break;
          }
        }
        if ((reverse ? t > 0 : t < 1)) {
          requestAnimationFrame(step);
        } else {
          played++;
          if (loops === -1 || played < loops) {
            run();
          } else {
            if (options.end) applyProps(el, options.end);
            if (options.callback) options.callback();
          }
        }
      }
      requestAnimationFrame(step);
    }
    setTimeout(run, delay);
  }
  return { animate: animate };
})();
"#;

const VIRTUAL_OBJECTS_PRELUDE: &str = r#"// CHTL JS virtual objects
var CHTLVirtualObjects = {};
"#;

const MODULE_LOADER_SHIM: &str = r#"// CHTL JS module loader
var CHTLModuleLoader = (function() {
  var loaded = {};
  function loadModule(path, callback) {
    if (loaded[path]) {
      callback();
      return;
    }
    var script = document.createElement('script');
    script.src = path;
    script.onload = function() {
      loaded[path] = true;
      callback();
    };
    document.head.appendChild(script);
  }
  return { load: loadModule };
})();
"#;

/// The CHTL-JS generator.
pub struct JsGenerator {
    config: JsGeneratorConfig,
}

impl JsGenerator {
    pub fn new(config: JsGeneratorConfig) -> Self {
        JsGenerator { config }
    }

    /// Full output: prelude, loader shim when needed, hoisted selector
    /// locals and the translated program.
    pub fn generate(&self, program: &JsNode) -> String {
        let hoisted = self.hoist_selectors(program);
        let body = self.translate_parts(program.parts(), &hoisted);

        let mut out = String::new();
        if self.config.wrap_iife {
            out.push_str("(function() {\n");
            if self.config.use_strict {
                out.push_str("'use strict';\n");
            }
        }
        out.push_str(SELECTOR_PRELUDE);
        out.push_str(DELEGATION_PRELUDE);
        out.push_str(ANIMATION_PRELUDE);
        out.push_str(VIRTUAL_OBJECTS_PRELUDE);
        if self.config.module_format == ModuleFormat::ScriptInjection
            && contains_module_block(program)
        {
            out.push_str(MODULE_LOADER_SHIM);
        }
        for (expr, name) in ordered_hoists(&hoisted) {
            out.push_str(&format!("var {} = {};\n", name, expr));
        }
        out.push('\n');
        out.push_str(body.trim_matches('\n'));
        out.push('\n');
        if self.config.wrap_iife {
            out.push_str("})();\n");
        }
        out
    }

    /// Translate the program body only, without prelude or wrapping.
    pub fn generate_body(&self, program: &JsNode) -> String {
        let hoisted = HashMap::new();
        self.translate_parts(program.parts(), &hoisted)
    }

    /// Selectors used more than once become hoisted locals, keyed by
    /// their translated expression, named in first-use order.
    fn hoist_selectors(&self, program: &JsNode) -> HashMap<String, String> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        count_selectors(program, &mut counts);
        let mut hoisted = HashMap::new();
        let mut index = 0usize;
        for (expr, count) in counts {
            if count > 1 {
                hoisted.insert(expr, format!("_chtl_sel_{}", index));
                index += 1;
            }
        }
        hoisted
    }

    fn translate_parts(&self, parts: &[JsNode], hoisted: &HashMap<String, String>) -> String {
        let mut out = String::new();
        for part in parts {
            match part {
                JsNode::Program(inner) => out.push_str(&self.translate_parts(inner, hoisted)),
                JsNode::Raw(text) => out.push_str(text),
                JsNode::EnhancedSelector(selector) => {
                    out.push_str(&self.selector_expr(selector, hoisted));
                }
                JsNode::ArrowAccess => out.push('.'),
                JsNode::Listen(listen) => out.push_str(&self.translate_listen(listen, hoisted)),
                JsNode::Delegate(delegate) => {
                    out.push_str(&self.translate_delegate(delegate, hoisted));
                }
                JsNode::Animate(animate) => {
                    out.push_str(&self.translate_animate(animate));
                    out.push_str(";\n");
                }
                JsNode::EventBinding(binding) => {
                    out.push_str(&self.translate_event_binding(binding, hoisted));
                }
                JsNode::Vir(vir) => out.push_str(&self.translate_vir(vir, hoisted)),
                JsNode::Module(module) => out.push_str(&self.translate_module(module)),
            }
        }
        out
    }

    fn selector_expr(&self, selector: &SelectorNode, hoisted: &HashMap<String, String>) -> String {
        let base = selector_call(selector);
        let expr = hoisted.get(&base).cloned().unwrap_or(base);
        match selector.index {
            Some(index) => format!("{}[{}]", expr, index),
            None => expr,
        }
    }

    fn target_expr(&self, target: &JsNode, hoisted: &HashMap<String, String>) -> String {
        match target {
            JsNode::EnhancedSelector(selector) => self.selector_expr(selector, hoisted),
            JsNode::Raw(text) => text.trim().to_string(),
            other => self.translate_parts(std::slice::from_ref(other), hoisted),
        }
    }

    fn translate_listen(&self, listen: &ListenNode, hoisted: &HashMap<String, String>) -> String {
        match &listen.target {
            Some(target) => {
                let target_expr = self.target_expr(target, hoisted);
                let mut out = String::new();
                for handler in &listen.handlers {
                    out.push_str(&format!(
                        "{}.addEventListener('{}', {});\n",
                        target_expr,
                        escape_js_string(&handler.event),
                        handler.handler
                    ));
                }
                out
            }
            // Without a target the block is a first-class handler map.
            None => handler_object(&listen.handlers),
        }
    }

    fn translate_delegate(
        &self,
        delegate: &DelegateNode,
        hoisted: &HashMap<String, String>,
    ) -> String {
        let parent = delegate
            .parent
            .as_ref()
            .map(|p| self.target_expr(p, hoisted))
            .unwrap_or_else(|| "document".to_string());
        let target = translate_inline_selectors(&delegate.target);
        let target = if target.starts_with("CHTLSelector") || target.starts_with('\'') {
            target
        } else {
            format!("'{}'", escape_js_string(crate::util::unquote(&target)))
        };
        let mut out = String::new();
        for handler in &delegate.handlers {
            out.push_str(&format!(
                "CHTLEventDelegation.delegate({}, {}, '{}', {});\n",
                parent,
                target,
                escape_js_string(&handler.event),
                handler.handler
            ));
        }
        out
    }

    fn translate_event_binding(
        &self,
        binding: &EventBindingNode,
        hoisted: &HashMap<String, String>,
    ) -> String {
        format!(
            "{}.addEventListener('{}', function(event) {{ {} }});\n",
            self.target_expr(&binding.target, hoisted),
            escape_js_string(&binding.event),
            binding.body
        )
    }

    fn translate_animate(&self, animate: &AnimateNode) -> String {
        let mut fields: Vec<String> = Vec::new();
        for (key, value) in &animate.options {
            fields.push(format!("{}: {}", key, translate_inline_selectors(value)));
        }
        if !animate.begin.is_empty() {
            fields.push(format!("begin: {}", props_object(&animate.begin)));
        }
        if !animate.end.is_empty() {
            fields.push(format!("end: {}", props_object(&animate.end)));
        }
        if !animate.keyframes.is_empty() {
            let frames: Vec<String> = animate
                .keyframes
                .iter()
                .map(|frame| {
                    format!(
                        "{{at: {}, props: {}}}",
                        frame.at.clone().unwrap_or_else(|| "0".to_string()),
                        props_object(&frame.props)
                    )
                })
                .collect();
            fields.push(format!("keyframes: [{}]", frames.join(", ")));
        }
        format!("CHTLAnimation.animate({{{}}})", fields.join(", "))
    }

    fn translate_vir(&self, vir: &VirNode, hoisted: &HashMap<String, String>) -> String {
        let value = match vir.block.as_ref() {
            JsNode::Listen(listen) => handler_object(&listen.handlers),
            JsNode::Delegate(delegate) => {
                let mut fields = vec![format!(
                    "target: '{}'",
                    escape_js_string(crate::util::unquote(&delegate.target))
                )];
                for handler in &delegate.handlers {
                    fields.push(format!("{}: {}", handler.event, handler.handler));
                }
                format!("{{{}}}", fields.join(", "))
            }
            JsNode::Animate(animate) => self.translate_animate(animate),
            other => self.translate_parts(std::slice::from_ref(other), hoisted),
        };
        format!("CHTLVirtualObjects.{} = {};\n", vir.name, value)
    }

    fn translate_module(&self, module: &ModuleNode) -> String {
        let mut out = String::new();
        match self.config.module_format {
            ModuleFormat::ScriptInjection => {
                for path in &module.loads {
                    out.push_str(&format!(
                        "CHTLModuleLoader.load('{}', function() {{}});\n",
                        escape_js_string(path)
                    ));
                }
            }
            ModuleFormat::CommonJs => {
                for path in &module.loads {
                    out.push_str(&format!(
                        "var {} = require('{}');\n",
                        sanitize_binding(path),
                        escape_js_string(path)
                    ));
                }
            }
            ModuleFormat::EsModule => {
                for path in &module.loads {
                    out.push_str(&format!("import '{}';\n", escape_js_string(path)));
                }
            }
        }
        out
    }
}

impl Default for JsGenerator {
    fn default() -> Self {
        JsGenerator::new(JsGeneratorConfig::default())
    }
}

/// `CHTLSelector.<fn>('<selector>')` for a selector node.
fn selector_call(selector: &SelectorNode) -> String {
    let escaped = escape_js_string(selector.selector.trim());
    match selector.query {
        SelectorQuery::Class => format!("CHTLSelector.byClass('{}')", escaped),
        SelectorQuery::Id => format!("CHTLSelector.byId('{}')", escaped),
        SelectorQuery::Tag => format!("CHTLSelector.byTag('{}')", escaped),
        SelectorQuery::Compound => format!("CHTLSelector.query('{}')", escaped),
        SelectorQuery::Reference => "CHTLSelector.current()".to_string(),
    }
}

/// Replace `{{…}}` occurrences inside a raw value with selector calls.
fn translate_inline_selectors(value: &str) -> String {
    INLINE_SELECTOR_REGEXP
        .replace_all(value, |caps: &regex::Captures| {
            let content = caps[1].trim().to_string();
            let node = SelectorNode {
                query: SelectorNode::classify(&content),
                selector: content,
                index: None,
                span: crate::parse_util::Span::default(),
            };
            selector_call(&node)
        })
        .to_string()
}

fn handler_object(handlers: &[super::ast::EventHandler]) -> String {
    let fields: Vec<String> = handlers
        .iter()
        .map(|h| format!("{}: {}", h.event, h.handler))
        .collect();
    format!("{{{}}}", fields.join(", "))
}

fn props_object(props: &[(String, String)]) -> String {
    let fields: Vec<String> = props
        .iter()
        .map(|(k, v)| format!("{}: {}", camel_case(k), quote_css_value(v)))
        .collect();
    format!("{{{}}}", fields.join(", "))
}

/// CSS property values become string literals unless they already are
/// numbers or quoted.
fn quote_css_value(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.parse::<f64>().is_ok()
        || trimmed.starts_with('\'')
        || trimmed.starts_with('"')
    {
        trimmed.to_string()
    } else {
        format!("'{}'", escape_js_string(trimmed))
    }
}

fn camel_case(property: &str) -> String {
    let mut out = String::with_capacity(property.len());
    let mut upper_next = false;
    for ch in property.chars() {
        if ch == '-' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn sanitize_binding(path: &str) -> String {
    let stem = crate::module_loader::module_name(path);
    let mut out: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn count_selectors(node: &JsNode, counts: &mut Vec<(String, usize)>) {
    match node {
        JsNode::Program(parts) => {
            for part in parts {
                count_selectors(part, counts);
            }
        }
        JsNode::EnhancedSelector(selector) => {
            let expr = selector_call(selector);
            if let Some(entry) = counts.iter_mut().find(|(e, _)| *e == expr) {
                entry.1 += 1;
            } else {
                counts.push((expr, 1));
            }
        }
        JsNode::Listen(listen) => {
            if let Some(target) = &listen.target {
                count_selectors(target, counts);
            }
        }
        JsNode::Delegate(delegate) => {
            if let Some(parent) = &delegate.parent {
                count_selectors(parent, counts);
            }
        }
        JsNode::EventBinding(binding) => count_selectors(&binding.target, counts),
        JsNode::Vir(vir) => count_selectors(&vir.block, counts),
        _ => {}
    }
}

fn contains_module_block(node: &JsNode) -> bool {
    match node {
        JsNode::Program(parts) => parts.iter().any(contains_module_block),
        JsNode::Module(_) => true,
        _ => false,
    }
}

fn ordered_hoists(hoisted: &HashMap<String, String>) -> Vec<(&String, &String)> {
    let mut pairs: Vec<(&String, &String)> = hoisted.iter().collect();
    pairs.sort_by_key(|(_, name)| {
        name.trim_start_matches("_chtl_sel_")
            .parse::<usize>()
            .unwrap_or(usize::MAX)
    });
    pairs
}
