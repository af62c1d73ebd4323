//! Compiler dispatcher
//!
//! Entry point for a compilation unit: scans the source into fragments,
//! dispatches each typed batch to its compiler (in parallel when
//! enabled), runs the semantic passes on the merged CHTL AST and joins
//! the per-channel outputs. A fragment failure is confined to its own
//! output channel; the unit fails only when the merged diagnostics
//! contain an error.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;

use crate::ast::{Node, NodeKind, ScriptKind};
use crate::chtl::{Parser as ChtlParser, ParserConfig};
use crate::chtl_js::ast::JsNode;
use crate::chtl_js::{JsGenerator, JsGeneratorConfig, ModuleFormat, Parser as JsParser};
use crate::constraint::{ConstraintConfig, ConstraintSystem};
use crate::generator::{GeneratorConfig, HtmlGenerator};
use crate::module_loader::{LoaderConfig, ModuleLoader};
use crate::namespace::{NamespaceRegistry, GLOBAL};
use crate::parse_util::{
    has_errors, sort_diagnostics, Diagnostic, DiagnosticCode, Severity,
};
use crate::scanner::{Fragment, FragmentKind, ScannerConfig, UnifiedScanner};
use crate::selector_automation::{AutomationConfig, SelectorAutomation};
use crate::util::compress_whitespace;

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Compile fragment batches on worker threads.
    pub parallel: bool,
    /// Stop semantic checking at the first violation.
    pub strict: bool,
    /// Compress whitespace in every output channel.
    pub minify: bool,
    pub detect_chtl_js: bool,
    pub emit_generator_comments: bool,
    /// Give each file an implicit namespace named after it.
    pub default_namespace: bool,
    pub module_format: ModuleFormat,
    pub module_search_paths: Vec<PathBuf>,
    pub max_violations: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            parallel: false,
            strict: false,
            minify: false,
            detect_chtl_js: true,
            emit_generator_comments: true,
            default_namespace: false,
            module_format: ModuleFormat::default(),
            module_search_paths: Vec::new(),
            max_violations: 100,
        }
    }
}

/// Cooperative cancellation token, checked between fragment
/// compilations. There is no forced mid-compiler abort.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Result of one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct CompilationResult {
    pub success: bool,
    pub html: String,
    pub css: String,
    pub js: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilationResult {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }
}

struct ChtlChannel {
    document: Node,
    diagnostics: Vec<Diagnostic>,
}

/// The compiler dispatcher.
pub struct CompilerDispatcher {
    config: DispatcherConfig,
    token: CancellationToken,
}

impl CompilerDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        CompilerDispatcher {
            config,
            token: CancellationToken::new(),
        }
    }

    pub fn with_token(config: DispatcherConfig, token: CancellationToken) -> Self {
        CompilerDispatcher { config, token }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Compile a source file read from disk.
    pub fn compile_file(&self, path: &Path) -> std::io::Result<CompilationResult> {
        let source = std::fs::read_to_string(path)?;
        Ok(self.compile(&source, &path.to_string_lossy()))
    }

    /// Compile one source string. CRLF line endings are accepted and
    /// normalised to LF before scanning.
    pub fn compile(&self, source: &str, file: &str) -> CompilationResult {
        let normalized = crate::util::normalize_line_endings(source);
        let source = normalized.as_str();
        let mut diagnostics: Vec<Diagnostic> = Vec::new();

        // C1: slice the source.
        let scanner = UnifiedScanner::new(ScannerConfig {
            detect_chtl_js: self.config.detect_chtl_js,
            keep_comments: false,
        });
        let fragments = match scanner.scan(source) {
            Ok(fragments) => fragments,
            Err(error) => {
                diagnostics.push(
                    Diagnostic::fatal(
                        DiagnosticCode::UnterminatedBlock,
                        error.to_string(),
                        Some(crate::parse_util::Span::at(error.position())),
                    )
                    .in_file(file),
                );
                return self.finish(String::new(), String::new(), String::new(), diagnostics);
            }
        };
        debug!("{}: {} fragments", file, fragments.len());

        if self.cancelled(&mut diagnostics) {
            return self.finish(String::new(), String::new(), String::new(), diagnostics);
        }

        // C12 step 2: partition by type.
        let by_kind = |kind: FragmentKind| {
            fragments
                .iter()
                .filter(|f| f.kind == kind)
                .collect::<Vec<&Fragment>>()
        };
        let chtl_fragments = by_kind(FragmentKind::Chtl);
        let chtl_js_fragments = by_kind(FragmentKind::ChtlJs);
        let pure_js_fragments = by_kind(FragmentKind::PureJs);
        let css_fragments = by_kind(FragmentKind::Css);
        let html_fragments = by_kind(FragmentKind::Html);

        // C12 step 3: per-type compilers, optionally in parallel.
        // Workers never touch shared structures; all merging happens
        // here afterwards.
        let parse_chtl = || -> ChtlChannel {
            let mut document = Node::new(NodeKind::Document, Default::default());
            let mut channel_diagnostics = Vec::new();
            for fragment in &chtl_fragments {
                let parser = ChtlParser::new(&fragment.content, ParserConfig::default());
                let (parsed, mut parse_diagnostics) = parser.parse();
                document.children.extend(parsed.children);
                channel_diagnostics.append(&mut parse_diagnostics);
            }
            ChtlChannel { document, diagnostics: channel_diagnostics }
        };
        let parse_fragment_scripts = || -> Vec<(JsNode, Vec<Diagnostic>)> {
            chtl_js_fragments
                .iter()
                .map(|fragment| JsParser::new(&fragment.content).parse())
                .collect()
        };

        let (chtl_channel, fragment_programs) = if self.config.parallel {
            rayon::join(parse_chtl, parse_fragment_scripts)
        } else {
            (parse_chtl(), parse_fragment_scripts())
        };

        let ChtlChannel { mut document, diagnostics: chtl_diagnostics } = chtl_channel;
        diagnostics.extend(chtl_diagnostics);

        if self.cancelled(&mut diagnostics) {
            return self.finish(String::new(), String::new(), String::new(), diagnostics);
        }

        // C5: symbol collection on the dispatcher thread.
        let mut registry = NamespaceRegistry::new();
        let base_ns = if self.config.default_namespace {
            let name = NamespaceRegistry::default_namespace_for(file);
            registry.create(&name).ok().unwrap_or(GLOBAL)
        } else {
            GLOBAL
        };
        diagnostics.extend(registry.collect_document(&document, file, base_ns));
        let short_names: Vec<String> = registry
            .get(GLOBAL)
            .children
            .iter()
            .map(|&c| registry.get(c).name.clone())
            .collect();
        for name in short_names {
            diagnostics.extend(registry.auto_merge(&name));
        }

        // C6: constraints.
        let constraint_system = ConstraintSystem::new(ConstraintConfig {
            strict_mode: self.config.strict,
            max_violations: self.config.max_violations,
        });
        diagnostics.extend(constraint_system.validate(&document));

        // C7: selector automation, the only post-parse mutation.
        SelectorAutomation::new(AutomationConfig::default()).process(&mut document);

        if self.cancelled(&mut diagnostics) {
            return self.finish(String::new(), String::new(), String::new(), diagnostics);
        }

        // C10: HTML + CSS emission.
        let generator = HtmlGenerator::new(
            &registry,
            GeneratorConfig {
                emit_generator_comments: self.config.emit_generator_comments,
                ..GeneratorConfig::default()
            },
        );
        let unit = generator.generate(&document);
        diagnostics.extend(unit.diagnostics);

        // C3 on element-local scripts, then C11 over every program.
        let mut programs: Vec<JsNode> = Vec::new();
        let mut pure_js: Vec<String> = Vec::new();
        for (program, mut program_diagnostics) in fragment_programs {
            diagnostics.append(&mut program_diagnostics);
            programs.push(program);
        }
        for (kind, body) in unit.scripts {
            match kind {
                ScriptKind::ChtlJs => {
                    let (program, mut program_diagnostics) = JsParser::new(&body).parse();
                    diagnostics.append(&mut program_diagnostics);
                    programs.push(program);
                }
                ScriptKind::Plain => pure_js.push(body),
            }
        }
        pure_js.extend(pure_js_fragments.iter().map(|f| f.content.trim().to_string()));

        // C9: module planning rewrites load lists into load order.
        let base_dir = Path::new(file)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let loader = ModuleLoader::new(LoaderConfig {
            search_paths: self.config.module_search_paths.clone(),
            strategy: Default::default(),
        });
        for program in &mut programs {
            self.plan_modules(program, &loader, &base_dir, &mut diagnostics);
        }

        let js = self.emit_js(&programs, &pure_js);

        // C12 step 4: merge channels in canonical order.
        let html = merge_channel(
            unit.html,
            html_fragments.iter().map(|f| f.content.trim().to_string()),
        );
        let css = merge_channel(
            css_fragments
                .iter()
                .map(|f| f.content.trim().to_string())
                .collect::<Vec<_>>()
                .join("\n"),
            std::iter::once(unit.css),
        );

        for diagnostic in &mut diagnostics {
            if diagnostic.file.is_empty() {
                diagnostic.file = file.to_string();
            }
        }
        self.finish(html, css, js, diagnostics)
    }

    /// Replace each module block's load list with the computed load
    /// order (dependencies first, declaration order breaking ties).
    fn plan_modules(
        &self,
        program: &mut JsNode,
        loader: &ModuleLoader,
        base: &Path,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        if let JsNode::Program(parts) = program {
            for part in parts {
                if let JsNode::Module(module) = part {
                    let (plan, mut plan_diagnostics) = loader.plan(module, base);
                    diagnostics.append(&mut plan_diagnostics);
                    if !plan.order.is_empty() {
                        module.loads = plan
                            .order
                            .iter()
                            .filter_map(|name| plan.entries.get(name))
                            .map(|entry| entry.original.clone())
                            .collect();
                    }
                }
            }
        }
    }

    /// CHTL-JS runtime and generated code in one IIFE, pure JS behind
    /// it in its own.
    fn emit_js(&self, programs: &[JsNode], pure_js: &[String]) -> String {
        let mut js = String::new();
        if !programs.is_empty() {
            let mut parts = Vec::new();
            for program in programs {
                parts.extend(program.parts().to_vec());
                parts.push(JsNode::Raw("\n".to_string()));
            }
            let generator = JsGenerator::new(JsGeneratorConfig {
                module_format: self.config.module_format,
                ..JsGeneratorConfig::default()
            });
            js.push_str(&generator.generate(&JsNode::Program(parts)));
        }
        let pure: Vec<&String> = pure_js.iter().filter(|s| !s.is_empty()).collect();
        if !pure.is_empty() {
            if !js.is_empty() {
                js.push('\n');
            }
            js.push_str("(function() {\n'use strict';\n");
            for chunk in pure {
                js.push_str(chunk);
                js.push('\n');
            }
            js.push_str("})();\n");
        }
        js
    }

    fn cancelled(&self, diagnostics: &mut Vec<Diagnostic>) -> bool {
        if self.token.is_cancelled() {
            diagnostics.push(Diagnostic::error(
                DiagnosticCode::Cancelled,
                "compilation cancelled".to_string(),
                None,
            ));
            true
        } else {
            false
        }
    }

    /// C12 steps 5 and 6: optional output post-pass, canonical
    /// diagnostic order, and the success verdict.
    fn finish(
        &self,
        html: String,
        css: String,
        js: String,
        mut diagnostics: Vec<Diagnostic>,
    ) -> CompilationResult {
        let (html, css, js) = if self.config.minify {
            (
                compress_whitespace(&html),
                compress_whitespace(&css),
                compress_whitespace(&js),
            )
        } else {
            (html, css, js)
        };
        sort_diagnostics(&mut diagnostics);
        let success = !has_errors(&diagnostics);
        CompilationResult { success, html, css, js, diagnostics }
    }
}

impl Default for CompilerDispatcher {
    fn default() -> Self {
        CompilerDispatcher::new(DispatcherConfig::default())
    }
}

fn merge_channel(first: String, rest: impl IntoIterator<Item = String>) -> String {
    let mut out = first.trim().to_string();
    for chunk in rest {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(chunk);
    }
    out
}
