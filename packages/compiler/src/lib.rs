#![deny(clippy::all)]

//! CHTL compiler
//!
//! A source-to-source compiler translating the CHTL superset of
//! HTML/CSS/JS into plain HTML, CSS and JavaScript. The pipeline:
//! a unified scanner slices mixed-syntax sources into typed fragments,
//! the CHTL and CHTL-JS front-ends parse their batches, semantic passes
//! resolve namespaces, check constraints and automate selectors, and
//! the generators emit the three output channels which the dispatcher
//! merges into a [`dispatcher::CompilationResult`].

pub mod ast;
pub mod chars;
pub mod chtl;
pub mod chtl_js;
pub mod cmod;
mod config;
pub mod constraint;
pub mod dispatcher;
pub mod generator;
pub mod module_loader;
pub mod namespace;
pub mod parse_util;
pub mod scanner;
pub mod selector_automation;
pub mod util;
mod version;

pub use config::CompilerConfig;
pub use dispatcher::{CancellationToken, CompilationResult, CompilerDispatcher, DispatcherConfig};
pub use parse_util::{Diagnostic, DiagnosticCode, Severity};
pub use version::VERSION;

/// Compile one source string with default options.
pub fn compile(source: &str, file: &str) -> CompilationResult {
    CompilerDispatcher::default().compile(source, file)
}
