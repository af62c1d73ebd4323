//! Compiler configuration
//!
//! A flat, serializable option set the CLI can read from JSON. It
//! expands into the per-stage config structs the pipeline consumes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::chtl_js::ModuleFormat;
use crate::dispatcher::DispatcherConfig;

/// Flat unit-level options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub parallel: bool,
    pub strict: bool,
    pub minify: bool,
    pub detect_chtl_js: bool,
    pub emit_generator_comments: bool,
    pub default_namespace: bool,
    /// `script`, `commonjs` or `esm`.
    pub module_format: String,
    pub module_search_paths: Vec<PathBuf>,
    pub max_violations: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            parallel: false,
            strict: false,
            minify: false,
            detect_chtl_js: true,
            emit_generator_comments: true,
            default_namespace: false,
            module_format: "script".to_string(),
            module_search_paths: Vec::new(),
            max_violations: 100,
        }
    }
}

impl CompilerConfig {
    pub fn module_format(&self) -> ModuleFormat {
        match self.module_format.as_str() {
            "commonjs" => ModuleFormat::CommonJs,
            "esm" | "es6" => ModuleFormat::EsModule,
            _ => ModuleFormat::ScriptInjection,
        }
    }

    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            parallel: self.parallel,
            strict: self.strict,
            minify: self.minify,
            detect_chtl_js: self.detect_chtl_js,
            emit_generator_comments: self.emit_generator_comments,
            default_namespace: self.default_namespace,
            module_format: self.module_format(),
            module_search_paths: self.module_search_paths.clone(),
            max_violations: self.max_violations,
        }
    }
}
