//! Module loader
//!
//! Resolves `module { load: … }` entries against the filesystem, builds
//! the dependency graph by statically scanning `.cjjs` sources, rejects
//! cycles, and produces a load order. Resolution results are cached by
//! resolved path; re-entry of a cached path is a no-op.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::chtl_js::ast::ModuleNode;
use crate::parse_util::{Diagnostic, DiagnosticCode};

static LOAD_TARGET_REGEXP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"load\s*:\s*(?:"([^"]+)"|'([^']+)'|([^,;}\s]+))"#).unwrap());

/// The extension ladder tried during resolution, in order.
pub const EXTENSION_LADDER: &[&str] = &[".chtl", ".cjjs", ".js", ".mjs"];

/// Module type, detected from the resolved file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    Cjjs,
    Js,
    Auto,
}

impl ModuleType {
    pub fn detect(path: &Path) -> ModuleType {
        match path.extension().and_then(|e| e.to_str()) {
            Some("cjjs") => ModuleType::Cjjs,
            Some("js") | Some("mjs") => ModuleType::Js,
            _ => ModuleType::Auto,
        }
    }
}

/// How the final order is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStrategy {
    /// Topological order (the default).
    #[default]
    Dependency,
    /// Same linearised order, loaded one at a time.
    Sequential,
    /// Per-level batches; everything inside a batch is independent.
    Parallel,
}

/// A resolved module.
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    pub original: String,
    pub resolved: PathBuf,
    pub module_type: ModuleType,
    pub name: String,
    pub loaded: bool,
    pub dependencies: Vec<String>,
}

/// Resolution failures.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("module `{0}` not found on any search path")]
    PathNotFound(String),
    #[error("module file {0} is unreadable")]
    Unreadable(PathBuf),
}

/// Loader configuration.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    pub search_paths: Vec<PathBuf>,
    pub strategy: LoadStrategy,
}

/// The computed plan: a linear order, parallel batches when requested,
/// and the entries themselves (cycle participants included, so callers
/// can still inspect them individually).
#[derive(Debug, Clone, Default)]
pub struct LoadPlan {
    pub order: Vec<String>,
    pub batches: Vec<Vec<String>>,
    pub entries: HashMap<String, ModuleEntry>,
}

/// Running counters surfaced by `analyze` and debug logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoaderStats {
    pub resolved: usize,
    pub cached: usize,
    pub failed: usize,
}

/// The module loader.
pub struct ModuleLoader {
    config: LoaderConfig,
    cache: Mutex<HashMap<PathBuf, ModuleEntry>>,
    stats: Mutex<LoaderStats>,
}

impl ModuleLoader {
    pub fn new(config: LoaderConfig) -> Self {
        ModuleLoader {
            config,
            cache: Mutex::new(HashMap::new()),
            stats: Mutex::new(LoaderStats::default()),
        }
    }

    pub fn stats(&self) -> LoaderStats {
        *self.stats.lock().unwrap()
    }

    /// Resolve one module path: absolute paths verbatim, `./`-relative
    /// against the base, anything else against the search paths, each
    /// candidate tried through the extension ladder.
    pub fn resolve(&self, original: &str, base: &Path) -> Result<PathBuf, LoadError> {
        let raw = Path::new(original);
        let candidates: Vec<PathBuf> = if raw.is_absolute() {
            vec![raw.to_path_buf()]
        } else if original.starts_with("./") || original.starts_with("../") {
            vec![base.join(raw)]
        } else {
            let mut roots = vec![base.join(raw)];
            roots.extend(self.config.search_paths.iter().map(|p| p.join(raw)));
            roots
        };

        for candidate in candidates {
            if candidate.extension().is_some() && candidate.is_file() {
                return Ok(candidate);
            }
            for extension in EXTENSION_LADDER {
                let mut with_extension = candidate.as_os_str().to_owned();
                with_extension.push(extension);
                let with_extension = PathBuf::from(with_extension);
                if with_extension.is_file() {
                    return Ok(with_extension);
                }
            }
        }
        Err(LoadError::PathNotFound(original.to_string()))
    }

    /// Resolve an entry through the cache. A cache hit marks the entry
    /// loaded and is otherwise a no-op.
    fn resolve_entry(&self, original: &str, base: &Path) -> Result<ModuleEntry, LoadError> {
        let resolved = self.resolve(original, base)?;
        {
            let cache = self.cache.lock().unwrap();
            if let Some(entry) = cache.get(&resolved) {
                self.stats.lock().unwrap().cached += 1;
                debug!("module cache hit for {}", resolved.display());
                return Ok(entry.clone());
            }
        }

        let module_type = ModuleType::detect(&resolved);
        let dependencies = match module_type {
            ModuleType::Cjjs => {
                let content = fs::read_to_string(&resolved)
                    .map_err(|_| LoadError::Unreadable(resolved.clone()))?;
                extract_load_targets(&content)
                    .iter()
                    .map(|target| module_name(target))
                    .collect()
            }
            // Pure JS is opaque to the dependency scan.
            ModuleType::Js | ModuleType::Auto => Vec::new(),
        };

        let entry = ModuleEntry {
            original: original.to_string(),
            name: module_name(original),
            resolved: resolved.clone(),
            module_type,
            loaded: true,
            dependencies,
        };
        self.cache.lock().unwrap().insert(resolved, entry.clone());
        self.stats.lock().unwrap().resolved += 1;
        Ok(entry)
    }

    /// Build the load plan for one `module {}` block.
    pub fn plan(&self, module: &ModuleNode, base: &Path) -> (LoadPlan, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let mut entries: HashMap<String, ModuleEntry> = HashMap::new();
        let mut declaration_order: Vec<String> = Vec::new();

        // Resolve the declared entries and, transitively, their
        // dependencies. Declaration order is the tie-break everywhere.
        let mut queue: Vec<String> = module.loads.clone();
        let mut queued = 0usize;
        while queued < queue.len() {
            let original = queue[queued].clone();
            queued += 1;
            let name = module_name(&original);
            if entries.contains_key(&name) {
                continue;
            }
            match self.resolve_entry(&original, base) {
                Ok(entry) => {
                    for dependency in &entry.dependencies {
                        if !entries.contains_key(dependency) && !queue.contains(dependency) {
                            queue.push(dependency.clone());
                        }
                    }
                    declaration_order.push(name.clone());
                    entries.insert(name, entry);
                }
                Err(error) => {
                    self.stats.lock().unwrap().failed += 1;
                    let code = match &error {
                        LoadError::PathNotFound(_) => DiagnosticCode::PathNotFound,
                        LoadError::Unreadable(_) => DiagnosticCode::Unreadable,
                    };
                    diagnostics.push(Diagnostic::error(code, error.to_string(), Some(module.span)));
                }
            }
        }

        // Cycle detection: three-colour DFS over the name graph.
        let mut colours: HashMap<&str, u8> = HashMap::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut cyclic: Vec<String> = Vec::new();
        for name in &declaration_order {
            if colours.get(name.as_str()).copied().unwrap_or(0) == 0 {
                dfs_cycles(
                    name,
                    &entries,
                    &mut colours,
                    &mut stack,
                    &mut cyclic,
                    &mut diagnostics,
                    module,
                );
            }
        }

        // Kahn's sort over the acyclic remainder, tie-broken by
        // declaration order.
        let sortable: Vec<&String> = declaration_order
            .iter()
            .filter(|n| !cyclic.contains(*n))
            .collect();
        let mut pending: HashMap<&str, usize> = HashMap::new();
        for name in &sortable {
            let entry = &entries[name.as_str()];
            let unmet = entry
                .dependencies
                .iter()
                .filter(|d| entries.contains_key(d.as_str()) && !cyclic.contains(d))
                .count();
            pending.insert(name.as_str(), unmet);
        }

        let mut order: Vec<String> = Vec::new();
        let mut batches: Vec<Vec<String>> = Vec::new();
        let mut placed: Vec<&str> = Vec::new();
        while placed.len() < sortable.len() {
            let ready: Vec<&str> = sortable
                .iter()
                .map(|n| n.as_str())
                .filter(|n| !placed.contains(n) && pending[n] == 0)
                .collect();
            if ready.is_empty() {
                break;
            }
            batches.push(ready.iter().map(|n| n.to_string()).collect());
            for name in ready {
                placed.push(name);
                order.push(name.to_string());
                for other in &sortable {
                    let entry = &entries[other.as_str()];
                    if entry.dependencies.iter().any(|d| d.as_str() == name) {
                        if let Some(count) = pending.get_mut(other.as_str()) {
                            *count = count.saturating_sub(1);
                        }
                    }
                }
            }
        }

        let batches = match self.config.strategy {
            LoadStrategy::Parallel => batches,
            // A linear strategy is one batch per module.
            LoadStrategy::Dependency | LoadStrategy::Sequential => {
                order.iter().map(|n| vec![n.clone()]).collect()
            }
        };

        debug!(
            "module plan: {} entries, {} ordered, {} cyclic",
            entries.len(),
            order.len(),
            cyclic.len()
        );
        (LoadPlan { order, batches, entries }, diagnostics)
    }
}

#[allow(clippy::too_many_arguments)]
fn dfs_cycles<'a>(
    name: &str,
    entries: &'a HashMap<String, ModuleEntry>,
    colours: &mut HashMap<&'a str, u8>,
    stack: &mut Vec<&'a str>,
    cyclic: &mut Vec<String>,
    diagnostics: &mut Vec<Diagnostic>,
    module: &ModuleNode,
) {
    let Some((key, entry)) = entries.get_key_value(name) else {
        return;
    };
    colours.insert(key.as_str(), 1); // grey
    stack.push(key.as_str());
    for dependency in &entry.dependencies {
        match colours
            .get(dependency.as_str())
            .copied()
            .unwrap_or(0)
        {
            0 => dfs_cycles(dependency, entries, colours, stack, cyclic, diagnostics, module),
            1 => {
                // Back edge: report the cycle path and mark everyone on
                // it; the loader does not auto-break cycles.
                let cycle_start = stack
                    .iter()
                    .position(|n| *n == dependency.as_str())
                    .unwrap_or(0);
                let mut path: Vec<String> =
                    stack[cycle_start..].iter().map(|n| n.to_string()).collect();
                path.push(dependency.clone());
                for participant in &path {
                    if !cyclic.contains(participant) {
                        cyclic.push(participant.clone());
                    }
                }
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::CyclicDependency,
                    format!("cyclic module dependency: {}", path.join(" -> ")),
                    Some(module.span),
                ));
            }
            _ => {}
        }
    }
    stack.pop();
    colours.insert(key.as_str(), 2); // black
}

/// Statically extract `load:` targets from a `.cjjs` source.
pub fn extract_load_targets(content: &str) -> Vec<String> {
    LOAD_TARGET_REGEXP
        .captures_iter(content)
        .filter_map(|c| {
            c.get(1)
                .or_else(|| c.get(2))
                .or_else(|| c.get(3))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Module name: file stem of the path.
pub fn module_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}
