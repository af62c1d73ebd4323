//! CMOD info files
//!
//! `info/<module>.chtl` carries an `[Info]` key-value block and an
//! optional `[Export]` block listing the published names by kind. The
//! parsed record can be re-emitted in canonical form, which `analyze`
//! and the packer use when the on-disk file omits the export table.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use super::CmodError;

static VERSION_REGEXP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-[0-9A-Za-z.-]+)?$").unwrap());

static ENTRY_REGEXP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*([A-Za-z][\w-]*)\s*=\s*"([^"]*)"\s*;"#).unwrap());

/// Published names grouped by declaration kind, insertion order kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportTable {
    pub custom_styles: Vec<String>,
    pub custom_elements: Vec<String>,
    pub custom_vars: Vec<String>,
    pub template_styles: Vec<String>,
    pub template_elements: Vec<String>,
    pub template_vars: Vec<String>,
    pub origins: Vec<String>,
    pub configurations: Vec<String>,
}

impl ExportTable {
    pub fn is_empty(&self) -> bool {
        self.custom_styles.is_empty()
            && self.custom_elements.is_empty()
            && self.custom_vars.is_empty()
            && self.template_styles.is_empty()
            && self.template_elements.is_empty()
            && self.template_vars.is_empty()
            && self.origins.is_empty()
            && self.configurations.is_empty()
    }

    fn rows(&self) -> [(&'static str, &Vec<String>); 8] {
        [
            ("[Custom] @Style", &self.custom_styles),
            ("[Custom] @Element", &self.custom_elements),
            ("[Custom] @Var", &self.custom_vars),
            ("[Template] @Style", &self.template_styles),
            ("[Template] @Element", &self.template_elements),
            ("[Template] @Var", &self.template_vars),
            ("[Origin]", &self.origins),
            ("[Configuration]", &self.configurations),
        ]
    }
}

/// Parsed module metadata.
#[derive(Debug, Clone, Default)]
pub struct CmodInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub license: String,
    pub dependencies: Vec<String>,
    pub category: String,
    pub min_version: String,
    pub max_version: String,
    pub metadata: IndexMap<String, String>,
    pub exports: ExportTable,
}

impl CmodInfo {
    /// Parse an info file.
    pub fn parse(content: &str) -> Result<CmodInfo, CmodError> {
        let info_body = block_body(content, "[Info]")
            .ok_or_else(|| CmodError::MalformedInfo("missing [Info] block".to_string()))?;

        let mut info = CmodInfo::default();
        for capture in ENTRY_REGEXP.captures_iter(info_body) {
            let key = &capture[1];
            let value = capture[2].to_string();
            match key {
                "name" => info.name = value,
                "version" => info.version = value,
                "description" => info.description = value,
                "author" => info.author = value,
                "license" => info.license = value,
                "category" => info.category = value,
                "dependencies" => {
                    info.dependencies = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "minVersion" | "min-version" => info.min_version = value,
                "maxVersion" | "max-version" => info.max_version = value,
                _ => {
                    info.metadata.insert(key.to_string(), value);
                }
            }
        }

        if info.name.is_empty() {
            return Err(CmodError::MalformedInfo("info block has no name".to_string()));
        }
        if !info.version.is_empty() && !is_valid_version(&info.version) {
            return Err(CmodError::MalformedInfo(format!(
                "invalid version `{}`",
                info.version
            )));
        }

        if let Some(export_body) = block_body(content, "[Export]") {
            info.exports = parse_export_table(export_body);
        }
        Ok(info)
    }

    /// Re-emit the canonical `[Info]` / `[Export]` text.
    pub fn generate(&self) -> String {
        let mut out = String::new();
        out.push_str("[Info] {\n");
        for (key, value) in [
            ("name", &self.name),
            ("version", &self.version),
            ("description", &self.description),
            ("author", &self.author),
            ("license", &self.license),
            ("category", &self.category),
        ] {
            if !value.is_empty() {
                out.push_str(&format!("    {} = \"{}\";\n", key, value));
            }
        }
        if !self.dependencies.is_empty() {
            out.push_str(&format!(
                "    dependencies = \"{}\";\n",
                self.dependencies.join(", ")
            ));
        }
        if !self.min_version.is_empty() {
            out.push_str(&format!("    minVersion = \"{}\";\n", self.min_version));
        }
        if !self.max_version.is_empty() {
            out.push_str(&format!("    maxVersion = \"{}\";\n", self.max_version));
        }
        for (key, value) in &self.metadata {
            out.push_str(&format!("    {} = \"{}\";\n", key, value));
        }
        out.push_str("}\n");

        if !self.exports.is_empty() {
            out.push_str("\n[Export] {\n");
            for (label, names) in self.exports.rows() {
                if !names.is_empty() {
                    out.push_str(&format!("    {} {};\n", label, names.join(", ")));
                }
            }
            out.push_str("}\n");
        }
        out
    }

    /// Is a host version inside this module's declared range? Empty
    /// bounds are open.
    pub fn accepts_host_version(&self, host: &str) -> bool {
        let Some(host) = parse_version(host) else { return true };
        if let Some(min) = parse_version(&self.min_version) {
            if host < min {
                return false;
            }
        }
        if let Some(max) = parse_version(&self.max_version) {
            if host > max {
                return false;
            }
        }
        true
    }
}

/// `<major>.<minor>.<patch>(-prerelease)?`
pub fn is_valid_version(version: &str) -> bool {
    VERSION_REGEXP.is_match(version)
}

fn parse_version(version: &str) -> Option<(u64, u64, u64)> {
    let capture = VERSION_REGEXP.captures(version)?;
    Some((
        capture[1].parse().ok()?,
        capture[2].parse().ok()?,
        capture[3].parse().ok()?,
    ))
}

/// Body of `[Header] { … }`, braces excluded.
fn block_body<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after = &content[start + header.len()..];
    let open = after.find('{')?;
    let mut depth = 0usize;
    for (i, ch) in after[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&after[open + 1..open + i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_export_table(body: &str) -> ExportTable {
    let mut table = ExportTable::default();
    for line in body.lines() {
        let line = line.trim().trim_end_matches(';').trim();
        if line.is_empty() {
            continue;
        }
        let (bucket, rest): (&mut Vec<String>, &str) =
            if let Some(rest) = line.strip_prefix("[Custom]") {
                match qualified_kind(rest) {
                    Some(("Style", names)) => (&mut table.custom_styles, names),
                    Some(("Element", names)) => (&mut table.custom_elements, names),
                    Some(("Var", names)) => (&mut table.custom_vars, names),
                    _ => continue,
                }
            } else if let Some(rest) = line.strip_prefix("[Template]") {
                match qualified_kind(rest) {
                    Some(("Style", names)) => (&mut table.template_styles, names),
                    Some(("Element", names)) => (&mut table.template_elements, names),
                    Some(("Var", names)) => (&mut table.template_vars, names),
                    _ => continue,
                }
            } else if let Some(rest) = line.strip_prefix("[Origin]") {
                // Skip the `@Kind` tag; only the names are recorded.
                let names = rest
                    .trim_start()
                    .strip_prefix('@')
                    .and_then(|r| r.split_once(char::is_whitespace))
                    .map(|(_, names)| names)
                    .unwrap_or(rest);
                (&mut table.origins, names)
            } else if let Some(rest) = line.strip_prefix("[Configuration]") {
                (&mut table.configurations, rest)
            } else {
                continue;
            };
        for name in rest.split(',') {
            let name = name.trim().trim_start_matches('@').trim();
            if !name.is_empty() {
                bucket.push(name.to_string());
            }
        }
    }
    table
}

fn qualified_kind(rest: &str) -> Option<(&str, &str)> {
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('@')?;
    for kind in ["Style", "Element", "Var"] {
        if let Some(names) = rest.strip_prefix(kind) {
            return Some((kind, names));
        }
    }
    None
}
