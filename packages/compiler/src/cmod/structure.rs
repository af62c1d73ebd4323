//! CMOD directory layout
//!
//! A module directory (or unpacked archive root) looks like:
//!
//! ```text
//! <module>/
//!   src/<module>.chtl                  main file, optional with submodules
//!   src/<sub>/src/<sub>.chtl           one level of recursion
//!   src/<sub>/info/<sub>.chtl
//!   info/<module>.chtl                 required
//!   <anything>.chtl                    additional files
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use super::info::{is_valid_version, CmodInfo};
use super::CmodError;
use crate::util::is_valid_identifier;

/// A nested module, one level deep.
#[derive(Debug, Clone)]
pub struct SubModule {
    pub name: String,
    pub src_path: PathBuf,
    pub info_path: PathBuf,
    pub main_file: Option<PathBuf>,
    pub info_file: PathBuf,
}

/// A scanned module directory.
#[derive(Debug, Clone)]
pub struct CmodStructure {
    pub module_name: String,
    pub root_path: PathBuf,
    pub src_path: PathBuf,
    pub info_path: PathBuf,
    pub main_module_file: Option<PathBuf>,
    pub info_file: PathBuf,
    pub submodules: Vec<SubModule>,
    pub additional_files: Vec<PathBuf>,
}

impl CmodStructure {
    /// Scan a directory into a structure; validation is separate so
    /// `analyze` can print partially-valid layouts.
    pub fn scan(root: &Path) -> Result<CmodStructure, CmodError> {
        let module_name = root
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                CmodError::InvalidStructure(format!("unusable module path {}", root.display()))
            })?
            .to_string();

        let src_path = root.join("src");
        let info_path = root.join("info");
        let info_file = info_path.join(format!("{}.chtl", module_name));
        let main_candidate = src_path.join(format!("{}.chtl", module_name));
        let main_module_file = main_candidate.is_file().then_some(main_candidate);

        let mut submodules = Vec::new();
        if src_path.is_dir() {
            let mut entries: Vec<_> = fs::read_dir(&src_path)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .collect();
            entries.sort();
            for entry in entries {
                if !entry.is_dir() {
                    continue;
                }
                let name = match entry.file_name().and_then(|n| n.to_str()) {
                    Some(n) => n.to_string(),
                    None => continue,
                };
                let sub_src = entry.join("src");
                let sub_info = entry.join("info");
                let sub_main = sub_src.join(format!("{}.chtl", name));
                submodules.push(SubModule {
                    main_file: sub_main.is_file().then_some(sub_main),
                    info_file: sub_info.join(format!("{}.chtl", name)),
                    name,
                    src_path: sub_src,
                    info_path: sub_info,
                });
            }
        }

        let mut additional_files = Vec::new();
        let mut root_entries: Vec<_> = fs::read_dir(root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        root_entries.sort();
        for entry in root_entries {
            if entry.is_file() && entry.extension().is_some_and(|e| e == "chtl") {
                additional_files.push(entry);
            }
        }

        Ok(CmodStructure {
            module_name,
            root_path: root.to_path_buf(),
            src_path,
            info_path,
            main_module_file,
            info_file,
            submodules,
            additional_files,
        })
    }

    /// Validate the layout rules and the info file.
    pub fn validate(&self) -> Result<CmodInfo, CmodError> {
        if !self.info_file.is_file() {
            return Err(CmodError::InvalidStructure(format!(
                "missing info file {}",
                self.info_file.display()
            )));
        }
        if !self.src_path.is_dir() {
            return Err(CmodError::InvalidStructure(format!(
                "missing src directory {}",
                self.src_path.display()
            )));
        }
        if dir_is_empty(&self.src_path)? {
            return Err(CmodError::InvalidStructure(format!(
                "src directory {} is empty",
                self.src_path.display()
            )));
        }

        let valid_submodules = self
            .submodules
            .iter()
            .filter(|s| s.main_file.is_some() && s.info_file.is_file())
            .count();
        if self.main_module_file.is_none() && valid_submodules == 0 {
            return Err(CmodError::InvalidStructure(
                "module has neither a main file nor a valid submodule".to_string(),
            ));
        }

        for submodule in &self.submodules {
            if !is_valid_identifier(&submodule.name) {
                return Err(CmodError::InvalidStructure(format!(
                    "invalid submodule name `{}`",
                    submodule.name
                )));
            }
        }

        let content = fs::read_to_string(&self.info_file)?;
        let info = CmodInfo::parse(&content)?;
        if !info.version.is_empty() && !is_valid_version(&info.version) {
            return Err(CmodError::MalformedInfo(format!(
                "invalid version `{}`",
                info.version
            )));
        }
        Ok(info)
    }

    /// Every file belonging to the module, relative to its root, in a
    /// stable order. This is the archive manifest.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        if let Some(main) = &self.main_module_file {
            files.push(main.clone());
        }
        files.push(self.info_file.clone());
        for submodule in &self.submodules {
            if let Some(main) = &submodule.main_file {
                files.push(main.clone());
            }
            if submodule.info_file.is_file() {
                files.push(submodule.info_file.clone());
            }
        }
        files.extend(self.additional_files.iter().cloned());
        files.sort();
        files.dedup();
        files
    }
}

fn dir_is_empty(path: &Path) -> Result<bool, CmodError> {
    Ok(fs::read_dir(path)?.next().is_none())
}
