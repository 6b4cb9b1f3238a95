//! Installed compatibility tools in an install directory

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use version_compare::Cmp;
use walkdir::WalkDir;

use crate::checksum::MARKER_FILE;
use crate::error::{ProvisionError, Result};
use crate::logging::log_info;

pub const VERSION_FILE: &str = "VERSION.txt";

#[derive(Debug, Clone, PartialEq)]
pub struct InstalledTool {
    pub name: String,
    /// From `VERSION.txt`, when present
    pub version: Option<String>,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Whether the install carries a checksum marker
    pub verified: bool,
}

fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}

/// Splits `GE-Proton8-17` into `("ge-proton", "8.17")`.
fn sort_key(name: &str) -> (String, String) {
    let split = name.find(|c: char| c.is_ascii_digit()).unwrap_or(name.len());
    let (prefix, rest) = name.split_at(split);
    (prefix.to_lowercase(), rest.replace(['-', '_'], "."))
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    if version_compare::compare_to(a, b, Cmp::Lt).unwrap_or(false) {
        Ordering::Less
    } else if version_compare::compare_to(a, b, Cmp::Gt).unwrap_or(false) {
        Ordering::Greater
    } else {
        a.cmp(b)
    }
}

/// Orders tool names alphabetically by family, then by version.
pub fn compare_tool_names(a: &str, b: &str) -> Ordering {
    let (a_prefix, a_version) = sort_key(a);
    let (b_prefix, b_version) = sort_key(b);
    a_prefix
        .cmp(&b_prefix)
        .then_with(|| compare_versions(&a_version, &b_version))
}

/// Lists tool directories in `install_dir`. Hidden entries (staging and
/// backup directories) are skipped.
pub fn list_installed(install_dir: &Path) -> Vec<InstalledTool> {
    let Ok(entries) = fs::read_dir(install_dir) else {
        return Vec::new();
    };

    let mut tools: Vec<InstalledTool> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                return None;
            }
            let path = e.path();
            let version = fs::read_to_string(path.join(VERSION_FILE))
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
            Some(InstalledTool {
                version,
                size_bytes: dir_size(&path),
                verified: path.join(MARKER_FILE).is_file(),
                name,
                path,
            })
        })
        .collect();

    tools.sort_by(|a, b| compare_tool_names(&a.name, &b.name));
    tools
}

/// Removes `<install_dir>/<name>`. Returns `false` when it does not exist.
pub fn remove_tool(install_dir: &Path, name: &str) -> Result<bool> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Ok(false);
    }
    let path = install_dir.join(name);
    if !path.is_dir() {
        return Ok(false);
    }
    fs::remove_dir_all(&path)
        .map_err(|e| ProvisionError::io(format!("Failed to remove {}", path.display()), e))?;
    log_info(&format!("Removed {}", path.display()));
    Ok(true)
}

pub fn write_tool_version(tool_dir: &Path, version: &str) -> Result<()> {
    let path = tool_dir.join(VERSION_FILE);
    fs::write(&path, format!("{}\n", version))
        .map_err(|e| ProvisionError::io(format!("Failed to write {}", path.display()), e))
}
