//! Install path normalization
//!
//! Maps a release tag to the directory name its archive extracts to, then to
//! the name the target launcher expects, and moves the staged directory into
//! place.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ProvisionError, Result};
use crate::launcher::LauncherKind;
use crate::logging::log_warning;

/// Naming convention of one tool variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingRule {
    /// Root is the tag itself; legacy tags (not starting with `GE-Proton`)
    /// shipped as `Proton-<tag>`
    GeProton,
    /// Root is `lutris-<tag>-x86_64`; Lutris and Heroic rename it
    WineGe,
    /// Root is `<prefix><tag without leading v>`
    Prefixed(&'static str),
    /// Archive has no versioned root; contents go into `<prefix><tag>`
    Unrooted(&'static str),
    /// Branch archive with a fixed root that is installed under a fixed name
    Fixed {
        extracted: &'static str,
        installed: &'static str,
    },
}

impl NamingRule {
    /// Directory name produced by extracting the archive for `version`.
    pub fn extract_name(&self, version: &str) -> String {
        match self {
            NamingRule::GeProton => {
                if version.starts_with("GE-Proton") {
                    version.to_string()
                } else {
                    format!("Proton-{}", version)
                }
            }
            NamingRule::WineGe => format!("lutris-{}-x86_64", version),
            NamingRule::Prefixed(prefix) => {
                format!("{}{}", prefix, version.strip_prefix('v').unwrap_or(version))
            }
            NamingRule::Unrooted(prefix) => format!("{}{}", prefix, version),
            NamingRule::Fixed { extracted, .. } => extracted.to_string(),
        }
    }

    /// Final directory name for `launcher`.
    pub fn installed_name(&self, version: &str, launcher: LauncherKind) -> String {
        let extracted = self.extract_name(version);
        match (self, launcher) {
            (NamingRule::WineGe, LauncherKind::Lutris) => extracted
                .to_lowercase()
                .replace("lutris", "wine")
                .replace("proton", ""),
            (NamingRule::WineGe, LauncherKind::Heroic) => extracted
                .replace("lutris-", "Wine-")
                .trim_end_matches("-x86_64")
                .to_string(),
            (NamingRule::Fixed { installed, .. }, _) => installed.to_string(),
            _ => extracted,
        }
    }

    /// Whether the archive carries its own root directory.
    pub fn has_root(&self) -> bool {
        !matches!(self, NamingRule::Unrooted(_))
    }
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| {
        ProvisionError::io(
            format!("Failed to move {} to {}", from.display(), to.display()),
            e,
        )
    })
}

fn backup_path(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!(".{}.ctup-old", name))
}

/// Moves `staged` to `final_path` in a single rename.
///
/// An existing `final_path` is refused unless `replace` is set, in which case
/// it is moved aside first and restored if the move fails.
pub fn move_into_place(staged: &Path, final_path: &Path, replace: bool) -> Result<PathBuf> {
    if staged == final_path {
        return Ok(final_path.to_path_buf());
    }

    if !final_path.exists() {
        rename(staged, final_path)?;
        return Ok(final_path.to_path_buf());
    }

    if !replace {
        return Err(ProvisionError::RefusedOverwrite {
            path: final_path.to_path_buf(),
        });
    }

    let backup = backup_path(final_path);
    if backup.exists() {
        fs::remove_dir_all(&backup)?;
    }
    rename(final_path, &backup)?;

    if let Err(e) = rename(staged, final_path) {
        if let Err(restore) = fs::rename(&backup, final_path) {
            log_warning(&format!(
                "Could not restore {}: {}",
                final_path.display(),
                restore
            ));
        }
        return Err(e);
    }

    if let Err(e) = fs::remove_dir_all(&backup) {
        log_warning(&format!("Could not remove {}: {}", backup.display(), e));
    }
    Ok(final_path.to_path_buf())
}
