//! Shared provisioning pipeline:
//! resolve -> reconcile -> download -> verify -> extract -> normalize

use std::fs;
use std::path::{Path, PathBuf};

use super::{ExistingPolicy, Source, ToolModule};
use crate::archive;
use crate::checksum::{self, ExistingInstall};
use crate::download::{download, PROGRESS_COMPLETE};
use crate::error::{ProvisionError, Result};
use crate::installed::write_tool_version;
use crate::launcher::get_launcher_from_installdir;
use crate::logging::{log_info, log_warning};
use crate::normalize::move_into_place;
use crate::resolver::{self, parse_date, ReleaseInfo};

const SHORT_SHA_LEN: usize = 7;

pub(super) fn short_sha(sha: &str) -> String {
    sha.chars().take(SHORT_SHA_LEN).collect()
}

/// Removes a directory tree, logging instead of failing.
fn remove_dir_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_dir_all(path) {
            log_warning(&format!("Could not remove {}: {}", path.display(), e));
        }
    }
}

/// Picks the directory that becomes the install inside `staging`.
fn staged_root(staging: &Path, extract_name: &str, has_root: bool) -> PathBuf {
    if !has_root {
        return staging.to_path_buf();
    }
    let expected = staging.join(extract_name);
    if expected.is_dir() {
        return expected;
    }

    let entries: Vec<PathBuf> = fs::read_dir(staging)
        .map(|rd| rd.flatten().map(|e| e.path()).collect())
        .unwrap_or_default();
    match entries.as_slice() {
        [only] if only.is_dir() => {
            log_warning(&format!(
                "Expected {} in archive, using {}",
                extract_name,
                only.display()
            ));
            only.clone()
        }
        _ => staging.to_path_buf(),
    }
}

/// Writes the marker and version file into `root`, then moves it to
/// `final_path`. Nothing appears at `final_path` unless both files exist.
fn place_staged(
    root: &Path,
    final_path: &Path,
    replace: bool,
    digest: &str,
    version: &str,
) -> Result<PathBuf> {
    checksum::write_marker(root, digest)?;
    write_tool_version(root, version)?;
    move_into_place(root, final_path, replace)
}

impl ToolModule {
    fn resolve_release(&self, version: &str) -> Result<Option<ReleaseInfo>> {
        let variant = self.variant;
        match variant.source {
            Source::Releases { api_url } => resolver::resolve(
                api_url,
                variant.format.suffix(),
                &self.client,
                Some(version),
            ),
            Source::CiArtifacts {
                api_url,
                branch,
                download_template,
            } => {
                let artifact = self
                    .client
                    .list_artifacts(api_url, 100, 1)?
                    .into_iter()
                    .filter(|a| !a.expired && a.workflow_run.head_branch == branch)
                    .find(|a| version.is_empty() || a.workflow_run.head_sha.starts_with(version));

                Ok(artifact.map(|a| ReleaseInfo {
                    version: short_sha(&a.workflow_run.head_sha),
                    date: a.updated_at.as_deref().and_then(parse_date),
                    download_url: download_template
                        .replace("{run_id}", &a.workflow_run.id.to_string())
                        .replace("{name}", &a.name),
                    checksum_url: None,
                    size: a.size_in_bytes,
                }))
            }
            Source::Branch {
                archive_url,
                branch,
            } => Ok(Some(ReleaseInfo {
                version: branch.to_string(),
                date: None,
                download_url: archive_url.to_string(),
                checksum_url: None,
                size: 0,
            })),
        }
    }

    pub(super) fn provision(
        &self,
        version: &str,
        install_dir: &Path,
        temp_dir: &Path,
    ) -> Result<PathBuf> {
        let variant = self.variant;
        self.progress.begin();

        let Some(release) = self.resolve_release(version)? else {
            return Err(ProvisionError::Unavailable {
                tool: variant.name.to_string(),
                version: if version.is_empty() { "latest" } else { version }.to_string(),
            });
        };

        let launcher = get_launcher_from_installdir(install_dir);
        let extract_root = variant.extract_target.resolve(install_dir, launcher);
        let extract_name = variant.naming.extract_name(&release.version);
        let final_path = extract_root.join(variant.naming.installed_name(&release.version, launcher));

        let remote_checksum = match &release.checksum_url {
            Some(url) => Some(self.client.fetch_text(url)?),
            None => {
                log_warning(&format!(
                    "{} {} has no checksum, skipping integrity verification",
                    variant.name, release.version
                ));
                None
            }
        };

        let replace = match variant.existing {
            ExistingPolicy::Replace => true,
            ExistingPolicy::Reconcile => {
                match checksum::reconcile(&final_path, remote_checksum.as_deref()) {
                    ExistingInstall::Absent => false,
                    ExistingInstall::UpToDate => {
                        return Err(ProvisionError::AlreadyInstalled { path: final_path })
                    }
                    ExistingInstall::Outdated => {
                        log_info(&format!("{} differs from remote, reinstalling", final_path.display()));
                        true
                    }
                    ExistingInstall::Unverifiable => {
                        return Err(ProvisionError::RefusedOverwrite { path: final_path })
                    }
                }
            }
        };

        let archive_path = temp_dir.join(release.file_name());
        let known_size = Some(release.size).filter(|s| *s > 0);
        download(
            &self.client,
            &release.download_url,
            &archive_path,
            known_size,
            &self.progress,
            &self.cancel_flag,
        )?;

        let digest = checksum::sha512sum(&archive_path)?;
        if let Some(remote) = &remote_checksum {
            if !checksum::verify(&digest, remote) {
                return Err(ProvisionError::IntegrityMismatch {
                    archive: archive_path,
                    digest,
                });
            }
        }

        fs::create_dir_all(&extract_root).map_err(|e| {
            ProvisionError::io(format!("Failed to create {}", extract_root.display()), e)
        })?;
        let staging = extract_root.join(format!(".ctup-staging-{}", extract_name));
        remove_dir_quietly(&staging);

        if let Err(e) = archive::extract(&archive_path, &staging, variant.format) {
            remove_dir_quietly(&staging);
            return Err(e);
        }

        let root = staged_root(&staging, &extract_name, variant.naming.has_root());
        let placed = place_staged(&root, &final_path, replace, &digest, &release.version);
        remove_dir_quietly(&staging);
        let installed = placed?;

        self.progress.set(PROGRESS_COMPLETE);
        Ok(installed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_short_sha() {
        assert_eq!(short_sha("a1b2c3d4e5f6"), "a1b2c3d");
        assert_eq!(short_sha("abc"), "abc");
    }

    #[test]
    fn test_place_staged_writes_marker_before_move() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join(".ctup-staging-GE-Proton8-17/GE-Proton8-17");
        fs::create_dir_all(&root).unwrap();
        let final_path = tmp.path().join("GE-Proton8-17");

        let installed = place_staged(&root, &final_path, false, "abc123", "GE-Proton8-17").unwrap();
        assert_eq!(checksum::read_marker(&installed).as_deref(), Some("abc123"));
        assert!(installed.join(crate::installed::VERSION_FILE).is_file());
    }

    #[test]
    fn test_place_staged_failure_leaves_nothing_in_place() {
        let tmp = TempDir::new().unwrap();
        let missing_root = tmp.path().join(".ctup-staging-GE-Proton8-17/GE-Proton8-17");
        let final_path = tmp.path().join("GE-Proton8-17");

        let err = place_staged(&missing_root, &final_path, false, "abc123", "GE-Proton8-17")
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
        assert!(!final_path.exists());
    }

    #[test]
    fn test_staged_root_prefers_expected_name() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("GE-Proton8-17")).unwrap();
        assert_eq!(
            staged_root(tmp.path(), "GE-Proton8-17", true),
            tmp.path().join("GE-Proton8-17")
        );
    }

    #[test]
    fn test_staged_root_falls_back_to_single_directory() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("dxvk-2.3")).unwrap();
        assert_eq!(staged_root(tmp.path(), "dxvk-v2.3", true), tmp.path().join("dxvk-2.3"));

        fs::create_dir_all(tmp.path().join("x64")).unwrap();
        assert_eq!(staged_root(tmp.path(), "dxvk-v2.3", true), tmp.path());
        assert_eq!(staged_root(tmp.path(), "dxvk-git-a1b2c3d", false), tmp.path());
    }
}
