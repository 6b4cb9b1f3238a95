//! SHA-512 integrity checks and the per-install checksum marker

use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::{Digest, Sha512};

use crate::download::BUFFER_SIZE;
use crate::error::{ProvisionError, Result};

/// Marker file written into every successful install (plain hex digest)
pub const MARKER_FILE: &str = "sha512sum";

/// Streams `path` through SHA-512 and returns the lowercase hex digest.
pub fn sha512sum(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| ProvisionError::io(format!("Failed to open {}", path.display()), e))?;
    let mut hasher = Sha512::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let n = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ProvisionError::io(
                    format!("Failed to read {}", path.display()),
                    e,
                ))
            }
        };
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// The remote checksum file may be `<digest>  <filename>` or list several
/// entries, so a substring match is used. An empty digest never matches.
pub fn verify(local_digest: &str, remote_text: &str) -> bool {
    let digest = local_digest.trim();
    !digest.is_empty() && remote_text.contains(digest)
}

pub fn read_marker(install_path: &Path) -> Option<String> {
    let text = fs::read_to_string(install_path.join(MARKER_FILE)).ok()?;
    let digest = text.trim();
    (!digest.is_empty()).then(|| digest.to_string())
}

pub fn write_marker(install_path: &Path, digest: &str) -> Result<()> {
    let marker = install_path.join(MARKER_FILE);
    fs::write(&marker, digest)
        .map_err(|e| ProvisionError::io(format!("Failed to write {}", marker.display()), e))
}

// ============================================================================
// Existing install reconciliation
// ============================================================================

/// State of a target directory relative to the remote checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingInstall {
    /// Nothing at the target path
    Absent,
    /// Marker digest is contained in the remote checksum text
    UpToDate,
    /// Marker and remote checksum both present but different
    Outdated,
    /// Target exists but marker or remote checksum is missing
    Unverifiable,
}

pub fn reconcile(target: &Path, remote_checksum: Option<&str>) -> ExistingInstall {
    if !target.exists() {
        return ExistingInstall::Absent;
    }
    match (read_marker(target), remote_checksum) {
        (Some(local), Some(remote)) if verify(&local, remote) => ExistingInstall::UpToDate,
        (Some(_), Some(_)) => ExistingInstall::Outdated,
        _ => ExistingInstall::Unverifiable,
    }
}
