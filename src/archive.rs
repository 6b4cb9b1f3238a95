//! Archive extraction (tar.gz, tar.xz, tar.zst, zip)

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;
use xz2::read::XzDecoder;

use crate::error::{ProvisionError, Result};
use crate::logging::log_install;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    TarZst,
    Zip,
}

impl ArchiveFormat {
    /// Asset name suffix used to pick the download from a release
    pub fn suffix(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarXz => "tar.xz",
            ArchiveFormat::TarZst => "tar.zst",
            ArchiveFormat::Zip => "zip",
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        [
            ArchiveFormat::TarGz,
            ArchiveFormat::TarXz,
            ArchiveFormat::TarZst,
            ArchiveFormat::Zip,
        ]
        .into_iter()
        .find(|f| name.ends_with(&format!(".{}", f.suffix())))
    }
}

fn extraction_error(archive: &Path, reason: impl std::fmt::Display) -> ProvisionError {
    ProvisionError::Extraction {
        archive: archive.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn unpack_tar<R: Read>(reader: R, archive: &Path, target_dir: &Path) -> Result<()> {
    let mut tar = Archive::new(reader);
    tar.set_preserve_mtime(true);
    tar.unpack(target_dir)
        .map_err(|e| extraction_error(archive, e))
}

/// Extracts `archive` into `target_dir`, creating the directory if needed.
///
/// The archive itself is never deleted. Both the archive and the parent of
/// `target_dir` must exist.
pub fn extract(archive: &Path, target_dir: &Path, format: ArchiveFormat) -> Result<()> {
    if !archive.is_file() {
        return Err(extraction_error(archive, "archive does not exist"));
    }
    if let Some(parent) = target_dir.parent() {
        if !parent.is_dir() {
            return Err(extraction_error(
                archive,
                format!("target parent {} does not exist", parent.display()),
            ));
        }
    }
    fs::create_dir_all(target_dir).map_err(|e| {
        ProvisionError::io(format!("Failed to create {}", target_dir.display()), e)
    })?;

    log_install(&format!(
        "Extracting {} into {}",
        archive.display(),
        target_dir.display()
    ));

    let file = File::open(archive)
        .map_err(|e| ProvisionError::io(format!("Failed to open {}", archive.display()), e))?;
    let reader = BufReader::new(file);

    match format {
        ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(reader), archive, target_dir),
        ArchiveFormat::TarXz => unpack_tar(XzDecoder::new(reader), archive, target_dir),
        ArchiveFormat::TarZst => {
            let decoder = zstd::stream::read::Decoder::new(reader)
                .map_err(|e| extraction_error(archive, e))?;
            unpack_tar(decoder, archive, target_dir)
        }
        ArchiveFormat::Zip => {
            let mut zip =
                zip::ZipArchive::new(reader).map_err(|e| extraction_error(archive, e))?;
            zip.extract(target_dir)
                .map_err(|e| extraction_error(archive, e))
        }
    }
}
