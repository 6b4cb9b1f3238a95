//! Error taxonomy for the provisioning pipeline
//!
//! Every failure of `get_tool` / `fetch_releases` is returned as a
//! `ProvisionError` value. The GUI layer renders `kind()` + `Display`.

use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Error Kind
// ============================================================================

/// Coarse classification of a provisioning failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unavailable,
    AlreadyInstalled,
    RateLimited,
    NetworkFailure,
    IntegrityMismatch,
    ExtractionFailure,
    CancelledByUser,
    RefusedOverwrite,
    Busy,
    Incompatible,
    Io,
}

// ============================================================================
// Provision Error
// ============================================================================

#[derive(Debug)]
pub enum ProvisionError {
    /// The requested version has no matching asset for this tool
    Unavailable { tool: String, version: String },
    /// The target is already installed and matches the remote checksum
    AlreadyInstalled { path: PathBuf },
    /// The registry signaled throttling
    RateLimited { host: String },
    /// Connection error, timeout or non-2xx response
    Network { url: String, reason: String },
    /// Downloaded digest is absent from the remote checksum text
    IntegrityMismatch { archive: PathBuf, digest: String },
    /// Archive truncated, corrupt or otherwise not extractable
    Extraction { archive: PathBuf, reason: String },
    /// The downloader observed the cancellation flag
    Cancelled,
    /// Target exists but cannot be reconciled against a remote checksum
    RefusedOverwrite { path: PathBuf },
    /// A download is already active on this module instance
    Busy { tool: String },
    /// System requirements of the tool are not met
    Incompatible { tool: String },
    /// Local filesystem error with context
    Io { context: String, source: std::io::Error },
}

impl ProvisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProvisionError::Unavailable { .. } => ErrorKind::Unavailable,
            ProvisionError::AlreadyInstalled { .. } => ErrorKind::AlreadyInstalled,
            ProvisionError::RateLimited { .. } => ErrorKind::RateLimited,
            ProvisionError::Network { .. } => ErrorKind::NetworkFailure,
            ProvisionError::IntegrityMismatch { .. } => ErrorKind::IntegrityMismatch,
            ProvisionError::Extraction { .. } => ErrorKind::ExtractionFailure,
            ProvisionError::Cancelled => ErrorKind::CancelledByUser,
            ProvisionError::RefusedOverwrite { .. } => ErrorKind::RefusedOverwrite,
            ProvisionError::Busy { .. } => ErrorKind::Busy,
            ProvisionError::Incompatible { .. } => ErrorKind::Incompatible,
            ProvisionError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Outcomes that are not failures of the pipeline itself.
    pub fn is_benign(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Unavailable | ErrorKind::AlreadyInstalled | ErrorKind::CancelledByUser
        )
    }

    pub fn network(url: &str, reason: impl fmt::Display) -> Self {
        ProvisionError::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ProvisionError::Io {
            context: context.into(),
            source,
        }
    }
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::Unavailable { tool, version } => {
                write!(f, "{} {} is not available for download", tool, version)
            }
            ProvisionError::AlreadyInstalled { path } => {
                write!(f, "Already installed and up to date: {}", path.display())
            }
            ProvisionError::RateLimited { host } => write!(
                f,
                "API rate limit exceeded for {}. Wait a while or configure an access token.",
                host
            ),
            ProvisionError::Network { url, reason } => {
                write!(f, "Network error for {}: {}", url, reason)
            }
            ProvisionError::IntegrityMismatch { archive, digest } => write!(
                f,
                "Checksum mismatch for {} (sha512 {})",
                archive.display(),
                digest
            ),
            ProvisionError::Extraction { archive, reason } => {
                write!(f, "Failed to extract {}: {}", archive.display(), reason)
            }
            ProvisionError::Cancelled => write!(f, "Download cancelled by user"),
            ProvisionError::RefusedOverwrite { path } => write!(
                f,
                "Refusing to overwrite {}: existing installation cannot be verified",
                path.display()
            ),
            ProvisionError::Busy { tool } => {
                write!(f, "A download of {} is already in progress", tool)
            }
            ProvisionError::Incompatible { tool } => {
                write!(f, "{} is not compatible with this system", tool)
            }
            ProvisionError::Io { context, source } => write!(f, "{}: {}", context, source),
        }
    }
}

impl std::error::Error for ProvisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProvisionError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProvisionError {
    fn from(e: std::io::Error) -> Self {
        ProvisionError::Io {
            context: "I/O error".to_string(),
            source: e,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
