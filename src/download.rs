//! Streaming downloader with percentage progress and cooperative cancellation
//!
//! Progress values:
//! - `1` transfer started, `2..=98` proportional progress
//! - `99` all bytes received, post-processing pending
//! - `100` installed (set by the pipeline after extraction, never here)
//! - `-1` failed, `-2` cancelled

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ProvisionError, Result};
use crate::logging::{log_download, log_info};
use crate::registry::RegistryClient;

pub const BUFFER_SIZE: usize = 65536;

pub const PROGRESS_STARTED: i32 = 1;
pub const PROGRESS_MAX_PROPORTIONAL: i32 = 98;
pub const PROGRESS_RECEIVED: i32 = 99;
pub const PROGRESS_COMPLETE: i32 = 100;
pub const PROGRESS_FAILED: i32 = -1;
pub const PROGRESS_CANCELLED: i32 = -2;

// ============================================================================
// Progress Reporting
// ============================================================================

/// Observer for progress percentages
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: i32);
}

impl<F> ProgressSink for F
where
    F: Fn(i32) + Send + Sync,
{
    fn report(&self, percent: i32) {
        self(percent)
    }
}

/// Forwards progress to a sink, dropping repeats and backwards steps.
///
/// Negative sentinels are always forwarded and end the session; `begin()`
/// starts a new one.
pub struct ProgressReporter {
    sink: RwLock<Arc<dyn ProgressSink>>,
    last: AtomicI32,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(Arc::new(|_: i32| {}))
    }
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink: RwLock::new(sink),
            last: AtomicI32::new(0),
        }
    }

    pub fn set_sink(&self, sink: Arc<dyn ProgressSink>) {
        *self.sink.write() = sink;
    }

    pub fn begin(&self) {
        self.last.store(0, Ordering::SeqCst);
    }

    pub fn set(&self, value: i32) {
        let last = self.last.load(Ordering::SeqCst);
        if value == last {
            return;
        }
        if value >= 0 && (last < 0 || value < last) {
            return;
        }
        self.last.store(value, Ordering::SeqCst);
        self.sink.read().report(value);
    }

    pub fn last(&self) -> i32 {
        self.last.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Download Session
// ============================================================================

/// Transient state of one in-flight transfer
#[derive(Debug, Clone)]
pub struct DownloadSession {
    pub destination: PathBuf,
    pub bytes_total: Option<u64>,
    pub bytes_transferred: u64,
}

impl DownloadSession {
    /// Proportional progress in `1..=98`, or `None` when the size is unknown.
    pub fn percent(&self) -> Option<i32> {
        let total = self.bytes_total.filter(|t| *t > 0)?;
        let pct = self.bytes_transferred.saturating_mul(PROGRESS_MAX_PROPORTIONAL as u64) / total;
        let pct = i32::try_from(pct).unwrap_or(PROGRESS_MAX_PROPORTIONAL);
        Some(pct.clamp(PROGRESS_STARTED, PROGRESS_MAX_PROPORTIONAL))
    }
}

/// Streams `url` to `destination` in `BUFFER_SIZE` chunks.
///
/// `cancel` is polled once per chunk; when set it is cleared, `-2` is reported
/// and `ProvisionError::Cancelled` returned. The partial file is left in place.
pub fn download(
    client: &RegistryClient,
    url: &str,
    destination: &Path,
    known_size: Option<u64>,
    progress: &ProgressReporter,
    cancel: &AtomicBool,
) -> Result<DownloadSession> {
    log_download(&format!("Downloading {} -> {}", url, destination.display()));

    let stream = client.open_download(url)?;
    progress.set(PROGRESS_STARTED);

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ProvisionError::io(format!("Failed to create {}", parent.display()), e)
        })?;
    }
    let mut file = File::create(destination).map_err(|e| {
        ProvisionError::io(format!("Failed to create {}", destination.display()), e)
    })?;

    let mut session = DownloadSession {
        destination: destination.to_path_buf(),
        bytes_total: stream.content_length.or(known_size),
        bytes_transferred: 0,
    };
    let mut reader = stream.reader;
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        if cancel.swap(false, Ordering::SeqCst) {
            progress.set(PROGRESS_CANCELLED);
            log_info(&format!("Download of {} cancelled", url));
            return Err(ProvisionError::Cancelled);
        }

        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProvisionError::network(url, e)),
        };

        file.write_all(&buffer[..bytes_read]).map_err(|e| {
            ProvisionError::io(format!("Failed to write {}", destination.display()), e)
        })?;
        session.bytes_transferred += bytes_read as u64;

        if let Some(pct) = session.percent() {
            progress.set(pct);
        }
    }

    file.flush()?;
    progress.set(PROGRESS_RECEIVED);
    log_download(&format!(
        "Received {} bytes for {}",
        session.bytes_transferred,
        destination.display()
    ));
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording() -> (ProgressReporter, Arc<Mutex<Vec<i32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(Arc::new(move |p: i32| sink.lock().push(p)));
        (reporter, seen)
    }

    #[test]
    fn test_reporter_is_monotonic() {
        let (reporter, seen) = recording();
        for v in [1, 5, 5, 3, 40, 98, 99, 50, 100] {
            reporter.set(v);
        }
        assert_eq!(*seen.lock(), vec![1, 5, 40, 98, 99, 100]);
    }

    #[test]
    fn test_cancel_sentinel_is_terminal() {
        let (reporter, seen) = recording();
        reporter.set(1);
        reporter.set(20);
        reporter.set(PROGRESS_CANCELLED);
        reporter.set(30);
        assert_eq!(*seen.lock(), vec![1, 20, -2]);

        reporter.begin();
        reporter.set(1);
        assert_eq!(seen.lock().last(), Some(&1));
    }

    #[test]
    fn test_session_percent() {
        let mut session = DownloadSession {
            destination: PathBuf::from("/tmp/x.tar.gz"),
            bytes_total: Some(1000),
            bytes_transferred: 0,
        };
        assert_eq!(session.percent(), Some(1));
        session.bytes_transferred = 500;
        assert_eq!(session.percent(), Some(49));
        session.bytes_transferred = 1000;
        assert_eq!(session.percent(), Some(98));
        session.bytes_transferred = u64::MAX;
        assert_eq!(session.percent(), Some(98));
        session.bytes_total = None;
        assert_eq!(session.percent(), None);
    }
}
