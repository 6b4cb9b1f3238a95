//! Common test utilities for ctup integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use ctup::config::AccessTokens;
use ctup::ctmods::{find_variant, ToolModule};
use ctup::registry::{Headers, HttpResponse, HttpStream, HttpTransport, RegistryClient};
use ctup::{ProvisionError, Result};
use parking_lot::Mutex;
use sha2::{Digest, Sha512};
use tempfile::TempDir;

const CHUNK: usize = 4096;

// ============================================================================
// In-memory transport
// ============================================================================

/// Serves registry JSON and archive bytes from memory and counts downloads.
#[derive(Default)]
pub struct MemoryTransport {
    texts: Mutex<HashMap<String, HttpResponse>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    downloads: AtomicUsize,
    cancel_on_first_chunk: Mutex<Option<Arc<AtomicBool>>>,
    broken_streams: Mutex<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn text(&self, url: &str, status: u16, body: &str) {
        self.texts.lock().insert(
            url.to_string(),
            HttpResponse {
                status,
                body: body.to_string(),
            },
        );
    }

    pub fn blob(&self, url: &str, bytes: Vec<u8>) {
        self.blobs.lock().insert(url.to_string(), bytes);
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Sets `flag` once the first chunk of the next download was served.
    pub fn cancel_during_download(&self, flag: Arc<AtomicBool>) {
        *self.cancel_on_first_chunk.lock() = Some(flag);
    }

    /// Serves `url` as a stream that fails with a reset after the first chunk.
    pub fn break_stream(&self, url: &str) {
        self.broken_streams.lock().push(url.to_string());
    }
}

struct ChunkedReader {
    data: Cursor<Vec<u8>>,
    trigger: Option<Arc<AtomicBool>>,
    broken: bool,
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.broken && self.data.position() > 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
        }
        let limit = buf.len().min(CHUNK);
        let n = self.data.read(&mut buf[..limit])?;
        if n > 0 {
            if let Some(flag) = self.trigger.take() {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(n)
    }
}

impl HttpTransport for MemoryTransport {
    fn get_text(&self, url: &str, _headers: &Headers) -> Result<HttpResponse> {
        Ok(self.texts.lock().get(url).cloned().unwrap_or(HttpResponse {
            status: 404,
            body: r#"{"message": "Not Found"}"#.to_string(),
        }))
    }

    fn open_stream(&self, url: &str, _headers: &Headers) -> Result<HttpStream> {
        let Some(bytes) = self.blobs.lock().get(url).cloned() else {
            return Err(ProvisionError::network(url, "HTTP 404 Not Found"));
        };
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(HttpStream {
            content_length: Some(bytes.len() as u64),
            reader: Box::new(ChunkedReader {
                data: Cursor::new(bytes),
                trigger: self.cancel_on_first_chunk.lock().take(),
                broken: self.broken_streams.lock().iter().any(|u| u == url),
            }),
        })
    }
}

// ============================================================================
// Archives
// ============================================================================

/// Deterministic filler that does not compress to nothing
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

pub fn tar_of(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::Regular);
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

pub fn xz(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 1);
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

pub fn zst(bytes: &[u8]) -> Vec<u8> {
    zstd::encode_all(bytes, 0).unwrap()
}

pub fn zip_of(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (path, data) in files {
        writer.start_file(*path, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn sha512_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha512::digest(bytes))
}

// ============================================================================
// Registry fixtures
// ============================================================================

pub fn release_json(tag: &str, assets: &[(&str, &str)]) -> String {
    let assets: Vec<serde_json::Value> = assets
        .iter()
        .map(|(name, url)| {
            serde_json::json!({
                "name": name,
                "browser_download_url": url,
                "size": 0,
            })
        })
        .collect();
    serde_json::json!({
        "tag_name": tag,
        "published_at": "2023-09-20T18:33:02Z",
        "assets": assets,
    })
    .to_string()
}

// ============================================================================
// Test environment
// ============================================================================

pub struct TestEnv {
    pub temp: TempDir,
    pub transport: Arc<MemoryTransport>,
    pub progress: Arc<Mutex<Vec<i32>>>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().expect("Failed to create temp directory"),
            transport: MemoryTransport::new(),
            progress: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn home(&self) -> PathBuf {
        self.temp.path().join("home")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp.path().join("tmp")
    }

    /// Install directory below the fake home, e.g. `.local/share/lutris/runners/wine`
    pub fn install_dir(&self, relative: &str) -> PathBuf {
        let dir = self.home().join(relative);
        std::fs::create_dir_all(&dir).expect("Failed to create install directory");
        dir
    }

    pub fn module(&self, variant: &str) -> ToolModule {
        let client = RegistryClient::new(self.transport.clone(), AccessTokens::default());
        let progress = self.progress.clone();
        ToolModule::new(find_variant(variant).expect("unknown variant"), client)
            .with_progress(move |p: i32| progress.lock().push(p))
    }

    pub fn progress(&self) -> Vec<i32> {
        self.progress.lock().clone()
    }
}
