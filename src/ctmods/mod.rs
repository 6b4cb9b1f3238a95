//! Compatibility tool modules
//!
//! Every variant in `VARIANTS` is served by one `ToolModule` running the
//! shared provisioning pipeline. Callers talk to modules through the
//! `CompatTool` capability.

mod pipeline;
mod variants;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use variants::{
    find_variant, variants_for_launcher, ExistingPolicy, ExtractTarget, Source, ToolVariant,
    VARIANTS,
};

use crate::download::{ProgressReporter, ProgressSink};
use crate::error::{ProvisionError, Result};
use crate::logging::{log_error, log_info, log_install};
use crate::registry::RegistryClient;
use crate::resolver::list_versions;

// ============================================================================
// Capability
// ============================================================================

pub trait CompatTool: Send + Sync {
    fn name(&self) -> &str;

    fn is_system_compatible(&self) -> bool;

    /// One page of version identifiers, newest first.
    fn fetch_releases(&self, count: u32, page: u32) -> Result<Vec<String>>;

    /// Installs `version` (latest when empty) and returns the final directory.
    fn get_tool(&self, version: &str, install_dir: &Path, temp_dir: &Path) -> Result<PathBuf>;

    fn get_info_url(&self, version: &str) -> String;

    fn set_progress_sink(&self, sink: Arc<dyn ProgressSink>);

    /// Requests cancellation of the running download.
    fn cancel(&self);
}

// ============================================================================
// Tool Module
// ============================================================================

/// Clears the busy flag when the pipeline returns
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool, tool: &str) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ProvisionError::Busy {
                tool: tool.to_string(),
            })?;
        Ok(BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ToolModule {
    variant: &'static ToolVariant,
    client: RegistryClient,
    cancel_flag: Arc<AtomicBool>,
    busy: AtomicBool,
    progress: ProgressReporter,
}

impl ToolModule {
    pub fn new(variant: &'static ToolVariant, client: RegistryClient) -> Self {
        Self {
            variant,
            client,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            busy: AtomicBool::new(false),
            progress: ProgressReporter::default(),
        }
    }

    pub fn with_progress(self, sink: impl ProgressSink + 'static) -> Self {
        self.progress.set_sink(Arc::new(sink));
        self
    }

    pub fn variant(&self) -> &'static ToolVariant {
        self.variant
    }

    /// Shared cancellation flag, e.g. for a signal handler.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

impl CompatTool for ToolModule {
    fn name(&self) -> &str {
        self.variant.name
    }

    fn is_system_compatible(&self) -> bool {
        true
    }

    fn fetch_releases(&self, count: u32, page: u32) -> Result<Vec<String>> {
        match self.variant.source {
            Source::Releases { api_url } => list_versions(api_url, &self.client, count, page),
            Source::CiArtifacts { api_url, branch, .. } => {
                let mut versions: Vec<String> = Vec::new();
                for artifact in self.client.list_artifacts(api_url, count, page)? {
                    if artifact.expired || artifact.workflow_run.head_branch != branch {
                        continue;
                    }
                    let short = pipeline::short_sha(&artifact.workflow_run.head_sha);
                    if !versions.contains(&short) {
                        versions.push(short);
                    }
                }
                Ok(versions)
            }
            Source::Branch { branch, .. } => Ok(vec![branch.to_string()]),
        }
    }

    fn get_tool(&self, version: &str, install_dir: &Path, temp_dir: &Path) -> Result<PathBuf> {
        if !self.is_system_compatible() {
            return Err(ProvisionError::Incompatible {
                tool: self.variant.name.to_string(),
            });
        }
        let _guard = BusyGuard::acquire(&self.busy, self.variant.name)?;

        let result = self.provision(version, install_dir, temp_dir);
        match &result {
            Ok(path) => log_install(&format!(
                "{} installed to {}",
                self.variant.name,
                path.display()
            )),
            Err(e) if e.is_benign() => log_info(&format!("{}: {}", self.variant.name, e)),
            Err(e) => {
                self.progress.set(crate::download::PROGRESS_FAILED);
                log_error(&format!("{} install failed: {}", self.variant.name, e));
            }
        }
        result
    }

    fn get_info_url(&self, version: &str) -> String {
        match self.variant.source {
            Source::Branch { .. } => self.variant.info_url.to_string(),
            _ => format!("{}{}", self.variant.info_url, version),
        }
    }

    fn set_progress_sink(&self, sink: Arc<dyn ProgressSink>) {
        self.progress.set_sink(sink);
    }

    fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }
}

/// One module per known variant, all sharing `client`.
pub fn load_modules(client: &RegistryClient) -> Vec<Arc<ToolModule>> {
    VARIANTS
        .iter()
        .map(|v| Arc::new(ToolModule::new(v, client.clone())))
        .collect()
}
