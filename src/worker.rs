//! Background install worker
//!
//! Runs `get_tool` calls one at a time, in submission order, on a thread of
//! its own. Progress and completion are pushed to the caller as
//! `WorkerEvent`s.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::ctmods::CompatTool;
use crate::error::Result;
use crate::logging::log_info;

pub struct InstallRequest {
    pub module: Arc<dyn CompatTool>,
    /// Empty for the latest release
    pub version: String,
    pub install_dir: PathBuf,
    pub temp_dir: PathBuf,
}

#[derive(Debug)]
pub enum WorkerEvent {
    Started { tool: String, version: String },
    Progress { tool: String, percent: i32 },
    Finished {
        tool: String,
        version: String,
        result: Result<PathBuf>,
    },
}

pub struct InstallWorker {
    queue: Option<Sender<InstallRequest>>,
    handle: Option<JoinHandle<()>>,
}

fn run(requests: Receiver<InstallRequest>, observer: Sender<WorkerEvent>) {
    for request in requests {
        let tool = request.module.name().to_string();
        let _ = observer.send(WorkerEvent::Started {
            tool: tool.clone(),
            version: request.version.clone(),
        });

        let progress_tx = observer.clone();
        let progress_tool = tool.clone();
        request.module.set_progress_sink(Arc::new(move |percent: i32| {
            let _ = progress_tx.send(WorkerEvent::Progress {
                tool: progress_tool.clone(),
                percent,
            });
        }));

        let result = request
            .module
            .get_tool(&request.version, &request.install_dir, &request.temp_dir);

        let _ = observer.send(WorkerEvent::Finished {
            tool,
            version: request.version,
            result,
        });
    }
    log_info("Install worker stopped");
}

impl InstallWorker {
    pub fn spawn(observer: Sender<WorkerEvent>) -> Self {
        let (queue, requests) = mpsc::channel();
        let handle = thread::spawn(move || run(requests, observer));
        Self {
            queue: Some(queue),
            handle: Some(handle),
        }
    }

    /// Queues a request. Returns `false` if the worker has stopped.
    pub fn submit(&self, request: InstallRequest) -> bool {
        self.queue
            .as_ref()
            .is_some_and(|q| q.send(request).is_ok())
    }

    /// Finishes the queued requests, then joins the worker thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.queue.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for InstallWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::ProgressSink;
    use crate::error::ProvisionError;
    use parking_lot::Mutex;
    use std::path::Path;

    struct FakeTool {
        sink: Mutex<Option<Arc<dyn ProgressSink>>>,
    }

    impl CompatTool for FakeTool {
        fn name(&self) -> &str {
            "Fake"
        }

        fn is_system_compatible(&self) -> bool {
            true
        }

        fn fetch_releases(&self, _count: u32, _page: u32) -> Result<Vec<String>> {
            Ok(vec!["1.0".to_string()])
        }

        fn get_tool(&self, version: &str, install_dir: &Path, _temp_dir: &Path) -> Result<PathBuf> {
            if let Some(sink) = self.sink.lock().as_ref() {
                sink.report(1);
                sink.report(100);
            }
            if version == "missing" {
                return Err(ProvisionError::Unavailable {
                    tool: "Fake".to_string(),
                    version: version.to_string(),
                });
            }
            Ok(install_dir.join(version))
        }

        fn get_info_url(&self, version: &str) -> String {
            format!("https://example.com/{}", version)
        }

        fn set_progress_sink(&self, sink: Arc<dyn ProgressSink>) {
            *self.sink.lock() = Some(sink);
        }

        fn cancel(&self) {}
    }

    fn request(module: &Arc<dyn CompatTool>, version: &str) -> InstallRequest {
        InstallRequest {
            module: module.clone(),
            version: version.to_string(),
            install_dir: PathBuf::from("/tools"),
            temp_dir: PathBuf::from("/tmp"),
        }
    }

    #[test]
    fn test_requests_run_in_order_with_events() {
        let module: Arc<dyn CompatTool> = Arc::new(FakeTool {
            sink: Mutex::new(None),
        });
        let (tx, rx) = mpsc::channel();
        let worker = InstallWorker::spawn(tx);

        assert!(worker.submit(request(&module, "1.0")));
        assert!(worker.submit(request(&module, "missing")));
        worker.shutdown();

        let events: Vec<WorkerEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 8);
        assert!(matches!(&events[0], WorkerEvent::Started { version, .. } if version == "1.0"));
        assert!(matches!(events[1], WorkerEvent::Progress { percent: 1, .. }));
        assert!(matches!(events[2], WorkerEvent::Progress { percent: 100, .. }));
        match &events[3] {
            WorkerEvent::Finished { result, .. } => {
                assert_eq!(result.as_ref().unwrap(), &PathBuf::from("/tools/1.0"))
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(&events[4], WorkerEvent::Started { version, .. } if version == "missing"));
        match &events[7] {
            WorkerEvent::Finished { result, .. } => {
                assert!(result.as_ref().unwrap_err().is_benign())
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
