//! HTTP transport used by the registry client and the downloader

use std::io::Read;
use std::time::Duration;

use super::Headers;
use crate::error::{ProvisionError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffered text response. Non-2xx statuses are returned, not raised.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Streaming body of a successful response
pub struct HttpStream {
    pub content_length: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

pub trait HttpTransport: Send + Sync {
    fn get_text(&self, url: &str, headers: &Headers) -> Result<HttpResponse>;

    /// Opens a body stream; any non-2xx status is a network failure.
    fn open_stream(&self, url: &str, headers: &Headers) -> Result<HttpStream>;
}

// ============================================================================
// ureq implementation
// ============================================================================

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .user_agent(concat!("ctup/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }

    fn call(&self, url: &str, headers: &Headers) -> std::result::Result<ureq::Response, ureq::Error> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }
        request.call()
    }
}

impl HttpTransport for UreqTransport {
    fn get_text(&self, url: &str, headers: &Headers) -> Result<HttpResponse> {
        let response = match self.call(url, headers) {
            Ok(r) => r,
            Err(ureq::Error::Status(_, r)) => r,
            Err(ureq::Error::Transport(t)) => return Err(ProvisionError::network(url, t)),
        };
        let status = response.status();
        let body = response
            .into_string()
            .map_err(|e| ProvisionError::network(url, e))?;
        Ok(HttpResponse { status, body })
    }

    fn open_stream(&self, url: &str, headers: &Headers) -> Result<HttpStream> {
        let response = match self.call(url, headers) {
            Ok(r) => r,
            Err(ureq::Error::Status(code, r)) => {
                return Err(ProvisionError::network(
                    url,
                    format!("HTTP {} {}", code, r.status_text()),
                ))
            }
            Err(ureq::Error::Transport(t)) => return Err(ProvisionError::network(url, t)),
        };

        let content_length = response
            .header("Content-Length")
            .and_then(|s| s.parse::<u64>().ok());

        Ok(HttpStream {
            content_length,
            reader: Box::new(response.into_reader()),
        })
    }
}

/// Returns false on connection errors or timeouts, true for any HTTP response.
pub fn is_online(url: &str, timeout: Duration) -> bool {
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    match agent.get(url).call() {
        Ok(_) | Err(ureq::Error::Status(..)) => true,
        Err(ureq::Error::Transport(_)) => false,
    }
}
