//! Release registry client
//!
//! Talks to GitHub-style and GitLab-style release APIs: explicit pagination,
//! per-family authorization, and rate-limit classification from response
//! bodies (some providers answer 200 with an error body).

mod transport;
mod types;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use transport::{is_online, HttpResponse, HttpStream, HttpTransport, UreqTransport};
pub use types::{Artifact, ArtifactList, Asset, Release, WorkflowRun};

use crate::config::AccessTokens;
use crate::error::{ProvisionError, Result};
use crate::logging::log_warning;
use types::GitlabRelease;

pub type Headers = BTreeMap<String, String>;

/// Known GitLab instances (GitLab can be self-hosted, so this is a list)
pub const GITLAB_HOSTS: &[&str] = &["gitlab.com"];

pub const GITHUB_RATELIMIT_TEXT: &str = "API rate limit exceeded";

pub const GITLAB_RATELIMIT_TEXT: &[&str] = &[
    "Rate limit exceeded; see https://docs.gitlab.com/ee/user/gitlab_com/#gitlabcom-specific-rate-limits for more details",
    "Rate limit exceeded",
    "Retry later",
];

// ============================================================================
// Host Family
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFamily {
    GitHub,
    GitLab,
    Unknown,
}

impl HostFamily {
    pub fn from_url(url: &str) -> Self {
        let host = url
            .split("://")
            .nth(1)
            .unwrap_or(url)
            .split('/')
            .next()
            .unwrap_or_default()
            .to_lowercase();

        if host == "github.com" || host == "api.github.com" {
            HostFamily::GitHub
        } else if GITLAB_HOSTS.contains(&host.as_str()) {
            HostFamily::GitLab
        } else {
            HostFamily::Unknown
        }
    }

    fn host_name(&self) -> &'static str {
        match self {
            HostFamily::GitHub => "GitHub",
            HostFamily::GitLab => "GitLab",
            HostFamily::Unknown => "registry",
        }
    }
}

/// Returns a copy of `headers` with `Authorization` set for the given host family.
///
/// An existing `Authorization` entry (any casing) is replaced, all other headers are kept.
/// Without a token for the family the header is omitted.
pub fn build_headers_with_authorization(
    headers: &Headers,
    tokens: &AccessTokens,
    family: HostFamily,
) -> Headers {
    let mut out: Headers = headers
        .iter()
        .filter(|(k, _)| !k.eq_ignore_ascii_case("authorization"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    match (family, tokens.for_family(family)) {
        (HostFamily::GitHub, Some(token)) if !token.is_empty() => {
            out.insert("Authorization".to_string(), format!("token {}", token));
        }
        (HostFamily::GitLab, Some(token)) if !token.is_empty() => {
            out.insert("Authorization".to_string(), format!("Bearer {}", token));
        }
        _ => {}
    }

    out
}

/// Classifies a response body as a rate-limit signal for the given host family.
pub fn is_rate_limited(family: HostFamily, body: &str) -> bool {
    let github_limited = || {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .is_some_and(|m| m.contains(GITHUB_RATELIMIT_TEXT))
    };
    let gitlab_limited = || GITLAB_RATELIMIT_TEXT.iter().any(|t| body.contains(t));

    match family {
        HostFamily::GitHub => github_limited(),
        HostFamily::GitLab => gitlab_limited(),
        HostFamily::Unknown => github_limited() || gitlab_limited(),
    }
}

// ============================================================================
// Registry Client
// ============================================================================

#[derive(Clone)]
pub struct RegistryClient {
    transport: Arc<dyn HttpTransport>,
    tokens: AccessTokens,
    base_headers: Headers,
}

impl RegistryClient {
    pub fn new(transport: Arc<dyn HttpTransport>, tokens: AccessTokens) -> Self {
        Self {
            transport,
            tokens,
            base_headers: Headers::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.base_headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    fn api_get(&self, url: &str) -> Result<Option<String>> {
        let family = HostFamily::from_url(url);
        let headers = build_headers_with_authorization(&self.base_headers, &self.tokens, family);
        let response = self.transport.get_text(url, &headers)?;

        if is_rate_limited(family, &response.body) {
            log_warning(&format!(
                "{} API rate limit exceeded. Wait a while or set an access token.",
                family.host_name()
            ));
            return Err(ProvisionError::RateLimited {
                host: family.host_name().to_string(),
            });
        }

        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(ProvisionError::network(url, format!("HTTP {}", response.status)));
        }
        Ok(Some(response.body))
    }

    /// Lists one page of releases, newest first.
    pub fn list_releases(&self, base_url: &str, page: u32, per_page: u32) -> Result<Vec<Release>> {
        let url = format!("{}?per_page={}&page={}", base_url, per_page, page);
        let Some(body) = self.api_get(&url)? else {
            return Ok(Vec::new());
        };

        match HostFamily::from_url(base_url) {
            HostFamily::GitLab => serde_json::from_str::<Vec<GitlabRelease>>(&body)
                .map(|r| r.into_iter().map(Release::from).collect()),
            _ => serde_json::from_str::<Vec<Release>>(&body),
        }
        .map_err(|e| ProvisionError::network(&url, format!("malformed release list: {}", e)))
    }

    /// Fetches a single release by tag, or the latest one when `tag` is `None`.
    ///
    /// Returns `Ok(None)` when the registry has no such release.
    pub fn get_release(&self, base_url: &str, tag: Option<&str>) -> Result<Option<Release>> {
        let family = HostFamily::from_url(base_url);
        let url = match (family, tag) {
            (HostFamily::GitLab, Some(tag)) => format!("{}/{}", base_url, tag),
            (HostFamily::GitLab, None) => format!("{}/permalink/latest", base_url),
            (_, Some(tag)) => format!("{}/tags/{}", base_url, tag),
            (_, None) => format!("{}/latest", base_url),
        };

        let Some(body) = self.api_get(&url)? else {
            return Ok(None);
        };

        let malformed = |e: serde_json::Error| {
            ProvisionError::network(&url, format!("malformed release: {}", e))
        };
        let value: serde_json::Value = serde_json::from_str(&body).map_err(malformed)?;
        // Some registries answer an unknown tag with an object carrying only a message
        if value.is_object() && value.get("tag_name").is_none() {
            return Ok(None);
        }

        let release = match family {
            HostFamily::GitLab => serde_json::from_value::<GitlabRelease>(value).map(Release::from),
            _ => serde_json::from_value::<Release>(value),
        }
        .map_err(malformed)?;
        Ok(Some(release))
    }

    /// Lists one page of CI artifacts.
    pub fn list_artifacts(&self, base_url: &str, per_page: u32, page: u32) -> Result<Vec<Artifact>> {
        let url = format!("{}?per_page={}&page={}", base_url, per_page, page);
        let Some(body) = self.api_get(&url)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str::<ArtifactList>(&body)
            .map(|list| list.artifacts)
            .map_err(|e| ProvisionError::network(&url, format!("malformed artifact list: {}", e)))
    }

    /// Downloads a small text file such as a checksum list.
    pub fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.transport.get_text(url, &self.base_headers)?;
        if !response.is_success() {
            return Err(ProvisionError::network(url, format!("HTTP {}", response.status)));
        }
        Ok(response.body)
    }

    /// Opens an asset download. Asset hosts never receive the API token.
    pub fn open_download(&self, url: &str) -> Result<HttpStream> {
        self.transport.open_stream(url, &self.base_headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct StubTransport {
        responses: HashMap<String, HttpResponse>,
        seen_headers: Mutex<Vec<Headers>>,
    }

    impl StubTransport {
        fn with(mut self, url: &str, status: u16, body: &str) -> Self {
            self.responses.insert(
                url.to_string(),
                HttpResponse {
                    status,
                    body: body.to_string(),
                },
            );
            self
        }
    }

    impl HttpTransport for StubTransport {
        fn get_text(&self, url: &str, headers: &Headers) -> Result<HttpResponse> {
            self.seen_headers.lock().push(headers.clone());
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| ProvisionError::network(url, "connection refused"))
        }

        fn open_stream(&self, url: &str, _headers: &Headers) -> Result<HttpStream> {
            Err(ProvisionError::network(url, "not used"))
        }
    }

    const GH: &str = "https://api.github.com/repos/GloriousEggroll/proton-ge-custom/releases";
    const GL: &str = "https://gitlab.com/api/v4/projects/123/releases";

    #[test]
    fn test_build_headers_with_authorization() {
        let user_agent = "Mozilla/5.0 (X11; Linux x86_64)";
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), "ABC123".to_string());
        headers.insert("User-Agent".to_string(), user_agent.to_string());

        let tokens = AccessTokens {
            github: Some("gha_abc123daf456".to_string()),
            gitlab: Some("glpat-zyx987wvu654".to_string()),
        };

        let github = build_headers_with_authorization(&headers, &tokens, HostFamily::GitHub);
        let gitlab = build_headers_with_authorization(&headers, &tokens, HostFamily::GitLab);
        let unknown = build_headers_with_authorization(&headers, &tokens, HostFamily::Unknown);
        let no_tokens =
            build_headers_with_authorization(&headers, &AccessTokens::default(), HostFamily::GitHub);

        assert_eq!(github.get("Authorization").unwrap(), "token gha_abc123daf456");
        assert_eq!(gitlab.get("Authorization").unwrap(), "Bearer glpat-zyx987wvu654");
        assert!(unknown.get("Authorization").is_none());
        assert!(no_tokens.get("Authorization").is_none());
        assert_eq!(github.get("User-Agent").unwrap(), user_agent);
        assert_eq!(github.len(), 2);
    }

    #[test]
    fn test_authorization_replaced_case_insensitively() {
        let mut headers = Headers::new();
        headers.insert("authorization".to_string(), "old".to_string());
        let tokens = AccessTokens {
            github: Some("new".to_string()),
            gitlab: None,
        };
        let out = build_headers_with_authorization(&headers, &tokens, HostFamily::GitHub);
        assert_eq!(out.len(), 1);
        assert_eq!(out.get("Authorization").unwrap(), "token new");
    }

    #[test]
    fn test_host_family_from_url() {
        assert_eq!(HostFamily::from_url(GH), HostFamily::GitHub);
        assert_eq!(
            HostFamily::from_url("https://github.com/Scrumplex/Steam-Play-None/archive/refs/heads/main.tar.gz"),
            HostFamily::GitHub
        );
        assert_eq!(HostFamily::from_url(GL), HostFamily::GitLab);
        assert_eq!(HostFamily::from_url("https://nightly.link/x"), HostFamily::Unknown);
    }

    #[test]
    fn test_rate_limit_phrase_on_200_is_rate_limited() {
        let url = format!("{}?per_page=10&page=1", GL);
        let transport = StubTransport::default().with(&url, 200, "Rate limit exceeded");
        let client = RegistryClient::new(Arc::new(transport), AccessTokens::default());

        let err = client.list_releases(GL, 1, 10).unwrap_err();
        assert!(matches!(err, ProvisionError::RateLimited { .. }));
    }

    #[test]
    fn test_github_rate_limit_message() {
        let body = r#"{"message": "API rate limit exceeded for 127.0.0.1.", "documentation_url": "https://docs.github.com"}"#;
        assert!(is_rate_limited(HostFamily::GitHub, body));
        assert!(!is_rate_limited(HostFamily::GitHub, r#"[{"tag_name": "GE-Proton8-17", "body": "Retry later"}]"#));
        assert!(!is_rate_limited(HostFamily::GitLab, "[]"));
    }

    #[test]
    fn test_non_success_without_phrase_is_network_error() {
        let url = format!("{}?per_page=10&page=1", GH);
        let transport = StubTransport::default().with(&url, 500, "Internal Server Error");
        let client = RegistryClient::new(Arc::new(transport), AccessTokens::default());

        let err = client.list_releases(GH, 1, 10).unwrap_err();
        assert!(matches!(err, ProvisionError::Network { .. }));
    }

    #[test]
    fn test_get_release_urls_and_not_found() {
        let latest = r#"{"tag_name": "GE-Proton8-17", "published_at": "2023-10-01T12:00:00Z", "assets": []}"#;
        let transport = StubTransport::default()
            .with(&format!("{}/latest", GH), 200, latest)
            .with(&format!("{}/tags/nope", GH), 404, r#"{"message": "Not Found"}"#);
        let client = RegistryClient::new(Arc::new(transport), AccessTokens::default());

        let release = client.get_release(GH, None).unwrap().unwrap();
        assert_eq!(release.tag_name, "GE-Proton8-17");
        assert!(client.get_release(GH, Some("nope")).unwrap().is_none());
    }

    #[test]
    fn test_unparsable_release_is_network_error() {
        let transport = StubTransport::default()
            .with(&format!("{}/tags/GE-Proton8-17", GH), 200, "<html>502 Bad Gateway</html>")
            .with(&format!("{}/tags/GE-Proton8-16", GH), 200, r#"{"tag_name": "GE-Proton8-16", "assets": {"#)
            .with(&format!("{}/tags/GE-Proton8-15", GH), 200, r#"{"message": "Not Found"}"#);
        let client = RegistryClient::new(Arc::new(transport), AccessTokens::default());

        for tag in ["GE-Proton8-17", "GE-Proton8-16"] {
            let err = client.get_release(GH, Some(tag)).unwrap_err();
            assert!(matches!(err, ProvisionError::Network { .. }), "{}", tag);
            assert!(!err.is_benign());
        }
        assert!(client.get_release(GH, Some("GE-Proton8-15")).unwrap().is_none());
    }

    #[test]
    fn test_gitlab_release_list_is_normalized() {
        let body = r#"[{"tag_name": "v1.0", "released_at": "2024-01-02T00:00:00Z",
            "assets": {"links": [{"name": "tool-v1.0.tar.xz", "url": "https://gitlab.com/x/tool-v1.0.tar.xz"}]}}]"#;
        let url = format!("{}?per_page=5&page=2", GL);
        let transport = StubTransport::default().with(&url, 200, body);
        let tokens = AccessTokens {
            github: None,
            gitlab: Some("glpat".to_string()),
        };
        let client = RegistryClient::new(Arc::new(transport), tokens);

        let releases = client.list_releases(GL, 2, 5).unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].assets[0].download_url, "https://gitlab.com/x/tool-v1.0.tar.xz");
        assert_eq!(releases[0].published_at.as_deref(), Some("2024-01-02T00:00:00Z"));
    }

    #[test]
    fn test_api_requests_carry_token_but_downloads_do_not() {
        let url = format!("{}?per_page=1&page=1", GH);
        let transport = Arc::new(
            StubTransport::default()
                .with(&url, 200, "[]")
                .with("https://example.com/GE-Proton8-17.sha512sum", 200, "abc  x.tar.gz"),
        );
        let tokens = AccessTokens {
            github: Some("gha".to_string()),
            gitlab: None,
        };
        let client = RegistryClient::new(transport.clone(), tokens);

        client.list_releases(GH, 1, 1).unwrap();
        client.fetch_text("https://example.com/GE-Proton8-17.sha512sum").unwrap();

        let seen = transport.seen_headers.lock();
        assert_eq!(seen[0].get("Authorization").unwrap(), "token gha");
        assert!(seen[1].get("Authorization").is_none());
    }
}
