use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::RwLock;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::config::NetworkConfig;
use crate::domain::DomainError;
use crate::ports::{ByteStream, HttpClient};

/// Timeout for JSON API calls.
const API_TIMEOUT: Duration = Duration::from_secs(60);

/// reqwest-backed HTTP client that enforces the network policy.
///
/// In local-only mode all requests are blocked. Otherwise only hosts on the
/// allow-list (or their subdomains) can be reached.
pub struct HttpTransport {
    client: Client,
    local_only: AtomicBool,
    allowed_domains: RwLock<Vec<String>>,
    download_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport from the network configuration.
    pub fn new(config: &NetworkConfig) -> Result<Self, DomainError> {
        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(format!("VirtualATC/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::HttpRequest(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            local_only = config.local_only,
            allowed_domains = ?config.allowed_domains,
            "HttpTransport initialized"
        );

        Ok(Self {
            client,
            local_only: AtomicBool::new(config.local_only),
            allowed_domains: RwLock::new(config.allowed_domains.clone()),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
        })
    }

    /// Set local-only mode.
    pub fn set_local_only(&self, local_only: bool) {
        let previous = self.local_only.swap(local_only, Ordering::SeqCst);
        if previous != local_only {
            info!(local_only = local_only, "Network mode changed");
        }
    }

    /// Update allowed domains.
    pub fn set_allowed_domains(&self, domains: Vec<String>) {
        let mut guard = self.allowed_domains.write();
        *guard = domains;
        info!(allowed_domains = ?*guard, "Allowed domains updated");
    }

    /// Check if a URL is allowed based on current settings.
    fn is_url_allowed(&self, url: &str) -> Result<(), DomainError> {
        if self.local_only.load(Ordering::SeqCst) {
            warn!(url = url, "Network request blocked: local-only mode enabled");
            return Err(DomainError::NetworkBlocked {
                reason: "Local-only mode is enabled. All network requests are blocked.".to_string(),
            });
        }

        let parsed = Url::parse(url).map_err(|e| DomainError::HttpRequest(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| DomainError::HttpRequest("Invalid URL: no host".to_string()))?;

        let allowed = self.allowed_domains.read();
        if !allowed.iter().any(|d| host == d || host.ends_with(&format!(".{}", d))) {
            warn!(url = url, host = host, "Network request blocked: domain not in allow-list");
            return Err(DomainError::NetworkBlocked {
                reason: format!("Domain '{}' is not in the allowed list", host),
            });
        }

        debug!(url = url, "Network request allowed");
        Ok(())
    }
}

#[async_trait]
impl HttpClient for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<ByteStream, DomainError> {
        self.is_url_allowed(url)?;

        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::HttpRequest(format!(
                "HTTP {} for {}",
                status, url
            )));
        }

        let total = response.content_length();
        let chunks = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| DomainError::HttpRequest(e.to_string()))
            })
            .boxed();

        info!(url = url, total = ?total, "Streaming download opened");
        Ok(ByteStream { total, chunks })
    }

    async fn post_json(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        self.is_url_allowed(url)?;

        let mut request = self.client.post(url).timeout(API_TIMEOUT).json(body);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::HttpRequest(format!(
                "HTTP {} for {}",
                status, url
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))
    }

    fn is_network_blocked(&self) -> bool {
        self.local_only.load(Ordering::SeqCst)
    }

    fn allowed_domains(&self) -> Vec<String> {
        self.allowed_domains.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(local_only: bool, domains: &[&str]) -> HttpTransport {
        HttpTransport::new(&NetworkConfig {
            local_only,
            allowed_domains: domains.iter().map(|d| d.to_string()).collect(),
            download_timeout_secs: 10,
        })
        .unwrap()
    }

    #[test]
    fn test_local_only_blocks_requests() {
        let http = transport(true, &["huggingface.co"]);
        assert!(http.is_network_blocked());
        assert!(matches!(
            http.is_url_allowed("https://huggingface.co/ggml-tiny.bin"),
            Err(DomainError::NetworkBlocked { .. })
        ));
    }

    #[test]
    fn test_allowed_domain_and_subdomain_pass() {
        let http = transport(false, &["huggingface.co"]);
        assert!(http.is_url_allowed("https://huggingface.co/ggml-tiny.bin").is_ok());
        assert!(http.is_url_allowed("https://cdn-lfs.huggingface.co/file").is_ok());
    }

    #[test]
    fn test_lookalike_domain_blocked() {
        let http = transport(false, &["huggingface.co"]);
        assert!(http.is_url_allowed("https://evilhuggingface.co/file").is_err());
        assert!(http.is_url_allowed("not a url").is_err());
    }

    #[tokio::test]
    async fn test_blocked_fetch_never_reaches_network() {
        let http = transport(false, &["huggingface.co"]);
        let result = http.fetch("https://example.com/model.bin").await;
        assert!(matches!(result, Err(DomainError::NetworkBlocked { .. })));

        http.set_local_only(true);
        let result = http
            .post_json("https://huggingface.co/api", None, &serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(DomainError::NetworkBlocked { .. })));
    }
}
