use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::domain::DomainError;

/// Body chunks of a streamed download.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, DomainError>>;

/// A response body being streamed from a remote source.
pub struct ByteStream {
    /// Advertised length, if the server sent one.
    pub total: Option<u64>,
    pub chunks: ChunkStream,
}

/// HTTP client port for all network requests.
/// All network traffic must go through this interface.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Open a GET request and stream its body.
    async fn fetch(&self, url: &str) -> Result<ByteStream, DomainError>;

    /// Perform a POST request with a JSON body and decode the JSON reply.
    async fn post_json(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError>;

    /// Check if network requests are currently blocked.
    fn is_network_blocked(&self) -> bool;

    /// Get the list of allowed domains (when not in local-only mode).
    fn allowed_domains(&self) -> Vec<String>;
}
