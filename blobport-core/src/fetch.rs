use crate::{BlobError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};

/// Body of a remote resource, chunk by chunk.
pub type FetchStream = BoxStream<'static, Result<Bytes>>;

/// Maps a remote URI to a stream of its bytes.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<FetchStream>;
}

/// HTTP(S) fetcher backed by a shared reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, uri: &str) -> Result<FetchStream> {
        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|error| BlobError::Network(error.to_string()))?;

        if !response.status().is_success() {
            return Err(BlobError::Network(format!(
                "remote fetch failed: status={} uri={}",
                response.status(),
                uri
            )));
        }

        Ok(response
            .bytes_stream()
            .map_err(|error| BlobError::Network(error.to_string()))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_fetcher_reports_network_error() {
        let fetcher = HttpFetcher::new();
        let result = fetcher.fetch("http://[invalid").await;
        assert!(matches!(result, Err(BlobError::Network(_))));
    }
}
