//! Remote asset retrieval boundary.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("fetch rejected: {reason}")]
    Rejected { reason: String },
}

impl FetchError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// Seam between the provisioner and the network. Production code uses
/// [`HttpFetcher`]; tests substitute stubs.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, source: &Url) -> Result<Bytes, FetchError>;
}

/// Plain HTTP(S) GET fetcher. Non-2xx responses and non-HTTP schemes surface
/// as [`FetchError`].
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, source: &Url) -> Result<Bytes, FetchError> {
        if !matches!(source.scheme(), "http" | "https") {
            return Err(FetchError::rejected(format!(
                "unsupported scheme `{}`",
                source.scheme()
            )));
        }

        let response = self
            .client
            .get(source.as_str())
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_http_schemes_are_rejected() {
        let fetcher = HttpFetcher::default();
        let source = Url::parse("file:///etc/passwd").expect("url");

        let error = fetcher.fetch(&source).await.expect_err("rejected");
        assert!(matches!(error, FetchError::Rejected { .. }));
    }
}
