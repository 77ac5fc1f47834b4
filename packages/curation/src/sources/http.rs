//! HTTP document source backed by `reqwest`.

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::{CurationError, Result};
use crate::traits::source::DocumentSource;
use crate::types::config::CuratorConfig;
use crate::types::evidence::Snapshot;

/// Fetches documentation pages over HTTP and captures content-addressed
/// snapshots.
pub struct HttpSource {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpSource {
    pub fn new(config: &CuratorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(concat!("curator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CurationError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs: config.fetch_timeout.as_secs(),
        })
    }

    fn fetch_error(&self, url: &str, e: reqwest::Error) -> CurationError {
        if e.is_timeout() {
            CurationError::Timeout {
                operation: format!("fetch {url}"),
                seconds: self.timeout_secs,
            }
        } else {
            CurationError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<Snapshot> {
        let parsed = Url::parse(url).map_err(|e| CurationError::Fetch {
            url: url.to_string(),
            message: format!("invalid url: {e}"),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CurationError::Fetch {
                url: url.to_string(),
                message: format!("unsupported scheme: {}", parsed.scheme()),
            });
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.fetch_error(url, e))?;

        let body = response.text().await.map_err(|e| self.fetch_error(url, e))?;
        let snapshot = Snapshot::capture(url, body);
        debug!(url, snapshot = %snapshot.id, bytes = snapshot.payload.len(), "fetched");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_non_http_schemes() {
        let source = HttpSource::new(&CuratorConfig::default()).unwrap();
        let err = source.fetch("ftp://example.com/docs").await.unwrap_err();
        assert!(matches!(err, CurationError::Fetch { .. }));

        let err = source.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, CurationError::Fetch { .. }));
    }
}
