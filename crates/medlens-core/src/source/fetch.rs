//! HTTP fetching for URL sources.
//!
//! The resolver talks to the network only through the [`Fetcher`] trait, so
//! tests (and embedders with their own HTTP stack) can swap the transport.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::PipelineError;

/// A successful GET response body.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl Fetched {
    /// Body decoded as (lossy) UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Outbound GET transport.
///
/// Uses `async_trait` so the resolver can hold a `Box<dyn Fetcher>`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a URL. Non-success statuses and timeouts are `FetchFailed`.
    async fn fetch(&self, url: &str) -> Result<Fetched, PipelineError>;
}

/// `reqwest`-backed fetcher with a browser User-Agent and a fixed timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, PipelineError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::FetchFailed {
                url: String::new(),
                message: format!("Failed to build HTTP client: {e}"),
                status_code: None,
            })?;

        Ok(Self {
            client,
            timeout,
            max_bytes: config.max_download_mb * 1024 * 1024,
        })
    }

    fn fetch_error(url: &str, e: reqwest::Error, timeout: Duration) -> PipelineError {
        let message = if e.is_timeout() {
            format!("timed out after {}s", timeout.as_secs())
        } else {
            e.to_string()
        };
        PipelineError::FetchFailed {
            url: url.to_string(),
            message,
            status_code: e.status().map(|s| s.as_u16()),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, PipelineError> {
        tracing::debug!("GET {url}");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::fetch_error(url, e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::FetchFailed {
                url: url.to_string(),
                message: format!("HTTP {status}"),
                status_code: Some(status.as_u16()),
            });
        }

        if let Some(len) = resp.content_length().filter(|len| *len > self.max_bytes) {
            return Err(PipelineError::FetchFailed {
                url: url.to_string(),
                message: format!("response too large ({len} bytes > {})", self.max_bytes),
                status_code: Some(status.as_u16()),
            });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Self::fetch_error(url, e, self.timeout))?;

        if bytes.len() as u64 > self.max_bytes {
            return Err(PipelineError::FetchFailed {
                url: url.to_string(),
                message: format!("response too large ({} bytes)", bytes.len()),
                status_code: Some(status.as_u16()),
            });
        }

        tracing::trace!("  {} bytes ({:?})", bytes.len(), content_type);
        Ok(Fetched {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_fetcher_builds_from_default_config() {
        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        assert_eq!(fetcher.timeout, Duration::from_secs(10));
        assert_eq!(fetcher.max_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn test_fetched_text_is_lossy() {
        let fetched = Fetched {
            bytes: vec![b'<', b'p', b'>', 0xFF, b'<', b'/', b'p', b'>'],
            content_type: Some("text/html".to_string()),
        };
        assert!(fetched.text().starts_with("<p>"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_failed() {
        let config = FetchConfig {
            timeout_secs: 2,
            ..FetchConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();

        // Port 9 on loopback: nothing listens there.
        let err = fetcher.fetch("http://127.0.0.1:9/a.png").await.unwrap_err();
        assert!(matches!(err, PipelineError::FetchFailed { .. }));
        assert!(!err.is_fatal());
    }
}
