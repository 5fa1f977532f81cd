use crate::types::{Error, FetchConfig, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client with a bounded timeout and a small retry budget. All network
/// I/O in the crate goes through here: feed pages, article pages for image
/// discovery, and image bodies.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    /// Fetch a URL and return the response body as text. Non-2xx statuses are
    /// reported as `Error::Status` after the retry budget is exhausted.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.get_with_retries(url).await?;
        Ok(response.text().await?)
    }

    /// Fetch a URL and return the raw body bytes (image content).
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get_with_retries(url).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn get_with_retries(&self, url: &str) -> Result<reqwest::Response> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(self.config.retry_delay_seconds);
                warn!("retrying {} (attempt {}) in {:?}", url, attempt + 1, delay);
                tokio::time::sleep(delay).await;
            }

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        debug!("fetched {} ({})", url, status);
                        return Ok(response);
                    }
                    last_error = Some(Error::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                Err(e) => {
                    last_error = Some(Error::Http(e));
                }
            }
        }

        Err(last_error.expect("at least one attempt"))
    }
}

/// Seam for fetching article pages so adapters can be exercised without a
/// network.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

#[async_trait]
impl PageFetcher for Fetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.fetch_text(url).await
    }
}

/// Seam for fetching image bytes so the synchronizer can be exercised without
/// a network.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl ImageFetcher for Fetcher {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch_bytes(url).await
    }
}
