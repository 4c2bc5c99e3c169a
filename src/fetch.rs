use crate::config::HttpConfig;
use crate::error::Result;
use crate::types::PageFetcher;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// HTTP page fetcher backed by a shared `reqwest` client.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for ReqwestFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let body = resp.text().await?;
        debug!("Fetched {} bytes", body.len());
        Ok(body)
    }
}
