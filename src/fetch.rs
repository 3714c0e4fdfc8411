use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::config::CrawlConfig;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Supplies raw collection-page markup. Implemented over HTTP for real runs
/// and by scripted fakes in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// First collection page; also carries the total listing counter.
    async fn fetch_seed(&self) -> Result<String>;
    async fn fetch_page(&self, page: u32) -> Result<String>;
}

/// One shared client, reused across all page fetches of a run.
pub struct HttpFetcher {
    client: Client,
    seed_url: String,
}

impl HttpFetcher {
    pub fn new(cfg: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, seed_url: cfg.seed_url.clone() })
    }

    fn page_url(&self, page: u32) -> String {
        format!("{}&pagina={}", self.seed_url, page)
    }

    async fn get(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed: {}", url))?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP {} on {}", response.status(), url);
        }
        response.text().await.context("Failed to read response body")
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_seed(&self) -> Result<String> {
        self.get(&self.page_url(1)).await
    }

    async fn fetch_page(&self, page: u32) -> Result<String> {
        self.get(&self.page_url(page)).await
    }
}

// ── Tests ──
