use anyhow::Context;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::article::{Article, ArticlePage};
use crate::config::Config;

/// Anything that can go wrong while fetching one page of articles.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("article request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("article API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode article page: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("article fetch task ended before completing: {0}")]
    Interrupted(String),
}

pub struct ArticleClient {
    client: Client,
    base_url: String,
}

impl ArticleClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.news_request_timeout_secs))
            .build()
            .context("Failed to build article HTTP client")?;

        Ok(Self::with_client(client, &config.news_api_base_url))
    }

    /// Use a preconfigured client, e.g. against a mock server.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        ArticleClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn page_url(&self, page: u32) -> String {
        format!("{}/api/articles/{}", self.base_url, page)
    }

    /// Fetch a single page. Pages start at 1.
    pub async fn fetch_page(&self, page: u32) -> Result<Vec<Article>, FeedError> {
        let url = self.page_url(page);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FeedError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Status { status, body });
        }

        let data: ArticlePage = response.json().await.map_err(FeedError::Decode)?;

        debug!("Fetched {} articles on page {}", data.articles.len(), page);
        Ok(data.articles)
    }
}
