//! Fetching a single feed over HTTP.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header;
use tracing::debug;

use super::parser::parse_feed;
use super::types::ParsedFeed;
use super::util::is_valid_url;
use crate::TARGET_WEB_REQUEST;

/// Source of parsed feeds. The pipeline holds one of these behind an `Arc`, shared by
/// every fetch worker of a run.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, source_url: &str) -> Result<ParsedFeed>;
}

pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, source_url: &str) -> Result<ParsedFeed> {
        if !is_valid_url(source_url) {
            return Err(anyhow::anyhow!("Invalid feed URL: {}", source_url));
        }

        debug!(target: TARGET_WEB_REQUEST, "Loading RSS feed from {}", source_url);

        let response = self.client.get(source_url).send().await.map_err(|err| {
            if err.is_timeout() {
                anyhow::anyhow!("Request to {} timed out", source_url)
            } else {
                anyhow::anyhow!("Request to {} failed: {}", source_url, err)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "Non-success status {} from {}",
                status,
                source_url
            ));
        }

        debug!(target: TARGET_WEB_REQUEST, "Response Content-Type from {}: {:?}", source_url, response.headers().get(header::CONTENT_TYPE));

        let bytes = response
            .bytes()
            .await
            .map_err(|err| anyhow::anyhow!("Failed to read response body from {}: {}", source_url, err))?;

        let feed = parse_feed(&bytes, source_url)?;
        debug!(target: TARGET_WEB_REQUEST, "Parsed feed {} with {} entries", source_url, feed.items.len());
        Ok(feed)
    }
}
