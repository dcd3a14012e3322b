//! HTTP client creation for feed requests.

use anyhow::Result;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tokio::time::Duration;
use tracing::debug;

use super::types::{ACCEPT, USER_AGENT};
use crate::TARGET_WEB_REQUEST;

/// Client shared by all fetch workers of a run: per-request timeout, gzip, and a
/// browser-like User-Agent so that feeds behind bot filters still answer.
pub fn create_http_client(timeout: Duration) -> Result<reqwest::Client> {
    debug!(target: TARGET_WEB_REQUEST, "Creating HTTP client with {:?} timeout", timeout);

    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .gzip(true)
        .redirect(reqwest::redirect::Policy::default())
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))
}
