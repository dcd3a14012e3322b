//! Type definitions for the RSS module.

use chrono::{DateTime, Utc};
use tokio::time::Duration;

/// One feed entry, before filtering and scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    /// Raw, possibly HTML, description.
    pub description: String,
    pub link: String,
    pub image_url: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// A parsed feed: its own timestamp plus the usable entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub published: Option<DateTime<Utc>>,
    pub items: Vec<FeedItem>,
}

// Constants
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml, text/xml, */*;q=0.9";
