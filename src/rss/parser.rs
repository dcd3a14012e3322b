//! Feed parsing for RSS and Atom via feed-rs.

use anyhow::Result;
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use std::io::Cursor;
use tracing::{debug, warn};

use super::types::{FeedItem, ParsedFeed};
use super::util::{cleanup_xml, looks_like_feed};
use crate::TARGET_WEB_REQUEST;

/// Parses a feed body. A body that fails to parse but looks like RSS/Atom gets one
/// more attempt after [`cleanup_xml`].
pub fn parse_feed(body: &[u8], source_url: &str) -> Result<ParsedFeed> {
    let feed = match parser::parse(Cursor::new(body)) {
        Ok(feed) => feed,
        Err(first_err) => {
            let text = String::from_utf8_lossy(body);
            if !looks_like_feed(&text) {
                let preview: String = text.chars().take(100).collect();
                return Err(anyhow::anyhow!(
                    "Content from {} is not an RSS or Atom feed: {}",
                    source_url,
                    preview
                ));
            }

            let cleaned = cleanup_xml(&text);
            match parser::parse(Cursor::new(cleaned.as_bytes())) {
                Ok(feed) => {
                    warn!(target: TARGET_WEB_REQUEST, "Feed from {} parsed only after XML cleanup", source_url);
                    feed
                }
                Err(second_err) => {
                    return Err(anyhow::anyhow!(
                        "Failed to parse feed from {} even after cleanup. First error: {}. Second error: {}",
                        source_url,
                        first_err,
                        second_err
                    ));
                }
            }
        }
    };

    Ok(from_feed(feed, source_url))
}

fn from_feed(feed: Feed, source_url: &str) -> ParsedFeed {
    let published = feed.published.or(feed.updated);
    let total = feed.entries.len();
    let items: Vec<FeedItem> = feed.entries.into_iter().filter_map(item_from_entry).collect();

    if items.len() < total {
        debug!(target: TARGET_WEB_REQUEST, "Dropped {} entries without a link from {}", total - items.len(), source_url);
    }

    ParsedFeed { published, items }
}

fn item_from_entry(entry: Entry) -> Option<FeedItem> {
    let link = entry
        .links
        .iter()
        .find(|link| link.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|link| link.href.trim().to_string())
        .filter(|href| !href.is_empty())?;

    let image_url = image_of(&entry);

    let description = entry
        .summary
        .map(|text| text.content)
        .or_else(|| entry.content.and_then(|content| content.body))
        .unwrap_or_default();

    Some(FeedItem {
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        description,
        link,
        image_url,
        published: entry.published.or(entry.updated),
    })
}

/// Thumbnail first, then image media content, then an image enclosure link.
fn image_of(entry: &Entry) -> Option<String> {
    let thumbnail = entry
        .media
        .iter()
        .flat_map(|media| media.thumbnails.iter())
        .map(|thumb| thumb.image.uri.clone())
        .next();

    let media_image = || {
        entry
            .media
            .iter()
            .flat_map(|media| media.content.iter())
            .filter(|content| {
                content
                    .content_type
                    .as_ref()
                    .map_or(true, |mime| mime.ty().as_str() == "image")
            })
            .find_map(|content| content.url.as_ref().map(|url| url.to_string()))
    };

    let enclosure = || {
        entry
            .links
            .iter()
            .find(|link| {
                link.rel.as_deref() == Some("enclosure")
                    && link
                        .media_type
                        .as_deref()
                        .is_some_and(|t| t.starts_with("image/"))
            })
            .map(|link| link.href.clone())
    };

    thumbnail
        .or_else(media_image)
        .or_else(enclosure)
        .filter(|url| !url.is_empty())
}
