use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::time::Duration;
use tracing::warn;

use crate::language::DEFAULT_MIN_CONFIDENCE;
use crate::pipeline::DEFAULT_QUEUE_CAPACITY;
use crate::rss::REQUEST_TIMEOUT;
use crate::sources::default_feeds;

/// Splits a list-valued variable. Entries are trimmed and empty entries are dropped.
fn split_list(value: &str, delimiter: char) -> Vec<String> {
    value
        .split(delimiter)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: String,
    pub backup_csv_path: PathBuf,
    pub port: u16,
    pub feed_urls: Vec<String>,
    pub fetch_interval: Duration,
    pub fetch_timeout: Duration,
    pub queue_capacity: usize,
    pub min_language_confidence: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: "news.db".to_string(),
            backup_csv_path: PathBuf::from("articles.csv"),
            port: 8080,
            feed_urls: default_feeds(),
            fetch_interval: Duration::from_secs(15 * 60),
            fetch_timeout: REQUEST_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            min_language_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Settings::default();

        let feed_urls = lookup("FEED_URLS")
            .map(|value| split_list(&value, ';'))
            .filter(|feeds| !feeds.is_empty())
            .unwrap_or(defaults.feed_urls);

        Settings {
            database_path: lookup("DATABASE_PATH")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.database_path),
            backup_csv_path: lookup("BACKUP_CSV_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.backup_csv_path),
            port: parse_or(&lookup, "PORT", defaults.port),
            feed_urls,
            fetch_interval: Duration::from_secs(
                parse_or(&lookup, "FETCH_INTERVAL_SECS", defaults.fetch_interval.as_secs()).max(1),
            ),
            fetch_timeout: Duration::from_secs(
                parse_or(&lookup, "FETCH_TIMEOUT_SECS", defaults.fetch_timeout.as_secs()).max(1),
            ),
            queue_capacity: parse_or(&lookup, "WRITER_QUEUE_CAPACITY", defaults.queue_capacity).max(1),
            min_language_confidence: parse_or(
                &lookup,
                "MIN_LANGUAGE_CONFIDENCE",
                defaults.min_language_confidence,
            ),
        }
    }
}

fn parse_or<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid value {:?} for {}, using default", raw, key);
                default
            }
        },
        None => default,
    }
}
