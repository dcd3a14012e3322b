//! Concurrent feed ingestion.
//!
//! One run fetches every configured source in parallel (one task per source). Each
//! worker filters, sanitizes, classifies and scores its items, then hands the resulting
//! articles to a bounded queue. A single writer task drains the queue and inserts
//! articles one at a time, so the store only ever sees one ingestion writer. A run
//! returns only after every worker has finished and the writer has drained the queue.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::classify::classify;
use crate::db::Database;
use crate::language::LanguageFilter;
use crate::model::Article;
use crate::rss::{FeedFetcher, FeedItem};
use crate::sanitize::strip_markup;
use crate::scoring::score;
use crate::{TARGET_PIPELINE, TARGET_WEB_REQUEST};

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sources: usize,
    pub failed_sources: usize,
    pub items_seen: usize,
    pub skipped_language: usize,
    pub queued: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub write_errors: usize,
}

#[derive(Debug, Default)]
struct SourceStats {
    items_seen: usize,
    skipped_language: usize,
    queued: usize,
}

#[derive(Debug, Default)]
struct WriteStats {
    inserted: usize,
    duplicates: usize,
    errors: usize,
}

pub struct IngestPipeline {
    db: Database,
    fetcher: Arc<dyn FeedFetcher>,
    language: Arc<LanguageFilter>,
    sources: Vec<String>,
    queue_capacity: usize,
}

impl IngestPipeline {
    pub fn new(
        db: Database,
        fetcher: Arc<dyn FeedFetcher>,
        language: Arc<LanguageFilter>,
        sources: Vec<String>,
    ) -> Self {
        Self {
            db,
            fetcher,
            language,
            sources,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Runs one full fetch-and-store cycle and waits for it to drain.
    pub async fn run_once(&self) -> RunSummary {
        info!(target: TARGET_PIPELINE, "Starting ingestion run over {} sources", self.sources.len());

        let (tx, rx) = mpsc::channel::<Article>(self.queue_capacity);
        let writer = tokio::spawn(write_articles(self.db.clone(), rx));

        let mut workers = JoinSet::new();
        for source in &self.sources {
            let tx = tx.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let language = Arc::clone(&self.language);
            let source = source.clone();
            workers.spawn(async move {
                let result = ingest_source(fetcher.as_ref(), &language, &source, tx).await;
                (source, result)
            });
        }
        // Workers hold the only remaining senders; the writer stops once they finish.
        drop(tx);

        let mut summary = RunSummary {
            sources: self.sources.len(),
            ..Default::default()
        };

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, Ok(stats))) => {
                    summary.items_seen += stats.items_seen;
                    summary.skipped_language += stats.skipped_language;
                    summary.queued += stats.queued;
                }
                Ok((source, Err(err))) => {
                    summary.failed_sources += 1;
                    error!(target: TARGET_WEB_REQUEST, "Error ingesting feed {}: {:#}", source, err);
                }
                Err(err) => {
                    summary.failed_sources += 1;
                    error!(target: TARGET_PIPELINE, "Fetch worker aborted: {}", err);
                }
            }
        }

        match writer.await {
            Ok(stats) => {
                summary.inserted = stats.inserted;
                summary.duplicates = stats.duplicates;
                summary.write_errors = stats.errors;
            }
            Err(err) => {
                error!(target: TARGET_PIPELINE, "Article writer aborted: {}", err);
                summary.write_errors = summary.queued;
            }
        }

        info!(
            target: TARGET_PIPELINE,
            "Ingestion run completed: {} sources ({} failed), {} items, {} non-English, {} new, {} already stored",
            summary.sources,
            summary.failed_sources,
            summary.items_seen,
            summary.skipped_language,
            summary.inserted,
            summary.duplicates
        );
        summary
    }
}

async fn ingest_source(
    fetcher: &dyn FeedFetcher,
    language: &LanguageFilter,
    source: &str,
    tx: mpsc::Sender<Article>,
) -> Result<SourceStats> {
    let feed = fetcher.fetch(source).await?;
    let mut stats = SourceStats::default();

    for item in feed.items {
        stats.items_seen += 1;
        let Some(article) = build_article(item, feed.published, source, language, Utc::now()) else {
            stats.skipped_language += 1;
            continue;
        };

        // Blocks while the queue is full.
        tx.send(article)
            .await
            .map_err(|_| anyhow::anyhow!("article writer stopped before {} was drained", source))?;
        stats.queued += 1;
    }

    debug!(target: TARGET_PIPELINE, "Source {} done: {} items, {} queued", source, stats.items_seen, stats.queued);
    Ok(stats)
}

/// Turns a feed item into an article, or `None` if the item is not English.
///
/// The title is stored as supplied; only the description is stripped of markup.
pub fn build_article(
    item: FeedItem,
    feed_published: Option<DateTime<Utc>>,
    source: &str,
    language: &LanguageFilter,
    now: DateTime<Utc>,
) -> Option<Article> {
    let description = strip_markup(&item.description);

    if !language.is_accepted(&format!("{} {}", item.title, description)) {
        debug!(target: TARGET_PIPELINE, "Skipping non-English article: {} (Source: {})", item.title, source);
        return None;
    }

    let category = classify(source);
    let rank = score(category, &item.title, &description);

    Some(Article {
        rank,
        category,
        description,
        image_url: item.image_url.unwrap_or_default(),
        url: item.link,
        source_url: source.to_string(),
        published_at: item.published.or(feed_published).unwrap_or(now),
        title: item.title,
    })
}

async fn write_articles(db: Database, mut rx: mpsc::Receiver<Article>) -> WriteStats {
    let mut stats = WriteStats::default();

    while let Some(article) = rx.recv().await {
        match db.insert_if_absent(&article).await {
            Ok(true) => stats.inserted += 1,
            Ok(false) => stats.duplicates += 1,
            Err(err) => {
                stats.errors += 1;
                warn!(target: TARGET_PIPELINE, "Failed to store article {}: {}", article.url, err);
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ArticleQuery;
    use crate::model::Category;
    use crate::rss::{parse_feed, ParsedFeed};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;

    const CYBER_SOURCE: &str = "https://www.bleepingcomputer.com/feed/";
    const TECH_SOURCE: &str = "https://techcrunch.com/feed/";
    const BROKEN_SOURCE: &str = "https://broken.example.com/feed";

    struct FixtureFetcher {
        feeds: HashMap<String, String>,
    }

    #[async_trait]
    impl FeedFetcher for FixtureFetcher {
        async fn fetch(&self, source_url: &str) -> Result<ParsedFeed> {
            match self.feeds.get(source_url) {
                Some(body) => parse_feed(body.as_bytes(), source_url),
                None => Err(anyhow::anyhow!("Request to {} failed: 404", source_url)),
            }
        }
    }

    fn rss(channel_date: Option<&str>, items: &[(&str, &str, &str, Option<&str>)]) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>t</title><link>https://example.com</link><description>d</description>",
        );
        if let Some(date) = channel_date {
            xml.push_str(&format!("<pubDate>{}</pubDate>", date));
        }
        for (title, link, description, date) in items {
            xml.push_str(&format!(
                "<item><title>{}</title><link>{}</link><description><![CDATA[{}]]></description>",
                title, link, description
            ));
            if let Some(date) = date {
                xml.push_str(&format!("<pubDate>{}</pubDate>", date));
            }
            xml.push_str("</item>");
        }
        xml.push_str("</channel></rss>");
        xml
    }

    const ENGLISH_DESCRIPTION: &str =
        "<p>Security researchers say attackers are <b>actively exploiting</b> the flaw in the wild, \
         and administrators should install the update as soon as they possibly can.</p>";

    fn pipeline(feeds: Vec<(&str, String)>, sources: &[&str], db: Database) -> IngestPipeline {
        let fetcher = FixtureFetcher {
            feeds: feeds.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        };
        IngestPipeline::new(
            db,
            Arc::new(fetcher),
            Arc::new(LanguageFilter::default()),
            sources.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn english_item(n: usize) -> (String, String) {
        (
            format!("Critical vulnerability number {} found in popular web server", n),
            format!("https://example.com/articles/{}", n),
        )
    }

    #[test]
    fn test_build_article_sanitizes_classifies_and_scores() {
        let language = LanguageFilter::default();
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let item = FeedItem {
            title: "Critical zero-day exploit found in <em>popular</em> router firmware".into(),
            description: ENGLISH_DESCRIPTION.into(),
            link: "https://example.com/zero-day".into(),
            image_url: Some("https://img.example.com/1.jpg".into()),
            published: None,
        };

        let article = build_article(item, None, CYBER_SOURCE, &language, now).unwrap();
        assert_eq!(article.category, Category::Cybersecurity);
        assert_eq!(
            article.title,
            "Critical zero-day exploit found in <em>popular</em> router firmware"
        );
        assert!(!article.description.contains('<'));
        assert!(article.description.contains("actively exploiting"));
        assert_eq!(article.image_url, "https://img.example.com/1.jpg");
        assert_eq!(article.published_at, now);
        assert_eq!(
            article.rank,
            score(Category::Cybersecurity, &article.title, &article.description)
        );
        assert!(article.rank > 0);
    }

    #[test]
    fn test_build_article_timestamp_fallbacks() {
        let language = LanguageFilter::default();
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let item_date = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let feed_date = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        let item = |published| FeedItem {
            title: "Quarterly report shows steady growth across the whole industry".into(),
            description: ENGLISH_DESCRIPTION.into(),
            link: "https://example.com/report".into(),
            image_url: None,
            published,
        };

        let a = build_article(item(Some(item_date)), Some(feed_date), "s", &language, now).unwrap();
        assert_eq!(a.published_at, item_date);
        let b = build_article(item(None), Some(feed_date), "s", &language, now).unwrap();
        assert_eq!(b.published_at, feed_date);
        let c = build_article(item(None), None, "s", &language, now).unwrap();
        assert_eq!(c.published_at, now);
        assert_eq!(c.image_url, "");
        assert_eq!(c.category, Category::General);
    }

    #[test]
    fn test_build_article_rejects_non_english() {
        let language = LanguageFilter::default();
        let item = FeedItem {
            title: "Kritische Sicherheitslücke in beliebtem Webserver entdeckt".into(),
            description: "Angreifer nutzen die Schwachstelle bereits aktiv aus, Administratoren \
                          sollten das Update so schnell wie möglich installieren."
                .into(),
            link: "https://example.de/1".into(),
            image_url: None,
            published: None,
        };
        assert!(build_article(item, None, CYBER_SOURCE, &language, Utc::now()).is_none());
    }

    #[tokio::test]
    async fn test_run_once_isolates_failing_source() {
        let db = Database::in_memory().await.unwrap();
        let (title1, link1) = english_item(1);
        let (title2, link2) = english_item(2);
        let cyber = rss(
            Some("Mon, 15 Jan 2024 08:00:00 GMT"),
            &[
                (title1.as_str(), link1.as_str(), ENGLISH_DESCRIPTION, Some("Mon, 15 Jan 2024 10:30:00 GMT")),
                (title2.as_str(), link2.as_str(), ENGLISH_DESCRIPTION, None),
                (
                    "Neue Schadsoftware greift deutsche Unternehmen und Behörden an",
                    "https://example.de/malware",
                    "Die Angreifer verschlüsseln Daten und fordern ein hohes Lösegeld von den Opfern.",
                    None,
                ),
            ],
        );

        let pipeline = pipeline(
            vec![(CYBER_SOURCE, cyber)],
            &[CYBER_SOURCE, BROKEN_SOURCE],
            db.clone(),
        );
        let summary = pipeline.run_once().await;

        assert_eq!(summary.sources, 2);
        assert_eq!(summary.failed_sources, 1);
        assert_eq!(summary.items_seen, 3);
        assert_eq!(summary.skipped_language, 1);
        assert_eq!(summary.queued, 2);
        assert_eq!(summary.inserted, 2);
        assert_eq!(db.count().await.unwrap(), 2);

        let stored = db.query_articles(&ArticleQuery::default()).await.unwrap();
        assert!(stored.iter().all(|a| a.category == Category::Cybersecurity));
        assert!(stored.iter().all(|a| a.source_url == CYBER_SOURCE));
        assert!(stored.iter().all(|a| !a.description.contains("<b>")));
        let second = stored.iter().find(|a| a.url == link2).unwrap();
        assert_eq!(
            second.published_at,
            Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_same_url_from_two_sources_is_stored_once() {
        let db = Database::in_memory().await.unwrap();
        let (title, link) = english_item(7);
        let cyber = rss(None, &[(title.as_str(), link.as_str(), ENGLISH_DESCRIPTION, None)]);
        let tech = rss(None, &[(title.as_str(), link.as_str(), ENGLISH_DESCRIPTION, None)]);

        let pipeline = pipeline(
            vec![(CYBER_SOURCE, cyber), (TECH_SOURCE, tech)],
            &[CYBER_SOURCE, TECH_SOURCE],
            db.clone(),
        );
        let summary = pipeline.run_once().await;

        assert_eq!(summary.queued, 2);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(db.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_small_queue_still_drains_everything() {
        let db = Database::in_memory().await.unwrap();
        let items: Vec<(String, String)> = (0..25).map(english_item).collect();
        let refs: Vec<(&str, &str, &str, Option<&str>)> = items
            .iter()
            .map(|(t, l)| (t.as_str(), l.as_str(), ENGLISH_DESCRIPTION, None))
            .collect();

        let pipeline = pipeline(vec![(CYBER_SOURCE, rss(None, &refs))], &[CYBER_SOURCE], db.clone())
            .with_queue_capacity(1);
        let summary = pipeline.run_once().await;

        assert_eq!(summary.inserted, 25);
        // Completion implies the writer drained the queue.
        assert_eq!(db.count().await.unwrap(), 25);
    }

    #[tokio::test]
    async fn test_second_run_inserts_nothing_new() {
        let db = Database::in_memory().await.unwrap();
        let (title, link) = english_item(3);
        let feed = rss(None, &[(title.as_str(), link.as_str(), ENGLISH_DESCRIPTION, None)]);
        let pipeline = pipeline(vec![(TECH_SOURCE, feed)], &[TECH_SOURCE], db.clone());

        assert_eq!(pipeline.run_once().await.inserted, 1);
        let second = pipeline.run_once().await;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(db.count().await.unwrap(), 1);
    }

    struct SlowFetcher {
        inner: FixtureFetcher,
        delay: tokio::time::Duration,
    }

    #[async_trait]
    impl FeedFetcher for SlowFetcher {
        async fn fetch(&self, source_url: &str) -> Result<ParsedFeed> {
            tokio::time::sleep(self.delay).await;
            self.inner.fetch(source_url).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_store_serves_reads_while_run_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();

        let mut feeds = HashMap::new();
        let mut sources = Vec::new();
        for s in 0..4 {
            let source = format!("https://feed{}.example.com/rss", s);
            let items: Vec<(String, String)> = (0..30).map(|n| english_item(s * 100 + n)).collect();
            let refs: Vec<(&str, &str, &str, Option<&str>)> = items
                .iter()
                .map(|(t, l)| (t.as_str(), l.as_str(), ENGLISH_DESCRIPTION, None))
                .collect();
            feeds.insert(source.clone(), rss(None, &refs));
            sources.push(source);
        }

        let fetcher = SlowFetcher {
            inner: FixtureFetcher { feeds },
            delay: tokio::time::Duration::from_millis(50),
        };
        let pipeline = Arc::new(
            IngestPipeline::new(
                db.clone(),
                Arc::new(fetcher),
                Arc::new(LanguageFilter::default()),
                sources,
            )
            .with_queue_capacity(1),
        );

        let run = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.run_once().await }
        });

        let since = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let mut reads = 0;
        let mut last_seen = 0;
        while !run.is_finished() {
            let articles = db.query_articles(&ArticleQuery::default()).await.unwrap();
            let ranks = db.ranks_since(since).await.unwrap();
            assert!(articles.len() >= last_seen);
            assert!(ranks.len() >= articles.len());
            last_seen = articles.len();
            reads += 1;
            tokio::task::yield_now().await;
        }

        let summary = run.await.unwrap();
        assert!(reads > 0);
        assert_eq!(summary.inserted, 120);
        assert_eq!(summary.write_errors, 0);
        assert_eq!(db.count().await.unwrap(), 120);
    }

    #[tokio::test]
    async fn test_no_sources_completes_immediately() {
        let db = Database::in_memory().await.unwrap();
        let pipeline = pipeline(vec![], &[], db.clone());
        assert_eq!(pipeline.run_once().await, RunSummary::default());
    }
}
