use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, instrument};

use super::core::{Database, DbLockErrorExt};
use crate::model::{Article, Category};
use crate::TARGET_DB;

const ARTICLE_COLUMNS: &str =
    "title, description, image_url, url, source_url, published_at, rank, category";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Newest `published_at` first.
    #[default]
    Recency,
    /// Highest rank first, newest first among equal ranks.
    Rank,
}

/// Filters for [`Database::query_articles`]. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    /// Exact source feed URL.
    pub source: Option<String>,
    pub category: Option<Category>,
    /// Case-insensitive literal substring of the title or the description.
    pub search: Option<String>,
    pub limit: Option<u32>,
    /// Inclusive lower bound on `published_at`.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `published_at`.
    pub end: Option<DateTime<Utc>>,
    pub sort_by: SortBy,
}

fn decode_error<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

fn article_from_row(row: &SqliteRow) -> Result<Article, sqlx::Error> {
    let published_at: i64 = row.try_get("published_at")?;
    let rank: i64 = row.try_get("rank")?;
    let category: String = row.try_get("category")?;

    Ok(Article {
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        image_url: row.try_get("image_url")?,
        url: row.try_get("url")?,
        source_url: row.try_get("source_url")?,
        published_at: DateTime::from_timestamp(published_at, 0).ok_or_else(|| {
            sqlx::Error::Decode(format!("published_at out of range: {}", published_at).into())
        })?,
        rank: u32::try_from(rank).map_err(decode_error)?,
        category: category.parse::<Category>().map_err(decode_error)?,
    })
}

fn push_clause(builder: &mut QueryBuilder<'_, Sqlite>, has_where: &mut bool) {
    builder.push(if *has_where { " AND " } else { " WHERE " });
    *has_where = true;
}

/// Escapes LIKE wildcards so the search term matches literally.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl Database {
    /// Inserts the article unless its URL is already stored.
    ///
    /// Returns `Ok(false)` for a duplicate URL; the stored row is left untouched.
    #[instrument(target = "db_query", level = "debug", skip(self, article), fields(url = %article.url))]
    pub async fn insert_if_absent(&self, article: &Article) -> Result<bool, sqlx::Error> {
        let mut backoff = 100; // initial delay in milliseconds
        let max_retries = 5;

        for attempt in 1..=max_retries {
            let result = sqlx::query(
                r#"
                INSERT INTO articles (title, description, image_url, url, source_url, published_at, rank, category)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(url) DO NOTHING
                "#,
            )
            .bind(&article.title)
            .bind(&article.description)
            .bind(&article.image_url)
            .bind(&article.url)
            .bind(&article.source_url)
            .bind(article.published_at.timestamp())
            .bind(i64::from(article.rank))
            .bind(article.category.as_str())
            .execute(self.pool())
            .await;

            match result {
                Ok(done) => {
                    let inserted = done.rows_affected() == 1;
                    if inserted {
                        debug!(target: TARGET_DB, "Article added: {}", article.url);
                    } else {
                        debug!(target: TARGET_DB, "Article already stored: {}", article.url);
                    }
                    return Ok(inserted);
                }
                Err(err) if err.is_database_lock_error() && attempt < max_retries => {
                    info!(target: TARGET_DB, "Database is locked, waiting {}ms before retrying attempt {}/{}: {}", backoff, attempt, max_retries, article.url);
                    sleep(Duration::from_millis(backoff)).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(err) => {
                    error!(target: TARGET_DB, "Failed to add article {}: {}", article.url, err);
                    return Err(err);
                }
            }
        }

        Err(sqlx::Error::Protocol(
            "Maximum retries exceeded for adding article".into(),
        ))
    }

    #[instrument(target = "db_query", level = "debug", skip(self))]
    pub async fn query_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM articles", ARTICLE_COLUMNS));
        let mut has_where = false;

        if let Some(source) = &query.source {
            push_clause(&mut builder, &mut has_where);
            builder.push("source_url = ").push_bind(source.clone());
        }
        if let Some(category) = query.category {
            push_clause(&mut builder, &mut has_where);
            builder.push("category = ").push_bind(category.as_str());
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            push_clause(&mut builder, &mut has_where);
            builder
                .push("(LOWER(title) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR LOWER(description) LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(start) = query.start {
            push_clause(&mut builder, &mut has_where);
            builder.push("published_at >= ").push_bind(start.timestamp());
        }
        if let Some(end) = query.end {
            push_clause(&mut builder, &mut has_where);
            builder.push("published_at <= ").push_bind(end.timestamp());
        }

        match query.sort_by {
            SortBy::Rank => builder.push(" ORDER BY rank DESC, published_at DESC, id DESC"),
            SortBy::Recency => builder.push(" ORDER BY published_at DESC, id DESC"),
        };

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = builder.build().fetch_all(self.pool()).await.map_err(|err| {
            error!(target: TARGET_DB, "Error executing article query: {}", err);
            err
        })?;

        rows.iter().map(article_from_row).collect()
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(self.pool())
            .await
    }

    /// Every stored article, newest first, read lazily. Single pass.
    pub fn stream_all(&self) -> BoxStream<'_, Result<Article, sqlx::Error>> {
        sqlx::query(
            "SELECT title, description, image_url, url, source_url, published_at, rank, category \
             FROM articles ORDER BY published_at DESC, id DESC",
        )
        .fetch(self.pool())
        .map(|row| row.and_then(|row| article_from_row(&row)))
        .boxed()
    }

    /// Ranks of all articles published at or after `since`.
    pub async fn ranks_since(&self, since: DateTime<Utc>) -> Result<Vec<u32>, sqlx::Error> {
        let ranks: Vec<i64> =
            sqlx::query_scalar("SELECT rank FROM articles WHERE published_at >= ?1")
                .bind(since.timestamp())
                .fetch_all(self.pool())
                .await?;

        ranks
            .into_iter()
            .map(|rank| u32::try_from(rank).map_err(decode_error))
            .collect()
    }

    /// Removes every article. Administrative and test use only.
    #[instrument(target = "db_query", level = "info", skip(self))]
    pub async fn clear_all(&self) -> Result<u64, sqlx::Error> {
        let done = sqlx::query("DELETE FROM articles")
            .execute(self.pool())
            .await?;
        info!(target: TARGET_DB, "Cleared {} articles", done.rows_affected());
        Ok(done.rows_affected())
    }
}
