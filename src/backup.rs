//! CSV export and import of the whole article store.
//!
//! Columns, in order: `Title, Description, ImageURL, URL, SourceURL, PublishedAt, Rank,
//! Category`. Timestamps are RFC 3339 in UTC at whole-second precision.

use chrono::{DateTime, SecondsFormat, Utc};
use futures::TryStreamExt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::db::Database;
use crate::model::{Article, Category};
use crate::TARGET_BACKUP;

pub const HEADER: [&str; 8] = [
    "Title",
    "Description",
    "ImageURL",
    "URL",
    "SourceURL",
    "PublishedAt",
    "Rank",
    "Category",
];

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to open CSV file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid CSV header: expected {expected} columns, got {found}")]
    InvalidHeader { expected: usize, found: usize },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Writes every stored article, newest first, and returns the number of rows written.
pub async fn export_csv<W: Write>(db: &Database, writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;

    let mut rows = db.stream_all();
    let mut written = 0;
    while let Some(article) = rows.try_next().await? {
        let published = article.published_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let rank = article.rank.to_string();
        csv.write_record([
            article.title.as_str(),
            article.description.as_str(),
            article.image_url.as_str(),
            article.url.as_str(),
            article.source_url.as_str(),
            published.as_str(),
            rank.as_str(),
            article.category.as_str(),
        ])?;
        written += 1;
    }

    csv.flush()?;
    Ok(written)
}

/// Loads articles from CSV. Existing URLs are left untouched; malformed rows are skipped.
pub async fn import_csv<R: Read>(db: &Database, reader: R) -> Result<ImportSummary> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = csv.records();

    let header = match records.next() {
        Some(header) => header?,
        None => {
            return Err(BackupError::InvalidHeader {
                expected: HEADER.len(),
                found: 0,
            })
        }
    };
    if header.len() != HEADER.len() {
        return Err(BackupError::InvalidHeader {
            expected: HEADER.len(),
            found: header.len(),
        });
    }

    let mut summary = ImportSummary::default();
    for (index, record) in records.enumerate() {
        // Line 1 is the header.
        let line = index + 2;
        let record = match record {
            Ok(record) => record,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                warn!(target: TARGET_BACKUP, "Skipping unreadable CSV row {}: {}", line, err);
                summary.skipped += 1;
                continue;
            }
        };

        let article = match article_from_record(&record) {
            Ok(article) => article,
            Err(reason) => {
                warn!(target: TARGET_BACKUP, "Skipping CSV row {}: {}", line, reason);
                summary.skipped += 1;
                continue;
            }
        };

        if db.insert_if_absent(&article).await? {
            summary.inserted += 1;
        } else {
            summary.duplicates += 1;
        }
    }

    info!(
        target: TARGET_BACKUP,
        "CSV import finished: {} inserted, {} duplicates, {} skipped",
        summary.inserted,
        summary.duplicates,
        summary.skipped
    );
    Ok(summary)
}

fn article_from_record(record: &csv::StringRecord) -> std::result::Result<Article, String> {
    if record.len() != HEADER.len() {
        return Err(format!(
            "expected {} columns, got {}",
            HEADER.len(),
            record.len()
        ));
    }

    let published_at = DateTime::parse_from_rfc3339(record[5].trim())
        .map_err(|err| format!("invalid PublishedAt {:?}: {}", &record[5], err))?
        .with_timezone(&Utc);
    let rank = record[6]
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("invalid Rank {:?}: {}", &record[6], err))?;
    let category = record[7]
        .trim()
        .parse::<Category>()
        .map_err(|err| err.to_string())?;

    Ok(Article {
        title: record[0].to_string(),
        description: record[1].to_string(),
        image_url: record[2].to_string(),
        url: record[3].to_string(),
        source_url: record[4].to_string(),
        published_at,
        rank,
        category,
    })
}

/// Exports to `path` through a temporary sibling file renamed into place, so a crash never
/// leaves a truncated backup behind. File I/O goes through `tokio::fs`.
pub async fn export_to_path(db: &Database, path: &Path) -> Result<usize> {
    let mut buffer = Vec::new();
    let written = export_csv(db, &mut buffer).await?;

    let tmp = temp_sibling(path);
    if let Err(err) = write_synced(&tmp, &buffer).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    fs::rename(&tmp, path).await?;

    info!(target: TARGET_BACKUP, "Exported {} articles to {}", written, path.display());
    Ok(written)
}

async fn write_synced(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

pub async fn import_from_path(db: &Database, path: &Path) -> Result<ImportSummary> {
    let contents = fs::read(path).await.map_err(|source| BackupError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    info!(target: TARGET_BACKUP, "Importing articles from {}", path.display());
    import_csv(db, contents.as_slice()).await
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "articles.csv".into());
    name.push(".tmp");
    path.with_file_name(name)
}
