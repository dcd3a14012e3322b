use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use news_api::api::{self, AppState};
use news_api::backup;
use news_api::environment::Settings;
use news_api::language::LanguageFilter;
use news_api::logging::configure_logging;
use news_api::pipeline::IngestPipeline;
use news_api::rss::{create_http_client, HttpFeedFetcher};
use news_api::scheduler::schedule_ingestion;
use news_api::{Database, TARGET_BACKUP};

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();
    let settings = Settings::from_env();

    let db = Database::new(&settings.database_path)
        .await
        .with_context(|| format!("Failed to initialize database at {}", settings.database_path))?;
    restore_if_empty(&db, &settings).await;

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Built once and shared by every fetch worker.
    let language = Arc::new(LanguageFilter::new(settings.min_language_confidence));
    let fetcher = Arc::new(HttpFeedFetcher::new(create_http_client(settings.fetch_timeout)?));
    let pipeline = IngestPipeline::new(db.clone(), fetcher, language, settings.feed_urls.clone())
        .with_queue_capacity(settings.queue_capacity);
    let scheduler = schedule_ingestion(Arc::new(pipeline), settings.fetch_interval);

    let served = api::serve(listener, AppState { db: db.clone() }, shutdown_signal()).await;
    if let Err(err) = &served {
        error!("HTTP server stopped with an error: {}", err);
    }

    if let Err(err) = scheduler.shutdown().await {
        error!("Ingestion scheduler did not stop cleanly: {}", err);
    }

    match backup::export_to_path(&db, &settings.backup_csv_path).await {
        Ok(rows) => info!(target: TARGET_BACKUP, "Wrote shutdown backup with {} articles", rows),
        Err(err) => error!(target: TARGET_BACKUP, "Failed to write shutdown backup: {}", err),
    }

    db.pool().close().await;
    served.context("HTTP server failed")
}

async fn restore_if_empty(db: &Database, settings: &Settings) {
    let path = settings.backup_csv_path.as_path();
    match db.count().await {
        Ok(0) if path.exists() => {
            info!(target: TARGET_BACKUP, "Database is empty, loading articles from {}", path.display());
            if let Err(err) = backup::import_from_path(db, path).await {
                warn!(target: TARGET_BACKUP, "Failed to restore articles from CSV: {}", err);
            }
        }
        Ok(0) => info!(target: TARGET_BACKUP, "No CSV backup found, starting with an empty database"),
        Ok(count) => info!(target: TARGET_BACKUP, "Database holds {} articles, skipping CSV restore", count),
        Err(err) => warn!(target: TARGET_BACKUP, "Failed to count stored articles: {}", err),
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, shutting down");
}
