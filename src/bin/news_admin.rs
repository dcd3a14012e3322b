use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use news_api::backup;
use news_api::environment::Settings;
use news_api::language::LanguageFilter;
use news_api::pipeline::IngestPipeline;
use news_api::rss::{create_http_client, HttpFeedFetcher};
use news_api::threat::today_threat_score;
use news_api::Database;

#[derive(Parser)]
#[command(author, version, about = "Maintenance commands for the article store", long_about = None)]
struct Cli {
    /// SQLite database file; defaults to DATABASE_PATH or news.db
    #[arg(short, long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write every stored article to a CSV file
    Export { path: PathBuf },

    /// Load articles from a CSV file, skipping URLs already stored
    Import { path: PathBuf },

    /// Run one ingestion pass over the configured feeds
    Ingest,

    /// Print the threat score for the last 24 hours as JSON
    Threat,

    /// Print the number of stored articles
    Count,
}

#[tokio::main]
async fn main() -> Result<()> {
    news_api::logging::configure_logging();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    let database_path = cli.database.unwrap_or_else(|| settings.database_path.clone());

    let db = Database::new(&database_path)
        .await
        .with_context(|| format!("Failed to open database {}", database_path))?;

    match cli.command {
        Commands::Export { path } => {
            let rows = backup::export_to_path(&db, &path).await?;
            println!("Exported {} articles to {}", rows, path.display());
        }

        Commands::Import { path } => {
            let summary = backup::import_from_path(&db, &path).await?;
            println!(
                "Imported {} articles ({} already stored, {} rows skipped)",
                summary.inserted, summary.duplicates, summary.skipped
            );
        }

        Commands::Ingest => {
            info!("Running one ingestion pass over {} feeds", settings.feed_urls.len());
            let fetcher = Arc::new(HttpFeedFetcher::new(create_http_client(settings.fetch_timeout)?));
            let language = Arc::new(LanguageFilter::new(settings.min_language_confidence));
            let pipeline = IngestPipeline::new(db.clone(), fetcher, language, settings.feed_urls)
                .with_queue_capacity(settings.queue_capacity);

            let summary = pipeline.run_once().await;
            println!(
                "{} sources ({} failed): {} items, {} non-English, {} new, {} already stored",
                summary.sources,
                summary.failed_sources,
                summary.items_seen,
                summary.skipped_language,
                summary.inserted,
                summary.duplicates
            );
        }

        Commands::Threat => {
            let score = today_threat_score(&db).await?;
            println!("{}", serde_json::to_string_pretty(&score)?);
        }

        Commands::Count => {
            println!("{}", db.count().await?);
        }
    }

    db.pool().close().await;
    Ok(())
}
