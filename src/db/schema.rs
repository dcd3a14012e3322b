use tracing::info;

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                image_url TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL UNIQUE,
                source_url TEXT NOT NULL,
                published_at INTEGER NOT NULL, -- unix seconds
                rank INTEGER NOT NULL DEFAULT 0 CHECK (rank >= 0),
                category TEXT NOT NULL DEFAULT 'General'
            );
            CREATE INDEX IF NOT EXISTS idx_articles_source_url ON articles (source_url);
            CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles (published_at);
            CREATE INDEX IF NOT EXISTS idx_articles_category ON articles (category);
            CREATE INDEX IF NOT EXISTS idx_articles_rank ON articles (rank);
            "#,
        )
        .execute(&mut *conn)
        .await?;

        info!(target: TARGET_DB, "Database schema initialized");
        Ok(())
    }
}
