use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

/// Idempotent schema setup, run at process start before the first batch.
const DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sources (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        feed_url TEXT NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS stories (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        image_url TEXT,
        category TEXT NOT NULL,
        article_count BIGINT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS articles (
        id UUID PRIMARY KEY,
        url TEXT NOT NULL UNIQUE,
        source_id UUID NOT NULL REFERENCES sources(id),
        title TEXT NOT NULL,
        title_key TEXT NOT NULL,
        excerpt TEXT NOT NULL,
        embedding REAL[],
        published_at TIMESTAMPTZ NOT NULL,
        story_id UUID REFERENCES stories(id),
        image_url TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_articles_story ON articles (story_id)",
    "CREATE INDEX IF NOT EXISTS idx_articles_source_title ON articles (source_id, title_key)",
    "CREATE INDEX IF NOT EXISTS idx_articles_published ON articles (published_at)",
    "CREATE INDEX IF NOT EXISTS idx_stories_updated ON stories (updated_at)",
];

pub async fn migrate(pool: &PgPool) -> Result<()> {
    for statement in DDL {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Schema migration complete");
    Ok(())
}
