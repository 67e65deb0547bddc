use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use newswire_common::{
    cosine_similarity, Article, Category, Neighbor, Source, Story, StoryWithArticles,
};

use crate::store::{ArticleStore, ArticleUpdate, InsertOutcome};

/// How far back the similarity scan reaches. Clustering is a near-real-time
/// concern; month-old articles are never fold targets.
const SIMILARITY_WINDOW_DAYS: i64 = 14;

/// Cap on candidate rows loaded per similarity lookup.
const SIMILARITY_SCAN_LIMIT: i64 = 1000;

/// Postgres-backed article store. Embeddings are stored as `real[]` and
/// ranked by cosine similarity in process over a recent window.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn article_from_row(row: &sqlx::postgres::PgRow) -> Result<Article> {
    Ok(Article {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        source_id: row.try_get("source_id")?,
        title: row.try_get("title")?,
        title_key: row.try_get("title_key")?,
        excerpt: row.try_get("excerpt")?,
        embedding: row.try_get("embedding")?,
        published_at: row.try_get("published_at")?,
        story_id: row.try_get("story_id")?,
        image_url: row.try_get("image_url")?,
    })
}

fn story_from_row(row: &sqlx::postgres::PgRow) -> Result<Story> {
    let category: String = row.try_get("category")?;
    Ok(Story {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        image_url: row.try_get("image_url")?,
        // FromStr is lenient; unknown labels fold into Other.
        category: category.parse().unwrap_or(Category::Other),
        article_count: row.try_get("article_count")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ArticleStore for PgStore {
    async fn article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn insert_article(&self, article: &Article) -> Result<InsertOutcome> {
        let result = sqlx::query(
            "INSERT INTO articles
                (id, url, source_id, title, title_key, excerpt, embedding,
                 published_at, story_id, image_url)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (url) DO NOTHING",
        )
        .bind(article.id)
        .bind(&article.url)
        .bind(article.source_id)
        .bind(&article.title)
        .bind(&article.title_key)
        .bind(&article.excerpt)
        .bind(&article.embedding)
        .bind(article.published_at)
        .bind(article.story_id)
        .bind(&article.image_url)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(InsertOutcome::Inserted);
        }

        // A concurrent writer got here first; surface its row so the caller
        // can re-resolve as an update.
        match self.article_by_url(&article.url).await? {
            Some(existing) => Ok(InsertOutcome::Conflict(existing)),
            None => Err(anyhow::anyhow!(
                "insert of {} conflicted but no existing row found",
                article.url
            )),
        }
    }

    async fn update_article(&self, id: Uuid, update: &ArticleUpdate) -> Result<()> {
        sqlx::query(
            "UPDATE articles
             SET title = $2, title_key = $3, excerpt = $4, image_url = $5,
                 published_at = $6,
                 embedding = COALESCE($7, embedding)
             WHERE id = $1",
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.title_key)
        .bind(&update.excerpt)
        .bind(&update.image_url)
        .bind(update.published_at)
        .bind(&update.embedding)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_story(&self, article_id: Uuid, story_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE articles SET story_id = $2 WHERE id = $1")
            .bind(article_id)
            .bind(story_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_story(&self, story: &Story) -> Result<()> {
        sqlx::query(
            "INSERT INTO stories (id, title, image_url, category, article_count, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(story.id)
        .bind(&story.title)
        .bind(&story.image_url)
        .bind(story.category.to_string())
        .bind(story.article_count)
        .bind(story.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_story(
        &self,
        id: Uuid,
        article_count: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE stories SET article_count = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(article_count)
            .bind(updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_story_articles(&self, story_id: Uuid) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM articles WHERE story_id = $1")
            .bind(story_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    async fn top_k_similar(&self, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let since = Utc::now() - Duration::days(SIMILARITY_WINDOW_DAYS);
        let rows = sqlx::query(
            "SELECT id, story_id, source_id, url, title, image_url, published_at, embedding
             FROM articles
             WHERE embedding IS NOT NULL AND published_at >= $1
             ORDER BY published_at DESC
             LIMIT $2",
        )
        .bind(since)
        .bind(SIMILARITY_SCAN_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let mut neighbors: Vec<Neighbor> = Vec::with_capacity(rows.len());
        for row in &rows {
            let stored: Option<Vec<f32>> = row.try_get("embedding")?;
            let Some(stored) = stored else { continue };
            neighbors.push(Neighbor {
                article_id: row.try_get("id")?,
                story_id: row.try_get("story_id")?,
                source_id: row.try_get("source_id")?,
                url: row.try_get("url")?,
                similarity: cosine_similarity(embedding, &stored),
                title: row.try_get("title")?,
                image_url: row.try_get("image_url")?,
                published_at: row.try_get("published_at")?,
            });
        }

        neighbors.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        neighbors.truncate(k);
        Ok(neighbors)
    }

    async fn find_same_source_title(
        &self,
        source_id: Uuid,
        title_key: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<Article>> {
        let row = sqlx::query(
            "SELECT * FROM articles
             WHERE source_id = $1 AND title_key = $2
               AND published_at >= $3 AND published_at <= $4
             ORDER BY published_at DESC
             LIMIT 1",
        )
        .bind(source_id)
        .bind(title_key)
        .bind(since)
        .bind(until)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn ensure_source(&self, name: &str, feed_url: &str) -> Result<Source> {
        if let Some(row) = sqlx::query("SELECT * FROM sources WHERE feed_url = $1")
            .bind(feed_url)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(Source {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                feed_url: row.try_get("feed_url")?,
                created_at: row.try_get("created_at")?,
            });
        }

        let source = Source {
            id: Uuid::new_v4(),
            name: name.to_string(),
            feed_url: feed_url.to_string(),
            created_at: Utc::now(),
        };
        // ON CONFLICT keeps the original name if two runs race on a new feed.
        sqlx::query(
            "INSERT INTO sources (id, name, feed_url, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (feed_url) DO NOTHING",
        )
        .bind(source.id)
        .bind(&source.name)
        .bind(&source.feed_url)
        .bind(source.created_at)
        .execute(&self.pool)
        .await?;

        match sqlx::query("SELECT * FROM sources WHERE feed_url = $1")
            .bind(feed_url)
            .fetch_one(&self.pool)
            .await
        {
            Ok(row) => Ok(Source {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                feed_url: row.try_get("feed_url")?,
                created_at: row.try_get("created_at")?,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn story_feed(
        &self,
        category: Option<Category>,
        limit: i64,
    ) -> Result<Vec<StoryWithArticles>> {
        let story_rows = match category {
            Some(c) => {
                sqlx::query(
                    "SELECT * FROM stories WHERE category = $1
                     ORDER BY updated_at DESC LIMIT $2",
                )
                .bind(c.to_string())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM stories ORDER BY updated_at DESC LIMIT $1")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut stories = Vec::with_capacity(story_rows.len());
        for row in &story_rows {
            stories.push(story_from_row(row)?);
        }

        let ids: Vec<Uuid> = stories.iter().map(|s| s.id).collect();
        let article_rows = sqlx::query(
            "SELECT * FROM articles WHERE story_id = ANY($1)
             ORDER BY published_at DESC",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut feed: Vec<StoryWithArticles> = stories
            .into_iter()
            .map(|story| StoryWithArticles {
                story,
                articles: Vec::new(),
            })
            .collect();
        for row in &article_rows {
            let article = article_from_row(row)?;
            if let Some(entry) = feed
                .iter_mut()
                .find(|e| Some(e.story.id) == article.story_id)
            {
                entry.articles.push(article);
            }
        }
        Ok(feed)
    }
}
