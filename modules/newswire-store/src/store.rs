// Trait abstraction over the record store.
//
// Everything the pipeline needs from storage lives behind ArticleStore, so
// the decision engine and aggregate manager can be exercised against the
// in-memory implementation: no network, no database, `cargo test` in
// seconds.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use newswire_common::{Article, Category, Neighbor, Source, Story, StoryWithArticles};

/// Result of an article insert. A conflict means another writer already
/// owns this normalized URL — callers re-resolve as an update, never treat
/// it as a fault.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted,
    Conflict(Article),
}

/// Fields refreshed when a known article is re-published. The story id is
/// deliberately absent: the update path never touches it.
#[derive(Debug, Clone)]
pub struct ArticleUpdate {
    pub title: String,
    pub title_key: String,
    pub excerpt: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub embedding: Option<Vec<f32>>,
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    // --- Articles ---

    /// Look up an article by its normalized URL (the uniqueness key).
    async fn article_by_url(&self, url: &str) -> Result<Option<Article>>;

    /// Insert an article. A unique-constraint hit on the normalized URL
    /// returns `Conflict` with the existing row instead of an error.
    async fn insert_article(&self, article: &Article) -> Result<InsertOutcome>;

    /// Refresh a republished article's content fields in place.
    async fn update_article(&self, id: Uuid, update: &ArticleUpdate) -> Result<()>;

    /// Attach an article to a story. The only post-creation mutation of
    /// `story_id`; a storyless article transitions exactly once.
    async fn set_story(&self, article_id: Uuid, story_id: Uuid) -> Result<()>;

    // --- Stories ---

    async fn insert_story(&self, story: &Story) -> Result<()>;

    /// Overwrite a story's article count and bump its last-updated time.
    async fn update_story(
        &self,
        id: Uuid,
        article_count: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Count the articles currently attached to a story. The aggregate
    /// manager recomputes counts through this instead of incrementing.
    async fn count_story_articles(&self, story_id: Uuid) -> Result<i64>;

    // --- Similarity + dedup queries ---

    /// Top-k most similar stored articles by cosine similarity, descending,
    /// with the metadata the decision engine needs in one round-trip.
    async fn top_k_similar(&self, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Find a same-source article with an identical title key published
    /// within `[since, until]`. Embedding-free fallback for the
    /// same-source guard; the window is symmetric around the candidate's
    /// publish time, matching the vector path.
    async fn find_same_source_title(
        &self,
        source_id: Uuid,
        title_key: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<Article>>;

    // --- Sources ---

    /// Find the source registered for a feed URL, creating it if missing.
    async fn ensure_source(&self, name: &str, feed_url: &str) -> Result<Source>;

    // --- Presentation reads ---

    /// Stories ordered by last-updated descending with their attached
    /// articles, optionally filtered by category.
    async fn story_feed(
        &self,
        category: Option<Category>,
        limit: i64,
    ) -> Result<Vec<StoryWithArticles>>;
}
