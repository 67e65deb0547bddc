//! In-memory `ArticleStore` for deterministic pipeline tests. Mirrors the
//! Postgres implementation's semantics, including URL-conflict reporting,
//! so the aggregate manager's race handling can be exercised without a
//! database.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use newswire_common::{
    cosine_similarity, Article, Category, Neighbor, Source, Story, StoryWithArticles,
};

use crate::store::{ArticleStore, ArticleUpdate, InsertOutcome};

#[derive(Default)]
struct Inner {
    articles: HashMap<Uuid, Article>,
    stories: HashMap<Uuid, Story>,
    sources: HashMap<String, Source>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Test accessors ---

    pub fn articles(&self) -> Vec<Article> {
        let inner = self.inner.lock().unwrap();
        inner.articles.values().cloned().collect()
    }

    pub fn stories(&self) -> Vec<Story> {
        let inner = self.inner.lock().unwrap();
        inner.stories.values().cloned().collect()
    }

    pub fn article(&self, id: Uuid) -> Option<Article> {
        let inner = self.inner.lock().unwrap();
        inner.articles.get(&id).cloned()
    }

    pub fn story(&self, id: Uuid) -> Option<Story> {
        let inner = self.inner.lock().unwrap();
        inner.stories.get(&id).cloned()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.articles.values().find(|a| a.url == url).cloned())
    }

    async fn insert_article(&self, article: &Article) -> Result<InsertOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.articles.values().find(|a| a.url == article.url) {
            return Ok(InsertOutcome::Conflict(existing.clone()));
        }
        inner.articles.insert(article.id, article.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn update_article(&self, id: Uuid, update: &ArticleUpdate) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let article = inner
            .articles
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("no article {id}"))?;
        article.title = update.title.clone();
        article.title_key = update.title_key.clone();
        article.excerpt = update.excerpt.clone();
        article.image_url = update.image_url.clone();
        article.published_at = update.published_at;
        if update.embedding.is_some() {
            article.embedding = update.embedding.clone();
        }
        Ok(())
    }

    async fn set_story(&self, article_id: Uuid, story_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let article = inner
            .articles
            .get_mut(&article_id)
            .ok_or_else(|| anyhow::anyhow!("no article {article_id}"))?;
        article.story_id = Some(story_id);
        Ok(())
    }

    async fn insert_story(&self, story: &Story) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.stories.insert(story.id, story.clone());
        Ok(())
    }

    async fn update_story(
        &self,
        id: Uuid,
        article_count: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let story = inner
            .stories
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("no story {id}"))?;
        story.article_count = article_count;
        story.updated_at = updated_at;
        Ok(())
    }

    async fn count_story_articles(&self, story_id: Uuid) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .articles
            .values()
            .filter(|a| a.story_id == Some(story_id))
            .count() as i64)
    }

    async fn top_k_similar(&self, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let inner = self.inner.lock().unwrap();
        let mut neighbors: Vec<Neighbor> = inner
            .articles
            .values()
            .filter_map(|a| {
                let stored = a.embedding.as_ref()?;
                Some(Neighbor {
                    article_id: a.id,
                    story_id: a.story_id,
                    source_id: a.source_id,
                    url: a.url.clone(),
                    similarity: cosine_similarity(embedding, stored),
                    title: a.title.clone(),
                    image_url: a.image_url.clone(),
                    published_at: a.published_at,
                })
            })
            .collect();
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
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .articles
            .values()
            .filter(|a| {
                a.source_id == source_id
                    && a.title_key == title_key
                    && a.published_at >= since
                    && a.published_at <= until
            })
            .max_by_key(|a| a.published_at)
            .cloned())
    }

    async fn ensure_source(&self, name: &str, feed_url: &str) -> Result<Source> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(source) = inner.sources.get(feed_url) {
            return Ok(source.clone());
        }
        let source = Source {
            id: Uuid::new_v4(),
            name: name.to_string(),
            feed_url: feed_url.to_string(),
            created_at: Utc::now(),
        };
        inner.sources.insert(feed_url.to_string(), source.clone());
        Ok(source)
    }

    async fn story_feed(
        &self,
        category: Option<Category>,
        limit: i64,
    ) -> Result<Vec<StoryWithArticles>> {
        let inner = self.inner.lock().unwrap();
        let mut stories: Vec<Story> = inner
            .stories
            .values()
            .filter(|s| category.is_none_or(|c| s.category == c))
            .cloned()
            .collect();
        stories.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        stories.truncate(limit as usize);

        Ok(stories
            .into_iter()
            .map(|story| {
                let mut articles: Vec<Article> = inner
                    .articles
                    .values()
                    .filter(|a| a.story_id == Some(story.id))
                    .cloned()
                    .collect();
                articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
                StoryWithArticles { story, articles }
            })
            .collect())
    }
}
