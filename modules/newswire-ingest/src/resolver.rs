//! Similarity Resolver — merges the store's top-k vector search with a
//! batch-local cache of articles written earlier in the same run, so two
//! candidates in one batch can still find each other before either is
//! visible to a fresh store query.

use newswire_common::{cosine_similarity, Article, Neighbor};
use newswire_store::ArticleStore;
use tracing::warn;
use uuid::Uuid;

struct CacheEntry {
    article_id: Uuid,
    story_id: Option<Uuid>,
    source_id: Uuid,
    url: String,
    title: String,
    image_url: Option<String>,
    published_at: chrono::DateTime<chrono::Utc>,
    embedding: Vec<f32>,
}

/// Embeddings of articles inserted during the current batch.
#[derive(Default)]
pub struct EmbedCache {
    entries: Vec<CacheEntry>,
}

impl EmbedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Articles without an embedding are not cached; they can only be
    /// found through URL and title keys.
    pub fn add(&mut self, article: &Article) {
        let Some(embedding) = article.embedding.as_ref() else {
            return;
        };
        if embedding.is_empty() {
            return;
        }
        self.entries.push(CacheEntry {
            article_id: article.id,
            story_id: article.story_id,
            source_id: article.source_id,
            url: article.url.clone(),
            title: article.title.clone(),
            image_url: article.image_url.clone(),
            published_at: article.published_at,
            embedding: embedding.clone(),
        });
    }

    /// Keeps cached story membership in step with the store after an
    /// attach or pair write.
    pub fn set_story(&mut self, article_id: Uuid, story_id: Uuid) {
        for entry in &mut self.entries {
            if entry.article_id == article_id {
                entry.story_id = Some(story_id);
            }
        }
    }

    fn matches(&self, embedding: &[f32]) -> Vec<Neighbor> {
        self.entries
            .iter()
            .map(|e| Neighbor {
                article_id: e.article_id,
                story_id: e.story_id,
                source_id: e.source_id,
                url: e.url.clone(),
                similarity: cosine_similarity(embedding, &e.embedding),
                title: e.title.clone(),
                image_url: e.image_url.clone(),
                published_at: e.published_at,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ranked nearest neighbors for a candidate, self-matches excluded. A
/// failing store lookup degrades to batch-local results only; similarity
/// search is advisory, not load-bearing.
pub async fn find_similar(
    store: &dyn ArticleStore,
    cache: &EmbedCache,
    embedding: Option<&[f32]>,
    self_url: &str,
    k: usize,
) -> Vec<Neighbor> {
    let Some(embedding) = embedding else {
        return Vec::new();
    };

    let stored = match store.top_k_similar(embedding, k).await {
        Ok(neighbors) => neighbors,
        Err(e) => {
            warn!(error = %e, "similarity lookup failed, using batch-local results only");
            Vec::new()
        }
    };

    let mut merged: Vec<Neighbor> = Vec::with_capacity(stored.len() + cache.len());
    for neighbor in stored.into_iter().chain(cache.matches(embedding)) {
        if neighbor.url == self_url {
            continue;
        }
        match merged.iter_mut().find(|n| n.article_id == neighbor.article_id) {
            Some(existing) => {
                if neighbor.similarity > existing.similarity {
                    *existing = neighbor;
                }
            }
            None => merged.push(neighbor),
        }
    }

    merged.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    merged.truncate(k);
    merged
}
