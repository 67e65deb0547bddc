//! Deterministic fixtures and stubs for pipeline tests. The stub embedder
//! maps text fragments to hand-picked unit vectors so tests control cosine
//! similarity exactly; `(1, 0)` against `(0.96, 0.28)` is 0.96, against
//! `(0.8, 0.6)` is 0.8, against `(0.5, 0.8660254)` is 0.5.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use newswire_common::{title_key, Article, Candidate, Category, Neighbor};

use crate::classify::{ArticleLabel, Classifier};
use crate::embedder::TextEmbedder;

/// Fixed batch time so window arithmetic in tests is reproducible.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
}

pub fn candidate(title: &str, url: &str) -> Candidate {
    candidate_at(title, url, base_time())
}

pub fn candidate_at(title: &str, url: &str, published_at: DateTime<Utc>) -> Candidate {
    Candidate {
        title: title.to_string(),
        url: url.to_string(),
        published_at,
        source_id: Uuid::new_v4(),
        excerpt: String::new(),
        image_url: None,
    }
}

pub fn stored_article(title: &str, url: &str) -> Article {
    Article {
        id: Uuid::new_v4(),
        url: url.to_string(),
        source_id: Uuid::new_v4(),
        title: title.to_string(),
        title_key: title_key(title),
        excerpt: String::new(),
        embedding: None,
        published_at: base_time(),
        story_id: None,
        image_url: None,
    }
}

pub fn stored_article_with_embedding(title: &str, url: &str, embedding: Vec<f32>) -> Article {
    Article {
        embedding: Some(embedding),
        ..stored_article(title, url)
    }
}

pub fn neighbor(similarity: f64, story_id: Option<Uuid>, source_id: Uuid) -> Neighbor {
    let article_id = Uuid::new_v4();
    Neighbor {
        article_id,
        story_id,
        source_id,
        url: format!("https://stored.example/{article_id}"),
        similarity,
        title: "Stored neighbor".to_string(),
        image_url: None,
        published_at: base_time(),
    }
}

pub fn neighbor_for_article(article: &Article, similarity: f64) -> Neighbor {
    Neighbor {
        article_id: article.id,
        story_id: article.story_id,
        source_id: article.source_id,
        url: article.url.clone(),
        similarity,
        title: article.title.clone(),
        image_url: article.image_url.clone(),
        published_at: article.published_at,
    }
}

pub fn label() -> ArticleLabel {
    ArticleLabel {
        category: Category::Other,
        importance: 0.5,
    }
}

/// Embedder that returns a configured vector when the input contains a
/// registered fragment. Unmatched text gets an empty vector, which the
/// pipeline treats as "no embedding".
#[derive(Default)]
pub struct StubEmbedder {
    vectors: Vec<(String, Vec<f32>)>,
    fail_on: Option<String>,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vector(mut self, fragment: &str, vector: Vec<f32>) -> Self {
        self.vectors.push((fragment.to_string(), vector));
        self
    }

    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on = Some(fragment.to_string());
        self
    }
}

#[async_trait]
impl TextEmbedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(fragment) = &self.fail_on {
            if text.contains(fragment.as_str()) {
                anyhow::bail!("stub embedder failure on {fragment:?}");
            }
        }
        Ok(self
            .vectors
            .iter()
            .find(|(fragment, _)| text.contains(fragment.as_str()))
            .map(|(_, vector)| vector.clone())
            .unwrap_or_default())
    }
}

/// Classifier that always answers with the same label.
pub struct StubClassifier(pub ArticleLabel);

impl StubClassifier {
    pub fn other() -> Self {
        Self(label())
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn label(&self, _title: &str, _excerpt: &str) -> ArticleLabel {
        self.0.clone()
    }
}
