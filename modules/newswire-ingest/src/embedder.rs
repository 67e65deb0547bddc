//! Embedding seam between the pipeline and the text-intelligence client.
//! The pipeline depends on this trait, not on the HTTP client, so tests
//! can swap in deterministic vectors and a no-op variant can run the
//! pipeline without an API key.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use intel_client::EmbedApi;

/// An empty vector means "no embedding available"; the decision engine
/// then leans on URL and title keys alone.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Production embedder backed by the intel client.
pub struct IntelEmbedder {
    api: Arc<dyn EmbedApi>,
}

impl IntelEmbedder {
    pub fn new(api: Arc<dyn EmbedApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl TextEmbedder for IntelEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.api.embed(text).await
    }
}

/// Embedder that produces no vectors. Keeps the pipeline runnable when the
/// embedding service is disabled; every candidate resolves on keys alone.
pub struct NoOpEmbedder;

#[async_trait]
impl TextEmbedder for NoOpEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(Vec::new())
    }
}
