//! Thin client for the external text-intelligence service: embeddings and
//! classification over an OpenAI-compatible HTTP API. From the caller's
//! point of view these are pure functions — failures come back as `Err`
//! and the pipeline degrades, they never propagate as panics.

mod client;
mod types;

pub use client::IntelClient;
pub use types::Classification;

use anyhow::Result;
use async_trait::async_trait;

/// Embedding surface consumed by the ingest pipeline.
#[async_trait]
pub trait EmbedApi: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

/// Classification surface consumed by the ingest pipeline.
#[async_trait]
pub trait ClassifyApi: Send + Sync {
    async fn classify(&self, title: &str, text: &str) -> Result<Classification>;
}
