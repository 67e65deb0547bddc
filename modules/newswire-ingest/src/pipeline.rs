//! Pipeline Coordinator. Preparation (normalize, embed, classify) runs
//! concurrently per candidate; decide-and-apply runs serialized in
//! ascending publish-time order so every decision sees the writes of the
//! candidates before it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::{stream, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use newswire_common::{Article, Candidate, ClusterConfig, NormalizedKey};
use newswire_store::ArticleStore;

use crate::aggregate::{AppliedKind, StoryWriter};
use crate::classify::{ArticleLabel, Classifier};
use crate::decision::{decide, ClusterDecision};
use crate::embedder::TextEmbedder;
use crate::feed::truncate_chars;
use crate::normalize::normalize;
use crate::resolver::{find_similar, EmbedCache};
use crate::stats::IngestStats;

const PREPARE_CONCURRENCY: usize = 8;

/// How much text feeds the embedding, in characters.
const EMBED_TEXT_MAX_CHARS: usize = 500;

/// State threaded through one batch: URLs already decided this run, and
/// embeddings of articles written this run.
#[derive(Default)]
pub struct BatchContext {
    pub seen_urls: HashSet<String>,
    pub cache: EmbedCache,
}

struct Prepared {
    candidate: Candidate,
    key: NormalizedKey,
    embedding: Option<Vec<f32>>,
    label: ArticleLabel,
    degraded: bool,
}

pub struct IngestPipeline {
    store: Arc<dyn ArticleStore>,
    embedder: Arc<dyn TextEmbedder>,
    classifier: Arc<dyn Classifier>,
    config: ClusterConfig,
    deadline: Duration,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        embedder: Arc<dyn TextEmbedder>,
        classifier: Arc<dyn Classifier>,
        config: ClusterConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            classifier,
            config,
            deadline: Duration::from_secs(300),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Runs one batch to completion. `Err` means a store failure the run
    /// cannot proceed past; per-candidate enrichment failures degrade and
    /// are counted instead.
    pub async fn run(&self, candidates: Vec<Candidate>) -> Result<IngestStats> {
        let deadline = Instant::now() + self.deadline;
        let mut stats = IngestStats {
            received: candidates.len(),
            ..IngestStats::default()
        };

        let (valid, rejected): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|c| !c.url.trim().is_empty() && !c.title.trim().is_empty());
        stats.rejected = rejected.len();
        for c in &rejected {
            warn!(url = %c.url, "rejected candidate with empty url or title");
        }

        let mut prepared = self.prepare_all(valid).await;
        stats.degraded = prepared.iter().filter(|p| p.degraded).count();

        // Ascending publish time, URL as the tie-break, so replays of the
        // same batch resolve identically.
        prepared.sort_by(|a, b| {
            (a.candidate.published_at, a.key.url.as_str())
                .cmp(&(b.candidate.published_at, b.key.url.as_str()))
        });

        let writer = StoryWriter::new(self.store.clone());
        let mut ctx = BatchContext::default();

        let mut queue = prepared.into_iter();
        while let Some(item) = queue.next() {
            if Instant::now() >= deadline {
                stats.deferred = 1 + queue.len();
                warn!(deferred = stats.deferred, "run deadline passed, deferring remainder");
                break;
            }
            self.step(&writer, &mut ctx, item, &mut stats).await?;
        }

        info!(%stats, "ingestion run complete");
        Ok(stats)
    }

    async fn prepare_all(&self, candidates: Vec<Candidate>) -> Vec<Prepared> {
        stream::iter(candidates)
            .map(|candidate| async move {
                let key = normalize(&candidate);
                let text = embed_text(&candidate);
                let (embedding, degraded) = match self.embedder.embed(&text).await {
                    Ok(v) if !v.is_empty() => (Some(v), false),
                    Ok(_) => (None, false),
                    Err(e) => {
                        warn!(url = %key.url, error = %e, "embedding failed, resolving on keys only");
                        (None, true)
                    }
                };
                let label = self
                    .classifier
                    .label(&candidate.title, &candidate.excerpt)
                    .await;
                Prepared {
                    candidate,
                    key,
                    embedding,
                    label,
                    degraded,
                }
            })
            .buffer_unordered(PREPARE_CONCURRENCY)
            .collect()
            .await
    }

    async fn step(
        &self,
        writer: &StoryWriter,
        ctx: &mut BatchContext,
        item: Prepared,
        stats: &mut IngestStats,
    ) -> Result<()> {
        if ctx.seen_urls.contains(&item.key.url) {
            debug!(url = %item.key.url, "duplicate within batch, skipping");
            stats.skipped_in_batch += 1;
            return Ok(());
        }

        let exact = self.store.article_by_url(&item.key.url).await?;

        let title_match = match &exact {
            Some(_) => None,
            None if item.key.title_key.is_empty() => None,
            None => {
                // Same symmetric window as the vector path, so a scheduled
                // or backfilled timestamp cannot fold across it.
                let since = item.candidate.published_at - self.config.same_source_window;
                let until = item.candidate.published_at + self.config.same_source_window;
                self.store
                    .find_same_source_title(
                        item.candidate.source_id,
                        &item.key.title_key,
                        since,
                        until,
                    )
                    .await?
            }
        };

        let neighbors = match &exact {
            Some(_) => Vec::new(),
            None => {
                find_similar(
                    self.store.as_ref(),
                    &ctx.cache,
                    item.embedding.as_deref(),
                    &item.key.url,
                    self.config.top_k,
                )
                .await
            }
        };

        let decision = decide(
            &item.candidate,
            exact.as_ref(),
            title_match.as_ref(),
            &neighbors,
            &self.config,
        );
        debug!(url = %item.key.url, ?decision, "resolved candidate");

        let paired_neighbor = match &decision {
            ClusterDecision::CreateStoryFromPair { neighbor } => Some(neighbor.article_id),
            _ => None,
        };

        let applied = writer
            .apply(
                &item.candidate,
                &item.key,
                item.embedding.clone(),
                &item.label,
                decision,
            )
            .await?;

        ctx.seen_urls.insert(item.key.url.clone());
        if applied.inserted {
            ctx.cache.add(&stored_view(&item, &applied));
        }
        if applied.kind == AppliedKind::Paired {
            if let (Some(neighbor_id), Some(story_id)) = (paired_neighbor, applied.story_id) {
                ctx.cache.set_story(neighbor_id, story_id);
            }
        }

        stats.record(applied.kind);
        Ok(())
    }
}

fn embed_text(candidate: &Candidate) -> String {
    let excerpt = truncate_chars(&candidate.excerpt, EMBED_TEXT_MAX_CHARS);
    if excerpt.is_empty() {
        candidate.title.clone()
    } else {
        format!("{}\n{}", candidate.title, excerpt)
    }
}

fn stored_view(item: &Prepared, applied: &crate::aggregate::Applied) -> Article {
    Article {
        id: applied.article_id,
        url: item.key.url.clone(),
        source_id: item.candidate.source_id,
        title: item.candidate.title.clone(),
        title_key: item.key.title_key.clone(),
        excerpt: item.candidate.excerpt.clone(),
        embedding: item.embedding.clone(),
        published_at: item.candidate.published_at,
        story_id: applied.story_id,
        image_url: item.candidate.image_url.clone(),
    }
}
